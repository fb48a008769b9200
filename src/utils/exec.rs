//! External command execution utilities.
//!
//! Runs the post-build collaborators (HTML formatter, CSS build) with their
//! output captured. A non-zero exit becomes [`SiteError::ExternalProcess`]
//! with the command's stderr attached verbatim.

use crate::{error::SiteError, log};
use anyhow::{Context, Result};
use regex::Regex;
use std::{
    ffi::OsString,
    path::Path,
    process::{Command, Output},
    sync::OnceLock,
};

// ============================================================================
// Macros
// ============================================================================

/// Run an external command with arguments from a working directory.
///
/// Empty arguments are dropped, so optional flags can be passed as `""`.
///
/// # Examples
/// ```ignore
/// exec!(root; &config.build.format.command; "static/**/*.html")?;
/// exec!(root; ["tailwindcss"]; "-i", input, "-o", output, if minify { "--minify" } else { "" })?;
/// ```
#[macro_export]
macro_rules! exec {
    ($root:expr; $cmd:expr; $($arg:expr),* $(,)?) => {
        $crate::utils::exec::exec(
            $root,
            &$crate::utils::exec::internal::to_cmd_vec($cmd),
            &$crate::utils::exec::internal::filter_args(&[$($crate::utils::exec::internal::to_os($arg)),*]),
        )
    };
}

// ============================================================================
// Argument Conversion
// ============================================================================

#[doc(hidden)]
pub mod internal {
    use std::ffi::OsString;

    /// Convert to `OsString`.
    #[inline]
    pub fn to_os<S: Into<OsString>>(s: S) -> OsString {
        s.into()
    }

    /// Trait for converting to command vector.
    pub trait ToCmd {
        fn to_cmd(self) -> Vec<OsString>;
    }

    impl<const N: usize> ToCmd for [&str; N] {
        #[inline]
        fn to_cmd(self) -> Vec<OsString> {
            self.into_iter().map(OsString::from).collect()
        }
    }

    impl ToCmd for &[String] {
        #[inline]
        fn to_cmd(self) -> Vec<OsString> {
            self.iter().map(OsString::from).collect()
        }
    }

    impl ToCmd for &Vec<String> {
        #[inline]
        fn to_cmd(self) -> Vec<OsString> {
            self.iter().map(OsString::from).collect()
        }
    }

    /// Convert command to Vec<OsString>.
    #[inline]
    pub fn to_cmd_vec<C: ToCmd>(cmd: C) -> Vec<OsString> {
        cmd.to_cmd()
    }

    /// Filter out empty args.
    #[inline]
    pub fn filter_args(args: &[OsString]) -> Vec<OsString> {
        args.iter().filter(|a| !a.is_empty()).cloned().collect()
    }
}

// ============================================================================
// Command Execution
// ============================================================================

/// Execute a command and capture its output.
///
/// # Errors
/// Returns [`SiteError::ExternalProcess`] if the command exits non-zero, or an
/// IO error if it cannot be started.
pub fn exec(root: &Path, cmd: &[OsString], args: &[OsString]) -> Result<Output> {
    let (name, mut command) = prepare(root, cmd, args)?;

    let output = command
        .output()
        .with_context(|| format!("Failed to execute `{name}`"))?;

    if !output.status.success() {
        return Err(process_error(&name, &output).into());
    }

    // On success, only log stderr (warnings) to reduce noise
    log_stderr(&name, &String::from_utf8_lossy(&output.stderr));
    Ok(output)
}

/// Prepare a Command from components.
fn prepare(root: &Path, cmd: &[OsString], args: &[OsString]) -> Result<(String, Command)> {
    let first = cmd.first().context("Empty command")?;
    let program = first.to_str().context("Command name is not valid UTF-8")?;

    // Display `npx prettier` as `prettier`
    let name = match (program, cmd.get(1).and_then(|s| s.to_str())) {
        ("npx", Some(tool)) => tool.to_owned(),
        _ => program.to_owned(),
    };

    let mut command = Command::new(first);
    command.args(&cmd[1..]).args(args).current_dir(root);

    Ok((name, command))
}

/// Build the error for a failed command, keeping stderr as-is.
fn process_error(name: &str, output: &Output) -> SiteError {
    SiteError::ExternalProcess {
        command: name.to_owned(),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_owned(),
    }
}

// ============================================================================
// Output Filtering
// ============================================================================

fn strip_ansi(s: &str) -> std::borrow::Cow<'_, str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());
    re.replace_all(s, "")
}

/// Log non-empty stderr lines of a successful command.
fn log_stderr(name: &str, stderr: &str) {
    let lines: Vec<_> = stderr
        .lines()
        .map(strip_ansi)
        .filter(|line| !line.trim().is_empty())
        .collect();

    if !lines.is_empty() {
        log!(name; "{}", lines.join("\n"));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::internal::*;
    use super::*;

    #[test]
    fn test_to_cmd_vec_array() {
        let cmd = to_cmd_vec(["npx", "prettier"]);
        assert_eq!(cmd, vec![OsString::from("npx"), OsString::from("prettier")]);
    }

    #[test]
    fn test_filter_args() {
        let args = [OsString::from("-i"), OsString::from(""), OsString::from("--minify")];
        let filtered = filter_args(&args);
        assert_eq!(filtered, vec![OsString::from("-i"), OsString::from("--minify")]);
    }

    #[test]
    fn test_prepare_empty() {
        assert!(prepare(Path::new("."), &[], &[]).is_err());
    }

    #[test]
    fn test_prepare_npx_display_name() {
        let cmd = to_cmd_vec(["npx", "tailwindcss"]);
        let (name, _) = prepare(Path::new("."), &cmd, &[]).unwrap();
        assert_eq!(name, "tailwindcss");

        let cmd = to_cmd_vec(["prettier"]);
        let (name, _) = prepare(Path::new("."), &cmd, &[]).unwrap();
        assert_eq!(name, "prettier");
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_failure_attaches_stderr() {
        let err = crate::exec!(Path::new("."); ["sh"]; "-c", "echo 'broken input' >&2; exit 3")
            .unwrap_err();

        match crate::error::kind_of(&err) {
            Some(SiteError::ExternalProcess { command, stderr, .. }) => {
                assert_eq!(command, "sh");
                assert_eq!(stderr, "broken input");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_success() {
        let output = crate::exec!(Path::new("."); ["sh"]; "-c", "echo ok").unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "ok");
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[31mRed\x1b[0m"), "Red");
        assert_eq!(strip_ansi("Plain text"), "Plain text");
    }
}
