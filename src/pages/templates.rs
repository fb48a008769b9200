//! Jinja template environment.
//!
//! Templates are looked up by file name in `templates/pages`, then in
//! `templates/components`, so page templates can `{% include %}` components
//! without a directory prefix.

use crate::config::SiteConfig;
use anyhow::{Context, Result};
use minijinja::{AutoEscape, Environment, Error, ErrorKind, Value};
use serde::Serialize;
use std::{io, path::PathBuf};

/// Loaded lazily on first use; shared read-only by every page task.
#[derive(Debug)]
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new(config: &SiteConfig) -> Self {
        let dirs = vec![
            config.page_templates_dir(),
            config.component_templates_dir(),
        ];

        let mut env = Environment::new();
        env.set_loader(move |name| load(&dirs, name));
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.add_function("plus1", plus1);
        env.add_function("personal_info_wrap", personal_info_wrap);

        Self { env }
    }

    pub fn render<C: Serialize>(&self, name: &str, context: &C) -> Result<String> {
        let template = self
            .env
            .get_template(name)
            .with_context(|| format!("failed to load template '{name}'"))?;
        let html = template
            .render(context)
            .with_context(|| format!("failed to execute template '{name}'"))?;
        Ok(html)
    }
}

fn load(dirs: &[PathBuf], name: &str) -> Result<Option<String>, Error> {
    if name.split(['/', '\\']).any(|part| part == "..") {
        return Ok(None);
    }

    for dir in dirs {
        let path = dir.join(name);
        match std::fs::read_to_string(&path) {
            Ok(source) => return Ok(Some(source)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(Error::new(
                    ErrorKind::InvalidOperation,
                    format!("could not read template {}", path.display()),
                )
                .with_source(err));
            }
        }
    }
    Ok(None)
}

// ============================================================================
// Template Functions
// ============================================================================

fn plus1(x: i64) -> i64 {
    x + 1
}

/// Keep the first half of a personal-info line from wrapping.
///
/// Texts of three or more words get their first `(n - 1) / 2 + 1` words
/// wrapped in a `whitespace-nowrap` span.
fn personal_info_wrap(text: String) -> Value {
    Value::from_safe_string(wrap_words(&escape(&text)))
}

fn wrap_words(text: &str) -> String {
    let words: Vec<&str> = text.split(' ').collect();
    if words.len() < 3 {
        return text.to_owned();
    }

    let cutoff = (words.len() - 1) / 2;
    let mut out = String::with_capacity(text.len() + 40);
    out.push_str(r#"<span class="whitespace-nowrap">"#);
    for (i, word) in words.iter().enumerate() {
        out.push_str(word);
        if i == cutoff {
            out.push_str("</span>");
        }
        if i != words.len() - 1 {
            out.push(' ');
        }
    }
    out
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
