//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn content() -> PathBuf {
        "content".into()
    }

    pub fn output() -> PathBuf {
        "static".into()
    }

    pub fn templates() -> PathBuf {
        "templates".into()
    }

    pub fn index_page() -> PathBuf {
        "index_page.md".into()
    }

    pub fn project_dirs() -> Vec<PathBuf> {
        vec!["projects".into()]
    }

    pub fn basic_pages() -> Vec<PathBuf> {
        vec!["404_page.md".into()]
    }

    pub mod sitemap {
        use std::path::PathBuf;

        pub fn path() -> PathBuf {
            "sitemap.txt".into()
        }
    }

    pub mod format {
        pub fn command() -> Vec<String> {
            vec!["npx".into(), "prettier".into(), "--write".into()]
        }
    }

    pub mod css {
        use std::path::PathBuf;

        pub fn command() -> Vec<String> {
            vec!["npx".into(), "tailwindcss".into()]
        }

        pub fn input() -> PathBuf {
            "styles.css".into()
        }

        pub fn output() -> PathBuf {
            "styles.css".into()
        }
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        8080
    }
}
