//! HTML minification for written pages.

use std::borrow::Cow;

/// Minify rendered HTML when `enabled`.
///
/// Returns the input untouched when minification is off.
pub fn minify_html(html: &str, enabled: bool) -> Cow<'_, str> {
    if !enabled {
        return Cow::Borrowed(html);
    }

    let minified = minify_html::minify(html.as_bytes(), &config());
    match String::from_utf8(minified) {
        Ok(minified) => Cow::Owned(minified),
        Err(_) => Cow::Borrowed(html),
    }
}

fn config() -> minify_html::Cfg {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    cfg.remove_bangs = true;
    cfg.remove_processing_instructions = true;
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minify_html_enabled() {
        let html = "<html>\n  <head>\n  </head>\n  <body>\n    <p>Hello World</p>\n  </body>\n</html>";
        let result = minify_html(html, true);

        assert!(!result.contains("\n  "));
        assert!(result.contains("<p>Hello World</p>"));
        assert!(result.len() < html.len());
    }

    #[test]
    fn test_minify_html_disabled() {
        let html = "<html>\n  <body>\n  </body>\n</html>";
        assert!(matches!(minify_html(html, false), Cow::Borrowed(s) if s == html));
    }

    #[test]
    fn test_minify_keeps_redirect_meta() {
        let html = r#"<html><head><meta http-equiv="refresh" content="0; url=/devlog"></head><body></body></html>"#;
        let result = minify_html(html, true);
        assert!(result.contains("url=/devlog"));
    }
}
