//! Markdown to HTML conversion.
//!
//! Wraps the `pulldown-cmark` event stream with three rewrites:
//!
//! - every link gets `class="break-words"`, and external (`http…`) links open
//!   in a new tab
//! - a paragraph holding nothing but one image becomes a `<figure>`
//! - that image's alt text becomes a visible `<figcaption>`, with an optional
//!   trailing `(WxH)` suffix emitted as `width`/`height` attributes
//!
//! Raw HTML in the source passes through unchanged.

use crate::log;
use anyhow::{Result, bail};
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd, html};
use pulldown_cmark_escape::{escape_href, escape_html, escape_html_body_text};
use regex::Regex;
use std::sync::OnceLock;

const FIGURE_CLASS: &str = "flex flex-col gap-2 items-center";
const IMAGE_CLASS: &str = "rounded-lg border-2 border-solid border-gruvbox-bg2";
const FIGCAPTION_CLASS: &str = "italic text-center mb-1";

// ============================================================================
// Rendering
// ============================================================================

/// Convert a markdown body to HTML.
///
/// # Errors
/// Fails when a standalone image has no alt text, since it would render an
/// empty caption.
pub fn render_markdown(src: &str) -> Result<String> {
    let events: Vec<Event<'_>> = Parser::new_ext(src, options()).collect();
    let mut rewritten = Vec::with_capacity(events.len());

    let mut i = 0;
    while i < events.len() {
        match &events[i] {
            Event::Start(Tag::Paragraph) => {
                if let Some(end) = standalone_image_end(&events[i..]) {
                    let figure = render_figure(&events[i + 1..i + end])?;
                    rewritten.push(Event::Html(figure.into()));
                    i += end + 1;
                    continue;
                }
                rewritten.push(events[i].clone());
            }
            Event::Start(Tag::Link {
                dest_url, title, ..
            }) => {
                rewritten.push(Event::InlineHtml(link_open_tag(dest_url, title)?.into()));
            }
            Event::End(TagEnd::Link) => rewritten.push(Event::InlineHtml("</a>".into())),
            event => rewritten.push(event.clone()),
        }
        i += 1;
    }

    let mut out = String::with_capacity(src.len() + src.len() / 2);
    html::push_html(&mut out, rewritten.into_iter());
    Ok(out)
}

fn options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_FOOTNOTES
}

// ============================================================================
// Links
// ============================================================================

/// Opening `<a>` tag for a link.
pub fn link_open_tag(dest: &str, title: &str) -> Result<String> {
    let mut tag = String::from(r#"<a href=""#);
    escape_href(&mut tag, dest)?;
    tag.push('"');
    if !title.is_empty() {
        tag.push_str(r#" title=""#);
        escape_html(&mut tag, title)?;
        tag.push('"');
    }
    tag.push_str(r#" class="break-words""#);
    if dest.starts_with("http") {
        tag.push_str(r#" target="_blank" rel="noopener""#);
    }
    tag.push('>');
    Ok(tag)
}

// ============================================================================
// Standalone Images
// ============================================================================

/// Index of the closing paragraph event, if `events` starts with a paragraph
/// whose only child is one image.
fn standalone_image_end(events: &[Event<'_>]) -> Option<usize> {
    if !matches!(events.first(), Some(Event::Start(Tag::Paragraph))) {
        return None;
    }
    if !matches!(events.get(1), Some(Event::Start(Tag::Image { .. }))) {
        return None;
    }

    let mut depth = 0usize;
    for (i, event) in events.iter().enumerate().skip(1) {
        match event {
            Event::Start(Tag::Image { .. }) => depth += 1,
            Event::End(TagEnd::Image) => {
                depth -= 1;
                if depth == 0 {
                    return match events.get(i + 1) {
                        Some(Event::End(TagEnd::Paragraph)) => Some(i + 1),
                        _ => None,
                    };
                }
            }
            _ => {}
        }
    }
    None
}

/// Render the image events (`Start(Image)..=End(Image)`) of a standalone image.
fn render_figure(events: &[Event<'_>]) -> Result<String> {
    let Some(Event::Start(Tag::Image {
        dest_url, title, ..
    })) = events.first()
    else {
        bail!("expected image at start of figure");
    };

    let alt = alt_text(&events[1..]);
    if alt.trim().is_empty() {
        bail!("missing alt text for image '{dest_url}'");
    }

    let caption = parse_caption(&alt);
    let mut src = String::new();
    escape_href(&mut src, dest_url)?;

    let mut out = format!(r#"<figure class="{FIGURE_CLASS}"><a href="{src}"><img src="{src}""#);
    if let Some((width, height)) = caption.dimensions {
        out.push_str(&format!(r#" width="{width}" height="{height}""#));
    }
    // The caption below carries the description
    out.push_str(r#" alt="""#);
    if !title.is_empty() {
        out.push_str(r#" title=""#);
        escape_html(&mut out, title)?;
        out.push('"');
    }
    out.push_str(&format!(r#" class="{IMAGE_CLASS}"></a>"#));
    out.push_str(&format!(r#"<figcaption class="{FIGCAPTION_CLASS}">"#));
    escape_html_body_text(&mut out, &caption.text)?;
    out.push_str("</figcaption></figure>\n");
    Ok(out)
}

/// Plain text of an image's alt events.
fn alt_text(events: &[Event<'_>]) -> String {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Text(text) | Event::Code(text) => Some(text.as_ref()),
            Event::SoftBreak | Event::HardBreak => Some(" "),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Captions
// ============================================================================

/// Image caption with optional pixel dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption {
    pub text: String,
    pub dimensions: Option<(u32, u32)>,
}

/// Split a trailing `(WxH)` suffix off an image's alt text.
///
/// A missing or malformed suffix leaves the whole text as the caption and
/// logs a warning, since the image then has no reserved layout size.
pub fn parse_caption(alt: &str) -> Caption {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^(.*?)[ \t]*\(([0-9]+)x([0-9]+)\)[ \t]*$").unwrap());

    let parsed = re.captures(alt).and_then(|caps| {
        let width = caps[2].parse().ok()?;
        let height = caps[3].parse().ok()?;
        Some(Caption {
            text: caps[1].to_owned(),
            dimensions: Some((width, height)),
        })
    });

    parsed.unwrap_or_else(|| {
        log!("warn"; "image '{alt}' has no (WxH) suffix, rendering without dimensions");
        Caption {
            text: alt.trim().to_owned(),
            dimensions: None,
        }
    })
}
