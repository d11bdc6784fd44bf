//! Body resolution: pick the renderable part and inspect HTML content.
//!
//! The first `text/html` part found depth-first wins, then the first
//! `text/plain` part. Parts marked as attachments are never chosen.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::debug;

use crate::error::{ForensicError, Result};
use crate::model::evidence::{BodyKind, ResolvedBody};
use crate::model::message::{BodyPart, ParsedMessage};

static IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[src]").expect("static selector must parse"));

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector must parse"));

/// Elements whose text content is never shown.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Select the preferred body part and extract what an investigator reads.
pub fn resolve_body(message: &ParsedMessage) -> Result<ResolvedBody> {
    let parts = message.parts();
    let candidates = || {
        parts
            .iter()
            .copied()
            .filter(|p| !p.is_attachment && p.text().is_some())
    };

    if let Some(part) = candidates().find(|p| p.is_html()) {
        return Ok(resolve_html(part_text(part)));
    }
    if let Some(part) = candidates().find(|p| p.is_plain()) {
        debug!("Resolved plain-text body");
        return Ok(ResolvedBody {
            kind: BodyKind::Plain,
            content: part_text(part).to_string(),
            rendered_text: None,
            images: Vec::new(),
            links: Vec::new(),
        });
    }
    Err(ForensicError::NoRenderableBody)
}

fn part_text(part: &BodyPart) -> &str {
    part.text().unwrap_or_default()
}

/// Render an HTML body: visible text, image sources and link targets.
pub fn resolve_html(html: &str) -> ResolvedBody {
    let document = Html::parse_document(html);

    let images: Vec<String> = document
        .select(&IMG_SELECTOR)
        .filter_map(|el| el.value().attr("src"))
        .map(str::to_string)
        .collect();

    let links: Vec<String> = document
        .select(&LINK_SELECTOR)
        .filter_map(|el| el.value().attr("href"))
        .filter(|href| !href.trim().is_empty())
        .map(str::to_string)
        .collect();

    let text = html_to_text(&document);
    debug!(
        images = images.len(),
        links = links.len(),
        "Resolved HTML body"
    );

    ResolvedBody {
        kind: BodyKind::Html,
        content: html.to_string(),
        rendered_text: Some(text),
        images,
        links,
    }
}

/// Concatenate every visible text node in document order.
fn html_to_text(document: &Html) -> String {
    let mut text = String::new();
    for node in document.tree.root().descendants() {
        let Some(chunk) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| HIDDEN_ELEMENTS.contains(&e.name()))
        });
        if !hidden {
            let chunk: &str = chunk;
            text.push_str(chunk);
        }
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::PartContent;

    fn part(ct: &str, text: &str) -> BodyPart {
        BodyPart {
            content_type: ct.to_string(),
            is_attachment: false,
            content: PartContent::Text(text.to_string()),
        }
    }

    fn message(body: BodyPart) -> ParsedMessage {
        ParsedMessage {
            headers: Vec::new(),
            body,
        }
    }

    fn multipart(ct: &str, children: Vec<BodyPart>) -> BodyPart {
        BodyPart {
            content_type: ct.to_string(),
            is_attachment: false,
            content: PartContent::Multipart(children),
        }
    }

    #[test]
    fn test_html_scenario() {
        let msg = message(part(
            "text/html",
            "<html><body>Hello <a href='http://x.test'>there</a></body></html>",
        ));
        let body = resolve_body(&msg).unwrap();
        assert_eq!(body.kind, BodyKind::Html);
        assert_eq!(body.display_text(), "Hello there");
        assert_eq!(body.links, vec!["http://x.test".to_string()]);
        assert!(body.images.is_empty());
    }

    #[test]
    fn test_html_preferred_over_plain() {
        let msg = message(multipart(
            "multipart/alternative",
            vec![part("text/plain", "plain"), part("text/html", "<p>rich</p>")],
        ));
        let body = resolve_body(&msg).unwrap();
        assert_eq!(body.kind, BodyKind::Html);
        assert_eq!(body.display_text(), "rich");
    }

    #[test]
    fn test_first_html_depth_first() {
        let msg = message(multipart(
            "multipart/mixed",
            vec![
                multipart(
                    "multipart/alternative",
                    vec![part("text/plain", "p1"), part("text/html", "<b>first</b>")],
                ),
                part("text/html", "<b>second</b>"),
            ],
        ));
        assert_eq!(resolve_body(&msg).unwrap().display_text(), "first");
    }

    #[test]
    fn test_plain_fallback() {
        let msg = message(multipart(
            "multipart/mixed",
            vec![
                BodyPart {
                    content_type: "application/pdf".into(),
                    is_attachment: true,
                    content: PartContent::Binary(vec![1, 2, 3]),
                },
                part("text/plain", "just text"),
            ],
        ));
        let body = resolve_body(&msg).unwrap();
        assert_eq!(body.kind, BodyKind::Plain);
        assert_eq!(body.display_text(), "just text");
        assert!(body.rendered_text.is_none());
    }

    #[test]
    fn test_attachments_not_selected() {
        let mut attached = part("text/html", "<p>attached page</p>");
        attached.is_attachment = true;
        let msg = message(multipart(
            "multipart/mixed",
            vec![part("text/plain", "cover note"), attached],
        ));
        assert_eq!(resolve_body(&msg).unwrap().display_text(), "cover note");
    }

    #[test]
    fn test_no_renderable_body() {
        let msg = message(BodyPart {
            content_type: "image/png".into(),
            is_attachment: false,
            content: PartContent::Binary(vec![0x89]),
        });
        assert!(matches!(
            resolve_body(&msg),
            Err(ForensicError::NoRenderableBody)
        ));
    }

    #[test]
    fn test_images_and_links_in_order() {
        let html = r#"<div><img src="a.png"><a>no target</a><a href="">empty</a>
            <a href="https://one.test">1</a><img alt="x"><img src="cid:logo">
            <a href="mailto:x@y.test">2</a></div>"#;
        let body = resolve_html(html);
        assert_eq!(body.images, vec!["a.png", "cid:logo"]);
        assert_eq!(body.links, vec!["https://one.test", "mailto:x@y.test"]);
    }

    #[test]
    fn test_script_and_style_hidden() {
        let body = resolve_html(
            "<html><head><style>p{color:red}</style></head><body>Before<script>alert(1)</script>After</body></html>",
        );
        assert_eq!(body.display_text(), "BeforeAfter");
    }

    #[test]
    fn test_entities_decoded() {
        let body = resolve_html("<p>Tom &amp; Jerry &lt;3&gt;</p>");
        assert_eq!(body.display_text(), "Tom & Jerry <3>");
    }
}
