//! Raw-content composer for the admin page editor.
//!
//! Flattens an ordered list of authored blocks into a single HTML string:
//! body blocks in input order, then one aggregated `<style>` element, then one
//! aggregated `<script>` element. Raw html/css/js blocks pass through
//! untouched. The editor is only reachable by authenticated staff and its
//! output runs with full page privilege; the composer does not police it.

use serde::{Deserialize, Serialize};

use super::sections::escape_html;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Heading,
    Text,
    Image,
    List,
    Quote,
    Code,
    Html,
    Css,
    Js,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorBlock {
    pub kind: BlockKind,
    /// Block body: text, URL for images, newline-separated items for lists,
    /// raw source for html/css/js.
    pub body: String,
    /// Heading level 1-6; ignored by other kinds.
    #[serde(default)]
    pub level: Option<u8>,
    /// Image alt text / quote attribution; ignored by other kinds.
    #[serde(default)]
    pub caption: Option<String>,
}

/// Flatten ordered blocks into one HTML string. Same input always yields the
/// same output.
pub fn compose(blocks: &[EditorBlock]) -> String {
    let mut html = String::new();
    let mut css = String::new();
    let mut js = String::new();

    for block in blocks {
        match block.kind {
            BlockKind::Heading => {
                let level = block.level.unwrap_or(2).clamp(1, 6);
                html.push_str(&format!(
                    "<h{lvl}>{}</h{lvl}>\n",
                    escape_html(&block.body),
                    lvl = level
                ));
            }
            BlockKind::Text => {
                html.push_str(&format!("<p>{}</p>\n", escape_html(&block.body)));
            }
            BlockKind::Image => {
                let alt = block.caption.as_deref().unwrap_or_default();
                html.push_str(&format!(
                    "<img src=\"{}\" alt=\"{}\">\n",
                    escape_html(&block.body),
                    escape_html(alt)
                ));
            }
            BlockKind::List => {
                html.push_str("<ul>\n");
                for item in block.body.lines().filter(|l| !l.trim().is_empty()) {
                    html.push_str(&format!("<li>{}</li>\n", escape_html(item.trim())));
                }
                html.push_str("</ul>\n");
            }
            BlockKind::Quote => {
                let cite = block
                    .caption
                    .as_deref()
                    .filter(|c| !c.is_empty())
                    .map(|c| format!("<cite>{}</cite>", escape_html(c)))
                    .unwrap_or_default();
                html.push_str(&format!(
                    "<blockquote><p>{}</p>{}</blockquote>\n",
                    escape_html(&block.body),
                    cite
                ));
            }
            BlockKind::Code => {
                html.push_str(&format!(
                    "<pre><code>{}</code></pre>\n",
                    escape_html(&block.body)
                ));
            }
            BlockKind::Html => {
                html.push_str(&block.body);
                if !block.body.ends_with('\n') {
                    html.push('\n');
                }
            }
            BlockKind::Css => {
                css.push_str(&block.body);
                css.push('\n');
            }
            BlockKind::Js => {
                js.push_str(&block.body);
                js.push('\n');
            }
        }
    }

    if !css.is_empty() {
        html.push_str(&format!("<style>\n{}</style>\n", css));
    }
    if !js.is_empty() {
        html.push_str(&format!("<script>\n{}</script>\n", js));
    }

    html
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(kind: BlockKind, body: &str) -> EditorBlock {
        EditorBlock {
            kind,
            body: body.to_string(),
            level: None,
            caption: None,
        }
    }

    #[test]
    fn test_compose_preserves_block_order() {
        let blocks = vec![
            block(BlockKind::Heading, "Evacuation"),
            block(BlockKind::Text, "Know your routes."),
            block(BlockKind::List, "Route A\nRoute B"),
        ];
        let out = compose(&blocks);
        let h = out.find("Evacuation").unwrap();
        let p = out.find("Know your routes.").unwrap();
        let li = out.find("Route A").unwrap();
        assert!(h < p && p < li);
    }

    #[test]
    fn test_compose_is_deterministic() {
        let blocks = vec![
            block(BlockKind::Text, "body"),
            block(BlockKind::Css, "p { color: red; }"),
            block(BlockKind::Js, "console.log(1);"),
        ];
        assert_eq!(compose(&blocks), compose(&blocks));
    }

    #[test]
    fn test_css_and_js_aggregate_at_end() {
        let blocks = vec![
            block(BlockKind::Css, "a {}"),
            block(BlockKind::Text, "middle"),
            block(BlockKind::Js, "x();"),
            block(BlockKind::Css, "b {}"),
            block(BlockKind::Js, "y();"),
        ];
        let out = compose(&blocks);

        // One style element holding both rules, then one script at the end
        assert_eq!(out.matches("<style>").count(), 1);
        assert_eq!(out.matches("<script>").count(), 1);
        let style = out.find("<style>").unwrap();
        let script = out.find("<script>").unwrap();
        assert!(out.find("middle").unwrap() < style);
        assert!(style < script);
        assert!(out.find("a {}").unwrap() < out.find("b {}").unwrap());
        assert!(out.find("x();").unwrap() < out.find("y();").unwrap());
    }

    #[test]
    fn test_text_blocks_are_escaped_raw_html_is_not() {
        let blocks = vec![
            block(BlockKind::Text, "<script>alert(1)</script>"),
            block(BlockKind::Html, "<div class=\"custom\">trusted</div>"),
        ];
        let out = compose(&blocks);
        assert!(out.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(out.contains("<div class=\"custom\">trusted</div>"));
    }

    #[test]
    fn test_heading_level_clamped() {
        let mut b = block(BlockKind::Heading, "t");
        b.level = Some(9);
        assert!(compose(&[b]).contains("<h6>t</h6>"));

        let mut b = block(BlockKind::Heading, "t");
        b.level = Some(0);
        assert!(compose(&[b]).contains("<h1>t</h1>"));
    }

    #[test]
    fn test_quote_with_attribution() {
        let mut b = block(BlockKind::Quote, "Preparedness saves lives.");
        b.caption = Some("MDRRMO".to_string());
        let out = compose(&[b]);
        assert!(out.contains("<blockquote>"));
        assert!(out.contains("<cite>MDRRMO</cite>"));
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert_eq!(compose(&[]), "");
    }

    #[test]
    fn test_list_skips_blank_lines() {
        let out = compose(&[block(BlockKind::List, "one\n\n  \ntwo")]);
        assert_eq!(out.matches("<li>").count(), 2);
    }
}
