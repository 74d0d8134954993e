//! Section-kind registry: each kind carries a validator for its `data` payload
//! and a renderer producing an HTML fragment. Adding a kind is one entry in
//! `REGISTRY`, not an edit to a central switch.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Closed set of section kinds a page may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Hero,
    Content,
    Cards,
    Stats,
    Gallery,
    Contact,
    Accordion,
    Grid,
    Timeline,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hero => "hero",
            Self::Content => "content",
            Self::Cards => "cards",
            Self::Stats => "stats",
            Self::Gallery => "gallery",
            Self::Contact => "contact",
            Self::Accordion => "accordion",
            Self::Grid => "grid",
            Self::Timeline => "timeline",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hero" => Some(Self::Hero),
            "content" => Some(Self::Content),
            "cards" => Some(Self::Cards),
            "stats" => Some(Self::Stats),
            "gallery" => Some(Self::Gallery),
            "contact" => Some(Self::Contact),
            "accordion" => Some(Self::Accordion),
            "grid" => Some(Self::Grid),
            "timeline" => Some(Self::Timeline),
            _ => None,
        }
    }
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fields a renderer needs; decoupled from the database row so the
/// registry stays testable without a pool.
#[derive(Debug, Clone)]
pub struct SectionView<'a> {
    pub kind: SectionKind,
    pub title: Option<&'a str>,
    pub content: Option<&'a str>,
    pub data: &'a Value,
}

type Validator = fn(&Value) -> Result<(), String>;
type Renderer = fn(&SectionView<'_>) -> String;

struct KindDef {
    validate: Validator,
    render: Renderer,
}

static REGISTRY: Lazy<HashMap<SectionKind, KindDef>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        SectionKind::Hero,
        KindDef {
            validate: validate_freeform,
            render: render_hero,
        },
    );
    m.insert(
        SectionKind::Content,
        KindDef {
            validate: validate_freeform,
            render: render_content,
        },
    );
    m.insert(
        SectionKind::Cards,
        KindDef {
            validate: validate_cards,
            render: render_cards,
        },
    );
    m.insert(
        SectionKind::Stats,
        KindDef {
            validate: validate_stats,
            render: render_stats,
        },
    );
    m.insert(
        SectionKind::Gallery,
        KindDef {
            validate: validate_freeform,
            render: render_gallery,
        },
    );
    m.insert(
        SectionKind::Contact,
        KindDef {
            validate: validate_freeform,
            render: render_contact,
        },
    );
    m.insert(
        SectionKind::Accordion,
        KindDef {
            validate: validate_accordion,
            render: render_accordion,
        },
    );
    m.insert(
        SectionKind::Grid,
        KindDef {
            validate: validate_grid,
            render: render_grid,
        },
    );
    m.insert(
        SectionKind::Timeline,
        KindDef {
            validate: validate_freeform,
            render: render_timeline,
        },
    );
    m
});

/// Validate a `data` payload against the schema for its kind. Write paths call
/// this before persisting so a malformed payload is never stored.
pub fn validate_data(kind: SectionKind, data: &Value) -> Result<(), String> {
    (REGISTRY[&kind].validate)(data)
}

/// Render one section to an HTML fragment.
pub fn render_section(view: &SectionView<'_>) -> String {
    (REGISTRY[&view.kind].render)(view)
}

// ============================================================================
// Validators
// ============================================================================

/// Free-form kinds accept any JSON object (renderers tolerate missing fields).
fn validate_freeform(data: &Value) -> Result<(), String> {
    match data {
        Value::Object(_) | Value::Null => Ok(()),
        other => Err(format!(
            "expected a JSON object, got {}",
            json_type_name(other)
        )),
    }
}

fn validate_cards(data: &Value) -> Result<(), String> {
    let cards = required_array(data, "cards")?;
    for (i, card) in cards.iter().enumerate() {
        require_string(card, "title", &format!("cards[{}]", i))?;
        require_string(card, "description", &format!("cards[{}]", i))?;
        optional_string(card, "icon", &format!("cards[{}]", i))?;
    }
    Ok(())
}

fn validate_stats(data: &Value) -> Result<(), String> {
    let stats = required_array(data, "stats")?;
    for (i, stat) in stats.iter().enumerate() {
        require_scalar(stat, "value", &format!("stats[{}]", i))?;
        require_string(stat, "label", &format!("stats[{}]", i))?;
        optional_string(stat, "description", &format!("stats[{}]", i))?;
    }
    Ok(())
}

fn validate_accordion(data: &Value) -> Result<(), String> {
    let items = required_array(data, "items")?;
    for (i, item) in items.iter().enumerate() {
        require_string(item, "title", &format!("items[{}]", i))?;
        require_string(item, "description", &format!("items[{}]", i))?;
        if let Some(tags) = item.get("tags") {
            let tags = tags
                .as_array()
                .ok_or_else(|| format!("items[{}].tags must be an array", i))?;
            if tags.iter().any(|t| !t.is_string()) {
                return Err(format!("items[{}].tags must contain only strings", i));
            }
        }
    }
    Ok(())
}

fn validate_grid(data: &Value) -> Result<(), String> {
    let items = required_array(data, "items")?;
    for (i, item) in items.iter().enumerate() {
        require_string(item, "title", &format!("items[{}]", i))?;
        require_string(item, "description", &format!("items[{}]", i))?;
        if let Some(count) = item.get("count") {
            if !count.is_number() && !count.is_string() {
                return Err(format!("items[{}].count must be a number or string", i));
            }
        }
    }
    Ok(())
}

fn required_array<'a>(data: &'a Value, key: &str) -> Result<&'a Vec<Value>, String> {
    data.get(key)
        .ok_or_else(|| format!("missing required field '{}'", key))?
        .as_array()
        .ok_or_else(|| format!("'{}' must be an array", key))
}

fn require_string(item: &Value, key: &str, path: &str) -> Result<(), String> {
    match item.get(key) {
        Some(v) if v.is_string() => Ok(()),
        Some(_) => Err(format!("{}.{} must be a string", path, key)),
        None => Err(format!("{} is missing required field '{}'", path, key)),
    }
}

fn optional_string(item: &Value, key: &str, path: &str) -> Result<(), String> {
    match item.get(key) {
        None | Some(Value::Null) => Ok(()),
        Some(v) if v.is_string() => Ok(()),
        Some(_) => Err(format!("{}.{} must be a string", path, key)),
    }
}

/// Stat values arrive as numbers or preformatted strings ("12,000+").
fn require_scalar(item: &Value, key: &str, path: &str) -> Result<(), String> {
    match item.get(key) {
        Some(v) if v.is_string() || v.is_number() => Ok(()),
        Some(_) => Err(format!("{}.{} must be a string or number", path, key)),
        None => Err(format!("{} is missing required field '{}'", path, key)),
    }
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Renderers
// ============================================================================

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn str_field<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(|v| v.as_str())
}

fn heading(view: &SectionView<'_>) -> String {
    view.title
        .map(|t| format!("<h2>{}</h2>\n", escape_html(t)))
        .unwrap_or_default()
}

fn render_hero(view: &SectionView<'_>) -> String {
    let title = view
        .title
        .or_else(|| str_field(view.data, "title"))
        .unwrap_or_default();
    let subtitle = view
        .content
        .or_else(|| str_field(view.data, "subtitle"))
        .unwrap_or_default();
    let image = str_field(view.data, "image")
        .map(|url| format!("<img src=\"{}\" alt=\"\">\n", escape_html(url)))
        .unwrap_or_default();
    format!(
        "<section class=\"hero\">\n<h1>{}</h1>\n<p>{}</p>\n{}</section>\n",
        escape_html(title),
        escape_html(subtitle),
        image
    )
}

fn render_content(view: &SectionView<'_>) -> String {
    // Content body is admin-authored HTML and passes through as-is.
    format!(
        "<section class=\"content\">\n{}{}\n</section>\n",
        heading(view),
        view.content.unwrap_or_default()
    )
}

fn render_cards(view: &SectionView<'_>) -> String {
    let mut out = format!("<section class=\"cards\">\n{}", heading(view));
    if let Some(cards) = view.data.get("cards").and_then(|v| v.as_array()) {
        for card in cards {
            let icon = str_field(card, "icon")
                .map(|i| format!("<span class=\"icon\">{}</span>", escape_html(i)))
                .unwrap_or_default();
            out.push_str(&format!(
                "<div class=\"card\">{}<h3>{}</h3><p>{}</p></div>\n",
                icon,
                escape_html(str_field(card, "title").unwrap_or_default()),
                escape_html(str_field(card, "description").unwrap_or_default()),
            ));
        }
    }
    out.push_str("</section>\n");
    out
}

fn render_stats(view: &SectionView<'_>) -> String {
    let mut out = format!("<section class=\"stats\">\n{}", heading(view));
    if let Some(stats) = view.data.get("stats").and_then(|v| v.as_array()) {
        for stat in stats {
            let value = match stat.get("value") {
                Some(Value::String(s)) => escape_html(s),
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            };
            let description = str_field(stat, "description")
                .map(|d| format!("<p>{}</p>", escape_html(d)))
                .unwrap_or_default();
            out.push_str(&format!(
                "<div class=\"stat\"><strong>{}</strong><span>{}</span>{}</div>\n",
                value,
                escape_html(str_field(stat, "label").unwrap_or_default()),
                description,
            ));
        }
    }
    out.push_str("</section>\n");
    out
}

fn render_gallery(view: &SectionView<'_>) -> String {
    let mut out = format!("<section class=\"gallery\">\n{}", heading(view));
    if let Some(images) = view.data.get("images").and_then(|v| v.as_array()) {
        for image in images {
            let (url, caption) = match image {
                Value::String(s) => (s.as_str(), ""),
                obj => (
                    str_field(obj, "url").unwrap_or_default(),
                    str_field(obj, "caption").unwrap_or_default(),
                ),
            };
            out.push_str(&format!(
                "<figure><img src=\"{}\" alt=\"{}\"></figure>\n",
                escape_html(url),
                escape_html(caption),
            ));
        }
    }
    out.push_str("</section>\n");
    out
}

fn render_contact(view: &SectionView<'_>) -> String {
    let mut out = format!("<section class=\"contact\">\n{}", heading(view));
    for key in ["address", "phone", "email", "hours"] {
        if let Some(value) = str_field(view.data, key) {
            out.push_str(&format!(
                "<p class=\"{}\">{}</p>\n",
                key,
                escape_html(value)
            ));
        }
    }
    out.push_str("</section>\n");
    out
}

fn render_accordion(view: &SectionView<'_>) -> String {
    let mut out = format!("<section class=\"accordion\">\n{}", heading(view));
    if let Some(items) = view.data.get("items").and_then(|v| v.as_array()) {
        for item in items {
            let tags = item
                .get("tags")
                .and_then(|v| v.as_array())
                .map(|tags| {
                    tags.iter()
                        .filter_map(|t| t.as_str())
                        .map(|t| format!("<span class=\"tag\">{}</span>", escape_html(t)))
                        .collect::<String>()
                })
                .unwrap_or_default();
            out.push_str(&format!(
                "<details><summary>{}</summary><p>{}</p>{}</details>\n",
                escape_html(str_field(item, "title").unwrap_or_default()),
                escape_html(str_field(item, "description").unwrap_or_default()),
                tags,
            ));
        }
    }
    out.push_str("</section>\n");
    out
}

fn render_grid(view: &SectionView<'_>) -> String {
    let mut out = format!("<section class=\"grid\">\n{}", heading(view));
    if let Some(items) = view.data.get("items").and_then(|v| v.as_array()) {
        for item in items {
            let count = match item.get("count") {
                Some(Value::Number(n)) => format!("<span class=\"count\">{}</span>", n),
                Some(Value::String(s)) => {
                    format!("<span class=\"count\">{}</span>", escape_html(s))
                }
                _ => String::new(),
            };
            out.push_str(&format!(
                "<div class=\"cell\"><h3>{}</h3><p>{}</p>{}</div>\n",
                escape_html(str_field(item, "title").unwrap_or_default()),
                escape_html(str_field(item, "description").unwrap_or_default()),
                count,
            ));
        }
    }
    out.push_str("</section>\n");
    out
}

fn render_timeline(view: &SectionView<'_>) -> String {
    let mut out = format!("<section class=\"timeline\">\n{}", heading(view));
    if let Some(events) = view.data.get("events").and_then(|v| v.as_array()) {
        for event in events {
            out.push_str(&format!(
                "<div class=\"event\"><time>{}</time><h3>{}</h3><p>{}</p></div>\n",
                escape_html(str_field(event, "date").unwrap_or_default()),
                escape_html(str_field(event, "title").unwrap_or_default()),
                escape_html(str_field(event, "description").unwrap_or_default()),
            ));
        }
    }
    out.push_str("</section>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [
            SectionKind::Hero,
            SectionKind::Content,
            SectionKind::Cards,
            SectionKind::Stats,
            SectionKind::Gallery,
            SectionKind::Contact,
            SectionKind::Accordion,
            SectionKind::Grid,
            SectionKind::Timeline,
        ] {
            assert_eq!(SectionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SectionKind::parse("carousel"), None);
    }

    #[test]
    fn test_every_kind_is_registered() {
        for kind in [
            SectionKind::Hero,
            SectionKind::Content,
            SectionKind::Cards,
            SectionKind::Stats,
            SectionKind::Gallery,
            SectionKind::Contact,
            SectionKind::Accordion,
            SectionKind::Grid,
            SectionKind::Timeline,
        ] {
            assert!(REGISTRY.contains_key(&kind), "missing: {}", kind);
        }
    }

    #[test]
    fn test_cards_validation() {
        let good = json!({ "cards": [{ "title": "Preparedness", "description": "Go-bag list", "icon": "bag" }] });
        assert!(validate_data(SectionKind::Cards, &good).is_ok());

        let missing_title = json!({ "cards": [{ "description": "no title" }] });
        assert!(validate_data(SectionKind::Cards, &missing_title).is_err());

        let not_array = json!({ "cards": "nope" });
        assert!(validate_data(SectionKind::Cards, &not_array).is_err());

        let missing_key = json!({ "items": [] });
        assert!(validate_data(SectionKind::Cards, &missing_key).is_err());
    }

    #[test]
    fn test_stats_validation_accepts_number_or_string_values() {
        let numeric = json!({ "stats": [{ "value": 42, "label": "Barangays" }] });
        assert!(validate_data(SectionKind::Stats, &numeric).is_ok());

        let formatted = json!({ "stats": [{ "value": "12,000+", "label": "Residents" }] });
        assert!(validate_data(SectionKind::Stats, &formatted).is_ok());

        let boolean = json!({ "stats": [{ "value": true, "label": "x" }] });
        assert!(validate_data(SectionKind::Stats, &boolean).is_err());
    }

    #[test]
    fn test_accordion_validation_checks_tags() {
        let good = json!({ "items": [{ "title": "Q", "description": "A", "tags": ["flood"] }] });
        assert!(validate_data(SectionKind::Accordion, &good).is_ok());

        let bad_tags = json!({ "items": [{ "title": "Q", "description": "A", "tags": [1] }] });
        assert!(validate_data(SectionKind::Accordion, &bad_tags).is_err());
    }

    #[test]
    fn test_grid_validation() {
        let good = json!({ "items": [{ "title": "Centers", "description": "...", "count": 12 }] });
        assert!(validate_data(SectionKind::Grid, &good).is_ok());

        let bad_count = json!({ "items": [{ "title": "t", "description": "d", "count": [] }] });
        assert!(validate_data(SectionKind::Grid, &bad_count).is_err());
    }

    #[test]
    fn test_freeform_kinds_accept_any_object() {
        let data = json!({ "whatever": [1, 2, 3] });
        for kind in [
            SectionKind::Hero,
            SectionKind::Content,
            SectionKind::Gallery,
            SectionKind::Contact,
            SectionKind::Timeline,
        ] {
            assert!(validate_data(kind, &data).is_ok(), "kind: {}", kind);
        }
        assert!(validate_data(SectionKind::Hero, &json!("scalar")).is_err());
    }

    #[test]
    fn test_render_cards_escapes_text() {
        let data = json!({ "cards": [{ "title": "<b>Bold</b>", "description": "a & b" }] });
        let view = SectionView {
            kind: SectionKind::Cards,
            title: None,
            content: None,
            data: &data,
        };
        let html = render_section(&view);
        assert!(html.contains("&lt;b&gt;Bold&lt;/b&gt;"));
        assert!(html.contains("a &amp; b"));
    }

    #[test]
    fn test_render_tolerates_missing_fields() {
        let empty = json!({});
        for kind in [
            SectionKind::Hero,
            SectionKind::Content,
            SectionKind::Cards,
            SectionKind::Stats,
            SectionKind::Gallery,
            SectionKind::Contact,
            SectionKind::Accordion,
            SectionKind::Grid,
            SectionKind::Timeline,
        ] {
            let view = SectionView {
                kind,
                title: Some("Title"),
                content: None,
                data: &empty,
            };
            let html = render_section(&view);
            assert!(html.contains("<section"), "kind: {}", kind);
        }
    }

    #[test]
    fn test_render_stats_order_preserved() {
        let data = json!({ "stats": [
            { "value": 1, "label": "first" },
            { "value": 2, "label": "second" }
        ]});
        let view = SectionView {
            kind: SectionKind::Stats,
            title: None,
            content: None,
            data: &data,
        };
        let html = render_section(&view);
        let first = html.find("first").unwrap();
        let second = html.find("second").unwrap();
        assert!(first < second);
    }
}
