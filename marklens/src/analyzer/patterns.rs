//! Pattern sweep: hidden zones, metadata blocks, custom annotations, and
//! structural/content markers, each reported with position and context.
//!
//! Hidden zones additionally get a typed extraction pass
//! ([`extract_hidden_zones`]) that splits collapsible sections into summary
//! and body, which the flat group matches cannot express.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::content::count_words;

const CONTEXT_WINDOW: usize = 100;

/// One regex group, keyed by the name it reports under.
struct PatternGroup {
    name: &'static str,
    patterns: Vec<Regex>,
}

static PATTERN_GROUPS: Lazy<Vec<PatternGroup>> = Lazy::new(|| {
    let compile = |exprs: &[&str]| -> Vec<Regex> {
        exprs
            .iter()
            .map(|e| Regex::new(e).unwrap())
            .collect()
    };

    vec![
        PatternGroup {
            name: "hidden_zones",
            patterns: compile(&[
                r"(?s)<!--\s*(.*?)\s*-->",
                r"(?s)<details[^>]*>(.*?)</details>",
                r"\[comment\]:\s*#\s*\((.*?)\)",
            ]),
        },
        PatternGroup {
            name: "metadata_blocks",
            patterns: compile(&[
                r"(?s)\A---\n(.*?)\n---",
                r"(?s)\A\+\+\+\n(.*?)\n\+\+\+",
                r"(?ms)^```(?:json|yaml|toml)\n(.*?)\n```",
            ]),
        },
        PatternGroup {
            name: "custom_annotations",
            patterns: compile(&[
                r"\[\[([^\]]+)\]\]",
                r"@(\w+)(?:\(([^)]+)\))?",
                r"::([^:\n]+)::",
                r"\{\{([^}]+)\}\}",
                r"%%([^%]+)%%",
            ]),
        },
        PatternGroup {
            name: "structural_patterns",
            patterns: compile(&[
                r"(?m)^(#{1,6})\s+(.+)$",
                r"(?m)^\s*[-*+]\s+(.+)$",
                r"(?m)^\s*\d+\.\s+(.+)$",
                r"(?m)^\s*\|.*\|\s*$",
                r"(?m)^>\s+(.+)$",
                r"(?m)^\s*---+\s*$",
            ]),
        },
        PatternGroup {
            name: "content_patterns",
            patterns: compile(&[
                r"\*\*([^*]+)\*\*",
                r"`([^`]+)`",
                r"~~([^~]+)~~",
                r"\[([^\]]+)\]\(([^)]+)\)",
                r"https?://[^\s)]+",
                r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            ]),
        },
    ]
});

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchMetadata {
    pub length: usize,
    pub word_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_level: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatting: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternMatch {
    pub group: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub context: String,
    pub metadata: MatchMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HiddenZoneKind {
    HtmlComment,
    Collapsible,
    ReferenceComment,
}

/// One region of the document that renderers hide: an HTML comment, a
/// `<details>` block, or a reference-style comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiddenZone {
    #[serde(rename = "type")]
    pub kind: HiddenZoneKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub raw: String,
    pub line: usize,
    pub start: usize,
    pub end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Typed sweep over the hidden regions, ordered by position.
pub fn extract_hidden_zones(raw: &str) -> Vec<HiddenZone> {
    static HTML_COMMENT: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?s)<!--\s*(.*?)\s*-->").unwrap());
    static COLLAPSIBLE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?s)<details[^>]*>\s*<summary>(.*?)</summary>(.*?)</details>").unwrap()
    });
    static REFERENCE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\[comment\]:\s*#\s*\((.*?)\)").unwrap());

    let line_of = |pos: usize| raw[..pos].matches('\n').count() + 1;
    let mut zones = Vec::new();

    for caps in HTML_COMMENT.captures_iter(raw) {
        let Some(m) = caps.get(0) else { continue };
        zones.push(HiddenZone {
            kind: HiddenZoneKind::HtmlComment,
            content: caps[1].trim().to_string(),
            summary: None,
            raw: m.as_str().to_string(),
            line: line_of(m.start()),
            start: m.start(),
            end: m.end(),
            context: Some(line_prefix(raw, m.start())),
        });
    }

    for caps in COLLAPSIBLE.captures_iter(raw) {
        let Some(m) = caps.get(0) else { continue };
        zones.push(HiddenZone {
            kind: HiddenZoneKind::Collapsible,
            content: caps[2].trim().to_string(),
            summary: Some(caps[1].trim().to_string()),
            raw: m.as_str().to_string(),
            line: line_of(m.start()),
            start: m.start(),
            end: m.end(),
            context: None,
        });
    }

    for caps in REFERENCE.captures_iter(raw) {
        let Some(m) = caps.get(0) else { continue };
        zones.push(HiddenZone {
            kind: HiddenZoneKind::ReferenceComment,
            content: caps[1].trim().to_string(),
            summary: None,
            raw: m.as_str().to_string(),
            line: line_of(m.start()),
            start: m.start(),
            end: m.end(),
            context: None,
        });
    }

    zones.sort_by_key(|z| (z.start, z.end));
    zones
}

/// The part of the surrounding line that precedes `pos`.
fn line_prefix(raw: &str, pos: usize) -> String {
    raw[..pos]
        .rsplit('\n')
        .next()
        .unwrap_or("")
        .to_string()
}

/// Run every pattern group over the document. Keys are group names; groups
/// with no hits still appear with an empty list so consumers can rely on the
/// shape.
pub fn detect_patterns(raw: &str) -> BTreeMap<String, Vec<PatternMatch>> {
    let mut detected: BTreeMap<String, Vec<PatternMatch>> = BTreeMap::new();

    for group in PATTERN_GROUPS.iter() {
        let entry = detected.entry(group.name.to_string()).or_default();
        for pattern in &group.patterns {
            for m in pattern.find_iter(raw) {
                entry.push(PatternMatch {
                    group: group.name.to_string(),
                    text: m.as_str().to_string(),
                    start: m.start(),
                    end: m.end(),
                    line: raw[..m.start()].matches('\n').count() + 1,
                    context: context_around(raw, m.start(), m.end()),
                    metadata: match_metadata(m.as_str(), group.name),
                });
            }
        }
        entry.sort_by_key(|m| (m.start, m.end));
    }

    detected
}

fn context_around(raw: &str, start: usize, end: usize) -> String {
    let mut lo = start.saturating_sub(CONTEXT_WINDOW);
    let mut hi = (end + CONTEXT_WINDOW).min(raw.len());
    // Snap to char boundaries; the window is byte-based.
    while lo > 0 && !raw.is_char_boundary(lo) {
        lo -= 1;
    }
    while hi < raw.len() && !raw.is_char_boundary(hi) {
        hi += 1;
    }
    raw[lo..hi].trim().to_string()
}

fn match_metadata(text: &str, group: &str) -> MatchMetadata {
    static HEADER_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#+").unwrap());
    static ORDERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+\.").unwrap());

    let mut meta = MatchMetadata {
        length: text.chars().count(),
        word_count: count_words(text),
        ..Default::default()
    };

    match group {
        "structural_patterns" => {
            if let Some(run) = HEADER_RUN.find(text) {
                meta.header_level = Some(run.len());
            } else if text.trim_start().starts_with(['-', '*', '+'])
                && !text.trim().chars().all(|c| c == '-' || c.is_whitespace())
            {
                meta.list_kind = Some("unordered".to_string());
            } else if ORDERED.is_match(text) {
                meta.list_kind = Some("ordered".to_string());
            }
        }
        "content_patterns" => {
            if text.contains("**") {
                meta.formatting = Some("bold".to_string());
            } else if text.contains('`') {
                meta.formatting = Some("code".to_string());
            } else if text.contains("~~") {
                meta.formatting = Some("strikethrough".to_string());
            }
        }
        _ => {}
    }

    meta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_zones_find_html_comments_and_details() {
        let doc = "text\n<!-- secret note -->\n<details><summary>More</summary>body</details>\n[comment]: # (ref comment)\n";
        let detected = detect_patterns(doc);
        let hidden = &detected["hidden_zones"];
        assert_eq!(hidden.len(), 3);
        assert!(hidden[0].text.contains("secret note"));
        assert_eq!(hidden[0].line, 2);
    }

    #[test]
    fn typed_zones_cover_all_three_shapes() {
        let doc = "intro <!-- hidden note -->\n<details open>\n<summary>Click</summary>\nbody text\n</details>\n[comment]: # (tracked)\n";
        let zones = extract_hidden_zones(doc);
        assert_eq!(zones.len(), 3);

        assert_eq!(zones[0].kind, HiddenZoneKind::HtmlComment);
        assert_eq!(zones[0].content, "hidden note");
        assert_eq!(zones[0].line, 1);
        assert_eq!(zones[0].context.as_deref(), Some("intro "));

        assert_eq!(zones[1].kind, HiddenZoneKind::Collapsible);
        assert_eq!(zones[1].summary.as_deref(), Some("Click"));
        assert_eq!(zones[1].content, "body text");
        assert_eq!(zones[1].line, 2);

        assert_eq!(zones[2].kind, HiddenZoneKind::ReferenceComment);
        assert_eq!(zones[2].content, "tracked");
    }

    #[test]
    fn typed_zones_serialize_with_a_type_tag() {
        let zones = extract_hidden_zones("<!-- a -->\n");
        let value = serde_json::to_value(&zones).unwrap();
        assert_eq!(value[0]["type"], "html_comment");
        assert!(value[0].get("summary").is_none());
    }

    #[test]
    fn frontmatter_is_a_metadata_block_only_at_document_start() {
        let doc = "---\ntitle: x\n---\nbody\n";
        let detected = detect_patterns(doc);
        assert_eq!(detected["metadata_blocks"].len(), 1);

        let later = "body\n\n---\ntitle: x\n---\n";
        let detected = detect_patterns(later);
        assert!(detected["metadata_blocks"].is_empty());
    }

    #[test]
    fn annotations_capture_wiki_links_and_variables() {
        let doc = "See [[other-note]] and {{version}} with @deprecated(2.0)\n";
        let detected = detect_patterns(doc);
        let texts: Vec<&str> = detected["custom_annotations"]
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert!(texts.contains(&"[[other-note]]"));
        assert!(texts.contains(&"{{version}}"));
        assert!(texts.contains(&"@deprecated(2.0)"));
    }

    #[test]
    fn structural_metadata_reports_header_level_and_list_kind() {
        let doc = "## Two\n- bullet\n3. third\n";
        let detected = detect_patterns(doc);
        let structural = &detected["structural_patterns"];
        assert!(structural
            .iter()
            .any(|m| m.metadata.header_level == Some(2)));
        assert!(structural
            .iter()
            .any(|m| m.metadata.list_kind.as_deref() == Some("unordered")));
        assert!(structural
            .iter()
            .any(|m| m.metadata.list_kind.as_deref() == Some("ordered")));
    }

    #[test]
    fn content_patterns_tag_formatting() {
        let doc = "**bold** and `code` and https://example.com and a@b.io\n";
        let detected = detect_patterns(doc);
        let content = &detected["content_patterns"];
        assert!(content
            .iter()
            .any(|m| m.metadata.formatting.as_deref() == Some("bold")));
        assert!(content.iter().any(|m| m.text == "https://example.com"));
        assert!(content.iter().any(|m| m.text == "a@b.io"));
    }

    #[test]
    fn matches_are_ordered_by_position_within_a_group() {
        let doc = "`late`? no: **first** then `second`\n";
        let detected = detect_patterns(doc);
        let content = &detected["content_patterns"];
        for pair in content.windows(2) {
            assert!(pair[0].start <= pair[1].start);
        }
    }

    #[test]
    fn empty_groups_are_present() {
        let detected = detect_patterns("plain words only\n");
        assert!(detected.contains_key("hidden_zones"));
        assert!(detected["hidden_zones"].is_empty());
    }
}
