//! Structural extraction: headers, links, images, code blocks, tables,
//! lists, and the nested section tree.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").unwrap());
static IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").unwrap());
static FENCED_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?ms)^```(\w+)?\n(.*?)\n```").unwrap());
static TABLE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\|.*\|").unwrap());
static ORDERED_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)\.\s+(.+)").unwrap());
static UNORDERED_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[-*+]\s+(.+)").unwrap());
static NON_ANCHOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub level: usize,
    pub text: String,
    pub line: usize,
    pub raw: String,
    pub anchor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub text: String,
    pub url: String,
    pub line: usize,
    pub raw: String,
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub alt_text: String,
    pub url: String,
    pub line: usize,
    pub raw: String,
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeBlock {
    pub language: String,
    pub content: String,
    pub line: usize,
    pub line_count: usize,
    pub char_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub rows: Vec<String>,
    pub line_start: usize,
    pub line_end: usize,
    pub row_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Ordered,
    Unordered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListItem {
    pub kind: ListKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,
    pub content: String,
    pub line: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct List {
    pub kind: ListKind,
    pub items: Vec<ListItem>,
    pub line_start: usize,
    pub line_end: usize,
    pub item_count: usize,
}

/// A header-delimited section with its body text, nested by header level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub level: usize,
    pub content: String,
    pub line_start: usize,
    pub line_end: usize,
    pub subsections: Vec<Section>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentStructure {
    pub headers: Vec<Header>,
    pub links: Vec<Link>,
    pub images: Vec<Image>,
    pub code_blocks: Vec<CodeBlock>,
    pub tables: Vec<Table>,
    pub lists: Vec<List>,
    pub sections: Vec<Section>,
}

pub fn extract_structure(raw: &str) -> DocumentStructure {
    DocumentStructure {
        headers: extract_headers(raw),
        links: extract_links(raw),
        images: extract_images(raw),
        code_blocks: extract_code_blocks(raw),
        tables: extract_tables(raw),
        lists: extract_lists(raw),
        sections: extract_sections(raw),
    }
}

/// First H1 text, falling back to a frontmatter `title:` key, then the first
/// header of any level.
pub fn extract_title(raw: &str) -> Option<String> {
    static H1: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#\s+(.+)").unwrap());
    static FRONTMATTER_TITLE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"(?s)^---\n.*?title:\s*["']?([^"'\n]+)["']?.*?\n---"#).unwrap());
    static ANY_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+(.+)").unwrap());

    H1.captures(raw)
        .or_else(|| FRONTMATTER_TITLE.captures(raw))
        .or_else(|| ANY_HEADER.captures(raw))
        .map(|c| c[1].trim().to_string())
}

fn extract_headers(raw: &str) -> Vec<Header> {
    raw.lines()
        .enumerate()
        .filter_map(|(i, line)| {
            HEADER.captures(line).map(|c| Header {
                level: c[1].len(),
                text: c[2].trim().to_string(),
                line: i + 1,
                raw: line.to_string(),
                anchor: anchor_for(&c[2]),
            })
        })
        .collect()
}

/// GitHub-style anchor slug.
fn anchor_for(text: &str) -> String {
    NON_ANCHOR
        .replace_all(&text.to_lowercase(), "")
        .replace(' ', "-")
}

fn extract_links(raw: &str) -> Vec<Link> {
    LINK.find_iter(raw)
        // Skip image syntax; `!` immediately before the bracket.
        .filter(|m| m.start() == 0 || raw.as_bytes()[m.start() - 1] != b'!')
        .filter_map(|m| {
            let caps = LINK.captures(m.as_str())?;
            Some(Link {
                text: caps[1].to_string(),
                url: caps[2].to_string(),
                line: line_of(raw, m.start()),
                raw: m.as_str().to_string(),
                context: line_context(raw, m.start()),
            })
        })
        .collect()
}

fn extract_images(raw: &str) -> Vec<Image> {
    IMAGE
        .captures_iter(raw)
        .filter_map(|caps| {
            let m = caps.get(0)?;
            Some(Image {
                alt_text: caps[1].to_string(),
                url: caps[2].to_string(),
                line: line_of(raw, m.start()),
                raw: m.as_str().to_string(),
                context: line_context(raw, m.start()),
            })
        })
        .collect()
}

fn extract_code_blocks(raw: &str) -> Vec<CodeBlock> {
    FENCED_CODE
        .captures_iter(raw)
        .filter_map(|caps| {
            let m = caps.get(0)?;
            let body = caps.get(2).map_or("", |b| b.as_str());
            Some(CodeBlock {
                language: caps
                    .get(1)
                    .map_or_else(|| "text".to_string(), |l| l.as_str().to_string()),
                content: body.to_string(),
                line: line_of(raw, m.start()),
                line_count: body.matches('\n').count() + 1,
                char_count: body.chars().count(),
            })
        })
        .collect()
}

fn extract_tables(raw: &str) -> Vec<Table> {
    let mut tables = Vec::new();
    let mut rows: Vec<String> = Vec::new();
    let mut start = 0;

    for (i, line) in raw.lines().enumerate() {
        if TABLE_ROW.is_match(line) {
            if rows.is_empty() {
                start = i + 1;
            }
            rows.push(line.trim().to_string());
        } else if !rows.is_empty() {
            tables.push(Table {
                row_count: rows.len(),
                rows: std::mem::take(&mut rows),
                line_start: start,
                line_end: i,
            });
        }
    }
    if !rows.is_empty() {
        let line_end = start + rows.len() - 1;
        tables.push(Table {
            row_count: rows.len(),
            rows,
            line_start: start,
            line_end,
        });
    }

    tables
}

fn extract_lists(raw: &str) -> Vec<List> {
    let mut lists = Vec::new();
    let mut items: Vec<ListItem> = Vec::new();
    let mut start = 0;
    let mut kind = ListKind::Unordered;

    let flush = |items: &mut Vec<ListItem>, kind: ListKind, start: usize, end: usize, out: &mut Vec<List>| {
        if items.is_empty() {
            return;
        }
        out.push(List {
            kind,
            item_count: items.len(),
            items: std::mem::take(items),
            line_start: start,
            line_end: end,
        });
    };

    for (i, line) in raw.lines().enumerate() {
        if let Some(caps) = ORDERED_ITEM.captures(line) {
            if items.is_empty() {
                start = i + 1;
                kind = ListKind::Ordered;
            }
            items.push(ListItem {
                kind: ListKind::Ordered,
                number: caps[1].parse().ok(),
                content: caps[2].to_string(),
                line: i + 1,
            });
        } else if let Some(caps) = UNORDERED_ITEM.captures(line) {
            if items.is_empty() {
                start = i + 1;
                kind = ListKind::Unordered;
            }
            items.push(ListItem {
                kind: ListKind::Unordered,
                number: None,
                content: caps[1].to_string(),
                line: i + 1,
            });
        } else {
            flush(&mut items, kind, start, i, &mut lists);
        }
    }
    let total_lines = raw.lines().count();
    flush(&mut items, kind, start, total_lines, &mut lists);

    lists
}

/// Split on headers, attach body text to each, then nest by level: a section
/// becomes a child of the nearest preceding section with a smaller level.
pub fn extract_sections(raw: &str) -> Vec<Section> {
    let lines: Vec<&str> = raw.lines().collect();
    let mut flat: Vec<Section> = Vec::new();
    let mut body: Vec<&str> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = HEADER.captures(line) {
            if let Some(prev) = flat.last_mut() {
                prev.content = body.join("\n").trim().to_string();
                prev.line_end = i;
            }
            body.clear();
            flat.push(Section {
                title: caps[2].trim().to_string(),
                level: caps[1].len(),
                content: String::new(),
                line_start: i + 1,
                line_end: i + 1,
                subsections: Vec::new(),
            });
        } else if !flat.is_empty() {
            body.push(line);
        }
    }
    if let Some(last) = flat.last_mut() {
        last.content = body.join("\n").trim().to_string();
        last.line_end = lines.len();
    }

    build_hierarchy(flat)
}

fn build_hierarchy(flat: Vec<Section>) -> Vec<Section> {
    let mut iter = flat.into_iter().peekable();
    build_subtree(&mut iter, 0)
}

fn build_subtree(
    iter: &mut std::iter::Peekable<std::vec::IntoIter<Section>>,
    parent_level: usize,
) -> Vec<Section> {
    let mut out = Vec::new();
    while iter.peek().is_some_and(|next| next.level > parent_level) {
        let Some(mut section) = iter.next() else { break };
        section.subsections = build_subtree(iter, section.level);
        out.push(section);
    }
    out
}

fn line_of(raw: &str, offset: usize) -> usize {
    raw[..offset.min(raw.len())].matches('\n').count() + 1
}

/// Text of the line a match starts on, up to the match itself.
fn line_context(raw: &str, offset: usize) -> String {
    raw[..offset]
        .rsplit('\n')
        .next()
        .unwrap_or("")
        .to_string()
}
