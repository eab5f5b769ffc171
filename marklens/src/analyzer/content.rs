//! Prose extraction: markdown stripped to plain text, paragraph records,
//! and sentence splits.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static FENCED_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`[^`]+`").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());
static IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]+\)").unwrap());
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
static STRIKETHROUGH: Lazy<Regex> = Lazy::new(|| Regex::new(r"~~([^~]+)~~").unwrap());
static HEADER_MARK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+").unwrap());
static BULLET_MARK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*[-*+]\s+").unwrap());
static NUMBER_MARK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*\d+\.\s+").unwrap());
static HTML_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").unwrap());
static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParagraphKind {
    Header,
    List,
    NumberedList,
    CodeBlock,
    Table,
    Quote,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paragraph {
    pub index: usize,
    pub content: String,
    pub plain_text: String,
    pub kind: ParagraphKind,
    pub line_start: usize,
    pub line_end: usize,
    pub word_count: usize,
    pub char_count: usize,
}

/// The document's prose, extracted once and shared by the downstream
/// analyses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentContent {
    pub plain_text: String,
    pub paragraphs: Vec<Paragraph>,
    pub sentences: Vec<String>,
    pub word_count: usize,
    pub character_count: usize,
}

pub fn extract_content(raw: &str) -> DocumentContent {
    let plain_text = to_plain_text(raw);
    let paragraphs = extract_paragraphs(raw);
    let sentences = extract_sentences(&plain_text);
    let word_count = count_words(&plain_text);

    DocumentContent {
        plain_text,
        paragraphs,
        sentences,
        word_count,
        character_count: raw.chars().count(),
    }
}

/// Strip markdown syntax down to readable prose. Code blocks and HTML
/// comments are removed entirely; links, images and emphasis keep their
/// visible text.
pub fn to_plain_text(raw: &str) -> String {
    let text = FENCED_CODE.replace_all(raw, "");
    let text = INLINE_CODE.replace_all(&text, "");
    let text = IMAGE.replace_all(&text, "$1");
    let text = LINK.replace_all(&text, "$1");
    let text = BOLD.replace_all(&text, "$1");
    let text = ITALIC.replace_all(&text, "$1");
    let text = STRIKETHROUGH.replace_all(&text, "$1");
    let text = HEADER_MARK.replace_all(&text, "");
    let text = BULLET_MARK.replace_all(&text, "");
    let text = NUMBER_MARK.replace_all(&text, "");
    let text = HTML_COMMENT.replace_all(&text, "");
    let text = BLANK_RUN.replace_all(&text, "\n\n");
    text.trim().to_string()
}

pub fn count_words(text: &str) -> usize {
    WORD.find_iter(text).count()
}

/// Split on blank-line runs, tracking real line numbers from byte offsets.
fn extract_paragraphs(raw: &str) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    let mut offset = 0;
    let mut index = 0;

    let push = |chunk: &str, start_offset: usize, index: &mut usize, out: &mut Vec<Paragraph>| {
        let trimmed = chunk.trim();
        if trimmed.is_empty() {
            return;
        }
        let lead = chunk.len() - chunk.trim_start().len();
        let line_start = line_of(raw, start_offset + lead);
        let line_end = line_start + trimmed.matches('\n').count();
        out.push(Paragraph {
            index: *index,
            content: trimmed.to_string(),
            plain_text: to_plain_text(trimmed),
            kind: classify_paragraph(trimmed),
            line_start,
            line_end,
            word_count: count_words(trimmed),
            char_count: trimmed.chars().count(),
        });
        *index += 1;
    };

    for gap in BLANK_RUN.find_iter(raw) {
        push(&raw[offset..gap.start()], offset, &mut index, &mut paragraphs);
        offset = gap.end();
    }
    push(&raw[offset..], offset, &mut index, &mut paragraphs);

    paragraphs
}

fn classify_paragraph(paragraph: &str) -> ParagraphKind {
    static TABLE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\|.*\|").unwrap());

    if paragraph.starts_with('#') && HEADER_MARK.is_match(paragraph) {
        ParagraphKind::Header
    } else if paragraph.starts_with("```") {
        ParagraphKind::CodeBlock
    } else if NUMBER_MARK.find(paragraph).is_some_and(|m| m.start() == 0) {
        ParagraphKind::NumberedList
    } else if BULLET_MARK.find(paragraph).is_some_and(|m| m.start() == 0) {
        ParagraphKind::List
    } else if TABLE_ROW.is_match(paragraph) {
        ParagraphKind::Table
    } else if paragraph.starts_with("> ") {
        ParagraphKind::Quote
    } else {
        ParagraphKind::Text
    }
}

pub fn extract_sentences(plain_text: &str) -> Vec<String> {
    SENTENCE_END
        .split(plain_text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 1-based line number of a byte offset.
fn line_of(raw: &str, offset: usize) -> usize {
    raw[..offset.min(raw.len())].matches('\n').count() + 1
}
