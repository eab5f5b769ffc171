//! Semantic pass: document classification, mentioned technologies,
//! complexity scoring, and task/version/date mining.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::content::{DocumentContent, extract_sentences};

static DOC_TYPE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("readme", Regex::new(r"(?i)(readme|getting\s+started|installation|setup)").unwrap()),
        ("documentation", Regex::new(r"(?i)(api|documentation|docs|reference|guide)").unwrap()),
        ("tutorial", Regex::new(r"(?i)(tutorial|walkthrough|step\s+\d+|lesson)").unwrap()),
        ("changelog", Regex::new(r"(?i)(changelog|release\s+notes|version\s+history)").unwrap()),
        ("license", Regex::new(r"(?i)(license|copyright|terms)").unwrap()),
        ("contributing", Regex::new(r"(?i)(contributing|contribution|pull\s+request)").unwrap()),
        ("configuration", Regex::new(r"(?i)(config|configuration|settings|env)").unwrap()),
    ]
});

static TECH_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "languages",
            Regex::new(r"(?i)\b(python|javascript|typescript|java|c\+\+|c#|rust|go|kotlin|swift|php|ruby)\b").unwrap(),
        ),
        (
            "frameworks",
            Regex::new(r"(?i)\b(react|vue|angular|django|flask|fastapi|express|spring|laravel)\b").unwrap(),
        ),
        (
            "tools",
            Regex::new(r"(?i)\b(docker|kubernetes|git|npm|pip|yarn|webpack|babel|eslint)\b").unwrap(),
        ),
        (
            "platforms",
            Regex::new(r"(?i)\b(aws|azure|gcp|heroku|vercel|netlify|github|gitlab)\b").unwrap(),
        ),
    ]
});

static TODO_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)(todo|fixme|hack|xxx|note):\s*(.+)").unwrap(),
        Regex::new(r"(?i)<!--\s*(todo|fixme)\s*:?\s*(.+?)\s*-->").unwrap(),
        Regex::new(r"(?i)\[\s*(todo|fixme)\s*\]\s*(.+)").unwrap(),
    ]
});

static VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"v?\d+\.\d+\.\d+(?:-[a-zA-Z0-9]+)?").unwrap());
static DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}/\d{4}").unwrap());
static CODE_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?ms)^```.*?```").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`[^`]+`").unwrap());
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").unwrap());

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Technologies {
    pub languages: Vec<String>,
    pub frameworks: Vec<String>,
    pub tools: Vec<String>,
    pub platforms: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Complexity {
    /// Flesch reading-ease estimate, clamped to 0..=100.
    pub readability_score: f64,
    pub technical_density: usize,
    pub structure_complexity: f64,
    pub code_to_text_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    pub kind: String,
    pub content: String,
    pub line: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticAnalysis {
    pub document_types: Vec<String>,
    pub primary_type: String,
    pub technologies: Technologies,
    pub complexity: Complexity,
    pub todos: Vec<TodoItem>,
    pub versions: Vec<String>,
    pub dates: Vec<String>,
}

pub fn analyze_semantics(raw: &str, content: &DocumentContent) -> SemanticAnalysis {
    let document_types: Vec<String> = DOC_TYPE_PATTERNS
        .iter()
        .filter(|(_, pattern)| pattern.is_match(raw))
        .map(|(name, _)| name.to_string())
        .collect();
    let primary_type = document_types
        .first()
        .cloned()
        .unwrap_or_else(|| "general".to_string());

    let technologies = detect_technologies(raw);
    let technical_density = technologies.languages.len() + technologies.frameworks.len();

    let complexity = Complexity {
        readability_score: readability_score(&content.plain_text),
        technical_density,
        structure_complexity: content.paragraphs.len() as f64
            / (content.word_count as f64 / 100.0).max(1.0),
        code_to_text_ratio: code_to_text_ratio(raw),
    };

    SemanticAnalysis {
        document_types,
        primary_type,
        technologies,
        complexity,
        todos: extract_todos(raw),
        versions: unique_sorted(VERSION.find_iter(raw).map(|m| m.as_str().to_string())),
        dates: unique_sorted(DATE.find_iter(raw).map(|m| m.as_str().to_string())),
    }
}

fn detect_technologies(raw: &str) -> Technologies {
    let mut tech = Technologies::default();
    for (name, pattern) in TECH_PATTERNS.iter() {
        let found = unique_sorted(pattern.find_iter(raw).map(|m| m.as_str().to_lowercase()));
        match *name {
            "languages" => tech.languages = found,
            "frameworks" => tech.frameworks = found,
            "tools" => tech.tools = found,
            _ => tech.platforms = found,
        }
    }
    tech
}

/// Flesch reading ease with a heuristic syllable counter. Rough, but stable
/// enough to compare documents against each other.
pub fn readability_score(plain_text: &str) -> f64 {
    if plain_text.trim().is_empty() {
        return 0.0;
    }

    let sentences = extract_sentences(plain_text).len().max(1);
    let words: Vec<&str> = WORD.find_iter(plain_text).map(|m| m.as_str()).collect();
    if words.is_empty() {
        return 0.0;
    }
    let syllables: usize = words.iter().map(|w| count_syllables(w)).sum();

    let avg_sentence_length = words.len() as f64 / sentences as f64;
    let avg_syllables = syllables as f64 / words.len() as f64;

    let score = 206.835 - (1.015 * avg_sentence_length) - (84.6 * avg_syllables);
    score.clamp(0.0, 100.0)
}

/// Vowel-group count with a silent trailing `e` adjustment; at least one
/// syllable per word.
fn count_syllables(word: &str) -> usize {
    let word = word.to_lowercase();
    let mut syllables = 0usize;
    let mut prev_was_vowel = false;

    for c in word.chars() {
        let is_vowel = matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
        if is_vowel && !prev_was_vowel {
            syllables += 1;
        }
        prev_was_vowel = is_vowel;
    }
    if word.ends_with('e') {
        syllables = syllables.saturating_sub(1);
    }

    syllables.max(1)
}

fn code_to_text_ratio(raw: &str) -> f64 {
    let code_chars: usize = CODE_BLOCK
        .find_iter(raw)
        .map(|m| m.as_str().chars().count())
        .chain(INLINE_CODE.find_iter(raw).map(|m| m.as_str().chars().count()))
        .sum();
    code_chars as f64 / (raw.chars().count() as f64).max(1.0)
}

fn extract_todos(raw: &str) -> Vec<TodoItem> {
    let mut todos = Vec::new();
    for pattern in TODO_PATTERNS.iter() {
        for caps in pattern.captures_iter(raw) {
            let Some(m) = caps.get(0) else { continue };
            todos.push(TodoItem {
                kind: caps[1].to_lowercase(),
                content: caps[2].trim().to_string(),
                line: raw[..m.start()].matches('\n').count() + 1,
            });
        }
    }
    todos.sort_by_key(|t| t.line);
    todos
}

fn unique_sorted(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = items.collect();
    out.sort();
    out.dedup();
    out
}
