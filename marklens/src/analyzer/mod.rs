//! Document analysis pipeline.
//!
//! One [`MarkdownAnalyzer`] per workspace: it owns the optional language
//! server connection, runs the extraction passes over each file, and caches
//! finished reports.

pub mod content;
pub mod patterns;
pub mod semantic;
pub mod structure;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

use crate::bridge::LspClient;
use crate::config::AnalyzerConfig;
use crate::symbols::{Symbol, SymbolSource};
use content::DocumentContent;
use patterns::{HiddenZone, PatternMatch};
use semantic::SemanticAnalysis;
use structure::DocumentStructure;

/// Extensions treated as markdown during batch walks.
const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown", "mdown", "mkd"];

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("document is empty: {0}")]
    EmptyDocument(PathBuf),
}

/// Frontmatter keys merged with derived statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub frontmatter: BTreeMap<String, String>,
    pub word_count: usize,
    pub character_count: usize,
    pub line_count: usize,
    pub paragraph_count: usize,
    pub sentence_count: usize,
    pub reading_time_minutes: usize,
    pub header_count: usize,
    pub link_count: usize,
    pub image_count: usize,
    pub code_block_count: usize,
    pub list_count: usize,
    pub table_count: usize,
}

/// Everything the pipeline knows about one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub file_path: PathBuf,
    pub title: String,
    pub analyzed_at: DateTime<Utc>,
    pub raw_content: String,
    pub content: DocumentContent,
    pub structure: DocumentStructure,
    pub patterns: BTreeMap<String, Vec<PatternMatch>>,
    pub hidden_zones: Vec<HiddenZone>,
    pub semantic: SemanticAnalysis,
    pub metadata: DocumentMetadata,
    pub symbols: Vec<Symbol>,
}

pub struct MarkdownAnalyzer {
    config: AnalyzerConfig,
    symbols: Option<Arc<dyn SymbolSource>>,
    cache: DashMap<PathBuf, Arc<DocumentReport>>,
}

impl MarkdownAnalyzer {
    /// Build the analyzer, connecting to the language server unless disabled.
    /// A server that fails to start degrades to regex-only analysis rather
    /// than failing construction.
    pub async fn connect(config: AnalyzerConfig) -> Self {
        let symbols: Option<Arc<dyn SymbolSource>> = if config.without_lsp {
            tracing::info!("Language server disabled, running regex-only analysis");
            None
        } else {
            match LspClient::start(config.bridge.clone()).await {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    tracing::warn!(error = %e, "Language server unavailable, continuing without symbols");
                    None
                }
            }
        };

        Self {
            config,
            symbols,
            cache: DashMap::new(),
        }
    }

    /// Analyzer with a caller-provided symbol source; used by tests.
    pub fn with_symbol_source(config: AnalyzerConfig, symbols: Arc<dyn SymbolSource>) -> Self {
        Self {
            config,
            symbols: Some(symbols),
            cache: DashMap::new(),
        }
    }

    pub fn has_symbol_source(&self) -> bool {
        self.symbols.is_some()
    }

    /// Full pipeline over one file. Symbol lookup failures degrade to an
    /// empty symbol list; everything else in the report is still produced.
    pub async fn analyze_file(&self, path: &Path) -> Result<Arc<DocumentReport>, AnalyzeError> {
        let file_path = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());
        let raw = std::fs::read_to_string(&file_path).map_err(|source| AnalyzeError::Read {
            path: file_path.clone(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Err(AnalyzeError::EmptyDocument(file_path));
        }

        tracing::info!(path = %file_path.display(), bytes = raw.len(), "Analyzing document");

        let content = content::extract_content(&raw);
        let structure = structure::extract_structure(&raw);
        let patterns = patterns::detect_patterns(&raw);
        let hidden_zones = patterns::extract_hidden_zones(&raw);
        let semantic = semantic::analyze_semantics(&raw, &content);
        let metadata = build_metadata(&raw, &content, &structure);

        let symbols = match &self.symbols {
            Some(source) => match source.document_symbols(&file_path, &raw).await {
                Ok(symbols) => symbols,
                Err(e) => {
                    tracing::warn!(error = %e, "Symbol lookup failed, continuing without symbols");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let report = Arc::new(DocumentReport {
            title: structure::extract_title(&raw).unwrap_or_else(|| "Untitled".to_string()),
            file_path: file_path.clone(),
            analyzed_at: Utc::now(),
            raw_content: raw,
            content,
            structure,
            patterns,
            hidden_zones,
            semantic,
            metadata,
            symbols,
        });

        self.cache.insert(file_path, Arc::clone(&report));
        Ok(report)
    }

    pub fn cached(&self, path: &Path) -> Option<Arc<DocumentReport>> {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.cache.get(&key).map(|r| Arc::clone(&r))
    }

    /// Walk the workspace and analyze every markdown file. Per-file failures
    /// are logged and skipped; the batch itself never fails.
    pub async fn analyze_workspace(&self) -> BTreeMap<PathBuf, Arc<DocumentReport>> {
        let root = self.config.bridge.workspace_root.clone();
        tracing::info!(root = %root.display(), "Starting batch analysis");

        let mut results = BTreeMap::new();
        let mut seen = 0usize;

        for entry in WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if !is_markdown(entry.path()) {
                continue;
            }
            seen += 1;
            match self.analyze_file(entry.path()).await {
                Ok(report) => {
                    results.insert(report.file_path.clone(), report);
                }
                Err(e) => {
                    tracing::error!(path = %entry.path().display(), error = %e, "Skipping file");
                }
            }
        }

        tracing::info!(analyzed = results.len(), seen, "Batch analysis finished");
        results
    }

    /// Stop the language server, if one is connected.
    pub async fn shutdown(&self) {
        if let Some(source) = &self.symbols {
            source.shutdown().await;
        }
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            MARKDOWN_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

fn build_metadata(
    raw: &str,
    content: &DocumentContent,
    structure: &DocumentStructure,
) -> DocumentMetadata {
    DocumentMetadata {
        frontmatter: parse_frontmatter(raw),
        word_count: content.word_count,
        character_count: content.character_count,
        line_count: raw.lines().count(),
        paragraph_count: content.paragraphs.len(),
        sentence_count: content.sentences.len(),
        reading_time_minutes: (content.word_count / 200).max(1),
        header_count: structure.headers.len(),
        link_count: structure.links.len(),
        image_count: structure.images.len(),
        code_block_count: structure.code_blocks.len(),
        list_count: structure.lists.len(),
        table_count: structure.tables.len(),
    }
}

/// Minimal `key: value` parse of a leading YAML frontmatter block. Nested
/// structures are ignored.
fn parse_frontmatter(raw: &str) -> BTreeMap<String, String> {
    static FRONTMATTER: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?s)\A---\n(.*?)\n---").unwrap());

    let mut out = BTreeMap::new();
    if let Some(caps) = FRONTMATTER.captures(raw) {
        for line in caps[1].lines() {
            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim();
                if key.is_empty() || line.starts_with(char::is_whitespace) {
                    continue;
                }
                out.insert(
                    key.to_string(),
                    value.trim().trim_matches(['"', '\'']).to_string(),
                );
            }
        }
    }
    out
}
