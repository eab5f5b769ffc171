//! JSON export of a finished [`DocumentReport`].
//!
//! The layout groups the report into `analysis_info` / `document` /
//! `content` / `structure` / `patterns` / `hidden_zones` / `lsp_symbols` so
//! downstream consumers can pick a slice without walking the whole tree.

use std::path::Path;

use serde_json::json;

use crate::analyzer::DocumentReport;

pub const EXPORT_FORMAT_VERSION: &str = "1.0.0";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub fn to_json(report: &DocumentReport) -> serde_json::Value {
    json!({
        "analysis_info": {
            "version": EXPORT_FORMAT_VERSION,
            "analyzer": "marklens",
            "timestamp": report.analyzed_at.to_rfc3339(),
            "file_path": report.file_path,
        },
        "document": {
            "title": report.title,
            "metadata": report.metadata,
            "semantic_analysis": report.semantic,
        },
        "content": {
            "raw_content": report.raw_content,
            "plain_text": report.content.plain_text,
            "paragraphs": report.content.paragraphs,
            "sentences": report.content.sentences,
            "statistics": {
                "word_count": report.content.word_count,
                "character_count": report.content.character_count,
                "paragraph_count": report.content.paragraphs.len(),
                "sentence_count": report.content.sentences.len(),
            },
        },
        "structure": {
            "sections": report.structure.sections,
            "headers": report.structure.headers,
            "links": report.structure.links,
            "images": report.structure.images,
            "code_blocks": report.structure.code_blocks,
            "tables": report.structure.tables,
            "lists": report.structure.lists,
        },
        "patterns": report.patterns,
        "hidden_zones": report.hidden_zones,
        "lsp_symbols": report.symbols,
    })
}

pub fn to_json_string(report: &DocumentReport) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(&to_json(report))?)
}

pub fn write_json(report: &DocumentReport, path: &Path) -> Result<(), ExportError> {
    let body = to_json_string(report)?;
    std::fs::write(path, body).map_err(|source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), "Report exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{
        DocumentMetadata, content, patterns, semantic, structure,
    };

    fn sample_report() -> DocumentReport {
        let raw = "# Sample\n\n<!-- hidden note -->\n\nSome text with `code`.\n";
        let content = content::extract_content(raw);
        let structure = structure::extract_structure(raw);
        let semantic = semantic::analyze_semantics(raw, &content);
        DocumentReport {
            file_path: "/tmp/sample.md".into(),
            title: "Sample".to_string(),
            analyzed_at: chrono::Utc::now(),
            raw_content: raw.to_string(),
            patterns: patterns::detect_patterns(raw),
            hidden_zones: patterns::extract_hidden_zones(raw),
            metadata: DocumentMetadata {
                word_count: content.word_count,
                ..Default::default()
            },
            content,
            structure,
            semantic,
            symbols: Vec::new(),
        }
    }

    #[test]
    fn export_has_the_top_level_sections() {
        let value = to_json(&sample_report());
        for key in [
            "analysis_info",
            "document",
            "content",
            "structure",
            "patterns",
            "hidden_zones",
            "lsp_symbols",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["analysis_info"]["version"], EXPORT_FORMAT_VERSION);
        assert_eq!(value["document"]["title"], "Sample");
    }

    #[test]
    fn hidden_zones_surface_as_their_own_section() {
        let value = to_json(&sample_report());
        let zones = value["hidden_zones"].as_array().unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0]["type"], "html_comment");
        assert_eq!(zones[0]["content"], "hidden note");
        assert!(value["lsp_symbols"].as_array().unwrap().is_empty());
    }

    #[test]
    fn export_round_trips_statistics() {
        let report = sample_report();
        let value = to_json(&report);
        assert_eq!(
            value["content"]["statistics"]["word_count"],
            report.content.word_count
        );
    }

    #[test]
    fn write_json_creates_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("report.json");
        write_json(&sample_report(), &out).unwrap();

        let body = std::fs::read_to_string(&out).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["analysis_info"]["analyzer"], "marklens");
    }
}
