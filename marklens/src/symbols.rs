//! Document symbol types returned by `textDocument/documentSymbol`.
//!
//! Servers may answer with hierarchical `DocumentSymbol[]`, flat
//! `SymbolInformation[]`, or `null`. Both shapes are parsed and flattened
//! into [`Symbol`] records the analyzer can embed in its report.

use serde::{Deserialize, Serialize};

use crate::bridge::{BridgeError, LspClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub uri: String,
    pub range: Range,
}

/// Hierarchical symbol shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSymbol {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub kind: u32,
    pub range: Range,
    pub selection_range: Range,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DocumentSymbol>,
}

/// Flat symbol shape used by older servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInformation {
    pub name: String,
    pub kind: u32,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
}

/// Flattened symbol record, one per symbol regardless of the wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: u32,
    pub kind_name: String,
    pub line: u32,
    /// Nesting depth; always 0 for the flat wire shape.
    pub depth: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

/// Human-readable name for an LSP `SymbolKind` value.
pub fn symbol_kind_name(kind: u32) -> &'static str {
    match kind {
        1 => "file",
        2 => "module",
        3 => "namespace",
        4 => "package",
        5 => "class",
        6 => "method",
        7 => "property",
        8 => "field",
        9 => "constructor",
        10 => "enum",
        11 => "interface",
        12 => "function",
        13 => "variable",
        14 => "constant",
        15 => "string",
        16 => "number",
        17 => "boolean",
        18 => "array",
        19 => "object",
        20 => "key",
        21 => "null",
        22 => "enum_member",
        23 => "struct",
        24 => "event",
        25 => "operator",
        26 => "type_parameter",
        _ => "unknown",
    }
}

/// Flatten a `documentSymbol` result payload into [`Symbol`] records.
/// Unknown or `null` payloads produce an empty list rather than an error;
/// a missing symbol table never fails an analysis.
pub fn parse_symbols(result: &serde_json::Value) -> Vec<Symbol> {
    let Some(items) = result.as_array() else {
        return Vec::new();
    };
    let Some(first) = items.first() else {
        return Vec::new();
    };

    // The two shapes are told apart by which range field is present.
    if first.get("selectionRange").is_some() || first.get("range").is_some() {
        let mut out = Vec::new();
        for item in items {
            match serde_json::from_value::<DocumentSymbol>(item.clone()) {
                Ok(sym) => flatten_document_symbol(&sym, 0, None, &mut out),
                Err(e) => tracing::debug!(error = %e, "Skipping unparseable document symbol"),
            }
        }
        out
    } else {
        items
            .iter()
            .filter_map(|item| {
                serde_json::from_value::<SymbolInformation>(item.clone())
                    .map_err(|e| tracing::debug!(error = %e, "Skipping unparseable symbol information"))
                    .ok()
            })
            .map(|info| Symbol {
                name: info.name,
                kind: info.kind,
                kind_name: symbol_kind_name(info.kind).to_string(),
                line: info.location.range.start.line + 1,
                depth: 0,
                detail: None,
                container: info.container_name,
            })
            .collect()
    }
}

fn flatten_document_symbol(
    sym: &DocumentSymbol,
    depth: usize,
    container: Option<&str>,
    out: &mut Vec<Symbol>,
) {
    out.push(Symbol {
        name: sym.name.clone(),
        kind: sym.kind,
        kind_name: symbol_kind_name(sym.kind).to_string(),
        line: sym.selection_range.start.line + 1,
        depth,
        detail: sym.detail.clone(),
        container: container.map(str::to_string),
    });
    for child in &sym.children {
        flatten_document_symbol(child, depth + 1, Some(&sym.name), out);
    }
}

/// Source of document symbols. The live implementation goes through the
/// language server; tests substitute canned payloads.
#[async_trait::async_trait]
pub trait SymbolSource: Send + Sync {
    async fn document_symbols(
        &self,
        path: &std::path::Path,
        text: &str,
    ) -> Result<Vec<Symbol>, BridgeError>;

    /// Release the underlying connection, if any.
    async fn shutdown(&self);
}

#[async_trait::async_trait]
impl SymbolSource for LspClient {
    async fn document_symbols(
        &self,
        path: &std::path::Path,
        text: &str,
    ) -> Result<Vec<Symbol>, BridgeError> {
        self.open_document(path, text).await?;
        let result = LspClient::document_symbols(self, path).await?;
        Ok(parse_symbols(&result))
    }

    async fn shutdown(&self) {
        if let Err(e) = LspClient::shutdown(self).await {
            tracing::warn!(error = %e, "Language server shutdown failed");
        }
    }
}
