//! marklens: markdown analysis engine backed by a marksman LSP bridge.

pub mod analyzer;
pub mod bridge;
pub mod config;
pub mod export;
pub mod symbols;

pub use analyzer::{AnalyzeError, DocumentReport, MarkdownAnalyzer};
pub use bridge::{BridgeError, ConnectionState, LspClient};
pub use config::{AnalyzerConfig, BridgeConfig};
pub use symbols::{Symbol, SymbolSource};
