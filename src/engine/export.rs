//! Export encodings for merged crawl data.
//!
//! The engine serves exports as the raw record list; the handle applies
//! the requested encoding on the caller's side of the RPC, which keeps
//! unsupported formats from ever reaching the runtime loop. CSV is
//! declared but not encoded; callers wanting CSV plug in a custom
//! encoder.

use std::fmt;
use std::sync::Arc;

use crate::error::ScrapexError;
use crate::spider::Record;

/// A caller-provided encoder applied to the merged record list.
pub type Encoder = Arc<dyn Fn(&[Record]) -> Result<String, ScrapexError> + Send + Sync>;

/// Requested encoding of an export.
#[derive(Clone, Default)]
pub enum ExportFormat {
    /// The in-memory record list, unencoded.
    #[default]
    Records,
    /// UTF-8 JSON of the list.
    Json,
    /// Declared but unsupported; export returns an error and the engine
    /// stays idle.
    Csv,
    /// A caller-provided encoder.
    Custom(Encoder),
}

impl fmt::Debug for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Records => f.write_str("Records"),
            ExportFormat::Json => f.write_str("Json"),
            ExportFormat::Csv => f.write_str("Csv"),
            ExportFormat::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// The outcome of an export RPC.
#[derive(Debug, Clone, PartialEq)]
pub enum Exported {
    /// Raw records (`ExportFormat::Records`).
    Records(Vec<Record>),
    /// Encoded text (`Json` or `Custom`).
    Text(String),
}

impl Exported {
    /// Unwraps the raw record list; encoded exports yield nothing.
    pub fn into_records(self) -> Vec<Record> {
        match self {
            Exported::Records(records) => records,
            Exported::Text(_) => Vec::new(),
        }
    }

    /// Unwraps the encoded text; raw exports yield nothing.
    pub fn into_text(self) -> String {
        match self {
            Exported::Text(text) => text,
            Exported::Records(_) => String::new(),
        }
    }
}

/// Rejects formats the engine will not encode, before any drain work.
pub(crate) fn validate(format: &ExportFormat) -> Result<(), ScrapexError> {
    match format {
        ExportFormat::Csv => Err(ScrapexError::UnsupportedFormat("csv".to_string())),
        _ => Ok(()),
    }
}

/// Applies `format` to the merged rows.
pub(crate) fn encode(format: &ExportFormat, rows: Vec<Record>) -> Result<Exported, ScrapexError> {
    match format {
        ExportFormat::Records => Ok(Exported::Records(rows)),
        ExportFormat::Json => Ok(Exported::Text(serde_json::to_string(&rows)?)),
        ExportFormat::Csv => Err(ScrapexError::UnsupportedFormat("csv".to_string())),
        ExportFormat::Custom(encoder) => encoder(&rows).map(Exported::Text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_encodes_the_list() {
        let out = encode(&ExportFormat::Json, vec![json!({"a": 1})]).unwrap();
        assert_eq!(out, Exported::Text(r#"[{"a":1}]"#.to_string()));
    }

    #[test]
    fn csv_is_unsupported() {
        assert!(matches!(
            validate(&ExportFormat::Csv),
            Err(ScrapexError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn custom_encoder_is_applied() {
        let format = ExportFormat::Custom(Arc::new(|rows| Ok(format!("{} rows", rows.len()))));
        let out = encode(&format, vec![json!(1), json!(2)]).unwrap();
        assert_eq!(out, Exported::Text("2 rows".to_string()));
    }
}
