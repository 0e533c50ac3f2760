use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Markers read as a missing value, matching common spreadsheet exports.
pub const DEFAULT_NA_VALUES: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "null", "NULL", "None", "#N/A", "<NA>",
];

/// Options controlling ingestion and schema inference.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Field delimiter for delimited text.
    pub delimiter: char,
    /// Raw field values treated as missing.
    pub na_values: Vec<String>,
    /// Try text columns as dates during inference.
    pub parse_dates: bool,
    /// Worksheet to read from Excel workbooks (first sheet when `None`).
    pub sheet: Option<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            na_values: DEFAULT_NA_VALUES.iter().map(|s| s.to_string()).collect(),
            parse_dates: true,
            sheet: None,
        }
    }
}

impl LoadOptions {
    /// Read options from a JSON file; absent fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).context("parsing config JSON")
    }

    pub fn is_na(&self, raw: &str) -> bool {
        self.na_values.iter().any(|na| na == raw)
    }

    /// Delimiter as a single byte, as the CSV reader needs it.
    pub fn delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .with_context(|| format!("delimiter {:?} is not a single ASCII character", self.delimiter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let opts: LoadOptions = serde_json::from_str(r#"{ "delimiter": ";" }"#).unwrap();
        assert_eq!(opts.delimiter, ';');
        assert!(opts.parse_dates);
        assert!(opts.is_na("NA"));
        assert!(!opts.is_na("0"));
    }

    #[test]
    fn rejects_non_ascii_delimiter() {
        let opts = LoadOptions {
            delimiter: '§',
            ..Default::default()
        };
        assert!(opts.delimiter_byte().is_err());
    }
}
