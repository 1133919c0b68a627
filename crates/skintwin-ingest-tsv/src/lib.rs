//! Tabular source reader for SKIN-TWIN hypergraph ingestion
//!
//! Reads the delimiter-separated node and edge tables exported by the
//! network-analysis tooling (`RAW-Nodes.csv`, `RSEdges.csv`, ...):
//! - the first line is the header row and names the fields,
//! - every following line becomes one [`Row`],
//! - cells are trimmed and kept as strings (no type coercion).
//!
//! Numeric interpretation is the caller's job; see [`numeric`] for the
//! lenient helpers used by the edge processor.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub mod numeric;

pub use numeric::{parse_int_prefix, parse_number_or};

/// Tab, by convention of the exported tables.
pub const DEFAULT_DELIMITER: char = '\t';

#[derive(Debug, thiserror::Error)]
pub enum TsvError {
    #[error("required table not found: {}", path.display())]
    Missing { path: PathBuf },
    #[error("failed to read table {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One data row, keyed by header name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    cells: BTreeMap<String, String>,
}

impl Row {
    /// Cell value, or `""` when the column is absent.
    pub fn get(&self, column: &str) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }

    /// Cell value when present and non-empty.
    pub fn field(&self, column: &str) -> Option<&str> {
        let value = self.get(column);
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl FromIterator<(String, String)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Row {
            cells: iter.into_iter().collect(),
        }
    }
}

/// Parse delimiter-separated text into rows.
///
/// Rows shorter than the header resolve their missing trailing cells to `""`;
/// extra trailing cells are ignored. Input with no data rows yields an empty
/// result.
pub fn parse_delimited(text: &str, delimiter: char) -> Vec<Row> {
    let mut lines = text.trim().split('\n');
    let headers: Vec<String> = match lines.next() {
        Some(line) if !line.trim().is_empty() => {
            line.split(delimiter).map(|h| h.trim().to_string()).collect()
        }
        _ => return Vec::new(),
    };

    lines
        .map(|line| {
            let values: Vec<&str> = line.split(delimiter).collect();
            headers
                .iter()
                .enumerate()
                .map(|(i, header)| {
                    let value = values.get(i).map(|v| v.trim()).unwrap_or("");
                    (header.clone(), value.to_string())
                })
                .collect()
        })
        .collect()
}

/// Parse tab-separated text.
pub fn parse_tsv(text: &str) -> Vec<Row> {
    parse_delimited(text, DEFAULT_DELIMITER)
}

/// Read and parse a required tab-separated table from disk.
pub fn read_table(path: &Path) -> Result<Vec<Row>, TsvError> {
    if !path.exists() {
        return Err(TsvError::Missing {
            path: path.to_path_buf(),
        });
    }
    let text = std::fs::read_to_string(path).map_err(|source| TsvError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let rows = parse_tsv(&text);
    tracing::debug!(path = %path.display(), rows = rows.len(), "loaded table");
    Ok(rows)
}
