//! Whole-file delimited parser for single-shape sources

use crate::error::{Error, Result};
use crate::table::{CellValue, Column, Row, TidyTable};
use std::fs;
use std::path::Path;

/// How a delimited file is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Field delimiter
    pub delimiter: u8,
    /// Honour double-quote escaping and detect cell types; off keeps every
    /// cell as the exact text read
    pub quoting: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quoting: true,
        }
    }
}

impl ParseOptions {
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self {
            delimiter,
            ..Self::default()
        }
    }
}

/// Decode a named blob as UTF-8 text, dropping a leading byte-order mark
pub fn decode(name: &str, bytes: &[u8]) -> Result<String> {
    let text = String::from_utf8(bytes.to_vec()).map_err(|e| Error::Utf8 {
        name: name.to_string(),
        source: e,
    })?;

    Ok(match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    })
}

/// Parse a delimited file from disk into a table
pub fn parse_file<P: AsRef<Path>>(path: P, options: ParseOptions) -> Result<TidyTable> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let name = path.display().to_string();
    let content = decode(&name, &bytes)?;
    parse_delimited(&content, &name, options)
}

/// Parse delimited text into a table.
///
/// The first record is the header. Every record must have exactly as many
/// fields as the header, otherwise the whole file is rejected. With quoting
/// off, cells are neither trimmed nor typed, so wrapped export lines reach
/// the section markers untouched.
pub fn parse_delimited(content: &str, source_name: &str, options: ParseOptions) -> Result<TidyTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .delimiter(options.delimiter)
        .quoting(options.quoting)
        .from_reader(content.as_bytes());

    let headers = csv_reader.headers().map_err(|e| Error::Csv {
        name: source_name.to_string(),
        source: e,
    })?;

    let columns: Vec<Column> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| Column::new(name.trim().to_string(), i))
        .collect();

    if columns.is_empty() {
        return Err(Error::CsvParse {
            name: source_name.to_string(),
            message: "no columns found".to_string(),
        });
    }

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result.map_err(|e| Error::Csv {
            name: source_name.to_string(),
            source: e,
        })?;

        let cells: Vec<CellValue> = if options.quoting {
            record.iter().map(CellValue::parse).collect()
        } else {
            record.iter().map(verbatim).collect()
        };
        rows.push(Row::new(cells));
    }

    Ok(TidyTable {
        columns,
        rows,
        source: source_name.to_string(),
    })
}

fn verbatim(field: &str) -> CellValue {
    if field.is_empty() {
        CellValue::Empty
    } else {
        CellValue::text(field)
    }
}
