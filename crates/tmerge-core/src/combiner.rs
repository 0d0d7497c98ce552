//! Combines same-shape tables parsed from several source files

use crate::error::{Error, Result};
use crate::parser::{decode, parse_delimited, ParseOptions};
use crate::report::SkippedFile;
use crate::source::{file_name, SourceFile};
use crate::table::{Row, TidyTable};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Picks a file's delimiter from its name, before anything is parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelimiterPolicy {
    /// Delimiter for files no rule matches
    pub default: char,
    /// First matching rule wins
    #[serde(default)]
    pub rules: Vec<DelimiterRule>,
}

/// Files whose name contains `contains` use `delimiter`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelimiterRule {
    pub contains: String,
    pub delimiter: char,
}

impl Default for DelimiterPolicy {
    fn default() -> Self {
        Self {
            default: ',',
            rules: Vec::new(),
        }
    }
}

impl DelimiterPolicy {
    /// A policy that always answers `delimiter`
    pub fn fixed(delimiter: char) -> Self {
        Self {
            default: delimiter,
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, contains: impl Into<String>, delimiter: char) -> Self {
        self.rules.push(DelimiterRule {
            contains: contains.into(),
            delimiter,
        });
        self
    }

    /// Delimiter for the named file, judged by its last path segment
    pub fn delimiter_for(&self, name: &str) -> char {
        let name = file_name(name);
        self.rules
            .iter()
            .find(|rule| name.contains(&rule.contains))
            .map(|rule| rule.delimiter)
            .unwrap_or(self.default)
    }
}

/// Convert a configured delimiter into the single byte the csv reader wants
pub fn delimiter_byte(delimiter: char, file_name: &str) -> Result<u8> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| Error::CsvParse {
            name: file_name.to_string(),
            message: format!("delimiter '{}' is not a single ASCII byte", delimiter),
        })
}

/// Rows gathered from every file that parsed, plus the files that did not
#[derive(Debug, Clone, PartialEq)]
pub struct Combined {
    pub table: TidyTable,
    pub skipped: Vec<SkippedFile>,
}

/// Text of several files joined with the repeated headers removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Concatenated {
    /// Joined text; empty when no file could be read
    pub text: String,
    /// Files that contributed
    pub files: usize,
    pub skipped: Vec<SkippedFile>,
}

/// Parse every file and stack the rows into one table.
///
/// A file that fails to decode or parse is skipped and recorded; it never
/// stops the others. The first file that parses fixes the column order and
/// later files are realigned to it by column name. A file whose column set
/// differs is skipped. No usable file gives an empty table, not an error.
pub fn combine<'a>(
    files: impl IntoIterator<Item = &'a SourceFile>,
    policy: &DelimiterPolicy,
    quoting: bool,
) -> Combined {
    let mut combined: Option<TidyTable> = None;
    let mut skipped = Vec::new();

    for file in files {
        let table = match parse_source_file(file, policy, quoting) {
            Ok(table) => table,
            Err(e) => {
                warn!(file = %file.name, error = %e, "skipping unreadable file");
                skipped.push(SkippedFile::new(&file.name, e.to_string()));
                continue;
            }
        };

        match combined.as_mut() {
            None => {
                debug!(file = %file.name, rows = table.row_count(), "first table fixes columns");
                combined = Some(table);
            }
            Some(acc) => match realign(&table, acc) {
                Ok(rows) => {
                    debug!(file = %file.name, rows = rows.len(), "appending rows");
                    acc.rows.extend(rows);
                }
                Err(e) => {
                    warn!(file = %file.name, error = %e, "skipping file with different columns");
                    skipped.push(SkippedFile::new(&file.name, e.to_string()));
                }
            },
        }
    }

    let table = combined.unwrap_or_else(|| TidyTable::new("combined"));
    Combined { table, skipped }
}

fn parse_source_file(file: &SourceFile, policy: &DelimiterPolicy, quoting: bool) -> Result<TidyTable> {
    let delimiter = delimiter_byte(policy.delimiter_for(&file.name), &file.name)?;
    let content = decode(&file.name, &file.bytes)?;
    parse_delimited(&content, &file.name, ParseOptions { delimiter, quoting })
}

/// Reorder `table`'s cells into `target`'s column order
fn realign(table: &TidyTable, target: &TidyTable) -> Result<Vec<Row>> {
    if table.column_count() != target.column_count() {
        return Err(Error::CsvParse {
            name: table.source.clone(),
            message: format!(
                "expected {} columns like '{}', found {}",
                target.column_count(),
                target.source,
                table.column_count()
            ),
        });
    }

    let order: Vec<usize> = target
        .columns
        .iter()
        .map(|c| table.column_index(&c.name))
        .collect::<Result<_>>()?;

    Ok(table
        .rows
        .iter()
        .map(|row| Row::new(order.iter().map(|&i| row.cells[i].clone()).collect()))
        .collect())
}

/// Join files line by line, keeping only the first header line written.
///
/// Every file's first line is its header; an empty file has none and does
/// not use up the header slot.
pub fn concat_text<'a>(files: impl IntoIterator<Item = &'a SourceFile>) -> Concatenated {
    let mut text = String::new();
    let mut contributed = 0;
    let mut header_written = false;
    let mut skipped = Vec::new();

    for file in files {
        let content = match decode(&file.name, &file.bytes) {
            Ok(content) => content,
            Err(e) => {
                warn!(file = %file.name, error = %e, "skipping undecodable file");
                skipped.push(SkippedFile::new(&file.name, e.to_string()));
                continue;
            }
        };

        let mut lines = content.lines();
        if let Some(header) = lines.next() {
            if !header_written {
                text.push_str(header);
                text.push('\n');
                header_written = true;
            }
        }
        for line in lines {
            text.push_str(line);
            text.push('\n');
        }
        contributed += 1;
    }

    Concatenated {
        text,
        files: contributed,
        skipped,
    }
}
