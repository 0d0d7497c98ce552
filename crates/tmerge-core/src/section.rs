//! Marker-bounded sections inside a source's raw lines

use crate::error::Result;
use crate::table::TidyTable;
use serde::{Deserialize, Serialize};

/// The ordered text lines of one logical source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLines {
    /// Where the lines came from
    pub source: String,
    /// The lines, without line terminators
    pub lines: Vec<String>,
}

impl RawLines {
    /// Wrap already-split lines
    pub fn new(source: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            source: source.into(),
            lines,
        }
    }

    /// Split text into lines
    pub fn from_text(source: impl Into<String>, text: &str) -> Self {
        Self::new(source, text.lines().map(str::to_string).collect())
    }

    /// Read the lines out of one column of a parsed export.
    ///
    /// Exports wrap the device file in a single column (usually `Body`),
    /// one original line per row.
    pub fn from_column(table: &TidyTable, column: &str) -> Result<Self> {
        let index = table.column_index(column)?;
        let lines = table
            .rows
            .iter()
            .map(|row| row.get(index).map(|c| c.to_string_value()).unwrap_or_default())
            .collect();
        Ok(Self::new(table.source.clone(), lines))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A named sub-range of lines, exclusive of its markers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Section name (the start marker unless given otherwise)
    pub name: String,
    /// Exact text of the line that opens the section
    pub start_marker: String,
    /// Prefix of the line that closes the section
    pub end_marker_prefix: String,
    /// Enclosed lines; the first is the section header
    pub lines: Vec<String>,
}

impl Section {
    fn empty(start_marker: &str, end_marker_prefix: &str) -> Self {
        Self {
            name: start_marker.to_string(),
            start_marker: start_marker.to_string(),
            end_marker_prefix: end_marker_prefix.to_string(),
            lines: Vec::new(),
        }
    }

    /// Whether the section was absent or had no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Extract the section opened by `start_marker` and closed by the first
/// later line starting with `end_marker_prefix`.
///
/// A missing start marker yields an empty section. A missing end marker
/// runs the section to the last line.
pub fn extract(lines: &[String], start_marker: &str, end_marker_prefix: &str) -> Section {
    SectionCursor::new(lines).next_section(start_marker, end_marker_prefix)
}

/// Walks one source's lines section by section so that sections never
/// overlap: each search begins where the previous section ended.
#[derive(Debug)]
pub struct SectionCursor<'a> {
    lines: &'a [String],
    position: usize,
}

impl<'a> SectionCursor<'a> {
    pub fn new(lines: &'a [String]) -> Self {
        Self { lines, position: 0 }
    }

    /// Index the next search starts from
    pub fn position(&self) -> usize {
        self.position
    }

    /// Extract the next section at or after the cursor.
    ///
    /// When the start marker is not found the cursor stays put, so a
    /// missing optional section does not hide the ones after it.
    pub fn next_section(&mut self, start_marker: &str, end_marker_prefix: &str) -> Section {
        let remaining = &self.lines[self.position..];

        let Some(marker) = remaining.iter().position(|l| l == start_marker) else {
            return Section::empty(start_marker, end_marker_prefix);
        };

        let body_start = self.position + marker + 1;
        let body_end = self.lines[body_start..]
            .iter()
            .position(|l| l.starts_with(end_marker_prefix))
            .map(|offset| body_start + offset)
            .unwrap_or(self.lines.len());

        self.position = body_end;

        Section {
            name: start_marker.to_string(),
            start_marker: start_marker.to_string(),
            end_marker_prefix: end_marker_prefix.to_string(),
            lines: self.lines[body_start..body_end].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_between_markers() {
        let src = lines(&[
            "Activities",
            "name,start,end",
            r#"2024-01-01,"run","5k""#,
            "Sleep",
        ]);
        let section = extract(&src, "Activities", "Sleep");
        assert_eq!(section.lines.len(), 2);
        assert_eq!(section.lines[0], "name,start,end");
    }

    #[test]
    fn test_missing_start_marker_is_empty() {
        let src = lines(&["Body", "Sleep", "x,y"]);
        let section = extract(&src, "Activities", "Sleep");
        assert!(section.is_empty());
        assert_eq!(section.name, "Activities");
    }

    #[test]
    fn test_missing_end_marker_runs_to_end() {
        let src = lines(&["Sleep", "a,b", r#"1,"2""#, r#"3,"4""#]);
        let section = extract(&src, "Sleep", "Food Log");
        assert_eq!(section.lines.len(), 3);
    }

    #[test]
    fn test_end_prefix_matches_prefix_only() {
        let src = lines(&["Sleep", "a,b", "Food Log 2024", "more"]);
        let section = extract(&src, "Sleep", "Food Log");
        assert_eq!(section.lines, vec!["a,b"]);
    }

    #[test]
    fn test_end_marker_before_start_is_ignored() {
        let src = lines(&["Sleep", "Activities", "a,b", "Sleep"]);
        let section = extract(&src, "Activities", "Sleep");
        assert_eq!(section.lines, vec!["a,b"]);
    }

    #[test]
    fn test_start_marker_must_match_exactly() {
        let src = lines(&["Activities summary", "a,b"]);
        assert!(extract(&src, "Activities", "Sleep").is_empty());
    }

    #[test]
    fn test_cursor_sections_do_not_overlap() {
        let src = lines(&[
            "Activities",
            "a,b",
            "Sleep",
            "c,d",
            "Food Log",
            "Sleep",
            "late",
        ]);
        let mut cursor = SectionCursor::new(&src);

        let activities = cursor.next_section("Activities", "Sleep");
        assert_eq!(activities.lines, vec!["a,b"]);
        assert_eq!(cursor.position(), 2);

        let sleep = cursor.next_section("Sleep", "Food Log");
        assert_eq!(sleep.lines, vec!["c,d"]);
    }

    #[test]
    fn test_cursor_keeps_position_on_missing_section() {
        let src = lines(&["Sleep", "c,d"]);
        let mut cursor = SectionCursor::new(&src);

        assert!(cursor.next_section("Activities", "Sleep").is_empty());
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.next_section("Sleep", "Food Log").lines, vec!["c,d"]);
    }

    #[test]
    fn test_raw_lines_from_column() {
        let mut table = TidyTable::with_columns("export.csv", &["Body"]);
        table.rows.push(crate::table::Row::new(vec!["Activities".into()]));
        table.rows.push(crate::table::Row::new(vec!["a,b".into()]));

        let raw = RawLines::from_column(&table, "Body").unwrap();
        assert_eq!(raw.lines, vec!["Activities", "a,b"]);
        assert!(RawLines::from_column(&table, "Text").is_err());
    }

    #[test]
    fn test_marker_with_trailing_space_does_not_match() {
        let options = crate::parser::ParseOptions {
            delimiter: b';',
            quoting: false,
        };
        let table = crate::parser::parse_delimited("Body\nSleep \nStart Time,Minutes\n", "export.csv", options).unwrap();
        let raw = RawLines::from_column(&table, "Body").unwrap();

        assert_eq!(raw.lines[0], "Sleep ");
        assert!(extract(&raw.lines, "Sleep", "Food Log").is_empty());
    }
}
