//! Core table types shared by every stage of the merge

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A tidy table: named columns and rows of matching arity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TidyTable {
    /// Column definitions
    pub columns: Vec<Column>,
    /// Row data
    pub rows: Vec<Row>,
    /// Where the table came from (file name or section name)
    pub source: String,
}

impl TidyTable {
    /// Create a new empty table with no columns
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            source: source.into(),
        }
    }

    /// Create an empty table with the given column names
    pub fn with_columns<S: AsRef<str>>(source: impl Into<String>, names: &[S]) -> Self {
        let columns = names
            .iter()
            .enumerate()
            .map(|(i, name)| Column::new(name.as_ref().to_string(), i))
            .collect();

        Self {
            columns,
            rows: Vec::new(),
            source: source.into(),
        }
    }

    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// A table with no rows carries nothing to place
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Find a column by name
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Index of a named column, or `ColumnNotFound`
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.find_column(name)
            .map(|c| c.index)
            .ok_or_else(|| Error::ColumnNotFound {
                table: self.source.clone(),
                column: name.to_string(),
            })
    }

    /// Column names in table order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Append a column holding the same value in every row
    pub fn push_constant_column(&mut self, name: impl Into<String>, value: CellValue) {
        let index = self.columns.len();
        self.columns.push(Column::new(name.into(), index));
        for row in &mut self.rows {
            row.cells.push(value.clone());
        }
    }

    /// Stable ascending sort on the textual value of one column
    pub fn sort_by_column(&mut self, name: &str) -> Result<()> {
        let index = self.column_index(name)?;
        self.rows.sort_by(|a, b| {
            let left = a.get(index).map(CellValue::to_string_value).unwrap_or_default();
            let right = b.get(index).map(CellValue::to_string_value).unwrap_or_default();
            left.cmp(&right)
        });
        Ok(())
    }
}

/// A column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as declared by the header
    pub name: String,
    /// Column index (0-based)
    pub index: usize,
}

impl Column {
    /// Create a new column
    pub fn new(name: String, index: usize) -> Self {
        Self { name, index }
    }
}

/// A row of data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Cell values for each column
    pub cells: Vec<CellValue>,
}

impl Row {
    /// Create a new row
    pub fn new(cells: Vec<CellValue>) -> Self {
        Self { cells }
    }

    /// Get a cell value by column index
    pub fn get(&self, index: usize) -> Option<&CellValue> {
        self.cells.get(index)
    }
}

/// A cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Integer value
    Integer(i64),
    /// Floating-point value
    Float(f64),
    /// Text kept exactly as read
    Text(String),
    /// Empty/null cell
    Empty,
}

impl CellValue {
    /// Parse a string into a CellValue, detecting the type
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return CellValue::Empty;
        }

        if let Ok(i) = trimmed.parse::<i64>() {
            return CellValue::Integer(i);
        }

        if let Ok(f) = trimmed.parse::<f64>() {
            return CellValue::Float(f);
        }

        CellValue::Text(trimmed.to_string())
    }

    /// Wrap text verbatim, without type detection or trimming
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Numeric view of the cell; text is coerced when it reads as a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Float(f) if f.is_finite() => Some(*f),
            CellValue::Float(_) => None,
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            CellValue::Empty => None,
        }
    }

    /// Convert to a display string
    pub fn to_string_value(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Integer(i) => write!(f, "{}", i),
            // Debug keeps the decimal point on whole numbers ("15.0")
            CellValue::Float(fl) => write!(f, "{:?}", fl),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Empty => write!(f, ""),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Integer(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_parse_integer() {
        assert_eq!(CellValue::parse("42"), CellValue::Integer(42));
        assert_eq!(CellValue::parse("-123"), CellValue::Integer(-123));
    }

    #[test]
    fn test_cell_value_parse_float() {
        assert_eq!(CellValue::parse("3.14"), CellValue::Float(3.14));
        assert_eq!(CellValue::parse(" -2.5 "), CellValue::Float(-2.5));
    }

    #[test]
    fn test_cell_value_parse_text_and_empty() {
        assert_eq!(
            CellValue::parse("2024-01-01"),
            CellValue::Text("2024-01-01".to_string())
        );
        assert_eq!(CellValue::parse("   "), CellValue::Empty);
    }

    #[test]
    fn test_as_f64_coerces_text() {
        assert_eq!(CellValue::text(" 12.5").as_f64(), Some(12.5));
        assert_eq!(CellValue::Integer(3).as_f64(), Some(3.0));
        assert_eq!(CellValue::text("n/a").as_f64(), None);
        assert_eq!(CellValue::text("NaN").as_f64(), None);
        assert_eq!(CellValue::Empty.as_f64(), None);
    }

    #[test]
    fn test_display_keeps_float_point() {
        assert_eq!(CellValue::Float(15.0).to_string_value(), "15.0");
        assert_eq!(CellValue::Float(0.25).to_string_value(), "0.25");
        assert_eq!(CellValue::Integer(2).to_string_value(), "2");
        assert_eq!(CellValue::Empty.to_string_value(), "");
    }

    #[test]
    fn test_sort_by_column_is_stable() {
        let mut table = TidyTable::with_columns("sleep", &["Start Time", "tag"]);
        for (start, tag) in [("b", "1"), ("a", "2"), ("b", "3"), ("a", "4")] {
            table.rows.push(Row::new(vec![start.into(), tag.into()]));
        }

        table.sort_by_column("Start Time").unwrap();

        let tags: Vec<String> = table
            .rows
            .iter()
            .map(|r| r.cells[1].to_string_value())
            .collect();
        assert_eq!(tags, vec!["2", "4", "1", "3"]);
    }

    #[test]
    fn test_sort_by_missing_column() {
        let mut table = TidyTable::with_columns("sleep", &["a"]);
        let err = table.sort_by_column("Start Time").unwrap_err();
        assert!(matches!(err, Error::ColumnNotFound { .. }));
    }

    #[test]
    fn test_push_constant_column() {
        let mut table = TidyTable::with_columns("report", &["patient_id"]);
        table.rows.push(Row::new(vec!["p1".into()]));
        table.rows.push(Row::new(vec!["p2".into()]));

        table.push_constant_column("complete", CellValue::Integer(2));

        assert_eq!(table.column_names(), vec!["patient_id", "complete"]);
        assert!(table.rows.iter().all(|r| r.cells[1] == CellValue::Integer(2)));
    }
}
