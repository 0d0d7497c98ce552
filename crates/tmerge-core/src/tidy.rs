//! Builds tidy tables out of extracted sections

use crate::error::{Error, Result};
use crate::quoted::parse_quoted_row;
use crate::section::Section;
use crate::table::{CellValue, Row, TidyTable};
use serde::{Deserialize, Serialize};

/// A column appended to every row with one literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantColumn {
    pub name: String,
    pub value: CellValue,
}

impl ConstantColumn {
    pub fn new(name: impl Into<String>, value: impl Into<CellValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// How a section is turned into a table
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    /// Delimiter of the header line and of the leading row field
    pub delimiter: char,
    /// Stable ascending sort on this column after parsing
    pub sort_by: Option<String>,
    /// Column appended after parsing and sorting
    pub constant: Option<ConstantColumn>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            sort_by: None,
            constant: None,
        }
    }
}

impl BuildOptions {
    pub fn sorted_by(mut self, column: impl Into<String>) -> Self {
        self.sort_by = Some(column.into());
        self
    }
}

/// Turn a section into a tidy table.
///
/// The first line is the header, split on the plain delimiter; every later
/// line goes through the quoted-row parser and must yield exactly as many
/// fields as the header. Blank lines are ignored. Any malformed row
/// abandons the whole section.
pub fn build(section: &Section, options: &BuildOptions) -> Result<TidyTable> {
    let Some((header, body)) = section.lines.split_first() else {
        return Ok(TidyTable::new(section.name.clone()));
    };

    let names: Vec<&str> = header.split(options.delimiter).collect();
    let mut table = TidyTable::with_columns(section.name.clone(), &names);

    for (offset, line) in body.iter().enumerate() {
        // Header is line 1 of the section
        let line_no = offset + 2;
        if line.trim().is_empty() {
            continue;
        }
        let fields = parse_quoted_row(line, options.delimiter, &section.name, line_no)?;

        if fields.len() != names.len() {
            return Err(Error::SectionShape {
                section: section.name.clone(),
                line: line_no,
                expected: names.len(),
                found: fields.len(),
            });
        }

        table
            .rows
            .push(Row::new(fields.into_iter().map(CellValue::Text).collect()));
    }

    if let Some(column) = &options.sort_by {
        table.sort_by_column(column)?;
    }

    if let Some(constant) = &options.constant {
        table.push_constant_column(constant.name.clone(), constant.value.clone());
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::extract;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_activities_section() {
        let src = lines(&[
            "Activities",
            "name,start,end",
            r#"2024-01-01,"run","5k""#,
            "Sleep",
        ]);
        let section = extract(&src, "Activities", "Sleep");
        assert_eq!(section.lines.len() - 1, 1);

        let table = build(&section, &BuildOptions::default()).unwrap();

        assert_eq!(table.column_names(), vec!["name", "start", "end"]);
        assert_eq!(table.row_count(), 1);
        let values: Vec<String> = table.rows[0]
            .cells
            .iter()
            .map(|c| c.to_string_value())
            .collect();
        assert_eq!(values, vec!["2024-01-01", "run", "5k"]);
    }

    #[test]
    fn test_absent_section_builds_empty_table() {
        let src = lines(&["Body", "Food Log"]);
        let section = extract(&src, "Activities", "Sleep");

        let table = build(&section, &BuildOptions::default()).unwrap();

        assert_eq!(table.column_count(), 0);
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_header_only_section() {
        let src = lines(&["Sleep", "Start Time,End Time"]);
        let section = extract(&src, "Sleep", "Food Log");

        let table = build(&section, &BuildOptions::default()).unwrap();

        assert_eq!(table.column_count(), 2);
        assert!(table.is_empty());
    }

    #[test]
    fn test_shape_mismatch_abandons_section() {
        let src = lines(&[
            "Sleep",
            "Start Time,End Time,Minutes",
            r#"2024-01-01 22:00,"2024-01-02 06:00","480""#,
            r#"2024-01-02 23:00,"2024-01-03 07:00""#,
        ]);
        let section = extract(&src, "Sleep", "Food Log");

        let err = build(&section, &BuildOptions::default()).unwrap_err();

        match err {
            Error::SectionShape {
                section,
                line,
                expected,
                found,
            } => {
                assert_eq!(section, "Sleep");
                assert_eq!(line, 3);
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_lines_ignored() {
        let src = lines(&["Activities", "Date,Steps", r#"2024-01-01,"10""#, "", "Sleep"]);
        let section = extract(&src, "Activities", "Sleep");

        let table = build(&section, &BuildOptions::default()).unwrap();

        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_row_without_delimiter_is_malformed() {
        let src = lines(&["Sleep", "Start Time,End Time", "garbage"]);
        let section = extract(&src, "Sleep", "Food Log");

        let err = build(&section, &BuildOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MalformedRow { line: 2, .. }));
    }

    #[test]
    fn test_sort_and_constant_column() {
        let src = lines(&[
            "Sleep",
            "Start Time,Minutes",
            r#"2024-01-03 22:00,"400""#,
            r#"2024-01-01 23:00,"410""#,
            r#"2024-01-02 21:30,"420""#,
            "Food Log",
        ]);
        let section = extract(&src, "Sleep", "Food Log");
        let options = BuildOptions {
            constant: Some(ConstantColumn::new("complete", 2i64)),
            ..BuildOptions::default()
        }
        .sorted_by("Start Time");

        let table = build(&section, &options).unwrap();

        let starts: Vec<String> = table
            .rows
            .iter()
            .map(|r| r.cells[0].to_string_value())
            .collect();
        assert_eq!(
            starts,
            vec!["2024-01-01 23:00", "2024-01-02 21:30", "2024-01-03 22:00"]
        );
        assert_eq!(table.column_names(), vec!["Start Time", "Minutes", "complete"]);
        assert_eq!(table.rows[0].cells[2], CellValue::Integer(2));
    }

    #[test]
    fn test_sort_by_unknown_column_fails() {
        let src = lines(&["Sleep", "a,b", r#"1,"2""#]);
        let section = extract(&src, "Sleep", "Food Log");

        let err = build(&section, &BuildOptions::default().sorted_by("Start Time")).unwrap_err();
        assert!(matches!(err, Error::ColumnNotFound { .. }));
    }
}
