//! Parser for export rows whose leading field is plain and the rest quoted
//!
//! Device exports embed rows like `2024-01-01,"1,204","5.2"`: the first
//! field runs up to the first delimiter, every later field is wrapped in
//! double quotes and may itself contain the delimiter.

use crate::error::{Error, Result};

/// Split one export row into `[field0, quoted1, quoted2, ...]`.
///
/// `source_name` and `line_no` only label the error.
pub fn parse_quoted_row(
    line: &str,
    delimiter: char,
    source_name: &str,
    line_no: usize,
) -> Result<Vec<String>> {
    let Some((first, rest)) = line.split_once(delimiter) else {
        return Err(Error::MalformedRow {
            source_name: source_name.to_string(),
            line: line_no,
            message: format!("no '{}' delimiter after the leading field", delimiter),
        });
    };

    let mut fields = vec![first.to_string()];
    fields.extend(quoted_fields(rest));
    Ok(fields)
}

/// Every `"..."` substring of `text`, in order, without the quotes.
///
/// A dangling opening quote with no partner is ignored.
fn quoted_fields(text: &str) -> impl Iterator<Item = String> + '_ {
    let pieces: Vec<&str> = text.split('"').collect();
    // Odd pieces sit between a quote pair; the last one is only closed when
    // the split produced an odd number of pieces.
    let closed = if pieces.len() % 2 == 1 {
        pieces.len()
    } else {
        pieces.len() - 1
    };

    pieces
        .into_iter()
        .take(closed)
        .skip(1)
        .step_by(2)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_then_quoted() {
        let fields = parse_quoted_row(r#"2024-01-01,"run","5k""#, ',', "t", 1).unwrap();
        assert_eq!(fields, vec!["2024-01-01", "run", "5k"]);
    }

    #[test]
    fn test_delimiter_inside_quotes_is_kept() {
        let fields = parse_quoted_row(r#"2024-01-02,"1,204","0""#, ',', "t", 1).unwrap();
        assert_eq!(fields, vec!["2024-01-02", "1,204", "0"]);
    }

    #[test]
    fn test_empty_quoted_field() {
        let fields = parse_quoted_row(r#"d,"","x""#, ',', "t", 1).unwrap();
        assert_eq!(fields, vec!["d", "", "x"]);
    }

    #[test]
    fn test_unquoted_remainder_yields_only_leading_field() {
        let fields = parse_quoted_row("d,1,2", ',', "t", 1).unwrap();
        assert_eq!(fields, vec!["d"]);
    }

    #[test]
    fn test_unbalanced_quote_is_dropped() {
        let fields = parse_quoted_row(r#"d,"a","b"#, ',', "t", 1).unwrap();
        assert_eq!(fields, vec!["d", "a"]);
    }

    #[test]
    fn test_missing_delimiter_is_malformed() {
        let err = parse_quoted_row("Activities", ',', "fitbit_export.csv", 7).unwrap_err();
        match err {
            Error::MalformedRow { source_name, line, .. } => {
                assert_eq!(source_name, "fitbit_export.csv");
                assert_eq!(line, 7);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_other_delimiter() {
        let fields = parse_quoted_row(r#"2024-01-01;"a;b""#, ';', "t", 1).unwrap();
        assert_eq!(fields, vec!["2024-01-01", "a;b"]);
    }
}
