//! The destination template's fixed column list

use crate::error::{Error, Result};
use crate::parser::decode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Ordered, unique destination column names with O(1) lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct TemplateSchema {
    columns: Vec<String>,
    offsets: HashMap<String, usize>,
}

impl TemplateSchema {
    /// Build a schema, rejecting duplicate names
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Result<Self> {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut offsets = HashMap::with_capacity(columns.len());

        for (i, name) in columns.iter().enumerate() {
            if offsets.insert(name.clone(), i).is_some() {
                return Err(Error::DuplicateSchemaColumn {
                    column: name.clone(),
                });
            }
        }

        Ok(Self { columns, offsets })
    }

    /// Read the header row of a template CSV
    pub fn from_csv_bytes(name: &str, bytes: &[u8]) -> Result<Self> {
        let content = decode(name, bytes)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(content.as_bytes());

        let headers = reader.headers().map_err(|e| Error::Csv {
            name: name.to_string(),
            source: e,
        })?;

        if headers.is_empty() {
            return Err(Error::CsvParse {
                name: name.to_string(),
                message: "template has no header row".to_string(),
            });
        }

        Self::new(headers.iter())
    }

    /// Load the template CSV at `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_csv_bytes(&path.display().to_string(), &bytes)
    }

    /// Offset of a column, or `UnknownColumn`
    pub fn offset_of(&self, column: &str) -> Result<usize> {
        self.offsets
            .get(column)
            .copied()
            .ok_or_else(|| Error::UnknownColumn {
                column: column.to_string(),
            })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn name_at(&self, offset: usize) -> Option<&str> {
        self.columns.get(offset).map(String::as_str)
    }
}

impl TryFrom<Vec<String>> for TemplateSchema {
    type Error = Error;

    fn try_from(columns: Vec<String>) -> Result<Self> {
        Self::new(columns)
    }
}

impl From<TemplateSchema> for Vec<String> {
    fn from(schema: TemplateSchema) -> Self {
        schema.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_lookup() {
        let schema = TemplateSchema::new(["id", "instrument", "instance", "val"]).unwrap();

        assert_eq!(schema.offset_of("id").unwrap(), 0);
        assert_eq!(schema.offset_of("val").unwrap(), 3);
        assert_eq!(schema.width(), 4);
        assert_eq!(schema.name_at(1), Some("instrument"));
    }

    #[test]
    fn test_unknown_column_is_fatal() {
        let schema = TemplateSchema::new(["id"]).unwrap();

        let err = schema.offset_of("date_fb").unwrap_err();

        assert!(matches!(err, Error::UnknownColumn { ref column } if column == "date_fb"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let err = TemplateSchema::new(["id", "val", "id"]).unwrap_err();
        assert!(matches!(err, Error::DuplicateSchemaColumn { .. }));
    }

    #[test]
    fn test_from_csv_header_only() {
        let bytes = b"record_id,redcap_repeat_instrument,redcap_repeat_instance,date_fb\n";
        let schema = TemplateSchema::from_csv_bytes("template.csv", bytes).unwrap();

        assert_eq!(schema.offset_of("date_fb").unwrap(), 3);
    }

    #[test]
    fn test_serde_round_trip_validates() {
        let schema: TemplateSchema = serde_json::from_str(r#"["a","b"]"#).unwrap();
        assert_eq!(schema.columns(), &["a".to_string(), "b".to_string()]);
        assert!(serde_json::from_str::<TemplateSchema>(r#"["a","a"]"#).is_err());
    }
}
