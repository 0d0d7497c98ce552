//! Serialization of a finished output template

use crate::error::{Error, Result};
use crate::template::OutputTemplate;
use crate::table::CellValue;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// How the template is written out
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Number of columns left off the right-hand end of the schema
    #[serde(default)]
    pub drop_trailing_columns: usize,
}

/// Column names plus rows as arrays of cells, for the JSON export format
#[derive(Debug, Serialize)]
struct JsonExport<'a> {
    columns: &'a [String],
    rows: Vec<&'a [CellValue]>,
}

fn kept_width(template: &OutputTemplate, options: &ExportOptions) -> usize {
    template
        .schema()
        .width()
        .saturating_sub(options.drop_trailing_columns)
}

/// Write the template as delimited text: header row, then every row
pub fn write_csv<W: Write>(template: &OutputTemplate, writer: W, options: &ExportOptions) -> Result<()> {
    let width = kept_width(template, options);
    let mut csv_writer = csv::Writer::from_writer(writer);
    let csv_err = |e: csv::Error| Error::Csv {
        name: "output".to_string(),
        source: e,
    };

    csv_writer
        .write_record(&template.schema().columns()[..width])
        .map_err(csv_err)?;

    for row in template.rows() {
        csv_writer
            .write_record(row[..width].iter().map(CellValue::to_string_value))
            .map_err(csv_err)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Write the template as CSV to a file
pub fn save_csv<P: AsRef<Path>>(template: &OutputTemplate, path: P, options: &ExportOptions) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_csv(template, BufWriter::new(file), options)
}

/// Render the template as pretty JSON
pub fn to_json(template: &OutputTemplate, options: &ExportOptions) -> Result<String> {
    let width = kept_width(template, options);
    let export = JsonExport {
        columns: &template.schema().columns()[..width],
        rows: template.rows().iter().map(|r| &r[..width]).collect(),
    };
    Ok(serde_json::to_string_pretty(&export)?)
}
