//! Per-key averaging of time-stamped readings

use crate::error::Result;
use crate::table::{CellValue, Row, TidyTable};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(&self) -> CellValue {
        if self.count == 0 {
            CellValue::Empty
        } else {
            CellValue::Float(self.sum / self.count as f64)
        }
    }
}

/// Group rows by exact text of `group_key` and average `value_columns`.
///
/// Groups come out in ascending key order. Rows with a blank key are
/// dropped. Entries that do not read as numbers are left out of their
/// column's mean; a column with no numeric entry in a group yields a
/// blank cell. Output columns are the key followed by `value_columns`.
pub fn average<S: AsRef<str>>(table: &TidyTable, group_key: &str, value_columns: &[S]) -> Result<TidyTable> {
    let key_index = table.column_index(group_key)?;
    let value_indices: Vec<usize> = value_columns
        .iter()
        .map(|name| table.column_index(name.as_ref()))
        .collect::<Result<_>>()?;

    let mut groups: BTreeMap<String, Vec<Mean>> = BTreeMap::new();

    for row in &table.rows {
        let key = match row.get(key_index) {
            Some(cell) if !cell.is_empty() => cell.to_string_value(),
            _ => continue,
        };

        let means = groups
            .entry(key)
            .or_insert_with(|| vec![Mean::default(); value_indices.len()]);

        for (mean, &index) in means.iter_mut().zip(&value_indices) {
            if let Some(value) = row.get(index).and_then(CellValue::as_f64) {
                mean.push(value);
            }
        }
    }

    let mut names: Vec<&str> = vec![group_key];
    names.extend(value_columns.iter().map(|name| name.as_ref()));
    let mut averaged = TidyTable::with_columns(table.source.clone(), &names);

    for (key, means) in groups {
        let mut cells = vec![CellValue::Text(key)];
        cells.extend(means.iter().map(Mean::value));
        averaged.rows.push(Row::new(cells));
    }

    debug!(
        source = %table.source,
        input_rows = table.row_count(),
        groups = averaged.row_count(),
        "averaged readings"
    );

    Ok(averaged)
}
