//! The growing output table and the block appender that fills it
//!
//! Rows are only ever added, never edited once written: each block
//! appends its own fresh rows, writes the source table into a contiguous
//! column range, and stamps the instrument name and instance number.

use crate::error::{Error, Result};
use crate::schema::TemplateSchema;
use crate::table::{CellValue, TidyTable};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::debug;

/// Columns every appended row gets stamped into
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampColumns {
    /// Receives the block's instrument name
    pub instrument: usize,
    /// Receives the 1-based instance number
    pub instance: usize,
    /// Receives a fixed value (the subject identifier) when set
    pub subject: Option<(usize, CellValue)>,
}

impl StampColumns {
    /// Resolve stamp columns by name
    pub fn resolve(schema: &TemplateSchema, instrument: &str, instance: &str) -> Result<Self> {
        Ok(Self {
            instrument: schema.offset_of(instrument)?,
            instance: schema.offset_of(instance)?,
            subject: None,
        })
    }

    /// Also stamp `subject` into the named column
    pub fn with_subject(mut self, schema: &TemplateSchema, column: &str, subject: &str) -> Result<Self> {
        self.subject = Some((schema.offset_of(column)?, CellValue::text(subject)));
        Ok(self)
    }

    fn offsets(&self) -> impl Iterator<Item = usize> + '_ {
        [Some(self.instrument), Some(self.instance), self.subject.as_ref().map(|s| s.0)]
            .into_iter()
            .flatten()
    }
}

/// One instrument's contribution: a source table plus placement
#[derive(Debug, Clone)]
pub struct InstrumentBlock<'a> {
    pub instrument: String,
    /// Schema offset of the source table's first column
    pub start_offset: usize,
    /// Absent or row-less sources append nothing
    pub source: Option<&'a TidyTable>,
    /// Instance number of the block's first row
    pub instance_start: i64,
    /// Schema offset and value written into every row of the block
    pub constant: Option<(usize, CellValue)>,
}

impl<'a> InstrumentBlock<'a> {
    pub fn new(instrument: impl Into<String>, start_offset: usize, source: &'a TidyTable) -> Self {
        Self {
            instrument: instrument.into(),
            start_offset,
            source: Some(source),
            instance_start: 1,
            constant: None,
        }
    }

    pub fn instance_start(mut self, instance_start: i64) -> Self {
        self.instance_start = instance_start;
        self
    }

    pub fn constant(mut self, offset: usize, value: impl Into<CellValue>) -> Self {
        self.constant = Some((offset, value.into()));
        self
    }

    /// Column range the source table's data occupies
    fn data_columns(&self) -> Range<usize> {
        let width = self.source.map_or(0, TidyTable::column_count);
        self.start_offset..self.start_offset + width
    }
}

/// Columns already written by an earlier block
#[derive(Debug, Clone, PartialEq)]
struct Claim {
    instrument: String,
    columns: Range<usize>,
    constant: Option<usize>,
}

/// The fixed-schema output table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputTemplate {
    schema: TemplateSchema,
    stamps: StampColumns,
    rows: Vec<Vec<CellValue>>,
    #[serde(skip)]
    claims: Vec<Claim>,
}

impl OutputTemplate {
    /// A template with the schema's columns and no rows
    pub fn new(schema: TemplateSchema, stamps: StampColumns) -> Self {
        Self {
            schema,
            stamps,
            rows: Vec::new(),
            claims: Vec::new(),
        }
    }

    pub fn schema(&self) -> &TemplateSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Offset of a destination column, or `UnknownColumn`
    pub fn column_offset(&self, name: &str) -> Result<usize> {
        self.schema.offset_of(name)
    }

    /// Value at a row and named column
    pub fn cell(&self, row: usize, column: &str) -> Option<&CellValue> {
        let offset = self.schema.offset_of(column).ok()?;
        self.rows.get(row).and_then(|r| r.get(offset))
    }

    /// Append a block, returning the range of rows it wrote.
    ///
    /// A block without rows is a no-op and returns an empty range. Every
    /// check runs before the first row is added, so a rejected block
    /// leaves the template untouched.
    pub fn append_block(&mut self, block: &InstrumentBlock<'_>) -> Result<Range<usize>> {
        let first_row = self.rows.len();
        let Some(source) = block.source.filter(|t| !t.is_empty()) else {
            debug!(instrument = %block.instrument, "no rows to append");
            return Ok(first_row..first_row);
        };

        let columns = self.check_block(block)?;
        let width = self.schema.width();

        for (r, source_row) in source.rows.iter().enumerate() {
            let mut row = vec![CellValue::Empty; width];

            for (c, cell) in source_row.cells.iter().enumerate() {
                row[block.start_offset + c] = cell.clone();
            }

            row[self.stamps.instrument] = CellValue::text(block.instrument.as_str());
            row[self.stamps.instance] = CellValue::Integer(block.instance_start + r as i64);
            if let Some((offset, subject)) = &self.stamps.subject {
                row[*offset] = subject.clone();
            }
            if let Some((offset, value)) = &block.constant {
                row[*offset] = value.clone();
            }

            self.rows.push(row);
        }

        self.claims.push(Claim {
            instrument: block.instrument.clone(),
            columns,
            constant: block.constant.as_ref().map(|(offset, _)| *offset),
        });

        let written = first_row..self.rows.len();
        debug!(
            instrument = %block.instrument,
            rows = written.len(),
            first_row,
            "appended block"
        );
        Ok(written)
    }

    fn check_block(&self, block: &InstrumentBlock<'_>) -> Result<Range<usize>> {
        let columns = block.data_columns();
        let width = self.schema.width();

        let constant_end = block.constant.as_ref().map_or(0, |(offset, _)| offset + 1);
        if columns.end > width || constant_end > width {
            return Err(Error::BlockOutOfRange {
                instrument: block.instrument.clone(),
                start: columns.start,
                end: columns.end.max(constant_end),
                width,
            });
        }

        let overlap = |other: &str| Error::OverlappingBlock {
            instrument: block.instrument.clone(),
            other: other.to_string(),
        };

        if self.stamps.offsets().any(|offset| columns.contains(&offset)) {
            return Err(overlap("stamp columns"));
        }

        if let Some((offset, _)) = &block.constant {
            if columns.contains(offset) || self.stamps.offsets().any(|s| s == *offset) {
                return Err(overlap("its own constant column"));
            }
        }

        let constant = block.constant.as_ref().map(|(offset, _)| *offset);
        if let Some(claim) = self.claims.iter().find(|claim| {
            let data_overlap = claim.columns.start < columns.end && columns.start < claim.columns.end;
            let constant_in_claim = constant.is_some_and(|c| claim.columns.contains(&c));
            let claim_constant_in_block = claim.constant.is_some_and(|c| columns.contains(&c));
            data_overlap || constant_in_claim || claim_constant_in_block
        }) {
            return Err(overlap(&claim.instrument));
        }

        Ok(columns)
    }
}
