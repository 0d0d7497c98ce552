//! tmerge-core: merges per-subject device exports into a fixed import template
//!
//! This library provides functionality to:
//! - Fetch a subject's source files from a directory or memory
//! - Pull marker-bounded sections out of wrapped device exports
//! - Turn quoted section rows into tidy tables
//! - Combine same-shape files and average readings per day
//! - Append each table as an instrument block of a fixed-column template
//! - Export the template as CSV or JSON, with a report of what was skipped

pub mod averager;
pub mod combiner;
pub mod engine;
pub mod error;
pub mod export;
pub mod parser;
pub mod plan;
pub mod quoted;
pub mod report;
pub mod schema;
pub mod section;
pub mod source;
pub mod table;
pub mod template;
pub mod tidy;

pub use averager::average;
pub use combiner::{combine, concat_text, DelimiterPolicy};
pub use engine::{MergeEngine, MergeOutcome};
pub use error::{Error, Result};
pub use export::{save_csv, to_json, write_csv, ExportOptions};
pub use parser::{parse_delimited, parse_file, ParseOptions};
pub use plan::{BlockSpec, MergePlan, SectionPlan, SourceKind, SourcePlan};
pub use quoted::parse_quoted_row;
pub use report::{BlockReport, BlockStatus, MergeReport, SkippedFile};
pub use schema::TemplateSchema;
pub use section::{extract, RawLines, Section, SectionCursor};
pub use source::{DirectorySource, FileFilter, FileSource, MemorySource, SourceFile};
pub use table::{CellValue, Column, Row, TidyTable};
pub use template::{InstrumentBlock, OutputTemplate, StampColumns};
pub use tidy::{build, BuildOptions, ConstantColumn};

/// Merge one subject's files into a fresh template using `plan`.
///
/// Shorthand for [`MergeEngine::merge`].
pub fn merge(subject: &str, files: &[SourceFile], schema: &TemplateSchema, plan: &MergePlan) -> Result<MergeOutcome> {
    MergeEngine::new(plan.clone()).merge(subject, files, schema)
}
