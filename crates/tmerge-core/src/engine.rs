//! The template merge engine
//!
//! Runs every source of a [`MergePlan`] through extract, tidy,
//! combine-or-average and append, in plan order, into one fresh
//! [`OutputTemplate`]. Column names are resolved before any row is written,
//! so a stale plan fails the run up front instead of corrupting output.

use crate::averager::average;
use crate::combiner::{combine, concat_text, delimiter_byte};
use crate::error::{Error, Result};
use crate::parser::{parse_delimited, ParseOptions};
use crate::plan::{BlockSpec, MergePlan, SectionPlan, SourceKind, SourcePlan};
use crate::report::{MergeReport, SkippedFile};
use crate::schema::TemplateSchema;
use crate::section::{RawLines, SectionCursor};
use crate::source::{FileSource, SourceFile};
use crate::table::{CellValue, TidyTable};
use crate::template::{InstrumentBlock, OutputTemplate, StampColumns};
use crate::tidy::{build, BuildOptions};
use std::collections::HashMap;
use tracing::{info, warn};

/// The merged template and what happened while building it
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub template: OutputTemplate,
    pub report: MergeReport,
}

/// A block spec with its column names resolved to schema offsets
#[derive(Debug, Clone)]
struct Placement {
    instrument: String,
    start_offset: usize,
    instance_start: i64,
    constant: Option<(usize, CellValue)>,
}

impl Placement {
    fn resolve(spec: &BlockSpec, schema: &TemplateSchema) -> Result<Self> {
        let constant = match &spec.constant {
            Some(c) => Some((schema.offset_of(&c.column)?, c.value.clone())),
            None => None,
        };

        Ok(Self {
            instrument: spec.instrument.clone(),
            start_offset: schema.offset_of(&spec.start_column)?,
            instance_start: spec.instance_start,
            constant,
        })
    }

    fn block<'a>(&self, table: &'a TidyTable) -> InstrumentBlock<'a> {
        InstrumentBlock {
            instrument: self.instrument.clone(),
            start_offset: self.start_offset,
            source: Some(table),
            instance_start: self.instance_start,
            constant: self.constant.clone(),
        }
    }
}

/// Merges one subject's files according to a plan
#[derive(Debug, Clone, Default)]
pub struct MergeEngine {
    plan: MergePlan,
}

impl MergeEngine {
    pub fn new(plan: MergePlan) -> Self {
        Self { plan }
    }

    pub fn plan(&self) -> &MergePlan {
        &self.plan
    }

    /// Ask `source` for every file the plan's filters select.
    ///
    /// A file matched by several filters is returned once. A different file
    /// arriving under a name already taken, and any file that cannot be
    /// delivered, comes back as a skip.
    pub fn collect(&self, source: &dyn FileSource) -> (Vec<SourceFile>, Vec<SkippedFile>) {
        let mut files: Vec<SourceFile> = Vec::new();
        let mut skipped = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for plan in &self.plan.sources {
            for fetched in source.fetch(&plan.filter) {
                match fetched {
                    Ok(file) => match seen.get(&file.name) {
                        Some(&index) if files[index].bytes == file.bytes => {}
                        Some(_) => {
                            warn!(source = %plan.name, file = %file.name, "duplicate file name");
                            skipped.push(SkippedFile::new(
                                file.name.as_str(),
                                "another file with the same name was already fetched",
                            ));
                        }
                        None => {
                            seen.insert(file.name.clone(), files.len());
                            files.push(file);
                        }
                    },
                    Err(e) => {
                        warn!(source = %plan.name, error = %e, "file unavailable");
                        let name = match &e {
                            Error::SourceUnavailable { name, .. } => name.clone(),
                            _ => plan.name.clone(),
                        };
                        skipped.push(SkippedFile::new(name, e.to_string()));
                    }
                }
            }
        }

        (files, skipped)
    }

    /// Fetch through `source`, then merge
    pub fn merge_from(
        &self,
        subject: &str,
        source: &dyn FileSource,
        schema: &TemplateSchema,
    ) -> Result<MergeOutcome> {
        let (files, unavailable) = self.collect(source);
        let mut outcome = self.merge(subject, &files, schema)?;
        outcome.report.skip_files(unavailable);
        Ok(outcome)
    }

    /// Merge one subject's files into a fresh template.
    ///
    /// Fails only on configuration errors: a column the schema lacks, or
    /// blocks that would collide or run off the template. Unreadable files,
    /// absent sections and empty sources are recorded in the report and
    /// the run carries on.
    pub fn merge(&self, subject: &str, files: &[SourceFile], schema: &TemplateSchema) -> Result<MergeOutcome> {
        let mut stamps = StampColumns::resolve(schema, &self.plan.instrument_column, &self.plan.instance_column)?;
        if let Some(column) = &self.plan.subject_column {
            stamps = stamps.with_subject(schema, column, subject)?;
        }

        let placements: Vec<Vec<Placement>> = self
            .plan
            .sources
            .iter()
            .map(|source| {
                source
                    .blocks()
                    .into_iter()
                    .map(|spec| Placement::resolve(spec, schema))
                    .collect::<Result<_>>()
            })
            .collect::<Result<_>>()?;

        let mut run = Run {
            template: OutputTemplate::new(schema.clone(), stamps),
            report: MergeReport::new(subject),
            plan: &self.plan,
        };

        for (source, placements) in self.plan.sources.iter().zip(&placements) {
            let selected: Vec<&SourceFile> = files.iter().filter(|f| source.filter.matches(&f.name)).collect();
            info!(subject, source = %source.name, files = selected.len(), "processing source");
            run.source(source, placements, &selected)?;
        }

        info!(
            subject,
            rows = run.template.row_count(),
            skipped_files = run.report.skipped_files.len(),
            "merge complete"
        );

        Ok(MergeOutcome {
            template: run.template,
            report: run.report,
        })
    }
}

/// State of one merge run
struct Run<'p> {
    template: OutputTemplate,
    report: MergeReport,
    plan: &'p MergePlan,
}

impl Run<'_> {
    fn source(&mut self, source: &SourcePlan, placements: &[Placement], files: &[&SourceFile]) -> Result<()> {
        if files.is_empty() {
            self.skip_all(source, placements, "no matching files");
            return Ok(());
        }

        match &source.kind {
            SourceKind::Table { constant_column, .. } => {
                let combined = combine(files.iter().copied(), &self.plan.delimiters, true);
                self.report.skip_files(combined.skipped);

                let mut table = combined.table;
                if let (Some(constant), false) = (constant_column, table.is_empty()) {
                    table.push_constant_column(constant.name.clone(), constant.value.clone());
                }
                self.place(source, &placements[0], &table, "no rows in any file")
            }
            SourceKind::SectionedExport {
                column,
                require_all,
                sections,
            } => self.sectioned(source, placements, files, column, *require_all, sections),
            SourceKind::Averaged {
                delimiter,
                group_key,
                value_columns,
                ..
            } => {
                let joined = concat_text(files.iter().copied());
                self.report.skip_files(joined.skipped);
                if joined.files == 0 {
                    self.skip_all(source, placements, "no readable files");
                    return Ok(());
                }

                let averaged = delimiter_byte(*delimiter, &source.name)
                    .and_then(|d| parse_delimited(&joined.text, &source.name, ParseOptions::with_delimiter(d)))
                    .and_then(|table| average(&table, group_key, value_columns));

                match averaged {
                    Ok(table) => self.place(source, &placements[0], &table, "no readings"),
                    Err(e) => {
                        warn!(source = %source.name, error = %e, "cannot average readings");
                        self.skip_all(source, placements, e.to_string());
                        Ok(())
                    }
                }
            }
        }
    }

    fn sectioned(
        &mut self,
        source: &SourcePlan,
        placements: &[Placement],
        files: &[&SourceFile],
        column: &str,
        require_all: bool,
        sections: &[SectionPlan],
    ) -> Result<()> {
        let combined = combine(files.iter().copied(), &self.plan.delimiters, false);
        self.report.skip_files(combined.skipped);

        let raw = match RawLines::from_column(&combined.table, column) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(source = %source.name, error = %e, "export has no line column");
                self.skip_all(source, placements, e.to_string());
                return Ok(());
            }
        };

        let mut cursor = SectionCursor::new(&raw.lines);
        let mut tables: Vec<std::result::Result<TidyTable, String>> = Vec::with_capacity(sections.len());

        for plan in sections {
            let section = cursor.next_section(&plan.start_marker, &plan.end_marker_prefix);
            let options = BuildOptions {
                delimiter: plan.delimiter,
                sort_by: plan.sort_by.clone(),
                constant: None,
            };

            let table = match build(&section, &options) {
                Ok(table) if table.is_empty() => Err(format!("section '{}' is empty", plan.start_marker)),
                Ok(table) => Ok(table),
                Err(e) => {
                    warn!(source = %source.name, section = %plan.start_marker, error = %e, "abandoning section");
                    Err(e.to_string())
                }
            };
            tables.push(table);
        }

        if require_all {
            if let Some(reason) = tables.iter().find_map(|t| t.as_ref().err()) {
                let reason = format!("incomplete export: {}", reason);
                self.skip_all(source, placements, reason);
                return Ok(());
            }
        }

        for (table, placement) in tables.iter().zip(placements) {
            match table {
                Ok(table) => self.place(source, placement, table, "no rows")?,
                Err(reason) => self.report.skipped(&source.name, &placement.instrument, reason.as_str()),
            }
        }

        Ok(())
    }

    /// Append one block and record the outcome
    fn place(&mut self, source: &SourcePlan, placement: &Placement, table: &TidyTable, empty_reason: &str) -> Result<()> {
        if table.is_empty() {
            self.report.skipped(&source.name, &placement.instrument, empty_reason);
            return Ok(());
        }

        let written = self.template.append_block(&placement.block(table))?;
        info!(
            source = %source.name,
            instrument = %placement.instrument,
            rows = written.len(),
            "placed block"
        );
        self.report
            .appended(&source.name, &placement.instrument, written.start, written.len());
        Ok(())
    }

    fn skip_all(&mut self, source: &SourcePlan, placements: &[Placement], reason: impl Into<String>) {
        let reason = reason.into();
        warn!(source = %source.name, reason = %reason, "skipping source");
        for placement in placements {
            self.report.skipped(&source.name, &placement.instrument, reason.clone());
        }
    }
}
