//! Diagnostics for one merge run
//!
//! Records which blocks were placed, which were skipped and why, and which
//! input files were dropped along the way, so callers can tell "no data for
//! this subject" apart from a failed merge.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// An input file that contributed nothing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

impl SkippedFile {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// What happened to one instrument block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BlockStatus {
    Appended { first_row: usize, rows: usize },
    Skipped { reason: String },
}

/// Outcome of one instrument block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReport {
    /// Plan source the block belongs to
    pub source: String,
    pub instrument: String,
    #[serde(flatten)]
    pub status: BlockStatus,
}

/// Record of one merge run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeReport {
    pub subject: String,
    pub generated_at: DateTime<Utc>,
    pub blocks: Vec<BlockReport>,
    pub skipped_files: Vec<SkippedFile>,
}

impl MergeReport {
    /// Create an empty report for a subject
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            generated_at: Utc::now(),
            blocks: Vec::new(),
            skipped_files: Vec::new(),
        }
    }

    pub fn appended(&mut self, source: &str, instrument: &str, first_row: usize, rows: usize) {
        self.blocks.push(BlockReport {
            source: source.to_string(),
            instrument: instrument.to_string(),
            status: BlockStatus::Appended { first_row, rows },
        });
    }

    pub fn skipped(&mut self, source: &str, instrument: &str, reason: impl Into<String>) {
        self.blocks.push(BlockReport {
            source: source.to_string(),
            instrument: instrument.to_string(),
            status: BlockStatus::Skipped {
                reason: reason.into(),
            },
        });
    }

    pub fn skip_files(&mut self, files: impl IntoIterator<Item = SkippedFile>) {
        self.skipped_files.extend(files);
    }

    /// Total rows written by all blocks
    pub fn appended_rows(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| match b.status {
                BlockStatus::Appended { rows, .. } => rows,
                BlockStatus::Skipped { .. } => 0,
            })
            .sum()
    }

    /// Whether any block placed data
    pub fn has_data(&self) -> bool {
        self.appended_rows() > 0
    }

    /// Blocks that did not place data
    pub fn skipped_blocks(&self) -> impl Iterator<Item = &BlockReport> {
        self.blocks
            .iter()
            .filter(|b| matches!(b.status, BlockStatus::Skipped { .. }))
    }

    /// Find the report for an instrument
    pub fn block(&self, instrument: &str) -> Option<&BlockReport> {
        self.blocks.iter().find(|b| b.instrument == instrument)
    }

    /// Load a report from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the report as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
