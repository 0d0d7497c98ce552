//! Declarative description of which sources land where in the template
//!
//! A plan is stored as JSON. Every destination column is named, never
//! numbered; names are resolved against the template schema at merge time.

use crate::combiner::DelimiterPolicy;
use crate::error::{Error, Result};
use crate::export::ExportOptions;
use crate::source::FileFilter;
use crate::table::CellValue;
use crate::tidy::ConstantColumn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// The full merge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergePlan {
    /// Column receiving each block's instrument name
    pub instrument_column: String,
    /// Column receiving each row's instance number
    pub instance_column: String,
    /// Column receiving the subject identifier, if any
    #[serde(default)]
    pub subject_column: Option<String>,
    /// Delimiter selection for whole-file parsing
    #[serde(default)]
    pub delimiters: DelimiterPolicy,
    /// Sources in append order
    pub sources: Vec<SourcePlan>,
    #[serde(default)]
    pub export: ExportOptions,
}

/// One data source and how it is shaped before placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePlan {
    pub name: String,
    pub filter: FileFilter,
    #[serde(flatten)]
    pub kind: SourceKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    /// Whole-file tables stacked across files
    Table {
        /// Column added to the combined table before placement
        #[serde(default)]
        constant_column: Option<ConstantColumn>,
        block: BlockSpec,
    },
    /// Export files wrapping a multi-section device file in one column
    SectionedExport {
        #[serde(default = "default_export_column")]
        column: String,
        /// Skip every block when any section comes back empty
        #[serde(default = "default_true")]
        require_all: bool,
        sections: Vec<SectionPlan>,
    },
    /// Readings joined across files and averaged per key
    Averaged {
        delimiter: char,
        group_key: String,
        value_columns: Vec<String>,
        block: BlockSpec,
    },
}

/// One section of a device export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionPlan {
    pub start_marker: String,
    pub end_marker_prefix: String,
    #[serde(default = "default_row_delimiter")]
    pub delimiter: char,
    #[serde(default)]
    pub sort_by: Option<String>,
    pub block: BlockSpec,
}

/// Where a table goes in the template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSpec {
    pub instrument: String,
    /// Destination column of the table's first column
    pub start_column: String,
    #[serde(default = "default_instance_start")]
    pub instance_start: i64,
    /// Column stamped with a fixed value on every row of the block
    #[serde(default)]
    pub constant: Option<ConstantSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantSpec {
    pub column: String,
    pub value: CellValue,
}

fn default_export_column() -> String {
    "Body".to_string()
}

fn default_true() -> bool {
    true
}

fn default_row_delimiter() -> char {
    ','
}

fn default_instance_start() -> i64 {
    1
}

impl BlockSpec {
    pub fn new(instrument: impl Into<String>, start_column: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            start_column: start_column.into(),
            instance_start: 1,
            constant: None,
        }
    }

    /// Mark every row of the block with `value` in `column`
    pub fn with_constant(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.constant = Some(ConstantSpec {
            column: column.into(),
            value: value.into(),
        });
        self
    }
}

impl SourcePlan {
    /// Every block this source can produce, in append order
    pub fn blocks(&self) -> Vec<&BlockSpec> {
        match &self.kind {
            SourceKind::Table { block, .. } | SourceKind::Averaged { block, .. } => vec![block],
            SourceKind::SectionedExport { sections, .. } => sections.iter().map(|s| &s.block).collect(),
        }
    }
}

impl MergePlan {
    /// Load a plan from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the plan as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Every destination column name the plan refers to
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut columns = vec![self.instrument_column.as_str(), self.instance_column.as_str()];
        columns.extend(self.subject_column.as_deref());
        for source in &self.sources {
            for block in source.blocks() {
                columns.push(&block.start_column);
                if let Some(constant) = &block.constant {
                    columns.push(&constant.column);
                }
            }
        }
        columns
    }
}

impl Default for MergePlan {
    /// The sleep-study import: ring report, device export, air monitor
    fn default() -> Self {
        let completed = CellValue::Integer(2);

        Self {
            instrument_column: "redcap_repeat_instrument".to_string(),
            instance_column: "redcap_repeat_instance".to_string(),
            subject_column: Some("record_id".to_string()),
            delimiters: DelimiterPolicy::default().with_rule("fitbit_export", ';'),
            sources: vec![
                SourcePlan {
                    name: "report".to_string(),
                    filter: FileFilter::containing("SIReport"),
                    kind: SourceKind::Table {
                        constant_column: Some(ConstantColumn::new("complete", completed.clone())),
                        block: BlockSpec::new("sleepimage_ring", "patient_id"),
                    },
                },
                SourcePlan {
                    name: "fitbit".to_string(),
                    filter: FileFilter::containing("fitbit_export"),
                    kind: SourceKind::SectionedExport {
                        column: default_export_column(),
                        require_all: true,
                        sections: vec![
                            SectionPlan {
                                start_marker: "Activities".to_string(),
                                end_marker_prefix: "Sleep".to_string(),
                                delimiter: ',',
                                sort_by: None,
                                block: BlockSpec::new("fitbit", "date_fb")
                                    .with_constant("fitbit_complete", completed.clone()),
                            },
                            SectionPlan {
                                start_marker: "Sleep".to_string(),
                                end_marker_prefix: "Food Log".to_string(),
                                delimiter: ',',
                                sort_by: Some("Start Time".to_string()),
                                block: BlockSpec::new("fitbit_f530f4", "start_time_fitbit_dc5002")
                                    .with_constant("fitbit_f530f4_complete", completed.clone()),
                            },
                        ],
                    },
                },
                SourcePlan {
                    name: "air".to_string(),
                    filter: FileFilter::containing("AirVisual_values"),
                    kind: SourceKind::Averaged {
                        delimiter: ';',
                        group_key: "Date".to_string(),
                        value_columns: [
                            "PM2_5(ug/m3)",
                            "AQI(US)",
                            "PM1(ug/m3)",
                            "PM10(ug/m3)",
                            "Temperature(F)",
                            "Humidity(%RH)",
                            "CO2(ppm)",
                        ]
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                        block: BlockSpec::new("iq_air", "date_iq").with_constant("iq_air_complete", completed),
                    },
                },
            ],
            export: ExportOptions {
                drop_trailing_columns: 1,
            },
        }
    }
}
