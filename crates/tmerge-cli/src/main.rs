//! Template merge CLI
//!
//! Command-line tool for merging a subject's device exports into an import
//! template.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tmerge_core::combiner::delimiter_byte;
use tmerge_core::{
    combine, parse_file, save_csv, to_json, DelimiterPolicy, DirectorySource, MergeEngine,
    MergePlan, ParseOptions, RawLines, SectionCursor, SourceFile, SourceKind, TemplateSchema,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tmerge")]
#[command(about = "Merge subject export folders into an import template", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug detail to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge one subject's files into a filled template
    Merge {
        /// Folder holding one sub-folder per subject
        #[arg(short, long)]
        source: PathBuf,

        /// Subject identifier; picks the sub-folder whose name contains it
        #[arg(long)]
        subject: String,

        /// Template CSV whose header row defines the output columns
        #[arg(short, long)]
        template: PathBuf,

        /// Merge plan (JSON); the built-in plan when omitted
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Output format (csv or json)
        #[arg(long, default_value = "csv")]
        format: String,

        /// File name prefix; the subject is appended
        #[arg(long, default_value = "ImportTemplate")]
        prefix: String,

        /// Also write a JSON report of placed and skipped blocks
        #[arg(long)]
        report: bool,
    },

    /// List template columns, or resolve one column to its offset
    Schema {
        /// Template CSV
        #[arg(short, long)]
        template: PathBuf,

        /// Column to resolve
        #[arg(short, long)]
        column: Option<String>,
    },

    /// Show the sections found in a device export
    Sections {
        /// Export file
        #[arg(short, long)]
        file: PathBuf,

        /// Column holding the wrapped lines
        #[arg(short, long, default_value = "Body")]
        column: String,

        /// Delimiter of the export file itself
        #[arg(short, long, default_value = ";")]
        delimiter: char,

        /// Plan whose section markers are searched; the built-in plan when omitted
        #[arg(short, long)]
        plan: Option<PathBuf>,
    },

    /// Parse and display a single delimited file
    Parse {
        /// Path to the file
        #[arg(short, long)]
        file: PathBuf,

        /// Field delimiter
        #[arg(short, long, default_value = ",")]
        delimiter: char,
    },

    /// Write the built-in plan for editing
    CreatePlan {
        /// Output path for the plan file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "tmerge=debug,tmerge_core=debug" } else { "tmerge=info,tmerge_core=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands) -> tmerge_core::Result<()> {
    match command {
        Commands::Merge {
            source,
            subject,
            template,
            plan,
            output,
            format,
            prefix,
            report,
        } => cmd_merge(&source, &subject, &template, plan.as_deref(), &output, &format, &prefix, report),
        Commands::Schema { template, column } => cmd_schema(&template, column.as_deref()),
        Commands::Sections {
            file,
            column,
            delimiter,
            plan,
        } => cmd_sections(&file, &column, delimiter, plan.as_deref()),
        Commands::Parse { file, delimiter } => cmd_parse(&file, delimiter),
        Commands::CreatePlan { output } => cmd_create_plan(&output),
    }
}

fn load_plan(path: Option<&Path>) -> tmerge_core::Result<MergePlan> {
    match path {
        Some(path) => {
            debug!(plan = %path.display(), "loading plan");
            MergePlan::load(path)
        }
        None => Ok(MergePlan::default()),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_merge(
    root: &Path,
    subject: &str,
    template: &Path,
    plan_path: Option<&Path>,
    output_dir: &Path,
    format: &str,
    prefix: &str,
    write_report: bool,
) -> tmerge_core::Result<()> {
    let plan = load_plan(plan_path)?;
    let schema = TemplateSchema::load(template)?;

    let source = DirectorySource::for_subject(root, subject)?.ok_or_else(|| tmerge_core::Error::SourceUnavailable {
        name: subject.to_string(),
        reason: format!("no folder under {} matches the subject", root.display()),
    })?;

    let export = plan.export.clone();
    let outcome = MergeEngine::new(plan).merge_from(subject, &source, &schema)?;

    fs::create_dir_all(output_dir)?;
    let output = match format.to_lowercase().as_str() {
        "csv" => {
            let path = output_dir.join(format!("{}_{}.csv", prefix, subject));
            save_csv(&outcome.template, &path, &export)?;
            path
        }
        "json" => {
            let path = output_dir.join(format!("{}_{}.json", prefix, subject));
            fs::write(&path, to_json(&outcome.template, &export)?)?;
            path
        }
        _ => {
            eprintln!("Unknown format: {}. Supported formats: csv, json", format);
            std::process::exit(1);
        }
    };

    info!(output = %output.display(), rows = outcome.template.row_count(), "wrote template");
    println!("Wrote {} rows to {}", outcome.template.row_count(), output.display());

    for block in outcome.report.skipped_blocks() {
        if let tmerge_core::BlockStatus::Skipped { reason } = &block.status {
            println!("  skipped {} ({}): {}", block.instrument, block.source, reason);
        }
    }
    for file in &outcome.report.skipped_files {
        println!("  skipped file {}: {}", file.name, file.reason);
    }

    if write_report {
        let path = output_dir.join(format!("{}_{}.report.json", prefix, subject));
        outcome.report.save(&path)?;
        println!("Report written to {}", path.display());
    }

    Ok(())
}

fn cmd_schema(template: &Path, column: Option<&str>) -> tmerge_core::Result<()> {
    let schema = TemplateSchema::load(template)?;

    if let Some(column) = column {
        println!("{}\t{}", schema.offset_of(column)?, column);
        return Ok(());
    }

    println!("Template: {}", template.display());
    println!("Columns: {}", schema.width());
    println!();
    for (offset, name) in schema.columns().iter().enumerate() {
        println!("{}\t{}", offset, name);
    }

    Ok(())
}

fn cmd_sections(file: &Path, column: &str, delimiter: char, plan_path: Option<&Path>) -> tmerge_core::Result<()> {
    let plan = load_plan(plan_path)?;
    let bytes = fs::read(file).map_err(|e| tmerge_core::Error::FileRead {
        path: file.to_path_buf(),
        source: e,
    })?;
    let name = file.display().to_string();
    let source_file = SourceFile::new(name.as_str(), bytes);

    let combined = combine([&source_file], &DelimiterPolicy::fixed(delimiter), false);
    if let Some(skipped) = combined.skipped.first() {
        return Err(tmerge_core::Error::CsvParse {
            name,
            message: skipped.reason.clone(),
        });
    }
    let raw = RawLines::from_column(&combined.table, column)?;

    println!("File: {}", file.display());
    println!("Lines: {}", raw.len());
    println!();

    for source in &plan.sources {
        let SourceKind::SectionedExport { sections, .. } = &source.kind else {
            continue;
        };

        let mut cursor = SectionCursor::new(&raw.lines);
        for section_plan in sections {
            let section = cursor.next_section(&section_plan.start_marker, &section_plan.end_marker_prefix);
            if section.is_empty() {
                println!("{:<20} not found", section_plan.start_marker);
            } else {
                println!(
                    "{:<20} {} data row(s), ends at line {}",
                    section_plan.start_marker,
                    section.lines.len().saturating_sub(1),
                    cursor.position()
                );
            }
        }
    }

    Ok(())
}

fn cmd_parse(file: &Path, delimiter: char) -> tmerge_core::Result<()> {
    let name = file.display().to_string();
    let table = parse_file(file, ParseOptions::with_delimiter(delimiter_byte(delimiter, &name)?))?;

    println!("File: {}", file.display());
    println!("Columns: {}", table.column_count());
    println!("Rows: {}", table.row_count());
    println!();

    // Print header
    let header = table.column_names();
    println!("{}", header.join("\t"));
    println!("{}", "-".repeat(header.len() * 12));

    // Print first 10 rows
    for row in table.rows.iter().take(10) {
        let values: Vec<String> = row.cells.iter().map(|c| c.to_string_value()).collect();
        println!("{}", values.join("\t"));
    }

    if table.row_count() > 10 {
        println!("... ({} more rows)", table.row_count() - 10);
    }

    Ok(())
}

fn cmd_create_plan(output: &Path) -> tmerge_core::Result<()> {
    MergePlan::default().save(output)?;
    println!("Created plan: {}", output.display());
    println!();
    println!("Edit the plan to match your template's column names, then run:");
    println!("  tmerge merge --source <dir> --subject <id> --template <csv> --plan {} --output <dir>", output.display());

    Ok(())
}
