use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::backfill::{self, BackfillConfig};
use crate::error::{MergeError, Result};
use crate::extract;
use crate::headers::{AliasMap, HeaderMatcher, LocatorConfig, MatcherConfig};
use crate::io::{excel_read, excel_write, reference};
use crate::merge::{MergedTable, SheetPlan, SourceSheet, Unifier, materialize_sheet};
use crate::progress::{ProgressReporter, ProgressSink};

/// What to do when one source file cannot be ingested.
///
/// Under `Skip` the file is recorded in the run report and the run carries
/// on; its progress unit is still emitted so the reported sequence never
/// misses a step. `Abort` fails the whole run on the first bad file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourcePolicy {
    #[default]
    Skip,
    Abort,
}

/// Everything a merge run needs besides the source directory.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub template: PathBuf,
    pub reference: PathBuf,
    pub alias_map: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Collection label embedded in the output file names.
    pub label: String,
    pub matcher: MatcherConfig,
    pub locator: LocatorConfig,
    pub backfill: BackfillConfig,
    pub address_column: String,
    pub on_error: SourcePolicy,
}

/// Structured outcome returned to the caller. Step-scoped failures after
/// the merged file is persisted (reference table unreadable, extract column
/// missing) come back as `success == false` with the surviving artifacts.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub success: bool,
    pub message: String,
    pub artifacts: Vec<PathBuf>,
    /// `(file, reason)` for sources skipped under [`SourcePolicy::Skip`].
    pub skipped: Vec<(PathBuf, String)>,
}

impl RunReport {
    fn step_failed(
        error: &MergeError,
        artifacts: Vec<PathBuf>,
        skipped: Vec<(PathBuf, String)>,
    ) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            artifacts,
            skipped,
        }
    }
}

/// Runs one merge: ingest every workbook under `sources`, align rows to the
/// template, backfill, extract the address column, and fit columns, with a
/// progress unit after each step.
///
/// Configuration problems (template, alias map) and failures before the
/// merged file exists are returned as errors; later step-scoped failures
/// are folded into the report so already-written artifacts are not lost.
#[instrument(
    level = "info",
    skip_all,
    fields(sources = %sources.display(), label = %config.label)
)]
pub fn execute(
    sources: &Path,
    config: &RunConfig,
    sink: &mut dyn ProgressSink,
) -> Result<RunReport> {
    let template = excel_read::read_template_header(&config.template)?;
    info!(columns = template.len(), "template header loaded");

    let aliases = match &config.alias_map {
        Some(path) => AliasMap::from_pairs(reference::load_alias_pairs(path)?)?,
        None => AliasMap::default(),
    };
    let matcher = HeaderMatcher::new(config.matcher);

    let files = list_source_files(sources)?;
    info!(files = files.len(), "source files discovered");

    let mut reporter = ProgressReporter::new(sink, files.len());
    reporter.begin();

    // Discovery pass: locate headers and grow the output schema across all
    // files before any row is materialised.
    let mut planned: Vec<(SourceSheet, SheetPlan)> = Vec::new();
    let mut skipped: Vec<(PathBuf, String)> = Vec::new();
    let mut unifier = Unifier::new(template.clone(), &matcher, &aliases);
    for file in &files {
        match excel_read::read_source_workbook(file, &template, &matcher, &aliases, &config.locator)
        {
            Ok(sheets) => {
                for sheet in sheets {
                    let plan = unifier.plan_sheet(&sheet.headers);
                    planned.push((sheet, plan));
                }
            }
            Err(error) => match config.on_error {
                SourcePolicy::Abort => return Err(error),
                SourcePolicy::Skip => {
                    warn!(file = %file.display(), %error, "skipping source file");
                    skipped.push((file.clone(), error.to_string()));
                }
            },
        }
        reporter.complete_unit();
    }

    // Materialisation pass against the now-final schema.
    let schema = unifier.into_schema();
    let width = schema.len();
    let rows: Vec<_> = planned
        .iter()
        .flat_map(|(sheet, plan)| materialize_sheet(sheet, plan, width))
        .collect();
    let mut table = MergedTable::new(schema, rows);
    info!(
        columns = table.schema.len(),
        rows = table.rows.len(),
        "merged dataset materialised"
    );

    let (merged_path, address_path) = output_paths(config);
    excel_write::write_merged(&merged_path, &table, false)?;
    reporter.complete_unit();

    backfill::drop_degenerate_rows(&mut table);
    let reference_table = match reference::load_reference_table(&config.reference) {
        Ok(loaded) => loaded,
        Err(error) => {
            warn!(%error, "fill aborted, keeping merged output");
            excel_write::write_merged(&merged_path, &table, false)?;
            return Ok(RunReport::step_failed(&error, vec![merged_path], skipped));
        }
    };
    backfill::fill_missing_values(&mut table, &reference_table, &config.backfill);
    excel_write::write_merged(&merged_path, &table, false)?;
    reporter.complete_unit();

    let address = match extract::extract_column(&table, &config.address_column) {
        Ok(address) => address,
        Err(error) => {
            warn!(%error, "extraction aborted, keeping merged output");
            return Ok(RunReport::step_failed(&error, vec![merged_path], skipped));
        }
    };
    excel_write::write_extract(&address_path, &address, false)?;
    reporter.complete_unit();

    excel_write::write_merged(&merged_path, &table, true)?;
    excel_write::write_extract(&address_path, &address, true)?;
    reporter.complete_unit();

    let ingested = files.len() - skipped.len();
    Ok(RunReport {
        success: true,
        message: format!("merged {ingested} source file(s) for {}", config.label),
        artifacts: vec![merged_path, address_path],
        skipped,
    })
}

fn list_source_files(sources: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(sources)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    // Directory order is platform-dependent; first-seen column order must
    // not be.
    files.sort();
    Ok(files)
}

/// Output names embed the collection label, the current date, and a random
/// disambiguator so concurrent runs over the same directory never collide.
fn output_paths(config: &RunConfig) -> (PathBuf, PathBuf) {
    let date = Local::now().format("%Y-%m-%d");
    let nonce = Uuid::new_v4().simple().to_string();
    let nonce = &nonce[..8];
    let merged = config
        .output_dir
        .join(format!("Output-{}-{date}-{nonce}.xlsx", config.label));
    let address = config
        .output_dir
        .join(format!("Output-Address-{}-{date}-{nonce}.xlsx", config.label));
    (merged, address)
}
