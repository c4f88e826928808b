use std::fs;
use std::path::{Path, PathBuf};

use calamine::{DataType, Reader, Xlsx, open_workbook};
use rust_xlsxwriter::Workbook;
use tempfile::tempdir;

use mergebook::backfill::BackfillConfig;
use mergebook::headers::{LocatorConfig, MatcherConfig};
use mergebook::pipeline::{self, RunConfig, SourcePolicy};
use mergebook::progress::ProgressSink;

#[derive(Default)]
struct RecordingSink {
    fractions: Vec<f64>,
}

impl ProgressSink for RecordingSink {
    fn update(&mut self, fraction: f64) {
        self.fractions.push(fraction);
    }
}

fn write_fixture_workbook(path: &Path, rows: &[Vec<&str>]) {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            if !value.is_empty() {
                worksheet
                    .write_string(row_idx as u32, col_idx as u16, *value)
                    .expect("fixture cell written");
            }
        }
    }
    workbook.save(path).expect("fixture workbook saved");
}

fn read_sheet(path: &Path, sheet: &str) -> Vec<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook(path).expect("output workbook opened");
    let range = workbook
        .worksheet_range(sheet)
        .expect("sheet present")
        .expect("sheet readable");
    range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    DataType::Empty => String::new(),
                    other => other.to_string(),
                })
                .collect()
        })
        .collect()
}

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    sources: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempdir().expect("temporary directory");
    let root = dir.path().to_path_buf();
    let sources = root.join("requests");
    fs::create_dir(&sources).expect("sources directory created");

    write_fixture_workbook(
        &root.join("Template.xlsx"),
        &[vec!["DATE", "NAME", "CAMPAIGN", "BANK", "PLACEMENT", "ADDRESS"]],
    );
    fs::write(
        root.join("campaign_list.json"),
        r#"{"0001": {"bank": "First National", "placement": "Metro"}}"#,
    )
    .expect("reference table written");
    fs::write(
        root.join("aliases.json"),
        r#"{"REQUEST DATE": "DATE", "REQUEST NAME": "NAME"}"#,
    )
    .expect("alias map written");

    Fixture {
        _dir: dir,
        root,
        sources,
    }
}

fn run_config(fixture: &Fixture) -> RunConfig {
    RunConfig {
        template: fixture.root.join("Template.xlsx"),
        reference: fixture.root.join("campaign_list.json"),
        alias_map: Some(fixture.root.join("aliases.json")),
        output_dir: fixture.root.clone(),
        label: "ACME".to_string(),
        matcher: MatcherConfig::default(),
        locator: LocatorConfig::default(),
        backfill: BackfillConfig::default(),
        address_column: "ADDRESS".to_string(),
        on_error: SourcePolicy::Skip,
    }
}

#[test]
fn merge_run_produces_aligned_outputs() {
    let fixture = fixture();

    // First file: banner row above the header, aliased template headers, an
    // extra Notes column, and a degenerate single-cell footer row.
    write_fixture_workbook(
        &fixture.sources.join("a_requests.xlsx"),
        &[
            vec!["Quarterly Requests"],
            vec!["Request Date", "Request Name", "Campaign", "Address", "Notes"],
            vec!["2024-01-01", "Jane", "0001", "12 Elm St", "VIP"],
            vec!["TOTAL"],
        ],
    );
    // Second file: different column order, a new Region column, a campaign
    // key missing from the reference table.
    write_fixture_workbook(
        &fixture.sources.join("b_requests.xlsx"),
        &[
            vec!["Name", "Region", "Date", "Campaign"],
            vec!["Bob", "North", "2024-01-02", "9999"],
        ],
    );

    let config = run_config(&fixture);
    let mut sink = RecordingSink::default();
    let report = pipeline::execute(&fixture.sources, &config, &mut sink).expect("run completed");

    assert!(report.success, "unexpected failure: {}", report.message);
    assert!(report.skipped.is_empty());
    assert_eq!(report.artifacts.len(), 2);
    for artifact in &report.artifacts {
        assert!(artifact.exists(), "missing artifact {}", artifact.display());
    }

    let merged = read_sheet(&report.artifacts[0], "Merged");
    assert_eq!(
        merged[0],
        ["DATE", "NAME", "CAMPAIGN", "BANK", "PLACEMENT", "ADDRESS", "Notes", "Region"]
    );
    // The degenerate footer row is gone: header plus two data rows.
    assert_eq!(merged.len(), 3);

    let jane = &merged[1];
    assert_eq!(jane[0], "2024-01-01");
    assert_eq!(jane[1], "Jane");
    assert_eq!(jane[3], "First National");
    assert_eq!(jane[4], "Metro");
    assert_eq!(jane[5], "12 Elm St");
    assert_eq!(jane[6], "VIP");
    assert_eq!(jane[7], "", "rows before Region's discovery stay null there");

    let bob = &merged[2];
    assert_eq!(bob[0], "2024-01-02");
    assert_eq!(bob[3], "", "missing reference key leaves the cell empty");
    assert_eq!(bob[7], "North");

    let addresses = read_sheet(&report.artifacts[1], "Addresses");
    assert_eq!(addresses[0], ["ADDRESS"]);
    assert_eq!(addresses[1], ["12 Elm St"]);

    // Progress: start marker, one unit per file, four trailing units.
    assert_eq!(sink.fractions.len(), 1 + 2 + 4);
    assert!(sink.fractions.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(sink.fractions.last(), Some(&1.0));
    assert_eq!(sink.fractions.iter().filter(|f| **f == 1.0).count(), 1);
}

#[test]
fn template_order_is_preserved_regardless_of_file_order() {
    let fixture = fixture();
    write_fixture_workbook(
        &fixture.sources.join("scrambled.xlsx"),
        &[
            vec!["Address", "Campaign", "Name", "Date"],
            vec!["9 Oak Ave", "0001", "Ada", "2024-02-01"],
        ],
    );

    let config = run_config(&fixture);
    let mut sink = RecordingSink::default();
    let report = pipeline::execute(&fixture.sources, &config, &mut sink).expect("run completed");

    let merged = read_sheet(&report.artifacts[0], "Merged");
    assert_eq!(
        &merged[0][..6],
        ["DATE", "NAME", "CAMPAIGN", "BANK", "PLACEMENT", "ADDRESS"]
    );
    assert_eq!(merged[1][0], "2024-02-01");
    assert_eq!(merged[1][5], "9 Oak Ave");
}

#[test]
fn unreadable_file_is_skipped_and_still_reported() {
    let fixture = fixture();
    write_fixture_workbook(
        &fixture.sources.join("good.xlsx"),
        &[
            vec!["Date", "Name", "Campaign", "Address"],
            vec!["2024-01-01", "Jane", "0001", "12 Elm St"],
        ],
    );
    fs::write(fixture.sources.join("broken.xlsx"), b"not a workbook").expect("bad file written");

    let config = run_config(&fixture);
    let mut sink = RecordingSink::default();
    let report = pipeline::execute(&fixture.sources, &config, &mut sink).expect("run completed");

    assert!(report.success);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].0.ends_with("broken.xlsx"));

    let merged = read_sheet(&report.artifacts[0], "Merged");
    assert_eq!(merged.len(), 2);

    // The skipped file still occupies a unit in the progress sequence.
    assert_eq!(sink.fractions.len(), 1 + 2 + 4);
    assert_eq!(sink.fractions.last(), Some(&1.0));
}

#[test]
fn abort_policy_fails_the_run_on_the_first_bad_file() {
    let fixture = fixture();
    fs::write(fixture.sources.join("broken.xlsx"), b"not a workbook").expect("bad file written");

    let mut config = run_config(&fixture);
    config.on_error = SourcePolicy::Abort;
    let mut sink = RecordingSink::default();
    let result = pipeline::execute(&fixture.sources, &config, &mut sink);
    assert!(result.is_err());
}

#[test]
fn unreadable_reference_table_keeps_the_merged_artifact() {
    let fixture = fixture();
    write_fixture_workbook(
        &fixture.sources.join("requests.xlsx"),
        &[
            vec!["Date", "Name", "Campaign", "Address"],
            vec!["2024-01-01", "Jane", "0001", "12 Elm St"],
        ],
    );

    let mut config = run_config(&fixture);
    config.reference = fixture.root.join("missing.json");
    let mut sink = RecordingSink::default();
    let report = pipeline::execute(&fixture.sources, &config, &mut sink).expect("run completed");

    assert!(!report.success);
    assert_eq!(report.artifacts.len(), 1);
    assert!(report.artifacts[0].exists());
    assert!(report.message.contains("reference table"));
}

#[test]
fn missing_extract_column_keeps_the_merged_artifact() {
    let fixture = fixture();
    write_fixture_workbook(
        &fixture.sources.join("requests.xlsx"),
        &[
            vec!["Date", "Name", "Campaign"],
            vec!["2024-01-01", "Jane", "0001"],
        ],
    );

    let mut config = run_config(&fixture);
    config.address_column = "HOME ADDRESS".to_string();
    let mut sink = RecordingSink::default();
    let report = pipeline::execute(&fixture.sources, &config, &mut sink).expect("run completed");

    assert!(!report.success);
    assert_eq!(report.artifacts.len(), 1);
    assert!(report.artifacts[0].exists());
    assert!(report.message.contains("HOME ADDRESS"));
}

#[test]
fn zero_file_run_reports_the_four_trailing_units() {
    let fixture = fixture();

    let config = run_config(&fixture);
    let mut sink = RecordingSink::default();
    let report = pipeline::execute(&fixture.sources, &config, &mut sink).expect("run completed");

    assert!(report.success);
    let merged = read_sheet(&report.artifacts[0], "Merged");
    assert_eq!(
        merged[0],
        ["DATE", "NAME", "CAMPAIGN", "BANK", "PLACEMENT", "ADDRESS"]
    );
    assert_eq!(sink.fractions, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
}

#[test]
fn malformed_alias_map_aborts_before_any_file_is_touched() {
    let fixture = fixture();
    fs::write(fixture.root.join("aliases.json"), r#"{"A": ["not", "a", "string"]}"#)
        .expect("bad alias map written");
    write_fixture_workbook(
        &fixture.sources.join("requests.xlsx"),
        &[vec!["Date"], vec!["2024-01-01"]],
    );

    let config = run_config(&fixture);
    let mut sink = RecordingSink::default();
    let result = pipeline::execute(&fixture.sources, &config, &mut sink);
    assert!(result.is_err());
    // No progress was reported and no output file was produced.
    assert!(sink.fractions.is_empty());
    let outputs: Vec<_> = fs::read_dir(&fixture.root)
        .expect("output directory listed")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("Output-"))
        .collect();
    assert!(outputs.is_empty());
}
