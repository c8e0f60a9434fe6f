//! End-to-end tests for the treeprice pipeline.
//!
//! These tests drive the full flow from raw JSON and CSV bytes to the
//! rendered averages, both through the library crates and through the
//! compiled binary.

use std::path::Path;
use std::process::Command;

use tokio_util::sync::CancellationToken;
use treeprice_aggregator::{Aggregator, AggregatorConfig, PipelineConfig, pipeline, report};
use treeprice_core::{DecimalContext, Error, NumericMode, Rounding, TreeSizes};
use treeprice_groupify::GroupClassifier;
use treeprice_parsers::{AttributeParser, ParserOptions};
use treeprice_streams::{CsvRecordStream, JsonTokenStream};

// ── Fixtures ─────────────────────────────────────────────────────────────

const TREES: &str = r#"{
  "short": {
    "drive": {"Abbey Drive": 12.5, "Bath Avenue": 3},
    "road": {"Cork Road": 8}
  },
  "tall": {
    "street": {"Dame Street": 25},
    "lane": {"Quiet Lane": null}
  }
}"#;

const PROPERTIES: &str = "\u{feff}Date of Sale,Address,Street Name,Price\r\n\
01/01/2020,\"1 Abbey Drive, Dublin\",ABBEY DRIVE,\"€100,000.00\"\r\n\
02/01/2020,2 Bath Avenue,bath  avenue,€200000\r\n\
03/01/2020,3 Cork Road,Cork Road,€300000.01\r\n\
04/01/2020,4 Dame Street,Dame Street,€450000\r\n\
05/01/2020,5 Dame Street,Dame Street,€550000\r\n\
06/01/2020,6 Nowhere,Nowhere Street,€999\r\n\
07/01/2020,7 Dame Street,Dame Street,POA\r\n";

async fn run_pipeline(
    trees: &'static str,
    properties: &'static str,
    mode: NumericMode,
    cancel: &CancellationToken,
) -> Result<Vec<(String, Option<String>)>, Error> {
    let classifier = GroupClassifier::new(JsonTokenStream::new(trees.as_bytes()), TreeSizes);
    let records = CsvRecordStream::new(properties.as_bytes()).await?;
    let options = ParserOptions::by_names("Street Name", "Price").with_mode(mode);
    let parser = AttributeParser::new(records, &options)?;

    let outcome = pipeline::run(
        classifier,
        parser,
        &Aggregator::default(),
        &PipelineConfig::default(),
        cancel,
    )
    .await?;
    Ok(outcome
        .averages
        .iter()
        .map(|avg| (avg.group.clone(), avg.rendered()))
        .collect())
}

fn row(group: &str, average: Option<&str>) -> (String, Option<String>) {
    (group.to_string(), average.map(str::to_string))
}

// ── Library pipeline ─────────────────────────────────────────────────────

#[tokio::test]
async fn decimal_averages_per_tree_size() {
    let rows = run_pipeline(TREES, PROPERTIES, NumericMode::Decimal, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        rows,
        vec![
            // (100000.00 + 200000 + 300000.01) / 3 = 200000.003...
            row("short", Some("200000.00")),
            row("tall", Some("500000.00")),
        ]
    );
}

#[tokio::test]
async fn float_mode_matches_decimal_here() {
    let rows = run_pipeline(TREES, PROPERTIES, NumericMode::Float, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(rows[0], row("short", Some("200000.00")));
    assert_eq!(rows[1], row("tall", Some("500000.00")));
}

#[tokio::test]
async fn group_without_prices_is_null() {
    let rows = run_pipeline(
        r#"{"short": {"a": {"Lonely Lane": 1}}, "tall": {}}"#,
        "Street Name,Price\nOther Road,5\n",
        NumericMode::Decimal,
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(rows, vec![row("short", None), row("tall", None)]);
}

#[tokio::test]
async fn empty_document_gives_no_groups() {
    let rows = run_pipeline(
        "{}",
        "Street Name,Price\nx,1\n",
        NumericMode::Decimal,
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn malformed_json_fails_the_run() {
    let err = run_pipeline(
        r#"{"short": {"a": {"b": 1}"#,
        PROPERTIES,
        NumericMode::Decimal,
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Stream(_)));
}

#[tokio::test]
async fn cancellation_is_distinct() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = run_pipeline(TREES, PROPERTIES, NumericMode::Decimal, &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn custom_scale_and_rounding() {
    let classifier = GroupClassifier::new(
        JsonTokenStream::new(r#"{"tall": {"x": {"a": 1}}}"#.as_bytes()),
        TreeSizes,
    );
    let records = CsvRecordStream::new("s,p\na,0.125\na,0.125\n".as_bytes())
        .await
        .unwrap();
    let parser = AttributeParser::new(records, &ParserOptions::by_indexes(0, 1)).unwrap();
    let aggregator = Aggregator::new(AggregatorConfig {
        context: DecimalContext {
            precision: 50,
            scale: 2,
            rounding: Rounding::HalfUp,
        },
        group_queue: 2,
    });

    let outcome = pipeline::run(
        classifier,
        parser,
        &aggregator,
        &PipelineConfig::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(report::to_text(&outcome.averages), "tall  0.13\n");
}

// ── Binary ───────────────────────────────────────────────────────────────

fn treeprice(dir: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_treeprice"))
        .args(["--config", &dir.join("absent.toml").to_string_lossy()])
        .args(args)
        .env_remove("TREEPRICE_TREES")
        .env_remove("TREEPRICE_PROPERTIES")
        .env_remove("TREEPRICE_NUMERIC_MODE")
        .env("RUST_LOG", "warn")
        .output()
        .unwrap()
}

#[test]
fn binary_prints_json() {
    let dir = tempfile::tempdir().unwrap();
    let trees = dir.path().join("trees.json");
    let properties = dir.path().join("prices.csv");
    std::fs::write(&trees, TREES).unwrap();
    std::fs::write(&properties, PROPERTIES).unwrap();

    let output = treeprice(
        dir.path(),
        &[
            "run",
            "--trees",
            &trees.to_string_lossy(),
            "--properties",
            &properties.to_string_lossy(),
        ],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        json,
        serde_json::json!([
            {"group": "short", "average": "200000.00"},
            {"group": "tall", "average": "500000.00"},
        ])
    );
}

#[test]
fn binary_fails_on_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let output = treeprice(
        dir.path(),
        &["run", "--trees", &dir.path().join("nope.json").to_string_lossy()],
    );
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn binary_lists_groups() {
    let dir = tempfile::tempdir().unwrap();
    let trees = dir.path().join("trees.json");
    std::fs::write(&trees, TREES).unwrap();

    let output = treeprice(dir.path(), &["groups", "--trees", &trees.to_string_lossy()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--- short (3) ---"));
    assert!(stdout.contains("abbey drive"));
    assert!(stdout.contains("--- tall (1) ---"));
}
