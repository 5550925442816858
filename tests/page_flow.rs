use std::fs;
use std::path::Path;

use can_gdp_report::dashboard::{run_page, PageRequest};
use can_gdp_report::loader::FrameCache;
use can_gdp_report::output::{decode_frame_csv, encode_frame_csv, write_frame_csv, write_json};
use can_gdp_report::pages::{self, PagesConfig};
use can_gdp_report::source::CsvDirSource;
use can_gdp_report::ReportError;
use chrono::NaiveDate;
use tempfile::TempDir;

const GDP: &str = "Gross domestic product at market prices";
const ANNUAL_RATES: &str = "Seasonally adjusted at annual rates";
const CHAINED: &str = "Chained (2012) dollars";

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn write_table(dir: &Path, name: &str, header: &str, rows: &[String]) {
    let mut body = format!("\u{feff}{header}\n");
    for r in rows {
        body.push_str(r);
        body.push('\n');
    }
    fs::write(dir.join(name), body).unwrap();
}

fn expenditure_rows(gdp_name: &str, fce_value: &str) -> Vec<String> {
    let mut rows = Vec::new();
    for year in [2020, 2021] {
        for month in ["01", "04", "07", "10"] {
            let date = format!("{year}-{month}");
            let line = |prices: &str, item: &str, value: &str| {
                format!("{date},Canada,2016A000011124,\"{prices}\",{ANNUAL_RATES},\"{item}\",Dollars,{value}")
            };
            rows.push(line(CHAINED, gdp_name, "400"));
            rows.push(line(CHAINED, "Final consumption expenditure", fce_value));
            rows.push(line(CHAINED, "Gross fixed capital formation", "100"));
            rows.push(line(CHAINED, "Statistical discrepancy", "4"));
            rows.push(line("Current prices", "Final consumption expenditure", "999"));
            rows.push(line(CHAINED, "Household final consumption expenditure", "150"));
        }
    }
    rows
}

const EXPENDITURE_HEADER: &str =
    "REF_DATE,GEO,DGUID,Prices,Seasonal adjustment,Estimates,UOM,VALUE";

fn expenditure_dir(gdp_name: &str, fce_value: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_table(
        dir.path(),
        "36100104.csv",
        EXPENDITURE_HEADER,
        &expenditure_rows(gdp_name, fce_value),
    );
    dir
}

fn regions_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let mut rows = Vec::new();
    for (geo, value) in [
        ("Canada", "100"),
        ("Quebec", "20"),
        ("Quebec", "5"),
        ("Alberta", "15"),
        ("British Columbia", "14"),
        ("Nunavut", "x"),
    ] {
        rows.push(format!("2020,{geo},\"{CHAINED}\",Dollars,{value}"));
        rows.push(format!("2020,{geo},Current dollars,Dollars,1"));
    }
    write_table(
        dir.path(),
        "36100402.csv",
        "REF_DATE,GEO,Value,UOM,VALUE",
        &rows,
    );
    dir
}

fn full_range() -> PageRequest {
    PageRequest {
        start: d(2020, 1, 1),
        end: d(2021, 12, 31),
        selection: None,
    }
}

#[test]
fn expenditure_page_reports_shares_of_gdp() {
    let dir = expenditure_dir(GDP, "200");
    let source = CsvDirSource::new(dir.path());
    let cache = FrameCache::new();
    let page = pages::expenditure();

    let view = run_page(&page, &source, &cache, &full_range()).unwrap();
    assert!(view.warnings.is_empty());
    // 2 years x 4 quarters x 4 allowed items on the chained basis.
    assert_eq!(view.filtered.len(), 32);

    let c = &view.contribution;
    assert_eq!(c.annual.years, vec![2020, 2021]);
    assert_eq!(c.annual.value(2021, GDP), Some(1600.0));
    assert_eq!(c.percentages.value(2021, "Final consumption expenditure"), Some(50.0));
    assert_eq!(c.percentages.value(2020, "Gross fixed capital formation"), Some(25.0));
    assert_eq!(c.percentages.value(2020, "Statistical discrepancy"), Some(1.0));
    assert!(c.percentages.column_index(GDP).is_none());
    assert_eq!(c.latest.len(), c.annual.columns.len() - 1);

    let chart = view.chart.as_ref().unwrap();
    assert_eq!(chart.columns, vec!["Final consumption expenditure"]);
    assert_eq!(view.bars[0].short_label, view.bars[0].category);
}

#[test]
fn inverted_range_warns_and_renders_empty_tables() {
    let dir = expenditure_dir(GDP, "200");
    let source = CsvDirSource::new(dir.path());
    let request = PageRequest {
        start: d(2021, 6, 1),
        end: d(2021, 1, 1),
        selection: None,
    };
    let view = run_page(&pages::expenditure(), &source, &FrameCache::new(), &request).unwrap();
    assert!(matches!(
        view.warnings.as_slice(),
        [ReportError::InvalidDateRange { .. }]
    ));
    assert!(view.filtered.is_empty());
    assert!(view.contribution.latest.is_empty());
    assert!(view.bars.is_empty());
}

#[test]
fn renamed_total_line_is_contract_drift() {
    let dir = expenditure_dir("Gross domestic product", "200");
    let source = CsvDirSource::new(dir.path());
    let err = run_page(&pages::expenditure(), &source, &FrameCache::new(), &full_range())
        .unwrap_err();
    assert!(matches!(err, ReportError::MissingTotalSeries { .. }));
    assert!(err.is_contract_drift());
}

#[test]
fn strict_page_rejects_unreadable_values() {
    let dir = expenditure_dir(GDP, "n/a");
    let source = CsvDirSource::new(dir.path());
    let err = run_page(&pages::expenditure(), &source, &FrameCache::new(), &full_range())
        .unwrap_err();
    assert!(matches!(err, ReportError::Coercion { .. }));
}

#[test]
fn regions_merge_duplicates_and_use_canada_as_total() {
    let dir = regions_dir();
    let source = CsvDirSource::new(dir.path());
    let view = run_page(&pages::regions(), &source, &FrameCache::new(), &full_range()).unwrap();
    let c = &view.contribution;
    assert_eq!(c.annual.value(2020, "Quebec"), Some(25.0));
    assert_eq!(c.percentages.value(2020, "Quebec"), Some(25.0));
    // Lenient coercion: the suppressed cell counts as zero in the pivot.
    assert_eq!(c.annual.value(2020, "Nunavut"), Some(0.0));

    let chart = view.chart.unwrap();
    assert_eq!(chart.columns, vec!["Quebec", "Alberta", "British Columbia"]);
    let bc = view.bars.iter().find(|b| b.category == "British Columbia").unwrap();
    assert_eq!(bc.short_label, "Columbia");
}

#[test]
fn explicit_empty_selection_charts_nothing() {
    let dir = regions_dir();
    let source = CsvDirSource::new(dir.path());
    let request = PageRequest {
        selection: Some(Vec::new()),
        ..full_range()
    };
    let view = run_page(&pages::regions(), &source, &FrameCache::new(), &request).unwrap();
    assert!(view.chart.is_none());
    assert!(!view.contribution.latest.is_empty());
}

#[test]
fn selection_of_unknown_regions_charts_nothing() {
    let dir = regions_dir();
    let source = CsvDirSource::new(dir.path());
    let request = PageRequest {
        selection: Some(vec!["Quebek".to_string()]),
        ..full_range()
    };
    let view = run_page(&pages::regions(), &source, &FrameCache::new(), &request).unwrap();
    assert!(view.selection.is_empty());
    assert!(view.chart.is_none());
}

#[test]
fn unknown_names_are_dropped_from_a_mixed_selection() {
    let dir = regions_dir();
    let source = CsvDirSource::new(dir.path());
    let request = PageRequest {
        selection: Some(vec!["Quebek".to_string(), "Alberta".to_string()]),
        ..full_range()
    };
    let view = run_page(&pages::regions(), &source, &FrameCache::new(), &request).unwrap();
    assert_eq!(view.selection, vec!["Alberta"]);
    assert_eq!(view.chart.unwrap().columns, vec!["Alberta"]);
}

#[test]
fn one_failing_page_leaves_the_others_working() {
    let dir = expenditure_dir(GDP, "200");
    let source = CsvDirSource::new(dir.path());
    let cache = FrameCache::new();
    let config = PagesConfig::default();

    let regions = run_page(config.find("regions").unwrap(), &source, &cache, &full_range());
    assert!(matches!(regions, Err(ReportError::SourceUnavailable { .. })));

    let expenditure = run_page(config.find("expenditure").unwrap(), &source, &cache, &full_range());
    assert!(expenditure.is_ok());
}

#[test]
fn cached_frame_survives_source_removal() {
    let dir = expenditure_dir(GDP, "200");
    let source = CsvDirSource::new(dir.path());
    let cache = FrameCache::new();
    let page = pages::expenditure();

    run_page(&page, &source, &cache, &full_range()).unwrap();
    fs::remove_file(dir.path().join("36100104.csv")).unwrap();
    let again = run_page(&page, &source, &cache, &full_range()).unwrap();
    assert_eq!(again.filtered.len(), 32);
}

#[test]
fn exports_round_trip_through_csv_and_json() {
    let dir = expenditure_dir(GDP, "200");
    let source = CsvDirSource::new(dir.path());
    let page = pages::expenditure();
    let view = run_page(&page, &source, &FrameCache::new(), &full_range()).unwrap();

    let out = tempfile::tempdir().unwrap();
    let csv_path = out.path().join(&page.csv_file_name);
    write_frame_csv(&csv_path, &view.filtered, &page.category_label).unwrap();
    let text = fs::read_to_string(&csv_path).unwrap();
    assert!(text.starts_with("Date,Item,Value\n"));
    assert_eq!(text, encode_frame_csv(&view.filtered, "Item").unwrap());

    let decoded = decode_frame_csv(&text, &view.filtered.table_code).unwrap();
    assert_eq!(decoded, view.filtered);

    let json_path = out.path().join("contribution.json");
    write_json(&json_path, &view.contribution).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json["total"], GDP);
    assert_eq!(json["annual"]["years"][1], 2021);
}
