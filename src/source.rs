//! Upstream table sources.
//!
//! A source turns a table code such as `36-10-0104-01` into a [`RawTable`].
//! Statistics Canada publishes each table as a zipped full-table CSV; the
//! same file can be downloaded ahead of time and read from a directory.
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::time::Duration;

use csv::ReaderBuilder;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ReportError, Result};
use crate::types::RawTable;

pub const STATCAN_WDS_URL: &str = "https://www150.statcan.gc.ca/t1/wds/rest";

pub trait TableSource {
    fn fetch(&self, table_code: &str) -> Result<RawTable>;
}

/// `36-10-0104-01` -> `36100104`. The trailing view number is not part of
/// the product id.
pub fn product_id(table_code: &str) -> String {
    let digits: String = table_code.chars().filter(char::is_ascii_digit).collect();
    if digits.len() >= 10 {
        digits[..8].to_string()
    } else {
        digits
    }
}

pub fn read_raw_csv<R: Read>(reader: R) -> std::result::Result<RawTable, csv::Error> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        match result {
            Ok(rec) => rows.push(rec.iter().map(str::to_string).collect()),
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(skipped, "skipped undecodable records");
    }
    Ok(RawTable {
        headers,
        rows,
        skipped,
    })
}

/// Reads full-table CSV files saved in a local directory, named either
/// `<product id>.csv` or `<table code>.csv`.
#[derive(Debug, Clone)]
pub struct CsvDirSource {
    dir: PathBuf,
}

impl CsvDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn candidates(&self, table_code: &str) -> [PathBuf; 2] {
        [
            self.dir.join(format!("{}.csv", product_id(table_code))),
            self.dir.join(format!("{}.csv", table_code)),
        ]
    }
}

impl TableSource for CsvDirSource {
    fn fetch(&self, table_code: &str) -> Result<RawTable> {
        let Some(path) = self.candidates(table_code).into_iter().find(|p| p.is_file()) else {
            return Err(ReportError::source_unavailable(
                table_code,
                format!("no CSV for this table in {}", self.dir.display()),
            ));
        };
        debug!(path = %path.display(), "reading table from disk");
        let file = std::fs::File::open(&path)
            .map_err(|e| ReportError::source_unavailable(table_code, e))?;
        read_raw_csv(file).map_err(|e| ReportError::source_unavailable(table_code, e))
    }
}

#[derive(Debug, Deserialize)]
struct DownloadLink {
    status: String,
    object: String,
}

/// Statistics Canada Web Data Service client. Calls are blocking; the
/// requesting page waits for the download.
#[derive(Debug, Clone)]
pub struct StatCanSource {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl StatCanSource {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReportError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn download_link(&self, table_code: &str) -> Result<String> {
        let url = format!(
            "{}/getFullTableDownloadCSV/{}/en",
            self.base_url,
            product_id(table_code)
        );
        debug!(%url, "requesting download link");
        let link: DownloadLink = self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| ReportError::source_unavailable(table_code, e))?;
        if link.status != "SUCCESS" {
            return Err(ReportError::source_unavailable(
                table_code,
                format!("download service answered {}", link.status),
            ));
        }
        Ok(link.object)
    }
}

impl TableSource for StatCanSource {
    fn fetch(&self, table_code: &str) -> Result<RawTable> {
        let zip_url = self.download_link(table_code)?;
        debug!(url = %zip_url, "downloading table archive");
        let bytes = self
            .client
            .get(&zip_url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.bytes())
            .map_err(|e| ReportError::source_unavailable(table_code, e))?;

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ReportError::source_unavailable(table_code, e))?;
        let entry_name = format!("{}.csv", product_id(table_code));
        let entry = archive
            .by_name(&entry_name)
            .map_err(|e| ReportError::source_unavailable(table_code, e))?;
        read_raw_csv(entry).map_err(|e| ReportError::source_unavailable(table_code, e))
    }
}
