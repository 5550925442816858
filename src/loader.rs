use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ReportError, Result};
use crate::source::TableSource;
use crate::types::{Observation, RawTable, SeriesFrame};
use crate::util::{format_int, parse_f64_safe, parse_ref_date};

/// Source column names that become Date, Category and Value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    pub date: String,
    pub category: String,
    pub value: String,
}

/// Keep only rows whose `column` equals `equals`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qualifier {
    pub column: String,
    pub equals: String,
}

impl Qualifier {
    pub fn new(column: &str, equals: &str) -> Self {
        Self {
            column: column.to_string(),
            equals: equals.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coercion {
    /// Unreadable values become missing.
    Lenient,
    /// Unreadable values abort the load.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadSpec {
    pub table_code: String,
    pub columns: ColumnMap,
    #[serde(default)]
    pub qualifiers: Vec<Qualifier>,
    #[serde(default)]
    pub allowlist: Option<Vec<String>>,
    pub value_coercion: Coercion,
    /// Sum rows sharing a (date, category) pair.
    #[serde(default)]
    pub merge_duplicates: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    /// Records the reader dropped before cleaning.
    pub skipped_records: usize,
    pub kept_rows: usize,
    pub qualifier_rejected: usize,
    pub allowlist_rejected: usize,
    pub missing_values: usize,
    pub merged_duplicates: usize,
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(String::as_str).unwrap_or("").trim()
}

fn resolve(raw: &RawTable, spec: &LoadSpec, column: &str) -> Result<usize> {
    raw.column(column).ok_or_else(|| ReportError::MissingColumn {
        table_code: spec.table_code.clone(),
        column: column.to_string(),
    })
}

/// Rename, filter and type a raw table into a [`SeriesFrame`].
pub fn clean(raw: &RawTable, spec: &LoadSpec) -> Result<(SeriesFrame, LoadReport)> {
    let date_idx = resolve(raw, spec, &spec.columns.date)?;
    let cat_idx = resolve(raw, spec, &spec.columns.category)?;
    let value_idx = resolve(raw, spec, &spec.columns.value)?;
    let qualifiers = spec
        .qualifiers
        .iter()
        .map(|q| -> Result<(usize, &str)> {
            Ok((resolve(raw, spec, &q.column)?, q.equals.as_str()))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut report = LoadReport {
        total_rows: raw.rows.len(),
        skipped_records: raw.skipped,
        ..LoadReport::default()
    };
    let mut observations: Vec<Observation> = Vec::new();

    for (i, row) in raw.rows.iter().enumerate() {
        // Line numbers as seen in the file, header being line 1.
        let line = i + 2;

        if !qualifiers.iter().all(|(idx, want)| cell(row, *idx) == *want) {
            report.qualifier_rejected += 1;
            continue;
        }

        let category = cell(row, cat_idx);
        if let Some(allow) = &spec.allowlist {
            if !allow.iter().any(|a| a == category) {
                report.allowlist_rejected += 1;
                continue;
            }
        }

        let raw_date = cell(row, date_idx);
        let date: NaiveDate = match parse_ref_date(Some(raw_date)) {
            Some(d) => d,
            None => {
                return Err(ReportError::Coercion {
                    column: spec.columns.date.clone(),
                    row: line,
                    raw: raw_date.to_string(),
                    target: "a date",
                })
            }
        };

        let raw_value = cell(row, value_idx);
        let value = match parse_f64_safe(Some(raw_value)) {
            Some(v) => Some(v),
            None if raw_value.is_empty() || spec.value_coercion == Coercion::Lenient => {
                report.missing_values += 1;
                None
            }
            None => {
                return Err(ReportError::Coercion {
                    column: spec.columns.value.clone(),
                    row: line,
                    raw: raw_value.to_string(),
                    target: "a number",
                })
            }
        };

        observations.push(Observation {
            date,
            category: category.to_string(),
            value,
        });
    }

    if spec.merge_duplicates {
        let before = observations.len();
        observations = merge_duplicates(observations);
        report.merged_duplicates = before - observations.len();
    }

    observations.sort_by_key(|o| o.date);
    report.kept_rows = observations.len();
    Ok((SeriesFrame::new(&spec.table_code, observations), report))
}

/// Collapse rows with the same (date, category), summing the values that are
/// present. First-seen order is kept.
fn merge_duplicates(observations: Vec<Observation>) -> Vec<Observation> {
    let mut index: HashMap<(NaiveDate, String), usize> = HashMap::new();
    let mut merged: Vec<Observation> = Vec::with_capacity(observations.len());
    for obs in observations {
        let key = (obs.date, obs.category.clone());
        match index.get(&key) {
            Some(&pos) => {
                let e = &mut merged[pos];
                e.value = match (e.value, obs.value) {
                    (Some(a), Some(b)) => Some(a + b),
                    (a, b) => a.or(b),
                };
            }
            None => {
                index.insert(key, merged.len());
                merged.push(obs);
            }
        }
    }
    merged
}

/// Cleaned frames keyed by table code.
///
/// Each key is filled at most once per process and never invalidated; a
/// fresh process fetches again. Failed loads leave the key empty.
#[derive(Debug, Default)]
pub struct FrameCache {
    entries: Mutex<HashMap<String, Arc<OnceCell<Arc<SeriesFrame>>>>>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load<F>(&self, table_code: &str, load: F) -> Result<Arc<SeriesFrame>>
    where
        F: FnOnce() -> Result<SeriesFrame>,
    {
        let slot = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.entry(table_code.to_string()).or_default().clone()
        };
        slot.get_or_try_init(|| load().map(Arc::new)).cloned()
    }
}

/// Fetch and clean the table named by `spec`, or return the cached frame.
pub fn load(
    source: &dyn TableSource,
    cache: &FrameCache,
    spec: &LoadSpec,
) -> Result<Arc<SeriesFrame>> {
    cache.get_or_load(&spec.table_code, || {
        let raw = source.fetch(&spec.table_code)?;
        let (frame, report) = clean(&raw, spec)?;
        info!(
            table = %spec.table_code,
            "Processing dataset... ({} rows loaded, {} undecodable, {} kept; {} other basis, {} outside item list, {} missing values, {} merged)",
            format_int(report.total_rows),
            format_int(report.skipped_records),
            format_int(report.kept_rows),
            format_int(report.qualifier_rejected),
            format_int(report.allowlist_rejected),
            format_int(report.missing_values),
            format_int(report.merged_duplicates),
        );
        Ok(frame)
    })
}
