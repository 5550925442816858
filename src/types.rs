use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// A table exactly as the upstream source delivered it: header names plus
/// string cells. Column names differ per dataset.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Records the CSV reader could not decode.
    pub skipped: usize,
}

impl RawTable {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub category: String,
    /// `None` when the upstream cell was empty or could not be read as a number.
    pub value: Option<f64>,
}

/// Cleaned observations of one dataset, sorted by date ascending.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SeriesFrame {
    pub table_code: String,
    pub observations: Vec<Observation>,
}

impl SeriesFrame {
    pub fn new(table_code: &str, observations: Vec<Observation>) -> Self {
        Self {
            table_code: table_code.to_string(),
            observations,
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Values indexed by calendar year (rows) and category (columns).
///
/// `rows[i][j]` is the value of `columns[j]` for `years[i]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct YearTable {
    pub years: Vec<i32>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl YearTable {
    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }

    pub fn value(&self, year: i32, column: &str) -> Option<f64> {
        let row = self.years.iter().position(|y| *y == year)?;
        let col = self.column_index(column)?;
        Some(self.rows[row][col])
    }

    pub fn last_row(&self) -> Option<(i32, &[f64])> {
        let year = *self.years.last()?;
        let row = self.rows.last()?;
        Some((year, row.as_slice()))
    }

    /// Copy of the table without `name`; unchanged if the column is absent.
    pub fn without_column(&self, name: &str) -> YearTable {
        let Some(drop) = self.column_index(name) else {
            return self.clone();
        };
        let columns = self
            .columns
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != drop)
            .map(|(_, c)| c.clone())
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|r| {
                r.iter()
                    .enumerate()
                    .filter(|(i, _)| *i != drop)
                    .map(|(_, v)| *v)
                    .collect()
            })
            .collect();
        YearTable {
            years: self.years.clone(),
            columns,
            rows,
        }
    }

    /// Calendar-year resampling labels each year by its last day.
    pub fn period_end(year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, 12, 31)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestSummaryRow {
    pub category: String,
    pub value: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributionBar {
    pub category: String,
    pub contribution: f64,
    pub short_label: String,
}

#[derive(Debug, Serialize, Deserialize, Tabled, Clone)]
pub struct SummaryDisplayRow {
    #[tabled(rename = "Category")]
    pub category: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Percentage")]
    pub percentage: String,
}

#[derive(Debug, Serialize, Deserialize, Tabled, Clone)]
pub struct BarDisplayRow {
    #[tabled(rename = "Short Label")]
    pub short_label: String,
    #[tabled(rename = "Contribution")]
    pub contribution: String,
}

#[derive(Debug, Serialize, Deserialize, Tabled, Clone)]
pub struct ObservationDisplayRow {
    #[tabled(rename = "Date")]
    pub date: String,
    #[tabled(rename = "Category")]
    pub category: String,
    #[tabled(rename = "Value")]
    pub value: String,
}
