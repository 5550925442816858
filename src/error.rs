use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("source unavailable for table {table_code}: {reason}")]
    SourceUnavailable { table_code: String, reason: String },

    #[error("the end date ({end}) must fall after the start date ({start})")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    /// The configured total line item is gone from the upstream table.
    #[error("total series '{total}' not found in table {table_code}")]
    MissingTotalSeries { table_code: String, total: String },

    #[error("column '{column}' not found in table {table_code}")]
    MissingColumn { table_code: String, column: String },

    #[error("row {row}: cannot read '{raw}' in column '{column}' as {target}")]
    Coercion {
        column: String,
        row: usize,
        raw: String,
        target: &'static str,
    },

    #[error("unknown page '{0}'")]
    UnknownPage(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ReportError {
    pub fn source_unavailable(table_code: &str, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            table_code: table_code.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True when the upstream table no longer matches the shape a page
    /// was configured for (renamed columns or line items).
    pub fn is_contract_drift(&self) -> bool {
        matches!(
            self,
            Self::MissingTotalSeries { .. } | Self::MissingColumn { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drift_errors_are_flagged() {
        let missing = ReportError::MissingTotalSeries {
            table_code: "36-10-0104-01".into(),
            total: "GDP".into(),
        };
        assert!(missing.is_contract_drift());
        assert!(!ReportError::source_unavailable("x", "timeout").is_contract_drift());
    }

    #[test]
    fn range_message_names_both_dates() {
        let err = ReportError::InvalidDateRange {
            start: NaiveDate::from_ymd_opt(2021, 6, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
        };
        let msg = err.to_string();
        assert!(msg.contains("2021-06-01"));
        assert!(msg.contains("2021-01-01"));
    }
}
