use chrono::NaiveDate;

use crate::error::{ReportError, Result};
use crate::types::SeriesFrame;

/// An inverted range is not fatal: callers show the error as a warning and
/// still run [`filter_by_date`], which then returns an empty frame.
pub fn check_date_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start > end {
        return Err(ReportError::InvalidDateRange { start, end });
    }
    Ok(())
}

/// Rows with `start <= date <= end`, in their original order.
pub fn filter_by_date(frame: &SeriesFrame, start: NaiveDate, end: NaiveDate) -> SeriesFrame {
    let observations = frame
        .observations
        .iter()
        .filter(|o| o.date >= start && o.date <= end)
        .cloned()
        .collect();
    SeriesFrame::new(&frame.table_code, observations)
}
