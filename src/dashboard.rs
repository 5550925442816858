//! One page of the report: everything the user picked comes in through
//! [`PageRequest`], everything shown goes out through [`PageView`].
use chrono::NaiveDate;
use tracing::warn;

use crate::error::{ReportError, Result};
use crate::filter::{check_date_range, filter_by_date};
use crate::loader::{load, FrameCache};
use crate::pages::PageConfig;
use crate::reports::{contribution, latest_contributions, select_columns, Contribution};
use crate::source::TableSource;
use crate::types::{ContributionBar, SeriesFrame, YearTable};

#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// `None` uses the page's default selection.
    pub selection: Option<Vec<String>>,
}

impl PageRequest {
    pub fn defaults(page: &PageConfig, today: NaiveDate) -> Self {
        Self {
            start: page.default_start,
            end: today,
            selection: None,
        }
    }
}

#[derive(Debug)]
pub struct PageView {
    /// Non-fatal problems, e.g. an inverted date range.
    pub warnings: Vec<ReportError>,
    pub filtered: SeriesFrame,
    pub contribution: Contribution,
    pub bars: Vec<ContributionBar>,
    /// Categories that were asked for and exist in the data.
    pub selection: Vec<String>,
    /// Yearly percentages of `selection`; `None` when it is empty.
    pub chart: Option<YearTable>,
}

pub fn run_page(
    page: &PageConfig,
    source: &dyn TableSource,
    cache: &FrameCache,
    request: &PageRequest,
) -> Result<PageView> {
    let mut warnings = Vec::new();
    if let Err(e) = check_date_range(request.start, request.end) {
        warn!(page = %page.key, "{}", e);
        warnings.push(e);
    }

    let frame = load(source, cache, &page.load)?;
    let filtered = filter_by_date(&frame, request.start, request.end);
    let contribution = contribution(&filtered, &page.total)?;
    let bars = latest_contributions(&contribution.percentages, page.short_label);

    let selection = available_selection(page, request, &contribution.percentages);
    let chart = if selection.is_empty() {
        None
    } else {
        Some(select_columns(&contribution.percentages, &selection))
    };

    Ok(PageView {
        warnings,
        filtered,
        contribution,
        bars,
        selection,
        chart,
    })
}

/// The requested (or default) categories that the current data actually
/// has, in the order they were asked for.
fn available_selection(
    page: &PageConfig,
    request: &PageRequest,
    percentages: &YearTable,
) -> Vec<String> {
    let wanted = request
        .selection
        .as_deref()
        .unwrap_or(page.default_selection.as_slice());
    wanted
        .iter()
        .filter(|name| {
            let present = percentages.column_index(name).is_some();
            if !present && !percentages.is_empty() {
                warn!(page = %page.key, category = %name, "selected category not in data");
            }
            present
        })
        .cloned()
        .collect()
}
