use std::collections::{BTreeSet, HashMap};

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};
use crate::pages::ShortLabel;
use crate::types::{ContributionBar, LatestSummaryRow, SeriesFrame, YearTable};
use crate::util::short_label;

/// Where the per-year denominator comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TotalSeries {
    /// An existing category of the dataset, e.g. GDP at market prices.
    Column { name: String },
    /// The sum of every category, added to the pivot under `name`.
    RowSum { name: String },
}

impl TotalSeries {
    pub fn name(&self) -> &str {
        match self {
            TotalSeries::Column { name } | TotalSeries::RowSum { name } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Contribution {
    pub total: String,
    /// Yearly sums, total column included.
    pub annual: YearTable,
    /// Share of the total in percent, total column excluded.
    pub percentages: YearTable,
    pub latest: Vec<LatestSummaryRow>,
}

/// Sum observations per (calendar year, category).
///
/// Years run contiguously from the first to the last observed year. Missing
/// values and absent combinations count as 0.
pub fn annual_pivot(frame: &SeriesFrame) -> YearTable {
    let mut sums: HashMap<(i32, &str), f64> = HashMap::new();
    let mut columns: BTreeSet<&str> = BTreeSet::new();
    let mut first_year = i32::MAX;
    let mut last_year = i32::MIN;

    for obs in &frame.observations {
        let year = obs.date.year();
        first_year = first_year.min(year);
        last_year = last_year.max(year);
        columns.insert(obs.category.as_str());
        *sums.entry((year, obs.category.as_str())).or_insert(0.0) += obs.value.unwrap_or(0.0);
    }
    if columns.is_empty() {
        return YearTable::default();
    }

    let years: Vec<i32> = (first_year..=last_year).collect();
    let rows = years
        .iter()
        .map(|y| {
            columns
                .iter()
                .map(|c| sums.get(&(*y, *c)).copied().unwrap_or(0.0))
                .collect()
        })
        .collect();
    YearTable {
        years,
        columns: columns.into_iter().map(str::to_string).collect(),
        rows,
    }
}

fn add_row_sum(table: &mut YearTable, name: &str) -> Result<()> {
    if table.column_index(name).is_some() {
        return Err(ReportError::Config(format!(
            "row-sum total '{}' clashes with a category of the same name",
            name
        )));
    }
    for row in &mut table.rows {
        let sum: f64 = row.iter().sum();
        row.push(sum);
    }
    table.columns.push(name.to_string());
    Ok(())
}

/// 100 × value / total per year. A zero total yields NaN for the whole year.
pub fn percentage_of(annual: &YearTable, total: &str) -> Option<YearTable> {
    let total_idx = annual.column_index(total)?;
    let shares = annual.without_column(total);
    let rows = annual
        .rows
        .iter()
        .zip(&shares.rows)
        .map(|(full, row)| {
            let denom = full[total_idx];
            row.iter()
                .map(|v| {
                    if denom == 0.0 {
                        f64::NAN
                    } else {
                        v / denom * 100.0
                    }
                })
                .collect()
        })
        .collect();
    Some(YearTable { rows, ..shares })
}

/// Run the pivot, percentage and latest-period steps on a filtered frame.
pub fn contribution(frame: &SeriesFrame, total: &TotalSeries) -> Result<Contribution> {
    let total_name = total.name();
    let mut annual = annual_pivot(frame);
    if annual.is_empty() {
        return Ok(Contribution {
            total: total_name.to_string(),
            ..Contribution::default()
        });
    }
    if let TotalSeries::RowSum { name } = total {
        add_row_sum(&mut annual, name)?;
    }

    let percentages =
        percentage_of(&annual, total_name).ok_or_else(|| ReportError::MissingTotalSeries {
            table_code: frame.table_code.clone(),
            total: total_name.to_string(),
        })?;
    let latest = latest_summary(&annual.without_column(total_name), &percentages);

    Ok(Contribution {
        total: total_name.to_string(),
        annual,
        percentages,
        latest,
    })
}

fn latest_summary(values: &YearTable, percentages: &YearTable) -> Vec<LatestSummaryRow> {
    let (Some((_, vals)), Some((_, pcts))) = (values.last_row(), percentages.last_row()) else {
        return Vec::new();
    };
    values
        .columns
        .iter()
        .zip(vals.iter().zip(pcts))
        .map(|(category, (value, percentage))| LatestSummaryRow {
            category: category.clone(),
            value: *value,
            percentage: *percentage,
        })
        .collect()
}

/// Bar data for the most recent year: one bar per category.
pub fn latest_contributions(percentages: &YearTable, mode: ShortLabel) -> Vec<ContributionBar> {
    let Some((_, row)) = percentages.last_row() else {
        return Vec::new();
    };
    percentages
        .columns
        .iter()
        .zip(row)
        .map(|(category, pct)| ContributionBar {
            category: category.clone(),
            contribution: *pct,
            short_label: short_label(category, mode),
        })
        .collect()
}

/// Restrict a table to the chosen columns, in selection order. Names the
/// table does not have are skipped.
pub fn select_columns(table: &YearTable, selection: &[String]) -> YearTable {
    let picked: Vec<(usize, &String)> = selection
        .iter()
        .filter_map(|name| table.column_index(name).map(|i| (i, name)))
        .collect();
    YearTable {
        years: table.years.clone(),
        columns: picked.iter().map(|(_, n)| (*n).clone()).collect(),
        rows: table
            .rows
            .iter()
            .map(|r| picked.iter().map(|(i, _)| r[*i]).collect())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Observation;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn series_of(table: &YearTable, column: &str) -> BTreeMap<i32, f64> {
        table
            .column(column)
            .map(|vals| table.years.iter().copied().zip(vals).collect())
            .unwrap_or_default()
    }

    fn obs(y: i32, m: u32, cat: &str, v: Option<f64>) -> Observation {
        Observation {
            date: NaiveDate::from_ymd_opt(y, m, 1).unwrap(),
            category: cat.to_string(),
            value: v,
        }
    }

    fn frame(rows: Vec<Observation>) -> SeriesFrame {
        SeriesFrame::new("test", rows)
    }

    fn column_total(name: &str) -> TotalSeries {
        TotalSeries::Column { name: name.into() }
    }

    fn round2(v: f64) -> f64 {
        (v * 100.0).round() / 100.0
    }

    fn abt_frame() -> SeriesFrame {
        frame(vec![
            obs(2020, 1, "A", Some(100.0)),
            obs(2020, 1, "B", Some(50.0)),
            obs(2020, 1, "Total", Some(150.0)),
            obs(2021, 1, "A", Some(150.0)),
            obs(2021, 1, "B", Some(50.0)),
            obs(2021, 1, "Total", Some(200.0)),
        ])
    }

    #[test]
    fn shares_of_total_per_year() {
        let c = contribution(&abt_frame(), &column_total("Total")).unwrap();
        let a = series_of(&c.percentages, "A");
        let b = series_of(&c.percentages, "B");
        assert_eq!(round2(a[&2020]), 66.67);
        assert_eq!(round2(a[&2021]), 75.0);
        assert_eq!(round2(b[&2020]), 33.33);
        assert_eq!(round2(b[&2021]), 25.0);
    }

    #[test]
    fn total_column_never_in_percentages() {
        let c = contribution(&abt_frame(), &column_total("Total")).unwrap();
        assert!(c.annual.column_index("Total").is_some());
        assert!(c.percentages.column_index("Total").is_none());
        assert_eq!(c.latest.len(), c.annual.columns.len() - 1);
        assert!(c.latest.iter().all(|r| r.category != "Total"));
    }

    #[test]
    fn latest_summary_joins_value_and_percentage() {
        let c = contribution(&abt_frame(), &column_total("Total")).unwrap();
        assert_eq!(c.latest[0].category, "A");
        assert_eq!(c.latest[0].value, 150.0);
        assert_eq!(c.latest[0].percentage, 75.0);
        assert_eq!(c.latest[1].value, 50.0);
    }

    #[test]
    fn shares_need_not_sum_to_one_hundred() {
        let f = frame(vec![
            obs(2020, 1, "A", Some(60.0)),
            obs(2020, 1, "B", Some(30.0)),
            obs(2020, 1, "Total", Some(100.0)),
        ]);
        let c = contribution(&f, &column_total("Total")).unwrap();
        let sum: f64 = c.percentages.rows[0].iter().sum();
        assert!((sum - 90.0).abs() < 1e-9);
    }

    #[test]
    fn zero_total_yields_nan_for_the_year() {
        let f = frame(vec![
            obs(2020, 1, "A", Some(10.0)),
            obs(2020, 1, "Total", Some(0.0)),
            obs(2021, 1, "A", Some(10.0)),
            obs(2021, 1, "Total", Some(20.0)),
        ]);
        let c = contribution(&f, &column_total("Total")).unwrap();
        let v = c.percentages.value(2020, "A").unwrap();
        assert!(v.is_nan());
        assert!(!v.is_infinite());
        assert_eq!(c.percentages.value(2021, "A"), Some(50.0));
    }

    #[test]
    fn zero_total_in_last_year_leaves_latest_shares_nan() {
        let f = frame(vec![
            obs(2020, 1, "A", Some(10.0)),
            obs(2020, 1, "Total", Some(20.0)),
            obs(2021, 1, "A", Some(10.0)),
            obs(2021, 1, "Total", Some(0.0)),
        ]);
        let c = contribution(&f, &column_total("Total")).unwrap();
        assert_eq!(c.latest.len(), 1);
        assert_eq!(c.latest[0].category, "A");
        assert_eq!(c.latest[0].value, 10.0);
        assert!(c.latest.iter().all(|r| r.percentage.is_nan()));
    }

    #[test]
    fn missing_total_is_distinct_error() {
        let err = contribution(&abt_frame(), &column_total("GDP")).unwrap_err();
        assert!(matches!(err, ReportError::MissingTotalSeries { ref total, .. } if total == "GDP"));
    }

    #[test]
    fn empty_frame_yields_empty_tables() {
        let c = contribution(&frame(vec![]), &column_total("GDP")).unwrap();
        assert!(c.annual.is_empty());
        assert!(c.latest.is_empty());
    }

    #[test]
    fn quarters_sum_into_years_and_gaps_fill_with_zero() {
        let f = frame(vec![
            obs(2019, 1, "A", Some(1.0)),
            obs(2019, 4, "A", Some(2.0)),
            obs(2019, 7, "A", None),
            obs(2021, 1, "A", Some(5.0)),
            obs(2021, 1, "Late", Some(7.0)),
        ]);
        let t = annual_pivot(&f);
        assert_eq!(t.years, vec![2019, 2020, 2021]);
        assert_eq!(t.value(2019, "A"), Some(3.0));
        assert_eq!(t.value(2020, "A"), Some(0.0));
        assert_eq!(t.value(2019, "Late"), Some(0.0));
        assert_eq!(t.value(2021, "Late"), Some(7.0));
    }

    #[test]
    fn row_sum_total_is_synthesised() {
        let f = frame(vec![
            obs(2020, 1, "East", Some(30.0)),
            obs(2020, 1, "West", Some(10.0)),
        ]);
        let total = TotalSeries::RowSum { name: "All".into() };
        let c = contribution(&f, &total).unwrap();
        assert_eq!(c.annual.value(2020, "All"), Some(40.0));
        assert_eq!(c.percentages.value(2020, "East"), Some(75.0));
        assert_eq!(c.percentages.columns, vec!["East", "West"]);
    }

    #[test]
    fn row_sum_named_like_a_category_is_a_config_error() {
        let f = frame(vec![
            obs(2020, 1, "East", Some(30.0)),
            obs(2020, 1, "West", Some(10.0)),
        ]);
        let total = TotalSeries::RowSum { name: "East".into() };
        let err = contribution(&f, &total).unwrap_err();
        assert!(matches!(err, ReportError::Config(ref msg) if msg.contains("East")));
    }

    #[test]
    fn bars_use_page_short_labels() {
        let c = contribution(&abt_frame(), &column_total("Total")).unwrap();
        let bars = latest_contributions(&c.percentages, ShortLabel::LastWord);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].contribution, 75.0);
    }

    #[test]
    fn selection_keeps_order_and_skips_unknown() {
        let c = contribution(&abt_frame(), &column_total("Total")).unwrap();
        let chart = select_columns(&c.percentages, &["B".into(), "Nope".into(), "A".into()]);
        assert_eq!(chart.columns, vec!["B", "A"]);
        assert_eq!(chart.rows[1], vec![25.0, 75.0]);
    }
}
