use std::path::Path;

use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use serde::Serialize;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

use crate::dashboard::PageView;
use crate::error::{ReportError, Result};
use crate::pages::PageConfig;
use crate::types::{
    BarDisplayRow, Observation, ObservationDisplayRow, SeriesFrame, SummaryDisplayRow, YearTable,
};
use crate::util::{format_number, format_optional, parse_f64_safe};

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Encode a frame as `Date,<category label>,Value` CSV text. Missing values
/// are written as empty cells.
pub fn encode_frame_csv(frame: &SeriesFrame, category_label: &str) -> Result<String> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(vec![]);
    wtr.write_record(["Date", category_label, "Value"])?;
    for o in &frame.observations {
        wtr.serialize((o.date.format("%Y-%m-%d").to_string(), &o.category, o.value))?;
    }
    let bytes = wtr.into_inner().map_err(|e| ReportError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| ReportError::Io(std::io::Error::other(e)))
}

pub fn write_frame_csv(path: &Path, frame: &SeriesFrame, category_label: &str) -> Result<()> {
    std::fs::write(path, encode_frame_csv(frame, category_label)?)?;
    Ok(())
}

/// Read back a CSV written by [`encode_frame_csv`].
pub fn decode_frame_csv(text: &str, table_code: &str) -> Result<SeriesFrame> {
    let mut rdr = ReaderBuilder::new().from_reader(text.as_bytes());
    let mut observations = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let rec = result?;
        let raw_date = rec.get(0).unwrap_or("");
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|_| {
            ReportError::Coercion {
                column: "Date".into(),
                row: i + 2,
                raw: raw_date.to_string(),
                target: "a date",
            }
        })?;
        observations.push(Observation {
            date,
            category: rec.get(1).unwrap_or("").to_string(),
            value: parse_f64_safe(rec.get(2)),
        });
    }
    Ok(SeriesFrame::new(table_code, observations))
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

/// Markdown rendering of a year table, newest years last. Only the last
/// `max_rows` years are shown.
pub fn render_year_table(table: &YearTable, decimals: usize, max_rows: usize) -> String {
    if table.is_empty() {
        return "(no rows)".to_string();
    }
    let mut builder = Builder::default();
    let mut header = vec!["Year".to_string()];
    header.extend(table.columns.iter().cloned());
    builder.push_record(header);

    let skip = table.years.len().saturating_sub(max_rows);
    for (year, row) in table.years.iter().zip(&table.rows).skip(skip) {
        let label = YearTable::period_end(*year)
            .map(|d| d.to_string())
            .unwrap_or_else(|| year.to_string());
        let mut record = vec![label];
        record.extend(row.iter().map(|v| format_number(*v, decimals)));
        builder.push_record(record);
    }
    builder.build().with(Style::markdown()).to_string()
}

pub fn observation_rows(frame: &SeriesFrame) -> Vec<ObservationDisplayRow> {
    frame
        .observations
        .iter()
        .map(|o| ObservationDisplayRow {
            date: o.date.to_string(),
            category: o.category.clone(),
            value: format_optional(o.value, 1),
        })
        .collect()
}

pub fn summary_rows(view: &PageView) -> Vec<SummaryDisplayRow> {
    view.contribution
        .latest
        .iter()
        .map(|r| SummaryDisplayRow {
            category: r.category.clone(),
            value: format_number(r.value, 1),
            percentage: format_number(r.percentage, 2),
        })
        .collect()
}

pub fn bar_rows(view: &PageView) -> Vec<BarDisplayRow> {
    view.bars
        .iter()
        .map(|b| BarDisplayRow {
            short_label: b.short_label.clone(),
            contribution: format_number(b.contribution, 2),
        })
        .collect()
}

/// Print a page the way the dashboard lays it out: data preview, chart data
/// for the selection, latest-year contributions and the summary table.
pub fn render_page(page: &PageConfig, view: &PageView, max_rows: usize) {
    for w in &view.warnings {
        println!("Warning: {}", w);
    }
    println!("{}\n", page.title);

    println!(
        "Preview of data ({} rows, {} to {}):",
        view.filtered.len(),
        view.filtered
            .observations
            .first()
            .map(|o| o.date.to_string())
            .unwrap_or_default(),
        view.filtered
            .observations
            .last()
            .map(|o| o.date.to_string())
            .unwrap_or_default(),
    );
    preview_table_rows(&observation_rows(&view.filtered), max_rows);

    match &view.chart {
        Some(chart) => {
            println!(
                "Yearly contribution to {} (%):",
                view.contribution.total
            );
            println!("{}\n", render_year_table(chart, 2, max_rows));
        }
        None => println!(
            "Please select at least one {}.\n",
            page.category_label.to_lowercase()
        ),
    }

    println!("Percentage contribution to GDP for the latest year from the selected period.");
    preview_table_rows(&bar_rows(view), usize::MAX);

    println!(
        "Table of contribution and percentage contribution to GDP for the most recent year from the selected period."
    );
    preview_table_rows(&summary_rows(view), usize::MAX);
}
