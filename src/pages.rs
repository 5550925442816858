//! Page definitions: which table each report reads and how it is shaped.
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};
use crate::loader::{Coercion, ColumnMap, LoadSpec, Qualifier};
use crate::reports::TotalSeries;

const GDP_AT_MARKET_PRICES: &str = "Gross domestic product at market prices";
const ANNUAL_RATES: &str = "Seasonally adjusted at annual rates";
const CHAINED_2012: &str = "Chained (2012) dollars";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortLabel {
    Full,
    LastWord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    pub key: String,
    pub title: String,
    /// Header used for the category column in exports, e.g. "Item".
    pub category_label: String,
    pub load: LoadSpec,
    pub total: TotalSeries,
    pub default_start: NaiveDate,
    #[serde(default)]
    pub default_selection: Vec<String>,
    pub short_label: ShortLabel,
    pub csv_file_name: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

pub fn expenditure() -> PageConfig {
    PageConfig {
        key: "expenditure".into(),
        title: "National Expenditure Exploration".into(),
        category_label: "Item".into(),
        load: LoadSpec {
            table_code: "36-10-0104-01".into(),
            columns: ColumnMap {
                date: "REF_DATE".into(),
                category: "Estimates".into(),
                value: "VALUE".into(),
            },
            qualifiers: vec![
                Qualifier::new("Seasonal adjustment", ANNUAL_RATES),
                Qualifier::new("Prices", CHAINED_2012),
                Qualifier::new("UOM", "Dollars"),
            ],
            allowlist: Some(strings(&[
                "Final consumption expenditure",
                "Gross fixed capital formation",
                "Investment in inventories",
                "Exports of goods and services",
                "Less: imports of goods and services",
                "Statistical discrepancy",
                GDP_AT_MARKET_PRICES,
                "Final domestic demand",
            ])),
            value_coercion: Coercion::Strict,
            merge_duplicates: false,
        },
        total: TotalSeries::Column {
            name: GDP_AT_MARKET_PRICES.into(),
        },
        default_start: date(2020, 1, 1),
        default_selection: strings(&["Final consumption expenditure"]),
        short_label: ShortLabel::Full,
        csv_file_name: "can_gdp_expenditure.csv".into(),
    }
}

pub fn income() -> PageConfig {
    PageConfig {
        key: "income".into(),
        title: "National Income Exploration".into(),
        category_label: "Item".into(),
        load: LoadSpec {
            table_code: "36-10-0103-01".into(),
            columns: ColumnMap {
                date: "REF_DATE".into(),
                category: "Estimates".into(),
                value: "VALUE".into(),
            },
            qualifiers: vec![Qualifier::new("Seasonal adjustment", ANNUAL_RATES)],
            allowlist: None,
            value_coercion: Coercion::Lenient,
            merge_duplicates: false,
        },
        total: TotalSeries::Column {
            name: GDP_AT_MARKET_PRICES.into(),
        },
        default_start: date(2020, 1, 1),
        default_selection: strings(&["Compensation of employees"]),
        short_label: ShortLabel::LastWord,
        csv_file_name: "can_gdp_income.csv".into(),
    }
}

pub fn regions() -> PageConfig {
    PageConfig {
        key: "regions".into(),
        title: "Regional GDP Exploration".into(),
        category_label: "Region".into(),
        load: LoadSpec {
            table_code: "36-10-0402-01".into(),
            columns: ColumnMap {
                date: "REF_DATE".into(),
                category: "GEO".into(),
                value: "VALUE".into(),
            },
            // In this table "Value" is the price basis, not the amount.
            qualifiers: vec![Qualifier::new("Value", CHAINED_2012)],
            allowlist: None,
            value_coercion: Coercion::Lenient,
            merge_duplicates: true,
        },
        total: TotalSeries::Column {
            name: "Canada".into(),
        },
        default_start: date(2000, 1, 1),
        default_selection: strings(&["Quebec", "Alberta", "British Columbia"]),
        short_label: ShortLabel::LastWord,
        csv_file_name: "can_gdp_regions.csv".into(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagesConfig {
    pub pages: Vec<PageConfig>,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            pages: vec![expenditure(), income(), regions()],
        }
    }
}

impl PagesConfig {
    /// Read page definitions from a JSON file; they replace the built-ins.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: PagesConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.pages.is_empty() {
            return Err(ReportError::Config("no pages defined".into()));
        }
        for (i, page) in self.pages.iter().enumerate() {
            if page.key.trim().is_empty() {
                return Err(ReportError::Config(format!("page #{} has an empty key", i + 1)));
            }
            if self.pages[..i]
                .iter()
                .any(|p| p.key.eq_ignore_ascii_case(&page.key))
            {
                return Err(ReportError::Config(format!("duplicate page key '{}'", page.key)));
            }
        }
        Ok(())
    }

    pub fn find(&self, key: &str) -> Result<&PageConfig> {
        self.pages
            .iter()
            .find(|p| p.key.eq_ignore_ascii_case(key.trim()))
            .ok_or_else(|| ReportError::UnknownPage(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_match_their_tables() {
        let cfg = PagesConfig::default();
        let keys: Vec<&str> = cfg.pages.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["expenditure", "income", "regions"]);
        assert_eq!(cfg.find("Regions").unwrap().load.table_code, "36-10-0402-01");
        assert_eq!(expenditure().short_label, ShortLabel::Full);
        assert_eq!(income().short_label, ShortLabel::LastWord);
        assert!(matches!(cfg.find("home"), Err(ReportError::UnknownPage(_))));
    }

    #[test]
    fn config_file_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pages.json");
        let text = serde_json::to_string_pretty(&PagesConfig::default()).unwrap();
        std::fs::write(&path, text).unwrap();
        let loaded = PagesConfig::from_path(&path).unwrap();
        assert_eq!(loaded, PagesConfig::default());
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let cfg = PagesConfig {
            pages: vec![income(), income()],
        };
        assert!(matches!(cfg.validate(), Err(ReportError::Config(_))));
    }
}
