//! Contribution-to-GDP reports over Statistics Canada national accounts
//! tables (expenditure, income and regional GDP).
pub mod dashboard;
pub mod error;
pub mod filter;
pub mod loader;
pub mod output;
pub mod pages;
pub mod reports;
pub mod source;
pub mod types;
pub mod util;

pub use error::{ReportError, Result};
