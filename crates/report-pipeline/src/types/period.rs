//! Report periods and the object-store key convention derived from them

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// Prefix under which the scraper drops raw report PDFs
pub const RAW_PDF_PREFIX: &str = "Raw_PDFs/";

/// A quarterly report, identified by year and quarter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub year: String,
    pub quarter: String,
}

impl ReportPeriod {
    /// Validate and build a period
    ///
    /// Years are four ASCII digits, quarters are `Q1`..`Q4` (case-insensitive on input).
    pub fn new(year: impl Into<String>, quarter: impl Into<String>) -> Result<Self> {
        let year = Self::parse_year(&year.into())?;
        let quarter = quarter.into().trim().to_uppercase();

        if quarter.is_empty() {
            return Err(Error::validation("Select a quarter first"));
        }
        if !matches!(quarter.as_str(), "Q1" | "Q2" | "Q3" | "Q4") {
            return Err(Error::validation(format!("Invalid quarter '{}'", quarter)));
        }

        Ok(Self { year, quarter })
    }

    /// Validate a year on its own, e.g. before listing its quarters
    pub fn parse_year(year: &str) -> Result<String> {
        let year = year.trim();
        if year.is_empty() {
            return Err(Error::validation("Select a year first"));
        }
        if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::validation(format!("Invalid year '{}'", year)));
        }
        Ok(year.to_string())
    }

    /// `Raw_PDFs/{year}/{quarter}.pdf`
    pub fn raw_pdf_key(&self) -> String {
        format!("{}{}/{}.pdf", RAW_PDF_PREFIX, self.year, self.quarter)
    }

    /// `Raw_PDFs/{year}/`
    pub fn year_prefix(year: &str) -> String {
        format!("{}{}/", RAW_PDF_PREFIX, year)
    }

    /// `{parser}_markdown/{year}/{quarter}/{quarter}.md`
    pub fn markdown_key(&self, parser: &str) -> String {
        format!(
            "{}_markdown/{}/{}/{}.md",
            parser, self.year, self.quarter, self.quarter
        )
    }

    /// Parameters handed to the workflow orchestrator
    pub fn job_params(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("year".to_string(), self.year.clone()),
            ("quarter".to_string(), self.quarter.clone()),
        ])
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.year, self.quarter)
    }
}
