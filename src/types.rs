use crate::constants::*;
use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};

/// One employer to harvest: the canonical name written into artifacts and the
/// identifier the source site expects in its query string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployerSpec {
    pub display_name: String,
    pub source_identifier: String,
}

impl EmployerSpec {
    pub fn new(display_name: impl Into<String>, source_identifier: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            source_identifier: source_identifier.into(),
        }
    }
}

/// Inclusive, ascending window of disclosure years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    /// `start` through the current calendar year.
    pub fn through_current(start: i32) -> Self {
        Self::new(start, Local::now().year())
    }

    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start..=self.end
    }

    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start + 1) as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single page to harvest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceUrl {
    pub employer: EmployerSpec,
    pub year: i32,
    pub url: String,
}

/// First table found on a page, as scraped. `None` marks an empty cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { headers, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// One validated salary disclosure row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanedRecord {
    pub employer: String,
    /// Employer string as published by the source, kept next to the canonical name.
    pub scraped_employer: String,
    pub base_salary: u64,
    pub submit_year: i32,
    pub submit_month: Option<u32>,
    pub state: String,
    pub city: String,
    /// Untouched source columns (job title etc.), in source order.
    pub passthrough: Vec<(String, String)>,
}

impl CleanedRecord {
    /// Field value rendered as CSV text, looked up by output column name.
    pub fn value(&self, column: &str) -> Option<String> {
        match column {
            COL_EMPLOYER => Some(self.employer.clone()),
            COL_SCRAPED_EMPLOYER => Some(self.scraped_employer.clone()),
            COL_BASE_SALARY => Some(self.base_salary.to_string()),
            COL_SUBMIT_YEAR => Some(self.submit_year.to_string()),
            COL_SUBMIT_MONTH => self.submit_month.map(|m| m.to_string()),
            COL_STATE => Some(self.state.clone()),
            COL_CITY => Some(self.city.clone()),
            other => self
                .passthrough
                .iter()
                .find(|(name, _)| name == other)
                .map(|(_, v)| v.clone()),
        }
    }
}

/// Cleaned rows of one (employer, year) page plus the CSV header order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanedDataset {
    pub columns: Vec<String>,
    pub records: Vec<CleanedRecord>,
}

impl CleanedDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first(&self) -> Option<&CleanedRecord> {
        self.records.first()
    }
}

/// Destination of one artifact: `<root>/data/<employer>_<year>.csv`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ArtifactPath(pub String);

impl ArtifactPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
