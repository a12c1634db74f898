use crate::constants::*;
use crate::error::{EtlError, Result};
use crate::types::{CleanedDataset, CleanedRecord, EmployerSpec, RawTable};
use chrono::{Datelike, NaiveDate};
use tracing::{debug, warn};

/// Expected layout of the source table, by normalized column label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SalaryTableSchema {
    /// Year-only derivation.
    V1,
    /// Adds `submit_month`.
    #[default]
    V2,
}

impl SalaryTableSchema {
    /// Columns the page carries but the artifact never keeps. Each must be present.
    pub fn dropped_columns(&self) -> &'static [&'static str] {
        &[COL_UNNAMED_STRAY, COL_START_DATE]
    }

    pub fn required_columns(&self) -> &'static [&'static str] {
        &[COL_EMPLOYER, COL_BASE_SALARY, COL_LOCATION, COL_SUBMIT_DATE]
    }

    pub fn derives_month(&self) -> bool {
        matches!(self, SalaryTableSchema::V2)
    }

    fn derived_columns(&self) -> Vec<&'static str> {
        let mut cols = vec![COL_SUBMIT_YEAR];
        if self.derives_month() {
            cols.push(COL_SUBMIT_MONTH);
        }
        cols.extend([COL_STATE, COL_CITY, COL_SCRAPED_EMPLOYER]);
        cols
    }
}

/// `"Base Salary"` -> `"base_salary"`, `"Unnamed: 6"` -> `"unnamed:_6"`.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase().replace(' ', "_")
}

/// A salary that survives filtering: ASCII digits only.
pub fn parse_salary(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Parses `MM/DD/YYYY`. chrono's `%Y` alone also takes `18` or `+2018`, so the
/// year must be exactly four digits.
pub fn parse_submit_date(value: &str) -> Result<NaiveDate> {
    let date_error = |message: String| EtlError::DateParse {
        value: value.to_string(),
        message,
    };
    let year = value.rsplit('/').next().unwrap_or_default();
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return Err(date_error(format!("year '{}' is not four digits", year)));
    }
    NaiveDate::parse_from_str(value, SUBMIT_DATE_FORMAT).map_err(|e| date_error(e.to_string()))
}

/// Splits `"San Jose, CA"` into `("San Jose", "CA")`: the state is the last two
/// characters and the city drops the trailing four (`", XX"`).
/// Shorter strings cannot carry that suffix and yield `None`.
pub fn split_location(location: &str) -> Option<(String, String)> {
    let chars: Vec<char> = location.chars().collect();
    if chars.len() < 4 {
        return None;
    }
    let city: String = chars[..chars.len() - 4].iter().collect();
    let state: String = chars[chars.len() - 2..].iter().collect();
    Some((city, state))
}

/// Column positions resolved against the schema contract.
struct Layout {
    employer: usize,
    base_salary: usize,
    location: usize,
    submit_date: usize,
    kept: Vec<usize>,
    passthrough: Vec<(usize, String)>,
    columns: Vec<String>,
}

impl Layout {
    fn resolve(labels: &[String], schema: SalaryTableSchema) -> Result<Self> {
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(EtlError::Schema(format!("duplicate column '{}'", label)));
            }
        }

        let position = |name: &str| {
            labels.iter().position(|l| l == name).ok_or_else(|| {
                EtlError::Schema(format!(
                    "expected column '{}' missing; found [{}]",
                    name,
                    labels.join(", ")
                ))
            })
        };

        for name in schema.required_columns() {
            position(*name)?;
        }
        let mut dropped = Vec::new();
        for name in schema.dropped_columns() {
            dropped.push(position(*name)?);
        }
        let employer = position(COL_EMPLOYER)?;
        let base_salary = position(COL_BASE_SALARY)?;
        let location = position(COL_LOCATION)?;
        let submit_date = position(COL_SUBMIT_DATE)?;

        let kept: Vec<usize> = (0..labels.len()).filter(|i| !dropped.contains(i)).collect();

        let derived = schema.derived_columns();
        let mut columns = Vec::new();
        let mut passthrough = Vec::new();
        for &i in &kept {
            if i == location || i == submit_date {
                continue;
            }
            let label = &labels[i];
            if derived.contains(&label.as_str()) {
                return Err(EtlError::Schema(format!(
                    "source column '{}' clashes with a derived column",
                    label
                )));
            }
            if i != employer && i != base_salary {
                passthrough.push((i, label.clone()));
            }
            columns.push(label.clone());
        }
        columns.extend(derived.iter().map(|c| c.to_string()));

        Ok(Self {
            employer,
            base_salary,
            location,
            submit_date,
            kept,
            passthrough,
            columns,
        })
    }
}

/// Cleans one scraped page for `employer`.
///
/// Rows with a missing cell, a non-numeric salary, or a location too short to
/// split are dropped. A submit date outside `month/day/year` fails the page.
pub fn normalize(
    raw: RawTable,
    employer: &EmployerSpec,
    schema: SalaryTableSchema,
) -> Result<CleanedDataset> {
    // An empty page has nothing to validate the layout against
    if raw.rows.is_empty() {
        return Ok(CleanedDataset::default());
    }

    let labels: Vec<String> = raw.headers.iter().map(|h| normalize_label(h)).collect();
    let layout = Layout::resolve(&labels, schema)?;

    let raw_count = raw.rows.len();
    let mut incomplete = 0usize;
    let mut non_numeric = 0usize;
    let mut short_location = 0usize;
    let mut records = Vec::with_capacity(raw_count);

    for row in raw.rows {
        let cell = |i: usize| {
            row.get(i)
                .and_then(|c| c.as_deref())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };

        if layout.kept.iter().any(|&i| cell(i).is_none()) {
            incomplete += 1;
            continue;
        }

        let (Some(salary_text), Some(date_text), Some(location), Some(scraped_employer)) = (
            cell(layout.base_salary),
            cell(layout.submit_date),
            cell(layout.location),
            cell(layout.employer),
        ) else {
            incomplete += 1;
            continue;
        };

        let Some(base_salary) = parse_salary(salary_text) else {
            non_numeric += 1;
            continue;
        };

        let submit_date = parse_submit_date(date_text)?;

        let Some((city, state)) = split_location(location) else {
            short_location += 1;
            continue;
        };

        let passthrough = layout
            .passthrough
            .iter()
            .map(|(i, name)| (name.clone(), cell(*i).unwrap_or_default().to_string()))
            .collect();

        records.push(CleanedRecord {
            employer: employer.display_name.clone(),
            scraped_employer: scraped_employer.to_string(),
            base_salary,
            submit_year: submit_date.year(),
            submit_month: schema.derives_month().then(|| submit_date.month()),
            state,
            city,
            passthrough,
        });
    }

    if short_location > 0 {
        warn!(
            "Dropped {} rows for {} with a location shorter than 4 characters",
            short_location, employer.display_name
        );
    }
    debug!(
        "Normalized {} -> {} rows for {} ({} incomplete, {} non-numeric salary)",
        raw_count,
        records.len(),
        employer.display_name,
        incomplete,
        non_numeric
    );

    Ok(CleanedDataset {
        columns: layout.columns,
        records,
    })
}
