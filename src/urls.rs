use crate::constants::SOURCE_URL_TEMPLATE;
use crate::error::{EtlError, Result};
use crate::types::{EmployerSpec, SourceUrl, YearRange};
use reqwest::Url;
use std::collections::BTreeMap;

/// Page URL for one employer identifier and year.
pub fn page_url(source_identifier: &str, year: i32) -> String {
    SOURCE_URL_TEMPLATE
        .replace("{id}", source_identifier)
        .replace("{year}", &year.to_string())
}

/// Maps each employer display name to its page URLs, one per year, ascending.
///
/// A malformed employer list is a configuration error; nothing is fetched in that case.
pub fn build_urls(
    employers: &[EmployerSpec],
    years: YearRange,
) -> Result<BTreeMap<String, Vec<SourceUrl>>> {
    let mut map = BTreeMap::new();

    for employer in employers {
        if employer.display_name.trim().is_empty() || employer.source_identifier.is_empty() {
            return Err(EtlError::Config(format!(
                "malformed employer entry {:?}",
                employer
            )));
        }

        let mut urls = Vec::with_capacity(years.len());
        for year in years.years() {
            let url = page_url(&employer.source_identifier, year);
            Url::parse(&url)
                .map_err(|e| EtlError::Config(format!("invalid page url {}: {}", url, e)))?;
            urls.push(SourceUrl {
                employer: employer.clone(),
                year,
                url,
            });
        }

        if map.insert(employer.display_name.clone(), urls).is_some() {
            return Err(EtlError::Config(format!(
                "duplicate employer display name '{}'",
                employer.display_name
            )));
        }
    }

    Ok(map)
}

/// Employer-major, year-minor processing order.
pub fn flatten(map: BTreeMap<String, Vec<SourceUrl>>) -> Vec<SourceUrl> {
    map.into_values().flatten().collect()
}
