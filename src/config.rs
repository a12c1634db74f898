use crate::constants::{DEFAULT_EMPLOYERS, DEFAULT_FETCH_TIMEOUT_SECS, START_YEAR};
use crate::error::{EtlError, Result};
use crate::types::{EmployerSpec, YearRange};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Everything a pipeline run needs, passed explicitly into the driver.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub employers: Vec<EmployerSpec>,
    pub years: YearRange,
    pub storage_root: String,
    pub fetch: FetchConfig,
    pub sink: SinkConfig,
    /// Failed pages / attempted pages above which the process exits non-zero.
    pub max_failure_rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

/// Where artifacts go. Without an endpoint the storage root is a local directory.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SinkConfig {
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the bearer token for `endpoint`.
    pub token_env: Option<String>,
}

/// On-disk override file; every field is optional.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    start_year: Option<i32>,
    end_year: Option<i32>,
    max_failure_rate: Option<f64>,
    employers: Option<Vec<EmployerSpec>>,
    fetch: Option<FetchConfig>,
    sink: Option<SinkConfig>,
}

impl PipelineConfig {
    /// Built-in employer list, 2018 through the current year, never failing the process.
    pub fn with_defaults(storage_root: impl Into<String>) -> Self {
        Self {
            employers: DEFAULT_EMPLOYERS
                .iter()
                .map(|(name, id)| EmployerSpec::new(*name, *id))
                .collect(),
            years: YearRange::through_current(START_YEAR),
            storage_root: storage_root.into(),
            fetch: FetchConfig::default(),
            sink: SinkConfig::default(),
            max_failure_rate: 1.0,
        }
    }

    /// Defaults overridden by the TOML file at `path`.
    pub fn load(path: &Path, storage_root: impl Into<String>) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content, storage_root)
    }

    pub fn from_toml_str(content: &str, storage_root: impl Into<String>) -> Result<Self> {
        let file: FileConfig = toml::from_str(content)?;
        let mut config = Self::with_defaults(storage_root);

        if let Some(employers) = file.employers {
            config.employers = employers;
        }
        if let Some(start) = file.start_year {
            config.years.start = start;
        }
        if let Some(end) = file.end_year {
            config.years.end = end;
        }
        if let Some(rate) = file.max_failure_rate {
            config.max_failure_rate = rate;
        }
        if let Some(fetch) = file.fetch {
            config.fetch = fetch;
        }
        if let Some(sink) = file.sink {
            config.sink = sink;
        }
        Ok(config)
    }

    /// Rejects a config the run cannot start with; checked before any network activity.
    pub fn validate(&self) -> Result<()> {
        if self.storage_root.trim().is_empty() {
            return Err(EtlError::Config("storage root must not be empty".into()));
        }
        if self.employers.is_empty() {
            return Err(EtlError::Config("employer list is empty".into()));
        }

        let mut seen = HashSet::new();
        for employer in &self.employers {
            if employer.display_name.trim().is_empty() {
                return Err(EtlError::Config(format!(
                    "employer with identifier '{}' has an empty display name",
                    employer.source_identifier
                )));
            }
            if employer.source_identifier.is_empty()
                || employer.source_identifier.chars().any(char::is_whitespace)
            {
                return Err(EtlError::Config(format!(
                    "employer '{}' has an invalid source identifier '{}'",
                    employer.display_name, employer.source_identifier
                )));
            }
            if !seen.insert(employer.display_name.as_str()) {
                return Err(EtlError::Config(format!(
                    "duplicate employer display name '{}'",
                    employer.display_name
                )));
            }
        }

        if self.years.is_empty() {
            return Err(EtlError::Config(format!(
                "year range {}..={} is empty",
                self.years.start, self.years.end
            )));
        }
        if !(0.0..=1.0).contains(&self.max_failure_rate) {
            return Err(EtlError::Config(format!(
                "max_failure_rate {} is outside 0.0..=1.0",
                self.max_failure_rate
            )));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(EtlError::Config("fetch timeout must be positive".into()));
        }
        Ok(())
    }

    /// Bearer token for the object store, read from the configured environment variable.
    pub fn sink_token(&self) -> Result<Option<String>> {
        match &self.sink.token_env {
            Some(var) => std::env::var(var).map(Some).map_err(|e| {
                EtlError::Config(format!("object store token variable {}: {}", var, e))
            }),
            None => Ok(None),
        }
    }
}
