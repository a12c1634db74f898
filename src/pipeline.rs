use crate::config::PipelineConfig;
use crate::error::{ErrorKind, EtlError, Result};
use crate::fetch::TableFetcher;
use crate::normalize::{normalize, SalaryTableSchema};
use crate::resolve::resolve;
use crate::storage::SinkWriter;
use crate::types::{ArtifactPath, SourceUrl};
use crate::urls::{build_urls, flatten};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Furthest point a page reached before it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStage {
    Pending,
    Fetched,
    Normalized,
    Resolved,
    Written,
}

/// A page that did not produce an artifact.
#[derive(Debug, Clone, Serialize)]
pub struct PageFailure {
    pub url: String,
    pub employer: String,
    pub year: i32,
    /// Last stage completed before the error.
    pub stage: PageStage,
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of a complete run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunResult {
    pub attempted: usize,
    pub succeeded: usize,
    /// Pages whose rows were all filtered out.
    pub skipped: Vec<PageFailure>,
    pub failed: Vec<PageFailure>,
    pub written: Vec<ArtifactPath>,
}

impl RunResult {
    /// Failed pages over attempted pages; skipped pages are not failures.
    pub fn failure_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.failed.len() as f64 / self.attempted as f64
        }
    }

    pub fn exceeds(&self, max_failure_rate: f64) -> bool {
        self.failure_rate() > max_failure_rate
    }

    pub fn failures_of(&self, kind: ErrorKind) -> usize {
        self.failed.iter().filter(|f| f.kind == kind).count()
    }
}

struct PageError {
    stage: PageStage,
    error: EtlError,
}

trait AtStage<T> {
    fn at(self, stage: PageStage) -> std::result::Result<T, PageError>;
}

impl<T> AtStage<T> for Result<T> {
    fn at(self, stage: PageStage) -> std::result::Result<T, PageError> {
        self.map_err(|error| PageError { stage, error })
    }
}

/// Sequential extract-clean-load driver. Each page is fetched, normalized,
/// resolved and written before the next one starts; a failing page is logged
/// and recorded, never aborting the run.
pub struct Pipeline {
    config: PipelineConfig,
    schema: SalaryTableSchema,
    fetcher: Arc<dyn TableFetcher>,
    sink: Arc<dyn SinkWriter>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        fetcher: Arc<dyn TableFetcher>,
        sink: Arc<dyn SinkWriter>,
    ) -> Self {
        Self {
            config,
            schema: SalaryTableSchema::default(),
            fetcher,
            sink,
        }
    }

    pub fn with_schema(mut self, schema: SalaryTableSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Runs every (employer, year) page. Only a malformed configuration is an
    /// `Err`, and it is raised before any page is fetched.
    pub async fn run(&self) -> Result<RunResult> {
        self.config.validate()?;
        let pages = flatten(build_urls(&self.config.employers, self.config.years)?);

        info!(
            "🚀 Starting salary run: {} employers, years {}..={}, {} pages → {}",
            self.config.employers.len(),
            self.config.years.start,
            self.config.years.end,
            pages.len(),
            self.config.storage_root
        );
        let started = Instant::now();
        let mut result = RunResult::default();

        for page in &pages {
            result.attempted += 1;
            counter!("salary_pages_attempted_total").increment(1);

            match self.process_page(page).await {
                Ok(path) => {
                    result.succeeded += 1;
                    result.written.push(path);
                    counter!("salary_pages_written_total").increment(1);
                }
                Err(PageError { stage, error }) => {
                    let failure = PageFailure {
                        url: page.url.clone(),
                        employer: page.employer.display_name.clone(),
                        year: page.year,
                        stage,
                        kind: error.kind(),
                        message: error.to_string(),
                    };
                    if failure.kind == ErrorKind::EmptyDataset {
                        warn!("Skipping {}: {}", page.url, error);
                        result.skipped.push(failure);
                    } else {
                        error!("Failed to read url {} at stage {:?}: {}", page.url, stage, error);
                        counter!("salary_pages_failed_total", "kind" => failure.kind.as_str())
                            .increment(1);
                        result.failed.push(failure);
                    }
                }
            }
        }

        info!(
            "✅ Run finished in {:.1}s: {} attempted, {} written, {} skipped, {} failed",
            started.elapsed().as_secs_f64(),
            result.attempted,
            result.succeeded,
            result.skipped.len(),
            result.failed.len()
        );
        Ok(result)
    }

    /// Pending → Fetched → Normalized → Resolved → Written.
    #[instrument(skip(self, page), fields(employer = %page.employer.display_name, year = page.year))]
    async fn process_page(&self, page: &SourceUrl) -> std::result::Result<ArtifactPath, PageError> {
        let raw = self.fetcher.fetch(&page.url).await.at(PageStage::Pending)?;
        let raw_rows = raw.row_count();
        debug!("Fetched {} rows from {}", raw_rows, page.url);

        let dataset = normalize(raw, &page.employer, self.schema).at(PageStage::Fetched)?;
        if dataset.is_empty() {
            return Err(PageError {
                stage: PageStage::Normalized,
                error: EtlError::EmptyDataset(page.url.clone()),
            });
        }

        let diverging = dataset
            .records
            .iter()
            .filter(|r| r.submit_year != page.year)
            .count();
        if diverging > 0 {
            warn!(
                "{} of {} rows from {} have a submit year other than {}",
                diverging,
                dataset.len(),
                page.url,
                page.year
            );
        }

        let path = resolve(&self.config.storage_root, &dataset).at(PageStage::Normalized)?;
        self.sink.write(&dataset, &path).await.at(PageStage::Resolved)?;

        counter!("salary_rows_written_total", "employer" => page.employer.display_name.clone())
            .increment(dataset.len() as u64);
        info!(
            "💾 Wrote {} of {} rows to {}",
            dataset.len(),
            raw_rows,
            path
        );
        Ok(path)
    }
}
