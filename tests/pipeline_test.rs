use anyhow::Result;
use async_trait::async_trait;
use h1b_salary_etl::config::PipelineConfig;
use h1b_salary_etl::error::{ErrorKind, EtlError};
use h1b_salary_etl::fetch::TableFetcher;
use h1b_salary_etl::pipeline::{PageStage, Pipeline};
use h1b_salary_etl::storage::{encode_csv, LocalFsSink, MemorySink, SinkWriter};
use h1b_salary_etl::types::{ArtifactPath, CleanedDataset, EmployerSpec, RawTable, YearRange};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const HEADERS: [&str; 7] = [
    "EMPLOYER",
    "JOB TITLE",
    "BASE SALARY",
    "LOCATION",
    "SUBMIT DATE",
    "START DATE",
    "Unnamed: 6",
];

fn table(rows: &[(&str, &str, &str)]) -> RawTable {
    RawTable::new(
        HEADERS.iter().map(|s| s.to_string()).collect(),
        rows.iter()
            .map(|(salary, location, date)| {
                vec![
                    Some("SCRAPED CO".to_string()),
                    Some("SOFTWARE ENGINEER".to_string()),
                    Some(salary.to_string()),
                    Some(location.to_string()),
                    Some(date.to_string()),
                    Some("10/01/2018".to_string()),
                    None,
                ]
            })
            .collect(),
    )
}

fn url(id: &str, year: i32) -> String {
    format!("https://h1bdata.info/index.php?em={}&job=&city=&year={}", id, year)
}

/// Serves canned tables by URL and records every request.
#[derive(Default)]
struct FakeFetcher {
    pages: HashMap<String, RawTable>,
    requested: Mutex<Vec<String>>,
}

impl FakeFetcher {
    fn with(mut self, url: String, table: RawTable) -> Self {
        self.pages.insert(url, table);
        self
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl TableFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> h1b_salary_etl::Result<RawTable> {
        self.requested.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| EtlError::fetch(url, "request failed with status: 404 Not Found"))
    }
}

/// Rejects every write.
struct ReadOnlySink;

#[async_trait]
impl SinkWriter for ReadOnlySink {
    async fn write(&self, _: &CleanedDataset, path: &ArtifactPath) -> h1b_salary_etl::Result<()> {
        Err(EtlError::write(path.as_str(), "permission denied"))
    }
}

fn config(employers: &[(&str, &str)], start: i32, end: i32) -> PipelineConfig {
    let mut config = PipelineConfig::with_defaults("bucket");
    config.employers = employers
        .iter()
        .map(|(name, id)| EmployerSpec::new(*name, *id))
        .collect();
    config.years = YearRange::new(start, end);
    config
}

#[tokio::test]
async fn test_single_page_end_to_end() -> Result<()> {
    let fetcher = Arc::new(FakeFetcher::default().with(
        url("apple+inc", 2018),
        table(&[("120000", "San Jose, CA", "03/15/2018")]),
    ));
    let sink = Arc::new(MemorySink::new());
    let pipeline = Pipeline::new(
        config(&[("apple", "apple+inc")], 2018, 2018),
        fetcher.clone(),
        sink.clone(),
    );

    let result = pipeline.run().await?;

    assert_eq!(fetcher.requested(), vec![url("apple+inc", 2018)]);
    assert_eq!(result.attempted, 1);
    assert_eq!(result.succeeded, 1);
    assert!(result.failed.is_empty());
    assert_eq!(result.written, vec![ArtifactPath("bucket/data/apple_2018.csv".into())]);

    let csv = String::from_utf8(sink.get("bucket/data/apple_2018.csv").await.unwrap())?;
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("employer,job_title,base_salary,submit_year,submit_month,state,city,scraped_employer")
    );
    assert_eq!(
        lines.next(),
        Some("apple,SOFTWARE ENGINEER,120000,2018,3,CA,San Jose,SCRAPED CO")
    );
    assert_eq!(lines.next(), None);
    Ok(())
}

#[tokio::test]
async fn test_fetch_failure_does_not_stop_later_pages() -> Result<()> {
    // 2018 is missing from the fake and fails; 2019 and 2020 still get written
    let fetcher = Arc::new(
        FakeFetcher::default()
            .with(url("uber", 2019), table(&[("150000", "San Francisco, CA", "01/10/2019")]))
            .with(url("uber", 2020), table(&[("155000", "New York, NY", "02/11/2020")])),
    );
    let sink = Arc::new(MemorySink::new());
    let pipeline = Pipeline::new(config(&[("uber", "uber")], 2018, 2020), fetcher.clone(), sink.clone());

    let result = pipeline.run().await?;

    assert_eq!(fetcher.requested().len(), 3);
    assert_eq!(result.attempted, 3);
    assert_eq!(result.succeeded, 2);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].url, url("uber", 2018));
    assert_eq!(result.failed[0].kind, ErrorKind::Fetch);
    assert_eq!(result.failed[0].stage, PageStage::Pending);
    assert_eq!(
        sink.paths().await,
        vec!["bucket/data/uber_2019.csv".to_string(), "bucket/data/uber_2020.csv".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn test_page_failures_are_classified() -> Result<()> {
    let mut missing_column = table(&[("120000", "Austin, TX", "05/05/2019")]);
    missing_column.headers.truncate(5);
    for row in &mut missing_column.rows {
        row.truncate(5);
    }

    let fetcher = Arc::new(
        FakeFetcher::default()
            .with(url("amazon", 2018), table(&[("120000", "Seattle, WA", "2018-03-15")]))
            .with(url("amazon", 2019), missing_column)
            .with(url("amazon", 2020), table(&[("N/A", "Seattle, WA", "03/15/2020")]))
            .with(url("amazon", 2021), table(&[("130000", "Seattle, WA", "03/15/2021")])),
    );
    let sink = Arc::new(MemorySink::new());
    let pipeline = Pipeline::new(config(&[("amazon", "amazon")], 2018, 2021), fetcher, sink.clone());

    let result = pipeline.run().await?;

    assert_eq!(result.attempted, 4);
    assert_eq!(result.succeeded, 1);
    assert_eq!(result.failures_of(ErrorKind::DateParse), 1);
    assert_eq!(result.failures_of(ErrorKind::Schema), 1);
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].kind, ErrorKind::EmptyDataset);
    assert_eq!(result.skipped[0].year, 2020);
    assert_eq!(result.failure_rate(), 0.5);
    assert_eq!(sink.paths().await, vec!["bucket/data/amazon_2021.csv".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_rows_from_another_year_are_kept() -> Result<()> {
    // the 2019 page lists a filing submitted in 2018 first
    let fetcher = Arc::new(FakeFetcher::default().with(
        url("uber", 2019),
        table(&[
            ("150000", "San Francisco, CA", "12/20/2018"),
            ("151000", "San Francisco, CA", "01/10/2019"),
        ]),
    ));
    let sink = Arc::new(MemorySink::new());
    let pipeline = Pipeline::new(config(&[("uber", "uber")], 2019, 2019), fetcher, sink.clone());

    let result = pipeline.run().await?;

    assert_eq!(result.succeeded, 1);
    assert!(result.failed.is_empty());
    assert_eq!(result.written, vec![ArtifactPath("bucket/data/uber_2018.csv".into())]);
    let csv = String::from_utf8(sink.get("bucket/data/uber_2018.csv").await.unwrap())?;
    let rows: Vec<&str> = csv.lines().skip(1).collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].contains(",2018,12,"));
    assert!(rows[1].contains(",2019,1,"));
    Ok(())
}

#[tokio::test]
async fn test_write_failure_is_recorded() -> Result<()> {
    let fetcher = Arc::new(FakeFetcher::default().with(
        url("google", 2018),
        table(&[("140000", "Mountain View, CA", "06/30/2018")]),
    ));
    let pipeline = Pipeline::new(
        config(&[("google", "google")], 2018, 2018),
        fetcher,
        Arc::new(ReadOnlySink),
    );

    let result = pipeline.run().await?;

    assert_eq!(result.succeeded, 0);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].kind, ErrorKind::Write);
    assert_eq!(result.failed[0].stage, PageStage::Resolved);
    assert!(result.exceeds(0.5));
    Ok(())
}

#[tokio::test]
async fn test_malformed_config_aborts_before_fetching() {
    let fetcher = Arc::new(FakeFetcher::default());
    let pipeline = Pipeline::new(
        config(&[("apple", "apple+inc"), ("apple", "apple")], 2018, 2019),
        fetcher.clone(),
        Arc::new(MemorySink::new()),
    );

    let result = pipeline.run().await;

    assert!(matches!(result, Err(EtlError::Config(_))));
    assert!(fetcher.requested().is_empty());
}

#[tokio::test]
async fn test_rerun_overwrites_local_artifact() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path().to_string_lossy().to_string();
    let fetcher = Arc::new(FakeFetcher::default().with(
        url("linkedin", 2019),
        table(&[
            ("110000", "Sunnyvale, CA", "07/04/2019"),
            ("112000", "Sunnyvale, CA", "08/04/2019"),
        ]),
    ));
    let mut cfg = config(&[("linked in", "linkedin")], 2019, 2019);
    cfg.storage_root = root.clone();
    let pipeline = Pipeline::new(cfg, fetcher, Arc::new(LocalFsSink));

    let first = pipeline.run().await?;
    let path = dir.path().join("data").join("linked_in_2019.csv");
    let once = std::fs::read(&path)?;
    let second = pipeline.run().await?;
    let twice = std::fs::read(&path)?;

    assert_eq!(first.written, second.written);
    assert_eq!(once, twice);
    assert_eq!(String::from_utf8(once)?.lines().count(), 3);
    assert_eq!(std::fs::read_dir(dir.path().join("data"))?.count(), 1);
    Ok(())
}

#[test]
fn test_encoded_rows_match_cleaned_rows() {
    let dataset = h1b_salary_etl::normalize::normalize(
        table(&[
            ("100000", "Austin, TX", "01/02/2019"),
            ("101000", "Dallas, TX", "02/02/2019"),
            ("", "Dallas, TX", "02/02/2019"),
        ]),
        &EmployerSpec::new("salesforce", "salesforce"),
        Default::default(),
    )
    .unwrap();
    let csv = String::from_utf8(encode_csv(&dataset).unwrap()).unwrap();
    assert_eq!(csv.lines().count(), dataset.len() + 1);
    assert_eq!(dataset.len(), 2);
}
