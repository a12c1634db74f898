use crate::error::{EtlError, Result};
use crate::types::{ArtifactPath, CleanedDataset};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// Persists a cleaned dataset as one CSV object. Writing to an existing path
/// replaces the previous artifact.
#[async_trait]
pub trait SinkWriter: Send + Sync {
    async fn write(&self, dataset: &CleanedDataset, path: &ArtifactPath) -> Result<()>;
}

/// Header row plus one line per record, no index column.
pub fn encode_csv(dataset: &CleanedDataset) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&dataset.columns)?;
    for record in &dataset.records {
        let row: Vec<String> = dataset
            .columns
            .iter()
            .map(|c| record.value(c).unwrap_or_default())
            .collect();
        writer.write_record(&row)?;
    }
    writer
        .into_inner()
        .map_err(|e| EtlError::write("csv buffer", e.error()))
}

/// Artifacts on the local filesystem; the artifact path is a file path.
pub struct LocalFsSink;

#[async_trait]
impl SinkWriter for LocalFsSink {
    async fn write(&self, dataset: &CleanedDataset, path: &ArtifactPath) -> Result<()> {
        let bytes = encode_csv(dataset)?;
        let target = Path::new(path.as_str());
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| EtlError::write(path.as_str(), e))?;
        }

        // Rename over the target so readers never see a half-written file
        let staging = target.with_extension("csv.partial");
        fs::write(&staging, &bytes)
            .await
            .map_err(|e| EtlError::write(path.as_str(), e))?;
        if let Err(e) = fs::rename(&staging, target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(EtlError::write(path.as_str(), e));
        }

        debug!("Wrote {} bytes to {}", bytes.len(), path);
        Ok(())
    }
}

/// Object store reached over HTTP: `PUT {endpoint}/{path}?upsert=true`.
pub struct HttpObjectSink {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpObjectSink {
    pub fn new(endpoint: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EtlError::Config(format!("building http client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token,
        })
    }

    pub fn object_url(&self, path: &ArtifactPath) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            path.as_str().trim_start_matches('/')
        )
    }
}

#[async_trait]
impl SinkWriter for HttpObjectSink {
    async fn write(&self, dataset: &CleanedDataset, path: &ArtifactPath) -> Result<()> {
        let bytes = encode_csv(dataset)?;
        let size = bytes.len();
        let mut request = self
            .client
            .put(self.object_url(path))
            .header(CONTENT_TYPE, "text/csv")
            .query(&[("upsert", "true")])
            .body(bytes);
        if let Some(token) = &self.token {
            request = request
                .header(AUTHORIZATION, format!("Bearer {}", token))
                .header("apikey", token.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| EtlError::write(path.as_str(), e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EtlError::write(
                path.as_str(),
                format!("upload failed: {} - {}", status, body),
            ));
        }

        debug!("Uploaded {} bytes to {}", size, path);
        Ok(())
    }
}

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemorySink {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().await.get(path).cloned()
    }

    pub async fn paths(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl SinkWriter for MemorySink {
    async fn write(&self, dataset: &CleanedDataset, path: &ArtifactPath) -> Result<()> {
        let bytes = encode_csv(dataset)?;
        self.objects.lock().await.insert(path.0.clone(), bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CleanedRecord;

    fn dataset() -> CleanedDataset {
        CleanedDataset {
            columns: vec![
                "employer".into(),
                "job_title".into(),
                "base_salary".into(),
                "submit_year".into(),
                "submit_month".into(),
                "state".into(),
                "city".into(),
            ],
            records: vec![CleanedRecord {
                employer: "apple".into(),
                scraped_employer: "APPLE INC".into(),
                base_salary: 120000,
                submit_year: 2018,
                submit_month: Some(3),
                state: "CA".into(),
                city: "San Jose".into(),
                passthrough: vec![("job_title".into(), "ENGINEER, SENIOR".into())],
            }],
        }
    }

    #[test]
    fn test_encode_csv() {
        let text = String::from_utf8(encode_csv(&dataset()).unwrap()).unwrap();
        assert_eq!(
            text,
            "employer,job_title,base_salary,submit_year,submit_month,state,city\n\
             apple,\"ENGINEER, SENIOR\",120000,2018,3,CA,San Jose\n"
        );
    }

    #[tokio::test]
    async fn test_local_sink_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = ArtifactPath(format!("{}/data/apple_2018.csv", dir.path().display()));

        LocalFsSink.write(&dataset(), &path).await.unwrap();
        let first = std::fs::read(path.as_str()).unwrap();
        LocalFsSink.write(&dataset(), &path).await.unwrap();
        let second = std::fs::read(path.as_str()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first, encode_csv(&dataset()).unwrap());
        let entries = std::fs::read_dir(dir.path().join("data")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_local_sink_reports_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("data");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let path = ArtifactPath(format!("{}/apple_2018.csv", blocker.display()));

        let err = LocalFsSink.write(&dataset(), &path).await.unwrap_err();
        assert!(matches!(err, EtlError::Write { .. }));
    }

    #[tokio::test]
    async fn test_failed_rename_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        // a non-empty directory at the target path makes the rename fail
        let target = data.join("apple_2018.csv");
        std::fs::create_dir_all(target.join("occupied")).unwrap();
        let path = ArtifactPath(target.display().to_string());

        let err = LocalFsSink.write(&dataset(), &path).await.unwrap_err();

        assert!(matches!(err, EtlError::Write { .. }));
        assert!(!data.join("apple_2018.csv.partial").exists());
        assert_eq!(std::fs::read_dir(&data).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_memory_sink_replaces() {
        let sink = MemorySink::new();
        let path = ArtifactPath("bucket/data/apple_2018.csv".into());
        sink.write(&dataset(), &path).await.unwrap();
        sink.write(&dataset(), &path).await.unwrap();

        assert_eq!(sink.paths().await, vec!["bucket/data/apple_2018.csv".to_string()]);
        assert_eq!(sink.get(path.as_str()).await, Some(encode_csv(&dataset()).unwrap()));
    }

    #[test]
    fn test_object_url() {
        let sink = HttpObjectSink::new(
            "https://store.example.com/storage/v1/object/",
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        let url = sink.object_url(&ArtifactPath("bucket/data/apple_2018.csv".into()));
        assert_eq!(
            url,
            "https://store.example.com/storage/v1/object/bucket/data/apple_2018.csv"
        );
    }
}
