use crate::constants::ARTIFACT_PREFIX;
use crate::error::{EtlError, Result};
use crate::types::{ArtifactPath, CleanedDataset};

/// `<employer with spaces as underscores>_<submit_year>.csv`
pub fn artifact_file_name(employer: &str, submit_year: i32) -> String {
    format!("{}_{}.csv", employer.replace(' ', "_"), submit_year)
}

/// Destination of `dataset`, derived from its first record only.
pub fn resolve(bucket_root: &str, dataset: &CleanedDataset) -> Result<ArtifactPath> {
    let first = dataset.first().ok_or_else(|| {
        EtlError::EmptyDataset(format!("no record to name an artifact under {}", bucket_root))
    })?;
    Ok(ArtifactPath(format!(
        "{}/{}/{}",
        bucket_root.trim_end_matches('/'),
        ARTIFACT_PREFIX,
        artifact_file_name(&first.employer, first.submit_year)
    )))
}
