pub mod config;
pub mod constants;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod resolve;
pub mod storage;
pub mod types;
pub mod urls;

pub use config::PipelineConfig;
pub use error::{ErrorKind, EtlError, Result};
pub use pipeline::{PageFailure, PageStage, Pipeline, RunResult};
