use clap::Parser;
use h1b_salary_etl::config::PipelineConfig;
use h1b_salary_etl::fetch::HtmlTableFetcher;
use h1b_salary_etl::logging;
use h1b_salary_etl::pipeline::{Pipeline, RunResult};
use h1b_salary_etl::storage::{HttpObjectSink, LocalFsSink, SinkWriter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "h1b_salary_etl")]
#[command(about = "Harvest H-1B salary disclosures into one CSV per employer and year")]
#[command(version = "0.1.0")]
struct Cli {
    /// Destination storage root (bucket name, or a local directory without a sink endpoint)
    #[arg(long)]
    bucket: String,

    /// Optional TOML file overriding employers, years, timeouts and the sink
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for the daily log files
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Print the run result as JSON instead of a text summary
    #[arg(long)]
    json: bool,
}

fn print_summary(result: &RunResult) {
    println!("\n📊 Salary run results:");
    println!("   Pages attempted: {}", result.attempted);
    println!("   Written: {}", result.succeeded);
    println!("   Skipped (no rows): {}", result.skipped.len());
    println!("   Failed: {}", result.failed.len());

    if !result.failed.is_empty() {
        println!("\n⚠️  Failed pages:");
        for failure in &result.failed {
            println!("   - [{}] {}: {}", failure.kind, failure.url, failure.message);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let _guard = logging::init_logging(&cli.log_dir);

    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path, cli.bucket.clone())?,
        None => PipelineConfig::with_defaults(cli.bucket.clone()),
    };
    config.validate()?;

    let sink: Arc<dyn SinkWriter> = match &config.sink.endpoint {
        Some(endpoint) => {
            info!("Writing artifacts to object store at {}", endpoint);
            Arc::new(HttpObjectSink::new(
                endpoint.clone(),
                config.sink_token()?,
                config.fetch.timeout(),
            )?)
        }
        None => {
            info!("Writing artifacts under local directory {}", config.storage_root);
            Arc::new(LocalFsSink)
        }
    };
    let fetcher = Arc::new(HtmlTableFetcher::new(config.fetch.timeout())?);
    let max_failure_rate = config.max_failure_rate;

    let pipeline = Pipeline::new(config, fetcher, sink);
    let result = match pipeline.run().await {
        Ok(result) => result,
        Err(e) => {
            error!("Salary run aborted: {}", e);
            return Err(e.into());
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }

    if result.exceeds(max_failure_rate) {
        warn!(
            "Failure rate {:.2} exceeds the configured maximum {:.2}",
            result.failure_rate(),
            max_failure_rate
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
