//! survey-upload: upload a folder of geotagged photos as a survey.
//!
//! Credentials come from `--username`/`--password` or `SURVEY_USERNAME` /
//! `SURVEY_PASSWORD`; service settings from `SURVEY_*` variables (see
//! `UploaderConfig`). Rerun with `--continue` after an interruption.
//!
//! Exit status: 0 when every photo is uploaded, 2 when the upload finished
//! with failed photos, 1 on a fatal error.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use survey_api_client::ApiClient;
use survey_cli::{build_survey, init_tracing, local_photos, metadata, scan};
use survey_core::{PipelineError, UploaderConfig};
use survey_upload::{CheckpointStore, Credentials, LoggingObserver, UploadPipeline, UploadReport};

const EXIT_INCOMPLETE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "survey-upload", version, about = "Upload a geotagged photo survey")]
struct Cli {
    /// Account user name
    #[arg(short, long, env = "SURVEY_USERNAME")]
    username: String,

    /// Account password
    #[arg(short, long, env = "SURVEY_PASSWORD", hide_env_values = true)]
    password: String,

    /// Folder containing the survey's JPEG photos; checkpoints are kept here
    #[arg(short, long)]
    folder: PathBuf,

    /// Survey name (defaults to the folder name)
    #[arg(short = 'n', long)]
    survey_name: Option<String>,

    /// Service base URL, overrides SURVEY_API_URL
    #[arg(long)]
    host: Option<String>,

    /// Resume the upload recorded in the folder's checkpoint files
    #[arg(short = 'c', long = "continue")]
    resume: bool,

    /// HTTP(S) proxy URL, overrides SURVEY_PROXY_URL
    #[arg(long)]
    proxy: Option<String>,

    /// Extra PEM root certificate to trust, overrides SURVEY_CA_CERT
    #[arg(long, value_name = "PEM")]
    ca_cert: Option<PathBuf>,
}

impl Cli {
    fn survey_name(&self) -> Result<String> {
        if let Some(name) = &self.survey_name {
            return Ok(name.clone());
        }
        let folder = self
            .folder
            .canonicalize()
            .with_context(|| format!("Invalid photo folder {}", self.folder.display()))?;
        folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("Cannot derive a survey name from {}", folder.display()))
    }

    fn config(&self) -> Result<UploaderConfig> {
        let mut config = UploaderConfig::from_env().context("Failed to load configuration")?;
        if let Some(host) = &self.host {
            config.api_url = host.trim_end_matches('/').to_string();
        }
        if let Some(proxy) = &self.proxy {
            config.proxy_url = Some(proxy.clone());
        }
        if let Some(ca_cert) = &self.ca_cert {
            config.ca_cert_path = Some(ca_cert.clone());
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

async fn run(cli: Cli) -> Result<UploadReport> {
    let config = cli.config()?;
    let survey_name = cli.survey_name()?;

    let paths = scan::find_photos(&cli.folder).await?;
    if paths.is_empty() {
        return Err(anyhow!("No .jpg/.jpeg photos found in {}", cli.folder.display()));
    }
    tracing::info!(folder = %cli.folder.display(), photos = paths.len(), "Reading photo metadata");

    let photos = tokio::task::spawn_blocking(move || metadata::read_all(paths.as_slice()))
        .await
        .context("Metadata reader panicked")??;
    let survey = build_survey(&survey_name, &photos, chrono::Utc::now())?;
    let photos = local_photos(&photos);

    let client = ApiClient::from_config(&config).context("Failed to create API client")?;
    let pipeline = UploadPipeline::new(client, CheckpointStore::new(&cli.folder));
    let credentials = Credentials::new(cli.username, cli.password);

    pipeline
        .run(&credentials, &survey, &photos, cli.resume, &LoggingObserver)
        .await
        .map_err(|e| {
            if let PipelineError::Aborted { summary, .. } = &e {
                tracing::error!(
                    attempted = summary.attempted.len(),
                    succeeded = summary.succeeded,
                    failed = summary.failed.len(),
                    "Upload aborted; rerun with --continue to resume"
                );
            }
            anyhow::Error::new(e)
        })
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(report) => {
            let summary = &report.summary;
            println!(
                "Flight {}: {} of {} photos uploaded this run, {} failed",
                report.project.flight_id(),
                summary.succeeded,
                summary.total,
                summary.failed.len()
            );
            for failed in &summary.failed {
                println!("  failed: {} ({})", failed.local_path.display(), failed.reason);
            }
            if report.is_complete() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_INCOMPLETE)
            }
        }
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Upload failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
