use anyhow::{Context, Result};
use base64::Engine as _;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rollcall", about = "rollcall face-match CLI")]
struct Cli {
    /// Base URL of a running rollcalld.
    #[arg(long, default_value = "http://127.0.0.1:8321")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon status and roster counts
    Status,
    /// Upload a probe image and print the match report
    Check {
        /// Path to the probe image
        image: PathBuf,
        /// Send the image as a base64 form field instead of a file upload
        #[arg(long)]
        base64: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status => {
            let response = client
                .get(format!("{}/healthz", cli.server))
                .send()
                .await
                .context("daemon not reachable")?;
            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Commands::Check { image, base64: as_base64 } => {
            let bytes = std::fs::read(&image)
                .with_context(|| format!("reading {}", image.display()))?;

            let request = client.post(format!("{}/upload", cli.server));
            let response = if as_base64 {
                let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                request.form(&[("image_base64", encoded)]).send().await
            } else {
                let file_name = image
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "probe.jpg".to_string());
                let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
                let form = reqwest::multipart::Form::new().part("image", part);
                request.multipart(form).send().await
            }
            .context("upload failed")?;

            let status = response.status();
            let body: serde_json::Value = response
                .json()
                .await
                .context("daemon returned a non-JSON body")?;
            println!("{}", serde_json::to_string_pretty(&body)?);

            if !status.is_success() {
                anyhow::bail!("upload rejected: HTTP {status}");
            }
        }
    }

    Ok(())
}
