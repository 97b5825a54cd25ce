//! mediaforge command line client.
//!
//! Runs conversions through the local engine, falling back to the configured
//! remote service, and fetches remote media through the SSRF-guarded fetcher.
//! Configuration comes from MEDIAFORGE_CONFIG (default `config.toml`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use mediaforge_cli::{
    conversion_progress_line, download_progress_line, init_tracing, input_format, output_paths,
};
use mediaforge_core::{
    engine::{resolve, ProgressEvent},
    fetcher::DownloadProgress,
    load_config_or_default,
    telemetry::{create_telemetry_system, TracingSink},
    validate_config, ConversionEngine, ConversionJob, FetchMode, MediaFetcher, MediaFormat,
    RemoteSourceDescriptor,
};

/// Buffer size for the telemetry channel
const TELEMETRY_BUFFER_SIZE: usize = 64;

#[derive(Parser)]
#[command(name = "mediaforge", about = "Media conversion engine CLI")]
struct Cli {
    /// Config file (overrides MEDIAFORGE_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the detected local capabilities
    Capabilities,
    /// Show which venue a conversion would start on
    Resolve {
        /// Source format extension
        #[arg(long)]
        from: String,
        /// Target format extension
        #[arg(long)]
        to: String,
    },
    /// Convert a file
    Convert {
        /// Input file
        input: PathBuf,
        /// Target format extension
        #[arg(long)]
        to: String,
        /// Source format, when the input has no usable extension
        #[arg(long)]
        from: Option<String>,
        /// Quality hint between 0.0 and 1.0
        #[arg(long)]
        quality: Option<f32>,
        /// Output path; pages of a multi-page result get a numeric suffix
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Download media from a URL
    Fetch {
        /// Page or media URL
        url: String,
        /// audio or video
        #[arg(long, default_value = "video")]
        mode: String,
        /// Output directory
        #[arg(long, short, default_value = ".")]
        output_dir: PathBuf,
    },
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .or_else(|| std::env::var("MEDIAFORGE_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config.toml"));
    let config = load_config_or_default(Some(&config_path))
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    match cli.command {
        Commands::Capabilities => {
            let engine = ConversionEngine::new(&config.engine).await?;
            print_json(engine.capabilities())?;
        }
        Commands::Resolve { from, to } => {
            let from = parse_format(&from)?;
            let to = parse_format(&to)?;
            let engine = ConversionEngine::new(&config.engine).await?;
            let strategy = resolve(from, to, engine.capabilities())?;
            print_json(&serde_json::json!({
                "from": from,
                "to": to,
                "strategy": strategy,
            }))?;
        }
        Commands::Convert {
            input,
            to,
            from,
            quality,
            output,
        } => {
            let from = input_format(&input, from.as_deref())?;
            let to = parse_format(&to)?;
            let payload = tokio::fs::read(&input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;

            let (telemetry, writer) =
                create_telemetry_system(Arc::new(TracingSink), TELEMETRY_BUFFER_SIZE);
            let writer_handle = tokio::spawn(writer.run());

            let engine = ConversionEngine::new(&config.engine)
                .await?
                .with_telemetry(telemetry);
            let job = ConversionJob::new(from, to, payload, quality)?;
            tracing::info!(job_id = %job.job_id(), %from, %to, "Starting conversion");

            let (progress_tx, mut progress_rx) = mpsc::channel::<ProgressEvent>(32);
            let printer = tokio::spawn(async move {
                while let Some(event) = progress_rx.recv().await {
                    eprintln!("{}", conversion_progress_line(&event));
                }
            });

            let outcome = engine.convert_with_progress(job, Some(progress_tx)).await;
            let _ = printer.await;

            // Closing the last handle lets the writer drain and exit.
            drop(engine);
            let _ = writer_handle.await;

            let outcome = outcome?;
            let buffers = outcome.result.buffers();
            let paths = output_paths(&input, output.as_deref(), to, buffers.len());
            for (path, buffer) in paths.iter().zip(&buffers) {
                tokio::fs::write(path, buffer)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }

            print_json(&serde_json::json!({
                "strategy": outcome.strategy,
                "attempts": outcome.attempts,
                "outputs": paths,
            }))?;
        }
        Commands::Fetch {
            url,
            mode,
            output_dir,
        } => {
            let mode: FetchMode = serde_json::from_value(serde_json::Value::String(mode))
                .context("mode must be 'audio' or 'video'")?;
            let fetcher = MediaFetcher::new(config.fetcher.clone())?;

            let (progress_tx, mut progress_rx) = mpsc::channel::<DownloadProgress>(32);
            let printer = tokio::spawn(async move {
                while let Some(progress) = progress_rx.recv().await {
                    eprint!("\r{}", download_progress_line(&progress));
                }
                eprintln!();
            });

            let media = fetcher
                .fetch(&RemoteSourceDescriptor { url, mode }, Some(progress_tx))
                .await?;

            let path = output_dir.join(&media.filename);
            let mut file = tokio::fs::File::create(&path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut body = media.body;
            let mut written = 0u64;
            while let Some(chunk) = body.next().await {
                let chunk = chunk.context("Download interrupted")?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            drop(body);
            let _ = printer.await;

            print_json(&serde_json::json!({
                "path": path,
                "format": media.format,
                "source": media.source,
                "bytes": written,
            }))?;
        }
    }

    Ok(())
}

fn parse_format(raw: &str) -> Result<MediaFormat> {
    MediaFormat::from_extension(raw).with_context(|| format!("Unknown format '{raw}'"))
}
