use anyhow::{Context, Result};
use clap::Parser;
use notewriter_common::observability::{LogConfig, LogFormat, init_logging};
use notewriter_config::{NoteWriterConfig, NoteWriterConfigLoader};
use notewriter_runtime::NoteWriterRuntime;
use std::path::PathBuf;
use std::time::Duration;
use tether::build_from_config;
mod tether;

const DEFAULT_CONFIG_FILE: &str = "notewriter.yaml";

#[derive(Parser, Debug)]
#[command(name = "notewriter")]
#[command(about = "Research eligible posts and submit community notes")]
struct Args {
    /// YAML config file; `notewriter.yaml` is used when present.
    #[arg(long, env = "NOTEWRITER_CONFIG")]
    config: Option<PathBuf>,

    /// Number of eligible posts to request.
    #[arg(long)]
    num_posts: Option<u32>,

    /// Posts processed in parallel; also the worker thread count.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Write notes but never submit them.
    #[arg(long)]
    dry_run: bool,

    /// `text` or `json`.
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Args {
    fn apply(&self, cfg: &mut NoteWriterConfig) {
        if let Some(n) = self.num_posts {
            cfg.run.num_posts = n;
        }
        if let Some(c) = self.concurrency {
            cfg.run.concurrency = c;
        }
        if self.dry_run {
            cfg.run.dry_run = true;
        }
        if let Some(format) = self.log_format {
            cfg.logging.format = format;
        }
    }
}

fn load_config(args: &Args) -> Result<NoteWriterConfig> {
    let loader = match &args.config {
        Some(path) => NoteWriterConfigLoader::new().with_file(path),
        None => NoteWriterConfigLoader::new().with_optional_file(DEFAULT_CONFIG_FILE),
    };
    let mut cfg = loader.load().context("loading configuration")?;
    args.apply(&mut cfg);
    cfg.validate().context("validating configuration")?;
    Ok(cfg)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = load_config(&args)?;

    let log_path = init_logging(LogConfig {
        app_name: "notewriter",
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.stderr,
        format: cfg.logging.format,
        ..LogConfig::default()
    })?;
    tracing::info!(log = %log_path.display(), ?args, "app.start");

    let runtime = NoteWriterRuntime::build("notewriter-worker", Some(cfg.run.concurrency))?;
    runtime.cancel_on_ctrl_c();
    let cancel = runtime.cancellation();

    let outcome = runtime.block_on(async move {
        let tether = build_from_config(&cfg, cancel).await?;
        tether.run().await
    });
    runtime.shutdown(Duration::from_secs(5));

    let summary = outcome?;
    tracing::info!(?summary, "app.done");
    println!(
        "fetched {} | skipped {} | submitted {} | already submitted {} | dry-run notes {} | refusals {} | errors {} | submit failures {} | panics {} | not started {}",
        summary.fetched,
        summary.skipped,
        summary.submitted,
        summary.already_submitted,
        summary.dry_run_notes,
        summary.refusals,
        summary.errors,
        summary.submit_failures,
        summary.panics,
        summary.not_started,
    );
    Ok(())
}
