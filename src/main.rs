//! CLI entry point for bulkpull.

use std::process::ExitCode;

use anyhow::{Context, anyhow};
use bulkpull_core::config::default_config_path;
use bulkpull_core::{
    Backend, Communicator, Config, DownloadPool, DownloadToken, PoolOptions, build_http_client,
    format_byte_size,
};
use clap::Parser;
use tracing::{debug, error, info};

mod cli;
mod exit;

use cli::Args;
use exit::{ProcessExit, determine_exit_outcome, pause_before_exit};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.default_log_level()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");
    info!(version = env!("CARGO_PKG_VERSION"), "bulkpull starting");

    let (exit, immediate_exit) = run(&args).await;
    pause_before_exit(immediate_exit);
    exit.into()
}

/// Runs one download session and returns the exit outcome together with the
/// configured `immediate_exit` flag.
async fn run(args: &Args) -> (ProcessExit, bool) {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config = match Config::load(&config_path)
        .with_context(|| format!("could not load config from '{}'", config_path.display()))
    {
        Ok(config) => config,
        Err(e) => return (fail(ProcessExit::Config, &e), false),
    };
    let immediate_exit = config.immediate_exit;

    let exit = match session(args, &config).await {
        Ok(exit) => exit,
        Err((exit, e)) => fail(exit, &e),
    };
    (exit, immediate_exit)
}

fn exit_with(exit: ProcessExit) -> impl FnOnce(anyhow::Error) -> (ProcessExit, anyhow::Error) {
    move |e| (exit, e)
}

fn fail(exit: ProcessExit, e: &anyhow::Error) -> ProcessExit {
    error!(exit_code = exit.code(), "{e:#}");
    exit
}

async fn session(args: &Args, config: &Config) -> Result<ProcessExit, (ProcessExit, anyhow::Error)> {
    let vaultdoor_url = config
        .vaultdoor_url()
        .map_err(anyhow::Error::from)
        .map_err(exit_with(ProcessExit::InvalidUri))?;
    let archivehunter_url = config
        .archivehunter_url()
        .map_err(anyhow::Error::from)
        .map_err(exit_with(ProcessExit::InvalidUri))?;

    let raw_token = args
        .token
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| anyhow!("a download token must be given as the first positional argument"))
        .map_err(exit_with(ProcessExit::MissingToken))?;

    let token = DownloadToken::parse(raw_token)
        .context("provided download token was not properly formed")
        .map_err(exit_with(ProcessExit::Token))?;
    info!(backend = %token.backend(), "download token accepted");

    let archivehunter_url = match (archivehunter_url, token.backend()) {
        (Some(url), _) => url,
        (None, Backend::VaultDoor) => vaultdoor_url.clone(),
        (None, Backend::ArchiveHunter) => {
            return Err((
                ProcessExit::InvalidUri,
                anyhow!("`archivehunter_uri` must be set to redeem a bulkdownload token"),
            ));
        }
    };

    let client = build_http_client()
        .context("could not build HTTP client")
        .map_err(exit_with(ProcessExit::Init))?;
    let communicator = Communicator::new(vaultdoor_url, archivehunter_url, token.backend(), client);

    let manifest = communicator
        .redeem(&token)
        .await
        .context("could not redeem download token")
        .map_err(exit_with(ProcessExit::Token))?;

    let (total_files, total_bytes) = manifest.totals();
    let total_size = format_byte_size(total_bytes);
    info!(
        job = %manifest.metadata.id,
        "will try to download a total of {total_files} files totalling {total_size}"
    );

    let download_path = config
        .resolve_download_path(args.to.as_deref())
        .ok_or_else(|| {
            anyhow!("no download path has been set; pass --to or set `download_path` in the config file")
        })
        .map_err(exit_with(ProcessExit::NoDownloadPath))?;

    let options = PoolOptions {
        workers: config.worker_count(),
        queue_size: config.queue_size(),
        allow_overwrite: config.allow_overwrite,
        ..PoolOptions::default()
    };
    let pool = DownloadPool::start(
        communicator,
        &manifest.retrieval_token,
        &download_path,
        options,
    )
    .context("could not initialise download workers")
    .map_err(exit_with(ProcessExit::Init))?;

    for entry in manifest.entries {
        pool.enqueue(entry)
            .await
            .context("download queue closed before every entry was queued")
            .map_err(exit_with(ProcessExit::Init))?;
    }
    debug!("enqueued all entries, waiting for download workers");

    let stats = pool.shutdown(true).await;
    info!(
        completed = stats.completed(),
        failed = stats.failed(),
        blocked = stats.blocked(),
        retried = stats.retried(),
        "download run finished"
    );
    Ok(determine_exit_outcome(&stats))
}
