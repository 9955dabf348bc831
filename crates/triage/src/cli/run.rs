//! The `triage run` command: one full processing pass over the spool.

use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use triage_core::{
    BatchProcessor, Config, EpicGenerator, FsReplyOutbox, FsStore, LlmClient, SpoolSource,
};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Spool directory to drain (overrides config)
    #[arg(long)]
    pub spool: Option<PathBuf>,

    /// Epic store root directory (overrides config)
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Reply outbox directory (overrides config)
    #[arg(long)]
    pub outbox: Option<PathBuf>,
}

/// Execute the run command.
pub async fn execute(args: RunArgs, config: Config) -> anyhow::Result<()> {
    let spool_dir = args.spool.unwrap_or_else(|| config.spool_dir());
    let store_root = args.store.unwrap_or_else(|| config.storage_root());
    let outbox_dir = args.outbox.unwrap_or_else(|| config.outbox_dir());

    let client = LlmClient::from_config(&config);
    if client.primary().is_configured() {
        tracing::info!(backend = client.primary().name(), "run.primary_backend");
    }
    if client.fallback().is_configured() {
        tracing::info!(backend = client.fallback().name(), "run.fallback_backend");
    }

    let generator = EpicGenerator::new(client, config.rules_dir());
    let processor = BatchProcessor::new(
        Arc::new(FsStore::new(store_root)),
        Arc::new(generator),
        Arc::new(FsReplyOutbox::new(outbox_dir)),
    );

    let mut source = SpoolSource::new(spool_dir);
    let summary = processor.run(&mut source).await?;

    println!(
        "Processed {} mail(s), {} error(s).",
        summary.processed, summary.errors
    );
    if summary.errors > 0 {
        println!("Failed mails stay unread and will be retried on the next run.");
    }
    Ok(())
}
