//! Triage Core - Resilient requirements-to-epic pipeline library.
//!
//! Triage consumes requirement mails, folds each project's mails into one
//! Markdown epic via an LLM, and commits the result to the epic store once
//! per project per run.
//!
//! # Architecture
//!
//! ```text
//! Mail → Group by project → Fold (LLM, retried + circuit-broken) → Commit → Ack
//! ```
//!
//! The LLM layer is a guarded facade: a primary ChatGPT-style HTTP backend
//! and a Copilot CLI fallback, each behind its own retry policy and circuit
//! breaker.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use triage_core::{BatchProcessor, Config, EpicGenerator, FsReplyOutbox, FsStore, LlmClient, SpoolSource};
//!
//! #[tokio::main]
//! async fn main() -> triage_core::Result<()> {
//!     let config = Config::load()?;
//!     let client = LlmClient::from_config(&config);
//!     let generator = EpicGenerator::new(client, config.rules_dir());
//!     let processor = BatchProcessor::new(
//!         Arc::new(FsStore::new(config.storage_root())),
//!         Arc::new(generator),
//!         Arc::new(FsReplyOutbox::new(config.outbox_dir())),
//!     );
//!     let mut source = SpoolSource::new(config.spool_dir());
//!     let summary = processor.run(&mut source).await?;
//!     println!("processed={} errors={}", summary.processed, summary.errors);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod epic;
pub mod error;
pub mod llm;
pub mod mail;
pub mod notify;
pub mod processor;
pub mod spool;
pub mod storage;

// Re-exports for convenient access
pub use config::Config;
pub use epic::{EpicBuilder, EpicGenerator, EpicRequest};
pub use error::{ConfigError, LlmError, MailError, Result, StorageError, TriageError};
pub use llm::{
    BreakerSettings, CircuitBreaker, CircuitState, GenerationRequest, LlmBackend, LlmClient,
    RetryPolicy,
};
pub use mail::{slugify, MailSource, RequirementMail};
pub use notify::{FsReplyOutbox, ReplySender};
pub use processor::{BatchProcessor, RunSummary};
pub use spool::SpoolSource;
pub use storage::{epic_key, EpicStore, FsStore};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
