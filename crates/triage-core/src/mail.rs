//! Inbound requirement messages and the ingestion/acknowledgment contract.
//!
//! Fetching and decoding actual mailbox protocols lives behind the
//! [`MailSource`] trait; the processor only sees already-parsed
//! [`RequirementMail`] values grouped by project slug.

use crate::error::MailError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A parsed requirement message ready for epic generation.
///
/// Produced once by the ingestion collaborator and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementMail {
    /// Source-side identifier, used to acknowledge the message after commit
    pub uid: String,

    /// Human-readable project name, e.g. "Project Phoenix"
    pub project_name: String,

    /// Bucket-safe partition key, e.g. "project-phoenix"
    pub project_slug: String,

    /// Full subject line
    pub subject: String,

    /// Complete plain-text body
    pub body: String,

    /// Sender address, if known; used for the generated-epic reply
    #[serde(default)]
    pub sender: Option<String>,

    /// Concise project title from the structured `[title]` section
    #[serde(default)]
    pub title: Option<String>,

    /// Idea/concept description from the structured `[idea]` section
    #[serde(default)]
    pub idea: Option<String>,

    /// Environment variables block from the optional `[envs]` section
    #[serde(default)]
    pub envs: Option<String>,

    /// Technical instructions from the optional `[directives]` section
    #[serde(default)]
    pub directives: Option<String>,

    /// Contents of an attached project-extension-rules.md, if present
    #[serde(default)]
    pub extension_rules: Option<String>,
}

/// Ingestion + acknowledgment collaborator.
///
/// `fetch_unread` must return messages in a stable per-project order;
/// `mark_seen` is idempotent and is only ever invoked after the project's
/// epic has been committed.
#[async_trait]
pub trait MailSource: Send {
    async fn fetch_unread(&mut self) -> Result<Vec<RequirementMail>, MailError>;

    async fn mark_seen(&mut self, uid: &str) -> Result<(), MailError>;
}

/// Convert a human-readable project name to a lowercase hyphenated slug.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;
    for ch in name.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            for lower in ch.to_lowercase() {
                slug.push(lower);
            }
        } else if ch.is_whitespace() || ch == '_' || ch == '-' {
            pending_separator = true;
        }
        // Other punctuation is dropped entirely.
    }
    slug
}
