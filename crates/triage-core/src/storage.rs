//! Epic store contract and the filesystem adapter.
//!
//! Object keys follow the original bucket conventions so stores are
//! interchangeable:
//!
//!   epics/<short-description>_<YYYY-MM-DD>.md
//!   epics/project-extension-rules.md
//!
//! "Latest epic" is the lexicographically greatest key under `epics/`; the
//! date suffix makes that recency.

use crate::error::StorageError;
use async_trait::async_trait;
use std::path::PathBuf;

const EXTENSION_RULES_KEY: &str = "project-extension-rules.md";

/// Storage collaborator for per-project epics.
///
/// `write_epic` is the commit point: the processor calls it at most once per
/// project per run, after all folds for that project have finished.
#[async_trait]
pub trait EpicStore: Send + Sync {
    /// Content of the most recently committed epic, or `None`.
    async fn read_latest_epic(&self, project_slug: &str) -> Result<Option<String>, StorageError>;

    /// Persist the merged epic; returns an opaque object key.
    async fn write_epic(
        &self,
        project_slug: &str,
        epic_markdown: &str,
        short_description: &str,
    ) -> Result<String, StorageError>;

    /// Previously stored project-extension rules, or `None`.
    async fn read_extension_rules(
        &self,
        project_slug: &str,
    ) -> Result<Option<String>, StorageError>;

    /// Store project-extension rules; returns the object key.
    async fn write_extension_rules(
        &self,
        project_slug: &str,
        content: &str,
    ) -> Result<String, StorageError>;
}

/// Build a short slug from the first `max_words` words of `text`.
fn short_description(text: &str, max_words: usize) -> String {
    let words: Vec<String> = text
        .split_whitespace()
        .take(max_words)
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect();
    if words.is_empty() {
        "epic".to_string()
    } else {
        words.join("-")
    }
}

/// Build the object key for an epic written today.
pub fn epic_key(description: &str) -> String {
    let today = chrono::Utc::now().date_naive();
    format!("epics/{}_{today}.md", short_description(description, 4))
}

/// Filesystem-backed epic store.
///
/// One directory per project under `root`, with the same key layout the
/// object store uses, so local runs and tests see identical behavior.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn epics_dir(&self, project_slug: &str) -> PathBuf {
        self.root.join(project_slug).join("epics")
    }

    async fn read_text(&self, path: &PathBuf) -> Result<Option<String>, StorageError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let key = path.to_string_lossy().into_owned();
                let text = String::from_utf8(bytes)
                    .map_err(|_| StorageError::InvalidObject { key })?;
                Ok(Some(text))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_text(&self, path: &PathBuf, content: &str) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait]
impl EpicStore for FsStore {
    async fn read_latest_epic(&self, project_slug: &str) -> Result<Option<String>, StorageError> {
        let dir = self.epics_dir(project_slug);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // Lexicographically greatest epic file; the date suffix makes that
        // the most recent one. The rules file is not an epic.
        let mut latest: Option<String> = None;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == EXTENSION_RULES_KEY || !name.ends_with(".md") {
                continue;
            }
            if latest.as_deref().is_none_or(|current| name.as_str() > current) {
                latest = Some(name);
            }
        }

        match latest {
            Some(name) => self.read_text(&dir.join(name)).await,
            None => Ok(None),
        }
    }

    async fn write_epic(
        &self,
        project_slug: &str,
        epic_markdown: &str,
        short_description: &str,
    ) -> Result<String, StorageError> {
        let key = epic_key(short_description);
        let path = self.root.join(project_slug).join(&key);
        self.write_text(&path, epic_markdown).await?;
        tracing::info!(project = project_slug, key = %key, "store.epic_written");
        Ok(key)
    }

    async fn read_extension_rules(
        &self,
        project_slug: &str,
    ) -> Result<Option<String>, StorageError> {
        self.read_text(&self.epics_dir(project_slug).join(EXTENSION_RULES_KEY))
            .await
    }

    async fn write_extension_rules(
        &self,
        project_slug: &str,
        content: &str,
    ) -> Result<String, StorageError> {
        let key = format!("epics/{EXTENSION_RULES_KEY}");
        let path = self.root.join(project_slug).join(&key);
        self.write_text(&path, content).await?;
        tracing::info!(project = project_slug, key = %key, "store.extension_rules_written");
        Ok(key)
    }
}
