//! Filesystem spool implementing the ingestion contract.
//!
//! An upstream gateway drops one JSON document per inbound message into the
//! spool directory. Files are ingested in filename order, which gives every
//! project a stable arrival order as long as the gateway uses sortable
//! names (it uses sequence-prefixed ones). Acknowledged messages are moved
//! into a `seen/` subdirectory; moving is idempotent, so a re-acknowledged
//! uid is a no-op.
//!
//! A document that fails to decode is logged and skipped, never returned
//! and never acknowledged; one corrupt file must not block the healthy
//! messages around it.

use crate::error::MailError;
use crate::mail::{slugify, MailSource, RequirementMail};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;

const SEEN_DIR: &str = "seen";

/// The on-disk shape of one spooled message. The uid is the file stem, not
/// part of the document, so the gateway cannot accidentally duplicate it.
#[derive(Debug, Deserialize)]
struct SpoolMessage {
    project_name: String,
    subject: String,
    body: String,
    #[serde(default)]
    sender: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    idea: Option<String>,
    #[serde(default)]
    envs: Option<String>,
    #[serde(default)]
    directives: Option<String>,
    #[serde(default)]
    extension_rules: Option<String>,
}

/// Spool-directory mail source.
pub struct SpoolSource {
    dir: PathBuf,
}

impl SpoolSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn message_path(&self, uid: &str) -> PathBuf {
        self.dir.join(format!("{uid}.json"))
    }
}

#[async_trait]
impl MailSource for SpoolSource {
    async fn fetch_unread(&mut self) -> Result<Vec<RequirementMail>, MailError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            // An absent spool directory just means nothing has arrived yet.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        let mut mails = Vec::with_capacity(files.len());
        for path in files {
            let uid = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            let raw = tokio::fs::read_to_string(&path).await?;
            let message: SpoolMessage = match serde_json::from_str(&raw) {
                Ok(message) => message,
                Err(e) => {
                    // Skip, don't fail: a corrupt document would otherwise
                    // poison every run until someone deletes it by hand.
                    tracing::warn!(uid = %uid, error = %e, "spool.decode_failed");
                    continue;
                }
            };

            let project_slug = slugify(&message.project_name);
            mails.push(RequirementMail {
                uid,
                project_name: message.project_name,
                project_slug,
                subject: message.subject,
                body: message.body,
                sender: message.sender,
                title: message.title,
                idea: message.idea,
                envs: message.envs,
                directives: message.directives,
                extension_rules: message.extension_rules,
            });
        }

        tracing::info!(count = mails.len(), spool = %self.dir.display(), "spool.fetched");
        Ok(mails)
    }

    async fn mark_seen(&mut self, uid: &str) -> Result<(), MailError> {
        let source = self.message_path(uid);
        if !source.exists() {
            // Already moved on a previous run; acknowledgment is idempotent.
            return Ok(());
        }
        let seen = self.dir.join(SEEN_DIR);
        tokio::fs::create_dir_all(&seen).await?;
        tokio::fs::rename(&source, seen.join(format!("{uid}.json"))).await?;
        tracing::debug!(uid, "spool.marked_seen");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn spool_with(messages: &[(&str, &str)]) -> (tempfile::TempDir, SpoolSource) {
        let dir = tempfile::tempdir().unwrap();
        for (uid, project) in messages {
            let doc = serde_json::json!({
                "project_name": project,
                "subject": format!("[JARVIS]-[{project}]"),
                "body": "requirements",
            });
            tokio::fs::write(
                dir.path().join(format!("{uid}.json")),
                serde_json::to_vec(&doc).unwrap(),
            )
            .await
            .unwrap();
        }
        let source = SpoolSource::new(dir.path());
        (dir, source)
    }

    #[tokio::test]
    async fn test_fetch_returns_messages_in_filename_order() {
        let (_dir, mut source) =
            spool_with(&[("0002", "Beta"), ("0001", "Alpha"), ("0003", "Beta")]).await;
        let mails = source.fetch_unread().await.unwrap();
        let uids: Vec<&str> = mails.iter().map(|m| m.uid.as_str()).collect();
        assert_eq!(uids, vec!["0001", "0002", "0003"]);
        assert_eq!(mails[0].project_slug, "alpha");
        assert_eq!(mails[1].project_slug, "beta");
    }

    #[tokio::test]
    async fn test_fetch_missing_dir_is_empty() {
        let mut source = SpoolSource::new("/nonexistent/spool/for/tests");
        assert!(source.fetch_unread().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_seen_moves_and_is_idempotent() {
        let (dir, mut source) = spool_with(&[("0001", "Alpha")]).await;
        source.mark_seen("0001").await.unwrap();
        assert!(!dir.path().join("0001.json").exists());
        assert!(dir.path().join("seen").join("0001.json").exists());

        // Second ack is a no-op.
        source.mark_seen("0001").await.unwrap();

        // The seen message is no longer fetched.
        assert!(source.fetch_unread().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_skips_malformed_document() {
        let (dir, mut source) = spool_with(&[("0001", "Alpha"), ("0003", "Beta")]).await;
        tokio::fs::write(dir.path().join("0002.json"), b"not json")
            .await
            .unwrap();

        // The corrupt file is skipped; the healthy messages still arrive.
        let mails = source.fetch_unread().await.unwrap();
        let uids: Vec<&str> = mails.iter().map(|m| m.uid.as_str()).collect();
        assert_eq!(uids, vec!["0001", "0003"]);

        // And it keeps being skipped on the next fetch rather than wedging
        // the spool.
        let mails = source.fetch_unread().await.unwrap();
        assert_eq!(mails.len(), 2);
        assert!(dir.path().join("0002.json").exists());
    }
}
