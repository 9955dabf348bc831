//! Outbound reply delivery contract.
//!
//! After a mail folds successfully, the sender gets a reply with the
//! generated epic attached. Actual mail transport is a collaborator behind
//! [`ReplySender`]; reply failures are logged by the processor and never
//! block further work.

use crate::error::MailError;
use async_trait::async_trait;
use std::path::PathBuf;

/// Notification collaborator: delivers a reply with one attachment.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn send_reply(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        attachment_name: &str,
        attachment: &[u8],
    ) -> Result<(), MailError>;
}

/// Filesystem outbox: one directory per reply, holding the body and the
/// attachment. A relay process (or a test) picks replies up from there.
pub struct FsReplyOutbox {
    dir: PathBuf,
    counter: std::sync::atomic::AtomicU64,
}

impl FsReplyOutbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counter: std::sync::atomic::AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl ReplySender for FsReplyOutbox {
    async fn send_reply(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        attachment_name: &str,
        attachment: &[u8],
    ) -> Result<(), MailError> {
        let seq = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let stamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%SZ");
        let reply_dir = self.dir.join(format!("{stamp}_{seq:04}"));
        tokio::fs::create_dir_all(&reply_dir).await.map_err(MailError::Io)?;

        let envelope = format!("To: {recipient}\nSubject: {subject}\n\n{body}\n");
        tokio::fs::write(reply_dir.join("message.txt"), envelope)
            .await
            .map_err(MailError::Io)?;
        tokio::fs::write(reply_dir.join(attachment_name), attachment)
            .await
            .map_err(MailError::Io)?;

        tracing::debug!(recipient, subject, outbox = %reply_dir.display(), "reply.queued");
        Ok(())
    }
}
