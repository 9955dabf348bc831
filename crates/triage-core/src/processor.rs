//! Batch processor: groups mails by project, folds each group into one
//! epic, and commits the result once per project.
//!
//! All merges for a project accumulate in memory; the store is written
//! exactly once at the end of the group, so downstream consumers watching
//! the store see one notification per project per run no matter how many
//! mails arrived. Acknowledgment happens strictly after the commit, and
//! only for mails whose fold succeeded; a failed mail stays unread and is
//! retried on the next run.

use crate::epic::{EpicBuilder, EpicRequest};
use crate::error::{LlmError, TriageError};
use crate::mail::{MailSource, RequirementMail};
use crate::notify::ReplySender;
use crate::storage::EpicStore;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Outcome counters for one processing run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Mails folded and committed.
    pub processed: usize,
    /// Mails that failed to fold, or belonged to a failed project.
    pub errors: usize,
}

pub struct BatchProcessor {
    store: Arc<dyn EpicStore>,
    generator: Arc<dyn EpicBuilder>,
    replies: Arc<dyn ReplySender>,
}

impl BatchProcessor {
    pub fn new(
        store: Arc<dyn EpicStore>,
        generator: Arc<dyn EpicBuilder>,
        replies: Arc<dyn ReplySender>,
    ) -> Self {
        Self {
            store,
            generator,
            replies,
        }
    }

    /// Fetch unread mails and process them, one project group at a time.
    ///
    /// A failing project never aborts the run; its mails count as errors and
    /// the remaining projects proceed.
    pub async fn run(&self, source: &mut dyn MailSource) -> Result<RunSummary, TriageError> {
        let mails = source.fetch_unread().await?;
        tracing::info!(count = mails.len(), "run.mails_fetched");

        let mut summary = RunSummary::default();
        if mails.is_empty() {
            tracing::info!("run.nothing_to_do");
            return Ok(summary);
        }

        // Group by project slug, preserving arrival order within each group.
        let mut by_project: BTreeMap<String, Vec<RequirementMail>> = BTreeMap::new();
        for mail in mails {
            by_project.entry(mail.project_slug.clone()).or_default().push(mail);
        }
        tracing::info!(project_count = by_project.len(), "run.projects_grouped");

        for (project_slug, project_mails) in by_project {
            let total = project_mails.len();
            match self.process_project(&project_slug, project_mails, source).await {
                Ok(committed) => {
                    summary.processed += committed;
                    summary.errors += total - committed;
                }
                Err(e) => {
                    summary.errors += total;
                    tracing::error!(project = %project_slug, error = %e, "run.project_failed");
                }
            }
        }

        tracing::info!(
            processed = summary.processed,
            errors = summary.errors,
            "run.finished"
        );
        Ok(summary)
    }

    /// Process one project group; returns the number of committed mails.
    async fn process_project(
        &self,
        project_slug: &str,
        mails: Vec<RequirementMail>,
        source: &mut dyn MailSource,
    ) -> Result<usize, TriageError> {
        tracing::info!(project = project_slug, mail_count = mails.len(), "project.run_started");

        // Load the baseline exactly once; the first fold seeds from it.
        let mut accumulated_epic = self.store.read_latest_epic(project_slug).await?;
        match &accumulated_epic {
            Some(epic) => {
                tracing::info!(project = project_slug, length = epic.len(), "project.existing_epic")
            }
            None => tracing::info!(project = project_slug, "project.no_existing_epic"),
        }

        // Freshest extension rules seen in this run's attachments.
        let mut pending_rules: Option<String> = None;
        let mut committed: Vec<RequirementMail> = Vec::new();

        for (index, mail) in mails.iter().enumerate() {
            tracing::info!(
                uid = %mail.uid,
                project = project_slug,
                subject = %mail.subject,
                position = index + 1,
                total = mails.len(),
                "project.folding_mail"
            );

            match self
                .fold_mail(mail, accumulated_epic.clone(), pending_rules.as_deref())
                .await
            {
                Ok(epic) => {
                    accumulated_epic = Some(epic);
                    if mail.extension_rules.is_some() {
                        pending_rules = mail.extension_rules.clone();
                    }
                    self.send_reply(mail, accumulated_epic.as_deref().unwrap_or_default())
                        .await;
                    committed.push(mail.clone());
                }
                Err(e) => {
                    // Excluded from this run's commit; stays unread for the
                    // next run. The accumulated epic keeps its last good
                    // value, so later mails still fold on top of it.
                    if let TriageError::Llm(
                        LlmError::NotConfigured | LlmError::AllBackendsUnavailable { .. },
                    ) = &e
                    {
                        tracing::warn!(
                            uid = %mail.uid,
                            project = project_slug,
                            "project.no_backend_available"
                        );
                    }
                    tracing::error!(
                        uid = %mail.uid,
                        project = project_slug,
                        error = %e,
                        "project.fold_failed"
                    );
                }
            }
        }

        if committed.is_empty() {
            tracing::warn!(project = project_slug, "project.no_mails_succeeded");
            return Ok(0);
        }

        // Rules first so the committed epic and its rules land together.
        if let Some(rules) = &pending_rules {
            self.store.write_extension_rules(project_slug, rules).await?;
        }

        // The commit point: one write per project per run.
        if let Some(epic) = &accumulated_epic {
            let project_name = &committed[0].project_name;
            let key = self.store.write_epic(project_slug, epic, project_name).await?;
            tracing::info!(
                project = project_slug,
                key = %key,
                mails_merged = committed.len(),
                "project.epic_committed"
            );
        }

        // Acknowledge only after the commit. A failing ack is logged and
        // skipped; the mail will be re-folded next run, which is the
        // accepted at-least-once behavior.
        for mail in &committed {
            if let Err(e) = source.mark_seen(&mail.uid).await {
                tracing::error!(uid = %mail.uid, project = project_slug, error = %e, "project.ack_failed");
            }
        }

        Ok(committed.len())
    }

    /// One fold step: resolve extension rules, then merge the mail into the
    /// accumulated epic.
    async fn fold_mail(
        &self,
        mail: &RequirementMail,
        accumulated_epic: Option<String>,
        pending_rules: Option<&str>,
    ) -> Result<String, TriageError> {
        let extension_rules = self.resolve_extension_rules(mail, pending_rules).await?;

        let request = EpicRequest {
            project_name: mail.project_name.clone(),
            requirements_body: mail.body.clone(),
            existing_epic: accumulated_epic,
            extension_rules,
            title: mail.title.clone(),
            idea: mail.idea.clone(),
            envs: mail.envs.clone(),
            directives: mail.directives.clone(),
        };
        Ok(self.generator.build(&request).await?)
    }

    /// Priority: attachment on this mail, then rules accumulated earlier in
    /// this run, then rules stored from a past run.
    async fn resolve_extension_rules(
        &self,
        mail: &RequirementMail,
        pending_rules: Option<&str>,
    ) -> Result<Option<String>, TriageError> {
        if let Some(rules) = &mail.extension_rules {
            tracing::info!(
                project = %mail.project_slug,
                length = rules.len(),
                "rules.from_attachment"
            );
            return Ok(Some(rules.clone()));
        }
        if let Some(rules) = pending_rules {
            return Ok(Some(rules.to_string()));
        }
        let stored = self.store.read_extension_rules(&mail.project_slug).await?;
        if let Some(rules) = &stored {
            tracing::info!(
                project = %mail.project_slug,
                length = rules.len(),
                "rules.from_store"
            );
        }
        Ok(stored)
    }

    /// Reply to the sender with the current epic attached. Failures are
    /// logged; they never block the rest of the group.
    async fn send_reply(&self, mail: &RequirementMail, epic: &str) {
        let Some(recipient) = &mail.sender else {
            return;
        };
        let body = format!(
            "Hello,\n\nWe've processed your requirements for '{}' and generated a \
             project specification document. Please see the attached file for \
             details.\n\nBest regards,\nJARVIS Agent",
            mail.project_name
        );
        let subject = format!("Re: {}", mail.subject);
        match self
            .replies
            .send_reply(recipient, &subject, &body, "requirements.md", epic.as_bytes())
            .await
        {
            Ok(()) => {
                tracing::info!(uid = %mail.uid, recipient, "project.reply_sent");
            }
            Err(e) => {
                tracing::error!(uid = %mail.uid, recipient, error = %e, "project.reply_failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MailError, StorageError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory store recording writes; epics keyed by slug.
    #[derive(Default)]
    struct MemStore {
        epics: Mutex<HashMap<String, String>>,
        rules: Mutex<HashMap<String, String>>,
        epic_writes: Mutex<Vec<String>>,
        fail_baseline_for: Option<String>,
    }

    #[async_trait]
    impl EpicStore for MemStore {
        async fn read_latest_epic(&self, slug: &str) -> Result<Option<String>, StorageError> {
            if self.fail_baseline_for.as_deref() == Some(slug) {
                return Err(StorageError::InvalidObject { key: slug.to_string() });
            }
            Ok(self.epics.lock().unwrap().get(slug).cloned())
        }

        async fn write_epic(
            &self,
            slug: &str,
            epic: &str,
            _short_description: &str,
        ) -> Result<String, StorageError> {
            self.epics.lock().unwrap().insert(slug.to_string(), epic.to_string());
            self.epic_writes.lock().unwrap().push(slug.to_string());
            Ok(format!("epics/{slug}.md"))
        }

        async fn read_extension_rules(&self, slug: &str) -> Result<Option<String>, StorageError> {
            Ok(self.rules.lock().unwrap().get(slug).cloned())
        }

        async fn write_extension_rules(
            &self,
            slug: &str,
            content: &str,
        ) -> Result<String, StorageError> {
            self.rules.lock().unwrap().insert(slug.to_string(), content.to_string());
            Ok(format!("epics/{slug}/rules"))
        }
    }

    /// Scripted builder: folds by concatenation, fails on marked bodies,
    /// and records every request it sees.
    #[derive(Default)]
    struct ScriptedBuilder {
        requests: Mutex<Vec<EpicRequest>>,
    }

    #[async_trait]
    impl EpicBuilder for ScriptedBuilder {
        async fn build(&self, request: &EpicRequest) -> Result<String, LlmError> {
            self.requests.lock().unwrap().push(request.clone());
            if request.requirements_body.contains("FAIL") {
                return Err(LlmError::Transient {
                    message: "scripted failure".to_string(),
                    status_code: Some(502),
                });
            }
            if request.requirements_body.contains("DOWN") {
                return Err(LlmError::AllBackendsUnavailable {
                    message: "scripted outage".to_string(),
                });
            }
            let base = request.existing_epic.as_deref().unwrap_or("<new>");
            Ok(format!("{base}+{}", request.requirements_body))
        }
    }

    #[derive(Default)]
    struct RecordingReplies {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl ReplySender for RecordingReplies {
        async fn send_reply(
            &self,
            recipient: &str,
            subject: &str,
            _body: &str,
            _attachment_name: &str,
            _attachment: &[u8],
        ) -> Result<(), MailError> {
            if self.fail {
                return Err(MailError::Io(std::io::Error::other("smtp down")));
            }
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), subject.to_string()));
            Ok(())
        }
    }

    struct VecSource {
        mails: Vec<RequirementMail>,
        seen: Vec<String>,
        fail_ack_for: Option<String>,
    }

    impl VecSource {
        fn new(mails: Vec<RequirementMail>) -> Self {
            Self {
                mails,
                seen: Vec::new(),
                fail_ack_for: None,
            }
        }
    }

    #[async_trait]
    impl MailSource for VecSource {
        async fn fetch_unread(&mut self) -> Result<Vec<RequirementMail>, MailError> {
            Ok(self.mails.clone())
        }

        async fn mark_seen(&mut self, uid: &str) -> Result<(), MailError> {
            if self.fail_ack_for.as_deref() == Some(uid) {
                return Err(MailError::Io(std::io::Error::other("imap down")));
            }
            self.seen.push(uid.to_string());
            Ok(())
        }
    }

    fn mail(uid: &str, project: &str, body: &str) -> RequirementMail {
        RequirementMail {
            uid: uid.to_string(),
            project_name: project.to_string(),
            project_slug: crate::mail::slugify(project),
            subject: format!("[JARVIS]-[{project}]"),
            body: body.to_string(),
            sender: Some("sender@example.com".to_string()),
            title: None,
            idea: None,
            envs: None,
            directives: None,
            extension_rules: None,
        }
    }

    fn processor(
        store: Arc<MemStore>,
        builder: Arc<ScriptedBuilder>,
        replies: Arc<RecordingReplies>,
    ) -> BatchProcessor {
        BatchProcessor::new(store, builder, replies)
    }

    #[tokio::test]
    async fn test_empty_mailbox_is_a_noop() {
        let store = Arc::new(MemStore::default());
        let processor = processor(
            store.clone(),
            Arc::new(ScriptedBuilder::default()),
            Arc::new(RecordingReplies::default()),
        );
        let mut source = VecSource::new(Vec::new());

        let summary = processor.run(&mut source).await.unwrap();
        assert_eq!(summary, RunSummary { processed: 0, errors: 0 });
        assert!(store.epic_writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_folds_sequentially_and_commits_once() {
        let store = Arc::new(MemStore::default());
        store
            .epics
            .lock()
            .unwrap()
            .insert("alpha".to_string(), "A1".to_string());
        let builder = Arc::new(ScriptedBuilder::default());
        let replies = Arc::new(RecordingReplies::default());
        let processor = processor(store.clone(), builder.clone(), replies.clone());

        let mut source = VecSource::new(vec![
            mail("i1", "Alpha", "r1"),
            mail("i2", "Alpha", "r2"),
            mail("i3", "Alpha", "r3"),
        ]);

        let summary = processor.run(&mut source).await.unwrap();
        assert_eq!(summary, RunSummary { processed: 3, errors: 0 });

        // Fold k's output feeds fold k+1; the first fold seeds from the baseline.
        let requests = builder.requests.lock().unwrap();
        assert_eq!(requests[0].existing_epic.as_deref(), Some("A1"));
        assert_eq!(requests[1].existing_epic.as_deref(), Some("A1+r1"));
        assert_eq!(requests[2].existing_epic.as_deref(), Some("A1+r1+r2"));

        // Exactly one commit, holding the final accumulated epic.
        assert_eq!(*store.epic_writes.lock().unwrap(), vec!["alpha"]);
        assert_eq!(
            store.epics.lock().unwrap().get("alpha").map(String::as_str),
            Some("A1+r1+r2+r3")
        );

        // All three acknowledged, and a reply went out per fold.
        assert_eq!(source.seen, vec!["i1", "i2", "i3"]);
        assert_eq!(replies.sent.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_mail_is_excluded_and_stays_unread() {
        let store = Arc::new(MemStore::default());
        store
            .epics
            .lock()
            .unwrap()
            .insert("alpha".to_string(), "A1".to_string());
        let builder = Arc::new(ScriptedBuilder::default());
        let processor = processor(
            store.clone(),
            builder.clone(),
            Arc::new(RecordingReplies::default()),
        );

        let mut source = VecSource::new(vec![
            mail("i1", "Alpha", "r1"),
            mail("i2", "Alpha", "FAIL"),
            mail("i3", "Alpha", "r3"),
        ]);

        let summary = processor.run(&mut source).await.unwrap();
        assert_eq!(summary, RunSummary { processed: 2, errors: 1 });

        // The failed fold's output is absent but later folds continue from
        // the last good accumulated value.
        assert_eq!(
            store.epics.lock().unwrap().get("alpha").map(String::as_str),
            Some("A1+r1+r3")
        );
        // Only the committed uids are acknowledged; i2 stays unread.
        assert_eq!(source.seen, vec!["i1", "i3"]);
    }

    #[tokio::test]
    async fn test_zero_successes_means_no_commit_and_no_acks() {
        let store = Arc::new(MemStore::default());
        let processor = processor(
            store.clone(),
            Arc::new(ScriptedBuilder::default()),
            Arc::new(RecordingReplies::default()),
        );

        let mut source = VecSource::new(vec![
            mail("i1", "Alpha", "DOWN"),
            mail("i2", "Alpha", "DOWN"),
        ]);

        let summary = processor.run(&mut source).await.unwrap();
        assert_eq!(summary, RunSummary { processed: 0, errors: 2 });
        assert!(store.epic_writes.lock().unwrap().is_empty());
        assert!(source.seen.is_empty());
    }

    #[tokio::test]
    async fn test_project_failure_does_not_abort_other_projects() {
        let store = Arc::new(MemStore {
            fail_baseline_for: Some("alpha".to_string()),
            ..Default::default()
        });
        let processor = processor(
            store.clone(),
            Arc::new(ScriptedBuilder::default()),
            Arc::new(RecordingReplies::default()),
        );

        let mut source = VecSource::new(vec![
            mail("i1", "Alpha", "r1"),
            mail("i2", "Beta", "r2"),
        ]);

        let summary = processor.run(&mut source).await.unwrap();
        assert_eq!(summary, RunSummary { processed: 1, errors: 1 });
        assert_eq!(*store.epic_writes.lock().unwrap(), vec!["beta"]);
        assert_eq!(source.seen, vec!["i2"]);
    }

    #[tokio::test]
    async fn test_extension_rules_priority_and_single_write() {
        let store = Arc::new(MemStore::default());
        store
            .rules
            .lock()
            .unwrap()
            .insert("alpha".to_string(), "stored rules".to_string());
        let builder = Arc::new(ScriptedBuilder::default());
        let processor = processor(
            store.clone(),
            builder.clone(),
            Arc::new(RecordingReplies::default()),
        );

        let mut with_attachment = mail("i2", "Alpha", "r2");
        with_attachment.extension_rules = Some("attached rules".to_string());
        let mut source = VecSource::new(vec![
            mail("i1", "Alpha", "r1"),
            with_attachment,
            mail("i3", "Alpha", "r3"),
        ]);

        processor.run(&mut source).await.unwrap();

        let requests = builder.requests.lock().unwrap();
        // First mail has no attachment and nothing pending, so stored rules apply.
        assert_eq!(requests[0].extension_rules.as_deref(), Some("stored rules"));
        // Second mail's own attachment wins.
        assert_eq!(requests[1].extension_rules.as_deref(), Some("attached rules"));
        // Third mail inherits the attachment accumulated earlier this run.
        assert_eq!(requests[2].extension_rules.as_deref(), Some("attached rules"));

        // The freshest attachment is persisted with the commit.
        assert_eq!(
            store.rules.lock().unwrap().get("alpha").map(String::as_str),
            Some("attached rules")
        );
    }

    #[tokio::test]
    async fn test_reply_failure_does_not_block_commit() {
        let store = Arc::new(MemStore::default());
        let processor = processor(
            store.clone(),
            Arc::new(ScriptedBuilder::default()),
            Arc::new(RecordingReplies {
                fail: true,
                ..Default::default()
            }),
        );

        let mut source = VecSource::new(vec![mail("i1", "Alpha", "r1")]);
        let summary = processor.run(&mut source).await.unwrap();
        assert_eq!(summary, RunSummary { processed: 1, errors: 0 });
        assert_eq!(*store.epic_writes.lock().unwrap(), vec!["alpha"]);
        assert_eq!(source.seen, vec!["i1"]);
    }

    #[tokio::test]
    async fn test_ack_failure_skips_that_uid_only() {
        let store = Arc::new(MemStore::default());
        let processor = processor(
            store.clone(),
            Arc::new(ScriptedBuilder::default()),
            Arc::new(RecordingReplies::default()),
        );

        let mut source = VecSource::new(vec![
            mail("i1", "Alpha", "r1"),
            mail("i2", "Alpha", "r2"),
        ]);
        source.fail_ack_for = Some("i1".to_string());

        let summary = processor.run(&mut source).await.unwrap();
        // The commit already happened; the failed ack just leaves i1 unread.
        assert_eq!(summary, RunSummary { processed: 2, errors: 0 });
        assert_eq!(*store.epic_writes.lock().unwrap(), vec!["alpha"]);
        assert_eq!(source.seen, vec!["i2"]);
    }

    #[tokio::test]
    async fn test_groups_projects_independently() {
        let store = Arc::new(MemStore::default());
        let processor = processor(
            store.clone(),
            Arc::new(ScriptedBuilder::default()),
            Arc::new(RecordingReplies::default()),
        );

        let mut source = VecSource::new(vec![
            mail("i1", "Alpha", "a1"),
            mail("i2", "Beta", "b1"),
            mail("i3", "Alpha", "a2"),
        ]);

        let summary = processor.run(&mut source).await.unwrap();
        assert_eq!(summary, RunSummary { processed: 3, errors: 0 });

        // One commit per project.
        let writes = store.epic_writes.lock().unwrap().clone();
        assert_eq!(writes.len(), 2);
        assert!(writes.contains(&"alpha".to_string()));
        assert!(writes.contains(&"beta".to_string()));

        let epics = store.epics.lock().unwrap();
        assert_eq!(epics.get("alpha").map(String::as_str), Some("<new>+a1+a2"));
        assert_eq!(epics.get("beta").map(String::as_str), Some("<new>+b1"));
    }
}
