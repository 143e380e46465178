//! Agency-side review of a student's LOR/SOP/Resume bundle.
//!
//! Local state is only ever replaced by the row the server hands back after a
//! write, so a failed write leaves the last confirmed state in place. Writes
//! are unconditional: two reviewers editing the same bundle is last write wins.

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{FinderError, FinderResult};
use crate::models::{DocumentKind, StudentDocumentRecord};

/// Access to the `student_documents` table. Writes return the updated row, or
/// `None` when no row matched the user id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn fetch(&self, user_id: Uuid) -> FinderResult<Option<StudentDocumentRecord>>;

    async fn set_feedback(
        &self,
        user_id: Uuid,
        kind: DocumentKind,
        feedback: Option<&str>,
        reviewer: Option<&str>,
    ) -> FinderResult<Option<StudentDocumentRecord>>;

    async fn set_verified(
        &self,
        user_id: Uuid,
        kind: DocumentKind,
        verified: bool,
    ) -> FinderResult<Option<StudentDocumentRecord>>;
}

pub struct ReviewSession<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    reviewer: String,
    record: StudentDocumentRecord,
}

impl<'a, S: DocumentStore + ?Sized> ReviewSession<'a, S> {
    pub async fn open(
        store: &'a S,
        user_id: Uuid,
        reviewer: impl Into<String>,
    ) -> FinderResult<Self> {
        let record = store
            .fetch(user_id)
            .await?
            .ok_or_else(|| FinderError::NotFound(format!("documents for student {user_id}")))?;

        Ok(Self {
            store,
            reviewer: reviewer.into(),
            record,
        })
    }

    pub fn record(&self) -> &StudentDocumentRecord {
        &self.record
    }

    pub async fn save_feedback(&mut self, kind: DocumentKind, text: &str) -> FinderResult<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FinderError::Validation("feedback cannot be empty".to_string()));
        }

        let updated = self
            .store
            .set_feedback(self.record.user_id, kind, Some(text), Some(self.reviewer.as_str()))
            .await?;
        self.accept(updated, kind, "save feedback")?;
        info!(user_id = %self.record.user_id, document = %kind, "feedback saved");
        Ok(())
    }

    /// Clears feedback for `kind`. Callers confirm with the reviewer first.
    pub async fn delete_feedback(&mut self, kind: DocumentKind) -> FinderResult<()> {
        let updated = self
            .store
            .set_feedback(self.record.user_id, kind, None, None)
            .await?;
        self.accept(updated, kind, "delete feedback")?;
        info!(user_id = %self.record.user_id, document = %kind, "feedback deleted");
        Ok(())
    }

    /// Flips the verified flag and returns the new value.
    pub async fn toggle_verified(&mut self, kind: DocumentKind) -> FinderResult<bool> {
        let verified = !self.record.entry(kind).verified;
        let updated = self
            .store
            .set_verified(self.record.user_id, kind, verified)
            .await?;
        self.accept(updated, kind, "update verification")?;
        info!(user_id = %self.record.user_id, document = %kind, verified, "verification updated");
        Ok(self.record.entry(kind).verified)
    }

    fn accept(
        &mut self,
        updated: Option<StudentDocumentRecord>,
        kind: DocumentKind,
        action: &str,
    ) -> FinderResult<()> {
        match updated {
            Some(record) => {
                self.record = record;
                Ok(())
            }
            None => {
                warn!(user_id = %self.record.user_id, document = %kind, action, "no rows updated");
                Err(FinderError::PermissionDenied(format!(
                    "could not {action} for {}: the record is missing or not writable",
                    kind.label()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;

    #[derive(Default)]
    struct MemoryDocumentStore {
        rows: Mutex<HashMap<Uuid, StudentDocumentRecord>>,
        writes: AtomicUsize,
        fail_writes: bool,
        reject_writes: bool,
    }

    impl MemoryDocumentStore {
        fn with_student(user_id: Uuid) -> Self {
            let mut record = StudentDocumentRecord::empty(user_id);
            record.sop.file_name = Some("sop_final.pdf".to_string());
            record.sop.feedback = Some("Tighten the opening paragraph.".to_string());
            let store = Self::default();
            store.rows.lock().unwrap().insert(user_id, record);
            store
        }

        fn update(
            &self,
            user_id: Uuid,
            apply: impl FnOnce(&mut StudentDocumentRecord),
        ) -> FinderResult<Option<StudentDocumentRecord>> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes {
                return Err(FinderError::Storage("connection reset".to_string()));
            }
            if self.reject_writes {
                return Ok(None);
            }
            let mut rows = self.rows.lock().unwrap();
            Ok(rows.get_mut(&user_id).map(|record| {
                apply(record);
                record.clone()
            }))
        }
    }

    #[async_trait]
    impl DocumentStore for MemoryDocumentStore {
        async fn fetch(&self, user_id: Uuid) -> FinderResult<Option<StudentDocumentRecord>> {
            Ok(self.rows.lock().unwrap().get(&user_id).cloned())
        }

        async fn set_feedback(
            &self,
            user_id: Uuid,
            kind: DocumentKind,
            feedback: Option<&str>,
            reviewer: Option<&str>,
        ) -> FinderResult<Option<StudentDocumentRecord>> {
            self.update(user_id, |record| {
                let entry = record.entry_mut(kind);
                entry.feedback = feedback.map(str::to_string);
                entry.feedback_at = feedback.map(|_| Utc::now());
                entry.feedback_by = reviewer.map(str::to_string);
            })
        }

        async fn set_verified(
            &self,
            user_id: Uuid,
            kind: DocumentKind,
            verified: bool,
        ) -> FinderResult<Option<StudentDocumentRecord>> {
            self.update(user_id, |record| record.entry_mut(kind).verified = verified)
        }
    }

    #[tokio::test]
    async fn opening_unknown_student_is_not_found() {
        let store = MemoryDocumentStore::default();
        let result = ReviewSession::open(&store, Uuid::new_v4(), "EduAbroad Agency").await;
        assert!(matches!(result, Err(FinderError::NotFound(_))));
    }

    #[tokio::test]
    async fn empty_feedback_is_rejected_before_any_write() {
        let user_id = Uuid::new_v4();
        let store = MemoryDocumentStore::with_student(user_id);
        let mut session = ReviewSession::open(&store, user_id, "EduAbroad Agency").await.unwrap();

        for text in ["", "   \n"] {
            let result = session.save_feedback(DocumentKind::Lor, text).await;
            assert!(matches!(result, Err(FinderError::Validation(_))));
        }
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn saved_feedback_comes_from_the_server_row() {
        let user_id = Uuid::new_v4();
        let store = MemoryDocumentStore::with_student(user_id);
        let mut session = ReviewSession::open(&store, user_id, "EduAbroad Agency").await.unwrap();

        session
            .save_feedback(DocumentKind::Lor, "  Ask your recommender for specifics. ")
            .await
            .unwrap();

        let lor = &session.record().lor;
        assert_eq!(lor.feedback.as_deref(), Some("Ask your recommender for specifics."));
        assert_eq!(lor.feedback_by.as_deref(), Some("EduAbroad Agency"));
        assert!(lor.feedback_at.is_some());
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_save_keeps_previous_feedback() {
        let user_id = Uuid::new_v4();
        let mut store = MemoryDocumentStore::with_student(user_id);
        store.fail_writes = true;
        let mut session = ReviewSession::open(&store, user_id, "EduAbroad Agency").await.unwrap();

        assert!(session.save_feedback(DocumentKind::Sop, "Rewrite").await.is_err());
        assert_eq!(
            session.record().sop.feedback.as_deref(),
            Some("Tighten the opening paragraph.")
        );
    }

    #[tokio::test]
    async fn zero_rows_updated_is_a_permission_error() {
        let user_id = Uuid::new_v4();
        let mut store = MemoryDocumentStore::with_student(user_id);
        store.reject_writes = true;
        let mut session = ReviewSession::open(&store, user_id, "EduAbroad Agency").await.unwrap();

        let result = session.toggle_verified(DocumentKind::Resume).await;
        assert!(matches!(result, Err(FinderError::PermissionDenied(_))));
        assert!(!session.record().resume.verified);
    }

    #[tokio::test]
    async fn delete_and_verify_update_local_state() {
        let user_id = Uuid::new_v4();
        let store = MemoryDocumentStore::with_student(user_id);
        let mut session = ReviewSession::open(&store, user_id, "EduAbroad Agency").await.unwrap();

        session.delete_feedback(DocumentKind::Sop).await.unwrap();
        assert_eq!(session.record().sop.feedback, None);
        assert_eq!(session.record().sop.feedback_by, None);

        assert!(session.toggle_verified(DocumentKind::Sop).await.unwrap());
        assert!(!session.toggle_verified(DocumentKind::Sop).await.unwrap());
    }
}
