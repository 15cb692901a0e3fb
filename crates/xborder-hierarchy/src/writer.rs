//! # Guarded Recipient Writes
//!
//! [`RecipientWriter`] is the only path that should create or re-parent
//! recipients. It validates a row and commits it while holding a lock
//! scoped to the row's organization, so two concurrent reassignments in
//! the same tenant can never each see an acyclic graph and jointly close a
//! cycle. Writes in different organizations proceed in parallel.
//!
//! Lock entries live only while a write for the organization is running
//! or queued, so the map stays as small as the set of busy tenants.
//!
//! The lock is in-process. Multi-instance deployments must back the
//! [`RecipientWriteStore`] with a transaction or advisory lock of their own.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;

use xborder_core::{OrganizationId, Recipient};
use xborder_store::RecipientWriteStore;

use crate::error::HierarchyError;
use crate::rules::RuleTable;
use crate::validator::{
    hierarchy_type_for_recipient, HierarchyValidator, ValidationResult, ValidationWarning,
};

/// Outcome of a guarded write.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// The row was saved. Warnings never block a write.
    Committed {
        recipient: Recipient,
        warnings: Vec<ValidationWarning>,
    },
    /// Validation failed; nothing was written.
    Rejected { result: ValidationResult },
}

impl WriteOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// Validate-then-commit writer, serialized per organization.
pub struct RecipientWriter<S> {
    store: Arc<S>,
    rules: Arc<RuleTable>,
    locks: DashMap<OrganizationId, Arc<Mutex<()>>>,
}

impl<S: RecipientWriteStore> RecipientWriter<S> {
    pub fn new(store: Arc<S>, rules: Arc<RuleTable>) -> Self {
        Self {
            store,
            rules,
            locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    fn organization_lock(&self, organization: &OrganizationId) -> Arc<Mutex<()>> {
        // Clone the Arc out so no map shard guard is held across an await.
        self.locks
            .entry(organization.clone())
            .or_default()
            .value()
            .clone()
    }

    /// Validate `recipient` and save it if every check passes.
    ///
    /// The stored `hierarchy_type` is always derived from the recipient
    /// type; whatever the caller supplied is overwritten.
    ///
    /// # Errors
    ///
    /// [`HierarchyError::OrganizationChange`] if a row with this id already
    /// exists under another organization. Store and traversal failures
    /// propagate unchanged.
    pub async fn write(&self, recipient: Recipient) -> Result<WriteOutcome, HierarchyError> {
        let organization = recipient.organization_id.clone();
        let lock = self.organization_lock(&organization);
        let outcome = {
            let _guard = lock.lock().await;
            self.write_locked(recipient).await
        };
        self.release_lock(&organization, &lock);
        outcome
    }

    /// Drop the map entry once no other writer holds or awaits the lock.
    fn release_lock(&self, organization: &OrganizationId, lock: &Arc<Mutex<()>>) {
        // Held by the map and by `lock`; a third count is a waiter.
        self.locks.remove_if(organization, |_, held| {
            Arc::ptr_eq(held, lock) && Arc::strong_count(held) == 2
        });
    }

    async fn write_locked(
        &self,
        mut recipient: Recipient,
    ) -> Result<WriteOutcome, HierarchyError> {
        if let Some(existing) = self.store.get_recipient(&recipient.id).await? {
            if existing.organization_id != recipient.organization_id {
                tracing::warn!(
                    recipient_id = %recipient.id,
                    current = %existing.organization_id,
                    requested = %recipient.organization_id,
                    "rejected write moving a recipient across organizations"
                );
                return Err(HierarchyError::OrganizationChange {
                    recipient: recipient.id,
                    current: existing.organization_id,
                    requested: recipient.organization_id,
                });
            }
        }

        let validator = HierarchyValidator::new(self.store.as_ref(), &self.rules);
        let mut result = validator.validate_for_write(&recipient).await?;
        if !result.is_valid() {
            tracing::info!(
                recipient_id = %recipient.id,
                organization_id = %recipient.organization_id,
                errors = result.errors().len(),
                "recipient write rejected"
            );
            return Ok(WriteOutcome::Rejected { result });
        }

        result.merge(
            validator
                .agreement_warnings(
                    recipient.recipient_type,
                    recipient.external_organization_id.as_ref(),
                )
                .await?,
        );

        recipient.hierarchy_type = hierarchy_type_for_recipient(recipient.recipient_type);
        self.store.save_recipient(recipient.clone()).await?;
        tracing::info!(
            recipient_id = %recipient.id,
            organization_id = %recipient.organization_id,
            recipient_type = %recipient.recipient_type,
            warnings = result.warnings().len(),
            "recipient committed"
        );

        Ok(WriteOutcome::Committed {
            recipient,
            warnings: result.into_warnings(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xborder_core::{ExternalOrganization, ExternalOrganizationId, HierarchyType, RecipientType};
    use xborder_store::{InMemoryStore, RecipientStore};

    fn writer() -> (Arc<RecipientWriter<InMemoryStore>>, InMemoryStore) {
        let store = InMemoryStore::new();
        let writer = RecipientWriter::new(
            Arc::new(store.clone()),
            Arc::new(RuleTable::gdpr_default()),
        );
        (Arc::new(writer), store)
    }

    fn department(org: &OrganizationId, name: &str) -> Recipient {
        Recipient::new(org.clone(), name, RecipientType::InternalDepartment)
    }

    #[tokio::test]
    async fn committed_write_stamps_hierarchy_type() {
        let (writer, store) = writer();
        let org = OrganizationId::new();
        let mut dept = department(&org, "Finance");
        dept.hierarchy_type = Some(HierarchyType::ProcessorChain);

        let outcome = writer.write(dept.clone()).await.unwrap();
        assert!(outcome.is_committed());
        let saved = store.get_recipient(&dept.id).await.unwrap().unwrap();
        assert_eq!(saved.hierarchy_type, Some(HierarchyType::Organizational));
    }

    #[tokio::test]
    async fn rejected_write_leaves_store_untouched() {
        let (writer, store) = writer();
        let org = OrganizationId::new();
        // Processors require an external organization.
        let processor = Recipient::new(org.clone(), "CloudCo", RecipientType::Processor);
        let outcome = writer.write(processor.clone()).await.unwrap();
        assert!(!outcome.is_committed());
        assert!(store.get_recipient(&processor.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_dpa_warns_but_commits() {
        let (writer, store) = writer();
        let org = OrganizationId::new();
        let ext = ExternalOrganization {
            id: ExternalOrganizationId::new(),
            organization_id: org.clone(),
            name: "CloudCo Inc.".into(),
        };
        store.insert_external_organization(ext.clone());
        let processor = Recipient::new(org, "CloudCo", RecipientType::Processor)
            .with_external_organization(ext.id);

        match writer.write(processor).await.unwrap() {
            WriteOutcome::Committed { warnings, .. } => assert_eq!(warnings.len(), 1),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn organization_change_rejected() {
        let (writer, _store) = writer();
        let dept = department(&OrganizationId::new(), "Legal");
        writer.write(dept.clone()).await.unwrap();

        let mut moved = dept.clone();
        moved.organization_id = OrganizationId::new();
        let err = writer.write(moved).await.unwrap_err();
        assert!(matches!(err, HierarchyError::OrganizationChange { .. }));
    }

    #[tokio::test]
    async fn idle_organization_locks_are_released() {
        let (writer, _store) = writer();
        for _ in 0..3 {
            let dept = department(&OrganizationId::new(), "Ops");
            writer.write(dept).await.unwrap();
        }
        // Rejected and failed writes release their entry too.
        let org = OrganizationId::new();
        writer
            .write(Recipient::new(org.clone(), "CloudCo", RecipientType::Processor))
            .await
            .unwrap();
        let dept = department(&org, "Legal");
        writer.write(dept.clone()).await.unwrap();
        let mut moved = dept;
        moved.organization_id = OrganizationId::new();
        writer.write(moved).await.unwrap_err();

        assert!(writer.locks.is_empty());
    }

    #[tokio::test]
    async fn concurrent_swaps_never_close_a_cycle() {
        let (writer, store) = writer();
        let org = OrganizationId::new();
        let a = department(&org, "a");
        let b = department(&org, "b");
        writer.write(a.clone()).await.unwrap();
        writer.write(b.clone()).await.unwrap();

        let a_under_b = a.clone().with_parent(b.id.clone());
        let b_under_a = b.clone().with_parent(a.id.clone());
        let w1 = Arc::clone(&writer);
        let w2 = Arc::clone(&writer);
        let (first, second) = tokio::join!(
            tokio::spawn(async move { w1.write(a_under_b).await }),
            tokio::spawn(async move { w2.write(b_under_a).await }),
        );
        let committed = [first.unwrap().unwrap(), second.unwrap().unwrap()]
            .iter()
            .filter(|o| o.is_committed())
            .count();
        assert_eq!(committed, 1);

        let a_row = store.get_recipient(&a.id).await.unwrap().unwrap();
        let b_row = store.get_recipient(&b.id).await.unwrap().unwrap();
        assert!(a_row.parent_recipient_id.is_none() || b_row.parent_recipient_id.is_none());
        assert!(writer.locks.is_empty());
    }
}
