//! In-memory storage backend using DashMap.
//!
//! Each row type gets its own `DashMap` keyed by identifier. Lists are
//! collected and sorted by id on every call so iteration order never leaks
//! DashMap's shard layout into scan results.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use xborder_core::{
    ActivityId, Agreement, AgreementId, Country, CountryId, ExternalOrganization,
    ExternalOrganizationId, LocationId, Organization, OrganizationId, ProcessingActivity,
    ProcessingLocation, Recipient, RecipientId, TransferMechanism, TransferMechanismId,
};

use crate::error::StoreError;
use crate::store::{RecipientStore, RecipientWriteStore};

struct Inner {
    organizations: DashMap<OrganizationId, Organization>,
    external_organizations: DashMap<ExternalOrganizationId, ExternalOrganization>,
    agreements: DashMap<AgreementId, Agreement>,
    recipients: DashMap<RecipientId, Recipient>,
    locations: DashMap<LocationId, ProcessingLocation>,
    activities: DashMap<ActivityId, ProcessingActivity>,
    countries: DashMap<CountryId, Country>,
    mechanisms: DashMap<TransferMechanismId, TransferMechanism>,
    offline: AtomicBool,
}

/// Shared in-memory store.
///
/// Cheaply cloneable via `Arc`; all clones share the same data. The
/// `insert_*` seeding methods bypass validation and exist to load fixtures
/// and snapshots. Recipient writes that must honor the hierarchy invariants
/// go through the guarded writer in `xborder-hierarchy`.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("organizations", &self.inner.organizations.len())
            .field("recipients", &self.inner.recipients.len())
            .field("locations", &self.inner.locations.len())
            .finish_non_exhaustive()
    }
}

fn sorted_by_key<T, K: Ord>(mut rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    rows.sort_by_key(|row| key(row));
    rows
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                organizations: DashMap::new(),
                external_organizations: DashMap::new(),
                agreements: DashMap::new(),
                recipients: DashMap::new(),
                locations: DashMap::new(),
                activities: DashMap::new(),
                countries: DashMap::new(),
                mechanisms: DashMap::new(),
                offline: AtomicBool::new(false),
            }),
        }
    }

    /// Simulate a backend outage: every trait call fails with
    /// [`StoreError::Backend`] while set.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self, operation: &'static str) -> Result<(), StoreError> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Backend {
                operation,
                message: "in-memory store is offline".into(),
            });
        }
        Ok(())
    }

    pub fn insert_organization(&self, organization: Organization) {
        self.inner
            .organizations
            .insert(organization.id.clone(), organization);
    }

    pub fn insert_external_organization(&self, external: ExternalOrganization) {
        self.inner
            .external_organizations
            .insert(external.id.clone(), external);
    }

    pub fn insert_agreement(&self, agreement: Agreement) {
        self.inner.agreements.insert(agreement.id.clone(), agreement);
    }

    /// Seed a recipient row without any validation.
    pub fn insert_recipient(&self, recipient: Recipient) {
        self.inner.recipients.insert(recipient.id.clone(), recipient);
    }

    /// Seed a location row without any validation.
    pub fn insert_location_row(&self, location: ProcessingLocation) {
        self.inner.locations.insert(location.id.clone(), location);
    }

    pub fn insert_activity(&self, activity: ProcessingActivity) {
        self.inner.activities.insert(activity.id.clone(), activity);
    }

    pub fn insert_country(&self, country: Country) {
        self.inner.countries.insert(country.id.clone(), country);
    }

    pub fn insert_mechanism(&self, mechanism: TransferMechanism) {
        self.inner.mechanisms.insert(mechanism.id.clone(), mechanism);
    }

    /// Every location row of a recipient, active or historical.
    pub fn location_history(&self, recipient: &RecipientId) -> Vec<ProcessingLocation> {
        let rows = self
            .inner
            .locations
            .iter()
            .filter(|entry| &entry.recipient_id == recipient)
            .map(|entry| entry.value().clone())
            .collect();
        sorted_by_key(rows, |l: &ProcessingLocation| (l.created_at, l.id.clone()))
    }

    /// All organizations, ordered by id.
    pub fn organizations(&self) -> Vec<Organization> {
        let rows = self
            .inner
            .organizations
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        sorted_by_key(rows, |o: &Organization| o.id.clone())
    }
}

#[async_trait]
impl RecipientStore for InMemoryStore {
    async fn get_recipient(&self, id: &RecipientId) -> Result<Option<Recipient>, StoreError> {
        self.ensure_online("get_recipient")?;
        Ok(self.inner.recipients.get(id).map(|r| r.value().clone()))
    }

    async fn list_recipients(
        &self,
        organization: &OrganizationId,
    ) -> Result<Vec<Recipient>, StoreError> {
        self.ensure_online("list_recipients")?;
        let rows = self
            .inner
            .recipients
            .iter()
            .filter(|entry| &entry.organization_id == organization)
            .map(|entry| entry.value().clone())
            .collect();
        Ok(sorted_by_key(rows, |r: &Recipient| r.id.clone()))
    }

    async fn list_active_locations(
        &self,
        recipient: &RecipientId,
    ) -> Result<Vec<ProcessingLocation>, StoreError> {
        self.ensure_online("list_active_locations")?;
        let rows = self
            .inner
            .locations
            .iter()
            .filter(|entry| entry.is_active && &entry.recipient_id == recipient)
            .map(|entry| entry.value().clone())
            .collect();
        Ok(sorted_by_key(rows, |l: &ProcessingLocation| l.id.clone()))
    }

    async fn get_organization(
        &self,
        id: &OrganizationId,
    ) -> Result<Option<Organization>, StoreError> {
        self.ensure_online("get_organization")?;
        Ok(self.inner.organizations.get(id).map(|o| o.value().clone()))
    }

    async fn get_external_organization(
        &self,
        id: &ExternalOrganizationId,
    ) -> Result<Option<ExternalOrganization>, StoreError> {
        self.ensure_online("get_external_organization")?;
        Ok(self
            .inner
            .external_organizations
            .get(id)
            .map(|e| e.value().clone()))
    }

    async fn list_active_agreements(
        &self,
        external: &ExternalOrganizationId,
    ) -> Result<Vec<Agreement>, StoreError> {
        self.ensure_online("list_active_agreements")?;
        let rows = self
            .inner
            .agreements
            .iter()
            .filter(|entry| entry.is_active() && &entry.external_organization_id == external)
            .map(|entry| entry.value().clone())
            .collect();
        Ok(sorted_by_key(rows, |a: &Agreement| a.id.clone()))
    }

    async fn get_activity(
        &self,
        id: &ActivityId,
    ) -> Result<Option<ProcessingActivity>, StoreError> {
        self.ensure_online("get_activity")?;
        Ok(self.inner.activities.get(id).map(|a| a.value().clone()))
    }

    async fn list_activity_recipients(
        &self,
        activity: &ActivityId,
    ) -> Result<Vec<Recipient>, StoreError> {
        self.ensure_online("list_activity_recipients")?;
        let Some(activity) = self.inner.activities.get(activity).map(|a| a.value().clone())
        else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<Recipient> = activity
            .recipient_ids
            .iter()
            .filter_map(|id| self.inner.recipients.get(id).map(|r| r.value().clone()))
            .filter(|r| r.organization_id == activity.organization_id)
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        rows.dedup_by(|a, b| a.id == b.id);
        Ok(rows)
    }

    async fn get_country(&self, id: &CountryId) -> Result<Option<Country>, StoreError> {
        self.ensure_online("get_country")?;
        Ok(self.inner.countries.get(id).map(|c| c.value().clone()))
    }

    async fn get_transfer_mechanism(
        &self,
        id: &TransferMechanismId,
    ) -> Result<Option<TransferMechanism>, StoreError> {
        self.ensure_online("get_transfer_mechanism")?;
        Ok(self.inner.mechanisms.get(id).map(|m| m.value().clone()))
    }
}

#[async_trait]
impl RecipientWriteStore for InMemoryStore {
    async fn save_recipient(&self, recipient: Recipient) -> Result<(), StoreError> {
        self.ensure_online("save_recipient")?;
        tracing::debug!(recipient_id = %recipient.id, "saving recipient");
        self.inner.recipients.insert(recipient.id.clone(), recipient);
        Ok(())
    }

    async fn insert_location(&self, location: ProcessingLocation) -> Result<(), StoreError> {
        self.ensure_online("insert_location")?;
        if self.inner.locations.contains_key(&location.id) {
            return Err(StoreError::Rejected(format!(
                "processing location {} already exists; location rows are never rewritten",
                location.id
            )));
        }
        self.inner.locations.insert(location.id.clone(), location);
        Ok(())
    }

    async fn move_location(
        &self,
        location: &LocationId,
        country: CountryId,
        mechanism: Option<TransferMechanismId>,
        at: DateTime<Utc>,
    ) -> Result<ProcessingLocation, StoreError> {
        self.ensure_online("move_location")?;
        let replacement = {
            let mut current =
                self.inner
                    .locations
                    .get_mut(location)
                    .ok_or_else(|| StoreError::NotFound {
                        entity: "processing location",
                        id: location.to_string(),
                    })?;
            if !current.is_active {
                return Err(StoreError::Rejected(format!(
                    "processing location {location} is historical and cannot be moved"
                )));
            }
            let replacement = current.relocate(country, mechanism, at);
            current.is_active = false;
            replacement
        };
        tracing::debug!(
            from = %location,
            to = %replacement.id,
            country_id = %replacement.country_id,
            "moved processing location"
        );
        self.inner
            .locations
            .insert(replacement.id.clone(), replacement.clone());
        Ok(replacement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xborder_core::{AgreementStatus, AgreementType, CountryCode, RecipientType};

    fn org() -> Organization {
        Organization {
            id: OrganizationId::new(),
            name: "Acme".into(),
            headquarters_country_id: None,
        }
    }

    #[tokio::test]
    async fn list_recipients_is_tenant_scoped_and_ordered() {
        let store = InMemoryStore::new();
        let a = org();
        let b = org();
        for _ in 0..5 {
            store.insert_recipient(Recipient::new(a.id.clone(), "r", RecipientType::Processor));
        }
        store.insert_recipient(Recipient::new(b.id.clone(), "x", RecipientType::Processor));

        let listed = store.list_recipients(&a.id).await.unwrap();
        assert_eq!(listed.len(), 5);
        assert!(listed.iter().all(|r| r.organization_id == a.id));
        assert!(listed.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[tokio::test]
    async fn only_active_agreements_are_listed() {
        let store = InMemoryStore::new();
        let ext = ExternalOrganizationId::new();
        for status in [AgreementStatus::Active, AgreementStatus::Expired] {
            store.insert_agreement(Agreement {
                id: AgreementId::new(),
                external_organization_id: ext.clone(),
                agreement_type: AgreementType::Dpa,
                status,
            });
        }
        let active = store.list_active_agreements(&ext).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].status, AgreementStatus::Active);
    }

    #[tokio::test]
    async fn activity_recipients_drop_foreign_links() {
        let store = InMemoryStore::new();
        let mine = org();
        let theirs = org();
        let own = Recipient::new(mine.id.clone(), "own", RecipientType::Processor);
        let foreign = Recipient::new(theirs.id.clone(), "foreign", RecipientType::Processor);
        let activity = ProcessingActivity {
            id: ActivityId::new(),
            organization_id: mine.id.clone(),
            name: "Payroll".into(),
            recipient_ids: vec![own.id.clone(), foreign.id.clone(), own.id.clone()],
        };
        store.insert_recipient(own.clone());
        store.insert_recipient(foreign);
        store.insert_activity(activity.clone());

        let linked = store.list_activity_recipients(&activity.id).await.unwrap();
        assert_eq!(linked, vec![own]);
    }

    #[tokio::test]
    async fn move_location_creates_and_deactivates() {
        let store = InMemoryStore::new();
        let fr = Country::new(CountryCode::new("FR").unwrap(), "France", []);
        let us = Country::new(CountryCode::new("US").unwrap(), "United States", []);
        let recipient = RecipientId::new();
        let original = ProcessingLocation::new(recipient.clone(), fr.id.clone());
        store.insert_location(original.clone()).await.unwrap();

        let moved = store
            .move_location(&original.id, us.id.clone(), None, Utc::now())
            .await
            .unwrap();

        let active = store.list_active_locations(&recipient).await.unwrap();
        assert_eq!(active, vec![moved.clone()]);

        let history = store.location_history(&recipient);
        assert_eq!(history.len(), 2);
        let old = history.iter().find(|l| l.id == original.id).unwrap();
        assert!(!old.is_active);
        assert_eq!(old.country_id, fr.id, "historical row keeps its country");
    }

    #[tokio::test]
    async fn historical_location_cannot_move_again() {
        let store = InMemoryStore::new();
        let recipient = RecipientId::new();
        let original = ProcessingLocation::new(recipient, CountryId::new());
        store.insert_location(original.clone()).await.unwrap();
        store
            .move_location(&original.id, CountryId::new(), None, Utc::now())
            .await
            .unwrap();

        let again = store
            .move_location(&original.id, CountryId::new(), None, Utc::now())
            .await;
        assert!(matches!(again, Err(StoreError::Rejected(_))));
    }

    #[tokio::test]
    async fn duplicate_location_insert_rejected() {
        let store = InMemoryStore::new();
        let row = ProcessingLocation::new(RecipientId::new(), CountryId::new());
        store.insert_location(row.clone()).await.unwrap();
        assert!(matches!(
            store.insert_location(row).await,
            Err(StoreError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let store = InMemoryStore::new();
        store.set_offline(true);
        let err = store.get_recipient(&RecipientId::new()).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Backend {
                operation: "get_recipient",
                ..
            }
        ));
    }
}
