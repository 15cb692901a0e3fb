//! # Store Traits
//!
//! The read and write contracts the core consumes from its persistence
//! collaborator.
//!
//! Implementations must be `Send + Sync` so they can be shared across
//! request handlers behind an `Arc`.
//!
//! ## Write Serialization
//!
//! Validating a parent assignment and committing it must happen as one
//! atomic unit per organization. Otherwise two concurrent reassignments can
//! each observe an acyclic graph and jointly introduce a cycle. Database
//! implementations do this with a transaction at `SERIALIZABLE` isolation
//! or a per-organization advisory lock; the guarded writer in
//! `xborder-hierarchy` serializes with an in-process lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use xborder_core::{
    ActivityId, Agreement, Country, CountryId, ExternalOrganization, ExternalOrganizationId,
    LocationId, Organization, OrganizationId, ProcessingActivity, ProcessingLocation, Recipient,
    RecipientId, TransferMechanism, TransferMechanismId,
};

use crate::error::StoreError;

/// Read access to recipients, their locations, and the reference data
/// needed to classify transfers.
///
/// List operations return rows ordered by id.
#[async_trait]
pub trait RecipientStore: Send + Sync {
    /// Look up one recipient by id, regardless of tenant.
    async fn get_recipient(&self, id: &RecipientId) -> Result<Option<Recipient>, StoreError>;

    /// All recipients (active or not) belonging to `organization`.
    async fn list_recipients(
        &self,
        organization: &OrganizationId,
    ) -> Result<Vec<Recipient>, StoreError>;

    /// Active processing locations of one recipient.
    async fn list_active_locations(
        &self,
        recipient: &RecipientId,
    ) -> Result<Vec<ProcessingLocation>, StoreError>;

    async fn get_organization(
        &self,
        id: &OrganizationId,
    ) -> Result<Option<Organization>, StoreError>;

    /// Look up one external organization by id, regardless of tenant.
    async fn get_external_organization(
        &self,
        id: &ExternalOrganizationId,
    ) -> Result<Option<ExternalOrganization>, StoreError>;

    /// Agreements with status `Active` for one external organization.
    async fn list_active_agreements(
        &self,
        external: &ExternalOrganizationId,
    ) -> Result<Vec<Agreement>, StoreError>;

    async fn get_activity(&self, id: &ActivityId)
        -> Result<Option<ProcessingActivity>, StoreError>;

    /// Recipients linked to an activity that belong to the activity's
    /// organization. Links pointing at other tenants' rows are dropped.
    async fn list_activity_recipients(
        &self,
        activity: &ActivityId,
    ) -> Result<Vec<Recipient>, StoreError>;

    /// Global reference data.
    async fn get_country(&self, id: &CountryId) -> Result<Option<Country>, StoreError>;

    /// Global reference data.
    async fn get_transfer_mechanism(
        &self,
        id: &TransferMechanismId,
    ) -> Result<Option<TransferMechanism>, StoreError>;
}

/// Write access used by the guarded recipient write path and the
/// processing-location move contract.
#[async_trait]
pub trait RecipientWriteStore: RecipientStore {
    /// Insert or replace a recipient row.
    async fn save_recipient(&self, recipient: Recipient) -> Result<(), StoreError>;

    /// Insert a new processing-location row. Existing ids are rejected.
    async fn insert_location(&self, location: ProcessingLocation) -> Result<(), StoreError>;

    /// Move a location to a new country: create a replacement row and
    /// deactivate the old one. The old row is otherwise never modified.
    ///
    /// Returns the newly created row.
    async fn move_location(
        &self,
        location: &LocationId,
        country: CountryId,
        mechanism: Option<TransferMechanismId>,
        at: DateTime<Utc>,
    ) -> Result<ProcessingLocation, StoreError>;
}
