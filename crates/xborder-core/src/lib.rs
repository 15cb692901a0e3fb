//! # xborder-core — Foundational Types for Recipient Transfer Tracking
//!
//! This crate is the leaf of the workspace DAG. It defines the data model
//! shared by hierarchy validation and transfer-risk derivation: identifier
//! newtypes, recipients and their structural classification, countries and
//! their jurisdiction tags, processing locations, and the cancellation
//! handle threaded through long-running scans.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `RecipientId`, `OrganizationId`,
//!    `CountryId` and friends are distinct types. A recipient id can never be
//!    passed where an organization id is expected.
//!
//! 2. **Weak parent references.** A [`Recipient`] names its parent by id
//!    only. The recipient forest is an arena addressed through the
//!    persistence collaborator, never a graph of in-memory pointers.
//!
//! 3. **Single `RecipientType` enum.** Seven variants, exhaustive `match`
//!    everywhere. Adding a type forces every rule table and consumer to
//!    handle it.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `xborder-*` crates.
//! - No `unsafe` code.
//! - No `.unwrap()` outside tests.

pub mod cancel;
pub mod error;
pub mod identity;
pub mod jurisdiction;
pub mod location;
pub mod recipient;

// Re-export primary types for ergonomic imports.
pub use cancel::{ScanControl, ScanInterrupt};
pub use error::ValidationError;
pub use identity::{
    ActivityId, AgreementId, CountryId, ExternalOrganizationId, LocationId, OrganizationId,
    RecipientId, TransferMechanismId,
};
pub use jurisdiction::{Country, CountryCode, JurisdictionTag, TransferMechanism};
pub use location::ProcessingLocation;
pub use recipient::{
    Agreement, AgreementStatus, AgreementType, ExternalOrganization, HierarchyType,
    Organization, ProcessingActivity, Recipient, RecipientType,
};
