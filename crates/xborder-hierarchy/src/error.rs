//! # Error Types
//!
//! Hard failures of the hierarchy layer. Domain-rule violations are not
//! represented here: they travel as [`HierarchyViolation`]s inside a
//! [`ValidationResult`] so that one validation pass can report them all.
//!
//! [`HierarchyViolation`]: crate::validator::HierarchyViolation
//! [`ValidationResult`]: crate::validator::ValidationResult

use thiserror::Error;

use xborder_core::{OrganizationId, RecipientId, RecipientType, ScanInterrupt};
use xborder_store::StoreError;

/// A rule table could not be loaded.
#[derive(Error, Debug)]
pub enum RuleTableError {
    #[error("failed to read rule table {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid rule table YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Every recipient type must have a rule.
    #[error("rule table has no entry for {0}")]
    MissingType(RecipientType),

    /// A rule contradicts itself, e.g. forbids parents but lists allowed ones.
    #[error("inconsistent rule for {recipient_type}: {reason}")]
    Inconsistent {
        recipient_type: RecipientType,
        reason: String,
    },
}

/// A walk over the recipient forest failed.
#[derive(Error, Debug)]
pub enum TraversalError {
    #[error("recipient {0} not found")]
    RecipientNotFound(RecipientId),

    /// The walk reached a node owned by another tenant.
    #[error(
        "recipient {recipient} belongs to organization {found}, not {expected}; \
         refusing to traverse across tenants"
    )]
    CrossTenant {
        recipient: RecipientId,
        expected: OrganizationId,
        found: OrganizationId,
    },

    /// Stored parent links loop or run deeper than any rule permits.
    #[error("corrupt hierarchy above recipient {recipient}: {reason}")]
    CorruptHierarchy {
        recipient: RecipientId,
        reason: String,
    },

    #[error(transparent)]
    Interrupted(#[from] ScanInterrupt),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A validation or guarded write could not run to completion.
#[derive(Error, Debug)]
pub enum HierarchyError {
    /// The recipient does not exist within the requesting organization.
    #[error("recipient {recipient} not found in organization {organization}")]
    RecipientNotFound {
        recipient: RecipientId,
        organization: OrganizationId,
    },

    /// An update tried to move an existing recipient to another tenant.
    #[error(
        "recipient {recipient} belongs to organization {current}; \
         it cannot be rewritten under {requested}"
    )]
    OrganizationChange {
        recipient: RecipientId,
        current: OrganizationId,
        requested: OrganizationId,
    },

    #[error(transparent)]
    Traversal(#[from] TraversalError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
