use thiserror::Error;

use xborder_core::{ActivityId, OrganizationId, ScanInterrupt};
use xborder_hierarchy::TraversalError;
use xborder_store::StoreError;

/// A transfer scan could not complete.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("organization {0} not found")]
    OrganizationNotFound(OrganizationId),

    #[error("processing activity {0} not found")]
    ActivityNotFound(ActivityId),

    /// Activity analysis needs an origin country.
    #[error("organization {0} has no headquarters country")]
    HeadquartersCountryMissing(OrganizationId),

    /// A location or organization references a country or mechanism row
    /// that does not exist.
    #[error("{entity} {id} referenced by the scan does not exist")]
    ReferenceDataMissing { entity: &'static str, id: String },

    /// The recipient forest is corrupt or crosses tenants.
    #[error("recipient hierarchy walk failed: {0}")]
    Traversal(#[source] TraversalError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Interrupted(#[from] ScanInterrupt),
}

impl From<TraversalError> for DetectionError {
    fn from(err: TraversalError) -> Self {
        match err {
            TraversalError::Interrupted(interrupt) => Self::Interrupted(interrupt),
            TraversalError::Store(store) => Self::Store(store),
            other => Self::Traversal(other),
        }
    }
}
