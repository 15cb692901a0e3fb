//! # Processing Locations
//!
//! Where a recipient physically processes data. Rows are append-mostly: a
//! move to another country produces a new row via
//! [`ProcessingLocation::relocate`] and the old row is deactivated by the
//! store. Historical rows are never rewritten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{CountryId, LocationId, RecipientId, TransferMechanismId};

/// One country a recipient processes data in, optionally backed by a
/// transfer mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingLocation {
    pub id: LocationId,
    pub recipient_id: RecipientId,
    pub country_id: CountryId,
    #[serde(default)]
    pub transfer_mechanism_id: Option<TransferMechanismId>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Free-text description of the service performed at this location.
    #[serde(default)]
    pub service: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl ProcessingLocation {
    /// Create an active location row stamped with the current time.
    pub fn new(recipient_id: RecipientId, country_id: CountryId) -> Self {
        Self {
            id: LocationId::new(),
            recipient_id,
            country_id,
            transfer_mechanism_id: None,
            is_active: true,
            service: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_mechanism(mut self, mechanism: TransferMechanismId) -> Self {
        self.transfer_mechanism_id = Some(mechanism);
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Produce the replacement row for a move to `country_id`.
    ///
    /// The new row gets a fresh id and timestamp and inherits the service
    /// description. `self` is left untouched; deactivating it is the
    /// caller's job.
    pub fn relocate(
        &self,
        country_id: CountryId,
        transfer_mechanism_id: Option<TransferMechanismId>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LocationId::new(),
            recipient_id: self.recipient_id.clone(),
            country_id,
            transfer_mechanism_id,
            is_active: true,
            service: self.service.clone(),
            created_at: at,
        }
    }
}
