//! # Identity Newtypes
//!
//! UUID-backed identifiers for every addressable row in the data model.
//! Each identifier is a distinct type, so a [`RecipientId`] cannot be handed
//! to an API that expects an [`OrganizationId`]. All identifiers are always
//! valid by construction.
//!
//! Identifiers order by their UUID. Stores return rows in that order so that
//! scans over identical data produce identical output.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Defines a UUID newtype with the constructor, accessor, `Display` and
/// `FromStr` set shared by every identifier in the crate.
macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $ty:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $ty(Uuid);

        impl $ty {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $ty {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $ty {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_identifier!(
    /// Identifies a recipient (processor, sub-processor, department, ...).
    RecipientId
);

uuid_identifier!(
    /// Identifies a tenant organization. Every recipient graph is scoped to one.
    OrganizationId
);

uuid_identifier!(
    /// Identifies the legal entity standing behind a recipient.
    ExternalOrganizationId
);

uuid_identifier!(
    /// Identifies a contract between an organization and an external organization.
    AgreementId
);

uuid_identifier!(
    /// Identifies a country in the global reference data.
    CountryId
);

uuid_identifier!(
    /// Identifies a transfer mechanism (legal safeguard) in the reference data.
    TransferMechanismId
);

uuid_identifier!(
    /// Identifies one processing-location row. Moved locations get a fresh id.
    LocationId
);

uuid_identifier!(
    /// Identifies a processing activity in an organization's records of processing.
    ActivityId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_unique() {
        assert_ne!(RecipientId::new(), RecipientId::new());
    }

    #[test]
    fn identifier_parses_from_display() {
        let id = RecipientId::new();
        let parsed: RecipientId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn identifier_rejects_garbage() {
        assert!("not-a-uuid".parse::<OrganizationId>().is_err());
    }

    #[test]
    fn identifier_serializes_as_bare_uuid() {
        let id = CountryId::from_uuid(Uuid::nil());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
    }

    #[test]
    fn identifiers_order_by_uuid() {
        let low = LocationId::from_uuid(Uuid::from_u128(1));
        let high = LocationId::from_uuid(Uuid::from_u128(2));
        assert!(low < high);
    }
}
