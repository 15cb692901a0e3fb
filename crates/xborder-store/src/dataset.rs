//! # Dataset Snapshots
//!
//! A [`Dataset`] is a complete, serializable snapshot of reference data and
//! tenant rows. Snapshots are loaded from YAML or JSON and seed an
//! [`InMemoryStore`]. Referential integrity (every foreign id resolves) is
//! checked at load time; hierarchy invariants are not, because auditing a
//! snapshot that violates them is one of the things the CLI is for.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use xborder_core::{
    Agreement, Country, ExternalOrganization, Organization, ProcessingActivity,
    ProcessingLocation, Recipient, TransferMechanism,
};

use crate::memory::InMemoryStore;

/// Errors raised while loading a dataset snapshot.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("failed to read dataset {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid YAML dataset: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON dataset: {0}")]
    Json(#[from] serde_json::Error),

    /// A row references an id that is not present in the snapshot.
    #[error("{entity} {id} references unknown {target} {target_id}")]
    DanglingReference {
        entity: &'static str,
        id: String,
        target: &'static str,
        target_id: String,
    },
}

/// Snapshot of everything the core reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    pub countries: Vec<Country>,
    pub transfer_mechanisms: Vec<TransferMechanism>,
    pub organizations: Vec<Organization>,
    pub external_organizations: Vec<ExternalOrganization>,
    pub agreements: Vec<Agreement>,
    pub recipients: Vec<Recipient>,
    pub locations: Vec<ProcessingLocation>,
    pub activities: Vec<ProcessingActivity>,
}

impl Dataset {
    /// Parse a YAML (or JSON, which is valid YAML) snapshot and check its references.
    pub fn from_yaml_str(input: &str) -> Result<Self, DatasetError> {
        let dataset: Self = serde_yaml::from_str(input)?;
        dataset.check_references()?;
        Ok(dataset)
    }

    /// Parse a JSON snapshot and check its references.
    pub fn from_json_str(input: &str) -> Result<Self, DatasetError> {
        let dataset: Self = serde_json::from_str(input)?;
        dataset.check_references()?;
        Ok(dataset)
    }

    /// Load a snapshot from disk. `.json` files parse as JSON, anything
    /// else as YAML.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let content = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let dataset = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_yaml_str(&content)?
        };
        tracing::info!(
            path = %path.display(),
            organizations = dataset.organizations.len(),
            recipients = dataset.recipients.len(),
            locations = dataset.locations.len(),
            "loaded dataset"
        );
        Ok(dataset)
    }

    /// Verify every foreign id in the snapshot resolves to a row in it.
    pub fn check_references(&self) -> Result<(), DatasetError> {
        let countries: BTreeSet<_> = self.countries.iter().map(|c| &c.id).collect();
        let mechanisms: BTreeSet<_> = self.transfer_mechanisms.iter().map(|m| &m.id).collect();
        let organizations: BTreeSet<_> = self.organizations.iter().map(|o| &o.id).collect();
        let externals: BTreeSet<_> = self.external_organizations.iter().map(|e| &e.id).collect();
        let recipients: BTreeSet<_> = self.recipients.iter().map(|r| &r.id).collect();

        fn dangling(
            entity: &'static str,
            id: &impl ToString,
            target: &'static str,
            target_id: &impl ToString,
        ) -> DatasetError {
            DatasetError::DanglingReference {
                entity,
                id: id.to_string(),
                target,
                target_id: target_id.to_string(),
            }
        }

        for org in &self.organizations {
            if let Some(hq) = &org.headquarters_country_id {
                if !countries.contains(hq) {
                    return Err(dangling("organization", &org.id, "country", hq));
                }
            }
        }
        for ext in &self.external_organizations {
            if !organizations.contains(&ext.organization_id) {
                return Err(dangling(
                    "external organization",
                    &ext.id,
                    "organization",
                    &ext.organization_id,
                ));
            }
        }
        for agreement in &self.agreements {
            if !externals.contains(&agreement.external_organization_id) {
                return Err(dangling(
                    "agreement",
                    &agreement.id,
                    "external organization",
                    &agreement.external_organization_id,
                ));
            }
        }
        for recipient in &self.recipients {
            if !organizations.contains(&recipient.organization_id) {
                return Err(dangling(
                    "recipient",
                    &recipient.id,
                    "organization",
                    &recipient.organization_id,
                ));
            }
            if let Some(parent) = &recipient.parent_recipient_id {
                if !recipients.contains(parent) {
                    return Err(dangling("recipient", &recipient.id, "recipient", parent));
                }
            }
            if let Some(ext) = &recipient.external_organization_id {
                if !externals.contains(ext) {
                    return Err(dangling(
                        "recipient",
                        &recipient.id,
                        "external organization",
                        ext,
                    ));
                }
            }
        }
        for location in &self.locations {
            if !recipients.contains(&location.recipient_id) {
                return Err(dangling(
                    "location",
                    &location.id,
                    "recipient",
                    &location.recipient_id,
                ));
            }
            if !countries.contains(&location.country_id) {
                return Err(dangling(
                    "location",
                    &location.id,
                    "country",
                    &location.country_id,
                ));
            }
            if let Some(mechanism) = &location.transfer_mechanism_id {
                if !mechanisms.contains(mechanism) {
                    return Err(dangling(
                        "location",
                        &location.id,
                        "transfer mechanism",
                        mechanism,
                    ));
                }
            }
        }
        for activity in &self.activities {
            if !organizations.contains(&activity.organization_id) {
                return Err(dangling(
                    "activity",
                    &activity.id,
                    "organization",
                    &activity.organization_id,
                ));
            }
            for linked in &activity.recipient_ids {
                if !recipients.contains(linked) {
                    return Err(dangling("activity", &activity.id, "recipient", linked));
                }
            }
        }
        Ok(())
    }

    /// Build an in-memory store holding every row of the snapshot.
    pub fn into_store(self) -> InMemoryStore {
        let store = InMemoryStore::new();
        self.countries.into_iter().for_each(|c| store.insert_country(c));
        self.transfer_mechanisms
            .into_iter()
            .for_each(|m| store.insert_mechanism(m));
        self.organizations
            .into_iter()
            .for_each(|o| store.insert_organization(o));
        self.external_organizations
            .into_iter()
            .for_each(|e| store.insert_external_organization(e));
        self.agreements.into_iter().for_each(|a| store.insert_agreement(a));
        self.recipients.into_iter().for_each(|r| store.insert_recipient(r));
        self.locations
            .into_iter()
            .for_each(|l| store.insert_location_row(l));
        self.activities.into_iter().for_each(|a| store.insert_activity(a));
        store
    }
}
