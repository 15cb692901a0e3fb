//! # Organization-Wide Transfer Detection
//!
//! [`TransferDetectionService::detect_cross_border_transfers`] walks every
//! active recipient of an organization, evaluates its own active locations
//! and those of its ancestor chain against the headquarters country, and
//! returns the transfers that carry risk.
//!
//! Ancestors contribute their locations whether or not they are themselves
//! active; only active locations are evaluated. Transfers that match no
//! classification rule are logged and counted in the
//! [`OrganizationTransferScan`] returned by
//! [`TransferDetectionService::scan_organization`].

use std::collections::BTreeMap;

use serde::Serialize;

use xborder_core::{
    Country, CountryCode, CountryId, LocationId, Organization, OrganizationId,
    ProcessingLocation, Recipient, RecipientId, RecipientType, ScanControl, TransferMechanism,
    TransferMechanismId,
};
use xborder_hierarchy::{GraphTraversal, RuleTable};
use xborder_risk::{derive_transfer_risk, RiskError, RiskLevel, TransferRisk};
use xborder_store::RecipientStore;

use crate::error::DetectionError;

/// One risky transfer, attributed to the recipient being scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossBorderTransfer {
    pub recipient_id: RecipientId,
    pub recipient_name: String,
    pub recipient_type: RecipientType,
    /// The recipient whose location produced this transfer.
    pub source_recipient_id: RecipientId,
    pub source_recipient_name: String,
    /// 0 for the recipient's own location, N for its N-th ancestor.
    pub depth: usize,
    pub location_id: LocationId,
    pub origin_country: CountryCode,
    pub destination_country: CountryCode,
    pub destination_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_mechanism: Option<String>,
    pub risk_level: RiskLevel,
    pub risk: TransferRisk,
}

/// Per-scan lookups of global reference rows.
#[derive(Default)]
pub(crate) struct ReferenceCache {
    countries: BTreeMap<CountryId, Country>,
    mechanisms: BTreeMap<TransferMechanismId, TransferMechanism>,
}

/// Accumulated output of one scan.
#[derive(Default)]
pub(crate) struct ScanOutput {
    pub transfers: Vec<CrossBorderTransfer>,
    pub unclassified: usize,
}

/// Result of scanning one organization.
#[derive(Debug, Clone, Serialize)]
pub struct OrganizationTransferScan {
    pub organization_id: OrganizationId,
    /// Headquarters country; `None` when the scan was skipped.
    pub origin_country: Option<CountryCode>,
    pub transfers: Vec<CrossBorderTransfer>,
    /// Transfers that matched no classification rule, e.g. imports into
    /// the EU from a third-country headquarters.
    pub unclassified_transfers: usize,
}

/// Detects risky transfers for organizations and processing activities.
pub struct TransferDetectionService<'a, S: ?Sized> {
    pub(crate) store: &'a S,
    pub(crate) rules: &'a RuleTable,
}

impl<'a, S: RecipientStore + ?Sized> TransferDetectionService<'a, S> {
    pub fn new(store: &'a S, rules: &'a RuleTable) -> Self {
        Self { store, rules }
    }

    /// Every risky transfer across `organization`'s active recipients.
    ///
    /// An organization without a headquarters country has no origin to
    /// compare against and yields an empty list. Transfers no rule
    /// classifies are dropped here; [`Self::scan_organization`] reports
    /// how many there were.
    ///
    /// # Errors
    ///
    /// As [`Self::scan_organization`].
    pub async fn detect_cross_border_transfers(
        &self,
        organization: &OrganizationId,
        control: &ScanControl,
    ) -> Result<Vec<CrossBorderTransfer>, DetectionError> {
        Ok(self.scan_organization(organization, control).await?.transfers)
    }

    /// Scan `organization` and report the risky transfers together with
    /// the count of transfers that matched no classification rule.
    ///
    /// # Errors
    ///
    /// [`DetectionError::OrganizationNotFound`] for an unknown organization,
    /// [`DetectionError::ReferenceDataMissing`] for dangling country or
    /// mechanism ids, and traversal, store and interrupt failures.
    pub async fn scan_organization(
        &self,
        organization: &OrganizationId,
        control: &ScanControl,
    ) -> Result<OrganizationTransferScan, DetectionError> {
        control.checkpoint()?;
        let org = self
            .store
            .get_organization(organization)
            .await?
            .ok_or_else(|| DetectionError::OrganizationNotFound(organization.clone()))?;

        let mut cache = ReferenceCache::default();
        let Some(origin) = self.origin_country(&org, control, &mut cache).await? else {
            tracing::warn!(
                organization_id = %organization,
                "organization has no headquarters country; skipping transfer detection"
            );
            return Ok(OrganizationTransferScan {
                organization_id: organization.clone(),
                origin_country: None,
                transfers: Vec::new(),
                unclassified_transfers: 0,
            });
        };

        control.checkpoint()?;
        let recipients = self.store.list_recipients(organization).await?;
        tracing::info!(
            organization_id = %organization,
            origin = %origin.code,
            recipients = recipients.len(),
            "starting cross-border transfer scan"
        );

        let mut output = ScanOutput::default();
        for recipient in recipients.iter().filter(|r| r.is_active) {
            self.scan_recipient(&origin, recipient, control, &mut cache, &mut output)
                .await?;
        }

        tracing::info!(
            organization_id = %organization,
            transfers = output.transfers.len(),
            unclassified = output.unclassified,
            "completed cross-border transfer scan"
        );
        Ok(OrganizationTransferScan {
            organization_id: organization.clone(),
            origin_country: Some(origin.code),
            transfers: output.transfers,
            unclassified_transfers: output.unclassified,
        })
    }

    /// Resolve the headquarters country, if the organization names one.
    pub(crate) async fn origin_country(
        &self,
        org: &Organization,
        control: &ScanControl,
        cache: &mut ReferenceCache,
    ) -> Result<Option<Country>, DetectionError> {
        match &org.headquarters_country_id {
            Some(id) => Ok(Some(self.country(id, control, cache).await?)),
            None => Ok(None),
        }
    }

    /// Evaluate `recipient`'s own locations and those of its ancestors.
    pub(crate) async fn scan_recipient(
        &self,
        origin: &Country,
        recipient: &Recipient,
        control: &ScanControl,
        cache: &mut ReferenceCache,
        output: &mut ScanOutput,
    ) -> Result<(), DetectionError> {
        self.scan_locations(origin, recipient, recipient, 0, control, cache, output)
            .await?;

        if recipient.parent_recipient_id.is_some() {
            let walker =
                GraphTraversal::new(self.store, self.rules).with_control(control.clone());
            let ancestors = walker
                .ancestor_chain(&recipient.id, &recipient.organization_id)
                .await?;
            for (hop, ancestor) in ancestors.iter().enumerate() {
                self.scan_locations(origin, recipient, ancestor, hop + 1, control, cache, output)
                    .await?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn scan_locations(
        &self,
        origin: &Country,
        recipient: &Recipient,
        source: &Recipient,
        depth: usize,
        control: &ScanControl,
        cache: &mut ReferenceCache,
        output: &mut ScanOutput,
    ) -> Result<(), DetectionError> {
        control.checkpoint()?;
        let locations = self.store.list_active_locations(&source.id).await?;
        tracing::debug!(
            recipient_id = %recipient.id,
            source_recipient_id = %source.id,
            depth,
            locations = locations.len(),
            "evaluating processing locations"
        );

        for location in locations.iter().filter(|l| l.is_active) {
            let destination = self.country(&location.country_id, control, cache).await?;
            let mechanism = match &location.transfer_mechanism_id {
                Some(id) => Some(self.mechanism(id, control, cache).await?),
                None => None,
            };

            match derive_transfer_risk(origin, &destination, mechanism.as_ref()) {
                Ok(risk) if risk.is_risky() => output.transfers.push(build_transfer(
                    origin,
                    recipient,
                    source,
                    depth,
                    location,
                    &destination,
                    mechanism.as_ref(),
                    risk,
                )),
                Ok(_) => {}
                Err(RiskError::UnclassifiedTransfer { .. }) => {
                    tracing::warn!(
                        recipient_id = %recipient.id,
                        location_id = %location.id,
                        origin = %origin.code,
                        destination = %destination.code,
                        "transfer matches no classification rule; skipping"
                    );
                    output.unclassified += 1;
                }
            }
        }
        Ok(())
    }

    async fn country(
        &self,
        id: &CountryId,
        control: &ScanControl,
        cache: &mut ReferenceCache,
    ) -> Result<Country, DetectionError> {
        if let Some(country) = cache.countries.get(id) {
            return Ok(country.clone());
        }
        control.checkpoint()?;
        let country = self.store.get_country(id).await?.ok_or_else(|| {
            DetectionError::ReferenceDataMissing {
                entity: "country",
                id: id.to_string(),
            }
        })?;
        cache.countries.insert(id.clone(), country.clone());
        Ok(country)
    }

    async fn mechanism(
        &self,
        id: &TransferMechanismId,
        control: &ScanControl,
        cache: &mut ReferenceCache,
    ) -> Result<TransferMechanism, DetectionError> {
        if let Some(mechanism) = cache.mechanisms.get(id) {
            return Ok(mechanism.clone());
        }
        control.checkpoint()?;
        let mechanism = self.store.get_transfer_mechanism(id).await?.ok_or_else(|| {
            DetectionError::ReferenceDataMissing {
                entity: "transfer mechanism",
                id: id.to_string(),
            }
        })?;
        cache.mechanisms.insert(id.clone(), mechanism.clone());
        Ok(mechanism)
    }
}

#[allow(clippy::too_many_arguments)]
fn build_transfer(
    origin: &Country,
    recipient: &Recipient,
    source: &Recipient,
    depth: usize,
    location: &ProcessingLocation,
    destination: &Country,
    mechanism: Option<&TransferMechanism>,
    risk: TransferRisk,
) -> CrossBorderTransfer {
    CrossBorderTransfer {
        recipient_id: recipient.id.clone(),
        recipient_name: recipient.name.clone(),
        recipient_type: recipient.recipient_type,
        source_recipient_id: source.id.clone(),
        source_recipient_name: source.name.clone(),
        depth,
        location_id: location.id.clone(),
        origin_country: origin.code.clone(),
        destination_country: destination.code.clone(),
        destination_name: destination.name.clone(),
        transfer_mechanism: mechanism.map(|m| m.code.clone()),
        risk_level: risk.level(),
        risk,
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::World;
    use super::*;
    use xborder_core::{CountryId, ScanInterrupt};

    fn rules() -> RuleTable {
        RuleTable::gdpr_default()
    }

    #[tokio::test]
    async fn reports_only_risky_locations() {
        let world = World::new();
        let cloud = world.recipient(RecipientType::Processor, "CloudCo", None);
        world.locate(&cloud, &world.germany);
        world.locate(&cloud, &world.us);
        world.locate(&cloud, &world.japan);

        let rules = rules();
        let service = TransferDetectionService::new(&world.store, &rules);
        let transfers = service
            .detect_cross_border_transfers(&world.org, &ScanControl::new())
            .await
            .unwrap();

        let mut levels: Vec<_> = transfers.iter().map(|t| t.risk_level).collect();
        levels.sort();
        assert_eq!(levels, vec![RiskLevel::Low, RiskLevel::Critical]);
        assert!(transfers.iter().all(|t| t.depth == 0));
        assert!(transfers.iter().all(|t| t.origin_country.as_str() == "FR"));
    }

    #[tokio::test]
    async fn sub_processor_inherits_ancestor_locations() {
        let world = World::new();
        let processor = world.recipient(RecipientType::Processor, "CloudCo", None);
        let sub = world.recipient(RecipientType::SubProcessor, "Backups Inc", Some(&processor));
        world.locate(&processor, &world.us);

        let rules = rules();
        let service = TransferDetectionService::new(&world.store, &rules);
        let transfers = service
            .detect_cross_border_transfers(&world.org, &ScanControl::new())
            .await
            .unwrap();

        assert_eq!(transfers.len(), 2);
        let inherited = transfers
            .iter()
            .find(|t| t.recipient_id == sub.id)
            .unwrap();
        assert_eq!(inherited.depth, 1);
        assert_eq!(inherited.source_recipient_id, processor.id);
        assert_eq!(inherited.risk, TransferRisk::ThirdCountryNoMechanism);
    }

    #[tokio::test]
    async fn mechanism_lowers_risk_to_medium() {
        let world = World::new();
        let cloud = world.recipient(RecipientType::Processor, "CloudCo", None);
        let location = ProcessingLocation::new(cloud.id.clone(), world.us.id.clone())
            .with_mechanism(world.scc.id.clone());
        world.store.insert_location_row(location);

        let rules = rules();
        let transfers = TransferDetectionService::new(&world.store, &rules)
            .detect_cross_border_transfers(&world.org, &ScanControl::new())
            .await
            .unwrap();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].risk_level, RiskLevel::Medium);
        assert_eq!(transfers[0].transfer_mechanism.as_deref(), Some("SCC"));
    }

    #[tokio::test]
    async fn inactive_rows_are_ignored() {
        let world = World::new();
        let mut retired = world.recipient(RecipientType::Processor, "Retired", None);
        world.locate(&retired, &world.us);
        retired.is_active = false;
        world.store.insert_recipient(retired);

        let live = world.recipient(RecipientType::Processor, "Live", None);
        let mut old = world.locate(&live, &world.us);
        old.is_active = false;
        world.store.insert_location_row(old);

        let rules = rules();
        let transfers = TransferDetectionService::new(&world.store, &rules)
            .detect_cross_border_transfers(&world.org, &ScanControl::new())
            .await
            .unwrap();
        assert!(transfers.is_empty());
    }

    #[tokio::test]
    async fn missing_headquarters_yields_empty_list() {
        let world = World::new();
        let org = Organization {
            id: OrganizationId::new(),
            name: "Nowhere Ltd".into(),
            headquarters_country_id: None,
        };
        world.store.insert_organization(org.clone());

        let rules = rules();
        let transfers = TransferDetectionService::new(&world.store, &rules)
            .detect_cross_border_transfers(&org.id, &ScanControl::new())
            .await
            .unwrap();
        assert!(transfers.is_empty());
    }

    #[tokio::test]
    async fn imports_from_a_third_country_are_counted_not_dropped() {
        let world = World::new();
        let org = Organization {
            id: OrganizationId::new(),
            name: "Acme Inc".into(),
            headquarters_country_id: Some(world.us.id.clone()),
        };
        world.store.insert_organization(org.clone());
        let cloud = Recipient::new(org.id.clone(), "CloudCo", RecipientType::Processor);
        world.store.insert_recipient(cloud.clone());
        world.locate(&cloud, &world.france);
        world.locate(&cloud, &world.germany);

        let rules = rules();
        let scan = TransferDetectionService::new(&world.store, &rules)
            .scan_organization(&org.id, &ScanControl::new())
            .await
            .unwrap();

        assert_eq!(scan.organization_id, org.id);
        assert_eq!(scan.origin_country.as_ref().map(|c| c.as_str()), Some("US"));
        assert_eq!(scan.unclassified_transfers, 2);
        assert!(scan.transfers.is_empty());
    }

    #[tokio::test]
    async fn skipped_scan_has_no_origin() {
        let world = World::new();
        let org = Organization {
            id: OrganizationId::new(),
            name: "Nowhere Ltd".into(),
            headquarters_country_id: None,
        };
        world.store.insert_organization(org.clone());

        let rules = rules();
        let scan = TransferDetectionService::new(&world.store, &rules)
            .scan_organization(&org.id, &ScanControl::new())
            .await
            .unwrap();
        assert!(scan.origin_country.is_none());
        assert_eq!(scan.unclassified_transfers, 0);
    }

    #[tokio::test]
    async fn unknown_organization_is_an_error() {
        let world = World::new();
        let rules = rules();
        let err = TransferDetectionService::new(&world.store, &rules)
            .detect_cross_border_transfers(&OrganizationId::new(), &ScanControl::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DetectionError::OrganizationNotFound(_)));
    }

    #[tokio::test]
    async fn dangling_country_is_an_error() {
        let world = World::new();
        let cloud = world.recipient(RecipientType::Processor, "CloudCo", None);
        world
            .store
            .insert_location_row(ProcessingLocation::new(cloud.id.clone(), CountryId::new()));

        let rules = rules();
        let err = TransferDetectionService::new(&world.store, &rules)
            .detect_cross_border_transfers(&world.org, &ScanControl::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DetectionError::ReferenceDataMissing { entity: "country", .. }
        ));
    }

    #[tokio::test]
    async fn cancelled_scan_returns_interrupt() {
        let world = World::new();
        world.recipient(RecipientType::Processor, "CloudCo", None);
        let control = ScanControl::new();
        control.cancel();

        let rules = rules();
        let err = TransferDetectionService::new(&world.store, &rules)
            .detect_cross_border_transfers(&world.org, &control)
            .await
            .unwrap_err();
        assert!(matches!(err, DetectionError::Interrupted(ScanInterrupt::Cancelled)));
    }

    #[tokio::test]
    async fn corrupt_chain_aborts_scan() {
        let world = World::new();
        let mut a = Recipient::new(world.org.clone(), "a", RecipientType::SubProcessor);
        let mut b = Recipient::new(world.org.clone(), "b", RecipientType::SubProcessor);
        a.parent_recipient_id = Some(b.id.clone());
        b.parent_recipient_id = Some(a.id.clone());
        world.store.insert_recipient(a);
        world.store.insert_recipient(b);

        let rules = rules();
        let err = TransferDetectionService::new(&world.store, &rules)
            .detect_cross_border_transfers(&world.org, &ScanControl::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DetectionError::Traversal(_)));
    }

    #[test]
    fn transfer_serializes_risk_reason() {
        let world = World::new();
        let cloud = Recipient::new(world.org.clone(), "CloudCo", RecipientType::Processor);
        let location = ProcessingLocation::new(cloud.id.clone(), world.us.id.clone());
        let transfer = build_transfer(
            &world.france,
            &cloud,
            &cloud,
            0,
            &location,
            &world.us,
            None,
            TransferRisk::ThirdCountryNoMechanism,
        );
        let json = serde_json::to_value(&transfer).unwrap();
        assert_eq!(json["risk_level"], "CRITICAL");
        assert_eq!(json["risk"]["reason"], "THIRD_COUNTRY_NO_MECHANISM");
        assert_eq!(json["destination_country"], "US");
        assert!(json.get("transfer_mechanism").is_none());
    }
}
