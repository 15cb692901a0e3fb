//! # Processing-Activity Transfer Analysis
//!
//! Runs the same derivation as the organization scan, restricted to the
//! recipients linked to one processing activity, and aggregates the result
//! for a record of processing activities.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use xborder_core::{ActivityId, CountryCode, LocationId, OrganizationId, ScanControl};
use xborder_risk::RiskLevel;
use xborder_store::RecipientStore;

use crate::detection::{CrossBorderTransfer, ReferenceCache, ScanOutput, TransferDetectionService};
use crate::error::DetectionError;

/// How many distinct risky locations sit in one destination country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryExposure {
    pub country: CountryCode,
    pub name: String,
    pub location_count: usize,
}

/// Aggregated transfer picture for one processing activity.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityTransferAnalysis {
    pub activity_id: ActivityId,
    pub activity_name: String,
    pub organization_id: OrganizationId,
    pub origin_country: CountryCode,
    /// Recipients linked to the activity within its organization.
    pub total_recipients: usize,
    /// Linked recipients with at least one risky transfer.
    pub recipients_with_transfers: usize,
    /// Transfer counts for every level above `None`.
    pub risk_histogram: BTreeMap<RiskLevel, usize>,
    /// The worst level present, if any transfer was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highest_risk: Option<RiskLevel>,
    /// Destination countries, most distinct locations first.
    pub countries: Vec<CountryExposure>,
    /// Transfers skipped because no classification rule matched.
    pub unclassified_transfers: usize,
    pub transfers: Vec<CrossBorderTransfer>,
}

impl<'a, S: RecipientStore + ?Sized> TransferDetectionService<'a, S> {
    /// Analyse the transfers behind one processing activity.
    ///
    /// # Errors
    ///
    /// Unlike the organization scan, a missing activity or a missing
    /// headquarters country is a hard error.
    pub async fn activity_transfer_analysis(
        &self,
        activity: &ActivityId,
        control: &ScanControl,
    ) -> Result<ActivityTransferAnalysis, DetectionError> {
        control.checkpoint()?;
        let record = self
            .store
            .get_activity(activity)
            .await?
            .ok_or_else(|| DetectionError::ActivityNotFound(activity.clone()))?;

        control.checkpoint()?;
        let org = self
            .store
            .get_organization(&record.organization_id)
            .await?
            .ok_or_else(|| DetectionError::OrganizationNotFound(record.organization_id.clone()))?;

        let mut cache = ReferenceCache::default();
        let origin = self
            .origin_country(&org, control, &mut cache)
            .await?
            .ok_or_else(|| DetectionError::HeadquartersCountryMissing(org.id.clone()))?;

        control.checkpoint()?;
        let recipients = self.store.list_activity_recipients(activity).await?;
        tracing::info!(
            activity_id = %activity,
            organization_id = %org.id,
            recipients = recipients.len(),
            "starting activity transfer analysis"
        );

        let mut output = ScanOutput::default();
        let mut recipients_with_transfers = 0;
        for recipient in recipients.iter().filter(|r| r.is_active) {
            let before = output.transfers.len();
            self.scan_recipient(&origin, recipient, control, &mut cache, &mut output)
                .await?;
            if output.transfers.len() > before {
                recipients_with_transfers += 1;
            }
        }

        let mut risk_histogram: BTreeMap<RiskLevel, usize> = RiskLevel::all()
            .iter()
            .filter(|level| **level > RiskLevel::None)
            .map(|level| (*level, 0))
            .collect();
        for transfer in &output.transfers {
            *risk_histogram.entry(transfer.risk_level).or_default() += 1;
        }

        let analysis = ActivityTransferAnalysis {
            activity_id: record.id,
            activity_name: record.name,
            organization_id: org.id,
            origin_country: origin.code,
            total_recipients: recipients.len(),
            recipients_with_transfers,
            highest_risk: output.transfers.iter().map(|t| t.risk_level).max(),
            risk_histogram,
            countries: rank_countries(&output.transfers),
            unclassified_transfers: output.unclassified,
            transfers: output.transfers,
        };

        tracing::info!(
            activity_id = %activity,
            transfers = analysis.transfers.len(),
            recipients_with_transfers = analysis.recipients_with_transfers,
            unclassified = analysis.unclassified_transfers,
            "completed activity transfer analysis"
        );
        Ok(analysis)
    }
}

/// Destination countries by distinct location count, descending; ties by
/// code. A location inherited by several descendants counts once.
fn rank_countries(transfers: &[CrossBorderTransfer]) -> Vec<CountryExposure> {
    let mut locations: BTreeMap<&CountryCode, (&str, BTreeSet<&LocationId>)> = BTreeMap::new();
    for transfer in transfers {
        locations
            .entry(&transfer.destination_country)
            .or_insert_with(|| (transfer.destination_name.as_str(), BTreeSet::new()))
            .1
            .insert(&transfer.location_id);
    }
    let mut ranked: Vec<CountryExposure> = locations
        .into_iter()
        .map(|(code, (name, ids))| CountryExposure {
            country: code.clone(),
            name: name.to_string(),
            location_count: ids.len(),
        })
        .collect();
    // Stable: equal counts stay in code order.
    ranked.sort_by(|a, b| b.location_count.cmp(&a.location_count));
    ranked
}
