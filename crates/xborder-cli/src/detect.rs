//! # Transfer Scan Subcommands
//!
//! `xborder detect` scans a whole organization; `xborder activity` analyses
//! one processing activity. Both exit with [`EXIT_VIOLATIONS`] when any
//! reported transfer is critical, i.e. an EU/EEA export to a third country
//! without a transfer mechanism. The `detect` report also carries
//! `unclassified_transfers`, the locations no classification rule covers.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use xborder_core::{ActivityId, OrganizationId};
use xborder_hierarchy::RuleTable;
use xborder_risk::RiskLevel;
use xborder_transfer::{CrossBorderTransfer, TransferDetectionService};

use crate::{load_store, print_json, scan_control, EXIT_OK, EXIT_VIOLATIONS};

#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Dataset snapshot (YAML, or JSON with a `.json` extension).
    #[arg(long)]
    pub dataset: PathBuf,

    /// Organization to scan.
    #[arg(long)]
    pub org: OrganizationId,

    /// Abort the scan after this many milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Args, Debug)]
pub struct ActivityArgs {
    /// Dataset snapshot (YAML, or JSON with a `.json` extension).
    #[arg(long)]
    pub dataset: PathBuf,

    /// Processing activity to analyse.
    #[arg(long)]
    pub activity: ActivityId,

    /// Abort the scan after this many milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

fn exit_code<'t>(levels: impl IntoIterator<Item = &'t CrossBorderTransfer>) -> u8 {
    if levels
        .into_iter()
        .any(|t| t.risk_level == RiskLevel::Critical)
    {
        EXIT_VIOLATIONS
    } else {
        EXIT_OK
    }
}

pub async fn run_detect(args: &DetectArgs, rules: &RuleTable) -> Result<u8> {
    let store = load_store(&args.dataset)?;
    let control = scan_control(args.timeout_ms);
    let scan = TransferDetectionService::new(&store, rules)
        .scan_organization(&args.org, &control)
        .await
        .with_context(|| format!("transfer scan of organization {} failed", args.org))?;

    if scan.unclassified_transfers > 0 {
        tracing::warn!(
            organization_id = %args.org,
            unclassified = scan.unclassified_transfers,
            "some transfers matched no classification rule"
        );
    }
    print_json(&scan)?;
    Ok(exit_code(&scan.transfers))
}

pub async fn run_activity(args: &ActivityArgs, rules: &RuleTable) -> Result<u8> {
    let store = load_store(&args.dataset)?;
    let control = scan_control(args.timeout_ms);
    let analysis = TransferDetectionService::new(&store, rules)
        .activity_transfer_analysis(&args.activity, &control)
        .await
        .with_context(|| format!("transfer analysis of activity {} failed", args.activity))?;

    print_json(&analysis)?;
    Ok(exit_code(&analysis.transfers))
}
