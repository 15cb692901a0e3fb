//! # Hierarchy Validation Subcommands
//!
//! `xborder audit` re-validates every stored recipient of one organization.
//! `xborder check` runs a proposed write through the guarded write path
//! against an ephemeral copy of the dataset; nothing is persisted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use xborder_core::{ExternalOrganizationId, OrganizationId, Recipient, RecipientId, RecipientType};
use xborder_hierarchy::{
    AuditOutcome, HierarchyValidator, RecipientAudit, RecipientWriter, RuleTable, WriteOutcome,
};
use xborder_store::RecipientStore;

use crate::{load_store, print_json, EXIT_OK, EXIT_VIOLATIONS};

#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Dataset snapshot (YAML, or JSON with a `.json` extension).
    #[arg(long)]
    pub dataset: PathBuf,

    /// Organization to audit.
    #[arg(long)]
    pub org: OrganizationId,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Dataset snapshot (YAML, or JSON with a `.json` extension).
    #[arg(long)]
    pub dataset: PathBuf,

    /// Organization the recipient belongs to.
    #[arg(long)]
    pub org: OrganizationId,

    /// Recipient type, e.g. `SUB_PROCESSOR` or `sub-processor`.
    #[arg(long = "type")]
    pub recipient_type: RecipientType,

    /// Proposed parent recipient.
    #[arg(long)]
    pub parent: Option<RecipientId>,

    /// External organization behind the recipient. Defaults to the stored
    /// value when `--id` names an existing row.
    #[arg(long)]
    pub external_org: Option<ExternalOrganizationId>,

    /// Existing recipient to update. A new id is used when omitted.
    #[arg(long)]
    pub id: Option<RecipientId>,

    /// Name for a new recipient.
    #[arg(long, default_value = "proposed recipient")]
    pub name: String,
}

#[derive(Debug, Serialize)]
struct AuditReport<'a> {
    organization_id: &'a OrganizationId,
    recipients: usize,
    invalid: usize,
    unverifiable: usize,
    results: &'a [RecipientAudit],
}

pub async fn run_audit(args: &AuditArgs, rules: &RuleTable) -> Result<u8> {
    let store = load_store(&args.dataset)?;
    if store.get_organization(&args.org).await?.is_none() {
        anyhow::bail!("organization {} not found in dataset", args.org);
    }

    let validator = HierarchyValidator::new(&store, rules);
    let results = validator
        .audit_organization(&args.org)
        .await
        .with_context(|| format!("hierarchy audit of organization {} failed", args.org))?;

    let invalid = results
        .iter()
        .filter(|a| matches!(&a.outcome, AuditOutcome::Checked { result } if !result.is_valid()))
        .count();
    let unverifiable = results
        .iter()
        .filter(|a| matches!(a.outcome, AuditOutcome::Unverifiable { .. }))
        .count();

    print_json(&AuditReport {
        organization_id: &args.org,
        recipients: results.len(),
        invalid,
        unverifiable,
        results: &results,
    })?;

    Ok(if invalid + unverifiable > 0 {
        EXIT_VIOLATIONS
    } else {
        EXIT_OK
    })
}

/// Build the row a `check` invocation proposes to write.
async fn proposed_recipient<S: RecipientStore + ?Sized>(
    store: &S,
    args: &CheckArgs,
) -> Result<Recipient> {
    let existing = match &args.id {
        Some(id) => store.get_recipient(id).await?,
        None => None,
    };
    let mut recipient = match existing {
        Some(mut row) => {
            row.organization_id = args.org.clone();
            row.recipient_type = args.recipient_type;
            row
        }
        None => {
            let mut row = Recipient::new(args.org.clone(), args.name.clone(), args.recipient_type);
            if let Some(id) = &args.id {
                row.id = id.clone();
            }
            row
        }
    };
    recipient.parent_recipient_id = args.parent.clone();
    if let Some(external) = &args.external_org {
        recipient.external_organization_id = Some(external.clone());
    }
    Ok(recipient)
}

pub async fn run_check(args: &CheckArgs, rules: &RuleTable) -> Result<u8> {
    let store = Arc::new(load_store(&args.dataset)?);
    let recipient = proposed_recipient(store.as_ref(), args).await?;
    tracing::debug!(recipient_id = %recipient.id, "checking proposed recipient write");

    let writer = RecipientWriter::new(Arc::clone(&store), Arc::new(rules.clone()));
    let outcome = writer
        .write(recipient)
        .await
        .context("proposed write could not be validated")?;

    print_json(&outcome)?;
    Ok(match outcome {
        WriteOutcome::Committed { .. } => EXIT_OK,
        WriteOutcome::Rejected { .. } => EXIT_VIOLATIONS,
    })
}
