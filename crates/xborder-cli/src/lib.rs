//! # xborder-cli — Operator CLI
//!
//! Runs hierarchy audits and transfer scans against a dataset snapshot.
//!
//! ## Subcommands
//!
//! - `xborder rules` — print the effective rule table.
//! - `xborder audit` / `xborder check` — hierarchy validation.
//! - `xborder detect` / `xborder activity` — transfer scans.
//!
//! ```bash
//! xborder audit --dataset acme.yaml --org 00000000-0000-0000-0000-0000000000a1
//! xborder --rules strict.yaml check --dataset acme.yaml --org ... \
//!     --type sub-processor --parent ...
//! xborder detect --dataset acme.yaml --org ... --timeout-ms 5000
//! ```
//!
//! Every subcommand prints pretty JSON on stdout and exits with
//! [`EXIT_OK`], [`EXIT_VIOLATIONS`], or 1 on error.

pub mod detect;
pub mod rules;
pub mod validate;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use xborder_core::ScanControl;
use xborder_hierarchy::RuleTable;
use xborder_store::{Dataset, InMemoryStore};

/// Everything checked out clean.
pub const EXIT_OK: u8 = 0;
/// The command ran but found rule violations or critical transfers.
pub const EXIT_VIOLATIONS: u8 = 2;

/// The rule table from `path`, or the built-in GDPR table.
pub fn load_rules(path: Option<&Path>) -> Result<RuleTable> {
    match path {
        Some(path) => RuleTable::load(path)
            .with_context(|| format!("failed to load rule table from {}", path.display())),
        None => Ok(RuleTable::gdpr_default()),
    }
}

/// Load a dataset snapshot into a fresh in-memory store.
pub fn load_store(path: &Path) -> Result<InMemoryStore> {
    let dataset = Dataset::load(path)
        .with_context(|| format!("failed to load dataset from {}", path.display()))?;
    Ok(dataset.into_store())
}

/// A scan control with an optional deadline, cancelled on Ctrl-C.
///
/// Must be called from within a Tokio runtime.
pub fn scan_control(timeout_ms: Option<u64>) -> ScanControl {
    let control = match timeout_ms {
        Some(ms) => ScanControl::with_timeout(Duration::from_millis(ms)),
        None => ScanControl::new(),
    };
    let on_interrupt = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; cancelling scan");
            on_interrupt.cancel();
        }
    });
    control
}

/// Pretty-print `value` as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}
