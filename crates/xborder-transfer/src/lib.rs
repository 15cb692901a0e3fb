//! # xborder-transfer — Cross-Border Transfer Detection
//!
//! Scans an organization's recipients, or the recipients linked to one
//! processing activity, and reports every processing location whose
//! transfer from the organization's headquarters country carries risk.
//!
//! A recipient inherits the locations of its whole ancestor chain: data
//! handed to a sub-processor also flows through the processor above it.
//! Each [`CrossBorderTransfer`] records the `depth` of the recipient whose
//! location produced it (0 for the recipient itself).
//!
//! Scans are sequential and honour a caller-supplied
//! [`ScanControl`](xborder_core::ScanControl). An interrupted scan returns
//! [`DetectionError::Interrupted`], never a partial list.

pub mod analysis;
pub mod detection;
pub mod error;

pub use analysis::{ActivityTransferAnalysis, CountryExposure};
pub use detection::{CrossBorderTransfer, OrganizationTransferScan, TransferDetectionService};
pub use error::DetectionError;
