//! # xborder-risk — Transfer Risk Derivation
//!
//! Pure, synchronous classification of data transfers between countries.
//! Nothing in this crate performs I/O: callers resolve the origin and
//! destination [`Country`](xborder_core::Country) rows and the optional
//! [`TransferMechanism`](xborder_core::TransferMechanism) first.
//!
//! - [`jurisdiction`]: tag-based predicates over a pair of countries.
//! - [`engine`]: the [`TransferRisk`] classification, its [`RiskLevel`],
//!   and the hard mechanism-requirement check.

pub mod engine;
pub mod error;
pub mod jurisdiction;

pub use engine::{
    derive_transfer_risk, validate_transfer_mechanism_requirement, MechanismRequirement,
    RiskLevel, TransferRisk,
};
pub use error::RiskError;
pub use jurisdiction::{is_same_jurisdiction, is_third_country, requires_safeguards};
