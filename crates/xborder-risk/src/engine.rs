//! # Transfer Risk Engine
//!
//! Classifies a transfer of personal data from an origin country to a
//! destination country, optionally covered by a transfer mechanism.
//!
//! Classification follows a fixed priority:
//!
//! ```text
//! 1. same jurisdiction                       -> None     SAME_JURISDICTION
//! 2. destination has an adequacy decision    -> Low      ADEQUACY_DECISION
//! 3. EU/EEA origin, third-country dest:
//!      mechanism present                     -> Medium   SAFEGUARDS_IN_PLACE
//!      no mechanism                          -> Critical THIRD_COUNTRY_NO_MECHANISM
//! 4. other origin, third-country dest:
//!      mechanism present                     -> Medium   SAFEGUARDS_IN_PLACE
//!      no mechanism                          -> High     MISSING_SAFEGUARDS
//! 5. anything else                           -> RiskError::UnclassifiedTransfer
//! ```
//!
//! Case 5 is reached by transfers from outside the EU/EEA into it.

use std::fmt;

use serde::{Deserialize, Serialize};

use xborder_core::{Country, JurisdictionTag, TransferMechanism, TransferMechanismId};

use crate::error::RiskError;
use crate::jurisdiction::{is_same_jurisdiction, is_third_country, requires_safeguards};

// ---------------------------------------------------------------------------
// RiskLevel
// ---------------------------------------------------------------------------

/// Severity of a transfer. Ordered `None < Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn all() -> &'static [RiskLevel] {
        &[
            Self::None,
            Self::Low,
            Self::Medium,
            Self::High,
            Self::Critical,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TransferRisk
// ---------------------------------------------------------------------------

/// Why a transfer carries the risk it does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferRisk {
    SameJurisdiction,
    AdequacyDecision,
    SafeguardsInPlace { mechanism: TransferMechanism },
    /// EU/EEA export to a third country with no Article 46 safeguard.
    ThirdCountryNoMechanism,
    MissingSafeguards { hint: String },
}

impl TransferRisk {
    pub fn level(&self) -> RiskLevel {
        match self {
            Self::SameJurisdiction => RiskLevel::None,
            Self::AdequacyDecision => RiskLevel::Low,
            Self::SafeguardsInPlace { .. } => RiskLevel::Medium,
            Self::MissingSafeguards { .. } => RiskLevel::High,
            Self::ThirdCountryNoMechanism => RiskLevel::Critical,
        }
    }

    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::SameJurisdiction => "SAME_JURISDICTION",
            Self::AdequacyDecision => "ADEQUACY_DECISION",
            Self::SafeguardsInPlace { .. } => "SAFEGUARDS_IN_PLACE",
            Self::ThirdCountryNoMechanism => "THIRD_COUNTRY_NO_MECHANISM",
            Self::MissingSafeguards { .. } => "MISSING_SAFEGUARDS",
        }
    }

    /// Whether the transfer needs attention at all.
    pub fn is_risky(&self) -> bool {
        self.level() > RiskLevel::None
    }
}

impl fmt::Display for TransferRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SafeguardsInPlace { mechanism } => {
                write!(f, "{} ({}, {})", self.level(), self.reason_code(), mechanism.code)
            }
            _ => write!(f, "{} ({})", self.level(), self.reason_code()),
        }
    }
}

/// Classify a transfer from `origin` to `destination`.
///
/// # Errors
///
/// [`RiskError::UnclassifiedTransfer`] when no rule matches.
pub fn derive_transfer_risk(
    origin: &Country,
    destination: &Country,
    mechanism: Option<&TransferMechanism>,
) -> Result<TransferRisk, RiskError> {
    if is_same_jurisdiction(origin, destination) {
        return Ok(TransferRisk::SameJurisdiction);
    }
    if destination.has_tag(JurisdictionTag::Adequate) {
        return Ok(TransferRisk::AdequacyDecision);
    }
    if requires_safeguards(origin, destination) {
        return Ok(match mechanism {
            Some(mechanism) => TransferRisk::SafeguardsInPlace {
                mechanism: mechanism.clone(),
            },
            None => TransferRisk::ThirdCountryNoMechanism,
        });
    }
    if is_third_country(destination) {
        return Ok(match mechanism {
            Some(mechanism) => TransferRisk::SafeguardsInPlace {
                mechanism: mechanism.clone(),
            },
            None => TransferRisk::MissingSafeguards {
                hint: format!(
                    "{destination} is a third country; document a transfer mechanism such as \
                     standard contractual clauses"
                ),
            },
        });
    }
    Err(RiskError::UnclassifiedTransfer {
        origin: origin.code.clone(),
        destination: destination.code.clone(),
    })
}

// ---------------------------------------------------------------------------
// Mechanism requirement
// ---------------------------------------------------------------------------

/// Result of the hard check that a transfer requiring Article 46 safeguards
/// names a mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MechanismRequirement {
    pub is_valid: bool,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Check whether a location from `origin` to `destination` must carry a
/// transfer mechanism, and whether `mechanism` satisfies that.
pub fn validate_transfer_mechanism_requirement(
    origin: &Country,
    destination: &Country,
    mechanism: Option<&TransferMechanismId>,
) -> MechanismRequirement {
    if is_same_jurisdiction(origin, destination) {
        return MechanismRequirement {
            is_valid: true,
            required: false,
            error: None,
        };
    }
    let required = requires_safeguards(origin, destination);
    if required && mechanism.is_none() {
        return MechanismRequirement {
            is_valid: false,
            required,
            error: Some(format!(
                "Transfers to {destination}, a third country, require a transfer mechanism \
                 under GDPR Article 46 (e.g. standard contractual clauses or binding \
                 corporate rules)"
            )),
        };
    }
    MechanismRequirement {
        is_valid: true,
        required,
        error: None,
    }
}
