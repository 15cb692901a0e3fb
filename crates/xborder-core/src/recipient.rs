//! # Recipients & Their Legal Counterparts
//!
//! A [`Recipient`] is a third party (or internal department) that receives
//! personal data from an organization. Recipients form a forest per
//! organization through the nullable `parent_recipient_id` weak reference.
//!
//! The structural rules that govern which recipient types may nest under
//! which (and how deep) live in `xborder-hierarchy`; this module only
//! defines the vocabulary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::{
    ActivityId, AgreementId, CountryId, ExternalOrganizationId, OrganizationId, RecipientId,
};

// ---------------------------------------------------------------------------
// RecipientType
// ---------------------------------------------------------------------------

/// The seven recipient classifications.
///
/// Every `match` on this enum is exhaustive. Adding an eighth type is a
/// compile error until each rule table and consumer handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientType {
    /// Processes personal data on behalf of the controller.
    Processor,
    /// Engaged by a processor (or another sub-processor).
    SubProcessor,
    /// Determines purposes and means jointly with the organization.
    JointController,
    /// Supplies services without processing under instruction.
    ServiceProvider,
    /// Independent controller receiving data for its own purposes.
    SeparateController,
    /// Public body receiving data under a legal obligation.
    PublicAuthority,
    /// A unit inside the organization itself.
    InternalDepartment,
}

impl RecipientType {
    /// All recipient types, in declaration order.
    pub fn all() -> &'static [RecipientType] {
        &[
            Self::Processor,
            Self::SubProcessor,
            Self::JointController,
            Self::ServiceProvider,
            Self::SeparateController,
            Self::PublicAuthority,
            Self::InternalDepartment,
        ]
    }

    /// Position of this type in [`RecipientType::all`].
    pub fn index(self) -> usize {
        match self {
            Self::Processor => 0,
            Self::SubProcessor => 1,
            Self::JointController => 2,
            Self::ServiceProvider => 3,
            Self::SeparateController => 4,
            Self::PublicAuthority => 5,
            Self::InternalDepartment => 6,
        }
    }

    /// The canonical wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processor => "PROCESSOR",
            Self::SubProcessor => "SUB_PROCESSOR",
            Self::JointController => "JOINT_CONTROLLER",
            Self::ServiceProvider => "SERVICE_PROVIDER",
            Self::SeparateController => "SEPARATE_CONTROLLER",
            Self::PublicAuthority => "PUBLIC_AUTHORITY",
            Self::InternalDepartment => "INTERNAL_DEPARTMENT",
        }
    }
}

impl fmt::Display for RecipientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecipientType {
    type Err = ValidationError;

    /// Accepts the canonical name in any case, with `-` or `_` separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownRecipientType(s.to_string()))
    }
}

/// The kind of hierarchy a recipient participates in. Derived from the
/// recipient type and stamped onto the row at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HierarchyType {
    /// Processor → sub-processor → sub-sub-processor chains.
    ProcessorChain,
    /// Department trees inside one organization.
    Organizational,
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// A node in an organization's recipient forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RecipientId,
    pub organization_id: OrganizationId,
    pub name: String,
    #[serde(rename = "type")]
    pub recipient_type: RecipientType,
    /// Weak reference to the parent node. Never an ownership pointer.
    #[serde(default)]
    pub parent_recipient_id: Option<RecipientId>,
    #[serde(default)]
    pub hierarchy_type: Option<HierarchyType>,
    #[serde(default)]
    pub external_organization_id: Option<ExternalOrganizationId>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Recipient {
    /// Create an active root recipient with no parent and no external organization.
    pub fn new(
        organization_id: OrganizationId,
        name: impl Into<String>,
        recipient_type: RecipientType,
    ) -> Self {
        Self {
            id: RecipientId::new(),
            organization_id,
            name: name.into(),
            recipient_type,
            parent_recipient_id: None,
            hierarchy_type: None,
            external_organization_id: None,
            is_active: true,
        }
    }

    /// Set the parent reference.
    pub fn with_parent(mut self, parent: RecipientId) -> Self {
        self.parent_recipient_id = Some(parent);
        self
    }

    /// Set the external organization reference.
    pub fn with_external_organization(mut self, external: ExternalOrganizationId) -> Self {
        self.external_organization_id = Some(external);
        self
    }
}

// ---------------------------------------------------------------------------
// Organizations, external organizations, agreements
// ---------------------------------------------------------------------------

/// A tenant. Its headquarters country is the origin of every transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    #[serde(default)]
    pub headquarters_country_id: Option<CountryId>,
}

/// The legal entity behind one or more recipients. Owned by one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalOrganization {
    pub id: ExternalOrganizationId,
    pub organization_id: OrganizationId,
    pub name: String,
}

/// Contract types a recipient may be required to have in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgreementType {
    /// Data processing agreement (GDPR Art. 28).
    Dpa,
    /// Arrangement between joint controllers (GDPR Art. 26).
    JointControllerAgreement,
    /// Standard contractual clauses (GDPR Art. 46(2)(c)).
    Scc,
    /// Binding corporate rules (GDPR Art. 47).
    Bcr,
    /// Non-disclosure agreement.
    Nda,
    /// General service agreement.
    ServiceAgreement,
}

impl AgreementType {
    /// All agreement types, in declaration order.
    pub fn all() -> &'static [AgreementType] {
        &[
            Self::Dpa,
            Self::JointControllerAgreement,
            Self::Scc,
            Self::Bcr,
            Self::Nda,
            Self::ServiceAgreement,
        ]
    }

    /// The canonical wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dpa => "DPA",
            Self::JointControllerAgreement => "JOINT_CONTROLLER_AGREEMENT",
            Self::Scc => "SCC",
            Self::Bcr => "BCR",
            Self::Nda => "NDA",
            Self::ServiceAgreement => "SERVICE_AGREEMENT",
        }
    }
}

impl fmt::Display for AgreementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgreementType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownAgreementType(s.to_string()))
    }
}

/// Lifecycle status of an agreement. Only `Active` agreements satisfy a
/// requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgreementStatus {
    Draft,
    Active,
    Expired,
    Terminated,
}

/// A contract backing a recipient relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    pub id: AgreementId,
    pub external_organization_id: ExternalOrganizationId,
    pub agreement_type: AgreementType,
    pub status: AgreementStatus,
}

impl Agreement {
    /// Whether this agreement currently satisfies requirements.
    pub fn is_active(&self) -> bool {
        matches!(self.status, AgreementStatus::Active)
    }
}

/// A processing activity and the recipients it discloses data to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingActivity {
    pub id: ActivityId,
    pub organization_id: OrganizationId,
    pub name: String,
    #[serde(default)]
    pub recipient_ids: Vec<RecipientId>,
}
