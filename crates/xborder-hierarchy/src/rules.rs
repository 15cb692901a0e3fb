//! # Recipient Rule Tables
//!
//! A [`RuleTable`] maps every [`RecipientType`] to the structural rules its
//! rows must satisfy: whether it may have a parent, which parent types are
//! allowed, how deep it may sit, whether it needs an external organization,
//! and which agreements it should have.
//!
//! The table is an immutable value injected into the validator and
//! traversal, never a global. [`RuleTable::gdpr_default`] is the built-in
//! GDPR table; alternate tables (other regulatory frameworks, narrower test
//! tables) load from YAML:
//!
//! ```yaml
//! SUB_PROCESSOR:
//!   can_have_parent: true
//!   allowed_parent_types: [PROCESSOR, SUB_PROCESSOR]
//!   max_depth: 5
//!   requires_external_organization: true
//!   required_agreements: []
//! # ... one entry per recipient type
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use xborder_core::{AgreementType, RecipientType};

use crate::error::RuleTableError;

/// Structural rules for one recipient type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientRule {
    pub can_have_parent: bool,
    #[serde(default)]
    pub allowed_parent_types: BTreeSet<RecipientType>,
    /// Maximum hop-count from a row of this type to its root.
    #[serde(default)]
    pub max_depth: usize,
    pub requires_external_organization: bool,
    #[serde(default)]
    pub required_agreements: Vec<AgreementType>,
}

impl RecipientRule {
    /// A rule for a type that is always a root.
    fn root(requires_external_organization: bool, required_agreements: Vec<AgreementType>) -> Self {
        Self {
            can_have_parent: false,
            allowed_parent_types: BTreeSet::new(),
            max_depth: 0,
            requires_external_organization,
            required_agreements,
        }
    }

    fn allows_parent(&self, parent: RecipientType) -> bool {
        self.can_have_parent && self.allowed_parent_types.contains(&parent)
    }
}

/// Complete, immutable rule table covering every recipient type.
///
/// Construction guarantees one rule per [`RecipientType`], so
/// [`RuleTable::rule`] is infallible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTable {
    /// Indexed by [`RecipientType::index`].
    rules: Vec<RecipientRule>,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::gdpr_default()
    }
}

impl RuleTable {
    /// The GDPR recipient rule table.
    pub fn gdpr_default() -> Self {
        let rules = RecipientType::all()
            .iter()
            .map(|t| match t {
                RecipientType::Processor => RecipientRule::root(true, vec![AgreementType::Dpa]),
                RecipientType::SubProcessor => RecipientRule {
                    can_have_parent: true,
                    allowed_parent_types: [RecipientType::Processor, RecipientType::SubProcessor]
                        .into_iter()
                        .collect(),
                    max_depth: 5,
                    requires_external_organization: true,
                    required_agreements: Vec::new(),
                },
                RecipientType::JointController => {
                    RecipientRule::root(true, vec![AgreementType::JointControllerAgreement])
                }
                RecipientType::ServiceProvider
                | RecipientType::SeparateController
                | RecipientType::PublicAuthority => RecipientRule::root(true, Vec::new()),
                RecipientType::InternalDepartment => RecipientRule {
                    can_have_parent: true,
                    allowed_parent_types: [RecipientType::InternalDepartment].into_iter().collect(),
                    max_depth: 10,
                    requires_external_organization: false,
                    required_agreements: Vec::new(),
                },
            })
            .collect();
        Self { rules }
    }

    /// Build a table from a per-type map, checking completeness and
    /// internal consistency.
    pub fn from_map(
        mut map: BTreeMap<RecipientType, RecipientRule>,
    ) -> Result<Self, RuleTableError> {
        let mut rules = Vec::with_capacity(RecipientType::all().len());
        for &recipient_type in RecipientType::all() {
            let rule = map
                .remove(&recipient_type)
                .ok_or(RuleTableError::MissingType(recipient_type))?;
            check_consistency(recipient_type, &rule)?;
            rules.push(rule);
        }
        Ok(Self { rules })
    }

    /// Parse a YAML rule table.
    pub fn from_yaml(input: &str) -> Result<Self, RuleTableError> {
        let map: BTreeMap<RecipientType, RecipientRule> = serde_yaml::from_str(input)?;
        Self::from_map(map)
    }

    /// Load a YAML rule table from disk.
    pub fn load(path: &Path) -> Result<Self, RuleTableError> {
        let content = std::fs::read_to_string(path).map_err(|source| RuleTableError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let table = Self::from_yaml(&content)?;
        tracing::info!(path = %path.display(), "loaded recipient rule table");
        Ok(table)
    }

    /// The rule for `recipient_type`.
    pub fn rule(&self, recipient_type: RecipientType) -> &RecipientRule {
        &self.rules[recipient_type.index()]
    }

    pub fn can_have_parent(&self, recipient_type: RecipientType) -> bool {
        self.rule(recipient_type).can_have_parent
    }

    /// Whether a `child` row may point at a `parent` row.
    pub fn allows_parent(&self, child: RecipientType, parent: RecipientType) -> bool {
        self.rule(child).allows_parent(parent)
    }

    pub fn max_depth(&self, recipient_type: RecipientType) -> usize {
        self.rule(recipient_type).max_depth
    }

    /// The largest `max_depth` of any type. Bounds walks that start from a
    /// node whose own type is not yet known.
    pub fn deepest(&self) -> usize {
        self.rules.iter().map(|r| r.max_depth).max().unwrap_or(0)
    }

    /// The table as a per-type map, in [`RecipientType`] order.
    pub fn to_map(&self) -> BTreeMap<RecipientType, RecipientRule> {
        RecipientType::all()
            .iter()
            .map(|&t| (t, self.rule(t).clone()))
            .collect()
    }
}

fn check_consistency(
    recipient_type: RecipientType,
    rule: &RecipientRule,
) -> Result<(), RuleTableError> {
    let inconsistent = |reason: &str| RuleTableError::Inconsistent {
        recipient_type,
        reason: reason.to_string(),
    };
    if rule.can_have_parent {
        if rule.allowed_parent_types.is_empty() {
            return Err(inconsistent(
                "can_have_parent is true but allowed_parent_types is empty",
            ));
        }
        if rule.max_depth == 0 {
            return Err(inconsistent("can_have_parent is true but max_depth is 0"));
        }
    } else {
        if !rule.allowed_parent_types.is_empty() {
            return Err(inconsistent(
                "can_have_parent is false but allowed_parent_types is not empty",
            ));
        }
        if rule.max_depth != 0 {
            return Err(inconsistent("a type without parents must have max_depth 0"));
        }
    }
    Ok(())
}
