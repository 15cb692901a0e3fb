//! # Hierarchy Validation
//!
//! Checks a proposed recipient row against the rule table, the tenant
//! boundary, and the shape of the existing forest. Rule violations come
//! back as structured [`HierarchyViolation`]s inside a [`ValidationResult`];
//! only genuine failures (store errors, corrupt data, interrupts) are
//! returned as `Err`.
//!
//! ## Check Order
//!
//! [`HierarchyValidator::validate_recipient_hierarchy`] runs its checks in
//! a fixed order and skips the cycle and depth checks once any earlier
//! check has failed. A request with both a disallowed parent type and a
//! would-be cycle therefore reports only the type error.
//!
//! [`HierarchyValidator::validate_for_write`] adds a subtree pass once the
//! row itself is valid: rows already below it must still accept its type
//! and stay within their own depth limits at the new position.

use std::fmt;

use serde::Serialize;

use xborder_core::{
    AgreementType, ExternalOrganizationId, HierarchyType, OrganizationId, Recipient, RecipientId,
    RecipientType, ScanControl,
};
use xborder_store::RecipientStore;

use crate::error::{HierarchyError, TraversalError};
use crate::rules::RuleTable;
use crate::traversal::GraphTraversal;

// ---------------------------------------------------------------------------
// Violations and warnings
// ---------------------------------------------------------------------------

/// A blocking rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum HierarchyViolation {
    /// The type is always a root.
    ParentNotPermitted { recipient_type: RecipientType },
    ParentNotFound { parent_id: RecipientId },
    ParentTypeNotAllowed {
        recipient_type: RecipientType,
        parent_type: RecipientType,
        allowed: Vec<RecipientType>,
    },
    ParentInDifferentOrganization { parent_id: RecipientId },
    CircularReference {
        recipient_id: RecipientId,
        parent_id: RecipientId,
    },
    MaxDepthExceeded {
        recipient_type: RecipientType,
        depth: usize,
        max_depth: usize,
    },
    /// An existing child would no longer accept this row's type as parent.
    ChildTypeNotAllowed {
        child_id: RecipientId,
        child_type: RecipientType,
        parent_type: RecipientType,
    },
    /// Moving this row would push a descendant past its type's limit.
    DescendantDepthExceeded {
        descendant_id: RecipientId,
        recipient_type: RecipientType,
        depth: usize,
        max_depth: usize,
    },
    MissingExternalOrganization { recipient_type: RecipientType },
    ExternalOrganizationNotFound {
        external_organization_id: ExternalOrganizationId,
    },
    ExternalOrganizationInDifferentOrganization {
        external_organization_id: ExternalOrganizationId,
    },
}

impl fmt::Display for HierarchyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParentNotPermitted { recipient_type } => {
                write!(f, "Recipients of type {recipient_type} cannot have a parent")
            }
            Self::ParentNotFound { parent_id } => {
                write!(f, "Parent recipient {parent_id} not found")
            }
            Self::ParentTypeNotAllowed {
                recipient_type,
                parent_type,
                allowed,
            } => {
                let allowed = if allowed.is_empty() {
                    "none".to_string()
                } else {
                    allowed
                        .iter()
                        .map(|t| t.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                write!(
                    f,
                    "A {recipient_type} cannot have a {parent_type} parent. \
                     Allowed parent types: {allowed}"
                )
            }
            Self::ParentInDifferentOrganization { parent_id } => write!(
                f,
                "Parent recipient {parent_id} belongs to a different organization"
            ),
            Self::CircularReference {
                recipient_id,
                parent_id,
            } => write!(
                f,
                "Setting {parent_id} as parent of {recipient_id} would create a circular reference"
            ),
            Self::MaxDepthExceeded {
                recipient_type,
                depth,
                max_depth,
            } => write!(
                f,
                "Hierarchy depth {depth} exceeds the maximum of {max_depth} for {recipient_type}"
            ),
            Self::ChildTypeNotAllowed {
                child_id,
                child_type,
                parent_type,
            } => write!(
                f,
                "Existing child {child_id} of type {child_type} cannot have a {parent_type} parent"
            ),
            Self::DescendantDepthExceeded {
                descendant_id,
                recipient_type,
                depth,
                max_depth,
            } => write!(
                f,
                "Descendant {descendant_id} would sit at depth {depth}, \
                 exceeding the maximum of {max_depth} for {recipient_type}"
            ),
            Self::MissingExternalOrganization { recipient_type } => write!(
                f,
                "Recipients of type {recipient_type} must reference an external organization"
            ),
            Self::ExternalOrganizationNotFound {
                external_organization_id,
            } => write!(
                f,
                "External organization {external_organization_id} not found"
            ),
            Self::ExternalOrganizationInDifferentOrganization {
                external_organization_id,
            } => write!(
                f,
                "External organization {external_organization_id} belongs to \
                 a different organization"
            ),
        }
    }
}

/// A non-blocking finding. Never affects `is_valid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationWarning {
    MissingAgreement {
        recipient_type: RecipientType,
        agreement_type: AgreementType,
    },
    /// Internal departments are part of the organization itself.
    UnexpectedExternalOrganization {
        external_organization_id: ExternalOrganizationId,
    },
    /// The stored hierarchy type disagrees with the one derived from the type.
    HierarchyTypeMismatch {
        expected: Option<HierarchyType>,
        found: Option<HierarchyType>,
    },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAgreement {
                recipient_type,
                agreement_type,
            } => write!(
                f,
                "{recipient_type} recipients should have an active {agreement_type} agreement"
            ),
            Self::UnexpectedExternalOrganization {
                external_organization_id,
            } => write!(
                f,
                "Internal departments do not usually reference an external \
                 organization ({external_organization_id})"
            ),
            Self::HierarchyTypeMismatch { expected, found } => write!(
                f,
                "Stored hierarchy type {found:?} does not match derived type {expected:?}"
            ),
        }
    }
}

/// Outcome of one validation pass.
///
/// `is_valid` is false exactly when `errors` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    is_valid: bool,
    errors: Vec<HierarchyViolation>,
    warnings: Vec<ValidationWarning>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::valid()
    }
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn errors(&self) -> &[HierarchyViolation] {
        &self.errors
    }

    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }

    pub fn push_error(&mut self, violation: HierarchyViolation) {
        self.is_valid = false;
        self.errors.push(violation);
    }

    pub fn push_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Fold another result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.is_valid &= other.is_valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn into_warnings(self) -> Vec<ValidationWarning> {
        self.warnings
    }
}

/// The hierarchy a recipient type participates in, if any.
pub fn hierarchy_type_for_recipient(recipient_type: RecipientType) -> Option<HierarchyType> {
    match recipient_type {
        RecipientType::SubProcessor => Some(HierarchyType::ProcessorChain),
        RecipientType::InternalDepartment => Some(HierarchyType::Organizational),
        RecipientType::Processor
        | RecipientType::JointController
        | RecipientType::ServiceProvider
        | RecipientType::SeparateController
        | RecipientType::PublicAuthority => None,
    }
}

// ---------------------------------------------------------------------------
// Audit records
// ---------------------------------------------------------------------------

/// Result of re-validating one stored recipient.
#[derive(Debug, Clone, Serialize)]
pub struct RecipientAudit {
    pub recipient_id: RecipientId,
    pub name: String,
    pub recipient_type: RecipientType,
    #[serde(flatten)]
    pub outcome: AuditOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditOutcome {
    Checked { result: ValidationResult },
    /// The stored graph around this recipient is corrupt or crosses tenants.
    Unverifiable { reason: String },
}

// ---------------------------------------------------------------------------
// HierarchyValidator
// ---------------------------------------------------------------------------

/// Validates recipient rows against a [`RuleTable`] and the stored forest.
pub struct HierarchyValidator<'a, S: ?Sized> {
    store: &'a S,
    rules: &'a RuleTable,
    control: ScanControl,
}

impl<'a, S: RecipientStore + ?Sized> HierarchyValidator<'a, S> {
    pub fn new(store: &'a S, rules: &'a RuleTable) -> Self {
        Self {
            store,
            rules,
            control: ScanControl::new(),
        }
    }

    pub fn with_control(mut self, control: ScanControl) -> Self {
        self.control = control;
        self
    }

    pub fn rules(&self) -> &RuleTable {
        self.rules
    }

    fn traversal(&self) -> GraphTraversal<'a, S> {
        GraphTraversal::new(self.store, self.rules).with_control(self.control.clone())
    }

    /// Validate assigning `parent` to recipient `id` of `recipient_type`.
    ///
    /// Checks, in order:
    /// 1. the type may have a parent at all;
    /// 2. the parent exists (stops here if not);
    /// 3. the parent's type is allowed for this type;
    /// 4. the parent belongs to `organization`;
    /// 5. no cycle would be created (only if 1–4 passed);
    /// 6. the new depth stays within the type's limit (only if 1–5 passed).
    pub async fn validate_recipient_hierarchy(
        &self,
        id: &RecipientId,
        recipient_type: RecipientType,
        parent: Option<&RecipientId>,
        organization: &OrganizationId,
    ) -> Result<ValidationResult, HierarchyError> {
        let mut result = ValidationResult::valid();
        let Some(parent_id) = parent else {
            return Ok(result);
        };
        let rule = self.rules.rule(recipient_type);

        if !rule.can_have_parent {
            result.push_error(HierarchyViolation::ParentNotPermitted { recipient_type });
        }

        self.control.checkpoint().map_err(TraversalError::from)?;
        let Some(parent_row) = self.store.get_recipient(parent_id).await? else {
            result.push_error(HierarchyViolation::ParentNotFound {
                parent_id: parent_id.clone(),
            });
            return Ok(result);
        };

        if !self.rules.allows_parent(recipient_type, parent_row.recipient_type) {
            result.push_error(HierarchyViolation::ParentTypeNotAllowed {
                recipient_type,
                parent_type: parent_row.recipient_type,
                allowed: rule.allowed_parent_types.iter().copied().collect(),
            });
        }

        if &parent_row.organization_id != organization {
            result.push_error(HierarchyViolation::ParentInDifferentOrganization {
                parent_id: parent_id.clone(),
            });
        }

        if !result.is_valid() {
            tracing::debug!(
                recipient_id = %id,
                errors = result.errors().len(),
                "skipping cycle and depth checks after earlier violations"
            );
            return Ok(result);
        }

        let walker = self.traversal();
        if walker
            .has_circular_reference(id, parent_id, organization)
            .await?
        {
            result.push_error(HierarchyViolation::CircularReference {
                recipient_id: id.clone(),
                parent_id: parent_id.clone(),
            });
            return Ok(result);
        }

        let depth = walker.hierarchy_depth(parent_id, organization).await? + 1;
        if depth > rule.max_depth {
            result.push_error(HierarchyViolation::MaxDepthExceeded {
                recipient_type,
                depth,
                max_depth: rule.max_depth,
            });
        }

        Ok(result)
    }

    /// Check the row's own fields. Performs no I/O.
    pub fn validate_recipient_data(
        &self,
        recipient_type: RecipientType,
        external_organization: Option<&ExternalOrganizationId>,
    ) -> ValidationResult {
        let mut result = ValidationResult::valid();
        let rule = self.rules.rule(recipient_type);

        match external_organization {
            None if rule.requires_external_organization => {
                result.push_error(HierarchyViolation::MissingExternalOrganization {
                    recipient_type,
                });
            }
            Some(external) if recipient_type == RecipientType::InternalDepartment => {
                result.push_warning(ValidationWarning::UnexpectedExternalOrganization {
                    external_organization_id: external.clone(),
                });
            }
            _ => {}
        }
        result
    }

    /// Warn about every required agreement the recipient's external
    /// organization lacks an active instance of. Never blocks.
    pub async fn validate_required_agreements(
        &self,
        id: &RecipientId,
        organization: &OrganizationId,
    ) -> Result<ValidationResult, HierarchyError> {
        self.control.checkpoint().map_err(TraversalError::from)?;
        let recipient = self
            .store
            .get_recipient(id)
            .await?
            .filter(|r| &r.organization_id == organization)
            .ok_or_else(|| HierarchyError::RecipientNotFound {
                recipient: id.clone(),
                organization: organization.clone(),
            })?;
        self.agreement_warnings(
            recipient.recipient_type,
            recipient.external_organization_id.as_ref(),
        )
        .await
    }

    /// Agreement warnings for a row that may not be stored yet.
    pub async fn agreement_warnings(
        &self,
        recipient_type: RecipientType,
        external_organization: Option<&ExternalOrganizationId>,
    ) -> Result<ValidationResult, HierarchyError> {
        let mut result = ValidationResult::valid();
        let required = &self.rules.rule(recipient_type).required_agreements;
        if required.is_empty() {
            return Ok(result);
        }

        let active = match external_organization {
            Some(external) => {
                self.control.checkpoint().map_err(TraversalError::from)?;
                self.store.list_active_agreements(external).await?
            }
            None => Vec::new(),
        };

        for &agreement_type in required {
            if !active.iter().any(|a| a.agreement_type == agreement_type) {
                result.push_warning(ValidationWarning::MissingAgreement {
                    recipient_type,
                    agreement_type,
                });
            }
        }
        Ok(result)
    }

    /// Reject references from `organization`'s recipients to an external
    /// organization that does not exist or belongs to another tenant.
    pub async fn validate_tenant_ownership(
        &self,
        organization: &OrganizationId,
        external_organization: &ExternalOrganizationId,
    ) -> Result<ValidationResult, HierarchyError> {
        let mut result = ValidationResult::valid();
        self.control.checkpoint().map_err(TraversalError::from)?;
        match self
            .store
            .get_external_organization(external_organization)
            .await?
        {
            None => result.push_error(HierarchyViolation::ExternalOrganizationNotFound {
                external_organization_id: external_organization.clone(),
            }),
            Some(external) if &external.organization_id != organization => {
                tracing::warn!(
                    organization_id = %organization,
                    external_organization_id = %external_organization,
                    "rejected cross-tenant external organization reference"
                );
                result.push_error(
                    HierarchyViolation::ExternalOrganizationInDifferentOrganization {
                        external_organization_id: external_organization.clone(),
                    },
                );
            }
            Some(_) => {}
        }
        Ok(result)
    }

    /// Every check a write of `recipient` must pass, merged into one result.
    pub async fn validate_for_write(
        &self,
        recipient: &Recipient,
    ) -> Result<ValidationResult, HierarchyError> {
        let mut result = self.validate_recipient_data(
            recipient.recipient_type,
            recipient.external_organization_id.as_ref(),
        );
        if let Some(external) = &recipient.external_organization_id {
            result.merge(
                self.validate_tenant_ownership(&recipient.organization_id, external)
                    .await?,
            );
        }
        result.merge(
            self.validate_recipient_hierarchy(
                &recipient.id,
                recipient.recipient_type,
                recipient.parent_recipient_id.as_ref(),
                &recipient.organization_id,
            )
            .await?,
        );
        if result.is_valid() {
            let depth = match &recipient.parent_recipient_id {
                Some(parent) => {
                    self.traversal()
                        .hierarchy_depth(parent, &recipient.organization_id)
                        .await?
                        + 1
                }
                None => 0,
            };
            result.merge(
                self.validate_subtree(
                    &recipient.id,
                    recipient.recipient_type,
                    depth,
                    &recipient.organization_id,
                )
                .await?,
            );
        }
        Ok(result)
    }

    /// Check that the rows already below `id` stay valid once `id` has type
    /// `recipient_type` and sits at `depth`: every direct child must accept
    /// the type as a parent, and no descendant may exceed its own limit.
    pub async fn validate_subtree(
        &self,
        id: &RecipientId,
        recipient_type: RecipientType,
        depth: usize,
        organization: &OrganizationId,
    ) -> Result<ValidationResult, HierarchyError> {
        let mut result = ValidationResult::valid();
        for (descendant, offset) in self.traversal().descendants(id, organization).await? {
            if offset == 1 && !self.rules.allows_parent(descendant.recipient_type, recipient_type) {
                result.push_error(HierarchyViolation::ChildTypeNotAllowed {
                    child_id: descendant.id.clone(),
                    child_type: descendant.recipient_type,
                    parent_type: recipient_type,
                });
            }
            let max_depth = self.rules.max_depth(descendant.recipient_type);
            if depth + offset > max_depth {
                result.push_error(HierarchyViolation::DescendantDepthExceeded {
                    descendant_id: descendant.id,
                    recipient_type: descendant.recipient_type,
                    depth: depth + offset,
                    max_depth,
                });
            }
        }
        Ok(result)
    }

    /// Re-validate every stored recipient of `organization`.
    ///
    /// Recipients whose surrounding graph is corrupt or crosses tenants are
    /// reported as [`AuditOutcome::Unverifiable`]; store failures and
    /// interrupts abort the audit.
    pub async fn audit_organization(
        &self,
        organization: &OrganizationId,
    ) -> Result<Vec<RecipientAudit>, HierarchyError> {
        self.control.checkpoint().map_err(TraversalError::from)?;
        let recipients = self.store.list_recipients(organization).await?;
        let mut audits = Vec::with_capacity(recipients.len());

        for recipient in recipients {
            let outcome = match self.audit_one(&recipient).await {
                Ok(result) => AuditOutcome::Checked { result },
                Err(HierarchyError::Traversal(
                    err @ (TraversalError::CorruptHierarchy { .. }
                    | TraversalError::CrossTenant { .. }
                    | TraversalError::RecipientNotFound(_)),
                )) => AuditOutcome::Unverifiable {
                    reason: err.to_string(),
                },
                Err(other) => return Err(other),
            };
            audits.push(RecipientAudit {
                recipient_id: recipient.id,
                name: recipient.name,
                recipient_type: recipient.recipient_type,
                outcome,
            });
        }

        tracing::info!(
            organization_id = %organization,
            recipients = audits.len(),
            "completed hierarchy audit"
        );
        Ok(audits)
    }

    async fn audit_one(&self, recipient: &Recipient) -> Result<ValidationResult, HierarchyError> {
        let mut result = self.validate_for_write(recipient).await?;
        let expected = hierarchy_type_for_recipient(recipient.recipient_type);
        if recipient.hierarchy_type != expected {
            result.push_warning(ValidationWarning::HierarchyTypeMismatch {
                expected,
                found: recipient.hierarchy_type,
            });
        }
        result.merge(
            self.agreement_warnings(
                recipient.recipient_type,
                recipient.external_organization_id.as_ref(),
            )
            .await?,
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xborder_core::{Agreement, AgreementId, AgreementStatus, ExternalOrganization};
    use xborder_store::InMemoryStore;

    struct Fixture {
        store: InMemoryStore,
        rules: RuleTable,
        org: OrganizationId,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: InMemoryStore::new(),
                rules: RuleTable::gdpr_default(),
                org: OrganizationId::new(),
            }
        }

        fn validator(&self) -> HierarchyValidator<'_, InMemoryStore> {
            HierarchyValidator::new(&self.store, &self.rules)
        }

        fn add(&self, t: RecipientType, parent: Option<&Recipient>) -> Recipient {
            let mut r = Recipient::new(self.org.clone(), format!("{t}"), t);
            r.parent_recipient_id = parent.map(|p| p.id.clone());
            self.store.insert_recipient(r.clone());
            r
        }
    }

    #[tokio::test]
    async fn root_without_parent_is_valid() {
        let fx = Fixture::new();
        let result = fx
            .validator()
            .validate_recipient_hierarchy(
                &RecipientId::new(),
                RecipientType::Processor,
                None,
                &fx.org,
            )
            .await
            .unwrap();
        assert!(result.is_valid());
    }

    #[tokio::test]
    async fn sub_processor_chain_accepted() {
        let fx = Fixture::new();
        let a = fx.add(RecipientType::Processor, None);
        let b = fx.add(RecipientType::SubProcessor, Some(&a));
        let c_id = RecipientId::new();
        let result = fx
            .validator()
            .validate_recipient_hierarchy(&c_id, RecipientType::SubProcessor, Some(&b.id), &fx.org)
            .await
            .unwrap();
        assert!(result.is_valid(), "{:?}", result.errors());
    }

    #[tokio::test]
    async fn root_type_with_parent_reports_type_errors_only() {
        let fx = Fixture::new();
        let a = fx.add(RecipientType::Processor, None);
        let b = fx.add(RecipientType::SubProcessor, Some(&a));
        let c = fx.add(RecipientType::SubProcessor, Some(&b));

        let result = fx
            .validator()
            .validate_recipient_hierarchy(&a.id, RecipientType::Processor, Some(&c.id), &fx.org)
            .await
            .unwrap();
        assert!(!result.is_valid());
        assert!(matches!(
            result.errors()[0],
            HierarchyViolation::ParentNotPermitted { .. }
        ));
        assert!(matches!(
            result.errors()[1],
            HierarchyViolation::ParentTypeNotAllowed { .. }
        ));
        assert!(
            !result
                .errors()
                .iter()
                .any(|e| matches!(e, HierarchyViolation::CircularReference { .. })),
            "cycle check must be skipped once earlier checks fail"
        );
    }

    #[tokio::test]
    async fn loop_between_sub_processors_rejected() {
        let fx = Fixture::new();
        let a = fx.add(RecipientType::Processor, None);
        let b = fx.add(RecipientType::SubProcessor, Some(&a));
        let c = fx.add(RecipientType::SubProcessor, Some(&b));

        let result = fx
            .validator()
            .validate_recipient_hierarchy(&b.id, RecipientType::SubProcessor, Some(&c.id), &fx.org)
            .await
            .unwrap();
        assert_eq!(
            result.errors(),
            &[HierarchyViolation::CircularReference {
                recipient_id: b.id.clone(),
                parent_id: c.id.clone(),
            }]
        );
    }

    #[tokio::test]
    async fn missing_parent_reported() {
        let fx = Fixture::new();
        let ghost = RecipientId::new();
        let result = fx
            .validator()
            .validate_recipient_hierarchy(
                &RecipientId::new(),
                RecipientType::SubProcessor,
                Some(&ghost),
                &fx.org,
            )
            .await
            .unwrap();
        assert_eq!(
            result.errors(),
            &[HierarchyViolation::ParentNotFound { parent_id: ghost }]
        );
        assert!(result.errors()[0].to_string().contains("not found"));
    }

    #[tokio::test]
    async fn parent_in_other_organization_reported() {
        let fx = Fixture::new();
        let foreign = Recipient::new(OrganizationId::new(), "foreign", RecipientType::Processor);
        fx.store.insert_recipient(foreign.clone());

        let result = fx
            .validator()
            .validate_recipient_hierarchy(
                &RecipientId::new(),
                RecipientType::SubProcessor,
                Some(&foreign.id),
                &fx.org,
            )
            .await
            .unwrap();
        assert_eq!(result.errors().len(), 1);
        assert!(result.errors()[0]
            .to_string()
            .contains("different organization"));
    }

    #[tokio::test]
    async fn disallowed_parent_type_names_allowed_set() {
        let fx = Fixture::new();
        let dept = fx.add(RecipientType::InternalDepartment, None);
        let result = fx
            .validator()
            .validate_recipient_hierarchy(
                &RecipientId::new(),
                RecipientType::SubProcessor,
                Some(&dept.id),
                &fx.org,
            )
            .await
            .unwrap();
        let message = result.errors()[0].to_string();
        assert!(message.contains("PROCESSOR, SUB_PROCESSOR"), "{message}");
    }

    #[tokio::test]
    async fn sub_processor_depth_limit() {
        let fx = Fixture::new();
        let mut parent = fx.add(RecipientType::Processor, None);
        for _ in 0..4 {
            parent = fx.add(RecipientType::SubProcessor, Some(&parent));
        }
        // `parent` is now at depth 4; a child lands at depth 5.
        let v = fx.validator();
        let fifth = v
            .validate_recipient_hierarchy(
                &RecipientId::new(),
                RecipientType::SubProcessor,
                Some(&parent.id),
                &fx.org,
            )
            .await
            .unwrap();
        assert!(fifth.is_valid());

        let level5 = fx.add(RecipientType::SubProcessor, Some(&parent));
        let sixth = v
            .validate_recipient_hierarchy(
                &RecipientId::new(),
                RecipientType::SubProcessor,
                Some(&level5.id),
                &fx.org,
            )
            .await
            .unwrap();
        assert_eq!(
            sixth.errors(),
            &[HierarchyViolation::MaxDepthExceeded {
                recipient_type: RecipientType::SubProcessor,
                depth: 6,
                max_depth: 5,
            }]
        );
    }

    #[tokio::test]
    async fn moving_a_subtree_checks_descendant_depth() {
        let fx = Fixture::new();
        let mut deep = fx.add(RecipientType::InternalDepartment, None);
        for _ in 0..9 {
            deep = fx.add(RecipientType::InternalDepartment, Some(&deep));
        }
        // A separate two-level tree: top <- child.
        let top = fx.add(RecipientType::InternalDepartment, None);
        let child = fx.add(RecipientType::InternalDepartment, Some(&top));

        // `deep` is at depth 9, so top lands at 10 and child at 11.
        let moved = top.clone().with_parent(deep.id.clone());
        let result = fx.validator().validate_for_write(&moved).await.unwrap();
        assert_eq!(
            result.errors(),
            &[HierarchyViolation::DescendantDepthExceeded {
                descendant_id: child.id.clone(),
                recipient_type: RecipientType::InternalDepartment,
                depth: 11,
                max_depth: 10,
            }]
        );
    }

    #[tokio::test]
    async fn type_change_must_keep_children_valid() {
        let fx = Fixture::new();
        let external = ExternalOrganization {
            id: ExternalOrganizationId::new(),
            organization_id: fx.org.clone(),
            name: "Vendor".into(),
        };
        fx.store.insert_external_organization(external.clone());
        let dept = fx.add(RecipientType::InternalDepartment, None);
        fx.add(RecipientType::InternalDepartment, Some(&dept));

        let mut retyped = dept.clone();
        retyped.recipient_type = RecipientType::Processor;
        retyped.external_organization_id = Some(external.id);
        let result = fx.validator().validate_for_write(&retyped).await.unwrap();
        assert!(matches!(
            result.errors(),
            [HierarchyViolation::ChildTypeNotAllowed { .. }]
        ));
    }

    #[test]
    fn data_validation_requires_external_org() {
        let fx = Fixture::new();
        let v = fx.validator();
        let missing = v.validate_recipient_data(RecipientType::Processor, None);
        assert!(!missing.is_valid());

        let present = v.validate_recipient_data(
            RecipientType::Processor,
            Some(&ExternalOrganizationId::new()),
        );
        assert!(present.is_valid());

        let dept = v.validate_recipient_data(RecipientType::InternalDepartment, None);
        assert!(dept.is_valid());
        assert!(dept.warnings().is_empty());
    }

    #[test]
    fn internal_department_with_external_org_warns() {
        let fx = Fixture::new();
        let result = fx.validator().validate_recipient_data(
            RecipientType::InternalDepartment,
            Some(&ExternalOrganizationId::new()),
        );
        assert!(result.is_valid());
        assert_eq!(result.warnings().len(), 1);
    }

    #[tokio::test]
    async fn missing_dpa_is_a_warning() {
        let fx = Fixture::new();
        let ext = ExternalOrganization {
            id: ExternalOrganizationId::new(),
            organization_id: fx.org.clone(),
            name: "CloudCo".into(),
        };
        fx.store.insert_external_organization(ext.clone());
        let mut processor = Recipient::new(fx.org.clone(), "CloudCo", RecipientType::Processor);
        processor.external_organization_id = Some(ext.id.clone());
        fx.store.insert_recipient(processor.clone());

        let v = fx.validator();
        let before = v
            .validate_required_agreements(&processor.id, &fx.org)
            .await
            .unwrap();
        assert!(before.is_valid());
        assert_eq!(
            before.warnings(),
            &[ValidationWarning::MissingAgreement {
                recipient_type: RecipientType::Processor,
                agreement_type: AgreementType::Dpa,
            }]
        );

        fx.store.insert_agreement(Agreement {
            id: AgreementId::new(),
            external_organization_id: ext.id.clone(),
            agreement_type: AgreementType::Dpa,
            status: AgreementStatus::Active,
        });
        let after = v
            .validate_required_agreements(&processor.id, &fx.org)
            .await
            .unwrap();
        assert!(after.warnings().is_empty());
    }

    #[tokio::test]
    async fn agreements_of_foreign_recipient_not_disclosed() {
        let fx = Fixture::new();
        let foreign = Recipient::new(OrganizationId::new(), "x", RecipientType::Processor);
        fx.store.insert_recipient(foreign.clone());
        let err = fx
            .validator()
            .validate_required_agreements(&foreign.id, &fx.org)
            .await
            .unwrap_err();
        assert!(matches!(err, HierarchyError::RecipientNotFound { .. }));
    }

    #[tokio::test]
    async fn tenant_ownership_rejects_foreign_external_org() {
        let fx = Fixture::new();
        let foreign = ExternalOrganization {
            id: ExternalOrganizationId::new(),
            organization_id: OrganizationId::new(),
            name: "Elsewhere Ltd".into(),
        };
        fx.store.insert_external_organization(foreign.clone());

        let v = fx.validator();
        let result = v.validate_tenant_ownership(&fx.org, &foreign.id).await.unwrap();
        assert!(matches!(
            result.errors(),
            [HierarchyViolation::ExternalOrganizationInDifferentOrganization { .. }]
        ));

        let missing = v
            .validate_tenant_ownership(&fx.org, &ExternalOrganizationId::new())
            .await
            .unwrap();
        assert!(matches!(
            missing.errors(),
            [HierarchyViolation::ExternalOrganizationNotFound { .. }]
        ));
    }

    #[test]
    fn hierarchy_types_derived_from_recipient_type() {
        assert_eq!(
            hierarchy_type_for_recipient(RecipientType::SubProcessor),
            Some(HierarchyType::ProcessorChain)
        );
        assert_eq!(
            hierarchy_type_for_recipient(RecipientType::InternalDepartment),
            Some(HierarchyType::Organizational)
        );
        assert_eq!(hierarchy_type_for_recipient(RecipientType::Processor), None);
    }

    #[tokio::test]
    async fn audit_flags_corrupt_rows() {
        let fx = Fixture::new();
        let ok = fx.add(RecipientType::InternalDepartment, None);
        let mut a = Recipient::new(fx.org.clone(), "a", RecipientType::InternalDepartment);
        let mut b = Recipient::new(fx.org.clone(), "b", RecipientType::InternalDepartment);
        a.parent_recipient_id = Some(b.id.clone());
        b.parent_recipient_id = Some(a.id.clone());
        fx.store.insert_recipient(a.clone());
        fx.store.insert_recipient(b);

        let audits = fx.validator().audit_organization(&fx.org).await.unwrap();
        assert_eq!(audits.len(), 3);
        let of = |id: &RecipientId| audits.iter().find(|a| &a.recipient_id == id).unwrap();

        match &of(&ok.id).outcome {
            AuditOutcome::Checked { result } => {
                assert!(result.is_valid());
                // Seeded without a stamped hierarchy type.
                assert!(matches!(
                    result.warnings(),
                    [ValidationWarning::HierarchyTypeMismatch { .. }]
                ));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        match &of(&a.id).outcome {
            AuditOutcome::Checked { result } => assert!(result
                .errors()
                .iter()
                .any(|e| matches!(e, HierarchyViolation::CircularReference { .. }))),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn result_serializes_with_codes() {
        let mut result = ValidationResult::valid();
        result.push_error(HierarchyViolation::ParentNotPermitted {
            recipient_type: RecipientType::Processor,
        });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["is_valid"], false);
        assert_eq!(json["errors"][0]["code"], "parent_not_permitted");
    }
}
