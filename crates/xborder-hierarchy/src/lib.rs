//! # xborder-hierarchy — Recipient Hierarchy Integrity
//!
//! Keeps every organization's recipient forest acyclic, type-consistent,
//! depth-bounded, and confined to its tenant.
//!
//! - [`rules`]: the injectable [`RuleTable`] of per-type structural rules.
//! - [`traversal`]: bounded, tenant-scoped walks over parent links.
//! - [`validator`]: the ordered hierarchy checks plus data, agreement and
//!   tenant-ownership checks, and whole-organization audits.
//! - [`writer`]: the validate-then-commit path, serialized per organization.

pub mod error;
pub mod rules;
pub mod traversal;
pub mod validator;
pub mod writer;

pub use error::{HierarchyError, RuleTableError, TraversalError};
pub use rules::{RecipientRule, RuleTable};
pub use traversal::GraphTraversal;
pub use validator::{
    hierarchy_type_for_recipient, AuditOutcome, HierarchyValidator, HierarchyViolation,
    RecipientAudit, ValidationResult, ValidationWarning,
};
pub use writer::{RecipientWriter, WriteOutcome};
