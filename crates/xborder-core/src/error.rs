//! # Error Types
//!
//! Parsing and construction errors for the core data model. Domain-rule
//! violations are not errors at this layer; they are reported as structured
//! validation results by `xborder-hierarchy`.

use thiserror::Error;

/// A value could not be turned into a core domain type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Recipient type name is not one of the seven known variants.
    #[error("unknown recipient type: \"{0}\"")]
    UnknownRecipientType(String),

    /// Agreement type name is not recognized.
    #[error("unknown agreement type: \"{0}\"")]
    UnknownAgreementType(String),

    /// Country code is not a two-letter ISO 3166-1 alpha-2 code.
    #[error("invalid country code: \"{0}\" (expected ISO 3166-1 alpha-2, e.g. \"FR\")")]
    InvalidCountryCode(String),

    /// Jurisdiction tag name is not recognized.
    #[error("unknown jurisdiction tag: \"{0}\" (expected EU, EEA, Adequate or Third Country)")]
    UnknownJurisdictionTag(String),
}
