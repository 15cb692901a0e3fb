//! # Countries, Jurisdiction Tags & Transfer Mechanisms
//!
//! Global, read-only reference data. A [`Country`] carries a set of
//! [`JurisdictionTag`]s describing its standing under data-protection law.
//! Classification of two countries against each other lives in
//! `xborder-risk`; this module only answers "does this country carry tag X".

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::{CountryId, TransferMechanismId};

/// Legal-status tags a country may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JurisdictionTag {
    /// European Union member state.
    #[serde(rename = "EU")]
    Eu,
    /// European Economic Area member.
    #[serde(rename = "EEA")]
    Eea,
    /// Covered by an adequacy decision.
    #[serde(rename = "Adequate")]
    Adequate,
    /// Explicitly marked as a third country.
    #[serde(rename = "Third Country")]
    ThirdCountry,
}

impl JurisdictionTag {
    /// The canonical wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eu => "EU",
            Self::Eea => "EEA",
            Self::Adequate => "Adequate",
            Self::ThirdCountry => "Third Country",
        }
    }
}

impl fmt::Display for JurisdictionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JurisdictionTag {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', '-'], " ").as_str() {
            "eu" => Ok(Self::Eu),
            "eea" => Ok(Self::Eea),
            "adequate" => Ok(Self::Adequate),
            "third country" => Ok(Self::ThirdCountry),
            _ => Err(ValidationError::UnknownJurisdictionTag(s.to_string())),
        }
    }
}

/// ISO 3166-1 alpha-2 country code, normalized to upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CountryCode(String);

impl<'de> Deserialize<'de> for CountryCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

impl CountryCode {
    /// Validate and normalize a two-letter code.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCountryCode`] unless the trimmed
    /// input is exactly two ASCII letters.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.len() != 2 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidCountryCode(raw));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A country and its jurisdiction tags. Immutable reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub id: CountryId,
    pub code: CountryCode,
    pub name: String,
    #[serde(default)]
    pub tags: BTreeSet<JurisdictionTag>,
}

impl Country {
    /// Build a country with a fresh id.
    pub fn new(
        code: CountryCode,
        name: impl Into<String>,
        tags: impl IntoIterator<Item = JurisdictionTag>,
    ) -> Self {
        Self {
            id: CountryId::new(),
            code,
            name: name.into(),
            tags: tags.into_iter().collect(),
        }
    }

    /// Whether the country carries `tag`.
    pub fn has_tag(&self, tag: JurisdictionTag) -> bool {
        self.tags.contains(&tag)
    }

    /// Whether the country carries at least one of `tags`.
    pub fn has_any(&self, tags: &[JurisdictionTag]) -> bool {
        tags.iter().any(|t| self.tags.contains(t))
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}

/// A legal safeguard permitting transfer to a third country, e.g. SCCs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMechanism {
    pub id: TransferMechanismId,
    pub code: String,
    pub name: String,
}

impl TransferMechanism {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: TransferMechanismId::new(),
            code: code.into(),
            name: name.into(),
        }
    }
}
