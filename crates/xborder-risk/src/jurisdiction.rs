//! # Jurisdiction Classification
//!
//! Predicates over [`Country`] tags. A country is in the EU/EEA bloc if it
//! carries `EU` or `EEA`, in the adequacy bloc if it carries `Adequate`,
//! and a third country if it carries none of the three. An explicit
//! `Third Country` tag is informational only.

use xborder_core::{Country, JurisdictionTag};

const EU_EEA: &[JurisdictionTag] = &[JurisdictionTag::Eu, JurisdictionTag::Eea];

/// Tags that lift a country out of third-country status.
const PROTECTED: &[JurisdictionTag] = &[
    JurisdictionTag::Eu,
    JurisdictionTag::Eea,
    JurisdictionTag::Adequate,
];

/// Both countries sit in the EU/EEA bloc, or both carry an adequacy decision.
pub fn is_same_jurisdiction(a: &Country, b: &Country) -> bool {
    (a.has_any(EU_EEA) && b.has_any(EU_EEA))
        || (a.has_tag(JurisdictionTag::Adequate) && b.has_tag(JurisdictionTag::Adequate))
}

/// The country carries none of `EU`, `EEA` or `Adequate`.
pub fn is_third_country(country: &Country) -> bool {
    !country.has_any(PROTECTED)
}

/// A transfer out of the EU/EEA into a third country needs an Article 46
/// safeguard.
pub fn requires_safeguards(origin: &Country, destination: &Country) -> bool {
    origin.has_any(EU_EEA) && is_third_country(destination)
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn eu_and_eea_members_share_a_jurisdiction() {
        assert!(is_same_jurisdiction(&france(), &germany()));
        assert!(is_same_jurisdiction(&germany(), &norway()));
    }

    #[test]
    fn adequacy_countries_share_a_jurisdiction() {
        assert!(is_same_jurisdiction(&japan(), &switzerland()));
        assert!(!is_same_jurisdiction(&france(), &japan()));
    }

    #[test]
    fn third_country_status() {
        assert!(is_third_country(&united_states()));
        assert!(is_third_country(&untagged()));
        assert!(!is_third_country(&japan()));
        assert!(!is_third_country(&norway()));
    }

    #[test]
    fn safeguards_only_for_exports_out_of_the_bloc() {
        assert!(requires_safeguards(&france(), &united_states()));
        assert!(requires_safeguards(&norway(), &untagged()));
        assert!(!requires_safeguards(&france(), &japan()));
        assert!(!requires_safeguards(&united_states(), &france()));
        assert!(!requires_safeguards(&japan(), &united_states()));
    }
}
