use thiserror::Error;

use xborder_core::CountryCode;

/// Risk derivation failed to classify a transfer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RiskError {
    /// No classification rule matched, e.g. a transfer from a third country
    /// into the EU. Reported instead of defaulting to no risk.
    #[error("transfer from {origin} to {destination} matches no classification rule")]
    UnclassifiedTransfer {
        origin: CountryCode,
        destination: CountryCode,
    },
}
