// ── Core error types ──
//
// `OnboardError` is what callers of the reconciler see. Store failures
// are carried through untranslated in the `Store` variant so callers can
// tell "the inventory said no" apart from "onboarding cannot proceed".

use strum::Display;
use thiserror::Error;

use crate::model::RecordKind;

/// Coarse failure classification reported alongside an onboarding error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum FailReason {
    /// A required record is missing and may not be created, or the
    /// inventory contradicts the discovered facts.
    FailConfig,
    /// Ambiguous matches, missing statuses, invalid values.
    FailGeneral,
    /// The inventory store itself failed.
    FailStore,
}

/// Unified error type for a reconciliation run.
#[derive(Debug, Error)]
pub enum OnboardError {
    #[error("{message}")]
    Config { message: String },

    #[error("{message}")]
    General { message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OnboardError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn general(message: impl Into<String>) -> Self {
        Self::General {
            message: message.into(),
        }
    }

    pub fn reason(&self) -> FailReason {
        match self {
            Self::Config { .. } => FailReason::FailConfig,
            Self::General { .. } => FailReason::FailGeneral,
            Self::Store(_) => FailReason::FailStore,
        }
    }
}

// ── Store errors ─────────────────────────────────────────────────────

/// Errors raised by an [`InventoryStore`](crate::store::InventoryStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    /// A create lost the race for a unique key.
    #[error("{kind} already exists: {key}")]
    Conflict { kind: RecordKind, key: String },

    /// A write would break referential integrity.
    #[error("integrity error: {message}")]
    Integrity { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_display_matches_wire_names() {
        assert_eq!(OnboardError::config("x").reason().to_string(), "fail-config");
        assert_eq!(OnboardError::general("x").reason().to_string(), "fail-general");
    }

    #[test]
    fn store_error_keeps_its_message() {
        let err = OnboardError::from(StoreError::Conflict {
            kind: RecordKind::Manufacturer,
            key: "cisco".into(),
        });
        assert_eq!(err.reason(), FailReason::FailStore);
        assert_eq!(err.to_string(), "manufacturer already exists: cisco");
    }
}
