use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::selector::ElementKind;

/// Coarse failure taxonomy surfaced to callers alongside every failed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Malformed action input, rejected before any UI mutation.
    Validation,
    /// The target could not be located in the UI tree.
    Resolution,
    /// The target was found but cannot be acted upon.
    Primitive,
    /// The action ran but the expected change was not observed.
    Verification,
    /// A required capability is missing from the current environment.
    Environment,
}

#[derive(Error, Debug, Clone)]
pub enum ActionError {
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Element not found: no {kind} matching \"{target}\"")]
    ElementNotFound {
        target: String,
        kind: ElementKind,
        suggestion: String,
    },

    #[error("Wrong element: \"{target}\" is {found}, not a {expected}")]
    WrongElementKind {
        target: String,
        expected: ElementKind,
        found: String,
    },

    #[error("Element is not enabled: {0}")]
    ElementNotEnabled(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Option not found: {0}")]
    OptionNotFound(String),

    #[error("Verification failed: {reason}")]
    VerificationFailed {
        reason: String,
        suggestion: Option<String>,
    },

    #[error("Environment unavailable: {0}")]
    EnvironmentUnavailable(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ActionError {
    pub fn not_found(target: &str, kind: ElementKind) -> Self {
        ActionError::ElementNotFound {
            target: target.to_string(),
            kind,
            suggestion: format!(
                "I couldn't find a {kind} called \"{target}\". Try the label shown on screen."
            ),
        }
    }

    pub fn class(&self) -> FailureClass {
        match self {
            ActionError::InvalidAction(_) => FailureClass::Validation,
            ActionError::ElementNotFound { .. } => FailureClass::Resolution,
            ActionError::WrongElementKind { .. }
            | ActionError::ElementNotEnabled(_)
            | ActionError::UnsupportedOperation(_)
            | ActionError::OptionNotFound(_)
            | ActionError::PlatformError(_)
            | ActionError::Internal(_) => FailureClass::Primitive,
            ActionError::VerificationFailed { .. } => FailureClass::Verification,
            ActionError::EnvironmentUnavailable(_) => FailureClass::Environment,
        }
    }

    /// Whether a caller may reasonably try again (possibly with a different target).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.class(),
            FailureClass::Resolution | FailureClass::Primitive
        )
    }

    pub fn suggestion(&self) -> Option<String> {
        match self {
            ActionError::ElementNotFound { suggestion, .. } => Some(suggestion.clone()),
            ActionError::VerificationFailed { suggestion, .. } => suggestion.clone(),
            ActionError::WrongElementKind {
                target, expected, ..
            } => Some(format!(
                "\"{target}\" is not a {expected}. Say the {expected} name shown on screen."
            )),
            ActionError::ElementNotEnabled(what) => {
                Some(format!("{what} is disabled right now. Complete the required fields first."))
            }
            ActionError::OptionNotFound(_) => {
                Some("Say the option as it appears in the list, or its position.".to_string())
            }
            _ => None,
        }
    }
}
