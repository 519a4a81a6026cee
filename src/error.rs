use thiserror::Error;

use crate::models::Cursor;

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised synchronously by the engine. A failed operation leaves the
/// session exactly as it was.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Operation not legal in the current session or timer state.
    #[error("invalid state: cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    /// Cursor does not reference an existing exercise/set.
    #[error("invalid cursor {cursor:?}: {reason}")]
    InvalidCursor {
        cursor: Option<Cursor>,
        reason: String,
    },

    /// Reported values are outside their domain.
    #[error("validation failed for `{field}`: {reason}")]
    Validation {
        field: &'static str,
        reason: String,
    },
}

impl EngineError {
    pub(crate) fn invalid_state(operation: &'static str, state: impl ToString) -> Self {
        Self::InvalidState {
            operation,
            state: state.to_string(),
        }
    }

    pub(crate) fn invalid_cursor(cursor: Option<Cursor>, reason: impl Into<String>) -> Self {
        Self::InvalidCursor {
            cursor,
            reason: reason.into(),
        }
    }

    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}
