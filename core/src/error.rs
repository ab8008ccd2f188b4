//! Error taxonomy shared by every Recipebox component.
//!
//! Store implementations map their backend failures to
//! [`CoreError::Unavailable`]; everything else is raised by the core itself.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors surfaced by the core operations and their collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Referenced entity does not exist or is soft-deleted.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up ("recipe", "user", ...)
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Pagination token is malformed or does not belong to this listing.
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// Write collided with existing state (duplicate follow, duplicate active rating).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage or notification collaborator failed.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Input failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Caller does not own the entity it tried to change.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Submitted one-time code does not match the stored one.
    #[error("Invalid verification code")]
    InvalidVerificationCode,

    /// Stored one-time code has expired.
    #[error("Verification code has expired")]
    VerificationCodeExpired,
}

impl CoreError {
    /// Shorthand for [`CoreError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns `true` if the caller sent something it should fix before retrying.
    ///
    /// # Examples
    ///
    /// ```
    /// # use recipebox_core::CoreError;
    /// assert!(CoreError::InvalidCursor("garbled".into()).is_client_error());
    /// assert!(!CoreError::Unavailable("db down".into()).is_client_error());
    /// ```
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Unavailable(_))
    }

    /// Returns `true` if retrying the same call later may succeed.
    ///
    /// `NotFound` and `InvalidCursor` are never retried automatically.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_entity_and_id() {
        let err = CoreError::not_found("recipe", "abc");
        assert_eq!(err.to_string(), "recipe not found: abc");
        assert!(err.is_client_error());
        assert!(!err.is_retryable());
    }

    #[test]
    fn unavailable_is_the_only_retryable_error() {
        assert!(CoreError::Unavailable("timeout".into()).is_retryable());
        assert!(!CoreError::Conflict("dup".into()).is_retryable());
        assert!(!CoreError::VerificationCodeExpired.is_retryable());
    }
}
