//! Domain events dispatched on the in-process bus.
//!
//! Each event is a variant of [`DomainEvent`] with a typed payload. Handlers
//! subscribe by [`EventKind`], the payload-free dispatch tag. Event names are
//! stable strings used in logs and metric labels.

use crate::model::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dispatch tag of a [`DomainEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A user account was created.
    UserRegistered,
    /// A user asked for a new one-time verification code.
    VerificationRequested,
}

impl EventKind {
    /// Stable event name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UserRegistered => "user.created",
            Self::VerificationRequested => "user.verification_requested",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Something that happened on the write path.
///
/// # Example
///
/// ```
/// use recipebox_core::event::{DomainEvent, EventKind};
/// use recipebox_core::model::UserId;
///
/// let event = DomainEvent::UserRegistered {
///     user_id: UserId::new(),
///     email: "cook@example.com".to_string(),
/// };
/// assert_eq!(event.kind(), EventKind::UserRegistered);
/// assert_eq!(event.kind().name(), "user.created");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A user account was created.
    UserRegistered {
        /// New user
        user_id: UserId,
        /// Address the account was registered with
        email: String,
    },
    /// A user asked for a new one-time verification code.
    VerificationRequested {
        /// Requesting user
        user_id: UserId,
    },
}

impl DomainEvent {
    /// Dispatch tag of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::UserRegistered { .. } => EventKind::UserRegistered,
            Self::VerificationRequested { .. } => EventKind::VerificationRequested,
        }
    }

    /// User the event is about.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        match self {
            Self::UserRegistered { user_id, .. } | Self::VerificationRequested { user_id } => {
                *user_id
            }
        }
    }
}
