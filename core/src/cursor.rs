//! Opaque pagination cursors.
//!
//! Two kinds of value travel inside a [`Cursor`]:
//!
//! - **Identifiers**: the last-seen entity id, rendered as hyphenated UUID text.
//! - **Timestamps**: for listings whose sort key is a creation time rather
//!   than the identifier. The token is UUID-shaped (version 7 layout) with the
//!   48-bit Unix-millisecond field carrying the timestamp and every remaining
//!   random bit set to zero, so encoding is deterministic.
//! - **Keysets**: a timestamp token and the tie-breaking identifier joined by
//!   `.`, for listings ordered by `(created_at, id)`. Rows sharing a
//!   millisecond stay distinguishable across page boundaries.
//!
//! Callers treat both as opaque strings. A token produced by a different
//! encoding generation does not match the layout checks and is rejected with
//! [`CoreError::InvalidCursor`] rather than being misread.
//!
//! # Example
//!
//! ```
//! use recipebox_core::cursor::CursorCodec;
//! use recipebox_core::environment::SystemClock;
//! use std::sync::Arc;
//!
//! let codec = CursorCodec::new(Arc::new(SystemClock));
//! let now = recipebox_core::Utc::now();
//! let token = codec.encode_time(now);
//! let back = codec.decode_time(Some(token.as_str())).unwrap().unwrap();
//! assert!((now - back).num_milliseconds().abs() < 1);
//! ```

use crate::environment::Clock;
use crate::error::{CoreError, Result};
use crate::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Default tolerance for timestamp cursors that point slightly into the future.
pub const DEFAULT_FUTURE_GRACE: chrono::Duration = chrono::Duration::hours(24);

const TIME_VERSION_BYTE: u8 = 0x70;
const TIME_VARIANT_BYTE: u8 = 0x80;
const KEYSET_SEPARATOR: char = '.';

/// Opaque pagination token handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Wrap a raw token received from a caller.
    #[must_use]
    pub const fn new(token: String) -> Self {
        Self(token)
    }

    /// Borrow the token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the token text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Cursor {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for Cursor {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// Encodes and decodes cursors.
///
/// The clock is only consulted when decoding timestamp cursors, to reject
/// tokens that claim to come from the future.
#[derive(Clone)]
pub struct CursorCodec {
    clock: Arc<dyn Clock>,
    future_grace: chrono::Duration,
}

impl CursorCodec {
    /// Create a codec with the default future grace window.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            future_grace: DEFAULT_FUTURE_GRACE,
        }
    }

    /// Set how far into the future a timestamp cursor may point before it is
    /// treated as corrupt.
    #[must_use]
    pub const fn with_future_grace(mut self, grace: chrono::Duration) -> Self {
        self.future_grace = grace;
        self
    }

    /// Encode the last-seen identifier.
    #[must_use]
    pub fn encode_id(&self, id: &Uuid) -> Cursor {
        Cursor(id.hyphenated().to_string())
    }

    /// Decode an identifier cursor.
    ///
    /// An absent or empty token, or the nil UUID, means "start of sequence".
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidCursor`] if the token is not a UUID.
    pub fn decode_id(&self, token: Option<&str>) -> Result<Option<Uuid>> {
        let Some(token) = non_empty(token) else {
            return Ok(None);
        };
        let id = Uuid::parse_str(token)
            .map_err(|e| CoreError::InvalidCursor(format!("malformed identifier cursor: {e}")))?;
        if id.is_nil() {
            return Ok(None);
        }
        Ok(Some(id))
    }

    /// Encode a timestamp.
    ///
    /// Precision is one millisecond; timestamps before the Unix epoch are
    /// clamped to the epoch.
    #[must_use]
    pub fn encode_time(&self, time: DateTime<Utc>) -> Cursor {
        let millis = u64::try_from(time.timestamp_millis()).unwrap_or(0);
        let mut bytes = [0u8; 16];
        bytes[..6].copy_from_slice(&millis.to_be_bytes()[2..]);
        bytes[6] = TIME_VERSION_BYTE;
        bytes[8] = TIME_VARIANT_BYTE;
        Cursor(Uuid::from_bytes(bytes).hyphenated().to_string())
    }

    /// Decode a timestamp cursor.
    ///
    /// An absent or empty token means "start of sequence". A timestamp later
    /// than `now + grace` is treated as corrupt and also decodes to `None`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidCursor`] if the token is not UUID-shaped or
    /// does not carry the timestamp layout.
    pub fn decode_time(&self, token: Option<&str>) -> Result<Option<DateTime<Utc>>> {
        let Some(token) = non_empty(token) else {
            return Ok(None);
        };
        let id = Uuid::parse_str(token)
            .map_err(|e| CoreError::InvalidCursor(format!("malformed timestamp cursor: {e}")))?;
        let bytes = id.as_bytes();

        let layout_ok = bytes[6] == TIME_VERSION_BYTE
            && bytes[7] == 0
            && bytes[8] == TIME_VARIANT_BYTE
            && bytes[9..].iter().all(|b| *b == 0);
        if !layout_ok {
            return Err(CoreError::InvalidCursor(
                "unrecognized timestamp cursor layout".to_string(),
            ));
        }

        let mut millis_bytes = [0u8; 8];
        millis_bytes[2..].copy_from_slice(&bytes[..6]);
        let millis = i64::try_from(u64::from_be_bytes(millis_bytes))
            .map_err(|_| CoreError::InvalidCursor("timestamp out of range".to_string()))?;
        let time = DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| CoreError::InvalidCursor("timestamp out of range".to_string()))?;

        let now = self.clock.now();
        let limit = now.checked_add_signed(self.future_grace).unwrap_or(now);
        if time > limit {
            tracing::debug!(cursor_time = %time, %now, "Timestamp cursor lies in the future, restarting");
            return Ok(None);
        }
        Ok(Some(time))
    }

    /// Encode a `(timestamp, identifier)` keyset position.
    #[must_use]
    pub fn encode_keyset(&self, time: DateTime<Utc>, id: &Uuid) -> Cursor {
        let time = self.encode_time(time);
        Cursor(format!("{time}{KEYSET_SEPARATOR}{}", id.hyphenated()))
    }

    /// Decode a keyset cursor.
    ///
    /// An absent or empty token means "start of sequence", as does a
    /// timestamp beyond the future grace window.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidCursor`] if either half is malformed or the
    /// identifier half is missing.
    pub fn decode_keyset(&self, token: Option<&str>) -> Result<Option<(DateTime<Utc>, Uuid)>> {
        let Some(token) = non_empty(token) else {
            return Ok(None);
        };
        let (time, id) = token
            .split_once(KEYSET_SEPARATOR)
            .filter(|(time, _)| !time.is_empty())
            .ok_or_else(|| CoreError::InvalidCursor("keyset cursor needs a timestamp and an identifier".to_string()))?;
        let id = Uuid::parse_str(id)
            .map_err(|e| CoreError::InvalidCursor(format!("malformed keyset identifier: {e}")))?;
        Ok(self.decode_time(Some(time))?.map(|time| (time, id)))
    }
}

impl fmt::Debug for CursorCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorCodec")
            .field("future_grace", &self.future_grace)
            .finish_non_exhaustive()
    }
}

fn non_empty(token: Option<&str>) -> Option<&str> {
    token.map(str::trim).filter(|t| !t.is_empty())
}
