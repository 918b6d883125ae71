//! Identifier types for events and participants.
//!
//! Both identifiers are opaque string keys. `EventName` is chosen by the
//! event's creator and must be unique within the registry; `ParticipantId`
//! is either a platform user id or an operator-supplied external name.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when parsing an identifier from untrusted input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid identifier: {0}")]
pub struct ParseIdError(String);

/// Unique name of a lucky-number event.
///
/// # Validation
///
/// - `FromStr::from_str()`: trims and rejects empty names
/// - `From::from()` and `new()`: no validation (trusted input, e.g. storage)
///
/// # Examples
///
/// ```
/// use lucky_draw_core::ids::EventName;
///
/// let name = EventName::new("spring-draw");
/// assert_eq!(name.as_str(), "spring-draw");
///
/// let parsed: EventName = "  summer  ".parse().unwrap();
/// assert_eq!(parsed, EventName::new("summer"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventName(String);

impl EventName {
    /// Create a new `EventName`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert into the inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EventName {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseIdError("event name cannot be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<String> for EventName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EventName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for EventName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EventName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Identity of an entrant or event creator.
///
/// Platform-verified users are keyed by their platform id. Entrants added
/// by an operator under a free-form name are namespaced with
/// [`ParticipantId::external`] so they can never collide with a platform id.
///
/// ```
/// use lucky_draw_core::ids::ParticipantId;
///
/// let user = ParticipantId::new("81234");
/// let guest = ParticipantId::external("Grandma Lan");
/// assert_ne!(user, guest);
/// assert!(guest.is_external());
/// assert_eq!(guest.as_str(), "external:Grandma Lan");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    const EXTERNAL_PREFIX: &'static str = "external:";

    /// Create a `ParticipantId` from a platform id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a `ParticipantId` for an operator-supplied external name.
    #[must_use]
    pub fn external(name: &str) -> Self {
        Self(format!("{}{}", Self::EXTERNAL_PREFIX, name.trim()))
    }

    /// Whether this id was created through [`ParticipantId::external`].
    #[must_use]
    pub fn is_external(&self) -> bool {
        self.0.starts_with(Self::EXTERNAL_PREFIX)
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ParticipantId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseIdError("participant id cannot be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
