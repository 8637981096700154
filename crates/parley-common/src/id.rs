use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ParleyError;

const MAX_SESSION_ID_LEN: usize = 128;

/// 128 random bits rendered as 32 lowercase hex characters.
pub fn new_session_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Identifier of a conversation session.
///
/// Freshly minted ids are random hex tokens, but ids supplied by callers are
/// opaque: any non-empty ASCII string of letters, digits, `-` and `_` is
/// accepted, which keeps the id safe to use as a file stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(new_session_token())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParleyError::Validation("session_id is required".into()));
        }
        if s.len() > MAX_SESSION_ID_LEN {
            return Err(ParleyError::Validation(format!(
                "session_id longer than {MAX_SESSION_ID_LEN} characters"
            )));
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ParleyError::Validation(format!(
                "session_id contains invalid characters: {s}"
            )));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for SessionId {
    type Error = ParleyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}
