use crate::constants::{GENESIS_MARKER_SUFFIX, MAX_IDENTITY_LEN};
use crate::error::IdentityError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated user identifier. Identities end up in file names, so only a
/// conservative character set is accepted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn parse(raw: impl Into<String>) -> Result<Self, IdentityError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(IdentityError::Empty);
        }
        if raw.chars().count() > MAX_IDENTITY_LEN {
            return Err(IdentityError::TooLong {
                max: MAX_IDENTITY_LEN,
            });
        }
        if raw.starts_with('.') {
            return Err(IdentityError::LeadingDot);
        }
        if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(IdentityError::InvalidChar(c));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Text of the first entry in this identity's genesis block.
    pub fn genesis_marker(&self) -> String {
        format!("{}{}", self.0, GENESIS_MARKER_SUFFIX)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.0
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
