//! Record key type.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, InvalidInputError};

/// A validated record key, the last segment of a repository path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rkey(String);

impl Rkey {
    /// Create a new record key, validating the allowed character set.
    ///
    /// # Errors
    ///
    /// Returns an error for empty keys, keys over 512 characters, `.`/`..`,
    /// or keys containing characters outside `A-Za-z0-9.-_:~`.
    pub fn new(s: impl Into<String>) -> Result<Self, Error> {
        let s = s.into();
        Self::validate(&s)?;
        Ok(Self(s))
    }

    /// Returns the record key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), Error> {
        let reason = if s.is_empty() {
            Some("cannot be empty".to_string())
        } else if s.len() > 512 {
            Some("exceeds maximum length of 512 characters".to_string())
        } else if s == "." || s == ".." {
            Some("cannot be '.' or '..'".to_string())
        } else {
            s.chars()
                .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '.' | '-' | '_' | ':' | '~'))
                .map(|c| format!("contains invalid character '{c}'"))
        };

        match reason {
            Some(reason) => Err(InvalidInputError::Rkey {
                value: s.to_string(),
                reason,
            }
            .into()),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Rkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Rkey {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Rkey> for String {
    fn from(rkey: Rkey) -> Self {
        rkey.0
    }
}
