//! Decentralized Identifier (DID) type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, InvalidInputError};

/// Longest DID the protocol accepts.
const MAX_LEN: usize = 2048;

/// A validated Decentralized Identifier, the identity of a repository.
///
/// Firehose commits name their repository by DID (`did:plc:...` or
/// `did:web:...`), and follow records point at one.
///
/// ```
/// use graysky_core::Did;
///
/// let did = Did::new("did:plc:z72i7hdynmk6r22z27h6tvur").unwrap();
/// assert_eq!(did.method(), "plc");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did(String);

impl Did {
    /// Create a new DID from a string, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not `did:<method>:<identifier>`.
    pub fn new(s: impl Into<String>) -> Result<Self, Error> {
        let s = s.into();
        Self::validate(&s)?;
        Ok(Self(s))
    }

    /// Returns the DID method (e.g., "plc" for "did:plc:...").
    pub fn method(&self) -> &str {
        self.parts().0
    }

    /// Returns the method-specific identifier.
    pub fn identifier(&self) -> &str {
        self.parts().1
    }

    /// Returns the full DID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn parts(&self) -> (&str, &str) {
        self.0[4..].split_once(':').unwrap_or(("", ""))
    }

    fn validate(s: &str) -> Result<(), Error> {
        let invalid = |reason: &str| -> Error {
            InvalidInputError::Did {
                value: s.to_string(),
                reason: reason.to_string(),
            }
            .into()
        };

        if s.len() > MAX_LEN {
            return Err(invalid("exceeds maximum length"));
        }

        let rest = s.strip_prefix("did:").ok_or_else(|| invalid("must start with 'did:'"))?;
        let (method, identifier) = rest
            .split_once(':')
            .ok_or_else(|| invalid("must have format 'did:<method>:<identifier>'"))?;

        if method.is_empty() || !method.bytes().all(|b| b.is_ascii_lowercase()) {
            return Err(invalid("method must be non-empty lowercase letters"));
        }

        if identifier.is_empty() || identifier.ends_with(':') {
            return Err(invalid("identifier must be non-empty"));
        }

        let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '%' | '-');
        if let Some(c) = identifier.chars().find(|c| !allowed(*c)) {
            return Err(invalid(&format!("identifier contains invalid character '{c}'")));
        }

        Ok(())
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Did {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Did {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Did> for String {
    fn from(did: Did) -> Self {
        did.0
    }
}

impl AsRef<str> for Did {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
