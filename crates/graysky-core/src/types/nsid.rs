//! Namespaced Identifier (NSID) type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, InvalidInputError};

/// A validated NSID, the reverse-DNS name of a record collection.
///
/// ```
/// use graysky_core::Nsid;
///
/// let nsid = Nsid::new("app.bsky.feed.post").unwrap();
/// assert_eq!(nsid.authority(), "app.bsky.feed");
/// assert_eq!(nsid.name(), "post");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nsid(String);

impl Nsid {
    /// Create a new NSID from a string, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not at least three dot-separated
    /// segments of letters, digits and hyphens, with a letter-only name.
    pub fn new(s: impl Into<String>) -> Result<Self, Error> {
        let s = s.into();
        Self::validate(&s)?;
        Ok(Self(s))
    }

    /// Returns the domain authority (everything before the last segment).
    pub fn authority(&self) -> &str {
        self.0.rsplit_once('.').map(|(a, _)| a).unwrap_or("")
    }

    /// Returns the name (the last segment).
    pub fn name(&self) -> &str {
        self.0.rsplit_once('.').map(|(_, n)| n).unwrap_or(&self.0)
    }

    /// Returns the full NSID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), Error> {
        let invalid = |reason: String| -> Error {
            InvalidInputError::Nsid {
                value: s.to_string(),
                reason,
            }
            .into()
        };

        if s.len() > 317 {
            return Err(invalid("exceeds maximum length of 317 characters".into()));
        }

        let segments: Vec<&str> = s.split('.').collect();
        if segments.len() < 3 {
            return Err(invalid("must have at least 3 segments".into()));
        }

        for segment in &segments {
            let Some(first) = segment.chars().next() else {
                return Err(invalid("contains an empty segment".into()));
            };
            if !first.is_ascii_alphabetic() {
                return Err(invalid(format!("segment '{segment}' must start with a letter")));
            }
            if segment.len() > 63 {
                return Err(invalid(format!("segment '{segment}' is longer than 63 characters")));
            }
            if let Some(c) = segment.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '-') {
                return Err(invalid(format!("segment '{segment}' contains invalid character '{c}'")));
            }
        }

        let name = segments[segments.len() - 1];
        if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid(format!("name '{name}' must not contain hyphens")));
        }

        Ok(())
    }
}

impl fmt::Display for Nsid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Nsid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Nsid {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Nsid> for String {
    fn from(nsid: Nsid) -> Self {
        nsid.0
    }
}

impl AsRef<str> for Nsid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
