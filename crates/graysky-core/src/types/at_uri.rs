//! AT URI type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Did, Nsid, Rkey};
use crate::error::{Error, InvalidInputError};

/// A validated record URI: `at://<repo>/<collection>/<rkey>`.
///
/// Commit operations only carry a repository-relative path
/// (`<collection>/<rkey>`); [`AtUri::from_repo_path`] joins it with the
/// commit's repository.
///
/// ```
/// use graysky_core::{AtUri, Did};
///
/// let repo = Did::new("did:plc:z72i7hdynmk6r22z27h6tvur").unwrap();
/// let uri = AtUri::from_repo_path(&repo, "app.bsky.feed.post/3jui7kd54zh2y").unwrap();
/// assert_eq!(uri.collection().as_str(), "app.bsky.feed.post");
/// assert_eq!(
///     uri.to_string(),
///     "at://did:plc:z72i7hdynmk6r22z27h6tvur/app.bsky.feed.post/3jui7kd54zh2y"
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AtUri {
    repo: Did,
    collection: Nsid,
    rkey: Rkey,
}

impl AtUri {
    /// Parse a full AT URI.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not `at://<did>/<nsid>/<rkey>`.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref();
        let rest = s.strip_prefix("at://").ok_or_else(|| InvalidInputError::AtUri {
            value: s.to_string(),
            reason: "must start with 'at://'".to_string(),
        })?;

        let (repo, path) = rest.split_once('/').ok_or_else(|| InvalidInputError::AtUri {
            value: s.to_string(),
            reason: "must have format 'at://<repo>/<collection>/<rkey>'".to_string(),
        })?;

        let repo = Did::new(repo).map_err(|e| InvalidInputError::AtUri {
            value: s.to_string(),
            reason: e.to_string(),
        })?;

        Self::from_repo_path(&repo, path)
    }

    /// Build a URI from a repository and a `<collection>/<rkey>` path.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not have exactly two segments or
    /// either segment is invalid.
    pub fn from_repo_path(repo: &Did, path: &str) -> Result<Self, Error> {
        let invalid = |reason: String| -> Error {
            InvalidInputError::AtUri {
                value: format!("at://{repo}/{path}"),
                reason,
            }
            .into()
        };

        let (collection, rkey) = path
            .split_once('/')
            .ok_or_else(|| invalid("path must be '<collection>/<rkey>'".to_string()))?;

        if rkey.contains('/') {
            return Err(invalid("path has more than two segments".to_string()));
        }

        let collection = Nsid::new(collection).map_err(|e| invalid(e.to_string()))?;
        let rkey = Rkey::new(rkey).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            repo: repo.clone(),
            collection,
            rkey,
        })
    }

    /// Returns the repository (DID).
    pub fn repo(&self) -> &Did {
        &self.repo
    }

    /// Returns the collection (NSID).
    pub fn collection(&self) -> &Nsid {
        &self.collection
    }

    /// Returns the record key.
    pub fn rkey(&self) -> &Rkey {
        &self.rkey
    }
}

impl fmt::Display for AtUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at://{}/{}/{}", self.repo, self.collection, self.rkey)
    }
}

impl FromStr for AtUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for AtUri {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AtUri {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        AtUri::new(&s).map_err(serde::de::Error::custom)
    }
}
