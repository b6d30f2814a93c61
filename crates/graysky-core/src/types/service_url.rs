//! Firehose service URL type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{Error, InvalidInputError};

/// XRPC method of the repository event stream.
const SUBSCRIBE_REPOS: &str = "com.atproto.sync.subscribeRepos";

/// A validated firehose service endpoint.
///
/// Accepts `wss://` and `https://` URLs (and their plaintext forms for
/// localhost only). The normalized string form doubles as the key under which
/// the stream cursor is persisted, so `https://bsky.network` and
/// `wss://bsky.network/` resolve to the same cursor.
///
/// ```
/// use graysky_core::ServiceUrl;
///
/// let service = ServiceUrl::new("https://bsky.network").unwrap();
/// assert_eq!(service.as_str(), "wss://bsky.network");
/// assert_eq!(
///     service.subscribe_url(Some(42)),
///     "wss://bsky.network/xrpc/com.atproto.sync.subscribeRepos?cursor=42"
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ServiceUrl(Url);

impl ServiceUrl {
    /// Create a new service URL, validating and normalizing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse, has no host, or uses a
    /// plaintext scheme for a non-local host.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref();
        let invalid = |reason: &str| -> Error {
            InvalidInputError::ServiceUrl {
                value: s.to_string(),
                reason: reason.to_string(),
            }
            .into()
        };

        let mut url = Url::parse(s).map_err(|e| invalid(&e.to_string()))?;

        let host = url.host_str().ok_or_else(|| invalid("must have a host"))?;
        let is_localhost = matches!(host, "localhost" | "127.0.0.1" | "[::1]");

        let secure = match url.scheme() {
            "wss" | "https" => true,
            "ws" | "http" if is_localhost => false,
            "ws" | "http" => return Err(invalid("plaintext is allowed only for localhost")),
            _ => return Err(invalid("scheme must be wss, ws, https or http")),
        };

        url.set_scheme(if secure { "wss" } else { "ws" })
            .map_err(|()| invalid("cannot convert scheme to WebSocket"))?;
        url.set_query(None);
        url.set_fragment(None);
        let path = url.path().trim_end_matches('/').to_string();
        url.set_path(&path);

        Ok(Self(url))
    }

    /// Returns the normalized service URL (no trailing slash).
    pub fn as_str(&self) -> &str {
        self.0.as_str().trim_end_matches('/')
    }

    /// Returns the host name.
    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }

    /// Returns the `subscribeRepos` WebSocket URL, resuming after `cursor`.
    pub fn subscribe_url(&self, cursor: Option<i64>) -> String {
        let mut url = format!("{}/xrpc/{}", self.as_str(), SUBSCRIBE_REPOS);
        if let Some(cursor) = cursor {
            url.push_str(&format!("?cursor={cursor}"));
        }
        url
    }
}

impl fmt::Display for ServiceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for ServiceUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ServiceUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ServiceUrl::new(&s).map_err(serde::de::Error::custom)
    }
}
