//! Firehose stream traits.

use async_trait::async_trait;
use futures_core::Stream;

use crate::Result;
use crate::repo::RepoEvent;

/// Firehose stream of repository events.
///
/// A stream item of `Err` with [`Error::Transport`](crate::Error::Transport)
/// ends the session; any other error concerns a single frame.
pub trait Firehose: Stream<Item = Result<RepoEvent>> + Send {}

impl<T> Firehose for T where T: Stream<Item = Result<RepoEvent>> + Send {}

/// Opens firehose sessions.
#[async_trait]
pub trait FirehoseConnector: Send + Sync {
    /// Stream type for one session.
    type Firehose: Firehose + Unpin + 'static;

    /// Open a session that resumes after `cursor`, or at the live tip.
    async fn connect(&self, cursor: Option<i64>) -> Result<Self::Firehose>;
}
