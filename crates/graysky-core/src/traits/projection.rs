//! Projection writer trait.

use async_trait::async_trait;

use crate::Result;
use crate::repo::OperationsByCollection;

/// Turns the decoded operations of one commit into storage mutations.
///
/// Implementations must be idempotent: the stream redelivers commits after a
/// reconnect, and the same `apply` may run more than once. A returned error
/// means nothing from this commit was persisted.
#[async_trait]
pub trait ProjectionWriter: Send + Sync {
    /// Apply one commit's operations.
    async fn apply(&self, ops: &OperationsByCollection) -> Result<()>;
}
