//! Cursor store trait.

use async_trait::async_trait;

use crate::Result;

/// Durable storage for the stream position.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Returns the last saved cursor, or `None` on first start.
    async fn load(&self) -> Result<Option<i64>>;

    /// Persist `cursor`. Returns once the value is durable.
    ///
    /// A value lower than the stored one is ignored.
    async fn save(&self, cursor: i64) -> Result<()>;
}
