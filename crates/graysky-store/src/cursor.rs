//! SQLite cursor store.

use async_trait::async_trait;
use rusqlite::{OptionalExtension, params};
use tracing::instrument;

use graysky_core::{CursorStore, Result, ServiceUrl};

use crate::db::Database;

/// Stream position for one firehose service, in `sub_state`.
///
/// Rows are keyed by the normalized service URL, so `https://host` and
/// `wss://host/` share a cursor.
#[derive(Clone)]
pub struct SqliteCursorStore {
    db: Database,
    service: String,
}

impl SqliteCursorStore {
    pub fn new(db: Database, service: &ServiceUrl) -> Self {
        Self {
            db,
            service: service.as_str().to_string(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }
}

#[async_trait]
impl CursorStore for SqliteCursorStore {
    #[instrument(skip(self), fields(service = %self.service))]
    async fn load(&self) -> Result<Option<i64>> {
        let service = self.service.clone();
        self.db
            .call(move |conn| {
                conn.query_row(
                    "SELECT cursor FROM sub_state WHERE service = ?",
                    [service],
                    |row| row.get(0),
                )
                .optional()
            })
            .await
    }

    #[instrument(skip(self), fields(service = %self.service))]
    async fn save(&self, cursor: i64) -> Result<()> {
        let service = self.service.clone();
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sub_state (service, cursor) VALUES (?, ?)
                     ON CONFLICT(service) DO UPDATE SET
                        cursor = MAX(cursor, excluded.cursor)",
                    params![service, cursor],
                )
            })
            .await?;
        Ok(())
    }
}
