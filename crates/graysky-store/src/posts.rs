//! The post projection.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rusqlite::{OptionalExtension, params, params_from_iter};
use tracing::{debug, instrument};

use graysky_core::{OperationsByCollection, ProjectionWriter, Record, Result};

use crate::db::Database;

/// Deletes are issued in chunks of this many URIs to stay well under
/// SQLite's bound-parameter limit.
const DELETE_CHUNK: usize = 500;

/// A projected post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRow {
    pub uri: String,
    pub cid: String,
    pub reply_parent: Option<String>,
    pub reply_root: Option<String>,
    pub indexed_at: String,
}

/// Projects `app.bsky.feed.post` operations into the `post` table.
///
/// Each commit is applied in one transaction. Inserts ignore URIs that
/// already exist, and deletes of unknown URIs are no-ops, so re-applying a
/// commit leaves the table unchanged.
#[derive(Clone)]
pub struct PostProjection {
    db: Database,
}

impl PostProjection {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Look up one post by URI.
    pub async fn get(&self, uri: &str) -> Result<Option<PostRow>> {
        let uri = uri.to_string();
        self.db
            .call(move |conn| {
                conn.query_row(
                    "SELECT uri, cid, reply_parent, reply_root, indexed_at FROM post WHERE uri = ?",
                    [uri],
                    |row| {
                        Ok(PostRow {
                            uri: row.get(0)?,
                            cid: row.get(1)?,
                            reply_parent: row.get(2)?,
                            reply_root: row.get(3)?,
                            indexed_at: row.get(4)?,
                        })
                    },
                )
                .optional()
            })
            .await
    }

    /// Number of projected posts.
    pub async fn count(&self) -> Result<u64> {
        self.db
            .call(|conn| {
                conn.query_row("SELECT COUNT(*) FROM post", [], |row| row.get::<_, i64>(0))
                    .map(|n| n as u64)
            })
            .await
    }
}

#[async_trait]
impl ProjectionWriter for PostProjection {
    #[instrument(skip_all, fields(seq = ops.seq()))]
    async fn apply(&self, ops: &OperationsByCollection) -> Result<()> {
        let Some(posts) = ops.posts() else {
            return Ok(());
        };
        if posts.is_empty() {
            return Ok(());
        }

        let deletes: Vec<String> = posts.deletes.iter().map(|op| op.uri.clone()).collect();
        let indexed_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let creates: Vec<PostRow> = posts
            .creates
            .iter()
            .filter_map(|op| match &op.record {
                Record::Post(post) => Some(PostRow {
                    uri: op.uri.clone(),
                    cid: op.cid.clone(),
                    reply_parent: post.reply.as_ref().map(|r| r.parent.uri.clone()),
                    reply_root: post.reply.as_ref().map(|r| r.root.uri.clone()),
                    indexed_at: indexed_at.clone(),
                }),
                _ => None,
            })
            .collect();

        let (deleted, inserted) = self
            .db
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut deleted = 0;
                for chunk in deletes.chunks(DELETE_CHUNK) {
                    let placeholders = vec!["?"; chunk.len()].join(", ");
                    deleted += tx.execute(
                        &format!("DELETE FROM post WHERE uri IN ({placeholders})"),
                        params_from_iter(chunk),
                    )?;
                }

                let mut inserted = 0;
                {
                    let mut insert = tx.prepare_cached(
                        "INSERT INTO post (uri, cid, reply_parent, reply_root, indexed_at)
                         VALUES (?, ?, ?, ?, ?)
                         ON CONFLICT (uri) DO NOTHING",
                    )?;
                    for row in &creates {
                        inserted += insert.execute(params![
                            row.uri,
                            row.cid,
                            row.reply_parent,
                            row.reply_root,
                            row.indexed_at,
                        ])?;
                    }
                }

                tx.commit()?;
                Ok((deleted, inserted))
            })
            .await?;

        debug!(deleted, inserted, "Applied post operations");
        Ok(())
    }
}
