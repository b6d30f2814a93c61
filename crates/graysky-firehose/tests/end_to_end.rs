//! Subscriber feeding the SQLite projection and cursor store.

mod common;

use std::time::Duration;

use common::*;
use graysky_core::{CursorStore, ServiceUrl};
use graysky_firehose::Subscriber;
use graysky_store::{Database, PostProjection, SqliteCursorStore};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn service() -> ServiceUrl {
    ServiceUrl::new("wss://bsky.network").unwrap()
}

/// Play `sessions` into the database until the script runs out.
async fn ingest(db: &Database, sessions: Vec<Session>) -> Vec<Option<i64>> {
    let shutdown = CancellationToken::new();
    let connector = ScriptedConnector::new(sessions, shutdown.clone());
    let mut subscriber = Subscriber::new(
        connector.clone(),
        PostProjection::new(db.clone()),
        SqliteCursorStore::new(db.clone(), &service()),
        test_config(),
    );

    tokio::time::timeout(Duration::from_secs(30), subscriber.run(shutdown))
        .await
        .expect("subscriber did not stop")
        .unwrap();
    connector.cursors()
}

fn create_abc() -> Vec<u8> {
    CommitBuilder::new(10)
        .create(&post_path("abc"), &post_record("hello", None))
        .frame()
}

fn delete_abc() -> Vec<u8> {
    CommitBuilder::new(11).delete(&post_path("abc")).frame()
}

#[tokio::test]
async fn create_then_delete() {
    let db = Database::open_in_memory().unwrap();
    let posts = PostProjection::new(db.clone());
    let cursor = SqliteCursorStore::new(db.clone(), &service());

    ingest(&db, vec![Session::closing(vec![create_abc()])]).await;

    let row = posts.get(&post_uri("abc")).await.unwrap().unwrap();
    assert_eq!(row.reply_parent, None);
    assert_eq!(row.reply_root, None);
    assert_eq!(posts.count().await.unwrap(), 1);
    assert_eq!(cursor.load().await.unwrap(), Some(10));

    ingest(&db, vec![Session::closing(vec![delete_abc()])]).await;

    assert_eq!(posts.count().await.unwrap(), 0);
    assert_eq!(cursor.load().await.unwrap(), Some(11));
}

#[tokio::test]
async fn replay_after_restart_is_harmless() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ingress.db");

    {
        let db = Database::open(&path).unwrap();
        ingest(&db, vec![Session::closing(vec![create_abc(), delete_abc()])]).await;
    }

    let db = Database::open(&path).unwrap();
    let cursors = ingest(&db, vec![Session::closing(vec![create_abc(), delete_abc()])]).await;

    assert_eq!(cursors[0], Some(11));
    let posts = PostProjection::new(db.clone());
    assert_eq!(posts.count().await.unwrap(), 0);
    let cursor = SqliteCursorStore::new(db, &service());
    assert_eq!(cursor.load().await.unwrap(), Some(11));
}

#[tokio::test]
async fn replay_without_cursor_converges() {
    // A server that ignores the cursor and replays from the start must still
    // leave the table in the same state.
    let db = Database::open_in_memory().unwrap();
    let frames = || vec![create_abc(), delete_abc()];
    let sessions = vec![Session::closing(frames()), Session::closing(frames())];

    ingest(&db, sessions).await;

    let posts = PostProjection::new(db.clone());
    assert_eq!(posts.count().await.unwrap(), 0);
}

#[tokio::test]
async fn reply_linkage_and_partial_failure() {
    let db = Database::open_in_memory().unwrap();
    let parent = post_uri("abc");
    let root = "at://did:plc:other/app.bsky.feed.post/root";
    let frame = CommitBuilder::new(12)
        .create(
            &post_path("reply"),
            &post_record("agreed", Some((parent.as_str(), root))),
        )
        .create_raw(&post_path("broken"), vec![0xa1])
        .frame();

    ingest(&db, vec![Session::closing(vec![create_abc(), frame])]).await;

    let posts = PostProjection::new(db.clone());
    assert_eq!(posts.count().await.unwrap(), 2);
    assert!(posts.get(&post_uri("broken")).await.unwrap().is_none());

    let reply = posts.get(&post_uri("reply")).await.unwrap().unwrap();
    assert_eq!(reply.reply_parent.as_deref(), Some(parent.as_str()));
    assert_eq!(reply.reply_root.as_deref(), Some(root));
}
