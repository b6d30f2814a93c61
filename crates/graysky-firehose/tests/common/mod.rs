#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ciborium::Value;
use cid::Cid;
use cid::multihash::Multihash;
use futures_util::stream::{self, BoxStream, StreamExt};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use graysky_core::error::{StorageError, TransportError};
use graysky_core::{
    CursorStore, FirehoseConnector, OperationsByCollection, ProjectionWriter, Record, RepoEvent,
    Result,
};
use graysky_firehose::{SubscriberConfig, parse_frame};

pub const REPO: &str = "did:plc:u1";
pub const DAG_CBOR: u64 = 0x71;
pub const SHA2_256: u64 = 0x12;

// ---------------------------------------------------------------------------
// Wire fixtures
// ---------------------------------------------------------------------------

pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

pub fn int(i: i64) -> Value {
    Value::Integer(i.into())
}

pub fn map(entries: Vec<(&str, Value)>) -> Value {
    Value::Map(entries.into_iter().map(|(k, v)| (text(k), v)).collect())
}

pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).unwrap();
    out
}

/// CIDv1 (dag-cbor, sha2-256) of `bytes`.
pub fn cid_of(bytes: &[u8]) -> Cid {
    let digest = Sha256::digest(bytes);
    Cid::new_v1(DAG_CBOR, Multihash::<64>::wrap(SHA2_256, &digest).unwrap())
}

pub fn link(cid: &Cid) -> Value {
    let mut bytes = vec![0x00];
    bytes.extend(cid.to_bytes());
    Value::Tag(42, Box::new(Value::Bytes(bytes)))
}

fn uvarint(mut n: usize, out: &mut Vec<u8>) {
    while n >= 0x80 {
        out.push((n as u8) | 0x80);
        n >>= 7;
    }
    out.push(n as u8);
}

/// CARv1 archive holding `blocks`, rooted at the first one.
pub fn car(blocks: &[(Cid, Vec<u8>)]) -> Vec<u8> {
    let roots = blocks.first().map(|(cid, _)| vec![link(cid)]).unwrap_or_default();
    let header = encode(&map(vec![
        ("version", int(1)),
        ("roots", Value::Array(roots)),
    ]));

    let mut out = Vec::new();
    uvarint(header.len(), &mut out);
    out.extend(header);
    for (cid, data) in blocks {
        let cid_bytes = cid.to_bytes();
        uvarint(cid_bytes.len() + data.len(), &mut out);
        out.extend(cid_bytes);
        out.extend(data);
    }
    out
}

/// A post record; `reply` is `(parent uri, root uri)`.
pub fn post_record(body: &str, reply: Option<(&str, &str)>) -> Value {
    let mut fields = vec![
        ("$type", text("app.bsky.feed.post")),
        ("text", text(body)),
        ("createdAt", text("2024-01-01T00:00:00.000Z")),
    ];
    if let Some((parent, root)) = reply {
        let strong_ref = |uri: &str| map(vec![("uri", text(uri)), ("cid", text("bafyreiref"))]);
        fields.push((
            "reply",
            map(vec![("parent", strong_ref(parent)), ("root", strong_ref(root))]),
        ));
    }
    map(fields)
}

pub fn like_record(subject: &str) -> Value {
    map(vec![
        ("$type", text("app.bsky.feed.like")),
        (
            "subject",
            map(vec![("uri", text(subject)), ("cid", text("bafyreisubject"))]),
        ),
        ("createdAt", text("2024-01-01T00:00:00.000Z")),
    ])
}

/// Builds `#commit` frames.
pub struct CommitBuilder {
    seq: i64,
    repo: String,
    ops: Vec<Value>,
    blocks: Vec<(Cid, Vec<u8>)>,
}

impl CommitBuilder {
    pub fn new(seq: i64) -> Self {
        Self {
            seq,
            repo: REPO.to_string(),
            ops: Vec::new(),
            blocks: Vec::new(),
        }
    }

    pub fn repo(mut self, repo: &str) -> Self {
        self.repo = repo.to_string();
        self
    }

    fn write(mut self, action: &str, path: &str, bytes: Vec<u8>, include_block: bool) -> Self {
        let cid = cid_of(&bytes);
        self.ops.push(map(vec![
            ("action", text(action)),
            ("path", text(path)),
            ("cid", link(&cid)),
        ]));
        if include_block {
            self.blocks.push((cid, bytes));
        }
        self
    }

    pub fn create(self, path: &str, record: &Value) -> Self {
        self.write("create", path, encode(record), true)
    }

    pub fn update(self, path: &str, record: &Value) -> Self {
        self.write("update", path, encode(record), true)
    }

    /// A create whose block is raw `bytes`.
    pub fn create_raw(self, path: &str, bytes: Vec<u8>) -> Self {
        self.write("create", path, bytes, true)
    }

    /// A create whose block is left out of the CAR.
    pub fn create_dangling(self, path: &str, record: &Value) -> Self {
        self.write("create", path, encode(record), false)
    }

    pub fn delete(mut self, path: &str) -> Self {
        self.ops.push(map(vec![
            ("action", text("delete")),
            ("path", text(path)),
            ("cid", Value::Null),
        ]));
        self
    }

    pub fn frame(self) -> Vec<u8> {
        let body = map(vec![
            ("seq", int(self.seq)),
            ("rebase", Value::Bool(false)),
            ("tooBig", Value::Bool(false)),
            ("repo", text(&self.repo)),
            ("commit", link(&cid_of(b"commit"))),
            ("rev", text("3kabc2def3ghi")),
            ("since", Value::Null),
            ("blocks", Value::Bytes(car(&self.blocks))),
            ("ops", Value::Array(self.ops)),
            ("blobs", Value::Array(vec![])),
            ("time", text("2024-01-01T00:00:00.000Z")),
        ]);
        message_frame("#commit", body)
    }

    pub fn event(self) -> RepoEvent {
        parse_frame(&self.frame()).unwrap()
    }
}

pub fn message_frame(kind: &str, body: Value) -> Vec<u8> {
    let mut out = encode(&map(vec![("op", int(1)), ("t", text(kind))]));
    out.extend(encode(&body));
    out
}

pub fn error_frame(error: &str, message: &str) -> Vec<u8> {
    let mut out = encode(&map(vec![("op", int(-1))]));
    out.extend(encode(&map(vec![
        ("error", text(error)),
        ("message", text(message)),
    ])));
    out
}

pub fn identity_frame(seq: i64) -> Vec<u8> {
    message_frame(
        "#identity",
        map(vec![
            ("seq", int(seq)),
            ("did", text(REPO)),
            ("time", text("2024-01-01T00:00:00.000Z")),
            ("handle", text("u1.example.com")),
        ]),
    )
}

pub fn info_frame(name: &str) -> Vec<u8> {
    message_frame("#info", map(vec![("name", text(name))]))
}

pub fn post_path(rkey: &str) -> String {
    format!("app.bsky.feed.post/{rkey}")
}

pub fn post_uri(rkey: &str) -> String {
    format!("at://{REPO}/app.bsky.feed.post/{rkey}")
}

// ---------------------------------------------------------------------------
// Scripted firehose
// ---------------------------------------------------------------------------

/// One scripted connection.
pub struct Session {
    frames: Vec<Vec<u8>>,
    hold_open: bool,
}

impl Session {
    /// Delivers `frames`, then the server closes the connection.
    pub fn closing(frames: Vec<Vec<u8>>) -> Self {
        Self {
            frames,
            hold_open: false,
        }
    }

    /// Delivers `frames`, then goes silent without closing.
    pub fn silent(frames: Vec<Vec<u8>>) -> Self {
        Self {
            frames,
            hold_open: true,
        }
    }
}

/// Plays back scripted sessions. When the script runs out, cancels `done`
/// and refuses further connections.
#[derive(Clone)]
pub struct ScriptedConnector {
    sessions: Arc<Mutex<VecDeque<Session>>>,
    cursors: Arc<Mutex<Vec<Option<i64>>>>,
    frames_read: Arc<AtomicUsize>,
    done: CancellationToken,
}

impl ScriptedConnector {
    pub fn new(sessions: Vec<Session>, done: CancellationToken) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(sessions.into())),
            cursors: Arc::new(Mutex::new(Vec::new())),
            frames_read: Arc::new(AtomicUsize::new(0)),
            done,
        }
    }

    /// The cursor passed to each `connect` call, in order.
    pub fn cursors(&self) -> Vec<Option<i64>> {
        self.cursors.lock().unwrap().clone()
    }

    /// Frames pulled off the scripted sockets so far.
    pub fn frames_read(&self) -> usize {
        self.frames_read.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FirehoseConnector for ScriptedConnector {
    type Firehose = BoxStream<'static, Result<RepoEvent>>;

    async fn connect(&self, cursor: Option<i64>) -> Result<Self::Firehose> {
        self.cursors.lock().unwrap().push(cursor);

        let Some(session) = self.sessions.lock().unwrap().pop_front() else {
            self.done.cancel();
            return Err(TransportError::Connection {
                message: "script exhausted".to_string(),
            }
            .into());
        };

        let frames_read = self.frames_read.clone();
        let events = stream::iter(session.frames).map(move |frame| {
            frames_read.fetch_add(1, Ordering::SeqCst);
            parse_frame(&frame)
        });
        if session.hold_open {
            Ok(events.chain(stream::pending()).boxed())
        } else {
            Ok(events.boxed())
        }
    }
}

/// Accepts every connection attempt and never completes the handshake.
#[derive(Clone, Default)]
pub struct StalledConnector {
    attempts: Arc<AtomicUsize>,
}

impl StalledConnector {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FirehoseConnector for StalledConnector {
    type Firehose = BoxStream<'static, Result<RepoEvent>>;

    async fn connect(&self, _cursor: Option<i64>) -> Result<Self::Firehose> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

// ---------------------------------------------------------------------------
// In-memory storage
// ---------------------------------------------------------------------------

/// Post projection kept in memory: uri -> reply parent.
#[derive(Clone, Default)]
pub struct MemoryProjection {
    posts: Arc<Mutex<BTreeMap<String, Option<String>>>>,
    applied: Arc<Mutex<Vec<i64>>>,
    failures: Arc<AtomicU32>,
    gate: Arc<AsyncMutex<()>>,
}

impl MemoryProjection {
    /// Fail the next `n` calls to `apply`.
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Block every `apply` until the returned guard is dropped.
    pub async fn pause(&self) -> OwnedMutexGuard<()> {
        self.gate.clone().lock_owned().await
    }

    pub fn posts(&self) -> BTreeMap<String, Option<String>> {
        self.posts.lock().unwrap().clone()
    }

    /// Sequence numbers of successful applies, in order.
    pub fn applied(&self) -> Vec<i64> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProjectionWriter for MemoryProjection {
    async fn apply(&self, ops: &OperationsByCollection) -> Result<()> {
        drop(self.gate.lock().await);

        let fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(StorageError::Database {
                message: "database is locked".to_string(),
            }
            .into());
        }

        if let Some(posts) = ops.posts() {
            let mut table = self.posts.lock().unwrap();
            for delete in &posts.deletes {
                table.remove(&delete.uri);
            }
            for create in &posts.creates {
                if let Record::Post(post) = &create.record {
                    table
                        .entry(create.uri.clone())
                        .or_insert_with(|| post.reply.as_ref().map(|r| r.parent.uri.clone()));
                }
            }
        }
        self.applied.lock().unwrap().push(ops.seq());
        Ok(())
    }
}

/// Cursor store kept in memory, with the same never-regress rule as SQLite.
#[derive(Clone, Default)]
pub struct MemoryCursorStore {
    value: Arc<Mutex<Option<i64>>>,
    saves: Arc<Mutex<Vec<i64>>>,
}

impl MemoryCursorStore {
    pub fn starting_at(cursor: i64) -> Self {
        let store = Self::default();
        *store.value.lock().unwrap() = Some(cursor);
        store
    }

    pub fn value(&self) -> Option<i64> {
        *self.value.lock().unwrap()
    }

    /// Every value passed to `save`, in order.
    pub fn saves(&self) -> Vec<i64> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load(&self) -> Result<Option<i64>> {
        Ok(self.value())
    }

    async fn save(&self, cursor: i64) -> Result<()> {
        self.saves.lock().unwrap().push(cursor);
        let mut value = self.value.lock().unwrap();
        *value = Some(value.map_or(cursor, |v| v.max(cursor)));
        Ok(())
    }
}

/// Fast timings for tests.
pub fn test_config() -> SubscriberConfig {
    SubscriberConfig {
        reconnect_delay: Duration::from_millis(5),
        max_reconnect_delay: Duration::from_millis(20),
        connect_timeout: Duration::from_secs(5),
        idle_timeout: Duration::from_secs(5),
        queue_capacity: 8,
        cursor_flush_every: 1,
        storage_retries: 2,
        storage_retry_delay: Duration::from_millis(1),
    }
}
