//! Repository event types for the firehose stream.

use serde::{Deserialize, Serialize};

use crate::types::Did;

/// A repository event from the subscription stream.
#[derive(Debug, Clone)]
pub enum RepoEvent {
    /// A commit event containing repository changes.
    Commit(CommitEvent),

    /// An identity update event.
    Identity(IdentityEvent),

    /// An account status change.
    Account(AccountEvent),

    /// A handle update event (legacy).
    Handle(HandleEvent),

    /// A repository tombstone (legacy).
    Tombstone(TombstoneEvent),

    /// A stream info message, e.g. `OutdatedCursor`.
    Info(InfoEvent),

    /// A message type this client does not know.
    Unknown { kind: String },
}

impl RepoEvent {
    /// Returns the sequence number, if this event is sequenced.
    ///
    /// Info and unknown messages are not part of the sequence and never
    /// move the cursor.
    pub fn seq(&self) -> Option<i64> {
        match self {
            RepoEvent::Commit(e) => Some(e.seq),
            RepoEvent::Identity(e) => Some(e.seq),
            RepoEvent::Account(e) => Some(e.seq),
            RepoEvent::Handle(e) => Some(e.seq),
            RepoEvent::Tombstone(e) => Some(e.seq),
            RepoEvent::Info(_) | RepoEvent::Unknown { .. } => None,
        }
    }

    /// Returns the message type as it appears in the frame header.
    pub fn kind(&self) -> &str {
        match self {
            RepoEvent::Commit(_) => "#commit",
            RepoEvent::Identity(_) => "#identity",
            RepoEvent::Account(_) => "#account",
            RepoEvent::Handle(_) => "#handle",
            RepoEvent::Tombstone(_) => "#tombstone",
            RepoEvent::Info(_) => "#info",
            RepoEvent::Unknown { kind } => kind,
        }
    }
}

/// A commit event from a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitEvent {
    /// The repository DID.
    pub repo: Did,

    /// The commit revision.
    pub rev: String,

    /// Sequence number.
    pub seq: i64,

    /// Timestamp of the commit.
    pub time: String,

    /// CID of the new repository commit root.
    pub commit: Option<String>,

    /// Set when the commit was too large to inline all blocks.
    #[serde(default)]
    pub too_big: bool,

    /// Operations in this commit.
    #[serde(default)]
    pub ops: Vec<RepoOp>,

    /// CAR-encoded blocks referenced by the operations.
    #[serde(skip)]
    pub blocks: Vec<u8>,
}

/// An operation within a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum RepoOp {
    /// A new record at `path`.
    Create { path: String, cid: Option<String> },
    /// A replaced record at `path`.
    Update { path: String, cid: Option<String> },
    /// A removed record at `path`.
    Delete { path: String },
}

impl RepoOp {
    /// Returns the repository path (`<collection>/<rkey>`).
    pub fn path(&self) -> &str {
        match self {
            RepoOp::Create { path, .. } | RepoOp::Update { path, .. } | RepoOp::Delete { path } => {
                path
            }
        }
    }

    /// Returns the collection segment of the path.
    pub fn collection(&self) -> &str {
        self.path().split('/').next().unwrap_or_default()
    }
}

/// An identity update event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityEvent {
    /// The DID.
    pub did: String,

    /// Sequence number.
    pub seq: i64,

    /// Timestamp.
    pub time: String,

    /// The current handle, if the server included it.
    pub handle: Option<String>,
}

/// An account status event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountEvent {
    /// The DID.
    pub did: String,

    /// Sequence number.
    pub seq: i64,

    /// Timestamp.
    pub time: String,

    /// Whether the account is active.
    pub active: bool,

    /// Reason for inactivity (`takendown`, `suspended`, `deleted`, ...).
    pub status: Option<String>,
}

/// A handle update event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandleEvent {
    /// The DID.
    pub did: String,

    /// The new handle.
    pub handle: String,

    /// Sequence number.
    pub seq: i64,

    /// Timestamp.
    pub time: String,
}

/// A repository tombstone event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TombstoneEvent {
    /// The DID.
    pub did: String,

    /// Sequence number.
    pub seq: i64,

    /// Timestamp.
    pub time: String,
}

/// Stream info event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoEvent {
    /// The name of the info message.
    pub name: String,

    /// Optional message.
    pub message: Option<String>,
}
