//! Decoded commit operations grouped by collection.

use std::collections::BTreeMap;
use std::fmt;

use super::Record;

/// The collection an operation belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Post,
    Repost,
    Like,
    Follow,
    /// Any collection without a typed model, by NSID.
    Other(String),
}

impl Collection {
    pub const POST: &'static str = "app.bsky.feed.post";
    pub const REPOST: &'static str = "app.bsky.feed.repost";
    pub const LIKE: &'static str = "app.bsky.feed.like";
    pub const FOLLOW: &'static str = "app.bsky.graph.follow";

    /// Classify a collection NSID.
    pub fn from_nsid(nsid: &str) -> Self {
        match nsid {
            Self::POST => Collection::Post,
            Self::REPOST => Collection::Repost,
            Self::LIKE => Collection::Like,
            Self::FOLLOW => Collection::Follow,
            other => Collection::Other(other.to_string()),
        }
    }

    /// Returns the collection NSID.
    pub fn as_str(&self) -> &str {
        match self {
            Collection::Post => Self::POST,
            Collection::Repost => Self::REPOST,
            Collection::Like => Self::LIKE,
            Collection::Follow => Self::FOLLOW,
            Collection::Other(nsid) => nsid,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record that was created or replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOp {
    /// Record URI.
    pub uri: String,
    /// Content id of the record version.
    pub cid: String,
    /// DID of the repository that wrote the record.
    pub author: String,
    /// The decoded record.
    pub record: Record,
}

/// A record that was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOp {
    /// Record URI.
    pub uri: String,
}

/// The operations of one collection within one commit, in commit order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionOps {
    /// Creates and updates.
    pub creates: Vec<CreateOp>,
    /// Deletes.
    pub deletes: Vec<DeleteOp>,
}

impl CollectionOps {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.deletes.is_empty()
    }
}

/// All operations of one commit, grouped by collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationsByCollection {
    commit_seq: i64,
    by_collection: BTreeMap<Collection, CollectionOps>,
}

impl OperationsByCollection {
    /// Empty set of operations for the commit with sequence number `seq`.
    pub fn new(seq: i64) -> Self {
        Self {
            commit_seq: seq,
            by_collection: BTreeMap::new(),
        }
    }

    /// Sequence number of the commit these operations came from.
    pub fn seq(&self) -> i64 {
        self.commit_seq
    }

    /// Append a create or update.
    pub fn push_create(&mut self, collection: Collection, op: CreateOp) {
        self.by_collection.entry(collection).or_default().creates.push(op);
    }

    /// Append a delete.
    pub fn push_delete(&mut self, collection: Collection, op: DeleteOp) {
        self.by_collection.entry(collection).or_default().deletes.push(op);
    }

    /// Operations for one collection, if the commit touched it.
    pub fn get(&self, collection: &Collection) -> Option<&CollectionOps> {
        self.by_collection.get(collection)
    }

    /// Operations on `app.bsky.feed.post`.
    pub fn posts(&self) -> Option<&CollectionOps> {
        self.get(&Collection::Post)
    }

    /// Iterate over collections in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = (&Collection, &CollectionOps)> {
        self.by_collection.iter()
    }

    /// Total number of operations across all collections.
    pub fn len(&self) -> usize {
        self.by_collection
            .values()
            .map(|ops| ops.creates.len() + ops.deletes.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_collection.values().all(CollectionOps::is_empty)
    }
}
