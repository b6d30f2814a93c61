//! graysky-core - Core types and traits for the Graysky firehose ingress.
//!
//! This crate holds the pieces shared by the wire decoder, the storage layer
//! and the daemon: validated AT Protocol identifiers, the repository event
//! model, the decoded operation model, the error taxonomy, and the traits
//! that separate stream transport from projection logic.

pub mod error;
pub mod repo;
pub mod traits;
pub mod types;

pub use error::Error;
pub use repo::{
    AccountEvent, Collection, CollectionOps, CommitEvent, CreateOp, DeleteOp, FollowRecord,
    HandleEvent, IdentityEvent, InfoEvent, OperationsByCollection, PostRecord, Record,
    RecordValue, ReplyRef, RepoEvent, RepoOp, StrongRef, SubjectRecord, TombstoneEvent,
};
pub use traits::{CursorStore, Firehose, FirehoseConnector, ProjectionWriter};
pub use types::{AtUri, Did, Nsid, Rkey, ServiceUrl};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
