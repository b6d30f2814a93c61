//! Repository event model.
//!
//! [`RepoEvent`] is what the wire codec produces for each firehose frame.
//! [`OperationsByCollection`] is what the operation decoder produces for each
//! commit, and what projections consume.

mod events;
mod ops;
mod record_value;
mod records;

pub use events::{
    AccountEvent, CommitEvent, HandleEvent, IdentityEvent, InfoEvent, RepoEvent, RepoOp,
    TombstoneEvent,
};
pub use ops::{Collection, CollectionOps, CreateOp, DeleteOp, OperationsByCollection};
pub use record_value::RecordValue;
pub use records::{FollowRecord, PostRecord, Record, ReplyRef, StrongRef, SubjectRecord};
