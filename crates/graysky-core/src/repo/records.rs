//! Typed records for the collections the ingress understands.

use serde::{Deserialize, Serialize};

use super::RecordValue;
use crate::types::Did;

/// A decoded record value.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// `app.bsky.feed.post`
    Post(PostRecord),
    /// `app.bsky.feed.repost`
    Repost(SubjectRecord),
    /// `app.bsky.feed.like`
    Like(SubjectRecord),
    /// `app.bsky.graph.follow`
    Follow(FollowRecord),
    /// Any other collection, kept as its JSON form.
    Other(RecordValue),
}

/// A reference to a specific version of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrongRef {
    pub uri: String,
    pub cid: String,
}

/// Thread linkage of a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    /// The post being replied to.
    pub parent: StrongRef,
    /// The top of the thread.
    pub root: StrongRef,
}

/// A post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    pub text: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplyRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub langs: Vec<String>,
}

impl PostRecord {
    /// Returns true for a top-level post.
    pub fn is_root(&self) -> bool {
        self.reply.is_none()
    }
}

/// A like or repost: a pointer at another record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRecord {
    pub subject: StrongRef,
    pub created_at: String,
}

/// A follow of another account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRecord {
    pub subject: Did,
    pub created_at: String,
}
