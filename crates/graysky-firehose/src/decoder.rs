//! Commit decoding: repo ops plus CAR blocks into typed operations.

use serde::de::DeserializeOwned;
use tracing::debug;

use graysky_core::error::{DecodeError, ValidationError};
use graysky_core::{
    AtUri, Collection, CommitEvent, CreateOp, DeleteOp, OperationsByCollection, Record,
    RecordValue, RepoOp,
};

use crate::car::BlockStore;
use crate::cbor;

/// Decode a commit into operations grouped by collection.
///
/// Failures are scoped as narrowly as possible:
///
/// * a malformed block store, or a create or update whose block is missing,
///   fails the whole commit with a [`DecodeError`];
/// * an operation with an unusable path, or a record that does not match
///   its collection's schema, is dropped and logged, and the rest of the
///   commit is still returned.
///
/// Updates are reported as creates.
pub fn decode_commit(commit: &CommitEvent) -> Result<OperationsByCollection, DecodeError> {
    let has_writes = commit
        .ops
        .iter()
        .any(|op| !matches!(op, RepoOp::Delete { .. }));
    let blocks = if has_writes {
        BlockStore::parse(&commit.blocks)?
    } else {
        BlockStore::default()
    };

    let mut decoded = OperationsByCollection::new(commit.seq);

    for op in &commit.ops {
        let path = op.path();
        let uri = match AtUri::from_repo_path(&commit.repo, path) {
            Ok(uri) => uri,
            Err(e) => {
                drop_invalid(
                    commit.seq,
                    &ValidationError::Operation {
                        path: path.to_string(),
                        reason: e.to_string(),
                    },
                );
                continue;
            }
        };
        let collection = Collection::from_nsid(uri.collection().as_str());

        let cid = match op {
            RepoOp::Delete { .. } => {
                decoded.push_delete(
                    collection,
                    DeleteOp {
                        uri: uri.to_string(),
                    },
                );
                continue;
            }
            RepoOp::Create { cid, .. } | RepoOp::Update { cid, .. } => cid,
        };

        let Some(cid) = cid else {
            drop_invalid(
                commit.seq,
                &ValidationError::Operation {
                    path: path.to_string(),
                    reason: "write without a cid".to_string(),
                },
            );
            continue;
        };

        let block = blocks.get(cid).ok_or_else(|| DecodeError::MissingBlock {
            cid: cid.clone(),
            path: path.to_string(),
        })?;

        match decode_record(&uri, &collection, block) {
            Ok(record) => decoded.push_create(
                collection,
                CreateOp {
                    uri: uri.to_string(),
                    cid: cid.clone(),
                    author: commit.repo.to_string(),
                    record,
                },
            ),
            Err(e) => drop_invalid(commit.seq, &e),
        }
    }

    Ok(decoded)
}

fn drop_invalid(seq: i64, error: &ValidationError) {
    debug!(seq, error = %error, "Dropping invalid operation");
}

/// Decode one record block and validate it against its collection.
pub fn decode_record(
    uri: &AtUri,
    collection: &Collection,
    block: &[u8],
) -> Result<Record, ValidationError> {
    let uri_str = uri.to_string();

    let mut reader = block;
    let value = cbor::read_value(&mut reader)
        .and_then(|v| cbor::to_json(&v))
        .map_err(|reason| ValidationError::Cbor {
            uri: uri_str.clone(),
            reason,
        })?;

    let value = RecordValue::new(value).map_err(|e| ValidationError::Schema {
        uri: uri_str.clone(),
        reason: e.to_string(),
    })?;

    if let Collection::Other(_) = collection {
        return Ok(Record::Other(value));
    }

    if value.record_type() != collection.as_str() {
        return Err(ValidationError::Type {
            uri: uri_str,
            expected: collection.as_str().to_string(),
            found: Some(value.record_type().to_string()),
        });
    }

    match collection {
        Collection::Post => typed(&value, &uri_str).map(Record::Post),
        Collection::Repost => typed(&value, &uri_str).map(Record::Repost),
        Collection::Like => typed(&value, &uri_str).map(Record::Like),
        Collection::Follow => typed(&value, &uri_str).map(Record::Follow),
        Collection::Other(_) => Ok(Record::Other(value)),
    }
}

fn typed<T: DeserializeOwned>(value: &RecordValue, uri: &str) -> Result<T, ValidationError> {
    value.parse().map_err(|e| ValidationError::Schema {
        uri: uri.to_string(),
        reason: e.to_string(),
    })
}
