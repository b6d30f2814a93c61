//! Event-stream frame parsing.
//!
//! Each binary WebSocket message is two concatenated DAG-CBOR values: a
//! header `{op, t}` and a body. `op = 1` is a message whose type is named by
//! `t`; `op = -1` is an error frame with body `{error, message}`.

use ciborium::Value as Cbor;

use graysky_core::error::{DecodeError, TransportError};
use graysky_core::{
    AccountEvent, CommitEvent, Did, Error, HandleEvent, IdentityEvent, InfoEvent, RepoEvent, RepoOp,
    Result, TombstoneEvent,
};

use crate::cbor::{self, Fields};

const OP_MESSAGE: i64 = 1;
const OP_ERROR: i64 = -1;

/// Parse one binary frame into an event.
///
/// Error frames are returned as [`TransportError::Stream`]; the server closes
/// the connection after sending one.
pub fn parse_frame(data: &[u8]) -> Result<RepoEvent> {
    let mut reader = data;
    let header = cbor::read_value(&mut reader).map_err(|e| frame_error(format!("header: {e}")))?;
    let body = cbor::read_value(&mut reader).map_err(|e| frame_error(format!("body: {e}")))?;

    let header = Fields::new("header", &header).map_err(frame_error)?;
    match header.int("op").map_err(frame_error)? {
        OP_MESSAGE => {
            let kind = header.text("t").map_err(frame_error)?;
            parse_message(&kind, &body).map_err(|e| Error::from(frame_error(e)))
        }
        OP_ERROR => {
            let body = Fields::new("error frame", &body).map_err(frame_error)?;
            Err(TransportError::Stream {
                error: body.text("error").map_err(frame_error)?,
                message: body.opt_text("message").map_err(frame_error)?,
            }
            .into())
        }
        op => Err(frame_error(format!("unknown frame op {op}")).into()),
    }
}

fn frame_error(reason: impl Into<String>) -> DecodeError {
    DecodeError::Frame {
        reason: reason.into(),
    }
}

fn parse_message(kind: &str, body: &Cbor) -> std::result::Result<RepoEvent, String> {
    let fields = Fields::new(kind, body)?;
    Ok(match kind {
        "#commit" => RepoEvent::Commit(parse_commit(&fields)?),
        "#identity" => RepoEvent::Identity(IdentityEvent {
            did: fields.text("did")?,
            seq: fields.int("seq")?,
            time: fields.text("time")?,
            handle: fields.opt_text("handle")?,
        }),
        "#account" => RepoEvent::Account(AccountEvent {
            did: fields.text("did")?,
            seq: fields.int("seq")?,
            time: fields.text("time")?,
            active: fields.opt_bool("active")?.unwrap_or(true),
            status: fields.opt_text("status")?,
        }),
        "#handle" => RepoEvent::Handle(HandleEvent {
            did: fields.text("did")?,
            handle: fields.text("handle")?,
            seq: fields.int("seq")?,
            time: fields.text("time")?,
        }),
        "#tombstone" => RepoEvent::Tombstone(TombstoneEvent {
            did: fields.text("did")?,
            seq: fields.int("seq")?,
            time: fields.text("time")?,
        }),
        "#info" => RepoEvent::Info(InfoEvent {
            name: fields.text("name")?,
            message: fields.opt_text("message")?,
        }),
        other => RepoEvent::Unknown {
            kind: other.to_string(),
        },
    })
}

fn parse_commit(fields: &Fields<'_>) -> std::result::Result<CommitEvent, String> {
    let repo = fields.text("repo")?;
    let repo = Did::new(&repo).map_err(|e| format!("#commit: {e}"))?;

    let ops = fields
        .opt_array("ops")?
        .unwrap_or_default()
        .iter()
        .map(parse_op)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(CommitEvent {
        repo,
        rev: fields.opt_text("rev")?.unwrap_or_default(),
        seq: fields.int("seq")?,
        time: fields.text("time")?,
        commit: fields.opt_link("commit")?,
        too_big: fields.opt_bool("tooBig")?.unwrap_or(false),
        ops,
        blocks: fields.opt_bytes("blocks")?.unwrap_or_default().to_vec(),
    })
}

fn parse_op(value: &Cbor) -> std::result::Result<RepoOp, String> {
    let fields = Fields::new("repoOp", value)?;
    let path = fields.text("path")?;
    let cid = fields.opt_link("cid")?;

    match fields.text("action")?.as_str() {
        "create" => Ok(RepoOp::Create { path, cid }),
        "update" => Ok(RepoOp::Update { path, cid }),
        "delete" => Ok(RepoOp::Delete { path }),
        other => Err(format!("repoOp: unknown action '{other}'")),
    }
}
