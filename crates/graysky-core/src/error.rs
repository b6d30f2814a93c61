//! Error types for the ingress.
//!
//! One error type with explicit variants for each failure class the
//! subscriber reacts to differently: decode and validation failures skip
//! data, transport failures reconnect, storage failures retry and then stop
//! the process.

use thiserror::Error;

/// The unified error type for ingress operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (connection, WebSocket, error frames, idle timeout).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Malformed frames, block stores, or unresolvable content references.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Well-formed records that do not match their schema.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Local storage failures.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Input validation errors (invalid DID, NSID, URI format).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),
}

impl Error {
    /// Returns true if the current stream session should be torn down.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// The WebSocket stream failed after it was established.
    #[error("websocket error: {message}")]
    WebSocket { message: String },

    /// The server sent an error frame.
    #[error("stream error [{error}]{}", message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Stream {
        error: String,
        message: Option<String>,
    },

    /// No frame arrived within the idle timeout.
    #[error("no frames received for {duration_ms}ms")]
    Idle { duration_ms: u64 },
}

/// Errors decoding wire data.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The event-stream frame could not be parsed.
    #[error("malformed frame: {reason}")]
    Frame { reason: String },

    /// The CAR block store could not be parsed.
    #[error("malformed CAR: {reason}")]
    Car { reason: String },

    /// An operation references a block that is not in the commit.
    #[error("block {cid} missing from commit for {path}")]
    MissingBlock { cid: String, path: String },
}

/// Record-level schema errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The record bytes are not a valid DAG-CBOR object.
    #[error("record {uri} is not valid CBOR: {reason}")]
    Cbor { uri: String, reason: String },

    /// The record `$type` does not match its collection.
    #[error("record {uri} has type {found:?}, expected {expected}")]
    Type {
        uri: String,
        expected: String,
        found: Option<String>,
    },

    /// The record is missing fields or has fields of the wrong shape.
    #[error("record {uri} does not match schema: {reason}")]
    Schema { uri: String, reason: String },

    /// The operation itself is unusable (bad path, create without cid).
    #[error("operation {path} is invalid: {reason}")]
    Operation { path: String, reason: String },
}

/// Storage-level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database rejected a statement.
    #[error("database error: {message}")]
    Database { message: String },

    /// Filesystem error around the database.
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Another process holds the consumer lock.
    #[error("database {path} is locked by another ingress process")]
    Locked { path: String },

    /// A blocking storage task did not complete.
    #[error("storage task failed: {message}")]
    Task { message: String },
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid DID format.
    #[error("invalid DID '{value}': {reason}")]
    Did { value: String, reason: String },

    /// Invalid NSID format.
    #[error("invalid NSID '{value}': {reason}")]
    Nsid { value: String, reason: String },

    /// Invalid AT URI format.
    #[error("invalid AT URI '{value}': {reason}")]
    AtUri { value: String, reason: String },

    /// Invalid service URL format.
    #[error("invalid service URL '{value}': {reason}")]
    ServiceUrl { value: String, reason: String },

    /// Invalid record key format.
    #[error("invalid rkey '{value}': {reason}")]
    Rkey { value: String, reason: String },

    /// Invalid record value.
    #[error("invalid record value: {reason}")]
    RecordValue { reason: String },
}
