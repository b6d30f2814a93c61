//! Seams between stream transport, projection logic and storage.

mod cursor;
mod firehose;
mod projection;

pub use cursor::CursorStore;
pub use firehose::{Firehose, FirehoseConnector};
pub use projection::ProjectionWriter;
