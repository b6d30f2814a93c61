//! graysky-store - SQLite storage for the Graysky ingress.
//!
//! One database file holds the post projection and the stream cursor. Both
//! share a [`Database`] handle, which also holds the single-consumer lock.

mod cursor;
mod db;
mod posts;
pub mod schema;

pub use cursor::SqliteCursorStore;
pub use db::Database;
pub use posts::{PostProjection, PostRow};
