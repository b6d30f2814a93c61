//! AT Protocol identifier types.
//!
//! These types enforce protocol invariants at construction time, so the
//! decoder can reject a bad repository path once instead of re-checking it
//! in every consumer.

mod at_uri;
mod did;
mod nsid;
mod rkey;
mod service_url;

pub use at_uri::AtUri;
pub use did::Did;
pub use nsid::Nsid;
pub use rkey::Rkey;
pub use service_url::ServiceUrl;
