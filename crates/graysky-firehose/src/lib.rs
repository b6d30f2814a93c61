//! graysky-firehose - Firehose decoding and subscription.
//!
//! Turns `com.atproto.sync.subscribeRepos` frames into decoded, per-collection
//! operations and drives a [`ProjectionWriter`](graysky_core::ProjectionWriter)
//! and a [`CursorStore`](graysky_core::CursorStore) with them, reconnecting
//! from the stored cursor whenever the connection drops.
//!
//! ```no_run
//! # async fn example<W, S>(writer: W, store: S) -> graysky_core::Result<()>
//! # where W: graysky_core::ProjectionWriter, S: graysky_core::CursorStore {
//! use graysky_core::ServiceUrl;
//! use graysky_firehose::{Subscriber, SubscriberConfig, WsConnector};
//! use tokio_util::sync::CancellationToken;
//!
//! let service = ServiceUrl::new("https://bsky.network")?;
//! let mut subscriber = Subscriber::new(
//!     WsConnector::new(service),
//!     writer,
//!     store,
//!     SubscriberConfig::default(),
//! );
//! subscriber.run(CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

mod backoff;
mod car;
mod cbor;
mod cursor;
mod decoder;
mod frame;
mod subscriber;
mod websocket;

pub use backoff::Backoff;
pub use car::BlockStore;
pub use decoder::{decode_commit, decode_record};
pub use frame::parse_frame;
pub use subscriber::{Subscriber, SubscriberConfig, SubscriberState};
pub use websocket::{WsConnector, WsFirehose};
