//! Firehose sessions over WebSocket.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_util::{SinkExt, Stream, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};

use graysky_core::error::{Error, TransportError};
use graysky_core::{FirehoseConnector, RepoEvent, Result, ServiceUrl};

use crate::frame::parse_frame;

/// One `subscribeRepos` session.
///
/// Yields one item per binary frame. The stream ends after a close frame or
/// a transport error; an error frame from the server is yielded as a
/// transport error and also ends the stream.
pub struct WsFirehose {
    inner: Pin<Box<dyn Stream<Item = Result<RepoEvent>> + Send>>,
}

impl WsFirehose {
    pub(crate) fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<RepoEvent>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Connect to `service`, resuming after `cursor` when given.
    pub async fn connect(service: &ServiceUrl, cursor: Option<i64>) -> Result<Self> {
        let ws_url = service.subscribe_url(cursor);
        info!(url = %ws_url, "Connecting to firehose");

        let (ws_stream, _) = connect_async(ws_url.as_str()).await.map_err(|e| {
            Error::Transport(TransportError::Connection {
                message: e.to_string(),
            })
        })?;

        debug!("WebSocket connected, listening for events");

        let stream = async_stream::stream! {
            let (mut write, mut read) = ws_stream.split();

            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Binary(data)) => {
                        let event = parse_frame(&data);
                        let ended = matches!(&event, Err(e) if e.is_transport());
                        yield event;
                        if ended {
                            break;
                        }
                    }
                    Ok(Message::Ping(data)) => {
                        trace!("Received ping");
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            warn!(error = %e, "Failed to send pong");
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        info!(?frame, "WebSocket closed by server");
                        break;
                    }
                    Ok(Message::Text(text)) => {
                        trace!(len = text.len(), "Ignoring text message");
                    }
                    Ok(Message::Pong(_) | Message::Frame(_)) => {}
                    Err(e) => {
                        yield Err(Error::Transport(TransportError::WebSocket {
                            message: e.to_string(),
                        }));
                        break;
                    }
                }
            }
        };

        Ok(Self::new(stream))
    }
}

impl Stream for WsFirehose {
    type Item = Result<RepoEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// Opens [`WsFirehose`] sessions against one service.
#[derive(Debug, Clone)]
pub struct WsConnector {
    service: ServiceUrl,
}

impl WsConnector {
    pub fn new(service: ServiceUrl) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &ServiceUrl {
        &self.service
    }
}

#[async_trait]
impl FirehoseConnector for WsConnector {
    type Firehose = WsFirehose;

    async fn connect(&self, cursor: Option<i64>) -> Result<WsFirehose> {
        WsFirehose::connect(&self.service, cursor).await
    }
}
