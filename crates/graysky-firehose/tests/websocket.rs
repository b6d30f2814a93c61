//! The WebSocket connector against a local server.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::*;
use futures_util::{SinkExt, StreamExt};
use graysky_core::ServiceUrl;
use graysky_firehose::{Subscriber, SubscriberConfig, WsConnector};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_util::sync::CancellationToken;

fn create(seq: i64) -> Vec<u8> {
    CommitBuilder::new(seq)
        .create(&post_path(&format!("p{seq}")), &post_record("hi", None))
        .frame()
}

/// Accept one connection per batch, send its frames, then close.
/// Returns the request URI of each connection.
async fn serve(listener: TcpListener, batches: Vec<Vec<Vec<u8>>>) -> Vec<String> {
    let mut uris = Vec::new();
    for frames in batches {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut uri = String::new();
        let record_uri = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            uri = req.uri().to_string();
            Ok(resp)
        };
        let mut ws = accept_hdr_async(tcp, record_uri).await.unwrap();
        uris.push(uri);

        // The client may hang up early, so send errors are ignored.
        let _ = ws.send(Message::Ping(Vec::new().into())).await;
        for frame in frames {
            let _ = ws.send(Message::Binary(frame.into())).await;
        }
        let _ = ws.close(None).await;
        while let Some(Ok(_)) = ws.next().await {}
    }
    uris
}

#[tokio::test]
async fn resumes_with_cursor_after_server_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(serve(
        listener,
        vec![vec![create(1), create(2)], vec![create(3)]],
    ));

    let service = ServiceUrl::new(format!("ws://127.0.0.1:{port}")).unwrap();
    let writer = MemoryProjection::default();
    let store = MemoryCursorStore::default();
    let mut subscriber = Subscriber::new(
        WsConnector::new(service),
        writer.clone(),
        store.clone(),
        test_config(),
    );

    let shutdown = CancellationToken::new();
    let run = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { subscriber.run(shutdown).await }
    });

    tokio::time::timeout(Duration::from_secs(10), async {
        while writer.applied().len() < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("events were not applied");

    shutdown.cancel();
    run.await.unwrap().unwrap();

    let uris = server.await.unwrap();
    assert!(
        uris[0].ends_with("/xrpc/com.atproto.sync.subscribeRepos"),
        "{}",
        uris[0]
    );
    assert!(uris[1].ends_with("?cursor=2"), "{}", uris[1]);
    assert_eq!(writer.applied(), vec![1, 2, 3]);
    assert_eq!(store.value(), Some(3));
}

#[tokio::test]
async fn error_frame_ends_the_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(serve(
        listener,
        vec![vec![
            create(1),
            error_frame("FutureCursor", "Cursor in the future."),
            create(2),
        ]],
    ));

    let service = ServiceUrl::new(format!("ws://127.0.0.1:{port}")).unwrap();
    let mut firehose = graysky_firehose::WsFirehose::connect(&service, Some(0))
        .await
        .unwrap();

    assert_eq!(firehose.next().await.unwrap().unwrap().seq(), Some(1));
    assert!(firehose.next().await.unwrap().unwrap_err().is_transport());
    assert!(firehose.next().await.is_none());

    drop(firehose);
    let uris = server.await.unwrap();
    assert!(uris[0].ends_with("?cursor=0"), "{}", uris[0]);
}

#[tokio::test]
async fn silent_server_does_not_stall_reconnects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accepts = Arc::new(AtomicUsize::new(0));

    // Accept TCP and never answer the upgrade request.
    let server = tokio::spawn({
        let accepts = accepts.clone();
        async move {
            let mut held = Vec::new();
            while let Ok((tcp, _)) = listener.accept().await {
                accepts.fetch_add(1, Ordering::SeqCst);
                held.push(tcp);
            }
        }
    });

    let service = ServiceUrl::new(format!("ws://127.0.0.1:{port}")).unwrap();
    let config = SubscriberConfig {
        connect_timeout: Duration::from_millis(200),
        ..test_config()
    };
    let mut subscriber = Subscriber::new(
        WsConnector::new(service),
        MemoryProjection::default(),
        MemoryCursorStore::default(),
        config,
    );

    let shutdown = CancellationToken::new();
    let run = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { subscriber.run(shutdown).await }
    });

    tokio::time::timeout(Duration::from_secs(10), async {
        while accepts.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("subscriber never retried the stalled connection");

    shutdown.cancel();
    run.await.unwrap().unwrap();
    server.abort();
}
