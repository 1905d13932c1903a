//! End-to-end tests against a local WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

use livefeed::channel::{
    BackoffConfig, ChannelManager, ConnectionState, ManagerConfig, PageLocation, WsTransport,
};
use livefeed::store::FeedStore;

const TIMEOUT: Duration = Duration::from_secs(5);

/// What the server does on one accepted connection
struct Session {
    messages: Vec<&'static str>,
    /// Close the connection after sending instead of keeping it open
    close: bool,
}

/// Boot a server that plays one session per accepted connection and reports
/// the request path of each handshake.
async fn boot_server(sessions: Vec<Session>) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (path_tx, path_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for session in sessions {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let path_tx = path_tx.clone();
            let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                let _ = path_tx.send(req.uri().path().to_string());
                Ok(resp)
            };
            let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
                .await
                .unwrap();

            for text in session.messages {
                ws.send(Message::Text(text.to_string().into())).await.unwrap();
            }

            if session.close {
                let _ = ws.close(None).await;
            } else {
                tokio::spawn(async move {
                    while let Some(Ok(_)) = ws.next().await {}
                });
            }
        }
    });

    (addr, path_rx)
}

fn fast_config() -> ManagerConfig {
    ManagerConfig {
        connect_timeout_ms: 2000,
        backoff: BackoffConfig {
            initial_delay_ms: 50,
            max_delay_ms: 200,
            jitter: 0.0,
            ..Default::default()
        },
    }
}

async fn wait_for_content(store: &FeedStore, expected: &[&str]) {
    timeout(TIMEOUT, async {
        while store.unfetched() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("expected {:?}, got {:?}", expected, store.unfetched()));
}

#[tokio::test]
async fn test_receives_new_content() {
    let (addr, mut paths) = boot_server(vec![Session {
        messages: vec![
            r#"{"event": "new", "id": 101}"#,
            r#"{"event": "something-else", "id": 5}"#,
            "garbage",
            r#"{"event": "new", "id": 102}"#,
        ],
        close: false,
    }])
    .await;

    let store = Arc::new(FeedStore::new("public"));
    let page = PageLocation::parse(&format!("http://{}/streams/public/", addr)).unwrap();
    let manager = ChannelManager::new(
        fast_config(),
        page,
        store.clone(),
        Arc::new(WsTransport::new()),
    );

    manager.start().unwrap();
    wait_for_content(&store, &["101", "102"]).await;

    assert_eq!(paths.recv().await.unwrap(), "/ch/streams/public/");
    assert_eq!(manager.state(), ConnectionState::Open);

    let stats = manager.stats();
    assert_eq!(stats.messages_received, 4);
    assert_eq!(stats.decode_failures, 1);
    assert_eq!(stats.events_ignored, 1);

    manager.shutdown().await;
    assert_eq!(manager.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_reconnects_after_server_close() {
    let (addr, mut paths) = boot_server(vec![
        Session {
            messages: vec![r#"{"event": "new", "id": "a"}"#],
            close: true,
        },
        Session {
            messages: vec![r#"{"event": "new", "id": "b"}"#],
            close: false,
        },
    ])
    .await;

    let store = Arc::new(FeedStore::new("tag__rust"));
    let page = PageLocation::parse(&format!("http://{}/", addr)).unwrap();
    let manager = ChannelManager::new(
        fast_config(),
        page,
        store.clone(),
        Arc::new(WsTransport::new()),
    );

    manager.start().unwrap();
    wait_for_content(&store, &["a", "b"]).await;

    assert_eq!(paths.recv().await.unwrap(), "/ch/streams/tag__rust/");
    assert_eq!(paths.recv().await.unwrap(), "/ch/streams/tag__rust/");
    assert_eq!(manager.stats().connections_opened, 2);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_refused_connection_retries_until_stopped() {
    // Reserve a port, then free it so every attempt is refused
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let store = Arc::new(FeedStore::new("public"));
    let page = PageLocation::parse(&format!("http://{}/", addr)).unwrap();
    let manager = ChannelManager::new(
        fast_config(),
        page,
        store.clone(),
        Arc::new(WsTransport::new()),
    );
    manager.start().unwrap();

    let mut states = manager.subscribe_state();
    timeout(
        TIMEOUT,
        states.wait_for(|s| *s == ConnectionState::Reconnecting),
    )
    .await
    .unwrap()
    .unwrap();

    // Stopping while waiting to retry is final
    manager.stop();
    assert_eq!(manager.state(), ConnectionState::Closed);
    assert!(manager.start().is_err());

    timeout(TIMEOUT, manager.shutdown()).await.unwrap();
    assert!(store.unfetched().is_empty());
}
