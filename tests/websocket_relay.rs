//! WebSocket relaying through the proxy.

use axum::http::HeaderValue;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, client::IntoClientRequest},
};

mod common;

const PREFIX: &str = "/api/upstream";

#[tokio::test]
async fn relays_frames_bidirectionally() {
    let origin = common::start_origin().await;
    let (proxy, _shutdown) = common::start_proxy(origin, PREFIX).await;

    let (mut socket, _response) = connect_async(format!("ws://{proxy}{PREFIX}/ws"))
        .await
        .expect("upgrade through the proxy should succeed");

    socket
        .send(tungstenite::Message::text("ping over relay"))
        .await
        .unwrap();
    let echoed = socket.next().await.unwrap().unwrap();
    assert_eq!(echoed, tungstenite::Message::text("ping over relay"));

    socket
        .send(tungstenite::Message::binary(vec![0u8, 159, 146, 150]))
        .await
        .unwrap();
    let echoed = socket.next().await.unwrap().unwrap();
    assert_eq!(echoed, tungstenite::Message::binary(vec![0u8, 159, 146, 150]));

    socket.close(None).await.unwrap();
}

#[tokio::test]
async fn forwards_end_to_end_headers_on_upgrade() {
    let origin = common::start_origin().await;
    let (proxy, _shutdown) = common::start_proxy(origin, PREFIX).await;

    let mut request = format!("ws://{proxy}{PREFIX}/ws-headers")
        .into_client_request()
        .unwrap();
    request.headers_mut().insert(
        "authorization",
        HeaderValue::from_static("Bearer relay-token"),
    );

    let (mut socket, _response) = connect_async(request).await.unwrap();

    // The origin reports the Authorization header it observed on the
    // upgrade request as its first frame.
    let observed = socket.next().await.unwrap().unwrap();
    assert_eq!(observed, tungstenite::Message::text("Bearer relay-token"));
}

#[tokio::test]
async fn reflects_the_subprotocol_accepted_by_the_origin() {
    let origin = common::start_origin().await;
    let (proxy, _shutdown) = common::start_proxy(origin, PREFIX).await;

    let mut request = format!("ws://{proxy}{PREFIX}/ws-proto")
        .into_client_request()
        .unwrap();
    request.headers_mut().insert(
        "sec-websocket-protocol",
        HeaderValue::from_static("phoenix"),
    );

    let (_socket, response) = connect_async(request).await.unwrap();

    let negotiated = response
        .headers()
        .get("sec-websocket-protocol")
        .and_then(|value| value.to_str().ok());
    assert_eq!(negotiated, Some("phoenix"));
}

#[tokio::test]
async fn upgrade_path_is_prefix_stripped() {
    let origin = common::start_origin().await;
    let (proxy, _shutdown) = common::start_proxy(origin, PREFIX).await;

    // The origin only serves websockets on /ws; reaching it proves the
    // prefix was deleted from the upgrade request's path.
    let result = connect_async(format!("ws://{proxy}{PREFIX}/ws")).await;
    assert!(result.is_ok(), "upgrade failed: {:?}", result.err());

    // Off the websocket path the origin's fallback answers 200 to the
    // upgrade, the relay's own handshake fails, and the proxy reports it.
    let err = connect_async(format!("ws://{proxy}/ws-nowhere"))
        .await
        .unwrap_err();
    match err {
        tungstenite::Error::Http(response) => {
            assert_ne!(response.status(), 101);
        }
        other => panic!("expected an http error, got {other:?}"),
    }
}

#[tokio::test]
async fn upgrade_fails_when_origin_is_unreachable() {
    let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = dead.local_addr().unwrap();
    drop(dead);

    let (proxy, _shutdown) = common::start_proxy(addr, PREFIX).await;

    let err = connect_async(format!("ws://{proxy}{PREFIX}/ws"))
        .await
        .unwrap_err();
    match err {
        tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), 502);
        }
        other => panic!("expected an http error, got {other:?}"),
    }
}
