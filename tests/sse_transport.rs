//! End-to-end checks of the SSE session transport through the actix App.

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use actix_web::body::{BoxBody, MessageBody};
use actix_web::{App, http::StatusCode, test, web};
use serde_json::{Value, json};

use mcp_sse_server::core::dispatcher::ServerInfo;
use mcp_sse_server::core::registry::ToolRegistry;
use mcp_sse_server::core::server::{AppState, configure};
use mcp_sse_server::tools::calc;

fn state() -> web::Data<AppState> {
    let mut tools = ToolRegistry::new();
    calc::register(&mut tools).unwrap();
    web::Data::new(AppState::new(
        ServerInfo {
            name: "test".into(),
            version: "1.0.0".into(),
        },
        Arc::new(tools),
        Duration::from_secs(60),
    ))
}

/// Next SSE frame from a streaming body.
async fn next_frame(body: &mut Pin<Box<BoxBody>>) -> String {
    let chunk = tokio::time::timeout(
        Duration::from_secs(2),
        poll_fn(|cx| body.as_mut().poll_next(cx)),
    )
    .await
    .expect("timed out waiting for frame")
    .expect("stream ended")
    .expect("stream error");
    String::from_utf8(chunk.to_vec()).unwrap()
}

/// Payload of the `data:` line of a frame.
fn frame_data(frame: &str) -> &str {
    frame
        .lines()
        .find_map(|l| l.strip_prefix("data: "))
        .expect("frame has data")
}

#[actix_rt::test]
async fn session_lifecycle_over_http() {
    let state = state();
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/sse").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    let mut body = Box::pin(resp.into_body());

    let endpoint = next_frame(&mut body).await;
    assert!(endpoint.starts_with("event: endpoint\n"));
    let path = frame_data(&endpoint).to_string();
    assert!(path.starts_with("/messages/?session_id="));
    assert_eq!(state.sessions().len(), 1);

    let req = test::TestRequest::post()
        .uri(&path)
        .set_payload(
            json!({
                "jsonrpc": "2.0",
                "id": "call-1",
                "method": "tools/call",
                "params": {"name": "add", "arguments": {"a": 2, "b": 3}}
            })
            .to_string(),
        )
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let frame = next_frame(&mut body).await;
    assert!(frame.starts_with("event: message\n"));
    let msg: Value = serde_json::from_str(frame_data(&frame)).unwrap();
    assert_eq!(msg["id"], "call-1");
    assert_eq!(msg["result"]["content"][0]["text"], "5");

    // Client disconnects: the body is dropped and the session goes away.
    drop(body);
    assert!(state.sessions().is_empty());

    let req = test::TestRequest::post()
        .uri(&path)
        .set_payload(r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn bad_session_ids_are_rejected() {
    let app = test::init_service(App::new().app_data(state()).configure(configure)).await;

    let missing = test::TestRequest::post()
        .uri("/messages/")
        .set_payload("{}")
        .to_request();
    assert_eq!(
        test::call_service(&app, missing).await.status(),
        StatusCode::BAD_REQUEST
    );

    let garbage = test::TestRequest::post()
        .uri("/messages/?session_id=zzz")
        .set_payload("{}")
        .to_request();
    assert_eq!(
        test::call_service(&app, garbage).await.status(),
        StatusCode::BAD_REQUEST
    );

    let unknown = test::TestRequest::post()
        .uri("/messages/?session_id=6f1c2a7e9b2d4c1fa3e5d7b9c1e3f5a7")
        .set_payload(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#)
        .to_request();
    assert_eq!(
        test::call_service(&app, unknown).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[actix_rt::test]
async fn unparseable_message_is_bad_request() {
    let state = state();
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;
    let resp = test::call_service(&app, test::TestRequest::get().uri("/sse").to_request()).await;
    let mut body = Box::pin(resp.into_body());
    let path = frame_data(&next_frame(&mut body).await).to_string();

    let req = test::TestRequest::post()
        .uri(&path)
        .set_payload("not json")
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );
    let frame = next_frame(&mut body).await;
    let msg: Value = serde_json::from_str(frame_data(&frame)).unwrap();
    assert_eq!(msg["error"]["code"], -32700);
}

#[actix_rt::test]
async fn discovery_needs_no_session() {
    let state = state();
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

    let resp: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/tools").to_request(),
    )
    .await;
    assert_eq!(resp["count"], 4);
    assert_eq!(resp["tools"][0]["name"], "add");
    assert_eq!(
        resp["tools"][0]["inputSchema"]["required"],
        json!(["a", "b"])
    );
    assert!(state.sessions().is_empty());

    let metrics: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/metrics").to_request(),
    )
    .await;
    assert_eq!(metrics["sessions_open"], 0);
}
