use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use futures_util::StreamExt;
use parking_lot::Mutex;
use rcstream_protocol::{StreamRequestBody, headers};
use url::Url;

use super::*;
use crate::error::Error;

#[derive(Debug, Clone)]
struct Captured {
	headers: HeaderMap,
	body: String,
}

type Seen = Arc<Mutex<Vec<Captured>>>;

async fn spawn_server(app: Router) -> SocketAddr {
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		axum::serve(listener, app).await.unwrap();
	});
	addr
}

async fn record(State(seen): State<Seen>, headers: HeaderMap, body: String) -> &'static str {
	seen.lock().push(Captured { headers, body });
	"{\"latestTemplateVersionNumber\": 5}"
}

fn request_to(addr: SocketAddr) -> StreamRequest {
	StreamRequest {
		url: Url::parse(&format!("http://{addr}/v1/projects/123/namespaces/ns1")).unwrap(),
		headers: vec![
			(headers::API_KEY, "key".to_string()),
			(headers::PACKAGE, "com.example.app".to_string()),
			(headers::CAN_RETRY, headers::CAN_RETRY_VALUE.to_string()),
			(
				headers::ACCEPT_RESPONSE_STREAMING,
				headers::ACCEPT_RESPONSE_STREAMING_VALUE.to_string(),
			),
			(headers::CONTENT_TYPE, headers::JSON.to_string()),
			(headers::ACCEPT, headers::JSON.to_string()),
		],
		body: StreamRequestBody::new("123", "ns1", 42),
	}
}

#[tokio::test]
async fn test_open_posts_headers_and_body() {
	let seen: Seen = Arc::default();
	let app = Router::new()
		.route("/v1/projects/{project}/namespaces/{namespace}", post(record))
		.with_state(seen.clone());
	let addr = spawn_server(app).await;

	let transport = HttpTransport::new().unwrap();
	let mut stream = transport.open(&request_to(addr)).await.unwrap();

	let mut received = Vec::new();
	while let Some(chunk) = stream.next().await {
		received.extend(chunk.unwrap());
	}
	assert_eq!(received, b"{\"latestTemplateVersionNumber\": 5}");

	let captured = seen.lock().clone();
	assert_eq!(captured.len(), 1);
	let request = &captured[0];
	assert_eq!(
		request.body,
		r#"{"project":"123","namespace":"ns1","lastKnownVersionNumber":"42"}"#
	);
	assert_eq!(request.headers["x-goog-api-key"], "key");
	assert_eq!(request.headers["x-android-package"], "com.example.app");
	assert_eq!(request.headers["x-google-gfe-can-retry"], "yes");
	assert_eq!(request.headers["x-accept-response-streaming"], "true");
	assert_eq!(request.headers["content-type"], "application/json");
	assert_eq!(request.headers["accept"], "application/json");
	assert!(request.headers.get("x-goog-firebase-installations-auth").is_none());
}

#[tokio::test]
async fn test_non_success_status_is_open_failure() {
	let app = Router::new().route(
		"/v1/projects/{project}/namespaces/{namespace}",
		post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
	);
	let addr = spawn_server(app).await;

	let transport = HttpTransport::new().unwrap();
	match transport.open(&request_to(addr)).await {
		Err(Error::TransportOpen(message)) => assert!(message.contains("503"), "{message}"),
		Err(other) => panic!("unexpected error: {other:?}"),
		Ok(_) => panic!("expected open failure"),
	}
}

#[tokio::test]
async fn test_refused_connection_is_open_failure() {
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	drop(listener);

	let transport = HttpTransport::new().unwrap();
	let result = transport.open(&request_to(addr)).await;
	assert!(matches!(result, Err(Error::TransportOpen(_))));
}
