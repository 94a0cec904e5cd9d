use super::*;
use crate::Config;
use crate::archive::NoOpArchiveHandler;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tower::ServiceExt;


/// Node with the no-op archive handler so tests never depend on tar/gzip
async fn create_test_node(config: Config) -> Arc<Node> {
    Arc::new(
        Node::with_archive_handler(config, Arc::new(NoOpArchiveHandler))
            .await
            .unwrap(),
    )
}

fn master_config() -> Config {
    Config {
        master: true,
        public_host: Some("10.0.0.1".into()),
        ..Default::default()
    }
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_control_server_serves_and_shuts_down() {
    let node = create_test_node(Config::default()).await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(serve_control(listener, node, async {
        let _ = rx.await;
    }));

    let health: Value = reqwest::get(format!("http://127.0.0.1:{}/api/health", port))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_worker_announces_itself_when_serving() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let master = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/register-node"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&master)
        .await;

    let node = create_test_node(Config {
        master_host: Some(master.address().ip().to_string()),
        master_port: master.address().port(),
        ..Default::default()
    })
    .await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(serve_control(listener, node, async {
        let _ = rx.await;
    }));

    for _ in 0..50 {
        if !master.received_requests().await.unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tx.send(()).unwrap();
    server.await.unwrap().unwrap();
    master.verify().await;
}

#[tokio::test]
async fn test_worker_serves_even_if_master_is_down() {
    let dead_port = {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    };
    let node = create_test_node(Config {
        master_host: Some("127.0.0.1".into()),
        master_port: dead_port,
        ..Default::default()
    })
    .await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(serve_control(listener, node, async {
        let _ = rx.await;
    }));

    let response = reqwest::get(format!("http://127.0.0.1:{}/api/health", port))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_swagger_ui_enabled() {
    let mut config = Config::default();
    config.api.swagger_ui = true;
    let app = create_router(create_test_node(config).await);

    let response = app.oneshot(get("/swagger-ui/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_swagger_ui_disabled_by_default() {
    let app = create_router(create_test_node(Config::default()).await);

    let response = app.oneshot(get("/swagger-ui/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
