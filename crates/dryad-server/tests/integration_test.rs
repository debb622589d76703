use axum::body::Body;
use axum::http::{Request, StatusCode};
use dryad_runtime::MockBackend;
use dryad_server::{create_router, AppState, ServerConfig};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_config() -> ServerConfig {
    ServerConfig {
        model_name: "test-model".to_string(),
        max_tokens: 32,
        default_temperature: 0.7,
        host: "127.0.0.1".to_string(),
        port: 8000,
        ..ServerConfig::default()
    }
}

fn test_state() -> AppState {
    AppState::new(MockBackend::new(64).with_reply("hello"), test_config())
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));
    (status, json)
}

// -- Health / discovery --

#[tokio::test]
async fn health_returns_ok() {
    let (status, json) = send(create_router(test_state()), get_request("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["busy"], false);
}

#[tokio::test]
async fn serviceinfo_advertises_openai_base_url() {
    let (status, json) = send(
        create_router(test_state()),
        get_request("/.well-known/serviceinfo"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["software"]["name"], "Dryad");
    assert_eq!(json["api"]["openai"]["base_url"], "http://127.0.0.1:8000/v1");
}

#[tokio::test]
async fn models_lists_the_served_model() {
    let (status, json) = send(create_router(test_state()), get_request("/v1/models")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["object"], "list");
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"][0]["id"], "test-model");
    assert_eq!(json["data"][0]["object"], "model");
    assert_eq!(json["data"][0]["owned_by"], "dryad");
}

#[tokio::test]
async fn openai_routes_can_be_disabled() {
    let config = ServerConfig {
        serve_openai: false,
        ..test_config()
    };
    let app = create_router(AppState::new(MockBackend::default(), config));

    let (status, _) = send(app.clone(), get_request("/v1/models")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, json) = send(app, get_request("/.well-known/serviceinfo")).await;
    assert!(json["api"].get("openai").is_none());
}

#[tokio::test]
async fn cors_is_permissive() {
    let req = Request::builder()
        .uri("/health")
        .header("origin", "http://example.com")
        .body(Body::empty())
        .unwrap();
    let resp = create_router(test_state()).oneshot(req).await.unwrap();
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .unwrap()
            .to_str()
            .unwrap(),
        "*"
    );
}

// -- Completions --

#[tokio::test]
async fn completion_response_shape() {
    let req = json_request(
        "/v1/completions",
        json!({"model": "test-model", "prompt": "say hi", "temperature": 0.0}),
    );
    let (status, json) = send(create_router(test_state()), req).await;
    assert_eq!(status, StatusCode::OK, "body: {json}");

    assert!(json["id"].as_str().unwrap().starts_with("cmpl-"));
    assert_eq!(json["object"], "text_completion");
    assert_eq!(json["model"], "test-model");
    assert!(json["created"].as_u64().unwrap() > 0);
    assert_eq!(json["choices"][0]["index"], 0);
    assert_eq!(json["choices"][0]["text"], "hello");
    assert_eq!(json["choices"][0]["finish_reason"], "stop");
    assert_eq!(json["usage"]["prompt_tokens"], 6);
    assert_eq!(json["usage"]["completion_tokens"], 5);
    assert_eq!(json["usage"]["total_tokens"], 11);
}

#[tokio::test]
async fn completion_stops_at_max_tokens() {
    let req = json_request(
        "/v1/completions",
        json!({"prompt": "x", "max_tokens": 2, "temperature": 0.0}),
    );
    let (status, json) = send(create_router(test_state()), req).await;
    assert_eq!(status, StatusCode::OK, "body: {json}");
    assert_eq!(json["choices"][0]["text"], "he");
    assert_eq!(json["choices"][0]["finish_reason"], "length");
}

#[tokio::test]
async fn completion_accepts_sampling_extensions() {
    let req = json_request(
        "/v1/completions",
        json!({
            "prompt": "x",
            "temperature": 0.8,
            "top_k": 40,
            "top_p": 0.95,
            "seed": 1234,
            "dynatemp_min": 0.5,
            "dynatemp_max": 1.5,
            "dynatemp_exponent": 1.0
        }),
    );
    let (status, json) = send(create_router(test_state()), req).await;
    assert_eq!(status, StatusCode::OK, "body: {json}");
    // The mock backend's logits are peaked hard enough to survive sampling.
    assert_eq!(json["choices"][0]["text"], "hello");
}

#[tokio::test]
async fn unit_temperature_completion() {
    let req = json_request(
        "/v1/completions",
        json!({"prompt": "say hi", "temperature": 1.0, "seed": 42}),
    );
    let (status, json) = send(create_router(test_state()), req).await;
    assert_eq!(status, StatusCode::OK, "body: {json}");
    assert_eq!(json["choices"][0]["text"], "hello");
}

#[tokio::test]
async fn sequential_requests_share_the_backend() {
    let app = create_router(test_state());
    for _ in 0..3 {
        let req = json_request("/v1/completions", json!({"prompt": "again"}));
        let (status, json) = send(app.clone(), req).await;
        assert_eq!(status, StatusCode::OK, "body: {json}");
        assert_eq!(json["choices"][0]["text"], "hello");
    }
}

#[tokio::test]
async fn empty_prompt_completes_empty() {
    let req = json_request("/v1/completions", json!({"prompt": ""}));
    let (status, json) = send(create_router(test_state()), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["choices"][0]["text"], "");
    assert_eq!(json["usage"]["total_tokens"], 0);
}

// -- Errors --

#[tokio::test]
async fn negative_temperature_is_bad_request() {
    let req = json_request(
        "/v1/completions",
        json!({"prompt": "x", "temperature": -1.0}),
    );
    let (status, json) = send(create_router(test_state()), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn out_of_range_top_p_is_bad_request() {
    let req = json_request("/v1/completions", json!({"prompt": "x", "top_p": 1.5}));
    let (status, json) = send(create_router(test_state()), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]["message"].as_str().unwrap().contains("top_p"));
}

#[tokio::test]
async fn missing_prompt_is_rejected() {
    let req = json_request("/v1/completions", json!({"max_tokens": 3}));
    let (status, _) = send(create_router(test_state()), req).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn backend_failure_is_server_error() {
    let backend = MockBackend::new(64).with_decode_failure(0, 1);
    let app = create_router(AppState::new(backend, test_config()));

    let req = json_request("/v1/completions", json!({"prompt": "x"}));
    let (status, json) = send(app.clone(), req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["type"], "server_error");
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("decode returned status 1"));

    // The failed request released the backend.
    let (status, json) = send(app, get_request("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["busy"], false);
}
