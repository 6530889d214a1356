//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::AppState;
use api::config::Config;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use event_store::InMemoryEventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, Arc<AppState>) {
    let state = api::create_default_state(Arc::new(InMemoryEventStore::new()), &Config::default());
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn create_product(app: &axum::Router, name: &str, quantity: i64) -> String {
    let (status, json) = send(
        app,
        post_json(
            "/api/products",
            serde_json::json!({ "name": name, "initial_quantity": quantity }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["product_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let (status, json) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["pending_events"], 0);
    assert_eq!(json["rejected_events"], 0);
}

#[tokio::test]
async fn test_health_answers_during_a_slow_catch_up() {
    let (app, state) = setup();
    create_product(&app, "Widget", 1).await;
    create_product(&app, "Gadget", 2).await;
    state.synchronizer.run_catch_up().await.unwrap();

    // Passes hold the synchronizer for their whole duration.
    let pass = {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            loop {
                state.synchronizer.rebuild_all().await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let (status, json) = tokio::time::timeout(
        std::time::Duration::from_secs(1),
        send(&app, get("/health")),
    )
    .await
    .expect("health check should not wait for the synchronizer");
    pass.abort();

    assert_eq!(status, StatusCode::OK);
    assert!(json["events_processed"].as_u64().unwrap() <= 2);
}

#[tokio::test]
async fn test_create_product() {
    let (app, _) = setup();

    let (status, json) = send(
        &app,
        post_json(
            "/api/products",
            serde_json::json!({ "name": "Widget", "initial_quantity": 10 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(json["product_id"].as_str().is_some());
    assert_eq!(json["version"], 1);
}

#[tokio::test]
async fn test_create_accepts_camel_case_quantity() {
    let (app, _) = setup();

    let (status, _) = send(
        &app,
        post_json(
            "/api/products",
            serde_json::json!({ "name": "Widget", "initialQuantity": 3 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_inventory_flow_reaches_read_model() {
    let (app, state) = setup();
    let id = create_product(&app, "Widget", 0).await;

    let (status, json) = send(
        &app,
        post_json(
            &format!("/api/products/{id}/add-inventory"),
            serde_json::json!({ "quantity": 5 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["version"], 2);

    let (status, json) = send(
        &app,
        post_json(
            &format!("/api/products/{id}/remove-inventory"),
            serde_json::json!({ "quantity": 3 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["product_id"], id.as_str());
    assert_eq!(json["version"], 3);

    state.synchronizer.run_catch_up().await.unwrap();

    let (status, json) = send(&app, get(&format!("/api/products/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Widget");
    assert_eq!(json["quantity"], 2);
    assert_eq!(json["version"], 3);
}

#[tokio::test]
async fn test_list_products() {
    let (app, state) = setup();
    create_product(&app, "Bolt", 1).await;
    create_product(&app, "Nut", 2).await;

    state.synchronizer.run_catch_up().await.unwrap();

    let (status, json) = send(&app, get("/api/products")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_get_unknown_product_returns_404() {
    let (app, _) = setup();

    let (status, json) = send(&app, get("/api/products/does-not-exist")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("does-not-exist"));
}

#[tokio::test]
async fn test_negative_initial_quantity_returns_400() {
    let (app, _) = setup();

    let (status, json) = send(
        &app,
        post_json(
            "/api/products",
            serde_json::json!({ "name": "Widget", "initial_quantity": -1 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_removing_too_much_returns_409() {
    let (app, _) = setup();
    let id = create_product(&app, "Widget", 2).await;

    let (status, json) = send(
        &app,
        post_json(
            &format!("/api/products/{id}/remove-inventory"),
            serde_json::json!({ "quantity": 3 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].is_string());

    // The rejected command left the stream untouched.
    let (_, events) = send(&app, get(&format!("/api/products/{id}/events"))).await;
    assert_eq!(events.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_add_to_unknown_product_returns_404() {
    let (app, _) = setup();

    let (status, _) = send(
        &app,
        post_json(
            "/api/products/ghost/add-inventory",
            serde_json::json!({ "quantity": 1 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_event_history() {
    let (app, _) = setup();
    let id = create_product(&app, "Widget", 10).await;
    send(
        &app,
        post_json(
            &format!("/api/products/{id}/add-inventory"),
            serde_json::json!({ "quantity": 5 }),
        ),
    )
    .await;

    let (status, json) = send(&app, get(&format!("/api/products/{id}/events"))).await;

    assert_eq!(status, StatusCode::OK);
    let events = json.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["event_type"], "ProductCreated");
    assert_eq!(events[0]["version"], 1);
    assert_eq!(events[1]["event_type"], "InventoryAdded");
    assert_eq!(events[1]["version"], 2);
}

#[tokio::test]
async fn test_event_history_for_unknown_product_returns_404() {
    let (app, _) = setup();

    let (status, _) = send(&app, get("/api/products/ghost/events")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup();
    create_product(&app, "Widget", 1).await;

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("commands_dispatched_total"));
}
