use super::*;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::protocol::{SimulateRequest, UpdateQuantityRequest};
use std::time::Duration;
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Default)]
struct FakeBackend {
    items: Vec<InventoryItem>,
    requests: Vec<String>,
    fail_deletes: bool,
    malformed_list: bool,
    empty_update_body: bool,
}

type SharedBackend = Arc<Mutex<FakeBackend>>;

async fn list_items(State(backend): State<SharedBackend>) -> Response {
    let mut backend = backend.lock().await;
    backend.requests.push("GET /inventory".to_string());
    if backend.malformed_list {
        return (StatusCode::OK, "<html>oops</html>").into_response();
    }
    Json(backend.items.clone()).into_response()
}

async fn create_item(
    State(backend): State<SharedBackend>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut backend = backend.lock().await;
    backend.requests.push("POST /inventory".to_string());
    let Some(name) = payload["item_name"].as_str().filter(|name| !name.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Item name is required" })),
        );
    };
    let quantity = payload["quantity"].as_i64().unwrap_or(1);
    match backend.items.iter_mut().find(|item| item.name == name) {
        Some(item) => item.quantity += quantity,
        None => backend.items.push(InventoryItem::new(name, quantity)),
    }
    (
        StatusCode::CREATED,
        Json(json!({ "item_name": name, "quantity": quantity })),
    )
}

async fn delete_item(
    State(backend): State<SharedBackend>,
    Path(name): Path<String>,
) -> Response {
    let mut backend = backend.lock().await;
    backend.requests.push(format!("DELETE /inventory/{name}"));
    if backend.fail_deletes {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let before = backend.items.len();
    backend.items.retain(|item| item.name != name);
    if backend.items.len() == before {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("{name} not found") })),
        )
            .into_response();
    }
    Json(json!({ "message": format!("{name} removed from inventory") })).into_response()
}

async fn update_item(
    State(backend): State<SharedBackend>,
    Path(name): Path<String>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Response {
    let mut backend = backend.lock().await;
    backend.requests.push(format!("PUT /inventory/{name}"));
    let empty_body = backend.empty_update_body;
    let Some(item) = backend.items.iter_mut().find(|item| item.name == name) else {
        return (StatusCode::NOT_FOUND, "no such item").into_response();
    };
    item.quantity = payload.quantity;
    if empty_body {
        return StatusCode::NO_CONTENT.into_response();
    }
    Json(json!({ "quantity": payload.quantity })).into_response()
}

async fn suggest_recipes() -> Json<Value> {
    Json(json!({ "suggested_recipes": ["Omelette"] }))
}

async fn recipe() -> Json<Value> {
    Json(json!({ "recipe_name": "Omelette", "ingredients": ["eggs", "milk", "butter"] }))
}

async fn simulate(
    State(backend): State<SharedBackend>,
    Json(payload): Json<SimulateRequest>,
) -> Json<Value> {
    let mut backend = backend.lock().await;
    backend
        .requests
        .push(format!("POST /simulate {}", payload.image_folder));
    backend.items.push(InventoryItem::new("chicken breast", 1));
    Json(json!({ "detected_items": ["chicken breast"] }))
}

async fn slow_list() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!([]))
}

async fn spawn_backend(items: Vec<InventoryItem>) -> Result<(String, SharedBackend), std::io::Error> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let backend = Arc::new(Mutex::new(FakeBackend {
        items,
        ..FakeBackend::default()
    }));
    let app = Router::new()
        .route("/api/inventory", get(list_items).post(create_item))
        .route(
            "/api/inventory/:item_name",
            delete(delete_item).put(update_item),
        )
        .route("/api/recipes", get(suggest_recipes))
        .route("/api/recipe", get(recipe))
        .route("/api/simulate", post(simulate))
        .route("/slow/inventory", get(slow_list))
        .with_state(backend.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), backend))
}

fn http_store(base_url: &str) -> Arc<InventoryStore> {
    let service = HttpInventoryService::new(base_url).expect("service");
    InventoryStore::new(Arc::new(service))
}

#[tokio::test]
async fn load_add_update_remove_round_trip_over_http() {
    let (server_url, backend) = spawn_backend(vec![InventoryItem::new("milk", 2)])
        .await
        .expect("spawn backend");
    let store = http_store(&format!("{server_url}/api"));

    store.load().await.expect("load");
    assert_eq!(store.items().await, vec![InventoryItem::new("milk", 2)]);

    store.add("apple", 3).await.expect("add");
    store.set_quantity("apple", 4).await.expect("update");
    store.remove("milk").await.expect("remove");

    assert_eq!(store.items().await, vec![InventoryItem::new("apple", 4)]);
    assert_eq!(
        backend.lock().await.items,
        vec![InventoryItem::new("apple", 4)]
    );
    assert_eq!(
        backend.lock().await.requests,
        vec![
            "GET /inventory",
            "POST /inventory",
            "PUT /inventory/apple",
            "DELETE /inventory/milk",
        ]
    );
}

#[tokio::test]
async fn item_names_with_spaces_reach_the_right_path() {
    let (server_url, backend) = spawn_backend(vec![InventoryItem::new("chicken breast", 1)])
        .await
        .expect("spawn backend");
    let store = http_store(&format!("{server_url}/api/"));

    store.load().await.expect("load");
    store.increment("chicken breast").await.expect("increment");
    store.remove("chicken breast").await.expect("remove");

    assert!(store.items().await.is_empty());
    assert_eq!(
        backend.lock().await.requests[1..],
        ["PUT /inventory/chicken breast", "DELETE /inventory/chicken breast"]
    );
}

#[tokio::test]
async fn create_error_payload_is_surfaced() {
    let (server_url, _backend) = spawn_backend(Vec::new()).await.expect("spawn backend");
    let service = HttpInventoryService::new(&format!("{server_url}/api")).expect("service");

    let err = service
        .create(CreateItemRequest {
            item_name: String::new(),
            quantity: 1,
        })
        .await
        .expect_err("empty name rejected by backend");

    assert_eq!(
        err,
        StoreError::Service {
            status: 400,
            message: "Item name is required".to_string(),
        }
    );
}

#[tokio::test]
async fn failed_delete_reports_service_error_and_keeps_cache() {
    let (server_url, backend) = spawn_backend(vec![InventoryItem::new("apple", 3)])
        .await
        .expect("spawn backend");
    let store = http_store(&format!("{server_url}/api"));
    store.load().await.expect("load");
    backend.lock().await.fail_deletes = true;
    let mut events = store.subscribe_events();

    let err = store.remove("apple").await.expect_err("delete fails");

    assert_eq!(
        err,
        StoreError::Service {
            status: 500,
            message: "Internal Server Error".to_string(),
        }
    );
    assert_eq!(store.items().await, vec![InventoryItem::new("apple", 3)]);
    assert_eq!(
        events.try_recv().expect("event"),
        StoreEvent::OperationFailed {
            operation: Operation::Remove,
            error: err,
        }
    );
}

#[tokio::test]
async fn plain_text_error_bodies_are_used_as_message() {
    let (server_url, _backend) = spawn_backend(Vec::new()).await.expect("spawn backend");
    let service = HttpInventoryService::new(&format!("{server_url}/api")).expect("service");

    let err = service
        .update_quantity("ghost", 2)
        .await
        .expect_err("unknown item");

    assert_eq!(
        err,
        StoreError::Service {
            status: 404,
            message: "no such item".to_string(),
        }
    );
}

#[tokio::test]
async fn empty_update_body_confirms_requested_quantity() {
    let (server_url, backend) = spawn_backend(vec![InventoryItem::new("apple", 3)])
        .await
        .expect("spawn backend");
    backend.lock().await.empty_update_body = true;
    let service = HttpInventoryService::new(&format!("{server_url}/api")).expect("service");

    assert_eq!(service.update_quantity("apple", 6).await.expect("update"), None);

    let store = InventoryStore::new(Arc::new(service));
    store.load().await.expect("load");
    assert_eq!(
        store.set_quantity("apple", 5).await.expect("update"),
        InventoryItem::new("apple", 5)
    );
}

#[tokio::test]
async fn malformed_success_body_is_a_service_error() {
    let (server_url, backend) = spawn_backend(vec![InventoryItem::new("apple", 3)])
        .await
        .expect("spawn backend");
    let store = http_store(&format!("{server_url}/api"));
    store.load().await.expect("load");
    backend.lock().await.malformed_list = true;

    let err = store.load().await.expect_err("malformed");

    match err {
        StoreError::Service { status, message } => {
            assert_eq!(status, 200);
            assert!(message.starts_with("malformed response body"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.items().await, vec![InventoryItem::new("apple", 3)]);
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let store = http_store(&format!("http://{addr}/api"));
    let err = store.load().await.expect_err("nothing listening");

    assert!(matches!(err, StoreError::Transport(_)), "{err}");
    assert_eq!(store.phase().await, StorePhase::Uninitialized);
}

#[tokio::test]
async fn slow_service_times_out_as_transport_error() {
    let (server_url, _backend) = spawn_backend(Vec::new()).await.expect("spawn backend");
    let service = HttpInventoryService::with_timeout(
        &format!("{server_url}/slow"),
        Duration::from_millis(100),
    )
    .expect("service");

    let err = service.list().await.expect_err("timeout");

    assert!(matches!(err, StoreError::Transport(_)), "{err}");
}

#[tokio::test]
async fn recipes_and_simulation_over_http() {
    let (server_url, backend) = spawn_backend(Vec::new()).await.expect("spawn backend");
    let store = http_store(&format!("{server_url}/api"));

    assert_eq!(store.suggest_recipes().await.expect("recipes"), ["Omelette"]);
    let recipe = store.recipe().await.expect("recipe");
    assert_eq!(recipe.ingredients, ["eggs", "milk", "butter"]);

    let detected = store
        .run_simulation(DEFAULT_IMAGE_FOLDER)
        .await
        .expect("simulate");

    assert_eq!(detected, ["chicken breast"]);
    assert_eq!(
        store.items().await,
        vec![InventoryItem::new("chicken breast", 1)]
    );
    assert!(backend
        .lock()
        .await
        .requests
        .contains(&format!("POST /simulate {DEFAULT_IMAGE_FOLDER}")));
}
