//! HTTP surface: the axum app driven in-process over an in-memory SQLite database.

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request as HttpRequest, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use roost::config::{EntityDecl, Field, Schema, SchemaBuilder};
use roost::sql::Dialect;
use roost::{app, create_tables, handler_fn, optimize, AppError, AppState, Database, EntryPoint, Query, Reply};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

fn schema() -> Schema {
    SchemaBuilder::new()
        .with(
            EntityDecl::new("Hotel")
                .field(Field::string("name").length(20))
                .composed_by("rooms", "Room"),
        )
        .with(
            EntityDecl::new("Room")
                .field(Field::integer("number").weak_id())
                .field(Field::integer("bed_count").range(1, 6)),
        )
        .initialize()
        .unwrap()
}

async fn build(optimized: bool) -> Router {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let db = Database::sqlite(pool);
    let schema = schema();
    create_tables(&db, &schema).await.unwrap();

    let mut entry = EntryPoint::new("/api").unwrap();
    entry.crud("/hotels/[id]", schema.entity("Hotel").unwrap()).unwrap();
    entry
        .crud("/hotels/[hotel_id]/rooms/[number]", schema.entity("Room").unwrap())
        .unwrap();
    entry
        .route(
            Method::GET,
            "/hotels/{id}/summary",
            handler_fn(&["id"], |state: AppState, req| async move {
                let id: i64 = req.params["id"]
                    .parse()
                    .map_err(|_| AppError::BadRequest("id must be an integer".into()))?;
                let rooms = Query::new(&state.schema, "Room")?
                    .filter_eq("hotel_id", id)
                    .all(&state.db)
                    .await?;
                Ok::<_, AppError>(Reply::Ok(json!({"hotel": id, "rooms": rooms.len()})))
            }),
        )
        .unwrap();
    if optimized {
        assert_eq!(optimize(&mut entry, &schema, Dialect::Sqlite).unwrap(), 2);
    }

    app(AppState::new(schema, db, entry), 64 * 1024)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = match body {
        Some(v) => Body::from(v.to_string()),
        None => Body::empty(),
    };
    let request = HttpRequest::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn seed(app: &Router) {
    let (status, body) = send(app, Method::POST, "/api/hotels", Some(json!({"name": "Ritz"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"], json!({"id": 1, "name": "Ritz", "rooms": []}));

    for (number, beds) in [(1, 2), (2, 1)] {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/hotels/1/rooms",
            Some(json!({"number": number, "bed_count": beds})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["hotel_id"], 1);
    }
}

#[tokio::test]
async fn crud_round_trip() {
    let app = build(false).await;
    seed(&app).await;

    let (status, body) = send(&app, Method::GET, "/api/hotels/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({
            "id": 1,
            "name": "Ritz",
            "rooms": [
                {"number": 1, "bed_count": 2, "hotel_id": 1},
                {"number": 2, "bed_count": 1, "hotel_id": 1}
            ]
        })
    );

    let (status, body) = send(&app, Method::GET, "/api/hotels/1/rooms", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 2);

    let (status, body) = send(&app, Method::PUT, "/api/hotels/1/rooms/2", Some(json!({"bed_count": 4}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["bed_count"], 4);

    let (status, body) = send(&app, Method::DELETE, "/api/hotels/1/rooms/2", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, body) = send(&app, Method::GET, "/api/hotels/1/rooms/2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn errors_map_to_status_codes() {
    let app = build(false).await;
    seed(&app).await;

    // rooms still reference the hotel
    let (status, body) = send(&app, Method::DELETE, "/api/hotels/1", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "integrity_error");

    let (status, _) = send(&app, Method::POST, "/api/hotels", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/api/hotels/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, Method::PATCH, "/api/hotels/1", Some(json!({"name": "x"}))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"]["code"], "method_not_allowed");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/hotels/1/rooms",
        Some(json!({"number": 3, "bed_count": 9})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "validation_error");

    let (status, _) = send(&app, Method::PUT, "/api/hotels/9", Some(json!({"name": "Gone"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, "/elsewhere", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn common_routes_are_served_beside_the_dispatcher() {
    let app = build(false).await;
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));

    let (status, body) = send(&app, Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn optimized_reads_answer_the_same() {
    let plain = build(false).await;
    let fast = build(true).await;
    seed(&plain).await;
    seed(&fast).await;

    for uri in ["/api/hotels/1/rooms", "/api/hotels/1/rooms/2", "/api/hotels/1"] {
        let expected = send(&plain, Method::GET, uri, None).await;
        assert_eq!(send(&fast, Method::GET, uri, None).await, expected, "{}", uri);
    }
    let (status, _) = send(&fast, Method::GET, "/api/hotels/1/rooms/7", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn custom_handlers_share_the_route_tree() {
    let app = build(false).await;
    seed(&app).await;
    let (status, body) = send(&app, Method::GET, "/api/hotels/1/summary", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"hotel": 1, "rooms": 2}));
}
