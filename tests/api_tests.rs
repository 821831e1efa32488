use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use student_registry::api::{self, AppState};
use student_registry::config::{Config, DatabaseConfig};
use student_registry::db::Store;
use student_registry::models::{Student, StudentInput};
use student_registry::services::{StudentError, StudentService};
use tower::ServiceExt;

async fn test_config_and_store() -> (Config, Store) {
    let mut config = Config::default();
    config.database = DatabaseConfig::in_memory();

    let store = Store::connect(&config.database)
        .await
        .expect("Failed to connect to in-memory database");
    (config, store)
}

async fn spawn_app() -> Router {
    let (config, store) = test_config_and_store().await;
    let state = api::create_app_state(config, store, None);
    api::router(state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn ana() -> Value {
    json!({ "name": "Ana", "email": "ana@x.com", "course": "CS", "age": 20 })
}

#[tokio::test]
async fn test_health() {
    let app = spawn_app().await;

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));

    let (status, body) = send(&app, Method::GET, "/health/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], true);
}

#[tokio::test]
async fn test_student_lifecycle() {
    let app = spawn_app().await;

    let (status, created) = send(&app, Method::POST, "/students", Some(ana())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["id"], 1);

    let duplicate = json!({ "name": "Ana", "email": "ana@x.com", "course": "Math", "age": 20 });
    let (status, body) = send(&app, Method::POST, "/students", Some(duplicate)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Email already registered");

    let (status, fetched) = send(&app, Method::GET, "/students/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["course"], "CS");

    let replacement = json!({ "name": "Ana", "email": "ana@x.com", "course": "Math", "age": 21 });
    let (status, updated) = send(&app, Method::PUT, "/students/1", Some(replacement)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["age"], 21);
    assert_eq!(updated["course"], "Math");

    let (status, body) = send(&app, Method::DELETE, "/students/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Student deleted successfully" }));

    let (status, body) = send(&app, Method::GET, "/students/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Student not found");
}

#[tokio::test]
async fn test_create_then_get_returns_input_with_generated_fields() {
    let app = spawn_app().await;

    let (_, created) = send(&app, Method::POST, "/students", Some(ana())).await;
    let id = created["id"].as_i64().unwrap();

    let (status, fetched) = send(&app, Method::GET, &format!("/students/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
    assert_eq!(fetched["name"], "Ana");
    assert_eq!(fetched["email"], "ana@x.com");
    assert_eq!(fetched["course"], "CS");
    assert_eq!(fetched["age"], 20);
    assert!(fetched["created_at"].is_string());
    assert_eq!(fetched["created_at"], fetched["updated_at"]);
}

#[tokio::test]
async fn test_negative_age_is_rejected_without_persisting() {
    let app = spawn_app().await;

    let payload = json!({ "name": "Ana", "email": "ana@x.com", "course": "CS", "age": -1 });
    let (status, body) = send(&app, Method::POST, "/students", Some(payload)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"][0]["field"], "age");

    let (_, list) = send(&app, Method::GET, "/students", None).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn test_lenient_but_valid_payloads_are_accepted() {
    let app = spawn_app().await;

    let spaces = json!({ "name": "   ", "email": "ws@x.com", "course": " ", "age": 3 });
    let (status, created) = send(&app, Method::POST, "/students", Some(spaces)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["name"], "   ");
    assert_eq!(created["course"], " ");

    let float_age = json!({ "name": "Bo", "email": "bo@x.com", "course": "Art", "age": 20.0 });
    let (status, created) = send(&app, Method::POST, "/students", Some(float_age)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["age"], 20);
}

#[tokio::test]
async fn test_malformed_payloads_are_validation_errors() {
    let app = spawn_app().await;

    let payloads = [
        json!({ "name": "Ana", "email": "ana@x.com", "course": "CS" }),
        json!({ "name": "Ana", "email": "not-an-email", "course": "CS", "age": 20 }),
        json!({ "name": "", "email": "ana@x.com", "course": "CS", "age": 20 }),
        json!({ "name": "Ana", "email": "ana@x.com", "course": "CS", "age": "twenty" }),
        json!({ "name": "Ana", "email": "ana@x.com", "course": "CS", "age": 20.5 }),
    ];

    for payload in payloads {
        let (status, body) = send(&app, Method::POST, "/students", Some(payload.clone())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "payload: {payload}");
        assert!(body["detail"].is_string());
    }

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/students")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let (_, list) = send(&app, Method::GET, "/students", None).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn test_non_numeric_id_is_a_validation_error() {
    let app = spawn_app().await;

    let (status, body) = send(&app, Method::GET, "/students/abc", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"][0]["field"], "id");
}

#[tokio::test]
async fn test_update_keeps_identity_and_advances_updated_at() {
    let app = spawn_app().await;

    let (_, created) = send(&app, Method::POST, "/students", Some(ana())).await;

    let replacement = json!({ "name": "Ana Maria", "email": "ana.maria@x.com", "course": "Physics", "age": 22 });
    let (status, updated) = send(&app, Method::PUT, "/students/1", Some(replacement)).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(updated["id"], created["id"]);
    assert_eq!(updated["created_at"], created["created_at"]);
    assert_eq!(updated["name"], "Ana Maria");
    assert_eq!(updated["email"], "ana.maria@x.com");
    assert_eq!(updated["course"], "Physics");
    assert_eq!(updated["age"], 22);

    let before: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(created["updated_at"].clone()).unwrap();
    let after: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(updated["updated_at"].clone()).unwrap();
    assert!(after > before);

    let (_, fetched) = send(&app, Method::GET, "/students/1", None).await;
    assert_eq!(fetched, updated);
}

#[tokio::test]
async fn test_update_errors() {
    let app = spawn_app().await;

    let (status, _) = send(&app, Method::PUT, "/students/42", Some(ana())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Validation runs before the lookup.
    let invalid = json!({ "name": "Ana", "email": "ana@x.com", "course": "CS", "age": -3 });
    let (status, _) = send(&app, Method::PUT, "/students/42", Some(invalid)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    send(&app, Method::POST, "/students", Some(ana())).await;
    let bo = json!({ "name": "Bo", "email": "bo@x.com", "course": "Art", "age": 30 });
    let (_, bo) = send(&app, Method::POST, "/students", Some(bo)).await;

    let steal = json!({ "name": "Bo", "email": "ana@x.com", "course": "Art", "age": 30 });
    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/students/{}", bo["id"]),
        Some(steal),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Email already registered");

    let (_, unchanged) = send(&app, Method::GET, &format!("/students/{}", bo["id"]), None).await;
    assert_eq!(unchanged["email"], "bo@x.com");
}

#[tokio::test]
async fn test_delete_twice_is_not_found() {
    let app = spawn_app().await;

    send(&app, Method::POST, "/students", Some(ana())).await;

    let (status, _) = send(&app, Method::DELETE, "/students/1", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::DELETE, "/students/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Student not found");
}

#[tokio::test]
async fn test_list_tracks_creates_and_deletes_in_id_order() {
    let app = spawn_app().await;

    for (i, name) in ["Ana", "Bo", "Cy", "Di"].iter().enumerate() {
        let payload = json!({
            "name": name,
            "email": format!("{}@x.com", name.to_lowercase()),
            "course": "CS",
            "age": 18 + i,
        });
        let (status, _) = send(&app, Method::POST, "/students", Some(payload)).await;
        assert_eq!(status, StatusCode::OK);
    }

    send(&app, Method::DELETE, "/students/2", None).await;

    let (status, list) = send(&app, Method::GET, "/students", None).await;
    assert_eq!(status, StatusCode::OK);

    let ids: Vec<i64> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 3, 4]);
}

#[tokio::test]
async fn test_email_uniqueness_is_case_sensitive() {
    let app = spawn_app().await;

    send(&app, Method::POST, "/students", Some(ana())).await;

    let upper = json!({ "name": "Ana", "email": "Ana@x.com", "course": "CS", "age": 20 });
    let (status, created) = send(&app, Method::POST, "/students", Some(upper)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["email"], "Ana@x.com");

    let (status, body) = send(&app, Method::POST, "/students", Some(ana())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Email already registered");
}

#[tokio::test]
async fn test_ids_are_not_reused_after_delete() {
    let app = spawn_app().await;

    send(&app, Method::POST, "/students", Some(ana())).await;
    let bo = json!({ "name": "Bo", "email": "bo@x.com", "course": "Art", "age": 30 });
    send(&app, Method::POST, "/students", Some(bo)).await;
    send(&app, Method::DELETE, "/students/2", None).await;

    let cy = json!({ "name": "Cy", "email": "cy@x.com", "course": "Art", "age": 30 });
    let (_, created) = send(&app, Method::POST, "/students", Some(cy)).await;
    assert_eq!(created["id"], 3);
}

#[tokio::test]
async fn test_head_students() {
    let app = spawn_app().await;
    send(&app, Method::POST, "/students", Some(ana())).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::HEAD)
                .uri("/students")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_concurrent_duplicate_creates() {
    let app = spawn_app().await;

    let (first, second) = tokio::join!(
        send(&app, Method::POST, "/students", Some(ana())),
        send(&app, Method::POST, "/students", Some(ana())),
    );

    let mut statuses = [first.0.as_u16(), second.0.as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, [200, 400]);

    let (_, list) = send(&app, Method::GET, "/students", None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_route() {
    let app = spawn_app().await;

    let (status, body) = send(&app, Method::GET, "/courses", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Not Found");
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = spawn_app().await;

    let preflight = |origin: &'static str| {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/students")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap()
    };

    let response = app
        .clone()
        .oneshot(preflight("http://localhost:5173"))
        .await
        .unwrap();
    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST");

    let response = app
        .clone()
        .oneshot(preflight("https://evil.example.com"))
        .await
        .unwrap();
    assert!(
        !response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
    );
}

struct UnavailableStudents;

#[async_trait::async_trait]
impl StudentService for UnavailableStudents {
    async fn create(&self, _input: StudentInput) -> Result<Student, StudentError> {
        Err(StudentError::Database("connection reset by peer".to_string()))
    }

    async fn list(&self) -> Result<Vec<Student>, StudentError> {
        Err(StudentError::Database("connection reset by peer".to_string()))
    }

    async fn get(&self, _id: i32) -> Result<Student, StudentError> {
        Err(StudentError::Database("connection reset by peer".to_string()))
    }

    async fn update(&self, _id: i32, _input: StudentInput) -> Result<Student, StudentError> {
        Err(StudentError::Database("connection reset by peer".to_string()))
    }

    async fn delete(&self, _id: i32) -> Result<(), StudentError> {
        Err(StudentError::Internal("lost session".to_string()))
    }
}

#[tokio::test]
async fn test_infrastructure_errors_are_generic() {
    let (config, store) = test_config_and_store().await;
    let state = Arc::new(AppState::new(
        config,
        store,
        Arc::new(UnavailableStudents),
        None,
    ));
    let app = api::router(state);

    let (status, body) = send(&app, Method::GET, "/students", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "detail": "A database error occurred" }));

    let (status, body) = send(&app, Method::DELETE, "/students/1", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "detail": "An internal error occurred" }));

    // Validation still happens before the service is reached.
    let invalid = json!({ "name": "Ana", "email": "ana@x.com", "course": "CS", "age": -1 });
    let (status, _) = send(&app, Method::POST, "/students", Some(invalid)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Liveness does not depend on the student store.
    let (status, _) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}
