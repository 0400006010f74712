use std::env;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

fn build_app(state: quizroom_backend::AppState) -> Router {
    use quizroom_backend::middleware::auth::{require_auth, require_teacher};
    use quizroom_backend::routes;

    Router::new()
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/logout", post(routes::auth::logout))
        .route(
            "/api/auth/check",
            get(routes::auth::check).route_layer(axum::middleware::from_fn(require_auth)),
        )
        .route(
            "/api/teacher/publish-quiz",
            post(routes::teacher::publish_quiz)
                .route_layer(axum::middleware::from_fn(require_teacher)),
        )
        .route(
            "/api/teacher/create-batch",
            post(routes::teacher::create_batch)
                .route_layer(axum::middleware::from_fn(require_teacher)),
        )
        .with_state(state)
}

async fn post_json(
    app: &Router,
    uri: &str,
    cookie: Option<&str>,
    body: JsonValue,
) -> axum::response::Response {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = builder.body(Body::from(body.to_string())).expect("request");
    app.clone().oneshot(request).await.expect("response")
}

async fn body_json(response: axum::response::Response) -> JsonValue {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn cookie_from(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .expect("auth cookie")
        .to_string()
}

#[tokio::test]
async fn cookie_auth_and_publish_flow() {
    dotenvy::dotenv().ok();
    if env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    }
    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    env::set_var("JWT_SECRET", "test_secret_key");
    env::set_var("GROQ_API_KEY", "gsk-test");

    quizroom_backend::config::init_config().expect("init config");
    let pool = quizroom_backend::database::pool::create_pool()
        .await
        .expect("pool");
    sqlx::migrate!("./migrations").run(&pool).await.expect("migrations");

    let state = quizroom_backend::AppState::new(
        pool,
        quizroom_backend::cache::CacheService::disabled(),
    );
    let app = build_app(state);

    let run = Uuid::new_v4().simple().to_string();
    let email = format!("auth_{}@example.com", run);

    // Register a teacher; the response sets the auth cookie.
    let response = post_json(
        &app,
        "/api/auth/register",
        None,
        json!({
            "name": "Auth Teacher",
            "email": email,
            "password": "secret123",
            "role": "teacher"
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(cookie_from(&response).starts_with("token="));

    // Registering the same email again conflicts.
    let response = post_json(
        &app,
        "/api/auth/register",
        None,
        json!({
            "name": "Auth Teacher",
            "email": email,
            "password": "secret123",
            "role": "teacher"
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Wrong password fails without revealing which part was wrong.
    let response = post_json(
        &app,
        "/api/auth/login",
        None,
        json!({ "email": email, "password": "wrong-password" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = post_json(
        &app,
        "/api/auth/login",
        None,
        json!({ "email": email, "password": "secret123" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = cookie_from(&response);
    let body = body_json(response).await;
    assert_eq!(body["user"]["role"], "teacher");

    // check requires the cookie.
    let request = Request::builder()
        .method("GET")
        .uri("/api/auth/check")
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("GET")
        .uri("/api/auth/check")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    // A tampered token is rejected.
    let request = Request::builder()
        .method("GET")
        .uri("/api/auth/check")
        .header(header::COOKIE, "token=not-a-jwt")
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Logout tells the client to drop the cookie.
    let response = post_json(&app, "/api/auth/logout", Some(&cookie), json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let removal = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("removal cookie");
    assert!(removal.starts_with("token="));

    // Publishing a reviewed draft: out-of-range answer index is rejected,
    // a valid draft lands as an ai-sourced quiz.
    let response = post_json(
        &app,
        "/api/teacher/create-batch",
        Some(&cookie),
        json!({ "name": format!("Auth Batch {}", run) }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let batch = body_json(response).await;
    let batch_id = batch["id"].as_str().expect("batch id");

    let response = post_json(
        &app,
        "/api/teacher/publish-quiz",
        Some(&cookie),
        json!({
            "title": "Draft quiz",
            "batch_id": batch_id,
            "questions": [{
                "question": "Q",
                "options": ["a", "b"],
                "correct": 7
            }]
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json(
        &app,
        "/api/teacher/publish-quiz",
        Some(&cookie),
        json!({
            "title": "Draft quiz",
            "batch_id": batch_id,
            "questions": [{
                "question": "Q",
                "options": ["a", "b"],
                "correct": 1,
                "explanation": "b is right"
            }]
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let quiz = body_json(response).await;
    assert_eq!(quiz["source"], "ai");
}
