use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use quizroom_backend::{
    cache::CacheService,
    config::{get_config, init_config},
    database::pool::create_pool,
    middleware::auth::{require_auth, require_student, require_teacher},
    routes, AppState,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let cache = CacheService::connect(&config.redis_url);
    let app_state = AppState::new(pool, cache);

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let auth_api = Router::new()
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/logout", post(routes::auth::logout))
        .route(
            "/api/auth/check",
            get(routes::auth::check).route_layer(axum::middleware::from_fn(require_auth)),
        );

    let student_api = Router::new()
        .route("/api/student/profile", get(routes::student::profile))
        .route("/api/student/batches", get(routes::student::list_batches))
        .route("/api/student/join-batch", post(routes::student::join_batch))
        .route(
            "/api/student/leave-batch/:batch_id",
            delete(routes::student::leave_batch),
        )
        .route(
            "/api/student/active-quizzes",
            get(routes::student::active_quizzes),
        )
        .route(
            "/api/student/batch/:batch_id/quizzes",
            get(routes::student::batch_quizzes),
        )
        .route("/api/student/quiz/:quiz_id", get(routes::student::get_quiz))
        .route("/api/student/submit", post(routes::student::submit_quiz))
        .route(
            "/api/student/result/:quiz_id",
            get(routes::student::get_result),
        )
        .route("/api/student/my-results", get(routes::student::my_results))
        .route("/api/student/stats", get(routes::student::stats))
        .route_layer(axum::middleware::from_fn(require_student));

    let teacher_api = Router::new()
        .route("/api/teacher/profile", get(routes::teacher::profile))
        .route("/api/teacher/create-batch", post(routes::teacher::create_batch))
        .route("/api/teacher/batches", get(routes::teacher::list_batches))
        .route("/api/teacher/create-quiz", post(routes::teacher::create_quiz))
        .route("/api/teacher/publish-quiz", post(routes::teacher::publish_quiz))
        .route("/api/teacher/quizzes", get(routes::teacher::list_quizzes))
        .route("/api/teacher/leaderboard", get(routes::teacher::leaderboard))
        .route("/api/teacher/dashboard", get(routes::teacher::dashboard))
        .route(
            "/api/teacher/upload-and-generate",
            post(routes::teacher::upload_and_generate),
        )
        .route_layer(axum::middleware::from_fn(require_teacher));

    let ai_api = Router::new()
        .route("/api/ai/ask-question", post(routes::ai::ask_question))
        .route_layer(axum::middleware::from_fn(require_auth));

    let cors = if config.cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        // Cookie auth needs credentialed CORS, which forbids wildcards.
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true)
    };

    let app = base_routes
        .merge(auth_api)
        .merge(student_api)
        .merge(teacher_api)
        .merge(ai_api)
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
