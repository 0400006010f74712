use std::env;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

fn build_app(state: quizroom_backend::AppState) -> Router {
    use quizroom_backend::middleware::auth::{require_student, require_teacher};
    use quizroom_backend::routes;

    let auth_api = Router::new()
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/logout", post(routes::auth::logout));

    let student_api = Router::new()
        .route("/api/student/profile", get(routes::student::profile))
        .route(
            "/api/student/active-quizzes",
            get(routes::student::active_quizzes),
        )
        .route("/api/student/batches", get(routes::student::list_batches))
        .route("/api/student/join-batch", post(routes::student::join_batch))
        .route(
            "/api/student/leave-batch/:batch_id",
            delete(routes::student::leave_batch),
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
        .route_layer(axum::middleware::from_fn(require_teacher));

    auth_api
        .merge(student_api)
        .merge(teacher_api)
        .with_state(state)
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

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

async fn register(app: &Router, name: &str, email: &str, role: &str) -> String {
    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "name": name,
                "email": email,
                "password": "secret123",
                "role": role
            })
            .to_string(),
        ))
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    cookie_from(&response)
}

#[tokio::test]
async fn quiz_lifecycle_end_to_end() {
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
        pool.clone(),
        quizroom_backend::cache::CacheService::disabled(),
    );
    let app = build_app(state.clone());

    let run = Uuid::new_v4().simple().to_string();
    let teacher_cookie = register(
        &app,
        "Flow Teacher",
        &format!("t_{}@example.com", run),
        "teacher",
    )
    .await;
    let student_cookie = register(
        &app,
        "Flow Student",
        &format!("s_{}@example.com", run),
        "student",
    )
    .await;

    // The teacher profile exposes name, email and role only.
    let (status, teacher_profile) = send(
        &app,
        "GET",
        "/api/teacher/profile",
        Some(&teacher_cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(teacher_profile["role"], "teacher");
    assert_eq!(teacher_profile["name"], "Flow Teacher");
    assert!(teacher_profile.get("id").is_none());

    // With no memberships yet, there is no active-quiz list to serve.
    let (status, _) = send(
        &app,
        "GET",
        "/api/student/active-quizzes",
        Some(&student_cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Role separation: a student cannot reach teacher endpoints.
    let (status, _) = send(
        &app,
        "GET",
        "/api/teacher/dashboard",
        Some(&student_cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Teacher creates a batch.
    let (status, batch) = send(
        &app,
        "POST",
        "/api/teacher/create-batch",
        Some(&teacher_cookie),
        Some(json!({ "name": format!("Batch {}", run) })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let batch_id = batch["id"].as_str().expect("batch id").to_string();

    // Duplicate batch name is rejected.
    let (status, _) = send(
        &app,
        "POST",
        "/api/teacher/create-batch",
        Some(&teacher_cookie),
        Some(json!({ "name": format!("Batch {}", run) })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Student joins the batch; joining twice conflicts.
    let (status, _) = send(
        &app,
        "POST",
        "/api/student/join-batch",
        Some(&student_cookie),
        Some(json!({ "batch_id": batch_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        "POST",
        "/api/student/join-batch",
        Some(&student_cookie),
        Some(json!({ "batch_id": batch_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // The profile reflects the membership.
    let (status, profile) = send(
        &app,
        "GET",
        "/api/student/profile",
        Some(&student_cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(profile["batches"]
        .as_array()
        .expect("batches")
        .iter()
        .any(|b| b["id"].as_str() == Some(batch_id.as_str())));

    // Teacher authors a quiz; the correct answer is option text.
    let deadline = (chrono::Utc::now() + chrono::Duration::days(7)).to_rfc3339();
    let (status, quiz) = send(
        &app,
        "POST",
        "/api/teacher/create-quiz",
        Some(&teacher_cookie),
        Some(json!({
            "title": "Ownership basics",
            "batch_id": batch_id,
            "deadline": deadline,
            "questions": [
                {
                    "question": "Which call transfers ownership?",
                    "options": ["clone", "into", "as_ref", "borrow"],
                    "correct_answer": "into",
                    "explanation": "into consumes self."
                },
                {
                    "question": "What does & create?",
                    "options": ["a copy", "a reference"],
                    "correct_answer": "a reference"
                }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let quiz_id = quiz["id"].as_str().expect("quiz id").to_string();

    // An answer that is not among the options rejects the quiz.
    let (status, _) = send(
        &app,
        "POST",
        "/api/teacher/create-quiz",
        Some(&teacher_cookie),
        Some(json!({
            "title": "Broken quiz",
            "batch_id": batch_id,
            "questions": [{
                "question": "Q",
                "options": ["a", "b"],
                "correct_answer": "c"
            }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The student's quiz view never contains answers.
    let (status, view) = send(
        &app,
        "GET",
        &format!("/api/student/quiz/{}", quiz_id),
        Some(&student_cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let questions = view["questions"].as_array().expect("questions");
    assert_eq!(questions.len(), 2);
    for q in questions {
        assert!(q.get("correct_answer").is_none());
        assert!(q.get("explanation").is_none());
    }

    // The unsubmitted quiz with its future deadline is active, and the
    // active view leaks no answers either.
    let (status, active) = send(
        &app,
        "GET",
        "/api/student/active-quizzes",
        Some(&student_cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let active = active.as_array().expect("active quizzes");
    assert!(active
        .iter()
        .any(|q| q["id"].as_str() == Some(quiz_id.as_str())));
    for q in active {
        assert!(q.get("questions").is_none());
        assert!(q.get("correct_answer").is_none());
    }

    // The batch view lists the quiz as available.
    let (status, entries) = send(
        &app,
        "GET",
        &format!("/api/student/batch/{}/quizzes", batch_id),
        Some(&student_cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entries[0]["status"], "available");

    // One right answer out of two scores 50.
    let (status, submitted) = send(
        &app,
        "POST",
        "/api/student/submit",
        Some(&student_cookie),
        Some(json!({
            "quiz_id": quiz_id,
            "answers": [
                { "question_index": 0, "selected_option": 1 },
                { "question_index": 1, "selected_option": 0 }
            ],
            "time_spent": "4m 10s"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(submitted["result"]["score"], 50);
    assert_eq!(submitted["result"]["correct_answers"], 1);

    // A second submission is rejected.
    let (status, _) = send(
        &app,
        "POST",
        "/api/student/submit",
        Some(&student_cookie),
        Some(json!({
            "quiz_id": quiz_id,
            "answers": [],
            "time_spent": "1s"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // A submitted quiz drops out of the active list.
    let (status, active) = send(
        &app,
        "GET",
        "/api/student/active-quizzes",
        Some(&student_cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!active
        .as_array()
        .expect("active quizzes")
        .iter()
        .any(|q| q["id"].as_str() == Some(quiz_id.as_str())));

    // The batch view now shows the quiz as completed with its score.
    let (status, entries) = send(
        &app,
        "GET",
        &format!("/api/student/batch/{}/quizzes", batch_id),
        Some(&student_cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entries[0]["status"], "completed");
    assert_eq!(entries[0]["score"], 50);

    // The breakdown includes correct answers and a -1 for unanswered slots.
    let (status, breakdown) = send(
        &app,
        "GET",
        &format!("/api/student/result/{}", quiz_id),
        Some(&student_cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(breakdown["score"], 50);
    assert_eq!(breakdown["questions"][0]["is_correct"], true);
    assert_eq!(breakdown["questions"][1]["is_correct"], false);

    // Results list and stats line up with the single submission.
    let (status, results) = send(
        &app,
        "GET",
        "/api/student/my-results",
        Some(&student_cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results.as_array().expect("results").len(), 1);

    let (status, stats) = send(&app, "GET", "/api/student/stats", Some(&student_cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["average_score"], 50);

    // The teacher's leaderboard ranks the submission first.
    let (status, board) = send(
        &app,
        "GET",
        &format!("/api/teacher/leaderboard?batch_id={}", batch_id),
        Some(&teacher_cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let top = &board["leaderboard"][0];
    assert_eq!(top["rank"], 1);
    assert_eq!(top["score"], 50);

    // The dashboard reflects the quiz and its average.
    let (status, dashboard) = send(
        &app,
        "GET",
        "/api/teacher/dashboard",
        Some(&teacher_cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["metrics"]["active_students"], 1);
    assert!(dashboard["metrics"]["total_quizzes"].as_i64().unwrap() >= 1);

    // Another teacher cannot read this batch's leaderboard.
    let intruder_cookie = register(
        &app,
        "Other Teacher",
        &format!("t2_{}@example.com", run),
        "teacher",
    )
    .await;
    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/teacher/leaderboard?batch_id={}", batch_id),
        Some(&intruder_cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A second student submits a perfect score; the quiz's stored average
    // becomes the rounded mean of both results (50 and 100).
    let second_cookie = register(
        &app,
        "Flow Student Two",
        &format!("s2_{}@example.com", run),
        "student",
    )
    .await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/student/join-batch",
        Some(&second_cookie),
        Some(json!({ "batch_id": batch_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, submitted) = send(
        &app,
        "POST",
        "/api/student/submit",
        Some(&second_cookie),
        Some(json!({
            "quiz_id": quiz_id,
            "answers": [
                { "question_index": 0, "selected_option": 1 },
                { "question_index": 1, "selected_option": 1 }
            ],
            "time_spent": "2m 30s"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(submitted["result"]["score"], 100);

    let (status, quizzes) = send(
        &app,
        "GET",
        "/api/teacher/quizzes",
        Some(&teacher_cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let summary = quizzes
        .as_array()
        .expect("quizzes")
        .iter()
        .find(|q| q["id"].as_str() == Some(quiz_id.as_str()))
        .expect("created quiz");
    assert_eq!(summary["avg_score"], 75);

    // A teacher id is not a valid membership target.
    let teacher_id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE email = $1")
        .bind(format!("t_{}@example.com", run))
        .fetch_one(&pool)
        .await
        .expect("teacher id");
    let batch_uuid: Uuid = batch_id.parse().expect("batch uuid");
    let err = state
        .batch_service
        .join_batch(teacher_id, batch_uuid)
        .await
        .expect_err("teacher join rejected");
    assert!(matches!(
        err,
        quizroom_backend::error::Error::NotFound(_)
    ));

    // Leaving the batch is idempotent.
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/student/leave-batch/{}", batch_id),
        Some(&student_cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/student/leave-batch/{}", batch_id),
        Some(&student_cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // After leaving, the batch's quizzes are off limits.
    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/student/batch/{}/quizzes", batch_id),
        Some(&student_cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
