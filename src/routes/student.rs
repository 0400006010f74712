use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::dto::student_dto::{
    ActiveQuizEntry, BatchName, BatchQuizEntry, JoinBatchRequest, ResultBreakdown,
    StudentProfile, StudentQuizView, StudentResultSummary, StudentStats, SubmitQuizRequest,
    SubmitQuizResponse,
};
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::models::batch::BatchWithTeacher;
use crate::models::user::User;
use crate::AppState;

#[axum::debug_handler]
pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<StudentProfile>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(claims.sub)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Student not found".to_string()))?;

    let batches = sqlx::query_as::<_, BatchName>(
        "SELECT b.id, b.name FROM batches b
         JOIN batch_students bs ON bs.batch_id = b.id
         WHERE bs.student_id = $1
         ORDER BY b.name",
    )
    .bind(claims.sub)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(StudentProfile {
        id: user.id,
        name: user.name,
        email: user.email,
        role: user.role,
        batches,
    }))
}

/// Directory of all batches a student can join.
#[axum::debug_handler]
pub async fn list_batches(
    State(state): State<AppState>,
) -> Result<Json<Vec<BatchWithTeacher>>> {
    let batches = state.batch_service.list_all_batches().await?;
    Ok(Json(batches))
}

#[axum::debug_handler]
pub async fn join_batch(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<JoinBatchRequest>,
) -> Result<Json<serde_json::Value>> {
    let batch = state
        .batch_service
        .join_batch(claims.sub, req.batch_id)
        .await?;
    Ok(Json(json!({
        "message": format!("Joined batch {}", batch.name),
        "batch": { "id": batch.id, "name": batch.name }
    })))
}

#[axum::debug_handler]
pub async fn leave_batch(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(batch_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let batch = state
        .batch_service
        .leave_batch(claims.sub, batch_id)
        .await?;
    Ok(Json(json!({
        "message": format!("Left batch {}", batch.name)
    })))
}

/// Upcoming-deadline quizzes the student has not submitted yet, across all
/// of their batches.
#[axum::debug_handler]
pub async fn active_quizzes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<ActiveQuizEntry>>> {
    let quizzes = state.quiz_service.get_active_quizzes(claims.sub).await?;
    Ok(Json(quizzes))
}

#[axum::debug_handler]
pub async fn batch_quizzes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(batch_id): Path<Uuid>,
) -> Result<Json<Vec<BatchQuizEntry>>> {
    let quizzes = state
        .quiz_service
        .get_quizzes_by_batch(claims.sub, batch_id)
        .await?;
    Ok(Json(quizzes))
}

#[axum::debug_handler]
pub async fn get_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<Uuid>,
) -> Result<Json<StudentQuizView>> {
    let quiz = state
        .quiz_service
        .get_quiz_for_student(claims.sub, quiz_id)
        .await?;
    Ok(Json(quiz))
}

#[axum::debug_handler]
pub async fn submit_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubmitQuizRequest>,
) -> Result<Json<SubmitQuizResponse>> {
    req.validate()?;
    let result = state.result_service.submit_quiz(claims.sub, &req).await?;
    Ok(Json(SubmitQuizResponse {
        message: "Quiz submitted".to_string(),
        result,
    }))
}

#[axum::debug_handler]
pub async fn get_result(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<Uuid>,
) -> Result<Json<ResultBreakdown>> {
    let breakdown = state
        .result_service
        .get_student_result(claims.sub, quiz_id)
        .await?;
    Ok(Json(breakdown))
}

#[axum::debug_handler]
pub async fn my_results(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<StudentResultSummary>>> {
    let results = state
        .result_service
        .get_all_results_for_student(claims.sub)
        .await?;
    Ok(Json(results))
}

#[axum::debug_handler]
pub async fn stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<StudentStats>> {
    let stats = state.result_service.get_student_stats(claims.sub).await?;
    Ok(Json(stats))
}
