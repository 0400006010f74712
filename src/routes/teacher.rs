use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::teacher_dto::{
    CreateBatchRequest, CreateQuizPayload, DashboardResponse, LeaderboardQuery,
    LeaderboardResponse, PublishQuizPayload, TeacherProfile, TeacherQuizSummary,
    UploadGenerateResponse,
};
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::models::batch::BatchSummary;
use crate::services::ai_service;
use crate::AppState;

#[axum::debug_handler]
pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<TeacherProfile>> {
    let user = sqlx::query_as::<_, crate::models::user::User>(
        "SELECT * FROM users WHERE id = $1",
    )
    .bind(claims.sub)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| Error::NotFound("User not found".to_string()))?;

    Ok(Json(TeacherProfile {
        name: user.name,
        email: user.email,
        role: user.role,
    }))
}

#[axum::debug_handler]
pub async fn create_batch(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateBatchRequest>,
) -> Result<Response> {
    req.validate()?;
    let batch = state
        .batch_service
        .create_batch(claims.sub, &req.name)
        .await?;
    Ok((StatusCode::CREATED, Json(batch)).into_response())
}

#[axum::debug_handler]
pub async fn list_batches(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<BatchSummary>>> {
    let batches = state.batch_service.list_teacher_batches(claims.sub).await?;
    Ok(Json(batches))
}

#[axum::debug_handler]
pub async fn create_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuizPayload>,
) -> Result<Response> {
    payload.validate()?;
    let quiz = state.quiz_service.create_quiz(claims.sub, payload).await?;
    Ok((StatusCode::CREATED, Json(quiz)).into_response())
}

#[axum::debug_handler]
pub async fn publish_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<PublishQuizPayload>,
) -> Result<Response> {
    payload.validate()?;
    let quiz = state.quiz_service.publish_quiz(claims.sub, payload).await?;
    Ok((StatusCode::CREATED, Json(quiz)).into_response())
}

#[axum::debug_handler]
pub async fn list_quizzes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<TeacherQuizSummary>>> {
    let quizzes = state.quiz_service.get_teacher_quizzes(claims.sub).await?;
    Ok(Json(quizzes))
}

#[axum::debug_handler]
pub async fn leaderboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>> {
    let response = state
        .result_service
        .get_leaderboard(claims.sub, &query)
        .await?;
    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<DashboardResponse>> {
    let response = state.result_service.get_teacher_dashboard(claims.sub).await?;
    Ok(Json(response))
}

/// Accepts a PDF upload and returns a generated draft for review. Nothing
/// is persisted here; the teacher publishes the edited draft separately.
#[axum::debug_handler]
pub async fn upload_and_generate(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<Json<UploadGenerateResponse>> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut batch_id: Option<Uuid> = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => {
                file_bytes = Some(field.bytes().await?.to_vec());
            }
            Some("batch_id") => {
                let raw = field.text().await?;
                batch_id = Some(raw.parse().map_err(|_| {
                    Error::Validation("batch_id is not a valid UUID".to_string())
                })?);
            }
            _ => {}
        }
    }

    let file_bytes =
        file_bytes.ok_or_else(|| Error::Validation("Missing file field".to_string()))?;
    batch_id.ok_or_else(|| Error::Validation("Missing batch_id field".to_string()))?;

    let text = ai_service::extract_pdf_text(&file_bytes).await;
    let quiz = if text.trim().is_empty() {
        tracing::warn!("Uploaded document produced no text; returning fallback draft");
        ai_service::fallback_draft()
    } else {
        state.ai_service.generate_quiz_draft(&text).await
    };

    Ok(Json(UploadGenerateResponse { quiz }))
}
