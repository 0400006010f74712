use axum::{extract::State, response::Json};
use validator::Validate;

use crate::cache::keys;
use crate::dto::ai_dto::{AskAiRequest, AskAiResponse};
use crate::error::Result;
use crate::AppState;

/// Study assistant endpoint. Answers are cached briefly on the normalized
/// question text so repeated questions skip the upstream call.
#[axum::debug_handler]
pub async fn ask_question(
    State(state): State<AppState>,
    Json(req): Json<AskAiRequest>,
) -> Result<Json<AskAiResponse>> {
    req.validate()?;

    let key = keys::ai_answer(&req.question);
    if let Some(answer) = state.cache.get_raw(&key).await {
        return Ok(Json(AskAiResponse {
            answer,
            cached: true,
        }));
    }

    let answer = state.ai_service.ask(&req.question).await?;
    state
        .cache
        .set_raw(&key, answer.clone(), keys::TTL_AI_ANSWER)
        .await;

    Ok(Json(AskAiResponse {
        answer,
        cached: false,
    }))
}
