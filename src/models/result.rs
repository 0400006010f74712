use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// One submitted answer. `selected_option` is absent for skipped questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_index: i32,
    #[serde(default)]
    pub selected_option: Option<i32>,
}

/// The graded record of one student's one submission to one quiz.
/// Unique per (quiz, student), never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuizResult {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub student_id: Uuid,
    pub score: i32,
    pub correct_answers: i32,
    pub time_spent: String,
    pub completed_at: DateTime<Utc>,
    pub answers: Json<Vec<SubmittedAnswer>>,
}
