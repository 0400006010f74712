use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// One quiz question as stored in the `questions` JSONB column.
/// `correct_answer` is always an index into `options`; authoring inputs
/// that supply the literal option text are translated at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: i32,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizSource {
    Ai,
    Manual,
}

impl std::fmt::Display for QuizSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuizSource::Ai => write!(f, "ai"),
            QuizSource::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quiz {
    pub id: Uuid,
    pub title: String,
    pub created_by: Uuid,
    pub batch_id: Uuid,
    pub source: String,
    pub deadline: Option<DateTime<Utc>>,
    pub duration_minutes: i32,
    pub avg_score: i32,
    pub questions: Json<Vec<Question>>,
    pub created_at: DateTime<Utc>,
}
