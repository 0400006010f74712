use crate::models::result::SubmittedAnswer;
use crate::models::user::UserRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize)]
pub struct JoinBatchRequest {
    pub batch_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitQuizRequest {
    pub quiz_id: Uuid,
    pub answers: Vec<SubmittedAnswer>,
    #[validate(length(min = 1, max = 32))]
    pub time_spent: String,
}

/// Computed per-student quiz state, derived at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizStatus {
    Available,
    Overdue,
    Completed,
}

/// One quiz in the student's batch dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchQuizEntry {
    pub id: Uuid,
    pub title: String,
    pub duration_minutes: i32,
    pub deadline: Option<DateTime<Utc>>,
    pub total_questions: usize,
    pub status: QuizStatus,
    pub score: Option<i32>,
}

/// Upcoming quiz across all of a student's batches: future deadline, not
/// yet submitted. Answers stay server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveQuizEntry {
    pub id: Uuid,
    pub title: String,
    pub batch_id: Uuid,
    pub duration_minutes: i32,
    pub deadline: DateTime<Utc>,
    pub total_questions: usize,
}

/// Question as exposed to a student taking a quiz: no correct answer,
/// no explanation.
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentQuizView {
    pub id: Uuid,
    pub title: String,
    pub duration_minutes: i32,
    pub questions: Vec<PublicQuestion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitQuizResponse {
    pub message: String,
    pub result: crate::models::result::QuizResult,
}

/// Per-question line of the detailed result breakdown.
/// `user_answer` is `-1` when the question was left unanswered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBreakdown {
    pub id: usize,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: i32,
    pub user_answer: i32,
    pub is_correct: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultBreakdown {
    pub quiz_title: String,
    pub score: i32,
    pub correct_answers: i32,
    pub total_questions: usize,
    pub completed_at: DateTime<Utc>,
    pub time_spent: String,
    pub questions: Vec<QuestionBreakdown>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StudentResultSummary {
    pub quiz_id: Uuid,
    pub quiz_title: String,
    pub score: i32,
    pub correct_answers: i32,
    pub completed_at: DateTime<Utc>,
    pub time_spent: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentStats {
    pub average_score: i32,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BatchName {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub batches: Vec<BatchName>,
}
