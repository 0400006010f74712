use crate::models::quiz::QuizSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBatchRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

/// Authoring input: the correct answer is the literal option text and is
/// resolved to its index at creation time.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuizPayload {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub batch_id: Uuid,
    pub questions: Vec<CreateQuestion>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub source: Option<QuizSource>,
}

/// Draft question as produced by the AI review path: the correct answer is
/// already an option index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct: i32,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PublishQuizPayload {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub batch_id: Uuid,
    pub questions: Vec<DraftQuestion>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub source: Option<QuizSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaderboardQuery {
    pub batch_id: Option<Uuid>,
    pub quiz_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub student_id: Uuid,
    pub name: String,
    pub email: String,
    pub score: i32,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QuizOption {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BatchOption {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<LeaderboardEntry>,
    pub batch_options: Vec<BatchOption>,
    pub quiz_options: Vec<QuizOption>,
}

/// Teacher quiz list entry, joined with the batch name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherQuizSummary {
    pub id: Uuid,
    pub title: String,
    pub batch_name: String,
    pub source: String,
    pub total_questions: usize,
    pub avg_score: i32,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeacherProfile {
    pub name: String,
    pub email: String,
    pub role: crate::models::user::UserRole,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardMetrics {
    pub total_quizzes: i64,
    pub active_students: i64,
    pub avg_score: i32,
    pub total_batches: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentQuiz {
    pub id: Uuid,
    pub title: String,
    pub batch: String,
    pub students: i64,
    pub avg_score: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardResponse {
    pub metrics: DashboardMetrics,
    pub quizzes: Vec<RecentQuiz>,
}

/// Reviewable quiz draft returned by the upload-and-generate endpoint.
/// Never persisted directly; publishing goes through `publish_quiz`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuizDraft {
    pub questions: Vec<DraftQuestion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadGenerateResponse {
    pub quiz: GeneratedQuizDraft,
}
