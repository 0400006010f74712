use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Batch {
    pub id: Uuid,
    pub name: String,
    pub teacher_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Batch joined with its owning teacher, for the student-facing directory.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BatchWithTeacher {
    pub id: Uuid,
    pub name: String,
    pub teacher_name: String,
    pub teacher_email: String,
    pub created_at: DateTime<Utc>,
}

/// Teacher's own batch with member count.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BatchSummary {
    pub id: Uuid,
    pub name: String,
    pub student_count: i64,
    pub created_at: DateTime<Utc>,
}
