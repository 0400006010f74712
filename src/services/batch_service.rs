use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::cache::{keys, CacheService};
use crate::error::{Error, Result};
use crate::models::batch::{Batch, BatchSummary, BatchWithTeacher};
use crate::models::user::UserRole;

#[derive(Clone)]
pub struct BatchService {
    pool: PgPool,
    cache: CacheService,
}

impl BatchService {
    pub fn new(pool: PgPool, cache: CacheService) -> Self {
        Self { pool, cache }
    }

    pub async fn create_batch(&self, teacher_id: Uuid, name: &str) -> Result<Batch> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM batches WHERE name = $1)",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        if exists {
            return Err(Error::Conflict("Batch name already exists".to_string()));
        }

        let batch = sqlx::query_as::<_, Batch>(
            "INSERT INTO batches (name, teacher_id) VALUES ($1, $2) RETURNING *",
        )
        .bind(name)
        .bind(teacher_id)
        .fetch_one(&self.pool)
        .await?;

        self.cache.invalidate(&keys::all_batches()).await;
        info!("Teacher {} created batch {}", teacher_id, batch.id);
        Ok(batch)
    }

    /// Directory of every batch, shown to students picking one to join.
    pub async fn list_all_batches(&self) -> Result<Vec<BatchWithTeacher>> {
        let key = keys::all_batches();
        if let Some(cached) = self.cache.get_json::<Vec<BatchWithTeacher>>(&key).await {
            return Ok(cached);
        }

        let batches = sqlx::query_as::<_, BatchWithTeacher>(
            "SELECT b.id, b.name, u.name AS teacher_name, u.email AS teacher_email, b.created_at
             FROM batches b
             JOIN users u ON u.id = b.teacher_id
             ORDER BY b.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        self.cache
            .set_json(&key, &batches, keys::TTL_ALL_BATCHES)
            .await;
        Ok(batches)
    }

    pub async fn list_teacher_batches(&self, teacher_id: Uuid) -> Result<Vec<BatchSummary>> {
        let batches = sqlx::query_as::<_, BatchSummary>(
            "SELECT b.id, b.name, COUNT(bs.student_id) AS student_count, b.created_at
             FROM batches b
             LEFT JOIN batch_students bs ON bs.batch_id = b.id
             WHERE b.teacher_id = $1
             GROUP BY b.id
             ORDER BY b.created_at DESC",
        )
        .bind(teacher_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(batches)
    }

    /// Enrolls a student. Membership is a single row in `batch_students`, so
    /// the student's and the batch's views of the enrollment cannot diverge.
    /// Joining a batch twice is a conflict.
    pub async fn join_batch(&self, student_id: Uuid, batch_id: Uuid) -> Result<Batch> {
        let batch = sqlx::query_as::<_, Batch>("SELECT * FROM batches WHERE id = $1")
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Batch not found".to_string()))?;

        self.ensure_student(student_id).await?;

        // The composite primary key turns a concurrent double join into a
        // unique violation, surfaced as a conflict.
        let inserted = sqlx::query(
            "INSERT INTO batch_students (batch_id, student_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(batch_id)
        .bind(student_id)
        .execute(&self.pool)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(Error::Conflict(
                "You have already joined this batch".to_string(),
            ));
        }

        self.cache
            .invalidate(&keys::batch_quizzes(student_id, batch_id))
            .await;
        info!("Student {} joined batch {}", student_id, batch_id);
        Ok(batch)
    }

    /// Removes an enrollment. Leaving a batch the student is not in is a
    /// no-op, so retried leave requests stay safe.
    pub async fn leave_batch(&self, student_id: Uuid, batch_id: Uuid) -> Result<Batch> {
        let batch = sqlx::query_as::<_, Batch>("SELECT * FROM batches WHERE id = $1")
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Batch not found".to_string()))?;

        self.ensure_student(student_id).await?;

        sqlx::query("DELETE FROM batch_students WHERE batch_id = $1 AND student_id = $2")
            .bind(batch_id)
            .bind(student_id)
            .execute(&self.pool)
            .await?;

        self.cache
            .invalidate(&keys::batch_quizzes(student_id, batch_id))
            .await;
        info!("Student {} left batch {}", student_id, batch_id);
        Ok(batch)
    }

    async fn ensure_student(&self, student_id: Uuid) -> Result<()> {
        let role = sqlx::query_scalar::<_, UserRole>("SELECT role FROM users WHERE id = $1")
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?;
        // Membership is defined over students only; any other caller is
        // "not a student here", the same as an unknown id.
        match role {
            Some(UserRole::Student) => Ok(()),
            Some(_) | None => Err(Error::NotFound("Student not found".to_string())),
        }
    }
}
