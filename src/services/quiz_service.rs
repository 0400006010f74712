use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::cache::{keys, CacheService};
use crate::dto::student_dto::{ActiveQuizEntry, BatchQuizEntry, PublicQuestion, StudentQuizView};
use crate::dto::teacher_dto::{CreateQuizPayload, PublishQuizPayload, TeacherQuizSummary};
use crate::error::{Error, Result};
use crate::models::quiz::{Question, Quiz, QuizSource};
use crate::services::grading_service;

#[derive(Clone)]
pub struct QuizService {
    pool: PgPool,
    cache: CacheService,
}

impl QuizService {
    pub fn new(pool: PgPool, cache: CacheService) -> Self {
        Self { pool, cache }
    }

    /// Creates a quiz from authored questions. Each question's correct
    /// answer arrives as the literal option text and is resolved to an
    /// index here; an answer that is not among the options rejects the
    /// whole quiz.
    pub async fn create_quiz(&self, teacher_id: Uuid, payload: CreateQuizPayload) -> Result<Quiz> {
        if payload.questions.is_empty() {
            return Err(Error::Validation(
                "A quiz needs at least one question".to_string(),
            ));
        }

        let mut questions = Vec::with_capacity(payload.questions.len());
        for q in &payload.questions {
            if q.options.len() < 2 {
                return Err(Error::Validation(format!(
                    "Question \"{}\" needs at least two options",
                    q.question
                )));
            }
            let correct_answer = grading_service::resolve_correct_index(&q.options, &q.correct_answer)
                .ok_or_else(|| {
                    Error::Validation(format!(
                        "Correct answer \"{}\" is not an option of question \"{}\"",
                        q.correct_answer, q.question
                    ))
                })?;
            questions.push(Question {
                question: q.question.clone(),
                options: q.options.clone(),
                correct_answer,
                explanation: q.explanation.clone(),
            });
        }

        self.insert_quiz(
            teacher_id,
            &payload.title,
            payload.batch_id,
            questions,
            payload.deadline,
            payload.duration_minutes,
            payload.source.unwrap_or(QuizSource::Manual),
        )
        .await
    }

    /// Persists a reviewed AI draft. Draft questions carry the correct
    /// answer as an index already, validated against the option count.
    pub async fn publish_quiz(&self, teacher_id: Uuid, payload: PublishQuizPayload) -> Result<Quiz> {
        if payload.questions.is_empty() {
            return Err(Error::Validation(
                "A quiz needs at least one question".to_string(),
            ));
        }

        let mut questions = Vec::with_capacity(payload.questions.len());
        for q in &payload.questions {
            if q.options.len() < 2 {
                return Err(Error::Validation(format!(
                    "Question \"{}\" needs at least two options",
                    q.question
                )));
            }
            if q.correct < 0 || q.correct as usize >= q.options.len() {
                return Err(Error::Validation(format!(
                    "Correct answer index {} is out of range for question \"{}\"",
                    q.correct, q.question
                )));
            }
            questions.push(Question {
                question: q.question.clone(),
                options: q.options.clone(),
                correct_answer: q.correct,
                explanation: q.explanation.clone(),
            });
        }

        self.insert_quiz(
            teacher_id,
            &payload.title,
            payload.batch_id,
            questions,
            payload.deadline,
            payload.duration_minutes,
            payload.source.unwrap_or(QuizSource::Ai),
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert_quiz(
        &self,
        teacher_id: Uuid,
        title: &str,
        batch_id: Uuid,
        questions: Vec<Question>,
        deadline: Option<chrono::DateTime<Utc>>,
        duration_minutes: Option<i32>,
        source: QuizSource,
    ) -> Result<Quiz> {
        let owns_batch = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM batches WHERE id = $1 AND teacher_id = $2)",
        )
        .bind(batch_id)
        .bind(teacher_id)
        .fetch_one(&self.pool)
        .await?;
        if !owns_batch {
            return Err(Error::NotFound("Batch not found".to_string()));
        }

        let quiz = sqlx::query_as::<_, Quiz>(
            "INSERT INTO quizzes (title, created_by, batch_id, source, deadline, duration_minutes, questions)
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, 30), $7)
             RETURNING *",
        )
        .bind(title)
        .bind(teacher_id)
        .bind(batch_id)
        .bind(source.to_string())
        .bind(deadline)
        .bind(duration_minutes)
        .bind(Json(&questions))
        .fetch_one(&self.pool)
        .await?;

        // New quizzes change both the teacher's list and every enrolled
        // student's batch view.
        self.cache.invalidate(&keys::teacher_quizzes(teacher_id)).await;
        self.cache
            .invalidate_pattern(&keys::batch_quizzes_pattern(batch_id))
            .await;

        info!(
            "Teacher {} created {} quiz {} for batch {}",
            teacher_id, quiz.source, quiz.id, batch_id
        );
        Ok(quiz)
    }

    pub async fn get_teacher_quizzes(&self, teacher_id: Uuid) -> Result<Vec<TeacherQuizSummary>> {
        let key = keys::teacher_quizzes(teacher_id);
        if let Some(cached) = self.cache.get_json::<Vec<TeacherQuizSummary>>(&key).await {
            return Ok(cached);
        }

        #[derive(sqlx::FromRow)]
        struct Row {
            id: Uuid,
            title: String,
            batch_name: String,
            source: String,
            avg_score: i32,
            deadline: Option<chrono::DateTime<Utc>>,
            created_at: chrono::DateTime<Utc>,
            questions: Json<Vec<Question>>,
        }

        let rows = sqlx::query_as::<_, Row>(
            "SELECT q.id, q.title, b.name AS batch_name, q.source, q.avg_score,
                    q.deadline, q.created_at, q.questions
             FROM quizzes q
             JOIN batches b ON b.id = q.batch_id
             WHERE q.created_by = $1
             ORDER BY q.created_at DESC",
        )
        .bind(teacher_id)
        .fetch_all(&self.pool)
        .await?;

        let quizzes: Vec<TeacherQuizSummary> = rows
            .into_iter()
            .map(|r| TeacherQuizSummary {
                id: r.id,
                title: r.title,
                batch_name: r.batch_name,
                source: r.source,
                total_questions: r.questions.0.len(),
                avg_score: r.avg_score,
                deadline: r.deadline,
                created_at: r.created_at,
            })
            .collect();

        self.cache
            .set_json(&key, &quizzes, keys::TTL_TEACHER_QUIZZES)
            .await;
        Ok(quizzes)
    }

    /// The quiz as handed to a student about to take it. Correct answers
    /// and explanations are stripped before the payload leaves the server.
    pub async fn get_quiz_for_student(&self, student_id: Uuid, quiz_id: Uuid) -> Result<StudentQuizView> {
        let quiz = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = $1")
            .bind(quiz_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Quiz not found".to_string()))?;

        let member = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM batch_students WHERE batch_id = $1 AND student_id = $2)",
        )
        .bind(quiz.batch_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;
        if !member {
            return Err(Error::Forbidden(
                "You are not a member of this quiz's batch".to_string(),
            ));
        }

        Ok(StudentQuizView {
            id: quiz.id,
            title: quiz.title,
            duration_minutes: quiz.duration_minutes,
            questions: quiz
                .questions
                .0
                .into_iter()
                .map(|q| PublicQuestion {
                    question: q.question,
                    options: q.options,
                })
                .collect(),
        })
    }

    /// Upcoming work across every batch the student is in: quizzes whose
    /// deadline has not passed and which the student has not submitted,
    /// soonest deadline first. A student with no batches gets `NotFound`.
    pub async fn get_active_quizzes(&self, student_id: Uuid) -> Result<Vec<ActiveQuizEntry>> {
        let enrolled = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM batch_students WHERE student_id = $1)",
        )
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;
        if !enrolled {
            return Err(Error::NotFound("No batches found".to_string()));
        }

        let quizzes = sqlx::query_as::<_, Quiz>(
            "SELECT q.* FROM quizzes q
             JOIN batch_students bs ON bs.batch_id = q.batch_id
             WHERE bs.student_id = $1
               AND q.deadline >= NOW()
               AND NOT EXISTS (
                   SELECT 1 FROM results r
                   WHERE r.quiz_id = q.id AND r.student_id = $1
               )
             ORDER BY q.deadline ASC",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(quizzes
            .into_iter()
            .filter_map(|q| {
                q.deadline.map(|deadline| ActiveQuizEntry {
                    id: q.id,
                    title: q.title,
                    batch_id: q.batch_id,
                    duration_minutes: q.duration_minutes,
                    deadline,
                    total_questions: q.questions.0.len(),
                })
            })
            .collect())
    }

    /// A student's view of one batch: every quiz annotated with its derived
    /// status and, when completed, the score.
    pub async fn get_quizzes_by_batch(
        &self,
        student_id: Uuid,
        batch_id: Uuid,
    ) -> Result<Vec<BatchQuizEntry>> {
        let batch_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM batches WHERE id = $1)")
                .bind(batch_id)
                .fetch_one(&self.pool)
                .await?;
        if !batch_exists {
            return Err(Error::NotFound("Batch not found".to_string()));
        }

        let member = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM batch_students WHERE batch_id = $1 AND student_id = $2)",
        )
        .bind(batch_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;
        if !member {
            return Err(Error::Forbidden(
                "You are not a member of this batch".to_string(),
            ));
        }

        let key = keys::batch_quizzes(student_id, batch_id);
        if let Some(cached) = self.cache.get_json::<Vec<BatchQuizEntry>>(&key).await {
            return Ok(cached);
        }

        let quizzes = sqlx::query_as::<_, Quiz>(
            "SELECT * FROM quizzes WHERE batch_id = $1
             ORDER BY deadline ASC NULLS LAST, created_at ASC",
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        #[derive(sqlx::FromRow)]
        struct ScoreRow {
            quiz_id: Uuid,
            score: i32,
        }
        let quiz_ids: Vec<Uuid> = quizzes.iter().map(|q| q.id).collect();
        let scores = sqlx::query_as::<_, ScoreRow>(
            "SELECT quiz_id, score FROM results WHERE student_id = $1 AND quiz_id = ANY($2)",
        )
        .bind(student_id)
        .bind(&quiz_ids)
        .fetch_all(&self.pool)
        .await?;
        let scores: std::collections::HashMap<Uuid, i32> =
            scores.into_iter().map(|r| (r.quiz_id, r.score)).collect();

        let now = Utc::now();
        let entries: Vec<BatchQuizEntry> = quizzes
            .into_iter()
            .map(|q| {
                let score = scores.get(&q.id).copied();
                BatchQuizEntry {
                    id: q.id,
                    title: q.title,
                    duration_minutes: q.duration_minutes,
                    deadline: q.deadline,
                    total_questions: q.questions.0.len(),
                    status: grading_service::quiz_status(score.is_some(), q.deadline, now),
                    score,
                }
            })
            .collect();

        self.cache
            .set_json(&key, &entries, keys::TTL_BATCH_QUIZZES)
            .await;
        Ok(entries)
    }
}
