use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::cache::{keys, CacheService};
use crate::dto::student_dto::{
    QuestionBreakdown, ResultBreakdown, StudentResultSummary, StudentStats, SubmitQuizRequest,
};
use crate::dto::teacher_dto::{
    BatchOption, DashboardMetrics, DashboardResponse, LeaderboardEntry, LeaderboardQuery,
    LeaderboardResponse, QuizOption, RecentQuiz,
};
use crate::error::{Error, Result};
use crate::models::quiz::Quiz;
use crate::models::result::QuizResult;
use crate::services::grading_service;

#[derive(Clone)]
pub struct ResultService {
    pool: PgPool,
    cache: CacheService,
}

/// Ungraded leaderboard row as it comes out of the store.
#[derive(Debug, Clone, sqlx::FromRow)]
struct LeaderboardRow {
    student_id: Uuid,
    name: String,
    email: String,
    score: i32,
    completed_at: DateTime<Utc>,
}

/// Orders rows by score descending, ties broken by earlier submission, and
/// assigns dense 1-based ranks.
fn rank_entries(mut rows: Vec<LeaderboardRow>) -> Vec<LeaderboardEntry> {
    rows.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.completed_at.cmp(&b.completed_at))
    });
    rows.into_iter()
        .enumerate()
        .map(|(idx, r)| LeaderboardEntry {
            rank: idx + 1,
            student_id: r.student_id,
            name: r.name,
            email: r.email,
            score: r.score,
            submitted_at: r.completed_at,
        })
        .collect()
}

impl ResultService {
    pub fn new(pool: PgPool, cache: CacheService) -> Self {
        Self { pool, cache }
    }

    /// Grades and records a submission. A student gets exactly one result
    /// per quiz; the unique constraint on (quiz_id, student_id) arbitrates
    /// concurrent duplicates and surfaces as a conflict.
    pub async fn submit_quiz(
        &self,
        student_id: Uuid,
        req: &SubmitQuizRequest,
    ) -> Result<QuizResult> {
        let already = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM results WHERE quiz_id = $1 AND student_id = $2)",
        )
        .bind(req.quiz_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;
        if already {
            return Err(Error::Conflict("Quiz already submitted".to_string()));
        }

        let quiz = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = $1")
            .bind(req.quiz_id)
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

        let outcome = grading_service::grade(&quiz.questions.0, &req.answers);

        let result = sqlx::query_as::<_, QuizResult>(
            "INSERT INTO results (quiz_id, student_id, score, correct_answers, time_spent, answers)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(req.quiz_id)
        .bind(student_id)
        .bind(outcome.score)
        .bind(outcome.correct_answers)
        .bind(&req.time_spent)
        .bind(Json(&req.answers))
        .fetch_one(&self.pool)
        .await?;

        // The quiz carries a denormalized running average for the teacher
        // views; recompute it from the results table.
        sqlx::query(
            "UPDATE quizzes SET avg_score = COALESCE(
                 (SELECT ROUND(AVG(score))::int FROM results WHERE quiz_id = $1), 0)
             WHERE id = $1",
        )
        .bind(req.quiz_id)
        .execute(&self.pool)
        .await?;

        self.cache
            .invalidate(&keys::student_results(student_id))
            .await;
        self.cache
            .invalidate(&keys::batch_quizzes(student_id, quiz.batch_id))
            .await;
        self.cache
            .invalidate(&keys::teacher_quizzes(quiz.created_by))
            .await;
        self.cache
            .invalidate_pattern(&keys::leaderboard_pattern(quiz.created_by))
            .await;

        info!(
            "Student {} submitted quiz {}: {}% ({} correct)",
            student_id, req.quiz_id, outcome.score, outcome.correct_answers
        );
        Ok(result)
    }

    /// Per-question breakdown of one graded result, including the correct
    /// answers. Only reachable after submission, so the answers are no
    /// longer secret to this student.
    pub async fn get_student_result(
        &self,
        student_id: Uuid,
        quiz_id: Uuid,
    ) -> Result<ResultBreakdown> {
        let key = keys::student_result(student_id, quiz_id);
        if let Some(cached) = self.cache.get_json::<ResultBreakdown>(&key).await {
            return Ok(cached);
        }

        let result = sqlx::query_as::<_, QuizResult>(
            "SELECT * FROM results WHERE quiz_id = $1 AND student_id = $2",
        )
        .bind(quiz_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Result not found".to_string()))?;

        let quiz = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = $1")
            .bind(quiz_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Quiz not found".to_string()))?;

        let questions: Vec<QuestionBreakdown> = quiz
            .questions
            .0
            .iter()
            .enumerate()
            .map(|(idx, q)| {
                let user_answer = result
                    .answers
                    .0
                    .iter()
                    .find(|a| a.question_index == idx as i32)
                    .and_then(|a| a.selected_option)
                    .unwrap_or(-1);
                QuestionBreakdown {
                    id: idx,
                    question: q.question.clone(),
                    options: q.options.clone(),
                    correct_answer: q.correct_answer,
                    user_answer,
                    is_correct: user_answer == q.correct_answer,
                    explanation: q.explanation.clone().unwrap_or_default(),
                }
            })
            .collect();

        let breakdown = ResultBreakdown {
            quiz_title: quiz.title,
            score: result.score,
            correct_answers: result.correct_answers,
            total_questions: quiz.questions.0.len(),
            completed_at: result.completed_at,
            time_spent: result.time_spent,
            questions,
        };

        self.cache
            .set_json(&key, &breakdown, keys::TTL_STUDENT_RESULT)
            .await;
        Ok(breakdown)
    }

    /// Every result of one student, newest first. Results whose quiz has
    /// been deleted are dropped by the inner join.
    pub async fn get_all_results_for_student(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<StudentResultSummary>> {
        let key = keys::student_results(student_id);
        if let Some(cached) = self.cache.get_json::<Vec<StudentResultSummary>>(&key).await {
            return Ok(cached);
        }

        let results = sqlx::query_as::<_, StudentResultSummary>(
            "SELECT r.quiz_id, q.title AS quiz_title, r.score, r.correct_answers,
                    r.completed_at, r.time_spent
             FROM results r
             JOIN quizzes q ON q.id = r.quiz_id
             WHERE r.student_id = $1
             ORDER BY r.completed_at DESC",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        self.cache
            .set_json(&key, &results, keys::TTL_STUDENT_RESULTS)
            .await;
        Ok(results)
    }

    pub async fn get_student_stats(&self, student_id: Uuid) -> Result<StudentStats> {
        let average_score = sqlx::query_scalar::<_, i32>(
            "SELECT COALESCE(ROUND(AVG(score)), 0)::int FROM results WHERE student_id = $1",
        )
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(StudentStats { average_score })
    }

    /// Ranked standings across the teacher's quizzes, optionally narrowed
    /// to one batch and/or one quiz. A batch filter the teacher does not
    /// own is rejected.
    pub async fn get_leaderboard(
        &self,
        teacher_id: Uuid,
        query: &LeaderboardQuery,
    ) -> Result<LeaderboardResponse> {
        if let Some(batch_id) = query.batch_id {
            let owner = sqlx::query_scalar::<_, Uuid>(
                "SELECT teacher_id FROM batches WHERE id = $1",
            )
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Batch not found".to_string()))?;
            if owner != teacher_id {
                return Err(Error::Forbidden(
                    "Not authorized for this batch".to_string(),
                ));
            }
        }

        let key = keys::leaderboard(teacher_id, query.batch_id, query.quiz_id);
        if let Some(cached) = self.cache.get_json::<LeaderboardResponse>(&key).await {
            return Ok(cached);
        }

        let quiz_options = sqlx::query_as::<_, QuizOption>(
            "SELECT id, title FROM quizzes
             WHERE created_by = $1
               AND ($2::uuid IS NULL OR batch_id = $2)
               AND ($3::uuid IS NULL OR id = $3)
             ORDER BY created_at DESC",
        )
        .bind(teacher_id)
        .bind(query.batch_id)
        .bind(query.quiz_id)
        .fetch_all(&self.pool)
        .await?;

        let batch_options = if query.batch_id.is_some() {
            Vec::new()
        } else {
            sqlx::query_as::<_, BatchOption>(
                "SELECT id, name FROM batches WHERE teacher_id = $1 ORDER BY created_at DESC",
            )
            .bind(teacher_id)
            .fetch_all(&self.pool)
            .await?
        };

        let leaderboard = if quiz_options.is_empty() {
            Vec::new()
        } else {
            let quiz_ids: Vec<Uuid> = quiz_options.iter().map(|q| q.id).collect();
            let rows = sqlx::query_as::<_, LeaderboardRow>(
                "SELECT r.student_id, u.name, u.email, r.score, r.completed_at
                 FROM results r
                 JOIN users u ON u.id = r.student_id
                 WHERE r.quiz_id = ANY($1)",
            )
            .bind(&quiz_ids)
            .fetch_all(&self.pool)
            .await?;
            rank_entries(rows)
        };

        let response = LeaderboardResponse {
            leaderboard,
            batch_options,
            quiz_options,
        };
        self.cache
            .set_json(&key, &response, keys::TTL_LEADERBOARD)
            .await;
        Ok(response)
    }

    pub async fn get_teacher_dashboard(&self, teacher_id: Uuid) -> Result<DashboardResponse> {
        #[derive(sqlx::FromRow)]
        struct QuizRow {
            id: Uuid,
            title: String,
            batch: String,
            students: i64,
            avg_score: i32,
        }

        let quizzes = sqlx::query_as::<_, QuizRow>(
            "SELECT q.id, q.title, b.name AS batch,
                    (SELECT COUNT(*) FROM results r WHERE r.quiz_id = q.id) AS students,
                    q.avg_score
             FROM quizzes q
             JOIN batches b ON b.id = q.batch_id
             WHERE q.created_by = $1
             ORDER BY q.created_at DESC",
        )
        .bind(teacher_id)
        .fetch_all(&self.pool)
        .await?;

        let total_quizzes = quizzes.len() as i64;
        let avg_score = if quizzes.is_empty() {
            0
        } else {
            let sum: i64 = quizzes.iter().map(|q| q.avg_score as i64).sum();
            ((sum as f64) / (quizzes.len() as f64)).round() as i32
        };

        let active_students = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(DISTINCT bs.student_id)
             FROM batch_students bs
             JOIN batches b ON b.id = bs.batch_id
             WHERE b.teacher_id = $1",
        )
        .bind(teacher_id)
        .fetch_one(&self.pool)
        .await?;

        let total_batches = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM batches WHERE teacher_id = $1",
        )
        .bind(teacher_id)
        .fetch_one(&self.pool)
        .await?;

        let quizzes: Vec<RecentQuiz> = quizzes
            .into_iter()
            .take(5)
            .map(|q| RecentQuiz {
                id: q.id,
                title: q.title,
                batch: q.batch,
                students: q.students,
                avg_score: q.avg_score,
            })
            .collect();

        Ok(DashboardResponse {
            metrics: DashboardMetrics {
                total_quizzes,
                active_students,
                avg_score,
                total_batches,
            },
            quizzes,
        })
    }
}
