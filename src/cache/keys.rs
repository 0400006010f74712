//! Cache key builders and TTLs.
//!
//! Keys are deterministic strings derived from the request's identity and
//! filters. Handlers must build keys through these functions so that the
//! read side and the invalidation side can never disagree on the format.

use uuid::Uuid;

pub const TTL_STUDENT_RESULTS: u64 = 600;
pub const TTL_STUDENT_RESULT: u64 = 3600;
pub const TTL_BATCH_QUIZZES: u64 = 300;
pub const TTL_TEACHER_QUIZZES: u64 = 600;
pub const TTL_LEADERBOARD: u64 = 300;
pub const TTL_ALL_BATCHES: u64 = 3600;
pub const TTL_AI_ANSWER: u64 = 600;

pub fn student_results(student_id: Uuid) -> String {
    format!("studentResults:{}", student_id)
}

pub fn student_result(student_id: Uuid, quiz_id: Uuid) -> String {
    format!("studentResult:{}:{}", student_id, quiz_id)
}

pub fn batch_quizzes(student_id: Uuid, batch_id: Uuid) -> String {
    format!("student:{}:batch:{}:quizzes", student_id, batch_id)
}

/// Matches every student's cached quiz list for one batch.
pub fn batch_quizzes_pattern(batch_id: Uuid) -> String {
    format!("student:*:batch:{}:quizzes", batch_id)
}

pub fn teacher_quizzes(teacher_id: Uuid) -> String {
    format!("teacherQuizzes:{}", teacher_id)
}

pub fn leaderboard(teacher_id: Uuid, batch_id: Option<Uuid>, quiz_id: Option<Uuid>) -> String {
    format!(
        "leaderboard:{}:{}:{}",
        teacher_id,
        batch_id.map_or_else(|| "all".to_string(), |id| id.to_string()),
        quiz_id.map_or_else(|| "all".to_string(), |id| id.to_string()),
    )
}

/// Matches every filter combination of one teacher's leaderboard.
pub fn leaderboard_pattern(teacher_id: Uuid) -> String {
    format!("leaderboard:{}:*", teacher_id)
}

pub fn all_batches() -> String {
    "allBatches".to_string()
}

pub fn ai_answer(question: &str) -> String {
    format!("ai:{}", question.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaderboard_key_encodes_filters() {
        let teacher = Uuid::new_v4();
        let batch = Uuid::new_v4();
        let quiz = Uuid::new_v4();

        assert_eq!(
            leaderboard(teacher, None, None),
            format!("leaderboard:{}:all:all", teacher)
        );
        assert_eq!(
            leaderboard(teacher, Some(batch), None),
            format!("leaderboard:{}:{}:all", teacher, batch)
        );
        assert_eq!(
            leaderboard(teacher, Some(batch), Some(quiz)),
            format!("leaderboard:{}:{}:{}", teacher, batch, quiz)
        );
    }

    #[test]
    fn leaderboard_pattern_covers_every_variant() {
        let teacher = Uuid::new_v4();
        let prefix = format!("leaderboard:{}:", teacher);
        assert!(leaderboard(teacher, None, None).starts_with(&prefix));
        assert!(leaderboard(teacher, Some(Uuid::new_v4()), Some(Uuid::new_v4()))
            .starts_with(&prefix));
        assert_eq!(leaderboard_pattern(teacher), format!("{}*", prefix));
    }

    #[test]
    fn batch_quizzes_key_matches_its_pattern_shape() {
        let student = Uuid::new_v4();
        let batch = Uuid::new_v4();
        let key = batch_quizzes(student, batch);
        assert!(key.starts_with(&format!("student:{}:", student)));
        assert!(key.ends_with(&format!(":batch:{}:quizzes", batch)));
    }

    #[test]
    fn ai_answer_key_is_normalized() {
        assert_eq!(ai_answer("  What Is RUST? "), "ai:what is rust?");
    }
}
