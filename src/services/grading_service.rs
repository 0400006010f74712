//! Pure grading rules, shared by submission and by the result breakdown.
//!
//! Grading happens exactly once, at submission time. Everything here is
//! deterministic over the quiz's question list and the submitted answers.

use chrono::{DateTime, Utc};

use crate::dto::student_dto::QuizStatus;
use crate::models::quiz::Question;
use crate::models::result::SubmittedAnswer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeOutcome {
    pub correct_answers: i32,
    pub score: i32,
}

/// Grades a submission against the quiz's stored questions.
///
/// An answer counts as correct only when its `question_index` points at a
/// real question and `selected_option` equals that question's answer index.
/// Out-of-range indices and skipped questions contribute nothing. The score
/// is the percentage of correct answers over the question count, rounded to
/// the nearest integer; a quiz with no questions scores zero.
pub fn grade(questions: &[Question], answers: &[SubmittedAnswer]) -> GradeOutcome {
    let total = questions.len();
    if total == 0 {
        return GradeOutcome {
            correct_answers: 0,
            score: 0,
        };
    }

    let correct = answers
        .iter()
        .filter(|a| {
            usize::try_from(a.question_index)
                .ok()
                .and_then(|idx| questions.get(idx))
                .is_some_and(|q| a.selected_option == Some(q.correct_answer))
        })
        .count();

    GradeOutcome {
        correct_answers: correct as i32,
        score: ((correct as f64 / total as f64) * 100.0).round() as i32,
    }
}

/// Derives the per-student status of a quiz at read time. Nothing is stored:
/// a submitted result wins over any deadline, and a missing deadline means
/// the quiz never becomes overdue.
pub fn quiz_status(
    has_result: bool,
    deadline: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> QuizStatus {
    if has_result {
        QuizStatus::Completed
    } else if deadline.is_some_and(|d| d < now) {
        QuizStatus::Overdue
    } else {
        QuizStatus::Available
    }
}

/// Resolves an authored correct-answer literal to its option index.
/// Matching is exact; `None` means the author's answer text is not among
/// the options.
pub fn resolve_correct_index(options: &[String], correct_answer: &str) -> Option<i32> {
    options
        .iter()
        .position(|opt| opt == correct_answer)
        .map(|idx| idx as i32)
}
