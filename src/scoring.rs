use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QuizError;
use crate::models::{Quiz, QuizAnswer};

pub const CORRECT_MARK: f64 = 1.0;
pub const WRONG_MARK: f64 = -0.25;
pub const UNATTEMPTED_MARK: f64 = 0.0;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ScoreBreakdown {
    pub correct_count: usize,
    pub wrong_count: usize,
    pub attempted_count: usize,
    pub unattempted_count: usize,
    pub raw_score: f64,
    pub max_possible: f64,
    /// Never negative, even when `raw_score` is.
    pub percentage: f64,
}

impl ScoreBreakdown {
    pub fn compute<'a>(
        answers: impl IntoIterator<Item = &'a QuizAnswer>,
        total_questions: usize,
    ) -> Result<ScoreBreakdown, QuizError> {
        let (correct_count, wrong_count) =
            answers
                .into_iter()
                .fold((0, 0), |(correct, wrong), answer| {
                    if answer.is_correct {
                        (correct + 1, wrong)
                    } else {
                        (correct, wrong + 1)
                    }
                });

        let attempted_count = correct_count + wrong_count;
        if attempted_count > total_questions {
            return Err(QuizError::DataIntegrity(format!(
                "{} answers recorded for a quiz of {} questions",
                attempted_count, total_questions
            )));
        }
        let unattempted_count = total_questions - attempted_count;

        let raw_score = correct_count as f64 * CORRECT_MARK
            + wrong_count as f64 * WRONG_MARK
            + unattempted_count as f64 * UNATTEMPTED_MARK;
        let max_possible = total_questions as f64 * CORRECT_MARK;

        let percentage = if max_possible > 0.0 {
            (raw_score * 100.0 / max_possible).max(0.0)
        } else {
            0.0
        };

        Ok(ScoreBreakdown {
            correct_count,
            wrong_count,
            attempted_count,
            unattempted_count,
            raw_score,
            max_possible,
            percentage,
        })
    }
}

/// Outcome of a call to [`seal`].
#[derive(Clone, Debug, PartialEq)]
pub struct Sealing {
    pub breakdown: ScoreBreakdown,
    /// False when the quiz had been sealed before and the stored result was
    /// returned.
    pub newly_sealed: bool,
}

/// Scores a quiz and marks it completed. A sealed quiz keeps its stored
/// result and is never scored again. The caller must hold the quiz exclusively.
pub fn seal(quiz: &mut Quiz, now: DateTime<Utc>) -> Result<Sealing, QuizError> {
    if let Some(breakdown) = &quiz.result {
        return Ok(Sealing {
            breakdown: breakdown.clone(),
            newly_sealed: false,
        });
    }

    let breakdown = ScoreBreakdown::compute(quiz.session.answers(), quiz.total_questions)?;

    quiz.end_time = Some(now);
    quiz.result = Some(breakdown.clone());

    Ok(Sealing {
        breakdown,
        newly_sealed: true,
    })
}
