use thiserror::Error;

use crate::models::{DifficultyFilter, QuestionStatus};
use crate::session::Action;

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("{0}")]
    Validation(String),

    #[error(
        "Only {available} {} available in this {scope}. Please select {available} or fewer questions.",
        .difficulty.questions_label()
    )]
    InsufficientQuestions {
        available: usize,
        requested: usize,
        scope: &'static str,
        difficulty: DifficultyFilter,
    },

    #[error("The requested resource was not found.")]
    NotFound,

    #[error("This quiz has already been completed.")]
    AlreadyCompleted,

    #[error("Cannot {action} a question that is {status}.")]
    InvalidTransition {
        status: QuestionStatus,
        action: Action,
    },

    #[error("Data integrity fault: {0}")]
    DataIntegrity(String),

    #[error("Internal state unavailable: {0}")]
    Internal(String),
}

impl<T> From<std::sync::PoisonError<T>> for QuizError {
    fn from(_err: std::sync::PoisonError<T>) -> Self {
        QuizError::Internal("lock poisoned".into())
    }
}
