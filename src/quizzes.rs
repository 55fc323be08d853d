use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, RwLock,
    },
};

use crate::error::QuizError;
use crate::models::{Quiz, QuizId, UserId};

/// Quizzes by id. Each quiz sits behind its own lock, so operations on one
/// quiz are serialized while different quizzes proceed independently.
#[derive(Clone, Debug, Default)]
pub struct QuizStore {
    quizzes: Arc<RwLock<BTreeMap<QuizId, Arc<Mutex<Quiz>>>>>,
    next_id: Arc<AtomicU64>,
}

impl QuizStore {
    pub fn new() -> QuizStore {
        Default::default()
    }

    /// Stores a new quiz under a fresh id, overwriting `quiz.id`.
    pub fn insert(&self, mut quiz: Quiz) -> Result<QuizId, QuizError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        quiz.id = id;

        let mut quizzes = self.quizzes.write()?;
        quizzes.insert(id, Arc::new(Mutex::new(quiz)));

        Ok(id)
    }

    fn get(&self, id: QuizId) -> Result<Arc<Mutex<Quiz>>, QuizError> {
        let quizzes = self.quizzes.read()?;
        quizzes.get(&id).cloned().ok_or(QuizError::NotFound)
    }

    /// Runs `f` with exclusive access to a quiz owned by `user`. Quizzes of
    /// other users look exactly like missing ones.
    pub fn with_quiz<T>(
        &self,
        id: QuizId,
        user: &UserId,
        f: impl FnOnce(&mut Quiz) -> Result<T, QuizError>,
    ) -> Result<T, QuizError> {
        let quiz = self.get(id)?;
        let mut quiz = quiz.lock()?;

        if quiz.user != *user {
            return Err(QuizError::NotFound);
        }

        f(&mut *quiz)
    }

    /// Copies of all quizzes owned by `user`.
    pub fn owned_by(&self, user: &UserId) -> Result<Vec<Quiz>, QuizError> {
        let handles = {
            let quizzes = self.quizzes.read()?;
            quizzes.values().cloned().collect::<Vec<_>>()
        };

        let mut owned = Vec::new();
        for handle in handles {
            let quiz = handle.lock()?;
            if quiz.user == *user {
                owned.push(quiz.clone());
            }
        }

        Ok(owned)
    }
}
