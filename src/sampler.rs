use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::sync::Mutex;

use crate::error::QuizError;
use crate::models::{DifficultyFilter, QuestionId, Scope};

/// Draws question sequences for new quizzes.
#[derive(Debug)]
pub struct Sampler {
    rng: Mutex<StdRng>,
}

impl Sampler {
    pub fn from_entropy() -> Sampler {
        Sampler {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Sampler {
        Sampler {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Picks `count` distinct questions from `eligible`, uniformly and in
    /// random order. Fails with the number of available questions when the
    /// pool is too small.
    pub fn sample(
        &self,
        eligible: &[QuestionId],
        count: usize,
        scope: Scope,
        difficulty: DifficultyFilter,
    ) -> Result<Vec<QuestionId>, QuizError> {
        if count == 0 {
            return Err(QuizError::Validation(
                "a quiz needs at least one question".into(),
            ));
        }

        if eligible.len() < count {
            return Err(QuizError::InsufficientQuestions {
                available: eligible.len(),
                requested: count,
                scope: scope.kind(),
                difficulty,
            });
        }

        let mut pool = eligible.to_vec();
        let mut rng = self.rng.lock()?;
        let (picked, _rest) = pool.partial_shuffle(&mut *rng, count);

        Ok(picked.to_vec())
    }
}
