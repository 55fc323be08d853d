use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{collections::BTreeMap, convert::TryFrom, fmt};

use crate::error::QuizError;
use crate::models::{Question, QuestionId, QuestionStatus, QuizAnswer};

/// Something a user can do to a single question.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Submit,
    MarkForReview,
    ClearAnswer,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Submit => "submit",
            Action::MarkForReview => "mark for review",
            Action::ClearAnswer => "clear",
        })
    }
}

impl QuestionStatus {
    /// The status a question moves to when `action` is applied to it.
    pub fn after(self, action: Action) -> Result<QuestionStatus, QuizError> {
        use QuestionStatus::*;

        match (self, action) {
            (Unattempted, Action::Submit) | (Attempted, Action::Submit) => Ok(Attempted),
            (MarkedForReview, Action::Submit) | (AnsweredAndMarked, Action::Submit) => {
                Ok(AnsweredAndMarked)
            }
            (Unattempted, Action::MarkForReview) => Ok(MarkedForReview),
            (Attempted, Action::MarkForReview) => Ok(AnsweredAndMarked),
            (Attempted, Action::ClearAnswer) => Ok(Unattempted),
            (AnsweredAndMarked, Action::ClearAnswer) => Ok(MarkedForReview),
            (status, action) => Err(QuizError::InvalidTransition { status, action }),
        }
    }
}

/// Where the cursor went after an answer was submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "progress", content = "index")]
pub enum Progress {
    Next(usize),
    /// The last question of the sequence was answered. The quiz can be sealed.
    Exhausted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearOutcome {
    Cleared,
    NothingToClear,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    pub cursor: usize,
    pub question_number: usize,
    pub question_ids: Vec<QuestionId>,
    pub statuses: BTreeMap<QuestionId, QuestionStatus>,
    pub attempted_count: usize,
    pub marked_count: usize,
    pub unattempted_count: usize,
    pub progress: f64,
}

/// Navigation and answer state of one quiz.
///
/// The question sequence is fixed when the session is created. The cursor
/// always points into the sequence. Every question has an implicit
/// `Unattempted` status until it is first touched, and it holds an answer
/// exactly when its status is `Attempted` or `AnsweredAndMarked`.
#[derive(Clone, Debug, PartialEq)]
pub struct QuizSession {
    sequence: Vec<QuestionId>,
    cursor: usize,
    statuses: BTreeMap<QuestionId, QuestionStatus>,
    answers: BTreeMap<QuestionId, QuizAnswer>,
}

impl QuizSession {
    pub fn new(sequence: Vec<QuestionId>) -> Result<QuizSession, QuizError> {
        if sequence.is_empty() {
            return Err(QuizError::Validation(
                "a quiz needs at least one question".into(),
            ));
        }

        let mut seen = std::collections::BTreeSet::new();
        if !sequence.iter().all(|id| seen.insert(*id)) {
            return Err(QuizError::DataIntegrity(
                "question sequence contains duplicates".into(),
            ));
        }

        Ok(QuizSession {
            sequence,
            cursor: 0,
            statuses: Default::default(),
            answers: Default::default(),
        })
    }

    pub fn sequence(&self) -> &[QuestionId] {
        &self.sequence
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> QuestionId {
        self.sequence[self.cursor]
    }

    pub fn status(&self, question_id: QuestionId) -> QuestionStatus {
        self.statuses
            .get(&question_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn answer(&self, question_id: QuestionId) -> Option<&QuizAnswer> {
        self.answers.get(&question_id)
    }

    /// Answers in the order they were first given.
    pub fn answers(&self) -> Vec<&QuizAnswer> {
        let mut answers = self.answers.values().collect::<Vec<_>>();
        answers.sort_by_key(|answer| answer.answered_at);
        answers
    }

    fn ensure_in_sequence(&self, question_id: QuestionId) -> Result<(), QuizError> {
        if self.sequence.contains(&question_id) {
            Ok(())
        } else {
            Err(QuizError::NotFound)
        }
    }

    /// Records an answer to the question under the cursor and moves on.
    pub fn submit_and_advance(
        &mut self,
        question: &Question,
        answer: &str,
        now: DateTime<Utc>,
    ) -> Result<Progress, QuizError> {
        if question.id != self.current() {
            self.ensure_in_sequence(question.id)?;
            return Err(QuizError::Validation(
                "answers can only be submitted for the current question".into(),
            ));
        }

        let answer = answer.trim();
        if answer.is_empty() {
            return Err(QuizError::Validation("Please provide an answer.".into()));
        }

        let status = self.status(question.id).after(Action::Submit)?;
        let is_correct = question.is_correct(answer);

        let answered_at = self
            .answers
            .get(&question.id)
            .map(|previous| previous.answered_at)
            .unwrap_or(now);
        self.answers.insert(
            question.id,
            QuizAnswer {
                question_id: question.id,
                user_answer: answer.into(),
                is_correct,
                answered_at,
            },
        );
        self.statuses.insert(question.id, status);

        if self.cursor + 1 < self.sequence.len() {
            self.cursor += 1;
            Ok(Progress::Next(self.cursor))
        } else {
            Ok(Progress::Exhausted)
        }
    }

    /// Moves the cursor. Out-of-range indices, negative ones included, are
    /// ignored and leave the cursor where it was; the return value tells
    /// whether it moved.
    pub fn jump_to(&mut self, index: i64) -> bool {
        match usize::try_from(index) {
            Ok(index) if index < self.sequence.len() => {
                self.cursor = index;
                true
            }
            _ => false,
        }
    }

    pub fn mark_for_review(&mut self, question_id: QuestionId) -> Result<QuestionStatus, QuizError> {
        self.ensure_in_sequence(question_id)?;

        let status = self.status(question_id).after(Action::MarkForReview)?;
        self.statuses.insert(question_id, status);

        Ok(status)
    }

    pub fn clear_answer(&mut self, question_id: QuestionId) -> Result<ClearOutcome, QuizError> {
        self.ensure_in_sequence(question_id)?;

        if !self.answers.contains_key(&question_id) {
            return Ok(ClearOutcome::NothingToClear);
        }

        let status = self.status(question_id).after(Action::ClearAnswer)?;
        self.answers.remove(&question_id);
        self.statuses.insert(question_id, status);

        Ok(ClearOutcome::Cleared)
    }

    pub fn snapshot(&self) -> Snapshot {
        let statuses = self
            .sequence
            .iter()
            .map(|id| (*id, self.status(*id)))
            .collect::<BTreeMap<_, _>>();

        let total = self.sequence.len();
        let attempted_count = self.answers.len();
        let marked_count = statuses.values().filter(|status| status.is_marked()).count();

        Snapshot {
            cursor: self.cursor,
            question_number: self.cursor + 1,
            question_ids: self.sequence.clone(),
            statuses,
            attempted_count,
            marked_count,
            unattempted_count: total.saturating_sub(attempted_count),
            progress: (self.cursor + 1) as f64 * 100.0 / total as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;
    use QuestionStatus::*;

    fn question(id: QuestionId, correct: &str) -> Question {
        Question {
            id,
            chapter_id: 1,
            text: format!("Question {}", id),
            options: vec![
                ("A".to_string(), "first".to_string()),
                ("B".to_string(), "second".to_string()),
                ("C".to_string(), "third".to_string()),
            ]
            .into_iter()
            .collect(),
            correct_answer: correct.into(),
            explanation: String::new(),
            difficulty: Difficulty::Medium,
        }
    }

    fn session() -> QuizSession {
        QuizSession::new(vec![10, 20, 30]).unwrap()
    }

    #[test]
    fn transition_table() {
        let legal = vec![
            (Unattempted, Action::Submit, Attempted),
            (Attempted, Action::Submit, Attempted),
            (Attempted, Action::MarkForReview, AnsweredAndMarked),
            (Unattempted, Action::MarkForReview, MarkedForReview),
            (MarkedForReview, Action::Submit, AnsweredAndMarked),
            (AnsweredAndMarked, Action::Submit, AnsweredAndMarked),
            (AnsweredAndMarked, Action::ClearAnswer, MarkedForReview),
            (Attempted, Action::ClearAnswer, Unattempted),
        ];
        for (status, action, expected) in legal {
            assert_eq!(status.after(action).unwrap(), expected, "{} / {}", status, action);
        }

        let illegal = vec![
            (MarkedForReview, Action::MarkForReview),
            (AnsweredAndMarked, Action::MarkForReview),
            (Unattempted, Action::ClearAnswer),
            (MarkedForReview, Action::ClearAnswer),
        ];
        for (status, action) in illegal {
            assert!(matches!(
                status.after(action),
                Err(QuizError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn rejects_empty_or_duplicate_sequences() {
        assert!(matches!(QuizSession::new(vec![]), Err(QuizError::Validation(_))));
        assert!(matches!(
            QuizSession::new(vec![1, 2, 1]),
            Err(QuizError::DataIntegrity(_))
        ));
    }

    #[test]
    fn submit_records_answer_and_advances() {
        let mut session = session();

        let progress = session
            .submit_and_advance(&question(10, "B"), "b", Utc::now())
            .unwrap();

        assert_eq!(progress, Progress::Next(1));
        assert_eq!(session.cursor(), 1);
        assert_eq!(session.status(10), Attempted);
        let answer = session.answer(10).unwrap();
        assert_eq!(answer.user_answer, "b");
        assert!(answer.is_correct);
    }

    #[test]
    fn submit_requires_current_question() {
        let mut session = session();

        let err = session
            .submit_and_advance(&question(20, "A"), "A", Utc::now())
            .unwrap_err();
        assert!(matches!(err, QuizError::Validation(_)));

        let err = session
            .submit_and_advance(&question(99, "A"), "A", Utc::now())
            .unwrap_err();
        assert!(matches!(err, QuizError::NotFound));

        assert_eq!(session.cursor(), 0);
        assert!(session.answer(20).is_none());
    }

    #[test]
    fn empty_answer_changes_nothing() {
        let mut session = session();

        let err = session
            .submit_and_advance(&question(10, "A"), "   ", Utc::now())
            .unwrap_err();

        assert!(matches!(err, QuizError::Validation(_)));
        assert_eq!(session.cursor(), 0);
        assert_eq!(session.status(10), Unattempted);
        assert!(session.answer(10).is_none());
    }

    #[test]
    fn resubmission_overwrites_and_reevaluates() {
        let mut session = session();
        session
            .submit_and_advance(&question(10, "A"), "A", Utc::now())
            .unwrap();
        assert!(session.jump_to(0));

        session
            .submit_and_advance(&question(10, "A"), "C", Utc::now())
            .unwrap();

        let answer = session.answer(10).unwrap();
        assert_eq!(answer.user_answer, "C");
        assert!(!answer.is_correct);
        assert_eq!(session.status(10), Attempted);
        assert_eq!(session.answers().len(), 1);
    }

    #[test]
    fn last_answer_signals_exhaustion() {
        let mut session = session();
        assert!(session.jump_to(2));

        let progress = session
            .submit_and_advance(&question(30, "A"), "A", Utc::now())
            .unwrap();

        assert_eq!(progress, Progress::Exhausted);
        assert_eq!(session.cursor(), 2);
    }

    #[test]
    fn out_of_range_jump_is_ignored() {
        let mut session = session();
        assert!(session.jump_to(1));

        assert!(!session.jump_to(3));
        assert_eq!(session.cursor(), 1);

        assert!(!session.jump_to(-1));
        assert!(!session.jump_to(i64::MIN));
        assert_eq!(session.cursor(), 1);
    }

    #[test]
    fn mark_and_answer_round_trip() {
        let mut session = session();

        assert_eq!(session.mark_for_review(20).unwrap(), MarkedForReview);
        session
            .submit_and_advance(&question(10, "A"), "A", Utc::now())
            .unwrap();
        session
            .submit_and_advance(&question(20, "A"), "B", Utc::now())
            .unwrap();
        assert_eq!(session.status(20), AnsweredAndMarked);

        assert_eq!(session.clear_answer(20).unwrap(), ClearOutcome::Cleared);
        assert_eq!(session.status(20), MarkedForReview);
        assert!(session.answer(20).is_none());

        assert!(matches!(
            session.mark_for_review(20),
            Err(QuizError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn clearing_without_an_answer_is_reported() {
        let mut session = session();

        assert_eq!(session.clear_answer(30).unwrap(), ClearOutcome::NothingToClear);
        assert_eq!(session.status(30), Unattempted);

        session.mark_for_review(30).unwrap();
        assert_eq!(session.clear_answer(30).unwrap(), ClearOutcome::NothingToClear);
        assert_eq!(session.status(30), MarkedForReview);

        assert!(matches!(session.clear_answer(7), Err(QuizError::NotFound)));
    }

    #[test]
    fn clearing_an_attempt_returns_to_unattempted() {
        let mut session = session();
        session
            .submit_and_advance(&question(10, "A"), "A", Utc::now())
            .unwrap();

        assert_eq!(session.clear_answer(10).unwrap(), ClearOutcome::Cleared);
        assert_eq!(session.status(10), Unattempted);
    }

    #[test]
    fn snapshot_counts() {
        let mut session = session();
        session
            .submit_and_advance(&question(10, "A"), "A", Utc::now())
            .unwrap();
        session.mark_for_review(10).unwrap();
        session.mark_for_review(30).unwrap();

        let snapshot = session.snapshot();

        assert_eq!(snapshot.cursor, 1);
        assert_eq!(snapshot.question_number, 2);
        assert_eq!(snapshot.attempted_count, 1);
        assert_eq!(snapshot.marked_count, 2);
        assert_eq!(snapshot.unattempted_count, 2);
        assert_eq!(snapshot.statuses[&10], AnsweredAndMarked);
        assert_eq!(snapshot.statuses[&20], Unattempted);
        assert!((snapshot.progress - 200.0 / 3.0).abs() < 1e-9);
    }
}
