use anyhow::{anyhow, Result};
use chrono::Utc;
use csv;
use hex;
use rand::prelude::*;
use ring::hmac;
use serde::Serialize;
use std::{
    fs::{File, OpenOptions},
    path::Path,
    sync::{Arc, Mutex},
};

use crate::content::ContentStore;
use crate::error::QuizError;
use crate::models::{
    paginate, Page, Question, QuestionId, QuestionStatus, Quiz, QuizAnswer,
    QuizId, QuizRecord, QuizSelection, QuizSummary, Step, UserId, UserState, PAGE_SIZE,
};
use crate::quizzes::QuizStore;
use crate::sampler::Sampler;
use crate::scoring::{self, ScoreBreakdown};
use crate::session::{ClearOutcome, Progress, QuizSession, Snapshot};

/// The question under the cursor, without its answer key.
#[derive(Clone, Debug, Serialize)]
pub struct QuestionView {
    pub id: QuestionId,
    pub text: String,
    pub options: std::collections::BTreeMap<String, String>,
    pub current_answer: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct QuizView {
    pub quiz: QuizSummary,
    pub question: QuestionView,
    pub snapshot: Snapshot,
    pub deadline: chrono::DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum StepOutcome {
    Answered { progress: Progress },
    Marked { status: QuestionStatus },
    Cleared { cleared: ClearOutcome, status: QuestionStatus },
    Jumped { moved: bool, cursor: usize },
}

impl StepOutcome {
    pub fn is_exhausted(&self) -> bool {
        match self {
            StepOutcome::Answered {
                progress: Progress::Exhausted,
            } => true,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct AnswerReview {
    pub question_id: QuestionId,
    pub question: String,
    pub user_answer: String,
    pub correct_answer: String,
    pub is_correct: bool,
    pub explanation: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct QuizResults {
    pub quiz: QuizSummary,
    pub breakdown: ScoreBreakdown,
    pub answers: Vec<AnswerReview>,
}

#[derive(Clone, Debug)]
pub struct QuizController {
    secret_key: Arc<hmac::Key>,
    content: ContentStore,
    quizzes: QuizStore,
    sampler: Arc<Sampler>,
    result_writer: ResultWriter,
}

impl QuizController {
    pub fn new(
        secret_key: hmac::Key,
        content: ContentStore,
        sampler: Sampler,
        result_writer: ResultWriter,
    ) -> QuizController {
        QuizController {
            secret_key: Arc::new(secret_key),
            content,
            quizzes: QuizStore::new(),
            sampler: Arc::new(sampler),
            result_writer,
        }
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    pub fn create_user(&self) -> UserState {
        let id = {
            let mut id = [0u8; 16];
            rand::rngs::OsRng.fill(&mut id);
            UserId(id)
        };

        UserState { id }
    }

    /// Resolves an `Authorization: UserState <token>` header value. Callers
    /// without one are given a new identity.
    pub fn authorize(&self, authorization: Option<&str>) -> Result<UserState> {
        let authorization = match authorization {
            None => {
                let user_state = self.create_user();
                tracing::debug!(user = %hex::encode(&user_state.id.0), "issued new identity");
                return Ok(user_state);
            }
            Some(authorization) => authorization.trim(),
        };

        let mut parts = authorization.splitn(2, ' ');
        match (parts.next(), parts.next()) {
            (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("userstate") => {
                self.decode_user(token.trim())
            }
            _ => Err(anyhow!("unsupported authorization scheme")),
        }
    }

    pub fn decode_user(&self, token: &str) -> Result<UserState> {
        let mut parts = token.splitn(2, ':');
        let user_state = parts
            .next()
            .ok_or_else(|| anyhow!("bad authorization token"))?;
        let user_state = base64::decode_config(user_state, base64::URL_SAFE_NO_PAD)?;

        let signature = parts
            .next()
            .ok_or_else(|| anyhow!("bad authorization token"))?;
        let signature = base64::decode_config(signature, base64::URL_SAFE_NO_PAD)?;

        hmac::verify(&self.secret_key, &user_state, &signature)
            .map_err(|_err| anyhow!("invalid signature"))?;

        let state = bincode::deserialize(&user_state)?;
        Ok(state)
    }

    pub fn encode_user(&self, user_state: &UserState) -> Result<String> {
        let user_state = bincode::serialize(&user_state)?;

        let signature = hmac::sign(&self.secret_key, &user_state);

        let token = format!(
            "{}:{}",
            base64::encode_config(user_state, base64::URL_SAFE_NO_PAD),
            base64::encode_config(signature, base64::URL_SAFE_NO_PAD),
        );

        Ok(token)
    }

    /// Creates a quiz with a freshly drawn question sequence. Nothing is
    /// stored when the scope has too few eligible questions.
    pub fn start_quiz(
        &self,
        user_state: &UserState,
        selection: QuizSelection,
    ) -> Result<QuizId, QuizError> {
        let title = self.content.scope_title(selection.scope)?;
        let eligible = self.content.eligible(selection.scope, selection.difficulty)?;

        let sequence = self
            .sampler
            .sample(
                &eligible,
                selection.num_questions,
                selection.scope,
                selection.difficulty,
            )
            .map_err(|err| {
                tracing::warn!(scope = ?selection.scope, difficulty = %selection.difficulty, "{}", err);
                err
            })?;

        let quiz = Quiz {
            id: 0,
            user: user_state.id,
            scope: selection.scope,
            title,
            start_time: Utc::now(),
            end_time: None,
            duration_minutes: selection.duration_minutes,
            total_questions: sequence.len(),
            session: QuizSession::new(sequence)?,
            result: None,
        };

        let id = self.quizzes.insert(quiz)?;
        tracing::info!(
            quiz = id,
            scope = ?selection.scope,
            difficulty = %selection.difficulty,
            questions = selection.num_questions,
            "started quiz"
        );

        Ok(id)
    }

    pub fn quiz_view(&self, user_state: &UserState, quiz_id: QuizId) -> Result<QuizView, QuizError> {
        self.quizzes.with_quiz(quiz_id, &user_state.id, |quiz| {
            quiz.ensure_open()?;

            let question = self.question_in_quiz(&quiz.session, quiz.session.current())?;
            let current_answer = quiz
                .session
                .answer(question.id)
                .map(|answer| answer.user_answer.clone());

            Ok(QuizView {
                quiz: quiz.summary(),
                question: QuestionView {
                    id: question.id,
                    text: question.text,
                    options: question.options,
                    current_answer,
                },
                snapshot: quiz.session.snapshot(),
                deadline: quiz.deadline(),
            })
        })
    }

    /// Applies one take-quiz action. An `Exhausted` outcome means the last
    /// question was answered and the quiz should be sealed.
    pub fn take_step(
        &self,
        user_state: &UserState,
        quiz_id: QuizId,
        step: Step,
    ) -> Result<StepOutcome, QuizError> {
        self.quizzes.with_quiz(quiz_id, &user_state.id, |quiz| {
            quiz.ensure_open()?;
            let session = &mut quiz.session;

            let outcome = match step {
                Step::Submit {
                    question_id,
                    answer,
                } => {
                    let question = self.question_in_quiz(session, question_id)?;
                    let progress = session.submit_and_advance(&question, &answer, Utc::now())?;
                    StepOutcome::Answered { progress }
                }
                Step::MarkForReview { question_id } => {
                    let status = session.mark_for_review(question_id)?;
                    StepOutcome::Marked { status }
                }
                Step::ClearAnswer { question_id } => {
                    let cleared = session.clear_answer(question_id)?;
                    StepOutcome::Cleared {
                        cleared,
                        status: session.status(question_id),
                    }
                }
                Step::JumpTo { question_index } => {
                    let moved = session.jump_to(question_index);
                    StepOutcome::Jumped {
                        moved,
                        cursor: session.cursor(),
                    }
                }
            };

            tracing::debug!(quiz = quiz_id, ?outcome, "quiz step");
            Ok(outcome)
        })
    }

    fn question_in_quiz(
        &self,
        session: &QuizSession,
        question_id: QuestionId,
    ) -> Result<Question, QuizError> {
        if !session.sequence().contains(&question_id) {
            return Err(QuizError::NotFound);
        }

        self.content.question(question_id).map_err(|_err| {
            QuizError::DataIntegrity(format!(
                "question {} of the sequence no longer exists",
                question_id
            ))
        })
    }

    /// Seals the quiz if it is still open. Concurrent callers are serialized
    /// on the quiz, so exactly one of them scores it.
    pub fn seal_quiz(
        &self,
        user_state: &UserState,
        quiz_id: QuizId,
    ) -> Result<(QuizResults, Option<QuizRecord>), QuizError> {
        self.quizzes.with_quiz(quiz_id, &user_state.id, |quiz| {
            let sealing = scoring::seal(quiz, Utc::now()).map_err(|err| {
                tracing::error!(quiz = quiz_id, "could not seal quiz: {}", err);
                err
            })?;

            let record = if sealing.newly_sealed {
                tracing::info!(
                    quiz = quiz_id,
                    score = sealing.breakdown.percentage,
                    correct = sealing.breakdown.correct_count,
                    "sealed quiz"
                );
                Some(quiz_record(quiz, &sealing.breakdown))
            } else {
                None
            };

            let answers = quiz
                .session
                .answers()
                .into_iter()
                .map(|answer| self.review(answer))
                .collect::<Result<Vec<_>, _>>()?;

            let results = QuizResults {
                quiz: quiz.summary(),
                breakdown: sealing.breakdown,
                answers,
            };

            Ok((results, record))
        })
    }

    /// Seals the quiz and appends it to the result log the first time.
    pub async fn complete_quiz(
        &self,
        user_state: &UserState,
        quiz_id: QuizId,
    ) -> Result<QuizResults, QuizError> {
        let (results, record) = self.seal_quiz(user_state, quiz_id)?;

        if let Some(record) = record {
            let result_writer = self.result_writer.clone();
            let blocking_task = tokio::task::spawn_blocking(move || result_writer.write(record));

            match blocking_task.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::error!(quiz = quiz_id, "could not log result: {}", err),
                Err(err) => tracing::error!(quiz = quiz_id, "result writer failed: {}", err),
            }
        }

        Ok(results)
    }

    fn review(&self, answer: &QuizAnswer) -> Result<AnswerReview, QuizError> {
        let question = self.content.question(answer.question_id)?;

        Ok(AnswerReview {
            question_id: question.id,
            question: question.text,
            user_answer: answer.user_answer.clone(),
            correct_answer: question.correct_answer,
            is_correct: answer.is_correct,
            explanation: question.explanation,
        })
    }

    /// Completed quizzes of the user, most recently finished first.
    pub fn history(&self, user_state: &UserState, page: usize) -> Result<Page<QuizSummary>, QuizError> {
        let mut quizzes = self
            .quizzes
            .owned_by(&user_state.id)?
            .into_iter()
            .filter(|quiz| quiz.is_completed())
            .collect::<Vec<_>>();
        quizzes.sort_by(|a, b| b.end_time.cmp(&a.end_time).then(b.id.cmp(&a.id)));

        let summaries = quizzes.iter().map(|quiz| quiz.summary()).collect();
        Ok(paginate(summaries, page, PAGE_SIZE))
    }
}

fn quiz_record(quiz: &Quiz, breakdown: &ScoreBreakdown) -> QuizRecord {
    QuizRecord {
        user: hex::encode(&quiz.user.0),
        quiz: quiz.id,
        title: quiz.title.clone(),
        scope: quiz.scope.kind(),
        score: breakdown.percentage,
        raw_score: breakdown.raw_score,
        correct: breakdown.correct_count,
        wrong: breakdown.wrong_count,
        unattempted: breakdown.unattempted_count,
        total_questions: quiz.total_questions,
        start_time: quiz.start_time,
        end_time: quiz.end_time.unwrap_or_else(Utc::now),
    }
}

#[derive(Clone, Debug)]
pub struct ResultWriter {
    writer: Arc<Mutex<csv::Writer<File>>>,
}

impl ResultWriter {
    pub fn new(path: impl AsRef<Path>) -> Result<ResultWriter> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        let writer = Arc::new(Mutex::new(writer));

        Ok(ResultWriter { writer })
    }

    pub fn write(&self, record: QuizRecord) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_err| anyhow!("couldn't lock writer"))?;
        writer.serialize(record)?;
        writer.flush()?;

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::content::tests::sample_store;
    use crate::models::Scope;
    use std::{path::PathBuf, thread};

    pub(crate) fn results_path() -> PathBuf {
        let mut name = [0u8; 8];
        rand::thread_rng().fill(&mut name);
        std::env::temp_dir().join(format!("book-quiz-{}.csv", hex::encode(name)))
    }

    pub(crate) fn controller() -> QuizController {
        let secret_key = hmac::Key::new(hmac::HMAC_SHA256, b"test secret key");
        let result_writer = ResultWriter::new(results_path()).unwrap();

        QuizController::new(secret_key, sample_store(), Sampler::seeded(11), result_writer)
    }

    fn chapter_quiz(num_questions: usize) -> QuizSelection {
        QuizSelection::new("chapter", Some(1), None, None, Some(num_questions), None).unwrap()
    }

    fn answer_current(controller: &QuizController, user: &UserState, quiz: QuizId, right: bool) -> StepOutcome {
        let view = controller.quiz_view(user, quiz).unwrap();
        let question = controller.content().question(view.question.id).unwrap();
        let answer = if right {
            question.correct_answer.to_lowercase()
        } else {
            question
                .options
                .keys()
                .find(|label| !label.eq_ignore_ascii_case(&question.correct_answer))
                .cloned()
                .unwrap()
        };

        controller
            .take_step(
                user,
                quiz,
                Step::Submit {
                    question_id: question.id,
                    answer,
                },
            )
            .unwrap()
    }

    #[test]
    fn user_tokens_round_trip_and_reject_tampering() {
        let controller = controller();
        let user = controller.create_user();

        let token = controller.encode_user(&user).unwrap();
        assert_eq!(controller.decode_user(&token).unwrap(), user);

        let other = controller.create_user();
        let other_token = controller.encode_user(&other).unwrap();
        let forged = format!(
            "{}:{}",
            token.split(':').next().unwrap(),
            other_token.split(':').nth(1).unwrap()
        );
        assert!(controller.decode_user(&forged).is_err());
        assert!(controller.decode_user("garbage").is_err());
    }

    #[test]
    fn authorization_header_resolves_identity() {
        let controller = controller();
        let user = controller.create_user();
        let token = controller.encode_user(&user).unwrap();

        let header = format!("UserState {}", token);
        assert_eq!(controller.authorize(Some(header.as_str())).unwrap(), user);
        let header = format!("userstate {}", token);
        assert_eq!(controller.authorize(Some(header.as_str())).unwrap(), user);

        assert_ne!(controller.authorize(None).unwrap(), user);

        let header = format!("Bearer {}", token);
        assert!(controller.authorize(Some(header.as_str())).is_err());
        assert!(controller.authorize(Some(token.as_str())).is_err());
        assert!(controller.authorize(Some("UserState")).is_err());
    }

    #[test]
    fn start_quiz_fixes_a_sequence_from_the_scope() {
        let controller = controller();
        let user = controller.create_user();

        let quiz = controller.start_quiz(&user, chapter_quiz(3)).unwrap();
        let view = controller.quiz_view(&user, quiz).unwrap();

        assert_eq!(view.quiz.title, "Mammals Quiz");
        assert_eq!(view.quiz.total_questions, 3);
        let mut ids = view.snapshot.question_ids.clone();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);

        let again = controller.quiz_view(&user, quiz).unwrap();
        assert_eq!(again.snapshot.question_ids, view.snapshot.question_ids);
    }

    #[test]
    fn start_quiz_reports_shortfall_and_creates_nothing() {
        let controller = controller();
        let user = controller.create_user();

        let selection = QuizSelection::new("book", None, Some(1), Some("hard"), Some(2), None).unwrap();
        let err = controller.start_quiz(&user, selection).unwrap_err();

        assert!(matches!(
            err,
            QuizError::InsufficientQuestions { available: 1, .. }
        ));
        assert!(controller.quizzes.owned_by(&user.id).unwrap().is_empty());
        assert!(matches!(
            controller.quiz_view(&user, 1),
            Err(QuizError::NotFound)
        ));
    }

    #[test]
    fn start_quiz_on_unknown_scope() {
        let controller = controller();
        let user = controller.create_user();

        let selection = QuizSelection::new("chapter", Some(77), None, None, Some(1), None).unwrap();
        assert!(matches!(
            controller.start_quiz(&user, selection),
            Err(QuizError::NotFound)
        ));
    }

    #[test]
    fn quizzes_are_private() {
        let controller = controller();
        let owner = controller.create_user();
        let stranger = controller.create_user();
        let quiz = controller.start_quiz(&owner, chapter_quiz(2)).unwrap();

        assert!(matches!(
            controller.quiz_view(&stranger, quiz),
            Err(QuizError::NotFound)
        ));
        assert!(matches!(
            controller.take_step(&stranger, quiz, Step::JumpTo { question_index: 1 }),
            Err(QuizError::NotFound)
        ));
        assert!(matches!(
            controller.seal_quiz(&stranger, quiz),
            Err(QuizError::NotFound)
        ));
    }

    #[test]
    fn full_quiz_flow() {
        let controller = controller();
        let user = controller.create_user();
        let quiz = controller.start_quiz(&user, chapter_quiz(3)).unwrap();

        assert_eq!(
            answer_current(&controller, &user, quiz, true),
            StepOutcome::Answered {
                progress: Progress::Next(1)
            }
        );
        let second = controller.quiz_view(&user, quiz).unwrap().question.id;
        let outcome = controller
            .take_step(&user, quiz, Step::MarkForReview { question_id: second })
            .unwrap();
        assert_eq!(
            outcome,
            StepOutcome::Marked {
                status: QuestionStatus::MarkedForReview
            }
        );
        assert_eq!(
            answer_current(&controller, &user, quiz, false),
            StepOutcome::Answered {
                progress: Progress::Next(2)
            }
        );
        assert!(answer_current(&controller, &user, quiz, true).is_exhausted());

        let (results, record) = controller.seal_quiz(&user, quiz).unwrap();
        assert!(record.is_some());
        assert_eq!(results.breakdown.correct_count, 2);
        assert_eq!(results.breakdown.wrong_count, 1);
        assert!((results.breakdown.raw_score - 1.75).abs() < 1e-9);
        assert_eq!(results.answers.len(), 3);
        assert!(results.quiz.is_completed);

        assert!(matches!(
            controller.take_step(&user, quiz, Step::JumpTo { question_index: 0 }),
            Err(QuizError::AlreadyCompleted)
        ));
        assert!(matches!(
            controller.quiz_view(&user, quiz),
            Err(QuizError::AlreadyCompleted)
        ));
    }

    #[test]
    fn step_actions_report_what_happened() {
        let controller = controller();
        let user = controller.create_user();
        let quiz = controller.start_quiz(&user, chapter_quiz(2)).unwrap();
        let first = controller.quiz_view(&user, quiz).unwrap().question.id;

        let outcome = controller
            .take_step(&user, quiz, Step::ClearAnswer { question_id: first })
            .unwrap();
        assert_eq!(
            outcome,
            StepOutcome::Cleared {
                cleared: ClearOutcome::NothingToClear,
                status: QuestionStatus::Unattempted
            }
        );

        let outcome = controller
            .take_step(&user, quiz, Step::JumpTo { question_index: 5 })
            .unwrap();
        assert_eq!(outcome, StepOutcome::Jumped { moved: false, cursor: 0 });

        let err = controller
            .take_step(
                &user,
                quiz,
                Step::Submit {
                    question_id: first,
                    answer: "".into(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, QuizError::Validation(_)));

        let err = controller
            .take_step(
                &user,
                quiz,
                Step::Submit {
                    question_id: 4,
                    answer: "B".into(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, QuizError::NotFound));
    }

    #[test]
    fn sealing_twice_returns_the_stored_result() {
        let controller = controller();
        let user = controller.create_user();
        let quiz = controller.start_quiz(&user, chapter_quiz(2)).unwrap();
        answer_current(&controller, &user, quiz, true);

        let (first, record) = controller.seal_quiz(&user, quiz).unwrap();
        assert!(record.is_some());
        let (second, record) = controller.seal_quiz(&user, quiz).unwrap();
        assert!(record.is_none());

        assert_eq!(first.breakdown, second.breakdown);
        assert_eq!(first.quiz.end_time, second.quiz.end_time);
        assert_eq!(first.breakdown.unattempted_count, 1);
    }

    #[test]
    fn concurrent_sealing_scores_once() {
        let controller = controller();
        let user = controller.create_user();
        let quiz = controller.start_quiz(&user, chapter_quiz(3)).unwrap();
        answer_current(&controller, &user, quiz, true);

        let handles = (0..8)
            .map(|_| {
                let controller = controller.clone();
                let user = user.clone();
                thread::spawn(move || controller.seal_quiz(&user, quiz).unwrap())
            })
            .collect::<Vec<_>>();
        let outcomes = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>();

        let sealed = outcomes.iter().filter(|(_, record)| record.is_some()).count();
        assert_eq!(sealed, 1);
        let breakdown = &outcomes[0].0.breakdown;
        assert!(outcomes.iter().all(|(results, _)| results.breakdown == *breakdown));
    }

    #[test]
    fn concurrent_submissions_keep_one_answer() {
        let controller = controller();
        let user = controller.create_user();
        let quiz = controller.start_quiz(&user, chapter_quiz(3)).unwrap();
        let first = controller.quiz_view(&user, quiz).unwrap().question.id;

        let handles = vec!["A", "B"]
            .into_iter()
            .map(|answer| {
                let controller = controller.clone();
                let user = user.clone();
                thread::spawn(move || {
                    controller.take_step(
                        &user,
                        quiz,
                        Step::Submit {
                            question_id: first,
                            answer: answer.into(),
                        },
                    )
                })
            })
            .collect::<Vec<_>>();
        let outcomes = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>();

        // The cursor moved after the first submission, so the second one was
        // no longer for the current question.
        assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
        let (results, _) = controller.seal_quiz(&user, quiz).unwrap();
        assert_eq!(results.breakdown.attempted_count, 1);
    }

    #[test]
    fn history_lists_completed_quizzes_newest_first() {
        let controller = controller();
        let user = controller.create_user();

        let open = controller.start_quiz(&user, chapter_quiz(1)).unwrap();
        let first = controller.start_quiz(&user, chapter_quiz(1)).unwrap();
        let second = controller
            .start_quiz(
                &user,
                QuizSelection::new("book", None, Some(1), Some("easy"), Some(2), Some(15)).unwrap(),
            )
            .unwrap();
        controller.seal_quiz(&user, first).unwrap();
        controller.seal_quiz(&user, second).unwrap();

        let history = controller.history(&user, 1).unwrap();
        let ids = history.items.iter().map(|quiz| quiz.id).collect::<Vec<_>>();

        assert_eq!(ids, vec![second, first]);
        assert!(!ids.contains(&open));
        assert_eq!(history.items[0].scope, Scope::Book(1));

        let stranger = controller.create_user();
        assert!(controller.history(&stranger, 1).unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn completing_writes_one_result_row() {
        let path = results_path();
        let secret_key = hmac::Key::new(hmac::HMAC_SHA256, b"test secret key");
        let controller = QuizController::new(
            secret_key,
            sample_store(),
            Sampler::seeded(5),
            ResultWriter::new(&path).unwrap(),
        );
        let user = controller.create_user();
        let quiz = controller.start_quiz(&user, chapter_quiz(2)).unwrap();

        controller.complete_quiz(&user, quiz).await.unwrap();
        controller.complete_quiz(&user, quiz).await.unwrap();

        let log = std::fs::read_to_string(&path).unwrap();
        assert_eq!(log.lines().count(), 1);
        assert!(log.contains("Mammals Quiz"));
        let _ = std::fs::remove_file(&path);
    }
}
