use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

use crate::error::QuizError;
use crate::scoring::ScoreBreakdown;
use crate::session::QuizSession;

pub type BookId = u32;
pub type ChapterId = u32;
pub type QuestionId = u32;
pub type QuizId = u64;

pub const MIN_QUESTIONS: usize = 1;
pub const MAX_QUESTIONS: usize = 50;
pub const DEFAULT_QUESTIONS: usize = 10;
pub const DURATION_CHOICES: &[u32] = &[15, 30, 45, 60, 90, 120];
pub const DEFAULT_DURATION: u32 = 30;
pub const PAGE_SIZE: usize = 10;

#[derive(Clone, Debug, Serialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Chapter {
    pub id: ChapterId,
    pub book_id: BookId,
    pub title: String,
    pub chapter_number: u32,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Question {
    pub id: QuestionId,
    pub chapter_id: ChapterId,
    pub text: String,
    pub options: BTreeMap<String, String>,
    pub correct_answer: String,
    pub explanation: String,
    pub difficulty: Difficulty,
}

impl Question {
    /// Answers are compared without regard to case, so "c" matches "C".
    pub fn is_correct(&self, answer: &str) -> bool {
        answer.trim().to_lowercase() == self.correct_answer.trim().to_lowercase()
    }

    pub fn has_option(&self, label: &str) -> bool {
        let label = label.trim().to_lowercase();
        self.options.keys().any(|key| key.trim().to_lowercase() == label)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Medium
    }
}

impl Difficulty {
    /// Maps the 1-5 scale used by question uploads onto the three tiers.
    pub fn from_level(level: i64) -> Difficulty {
        match level {
            1 | 2 => Difficulty::Easy,
            3 => Difficulty::Medium,
            4 | 5 => Difficulty::Hard,
            _ => Difficulty::Medium,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = QuizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(QuizError::Validation(format!(
                "unsupported difficulty '{}', expected easy, medium or hard",
                other
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DifficultyFilter {
    All,
    Only(Difficulty),
}

impl Default for DifficultyFilter {
    fn default() -> Self {
        DifficultyFilter::All
    }
}

impl DifficultyFilter {
    pub fn matches(self, difficulty: Difficulty) -> bool {
        match self {
            DifficultyFilter::All => true,
            DifficultyFilter::Only(only) => only == difficulty,
        }
    }

    /// "questions" or e.g. "hard questions", for shortfall messages.
    pub fn questions_label(self) -> String {
        match self {
            DifficultyFilter::All => "questions".into(),
            DifficultyFilter::Only(difficulty) => format!("{} questions", difficulty.as_str()),
        }
    }
}

impl FromStr for DifficultyFilter {
    type Err = QuizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(DifficultyFilter::All)
        } else {
            s.parse().map(DifficultyFilter::Only)
        }
    }
}

impl fmt::Display for DifficultyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DifficultyFilter::All => f.write_str("all"),
            DifficultyFilter::Only(difficulty) => f.write_str(difficulty.as_str()),
        }
    }
}

/// Where a quiz draws its questions from. A book covers all of its chapters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "id")]
pub enum Scope {
    Chapter(ChapterId),
    Book(BookId),
}

impl Scope {
    /// Exactly one of `chapter` and `book` must be given.
    pub fn from_selection(
        chapter: Option<ChapterId>,
        book: Option<BookId>,
    ) -> Result<Scope, QuizError> {
        match (chapter, book) {
            (Some(chapter), None) => Ok(Scope::Chapter(chapter)),
            (None, Some(book)) => Ok(Scope::Book(book)),
            (Some(_), Some(_)) => Err(QuizError::Validation(
                "a quiz is taken on either a chapter or a book, not both".into(),
            )),
            (None, None) => Err(QuizError::Validation(
                "please select a chapter or a book".into(),
            )),
        }
    }

    pub fn kind(self) -> &'static str {
        match self {
            Scope::Chapter(_) => "chapter",
            Scope::Book(_) => "book",
        }
    }
}

/// A validated request to start a quiz.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuizSelection {
    pub scope: Scope,
    pub difficulty: DifficultyFilter,
    pub num_questions: usize,
    pub duration_minutes: u32,
}

impl QuizSelection {
    pub fn new(
        quiz_type: &str,
        chapter: Option<ChapterId>,
        book: Option<BookId>,
        difficulty: Option<&str>,
        num_questions: Option<usize>,
        duration_minutes: Option<u32>,
    ) -> Result<QuizSelection, QuizError> {
        let scope = Scope::from_selection(chapter, book)?;
        if !scope.kind().eq_ignore_ascii_case(quiz_type.trim()) {
            return Err(QuizError::Validation(format!(
                "please select a {} for a {} quiz",
                quiz_type.trim().to_lowercase(),
                quiz_type.trim().to_lowercase()
            )));
        }

        let difficulty = match difficulty {
            None => DifficultyFilter::All,
            Some(difficulty) => difficulty.parse()?,
        };

        let num_questions = num_questions.unwrap_or(DEFAULT_QUESTIONS);
        if num_questions < MIN_QUESTIONS || num_questions > MAX_QUESTIONS {
            return Err(QuizError::Validation(format!(
                "number of questions must be between {} and {}",
                MIN_QUESTIONS, MAX_QUESTIONS
            )));
        }

        let duration_minutes = duration_minutes.unwrap_or(DEFAULT_DURATION);
        if !DURATION_CHOICES.contains(&duration_minutes) {
            return Err(QuizError::Validation(format!(
                "unsupported quiz duration of {} minutes",
                duration_minutes
            )));
        }

        Ok(QuizSelection {
            scope,
            difficulty,
            num_questions,
            duration_minutes,
        })
    }
}

/// One action on the take-quiz screen.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum Step {
    Submit {
        question_id: QuestionId,
        #[serde(default)]
        answer: String,
    },
    MarkForReview {
        question_id: QuestionId,
    },
    ClearAnswer {
        question_id: QuestionId,
    },
    JumpTo {
        #[serde(default)]
        question_index: i64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    Unattempted,
    Attempted,
    MarkedForReview,
    AnsweredAndMarked,
}

impl Default for QuestionStatus {
    fn default() -> Self {
        QuestionStatus::Unattempted
    }
}

impl QuestionStatus {
    pub fn is_marked(self) -> bool {
        match self {
            QuestionStatus::MarkedForReview | QuestionStatus::AnsweredAndMarked => true,
            QuestionStatus::Unattempted | QuestionStatus::Attempted => false,
        }
    }
}

impl fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QuestionStatus::Unattempted => "unattempted",
            QuestionStatus::Attempted => "attempted",
            QuestionStatus::MarkedForReview => "marked for review",
            QuestionStatus::AnsweredAndMarked => "answered and marked for review",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuizAnswer {
    pub question_id: QuestionId,
    pub user_answer: String,
    pub is_correct: bool,
    pub answered_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct Quiz {
    pub id: QuizId,
    pub user: UserId,
    pub scope: Scope,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: u32,
    pub total_questions: usize,
    pub session: QuizSession,
    pub result: Option<ScoreBreakdown>,
}

impl Quiz {
    pub fn is_completed(&self) -> bool {
        self.result.is_some()
    }

    pub fn ensure_open(&self) -> Result<(), QuizError> {
        if self.is_completed() {
            Err(QuizError::AlreadyCompleted)
        } else {
            Ok(())
        }
    }

    /// Informational only, nothing expires a quiz.
    pub fn deadline(&self) -> DateTime<Utc> {
        self.start_time + Duration::minutes(i64::from(self.duration_minutes))
    }

    pub fn summary(&self) -> QuizSummary {
        QuizSummary {
            id: self.id,
            title: self.title.clone(),
            scope: self.scope,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_minutes: self.duration_minutes,
            total_questions: self.total_questions,
            score: self.result.as_ref().map(|result| result.percentage),
            correct_answers: self
                .result
                .as_ref()
                .map(|result| result.correct_count)
                .unwrap_or(0),
            is_completed: self.is_completed(),
            time_taken: format_elapsed(self.start_time, self.end_time),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuizSummary {
    pub id: QuizId,
    pub title: String,
    pub scope: Scope,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: u32,
    pub total_questions: usize,
    pub score: Option<f64>,
    pub correct_answers: usize,
    pub is_completed: bool,
    pub time_taken: String,
}

/// Renders the time between two instants as "4m 12s", "4m" or "12s".
pub fn format_elapsed(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> String {
    let end = match end {
        None => return "-".into(),
        Some(end) => end,
    };

    let total_seconds = (end - start).num_seconds();
    if total_seconds < 0 {
        return "-".into();
    }

    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    match (minutes, seconds) {
        (0, seconds) => format!("{}s", seconds),
        (minutes, 0) => format!("{}m", minutes),
        (minutes, seconds) => format!("{}m {}s", minutes, seconds),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub num_pages: usize,
    pub total: usize,
}

/// Splits `items` into pages of `per_page`. Out-of-range page numbers clamp
/// to the first or last page.
pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> Page<T> {
    let total = items.len();
    let per_page = per_page.max(1);
    let num_pages = ((total + per_page - 1) / per_page).max(1);
    let page = page.max(1).min(num_pages);

    let items = items
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect();

    Page {
        items,
        page,
        num_pages,
        total,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct UserId(pub [u8; 16]);

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct UserState {
    pub id: UserId,
}

#[derive(Clone, Debug, Serialize)]
pub struct QuizRecord {
    pub user: String,
    pub quiz: QuizId,
    pub title: String,
    pub scope: &'static str,
    pub score: f64,
    pub raw_score: f64,
    pub correct: usize,
    pub wrong: usize,
    pub unattempted: usize,
    pub total_questions: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}
