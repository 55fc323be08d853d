use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use crate::config::ContentFile;
use crate::error::QuizError;
use crate::models::{
    paginate, Book, BookId, Chapter, ChapterId, Difficulty, DifficultyFilter, Page, Question,
    QuestionId, Scope, PAGE_SIZE,
};

#[derive(Debug, Default)]
struct Content {
    books: BTreeMap<BookId, Book>,
    chapters: BTreeMap<ChapterId, Chapter>,
    questions: BTreeMap<QuestionId, Question>,
}

impl Content {
    fn next_book_id(&self) -> BookId {
        self.books.keys().next_back().map_or(1, |id| id + 1)
    }

    fn next_chapter_id(&self) -> ChapterId {
        self.chapters.keys().next_back().map_or(1, |id| id + 1)
    }

    fn next_question_id(&self) -> QuestionId {
        self.questions.keys().next_back().map_or(1, |id| id + 1)
    }

    fn insert_book(&mut self, title: &str, author: &str, description: &str) -> Result<BookId, QuizError> {
        let title = title.trim();
        let author = author.trim();
        if title.is_empty() || author.is_empty() {
            return Err(QuizError::Validation(
                "a book needs a title and an author".into(),
            ));
        }

        let id = self.next_book_id();
        self.books.insert(
            id,
            Book {
                id,
                title: title.into(),
                author: author.into(),
                description: description.trim().into(),
                created_at: Utc::now(),
            },
        );

        Ok(id)
    }

    fn insert_chapter(
        &mut self,
        book_id: BookId,
        title: &str,
        chapter_number: u32,
        description: &str,
    ) -> Result<ChapterId, QuizError> {
        if !self.books.contains_key(&book_id) {
            return Err(QuizError::NotFound);
        }

        let title = title.trim();
        if title.is_empty() {
            return Err(QuizError::Validation("a chapter needs a title".into()));
        }
        if chapter_number == 0 {
            return Err(QuizError::Validation(
                "chapter numbers start at 1".into(),
            ));
        }
        if self
            .chapters
            .values()
            .any(|chapter| chapter.book_id == book_id && chapter.chapter_number == chapter_number)
        {
            return Err(QuizError::Validation(format!(
                "chapter {} already exists in this book",
                chapter_number
            )));
        }

        let id = self.next_chapter_id();
        self.chapters.insert(
            id,
            Chapter {
                id,
                book_id,
                title: title.into(),
                chapter_number,
                description: description.trim().into(),
                created_at: Utc::now(),
            },
        );

        Ok(id)
    }

    fn chapter_ids(&self, scope: Scope) -> Result<Vec<ChapterId>, QuizError> {
        match scope {
            Scope::Chapter(id) => {
                if self.chapters.contains_key(&id) {
                    Ok(vec![id])
                } else {
                    Err(QuizError::NotFound)
                }
            }
            Scope::Book(id) => {
                if !self.books.contains_key(&id) {
                    return Err(QuizError::NotFound);
                }
                Ok(self
                    .chapters
                    .values()
                    .filter(|chapter| chapter.book_id == id)
                    .map(|chapter| chapter.id)
                    .collect())
            }
        }
    }

    fn questions_in(&self, scope: Scope) -> Result<Vec<&Question>, QuizError> {
        let chapters = self.chapter_ids(scope)?;
        Ok(self
            .questions
            .values()
            .filter(|question| chapters.contains(&question.chapter_id))
            .collect())
    }
}

/// A question as accepted by the upload endpoint. Both the short
/// (`question`/`answer`, numeric difficulty) and the long
/// (`question_text`/`correct_answer`, named difficulty) field names are read.
#[derive(Clone, Debug, Deserialize)]
pub struct UploadedQuestion {
    #[serde(alias = "question")]
    pub question_text: String,
    pub options: BTreeMap<String, String>,
    #[serde(alias = "answer")]
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub difficulty: Option<UploadedDifficulty>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum UploadedDifficulty {
    Level(i64),
    Name(String),
}

impl UploadedDifficulty {
    fn resolve(&self) -> Result<Difficulty, QuizError> {
        match self {
            UploadedDifficulty::Level(level) => Ok(Difficulty::from_level(*level)),
            UploadedDifficulty::Name(name) => name.parse(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub total: usize,
    pub easy: usize,
    pub medium: usize,
    pub hard: usize,
}

impl Availability {
    fn count<'a>(questions: impl IntoIterator<Item = &'a Question>) -> Availability {
        questions
            .into_iter()
            .fold(Availability::default(), |mut availability, question| {
                availability.total += 1;
                match question.difficulty {
                    Difficulty::Easy => availability.easy += 1,
                    Difficulty::Medium => availability.medium += 1,
                    Difficulty::Hard => availability.hard += 1,
                }
                availability
            })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub books: usize,
    pub chapters: usize,
    pub questions: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChapterSummary {
    pub id: ChapterId,
    pub chapter_number: u32,
    pub title: String,
    pub description: String,
    pub questions: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct BookSummary {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub description: String,
    pub chapters: Vec<ChapterSummary>,
    pub questions: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChapterQuestions {
    pub chapter: Chapter,
    pub availability: Availability,
    pub questions: Page<Question>,
}

/// Books, chapters and questions. Quizzes only ever read from it.
#[derive(Clone, Debug, Default)]
pub struct ContentStore {
    inner: Arc<RwLock<Content>>,
}

impl ContentStore {
    pub fn new() -> ContentStore {
        Default::default()
    }

    pub fn from_file(file: &ContentFile) -> Result<ContentStore, QuizError> {
        let store = ContentStore::new();

        {
            let mut content = store.inner.write()?;
            for book in &file.book {
                let book_id = content.insert_book(&book.title, &book.author, &book.description)?;

                for chapter in &book.chapter {
                    let chapter_id = content.insert_chapter(
                        book_id,
                        &chapter.title,
                        chapter.number,
                        &chapter.description,
                    )?;

                    for (index, question) in chapter.question.iter().enumerate() {
                        let question = Question {
                            id: 0,
                            chapter_id,
                            text: question.text.trim().into(),
                            options: question.options.clone(),
                            correct_answer: question.answer.trim().into(),
                            explanation: question.explanation.trim().into(),
                            difficulty: question.difficulty,
                        };
                        check_question(&question).map_err(|reason| {
                            QuizError::Validation(format!(
                                "{}, chapter {}, question {}: {}",
                                book.title,
                                chapter.number,
                                index + 1,
                                reason
                            ))
                        })?;

                        let id = content.next_question_id();
                        content.questions.insert(id, Question { id, ..question });
                    }
                }
            }
        }

        Ok(store)
    }

    pub fn add_book(&self, title: &str, author: &str, description: &str) -> Result<Book, QuizError> {
        let mut content = self.inner.write()?;
        let id = content.insert_book(title, author, description)?;

        tracing::info!(book = id, "added book");
        Ok(content.books[&id].clone())
    }

    pub fn add_chapter(
        &self,
        book_id: BookId,
        title: &str,
        chapter_number: u32,
        description: &str,
    ) -> Result<Chapter, QuizError> {
        let mut content = self.inner.write()?;
        let id = content.insert_chapter(book_id, title, chapter_number, description)?;

        tracing::info!(book = book_id, chapter = id, "added chapter");
        Ok(content.chapters[&id].clone())
    }

    /// Adds every question of a JSON array to a chapter, or none of them.
    pub fn upload_questions(
        &self,
        chapter_id: ChapterId,
        values: serde_json::Value,
    ) -> Result<usize, QuizError> {
        let values = match values {
            serde_json::Value::Array(values) => values,
            _ => {
                return Err(QuizError::Validation(
                    "JSON must be a list of questions".into(),
                ))
            }
        };

        let mut questions = Vec::with_capacity(values.len());
        for (index, value) in values.into_iter().enumerate() {
            let position = index + 1;
            if !value.is_object() {
                return Err(QuizError::Validation(format!(
                    "Question {} must be an object",
                    position
                )));
            }

            let uploaded: UploadedQuestion = serde_json::from_value(value).map_err(|err| {
                QuizError::Validation(format!("Question {}: {}", position, err))
            })?;
            let difficulty = match &uploaded.difficulty {
                None => Difficulty::default(),
                Some(difficulty) => difficulty.resolve().map_err(|_err| {
                    QuizError::Validation(format!(
                        "Question {} has invalid difficulty. Must be one of: easy, medium, hard",
                        position
                    ))
                })?,
            };

            let question = Question {
                id: 0,
                chapter_id,
                text: uploaded.question_text.trim().into(),
                options: uploaded.options,
                correct_answer: uploaded.correct_answer.trim().into(),
                explanation: uploaded.explanation.trim().into(),
                difficulty,
            };
            check_question(&question).map_err(|reason| {
                QuizError::Validation(format!("Question {}: {}", position, reason))
            })?;

            questions.push(question);
        }

        let mut content = self.inner.write()?;
        if !content.chapters.contains_key(&chapter_id) {
            return Err(QuizError::NotFound);
        }

        let count = questions.len();
        for question in questions {
            let id = content.next_question_id();
            content.questions.insert(id, Question { id, ..question });
        }

        tracing::info!(chapter = chapter_id, count, "uploaded questions");
        Ok(count)
    }

    pub fn question(&self, id: QuestionId) -> Result<Question, QuizError> {
        let content = self.inner.read()?;
        content.questions.get(&id).cloned().ok_or(QuizError::NotFound)
    }

    /// Ids of the questions in `scope` that pass `difficulty`.
    pub fn eligible(
        &self,
        scope: Scope,
        difficulty: DifficultyFilter,
    ) -> Result<Vec<QuestionId>, QuizError> {
        let content = self.inner.read()?;
        Ok(content
            .questions_in(scope)?
            .into_iter()
            .filter(|question| difficulty.matches(question.difficulty))
            .map(|question| question.id)
            .collect())
    }

    pub fn availability(&self, scope: Scope) -> Result<Availability, QuizError> {
        let content = self.inner.read()?;
        Ok(Availability::count(content.questions_in(scope)?))
    }

    pub fn scope_title(&self, scope: Scope) -> Result<String, QuizError> {
        let content = self.inner.read()?;
        match scope {
            Scope::Chapter(id) => content
                .chapters
                .get(&id)
                .map(|chapter| format!("{} Quiz", chapter.title))
                .ok_or(QuizError::NotFound),
            Scope::Book(id) => content
                .books
                .get(&id)
                .map(|book| format!("{} - Complete Book Quiz", book.title))
                .ok_or(QuizError::NotFound),
        }
    }

    pub fn totals(&self) -> Result<Totals, QuizError> {
        let content = self.inner.read()?;
        Ok(Totals {
            books: content.books.len(),
            chapters: content.chapters.len(),
            questions: content.questions.len(),
        })
    }

    /// All books by title, with their chapters in chapter order.
    pub fn catalog(&self) -> Result<Vec<BookSummary>, QuizError> {
        let content = self.inner.read()?;

        let mut books = content
            .books
            .values()
            .map(|book| {
                let mut chapters = content
                    .chapters
                    .values()
                    .filter(|chapter| chapter.book_id == book.id)
                    .map(|chapter| ChapterSummary {
                        id: chapter.id,
                        chapter_number: chapter.chapter_number,
                        title: chapter.title.clone(),
                        description: chapter.description.clone(),
                        questions: content
                            .questions
                            .values()
                            .filter(|question| question.chapter_id == chapter.id)
                            .count(),
                    })
                    .collect::<Vec<_>>();
                chapters.sort_by_key(|chapter| chapter.chapter_number);

                BookSummary {
                    id: book.id,
                    title: book.title.clone(),
                    author: book.author.clone(),
                    description: book.description.clone(),
                    questions: chapters.iter().map(|chapter| chapter.questions).sum(),
                    chapters,
                }
            })
            .collect::<Vec<_>>();
        books.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));

        Ok(books)
    }

    pub fn chapter_questions(
        &self,
        chapter_id: ChapterId,
        page: usize,
    ) -> Result<ChapterQuestions, QuizError> {
        let content = self.inner.read()?;
        let chapter = content
            .chapters
            .get(&chapter_id)
            .cloned()
            .ok_or(QuizError::NotFound)?;

        let questions = content.questions_in(Scope::Chapter(chapter_id))?;
        let availability = Availability::count(questions.iter().copied());
        let questions = questions.into_iter().cloned().collect();

        Ok(ChapterQuestions {
            chapter,
            availability,
            questions: paginate(questions, page, PAGE_SIZE),
        })
    }
}

fn check_question(question: &Question) -> Result<(), String> {
    if question.text.is_empty() {
        return Err("missing question text".into());
    }
    if question.options.is_empty() {
        return Err("options must be a non-empty mapping of label to text".into());
    }
    if question.correct_answer.is_empty() {
        return Err("missing correct answer".into());
    }
    if !question.has_option(&question.correct_answer) {
        return Err(format!(
            "correct answer '{}' is not one of the options",
            question.correct_answer
        ));
    }

    Ok(())
}
