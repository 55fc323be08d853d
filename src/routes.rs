use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use warp::{
    http,
    reject::Rejection,
    reply::{self, Reply, Response},
    Filter,
};

use crate::controllers::{QuizController, QuizResults, QuizView, StepOutcome};
use crate::error::QuizError;
use crate::filters::{self, Unauthorized};
use crate::models::{
    BookId, ChapterId, Page, QuizId, QuizSelection, QuizSummary, Scope, Step, UserState,
};

#[derive(Clone, Debug, Deserialize, Serialize)]
struct StartQuizRequest {
    quiz_type: String,
    chapter: Option<ChapterId>,
    book: Option<BookId>,
    num_questions: Option<usize>,
    difficulty: Option<String>,
    duration_minutes: Option<u32>,
}

impl StartQuizRequest {
    fn selection(&self) -> Result<QuizSelection, QuizError> {
        QuizSelection::new(
            &self.quiz_type,
            self.chapter,
            self.book,
            self.difficulty.as_deref(),
            self.num_questions,
            self.duration_minutes,
        )
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct NewBookRequest {
    title: String,
    author: String,
    #[serde(default)]
    description: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct NewChapterRequest {
    book: BookId,
    title: String,
    chapter_number: u32,
    #[serde(default)]
    description: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
struct PageQuery {
    page: Option<usize>,
}

#[derive(Clone, Debug, Serialize)]
struct QuizStartedReply<'a> {
    quiz: QuizId,
    token: &'a str,
}

#[derive(Clone, Debug, Serialize)]
struct QuizViewReply<'a> {
    #[serde(flatten)]
    view: QuizView,
    token: &'a str,
}

#[derive(Clone, Debug, Serialize)]
struct StepReply<'a> {
    #[serde(flatten)]
    outcome: StepOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<QuizResults>,
    token: &'a str,
}

#[derive(Clone, Debug, Serialize)]
struct ResultsReply<'a> {
    #[serde(flatten)]
    results: QuizResults,
    token: &'a str,
}

#[derive(Clone, Debug, Serialize)]
struct HistoryReply<'a> {
    #[serde(flatten)]
    history: Page<QuizSummary>,
    token: &'a str,
}

#[derive(Clone, Debug, Serialize)]
struct UploadReply {
    created: usize,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct ErrorReply {
    error: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    available: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
enum ErrorCode {
    Validation,
    InsufficientQuestions,
    NotFound,
    QuizAlreadyCompleted,
    InvalidTransition,
    DataIntegrity,
    Unauthorized,
    BadRequest,
    Internal,
}

fn error_body(err: &QuizError) -> (http::StatusCode, ErrorReply) {
    let (status, error, message, available) = match err {
        QuizError::Validation(_) => (
            http::StatusCode::BAD_REQUEST,
            ErrorCode::Validation,
            err.to_string(),
            None,
        ),
        QuizError::InsufficientQuestions { available, .. } => (
            http::StatusCode::CONFLICT,
            ErrorCode::InsufficientQuestions,
            err.to_string(),
            Some(*available),
        ),
        QuizError::NotFound => (
            http::StatusCode::NOT_FOUND,
            ErrorCode::NotFound,
            err.to_string(),
            None,
        ),
        QuizError::AlreadyCompleted => (
            http::StatusCode::CONFLICT,
            ErrorCode::QuizAlreadyCompleted,
            err.to_string(),
            None,
        ),
        QuizError::InvalidTransition { .. } => (
            http::StatusCode::BAD_REQUEST,
            ErrorCode::InvalidTransition,
            err.to_string(),
            None,
        ),
        QuizError::DataIntegrity(_) => {
            tracing::error!("request failed: {}", err);
            (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::DataIntegrity,
                "Something went wrong on our side.".to_string(),
                None,
            )
        }
        QuizError::Internal(_) => {
            tracing::error!("request failed: {}", err);
            (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::Internal,
                "Something went wrong on our side.".to_string(),
                None,
            )
        }
    };

    let reply = ErrorReply {
        error,
        message,
        available,
    };

    (status, reply)
}

fn error_reply(err: &QuizError) -> Response {
    let (status, reply) = error_body(err);
    reply::with_status(reply::json(&reply), status).into_response()
}

fn json_reply<T: Serialize>(status: http::StatusCode, result: Result<T, QuizError>) -> Response {
    match result {
        Ok(body) => reply::with_status(reply::json(&body), status).into_response(),
        Err(err) => error_reply(&err),
    }
}

fn token_for(quiz_controller: &QuizController, user_state: &UserState) -> Result<String, QuizError> {
    quiz_controller
        .encode_user(user_state)
        .map_err(|err| QuizError::Internal(format!("could not encode user token: {}", err)))
}

fn page_query() -> impl Filter<Extract = (PageQuery,), Error = Infallible> + Clone {
    warp::query::<PageQuery>()
        .or(warp::any().map(PageQuery::default))
        .unify()
}

pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, error, message) = if err.is_not_found() {
        (
            http::StatusCode::NOT_FOUND,
            ErrorCode::NotFound,
            "The requested resource was not found.".to_string(),
        )
    } else if err.find::<Unauthorized>().is_some() {
        (
            http::StatusCode::UNAUTHORIZED,
            ErrorCode::Unauthorized,
            "Invalid authorization token.".to_string(),
        )
    } else if let Some(err) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (
            http::StatusCode::BAD_REQUEST,
            ErrorCode::BadRequest,
            format!("Invalid request body: {}", err),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            http::StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::BadRequest,
            "Method not allowed.".to_string(),
        )
    } else {
        tracing::debug!("unhandled rejection: {:?}", err);
        (
            http::StatusCode::BAD_REQUEST,
            ErrorCode::BadRequest,
            "Bad request.".to_string(),
        )
    };

    let reply = ErrorReply {
        error,
        message,
        available: None,
    };

    Ok(reply::with_status(reply::json(&reply), status).into_response())
}

pub fn routes(
    quiz_controller: QuizController,
    cors_origin: &str,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let stats = warp::path!("stats")
        .and(warp::get())
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .map(|quiz_controller: QuizController| {
            json_reply(http::StatusCode::OK, quiz_controller.content().totals())
        });

    let get_books = warp::path!("books")
        .and(warp::get())
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .map(|quiz_controller: QuizController| {
            json_reply(http::StatusCode::OK, quiz_controller.content().catalog())
        })
        .with(warp::compression::gzip());

    let post_books = warp::path!("books")
        .and(warp::post())
        .and(warp::body::json())
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .map(|body: NewBookRequest, quiz_controller: QuizController| {
            let book = quiz_controller
                .content()
                .add_book(&body.title, &body.author, &body.description);
            json_reply(http::StatusCode::CREATED, book)
        });

    let book_availability = warp::path!("books" / BookId / "availability")
        .and(warp::get())
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .map(|book: BookId, quiz_controller: QuizController| {
            json_reply(
                http::StatusCode::OK,
                quiz_controller.content().availability(Scope::Book(book)),
            )
        });

    let post_chapters = warp::path!("chapters")
        .and(warp::post())
        .and(warp::body::json())
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .map(|body: NewChapterRequest, quiz_controller: QuizController| {
            let chapter = quiz_controller.content().add_chapter(
                body.book,
                &body.title,
                body.chapter_number,
                &body.description,
            );
            json_reply(http::StatusCode::CREATED, chapter)
        });

    let chapter_availability = warp::path!("chapters" / ChapterId / "availability")
        .and(warp::get())
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .map(|chapter: ChapterId, quiz_controller: QuizController| {
            json_reply(
                http::StatusCode::OK,
                quiz_controller.content().availability(Scope::Chapter(chapter)),
            )
        });

    let get_chapter_questions = warp::path!("chapters" / ChapterId / "questions")
        .and(warp::get())
        .and(page_query())
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .map(
            |chapter: ChapterId, query: PageQuery, quiz_controller: QuizController| {
                let listing = quiz_controller
                    .content()
                    .chapter_questions(chapter, query.page.unwrap_or(1));
                json_reply(http::StatusCode::OK, listing)
            },
        );

    let post_chapter_questions = warp::path!("chapters" / ChapterId / "questions")
        .and(warp::post())
        .and(warp::body::json())
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .map(
            |chapter: ChapterId, body: serde_json::Value, quiz_controller: QuizController| {
                let created = quiz_controller
                    .content()
                    .upload_questions(chapter, body)
                    .map(|created| UploadReply { created });
                json_reply(http::StatusCode::CREATED, created)
            },
        );

    let post_quiz = warp::path!("quiz")
        .and(warp::post())
        .and(warp::body::json())
        .and(filters::user_state(quiz_controller.clone()))
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .map(
            |body: StartQuizRequest, user_state: UserState, quiz_controller: QuizController| {
                let result = token_for(&quiz_controller, &user_state).and_then(|token| {
                    let selection = body.selection().map_err(|err| {
                        tracing::warn!("rejected quiz selection: {}", err);
                        err
                    })?;
                    let quiz = quiz_controller.start_quiz(&user_state, selection)?;

                    Ok(reply::json(&QuizStartedReply {
                        quiz,
                        token: &token,
                    }))
                });

                match result {
                    Ok(reply) => reply::with_status(reply, http::StatusCode::CREATED).into_response(),
                    Err(err) => error_reply(&err),
                }
            },
        );

    let get_quiz = warp::path!("quiz" / QuizId)
        .and(warp::get())
        .and(filters::user_state(quiz_controller.clone()))
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .map(
            |quiz_id: QuizId, user_state: UserState, quiz_controller: QuizController| {
                let result = token_for(&quiz_controller, &user_state).and_then(|token| {
                    let view = quiz_controller.quiz_view(&user_state, quiz_id)?;
                    Ok(reply::json(&QuizViewReply {
                        view,
                        token: &token,
                    })
                    .into_response())
                });

                result.unwrap_or_else(|err| error_reply(&err))
            },
        );

    let post_quiz_step = warp::path!("quiz" / QuizId)
        .and(warp::post())
        .and(warp::body::json())
        .and(filters::user_state(quiz_controller.clone()))
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .and_then(
            |quiz_id: QuizId,
             step: Step,
             user_state: UserState,
             quiz_controller: QuizController| async move {
                let result = async {
                    let token = token_for(&quiz_controller, &user_state)?;
                    let outcome = quiz_controller.take_step(&user_state, quiz_id, step)?;

                    let results = if outcome.is_exhausted() {
                        Some(quiz_controller.complete_quiz(&user_state, quiz_id).await?)
                    } else {
                        None
                    };

                    Ok::<_, QuizError>(
                        reply::json(&StepReply {
                            outcome,
                            results,
                            token: &token,
                        })
                        .into_response(),
                    )
                }
                .await;

                Ok::<_, Rejection>(result.unwrap_or_else(|err| error_reply(&err)))
            },
        );

    let get_results = warp::path!("quiz" / QuizId / "results")
        .and(warp::get())
        .and(filters::user_state(quiz_controller.clone()))
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .and_then(
            |quiz_id: QuizId, user_state: UserState, quiz_controller: QuizController| async move {
                let result = async {
                    let token = token_for(&quiz_controller, &user_state)?;
                    let results = quiz_controller.complete_quiz(&user_state, quiz_id).await?;

                    Ok::<_, QuizError>(
                        reply::json(&ResultsReply {
                            results,
                            token: &token,
                        })
                        .into_response(),
                    )
                }
                .await;

                Ok::<_, Rejection>(result.unwrap_or_else(|err| error_reply(&err)))
            },
        );

    let history = warp::path!("history")
        .and(warp::get())
        .and(page_query())
        .and(filters::user_state(quiz_controller.clone()))
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .map(
            |query: PageQuery, user_state: UserState, quiz_controller: QuizController| {
                let result = token_for(&quiz_controller, &user_state).and_then(|token| {
                    let history = quiz_controller.history(&user_state, query.page.unwrap_or(1))?;
                    Ok(reply::json(&HistoryReply {
                        history,
                        token: &token,
                    })
                    .into_response())
                });

                result.unwrap_or_else(|err| error_reply(&err))
            },
        );

    let cors = warp::cors()
        .allow_origin(cors_origin)
        .allow_methods(vec!["GET", "POST"])
        .allow_headers(vec!["Authorization", "Content-Type"]);

    stats
        .or(get_books)
        .or(post_books)
        .or(book_availability)
        .or(post_chapters)
        .or(chapter_availability)
        .or(get_chapter_questions)
        .or(post_chapter_questions)
        .or(post_quiz)
        .or(get_quiz)
        .or(post_quiz_step)
        .or(get_results)
        .or(history)
        .with(cors)
        .recover(handle_rejection)
}
