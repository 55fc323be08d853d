use warp::{
    reject::{self, Reject},
    Filter,
};

use crate::controllers::QuizController;
use crate::models::UserState;

#[derive(Debug)]
pub struct Unauthorized;

impl Reject for Unauthorized {}

pub fn with_quiz_controller(
    quiz_controller: QuizController,
) -> impl Filter<Extract = (QuizController,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || quiz_controller.clone())
}

pub fn user_state(
    quiz_controller: QuizController,
) -> impl Filter<Extract = (UserState,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_quiz_controller(quiz_controller))
        .and_then(
            |authorization: Option<String>, quiz_controller: QuizController| async move {
                quiz_controller
                    .authorize(authorization.as_deref())
                    .map_err(|err| {
                        tracing::warn!("rejected authorization: {}", err);
                        reject::custom(Unauthorized)
                    })
            },
        )
}
