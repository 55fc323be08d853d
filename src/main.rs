use anyhow::{Context, Result};
use ring::hmac;
use tokio::fs;
use tracing_subscriber::EnvFilter;

use config::{ContentFile, Settings};
use content::ContentStore;
use controllers::{QuizController, ResultWriter};
use sampler::Sampler;

mod config;
mod content;
mod controllers;
mod error;
mod filters;
mod models;
mod quizzes;
mod routes;
mod sampler;
mod scoring;
mod session;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_err| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env()?;

    let secret_key = hmac::Key::new(hmac::HMAC_SHA256, settings.secret_key.as_ref());

    let content = fs::read_to_string(&settings.content_path)
        .await
        .with_context(|| format!("couldn't read {}", settings.content_path.display()))?;
    let content: ContentFile = toml::de::from_str(&content)?;
    let content = ContentStore::from_file(&content)?;

    let totals = content.totals()?;
    tracing::info!(
        books = totals.books,
        chapters = totals.chapters,
        questions = totals.questions,
        "loaded content"
    );

    let result_writer = ResultWriter::new(&settings.results_path)?;

    let quiz_controller =
        QuizController::new(secret_key, content, Sampler::from_entropy(), result_writer);

    let server = routes::routes(quiz_controller, &settings.cors_origin);

    tracing::info!(bind = %settings.bind_addr, "listening");
    warp::serve(server).run(settings.bind_addr).await;

    Ok(())
}
