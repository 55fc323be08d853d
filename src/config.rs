use anyhow::{Error, Result};
use rand::prelude::*;
use ring::digest;
use serde::Deserialize;
use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf};

use crate::models::Difficulty;

#[derive(Clone, Debug)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    pub cors_origin: String,
    pub secret_key: [u8; digest::SHA256_OUTPUT_LEN],
    pub content_path: PathBuf,
    pub results_path: PathBuf,
}

impl Settings {
    pub fn from_env() -> Result<Settings> {
        let bind_addr = env::var("BIND").unwrap_or_else(|_err| "127.0.0.1:3030".into());
        let bind_addr: SocketAddr = bind_addr.parse()?;

        let cors_origin =
            env::var("CORS_ORIGIN").unwrap_or_else(|_err| "http://localhost:1313".into());

        let secret_key = env::var("SECRET_KEY")
            .map_err(Error::new)
            .and_then(|env| {
                let mut secret_key = [0u8; digest::SHA256_OUTPUT_LEN];
                hex::decode_to_slice(env, &mut secret_key)?;
                Ok(secret_key)
            })
            .or_else(|_err| -> Result<_> {
                let mut secret_key = [0u8; digest::SHA256_OUTPUT_LEN];
                rand::rngs::OsRng.fill(&mut secret_key);

                tracing::warn!("no secret key was specified, generated a new secret key");
                println!("Rerun with SECRET_KEY={}", hex::encode(secret_key));

                Ok(secret_key)
            })?;

        let content_path = env::var("CONTENT_PATH").unwrap_or_else(|_err| "content.toml".into());
        let results_path = env::var("RESULTS_PATH").unwrap_or_else(|_err| "results.csv".into());

        Ok(Settings {
            bind_addr,
            cors_origin,
            secret_key,
            content_path: content_path.into(),
            results_path: results_path.into(),
        })
    }
}

/// Books, chapters and questions loaded at startup.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ContentFile {
    #[serde(default)]
    pub book: Vec<BookEntry>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BookEntry {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub chapter: Vec<ChapterEntry>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChapterEntry {
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub question: Vec<QuestionEntry>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QuestionEntry {
    pub text: String,
    pub options: BTreeMap<String, String>,
    pub answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub difficulty: Difficulty,
}
