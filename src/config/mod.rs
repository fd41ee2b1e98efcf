use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

// Defaults mirror the data the service ships with.
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_GEMINI_EMBEDDING_MODEL: &str = "models/text-embedding-004";
const DEFAULT_ITEM_COUNT: usize = 3;
const DEFAULT_TOKEN_OVERLAP_THRESHOLD: f32 = 0.34;
const DEFAULT_ADAPTER_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    /// Directory holding the persisted catalog, vector index and metadata.
    pub data_dir: PathBuf,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_embedding_model: String,
    /// Exact number of items a recommendation request must carry.
    pub item_count: usize,
    /// Jaccard score a token-overlap match must exceed to resolve.
    pub token_overlap_threshold: f32,
    /// Timeout applied to every embedding/generation HTTP call.
    pub adapter_timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let gemini_api_key =
            env::var("GEMINI_API_KEY").context("GEMINI_API_KEY must be set")?;

        Ok(Config {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("product_data")),
            gemini_api_key,
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_embedding_model: env::var("GEMINI_EMBEDDING_MODEL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_EMBEDDING_MODEL.to_string()),
            item_count: env::var("RECOMMENDATION_ITEM_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_ITEM_COUNT),
            token_overlap_threshold: env::var("TOKEN_OVERLAP_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TOKEN_OVERLAP_THRESHOLD),
            adapter_timeout_seconds: env::var("ADAPTER_TIMEOUT_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_ADAPTER_TIMEOUT_SECONDS),
        })
    }
}
