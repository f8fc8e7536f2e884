use crate::backend::SupabaseOptions;
use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub table: String,
    pub bucket: String,
    pub session_file: PathBuf,
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            supabase_url: non_empty("SUPABASE_URL"),
            supabase_anon_key: non_empty("SUPABASE_ANON_KEY"),
            table: non_empty("ROOMFINDER_TABLE").unwrap_or_else(|| "rooms".to_string()),
            bucket: non_empty("ROOMFINDER_BUCKET").unwrap_or_else(|| "room-images".to_string()),
            session_file: non_empty("ROOMFINDER_SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".roomfinder_session.json")),
            http_timeout: Duration::from_secs(
                non_empty("ROOMFINDER_HTTP_TIMEOUT_SECS")
                    .unwrap_or_else(|| "30".to_string())
                    .parse()
                    .context("ROOMFINDER_HTTP_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
        })
    }

    /// Settings for the hosted backend; both URL and anon key must be set
    pub fn supabase_options(&self) -> Result<SupabaseOptions> {
        Ok(SupabaseOptions {
            url: self
                .supabase_url
                .clone()
                .context("SUPABASE_URL must be set (or pass --offline)")?,
            anon_key: self
                .supabase_anon_key
                .clone()
                .context("SUPABASE_ANON_KEY must be set (or pass --offline)")?,
            table: self.table.clone(),
            bucket: self.bucket.clone(),
            timeout: self.http_timeout,
        })
    }
}
