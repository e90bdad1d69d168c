use anyhow::{Context, Result};

pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://tokens.indieauth.com/token";

/// Application configuration loaded from environment variables.
/// Everything except `DATABASE_URL` has a default; without a database the
/// service falls back to the in-memory content store.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
    /// Absolute base URL, without a trailing slash.
    pub site_url: String,
    pub site_title: String,
    pub author_name: String,
    pub micropub_me: String,
    pub token_endpoint: String,
    pub feed_cache_seconds: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let site_url = optional_env("SITE_URL")
            .unwrap_or_else(|| "http://localhost:8080".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            port: optional_env("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            micropub_me: optional_env("MICROPUB_ME").unwrap_or_else(|| site_url.clone()),
            site_url,
            site_title: optional_env("SITE_TITLE").unwrap_or_else(|| "Weblog".to_string()),
            author_name: optional_env("AUTHOR_NAME").unwrap_or_else(|| "Anonymous".to_string()),
            token_endpoint: optional_env("TOKEN_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_TOKEN_ENDPOINT.to_string()),
            feed_cache_seconds: optional_env("FEED_CACHE_SECONDS")
                .unwrap_or_else(|| "120".to_string())
                .parse::<u32>()
                .context("FEED_CACHE_SECONDS must be a non-negative integer")?,
        })
    }

    /// Joins a site-relative path onto `site_url`.
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{}", self.site_url, path)
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Config {
            database_url: None,
            port: 8080,
            rust_log: "debug".to_string(),
            site_url: "https://example.org".to_string(),
            site_title: "Example".to_string(),
            author_name: "Example Author".to_string(),
            micropub_me: "https://example.org/".to_string(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            feed_cache_seconds: 120,
        }
    }
}
