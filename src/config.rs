use std::env;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use dotenvy::dotenv;

use crate::service::ai_client::AiProvider;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_signup_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub log_dir: String,

    /// Allocation handed to every new employee at signup
    pub default_ai_tokens: i64,
    pub ai: AiConfig,
}

#[derive(Clone, Debug)]
pub struct AiConfig {
    pub provider: AiProvider,
    pub api_key: String,
    pub model: String,
    /// Overrides the provider's default completion endpoint
    pub endpoint: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let provider = env::var("AI_PROVIDER").unwrap_or_else(|_| "mock".to_string());
        let provider = AiProvider::from_str(&provider)
            .map_err(|_| anyhow!("AI_PROVIDER must be one of mock, openai, groq, anthropic"))?;

        Ok(Self {
            server_addr: env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string()),
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10)?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            access_token_ttl: parse_or("ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: parse_or("REFRESH_TOKEN_TTL", 604_800)?, // 7 days

            rate_login_per_min: parse_or("RATE_LOGIN_PER_MIN", 60)?,
            rate_signup_per_min: parse_or("RATE_SIGNUP_PER_MIN", 30)?,
            rate_refresh_per_min: parse_or("RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: parse_or("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),

            default_ai_tokens: parse_or("DEFAULT_AI_TOKENS", 10)?,
            ai: AiConfig {
                provider,
                api_key: env::var("AI_API_KEY").unwrap_or_default(),
                model: env::var("AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
                endpoint: env::var("AI_ENDPOINT").ok().filter(|e| !e.is_empty()),
            },
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key} has an invalid value {raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}
