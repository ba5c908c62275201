use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Redis
    pub redis_url: String,
    pub redis_cache_ttl_seconds: u64,

    // CORS
    pub cors_allow_origins: Vec<String>,

    // Auth
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    /// Dev-only escape hatch: skip token verification and act as a fixed
    /// admin identity. Ignored outside the Dev environment.
    pub auth_dev_bypass: bool,

    // Escalation policy
    /// Lookback window for repeat-issue detection. None means the whole
    /// task history for the property/question pair is considered.
    pub repeat_issue_lookback_days: Option<u32>,

    // Mail delivery API (optional; assignment emails are skipped when unset)
    pub mail_api_url: Option<String>,
    pub mail_api_token: Option<String>,
    pub mail_timeout_seconds: u64,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let env = Environment::from_str(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        // Database
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        // Redis
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://redis:6379/0".to_string());
        let redis_cache_ttl_seconds = env::var("REDIS_CACHE_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(900); // 15 minutes; finalization invalidates explicitly

        // CORS
        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Auth
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "stayqa".to_string());
        let jwt_audience = env::var("JWT_AUDIENCE").unwrap_or_else(|_| "stayqa-api".to_string());
        let auth_dev_bypass = env::var("AUTH_DEV_BYPASS")
            .map(|s| s == "1" || s.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        // Escalation policy
        let repeat_issue_lookback_days = env::var("ESCALATION_REPEAT_LOOKBACK_DAYS")
            .ok()
            .and_then(|s| s.parse().ok());

        // Mail delivery API
        let mail_api_url = env::var("MAIL_API_URL").ok().filter(|s| !s.is_empty());
        let mail_api_token = env::var("MAIL_API_TOKEN").ok().filter(|s| !s.is_empty());
        let mail_timeout_seconds = env::var("MAIL_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(15);

        Ok(Settings {
            env,
            server_addr,
            database_url,
            database_max_connections,
            redis_url,
            redis_cache_ttl_seconds,
            cors_allow_origins,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            auth_dev_bypass,
            repeat_issue_lookback_days,
            mail_api_url,
            mail_api_token,
            mail_timeout_seconds,
        })
    }
}
