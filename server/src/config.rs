use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

const DEFAULT_TOKEN_TTL_MINUTES: i64 = 60 * 24 * 7;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub cors_allowed_origins: Vec<String>,
    pub membership_directory: Option<PathBuf>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let jwt_secret = env_required("JWT_SECRET")?;
        if jwt_secret.trim().is_empty() {
            return Err(anyhow!("JWT_SECRET must not be empty"));
        }

        let token_ttl_minutes = match std::env::var("TOKEN_TTL_MINUTES") {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .context("invalid TOKEN_TTL_MINUTES")?,
            Err(_) => DEFAULT_TOKEN_TTL_MINUTES,
        };

        let cors_allowed_origins = parse_origins(
            &std::env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
        );

        let membership_directory = std::env::var("MEMBERSHIP_DIRECTORY")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            jwt_secret,
            token_ttl_minutes,
            cors_allowed_origins,
            membership_directory,
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

fn env_required(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing env {}", key))
}
