// src/config.rs

use std::env;
use dotenvy::dotenv;

use crate::quiz::scoring::GradingPolicy;

/// Lesson topic length bounds.
pub const LESSON_TOPIC_MIN_LENGTH: u64 = 1;
pub const LESSON_TOPIC_MAX_LENGTH: u64 = 200;

/// Quiz title length bounds.
pub const QUIZ_TITLE_MIN_LENGTH: u64 = 1;
pub const QUIZ_TITLE_MAX_LENGTH: u64 = 200;

/// Upper bound for a single free-text answer or option id.
pub const QUIZ_ANSWER_MAX_LENGTH: u64 = 2000;

/// Class title / short title / group bounds.
pub const CLASS_TITLE_MAX_LENGTH: u64 = 200;
pub const CLASS_SHORT_TITLE_MAX_LENGTH: u64 = 50;
pub const GROUP_MAX_LENGTH: u64 = 50;

/// Default and maximum page size for class listings.
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Grace added to the remaining time when a banned student is let back in,
/// to absorb clock and network skew.
pub const DEFAULT_UNBAN_GRACE_MS: i64 = 3000;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub grading_policy: GradingPolicy,
    pub unban_grace_ms: i64,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let grading_policy = env::var("GRADING_POLICY")
            .ok()
            .map(|v| v.parse().expect("GRADING_POLICY must be 'partial_credit' or 'binary'"))
            .unwrap_or_default();

        let unban_grace_ms = env::var("QUIZ_UNBAN_GRACE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_UNBAN_GRACE_MS);

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            grading_policy,
            unban_grace_ms,
            bind_addr,
        }
    }

    /// Configuration for tests and local runs without an environment.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            database_url: String::new(),
            jwt_secret: jwt_secret.to_string(),
            jwt_expiration: 600,
            rust_log: "error".to_string(),
            admin_username: None,
            admin_password: None,
            grading_policy: GradingPolicy::default(),
            unban_grace_ms: DEFAULT_UNBAN_GRACE_MS,
            bind_addr: "127.0.0.1:0".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_uses_defaults() {
        let config = Config::for_tests("secret");
        assert_eq!(config.jwt_secret, "secret");
        assert_eq!(config.unban_grace_ms, DEFAULT_UNBAN_GRACE_MS);
        assert_eq!(config.grading_policy, GradingPolicy::PartialCredit);
        assert!(config.admin_username.is_none());
    }
}
