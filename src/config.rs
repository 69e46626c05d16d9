use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

use crate::dashboard::day_range::{IST_OFFSET_MINUTES, offset_from_minutes};

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
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    /// Fixed offset used for "today" and "this month" on the dashboard.
    pub report_utc_offset_minutes: i32,

    // Query cache
    pub cache_ttl_secs: u64,
    pub cache_max_entries: u64,

    pub branch_codes: Vec<String>,

    /// Bootstrap admin, created on start-up when no admin exists yet.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,

    pub log_dir: String,
    pub log_level: String,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn or_default<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

/// Splits a comma separated list, dropping blanks and upper-casing codes.
pub fn parse_branch_codes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|code| code.trim().to_uppercase())
        .filter(|code| !code.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let report_utc_offset_minutes =
            or_default("REPORT_UTC_OFFSET_MINUTES", IST_OFFSET_MINUTES)?;
        if offset_from_minutes(report_utc_offset_minutes).is_none() {
            anyhow::bail!("REPORT_UTC_OFFSET_MINUTES out of range: {report_utc_offset_minutes}");
        }

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            db_max_connections: or_default("DB_MAX_CONNECTIONS", 10)?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: or_default("ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: or_default("REFRESH_TOKEN_TTL", 604_800)?, // 7 days

            rate_login_per_min: or_default("RATE_LOGIN_PER_MIN", 60)?,
            rate_refresh_per_min: or_default("RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: or_default("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            report_utc_offset_minutes,

            cache_ttl_secs: or_default("CACHE_TTL_SECS", 30)?,
            cache_max_entries: or_default("CACHE_MAX_ENTRIES", 1000)?,

            branch_codes: parse_branch_codes(
                &env::var("BRANCH_CODES").unwrap_or_else(|_| "HYD,BLR,ONLINE".to_string()),
            ),

            admin_email: env::var("ADMIN_EMAIL")
                .ok()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty()),
            admin_password: env::var("ADMIN_PASSWORD").ok().filter(|p| !p.is_empty()),

            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".to_string()),
        })
    }
}

#[cfg(test)]
impl Config {
    /// Fixed settings for handler tests; nothing here reads the environment.
    pub fn for_tests() -> Self {
        Config {
            database_url: "mysql://unused".into(),
            db_max_connections: 1,
            jwt_secret: "test-secret".into(),
            server_addr: "127.0.0.1:0".into(),
            access_token_ttl: 60,
            refresh_token_ttl: 120,
            rate_login_per_min: 60,
            rate_refresh_per_min: 30,
            rate_protected_per_min: 1000,
            api_prefix: "/api".into(),
            report_utc_offset_minutes: IST_OFFSET_MINUTES,
            cache_ttl_secs: 30,
            cache_max_entries: 100,
            branch_codes: vec!["HYD".into(), "BLR".into()],
            admin_email: None,
            admin_password: None,
            log_dir: "logs".into(),
            log_level: "debug".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_codes_are_trimmed_and_uppercased() {
        assert_eq!(
            parse_branch_codes(" hyd, BLR ,,online "),
            vec!["HYD", "BLR", "ONLINE"]
        );
    }

    #[test]
    fn empty_branch_list_yields_nothing() {
        assert!(parse_branch_codes(" , ").is_empty());
    }
}
