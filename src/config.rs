use anyhow::Context;
use std::path::PathBuf;

const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Process configuration, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub secret_key: String,
    pub token_ttl_hours: i64,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub bind_addr: String,
    pub allowed_origin: String,
    pub admin: Option<AdminSeed>,
    pub reconcile_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let secret_key = std::env::var("SECRET_KEY").context("SECRET_KEY not set")?;
        if secret_key.is_empty() {
            anyhow::bail!("SECRET_KEY must not be empty");
        }

        let admin = match (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) if !email.is_empty() && !password.is_empty() => {
                Some(AdminSeed { email, password })
            }
            _ => None,
        };

        Ok(Self {
            database_url: env_or("DATABASE_URL", "sqlite://filemart.db?mode=rwc"),
            secret_key,
            token_ttl_hours: parse_env("TOKEN_TTL_HOURS", 2)?,
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "./uploads")),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:3000"),
            allowed_origin: env_or("ALLOWED_ORIGIN", "*"),
            admin,
            reconcile_interval_secs: parse_env("RECONCILE_INTERVAL_SECS", 3600)?,
        })
    }

    /// Configuration for tests: in-memory database, uploads under `upload_dir`.
    pub fn for_tests(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            secret_key: "test-secret".to_string(),
            token_ttl_hours: 2,
            upload_dir: upload_dir.into(),
            max_upload_bytes: 1024 * 1024,
            bind_addr: "127.0.0.1:0".to_string(),
            allowed_origin: "*".to_string(),
            admin: None,
            reconcile_interval_secs: 3600,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}
