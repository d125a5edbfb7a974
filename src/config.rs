use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Application-level constants
pub const APP_NAME: &str = "BeomMed";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Source tag carried in every webhook envelope.
pub const DEFAULT_SOURCE: &str = "BeomMed System";
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// The dashboard folds at most this many recent records.
pub const DEFAULT_DASHBOARD_LIMIT: u32 = 200;
/// Result cap for record lists (the change-feed refetch size).
pub const DEFAULT_RECORDS_LIMIT: u32 = 500;
pub const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PASSWORD_ITERATIONS: u32 = 600_000;

/// Get the application data directory
/// ~/BeomMed/ on all platforms; falls back to the working directory.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default SQLite file location.
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("beommed.db")
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> String {
    std::env::var("BEOMMED_LOG").unwrap_or_else(|_| "beommed_lib=info,tower_http=warn".into())
}

/// Credentials for seeding the first operator account.
#[derive(Debug, Clone)]
pub struct BootstrapOperator {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    pub webhook_url: Option<String>,
    pub webhook_timeout_secs: u64,
    pub environment: String,
    pub source: String,
    pub dashboard_limit: u32,
    pub records_limit: u32,
    pub password_iterations: u32,
    pub bootstrap: Option<BootstrapOperator>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            db_path: default_db_path(),
            webhook_url: None,
            webhook_timeout_secs: DEFAULT_WEBHOOK_TIMEOUT_SECS,
            environment: DEFAULT_ENVIRONMENT.into(),
            source: DEFAULT_SOURCE.into(),
            dashboard_limit: DEFAULT_DASHBOARD_LIMIT,
            records_limit: DEFAULT_RECORDS_LIMIT,
            password_iterations: DEFAULT_PASSWORD_ITERATIONS,
            bootstrap: None,
        }
    }
}

impl AppConfig {
    /// Build from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values fall back to
    /// the default and log a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bootstrap = match (
            lookup("BEOMMED_BOOTSTRAP_EMAIL"),
            lookup("BEOMMED_BOOTSTRAP_PASSWORD"),
        ) {
            (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
                Some(BootstrapOperator {
                    email: email.trim().to_string(),
                    password,
                    name: lookup("BEOMMED_BOOTSTRAP_NAME").unwrap_or_else(|| "Operator".into()),
                })
            }
            _ => None,
        };

        Self {
            bind_addr: parsed(&lookup, "BEOMMED_BIND", defaults.bind_addr),
            db_path: lookup("BEOMMED_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            webhook_url: lookup("BEOMMED_WEBHOOK_URL").filter(|u| !u.trim().is_empty()),
            webhook_timeout_secs: parsed(
                &lookup,
                "BEOMMED_WEBHOOK_TIMEOUT_SECS",
                defaults.webhook_timeout_secs,
            ),
            environment: lookup("BEOMMED_ENVIRONMENT").unwrap_or(defaults.environment),
            source: lookup("BEOMMED_SOURCE").unwrap_or(defaults.source),
            dashboard_limit: parsed(&lookup, "BEOMMED_DASHBOARD_LIMIT", defaults.dashboard_limit),
            records_limit: parsed(&lookup, "BEOMMED_RECORDS_LIMIT", defaults.records_limit),
            password_iterations: parsed(
                &lookup,
                "BEOMMED_PASSWORD_ITERATIONS",
                defaults.password_iterations,
            )
            .max(1),
            bootstrap,
        }
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Ignoring unparseable configuration value");
                default
            }
        },
        None => default,
    }
}
