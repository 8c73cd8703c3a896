use clap::Args;
use std::env;

pub const DEFAULT_API_BASE_URL: &str = "https://certweb-xzpx.onrender.com/api/v1";

const API_BASE_URL_VARS: [&str; 2] = ["API_BASE_URL", "VITE_API_BASE_URL"];
const SUPABASE_URL_VARS: [&str; 3] = [
    "SUPABASE_URL",
    "VITE_SUPABASE_URL",
    "NEXT_PUBLIC_SUPABASE_URL",
];
const SUPABASE_KEY_VARS: [&str; 3] = [
    "SUPABASE_ANON_KEY",
    "VITE_SUPABASE_ANON_KEY",
    "NEXT_PUBLIC_SUPABASE_ANON_KEY",
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be in range [{min}, {max}], got {value}")]
    OutOfRange {
        name: &'static str,
        min: String,
        max: String,
        value: String,
    },
    #[error("{name} cannot be empty")]
    Empty { name: &'static str },
    #[error("{name} must start with http:// or https://, got {value}")]
    BadScheme { name: &'static str, value: String },
    #[error("{name} is not a valid number: {value}")]
    NotANumber { name: &'static str, value: String },
    #[error("unknown log level: {0}")]
    LogLevel(String),
}

/// Connection and tuning flags shared by every `certweb` subcommand.
///
/// Configuration priority: CLI args > environment > fallback chain > defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct CliArgs {
    /// Backend base URL (e.g. https://host/api/v1)
    #[arg(long, global = true)]
    pub api_base_url: Option<String>,

    /// Supabase project URL for the auth provider
    #[arg(long, global = true)]
    pub supabase_url: Option<String>,

    /// Supabase anon key
    #[arg(long, global = true)]
    pub supabase_anon_key: Option<String>,

    /// Per-attempt request timeout in milliseconds (100-120000)
    #[arg(long, global = true, env = "REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: Option<u64>,

    /// Retries for transient failures (0-10)
    #[arg(long, global = true, env = "MAX_RETRIES")]
    pub max_retries: Option<u32>,

    /// Linear backoff base in milliseconds (0-60000)
    #[arg(long, global = true, env = "RETRY_BASE_DELAY_MS")]
    pub retry_base_delay_ms: Option<u64>,

    /// Idle window before forced sign-out, in seconds (1-86400)
    #[arg(long, global = true, env = "IDLE_TIMEOUT_SECS")]
    pub idle_timeout_secs: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub api_base_url: String,
    /// `None` means the stub auth provider is used.
    pub supabase: Option<SupabaseConfig>,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub idle_timeout_secs: u64,
    pub log_level: log::Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            supabase: None,
            request_timeout_ms: 15_000,
            max_retries: 2,
            retry_base_delay_ms: 1_000,
            idle_timeout_secs: 3_600,
            log_level: log::Level::Info,
        }
    }
}

/// Validate that a value is within a given range (inclusive)
fn validate_in_range<T>(val: T, min: T, max: T, name: &'static str) -> Result<T, ConfigError>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if val < min || val > max {
        Err(ConfigError::OutOfRange {
            name,
            min: min.to_string(),
            max: max.to_string(),
            value: val.to_string(),
        })
    } else {
        Ok(val)
    }
}

/// Validate URL format (basic check)
fn validate_url(url: &str, name: &'static str) -> Result<(), ConfigError> {
    if url.is_empty() {
        return Err(ConfigError::Empty { name });
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::BadScheme {
            name,
            value: url.to_string(),
        })
    }
}

/// First non-empty value among `names`.
fn first_set<F>(lookup: &F, names: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names
        .iter()
        .filter_map(|name| lookup(name))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn numeric<T, F>(
    cli: Option<T>,
    lookup: &F,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = cli {
        return Ok(v);
    }
    match first_set(lookup, &[name]) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::NotANumber { name, value: raw }),
        None => Ok(default),
    }
}

/// Resolves configuration from CLI args and an environment lookup.
///
/// `lookup` is `std::env::var` in production; tests pass a map.
pub fn resolve<F>(args: &CliArgs, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let api_base_url = args
        .api_base_url
        .clone()
        .or_else(|| first_set(&lookup, &API_BASE_URL_VARS))
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
    validate_url(&api_base_url, "API_BASE_URL")?;
    let api_base_url = api_base_url.trim_end_matches('/').to_string();

    let supabase_url = args
        .supabase_url
        .clone()
        .or_else(|| first_set(&lookup, &SUPABASE_URL_VARS));
    let supabase_key = args
        .supabase_anon_key
        .clone()
        .or_else(|| first_set(&lookup, &SUPABASE_KEY_VARS));
    let supabase = match (supabase_url, supabase_key) {
        (Some(url), Some(anon_key)) if validate_url(&url, "SUPABASE_URL").is_ok() => {
            Some(SupabaseConfig {
                url: url.trim_end_matches('/').to_string(),
                anon_key,
            })
        }
        (url, key) => {
            log::warn!(
                "[config] auth provider not configured (url: {}, key: {}); using stub sign-in",
                url.as_deref().unwrap_or("<unset>"),
                if key.is_some() { "set" } else { "<unset>" }
            );
            None
        }
    };

    let request_timeout_ms = numeric(args.request_timeout_ms, &lookup, "REQUEST_TIMEOUT_MS", 15_000)?;
    let request_timeout_ms = validate_in_range(request_timeout_ms, 100, 120_000, "REQUEST_TIMEOUT_MS")?;

    let max_retries = numeric(args.max_retries, &lookup, "MAX_RETRIES", 2)?;
    let max_retries = validate_in_range(max_retries, 0, 10, "MAX_RETRIES")?;

    let retry_base_delay_ms = numeric(args.retry_base_delay_ms, &lookup, "RETRY_BASE_DELAY_MS", 1_000)?;
    let retry_base_delay_ms = validate_in_range(retry_base_delay_ms, 0, 60_000, "RETRY_BASE_DELAY_MS")?;

    let idle_timeout_secs = numeric(args.idle_timeout_secs, &lookup, "IDLE_TIMEOUT_SECS", 3_600)?;
    let idle_timeout_secs = validate_in_range(idle_timeout_secs, 1, 86_400, "IDLE_TIMEOUT_SECS")?;

    let log_level = match args
        .log_level
        .clone()
        .or_else(|| first_set(&lookup, &["LOG_LEVEL"]))
    {
        Some(raw) => raw
            .parse::<log::Level>()
            .map_err(|_| ConfigError::LogLevel(raw))?,
        None => log::Level::Info,
    };

    Ok(Config {
        api_base_url,
        supabase,
        request_timeout_ms,
        max_retries,
        retry_base_delay_ms,
        idle_timeout_secs,
        log_level,
    })
}

/// Load configuration from CLI args and process environment variables
pub fn load(args: &CliArgs) -> Result<Config, ConfigError> {
    resolve(args, |name| env::var(name).ok())
}

impl Config {
    pub fn print_summary(&self) {
        eprintln!("certweb configuration:");
        eprintln!("  API base: {}", self.api_base_url);
        match &self.supabase {
            Some(s) => eprintln!("  Auth: {}", s.url),
            None => eprintln!("  Auth: stub (not configured)"),
        }
        eprintln!("  Timeout: {}ms", self.request_timeout_ms);
        eprintln!(
            "  Retries: {} (base delay {}ms)",
            self.max_retries, self.retry_base_delay_ms
        );
        eprintln!("  Idle sign-out: {}s", self.idle_timeout_secs);
    }
}
