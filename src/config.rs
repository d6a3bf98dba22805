#[cfg(feature = "cli")]
use clap::Parser;
use std::fmt;
use url::Url;

use crate::credentials::RotationStrategy;

/// # Tutor Gateway Configuration
///
/// Configuration loaded from command-line arguments, environment variables,
/// and an optional `.env` file.
#[derive(Clone, Default)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", command(name = "tutor-gateway"))]
#[cfg_attr(feature = "cli", command(about = "Concurrent AI gateway for document-grounded chat, quiz generation and answer grading"))]
#[cfg_attr(feature = "cli", command(version))]
pub struct Config {
    // =============================================================================
    // CORE SERVER CONFIGURATION
    // =============================================================================

    /// Server port to listen on
    #[cfg_attr(feature = "cli", arg(short, long, env = "PORT", default_value = "8080"))]
    pub port: u16,

    /// Server host to bind to
    #[cfg_attr(feature = "cli", arg(long, env = "HOST", default_value = "0.0.0.0"))]
    pub host: String,

    // =============================================================================
    // UPSTREAM AI PROVIDER
    // =============================================================================

    /// Base URL of the generative language API
    #[cfg_attr(feature = "cli", arg(long, env = "GEMINI_BASE_URL", default_value = "https://generativelanguage.googleapis.com/v1beta"))]
    pub upstream_base_url: String,

    /// Model used for every operation
    #[cfg_attr(feature = "cli", arg(long, env = "GEMINI_MODEL", default_value = "gemini-1.5-flash"))]
    pub model_id: String,

    /// Comma-separated pool of API keys used for rotation
    #[cfg_attr(feature = "cli", arg(long, env = "GEMINI_API_KEYS", value_delimiter = ','))]
    pub api_keys: Vec<String>,

    /// Static key used when the rotation pool is empty or exhausted
    #[cfg_attr(feature = "cli", arg(long, env = "GEMINI_API_KEY"))]
    pub fallback_api_key: Option<String>,

    // =============================================================================
    // ROTATION AND WORKER POOL
    // =============================================================================

    /// Key selection strategy (round-robin, least-recently-used, random)
    #[cfg_attr(feature = "cli", arg(long, env = "ROTATION_STRATEGY", default_value = "round-robin"))]
    pub rotation_strategy: String,

    /// Seconds a key is parked after the provider reports its quota exhausted
    #[cfg_attr(feature = "cli", arg(long, env = "CREDENTIAL_COOLDOWN_SECS", default_value = "60"))]
    pub credential_cooldown_secs: u64,

    /// Maximum number of upstream calls executing at the same time
    #[cfg_attr(feature = "cli", arg(long, env = "WORKER_POOL_SIZE", default_value = "50"))]
    pub worker_pool_size: usize,

    // =============================================================================
    // HTTP CLIENT
    // =============================================================================

    /// HTTP client timeout in seconds
    #[cfg_attr(feature = "cli", arg(long, env = "HTTP_CLIENT_TIMEOUT", default_value = "60"))]
    pub http_client_timeout: u64,

    /// Maximum idle connections kept per host
    #[cfg_attr(feature = "cli", arg(long, env = "HTTP_CLIENT_MAX_CONNECTIONS_PER_HOST", default_value = "10"))]
    pub http_client_max_connections_per_host: usize,

    // =============================================================================
    // LOGGING AND ENVIRONMENT
    // =============================================================================

    /// Log level (error, warn, info, debug, trace)
    #[cfg_attr(feature = "cli", arg(long, env = "RUST_LOG", default_value = "info"))]
    pub log_level: String,

    /// Environment (development, staging, production)
    #[cfg_attr(feature = "cli", arg(long, env = "ENVIRONMENT", default_value = "development"))]
    pub environment: String,

    /// CORS origin (use * for development only)
    #[cfg_attr(feature = "cli", arg(long, env = "CORS_ORIGIN", default_value = "*"))]
    pub cors_origin: String,
}

// Keys must never reach logs, so Debug is written by hand.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("host", &self.host)
            .field("upstream_base_url", &self.upstream_base_url)
            .field("model_id", &self.model_id)
            .field("api_keys", &format_args!("[{} redacted]", self.api_keys.len()))
            .field("fallback_api_key", &self.fallback_api_key.as_ref().map(|_| "<redacted>"))
            .field("rotation_strategy", &self.rotation_strategy)
            .field("credential_cooldown_secs", &self.credential_cooldown_secs)
            .field("worker_pool_size", &self.worker_pool_size)
            .field("http_client_timeout", &self.http_client_timeout)
            .field("http_client_max_connections_per_host", &self.http_client_max_connections_per_host)
            .field("log_level", &self.log_level)
            .field("environment", &self.environment)
            .field("cors_origin", &self.cors_origin)
            .finish()
    }
}

impl Config {
    /// Parse configuration from command line arguments and environment variables.
    ///
    /// Loads `.env` if present, parses arguments, installs the tracing
    /// subscriber and validates the result. Exits the process on invalid
    /// configuration.
    #[cfg(feature = "cli")]
    pub fn parse_args() -> Self {
        let _ = dotenv::dotenv();

        let config = Self::parse();

        config.setup_logging();

        if let Err(err) = config.validate() {
            eprintln!("Configuration validation failed: {}", err);
            std::process::exit(1);
        }

        config
    }

    /// Create a test configuration with every field populated.
    pub fn for_test() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            upstream_base_url: "http://localhost:9000/v1beta".to_string(),
            model_id: "gemini-1.5-flash".to_string(),
            api_keys: vec!["test-key-1".to_string(), "test-key-2".to_string()],
            fallback_api_key: None,
            rotation_strategy: "round-robin".to_string(),
            credential_cooldown_secs: 60,
            worker_pool_size: 8,
            http_client_timeout: 30,
            http_client_max_connections_per_host: 10,
            log_level: "info".to_string(),
            environment: "development".to_string(),
            cors_origin: "*".to_string(),
        }
    }

    /// Parsed rotation strategy. Call `validate` first; an unknown value
    /// falls back to round-robin.
    pub fn strategy(&self) -> RotationStrategy {
        self.rotation_strategy.parse().unwrap_or_default()
    }

    /// Non-blank keys of the rotation pool, trimmed.
    pub fn pooled_keys(&self) -> Vec<String> {
        self.api_keys
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// The static key, if one is configured and non-blank.
    pub fn effective_fallback_key(&self) -> Option<String> {
        self.fallback_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }

    #[cfg(feature = "cli")]
    fn setup_logging(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(&self.log_level)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .try_init();
    }

    /// Validate configuration values and provide helpful error messages.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("Port cannot be 0. Please specify a valid port number (1-65535).".to_string());
        }

        if self.host.is_empty() {
            return Err("Host cannot be empty. Please specify a valid host (e.g., '0.0.0.0', 'localhost', or an IP address).".to_string());
        }

        if self.upstream_base_url.is_empty() {
            return Err("Upstream base URL cannot be empty.".to_string());
        }

        match Url::parse(&self.upstream_base_url) {
            Ok(url) => {
                if !["http", "https"].contains(&url.scheme()) {
                    return Err(format!(
                        "Invalid URL scheme '{}'. Only 'http' and 'https' are supported.",
                        url.scheme()
                    ));
                }
                if url.host().is_none() {
                    return Err("Upstream base URL must include a host.".to_string());
                }
                if self.environment == "production" && url.scheme() == "http" {
                    eprintln!(
                        "⚠️  Warning: Using HTTP towards the AI provider in production is not recommended."
                    );
                }
            }
            Err(err) => {
                return Err(format!(
                    "Invalid upstream base URL '{}': {}.",
                    self.upstream_base_url, err
                ));
            }
        }

        if self.model_id.trim().is_empty() {
            return Err("Model ID cannot be empty. Please specify a valid model identifier.".to_string());
        }

        self.rotation_strategy.parse::<RotationStrategy>()?;

        if self.worker_pool_size == 0 {
            return Err("Worker pool size must be greater than 0.".to_string());
        }
        if self.worker_pool_size > 512 {
            eprintln!(
                "⚠️  Warning: Worker pool size of {} exceeds the blocking thread limit of the runtime; \
                excess calls will queue there instead.",
                self.worker_pool_size
            );
        }

        if self.http_client_timeout == 0 {
            return Err("HTTP client timeout must be greater than 0 seconds.".to_string());
        }
        if self.http_client_max_connections_per_host == 0 {
            return Err("HTTP client max connections per host must be greater than 0.".to_string());
        }

        if self.pooled_keys().is_empty() && self.effective_fallback_key().is_none() {
            eprintln!(
                "⚠️  Warning: No API keys configured. Set GEMINI_API_KEYS or GEMINI_API_KEY; \
                every AI operation will fail with 503 until then."
            );
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.environment.as_str()) {
            return Err(format!(
                "Invalid environment '{}'. Valid options are: {}",
                self.environment,
                valid_environments.join(", ")
            ));
        }

        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log level '{}'. Valid options are: {}",
                self.log_level,
                valid_log_levels.join(", ")
            ));
        }

        if self.environment == "production" && self.cors_origin == "*" {
            eprintln!(
                "⚠️  Warning: Using CORS origin '*' in production is not recommended."
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_for_test_is_valid() {
        assert!(Config::for_test().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_pool() {
        let mut config = Config::for_test();
        config.worker_pool_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_strategy() {
        let mut config = Config::for_test();
        config.rotation_strategy = "fastest".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.contains("fastest"));
    }

    #[test]
    fn test_rejects_bad_url_scheme() {
        let mut config = Config::for_test();
        config.upstream_base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pooled_keys_drop_blanks() {
        let mut config = Config::for_test();
        config.api_keys = vec![" a ".to_string(), "".to_string(), "  ".to_string(), "b".to_string()];
        assert_eq!(config.pooled_keys(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_debug_redacts_keys() {
        let mut config = Config::for_test();
        config.fallback_api_key = Some("super-secret".to_string());
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("test-key-1"));
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("redacted"));
    }
}
