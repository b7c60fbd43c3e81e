//! Application configuration loaded from environment variables.
//!
//! The configuration is built once at startup and handed to each collaborator
//! (Rally client, LLM client). The analytics pipeline never reads it.

use std::env;
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};

/// Path suffix of the Rally Web Services API.
pub const RALLY_API_SUFFIX: &str = "/slm/webservice/v2.0";

/// Development default values - NEVER use in production.
pub mod defaults {
    pub const DEV_HOST: &str = "127.0.0.1";
    pub const DEV_PORT: u16 = 8080;
    pub const DEV_RALLY_ENDPOINT: &str = "https://rally1.rallydev.com";
    pub const DEV_RALLY_PAGE_SIZE: u32 = 200;
    pub const DEV_RALLY_TIMEOUT_SECS: u64 = 60;
    pub const DEV_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
    pub const DEV_LLM_MODEL: &str = "gpt-4";
    pub const DEV_AZURE_API_VERSION: &str = "2023-05-15";
    pub const DEV_LLM_TIMEOUT_SECS: u64 = 120;
}

/// Runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Parse environment from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    /// Check if this is a development environment.
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    /// Check if this is a production environment.
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Rally (issue tracker) connection settings.
#[derive(Debug, Clone)]
pub struct RallySettings {
    /// Normalized WSAPI base URL (always ends with `/slm/webservice/v2.0`)
    pub endpoint: String,
    /// API key sent as the `zsessionid` header
    pub api_key: SecretString,
    /// Verify TLS certificates (self-hosted Rally often uses self-signed certs)
    pub verify_tls: bool,
    /// Page size for paginated queries
    pub page_size: u32,
    /// Total request timeout in seconds
    pub timeout_secs: u64,
}

impl RallySettings {
    /// Build settings for an ad-hoc endpoint/key pair with default tuning.
    pub fn new(endpoint: &str, api_key: &str) -> Self {
        Self {
            endpoint: normalize_rally_endpoint(endpoint),
            api_key: SecretString::from(api_key.to_string()),
            verify_tls: true,
            page_size: defaults::DEV_RALLY_PAGE_SIZE,
            timeout_secs: defaults::DEV_RALLY_TIMEOUT_SECS,
        }
    }

    /// Both endpoint and API key are present.
    pub fn is_configured(&self) -> bool {
        endpoint_is_set(&self.endpoint) && !self.api_key.expose_secret().trim().is_empty()
    }
}

/// LLM provider flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProviderKind {
    OpenAi,
    Azure,
}

impl LlmProviderKind {
    /// Parse provider from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "azure" | "azure-openai" => Some(Self::Azure),
            _ => None,
        }
    }
}

impl std::fmt::Display for LlmProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Azure => write!(f, "azure"),
        }
    }
}

/// LLM completion service settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub provider: LlmProviderKind,
    pub api_key: SecretString,
    /// OpenAI-compatible base URL (ignored for Azure)
    pub base_url: String,
    /// Default model when a request does not name one
    pub default_model: String,
    /// Azure resource endpoint, e.g. `https://my-resource.openai.azure.com`
    pub azure_endpoint: Option<String>,
    /// Azure deployment name (defaults to the model name)
    pub azure_deployment: Option<String>,
    pub azure_api_version: String,
    pub timeout_secs: u64,
}

impl LlmSettings {
    /// An API key is present (and, for Azure, an endpoint).
    pub fn is_configured(&self) -> bool {
        let has_key = !self.api_key.expose_secret().trim().is_empty();
        match self.provider {
            LlmProviderKind::OpenAi => has_key,
            LlmProviderKind::Azure => has_key && self.azure_endpoint.is_some(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Runtime environment
    pub environment: Environment,
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Directory for static dashboard assets
    pub static_dir: Option<PathBuf>,
    /// Rally settings
    pub rally: RallySettings,
    /// LLM settings
    pub llm: LlmSettings,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In development mode every variable has a default and missing
    /// credentials only disable the matching collaborator. In production,
    /// `RALLY_ENDPOINT`, `RALLY_API_KEY` and `OPENAI_API_KEY` are required.
    ///
    /// Environment variables:
    /// - `RUST_ENV`: Environment (development/production) - REQUIRED
    /// - `RI_HOST`: Server host (default: 127.0.0.1)
    /// - `RI_PORT`: Server port (default: 8080)
    /// - `RI_STATIC_DIR`: Static dashboard assets directory
    /// - `RALLY_ENDPOINT`: Rally base URL
    /// - `RALLY_API_KEY`: Rally API key
    /// - `RALLY_VERIFY_TLS`: Verify TLS certificates (default: true)
    /// - `RALLY_PAGE_SIZE`: Page size for paginated queries (default: 200)
    /// - `RALLY_TIMEOUT_SECS`: Rally request timeout (default: 60)
    /// - `LLM_PROVIDER`: `openai` or `azure` (default: openai)
    /// - `OPENAI_API_KEY`: API key for the LLM provider
    /// - `OPENAI_BASE_URL`: OpenAI-compatible base URL
    /// - `LLM_MODEL`: Default model (default: gpt-4)
    /// - `AZURE_OPENAI_ENDPOINT`, `AZURE_OPENAI_DEPLOYMENT`, `AZURE_OPENAI_API_VERSION`
    /// - `LLM_TIMEOUT_SECS`: LLM request timeout (default: 120)
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_str = env::var("RUST_ENV").map_err(|_| ConfigError::MissingEnvVar("RUST_ENV"))?;

        let environment = Environment::parse(&env_str).ok_or(ConfigError::InvalidValue(
            "RUST_ENV must be 'development' or 'production'",
        ))?;

        let host = env::var("RI_HOST").unwrap_or_else(|_| defaults::DEV_HOST.to_string());

        let port = env::var("RI_PORT")
            .unwrap_or_else(|_| defaults::DEV_PORT.to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue("RI_PORT must be a valid port number"))?;

        let static_dir = env::var("RI_STATIC_DIR").ok().map(PathBuf::from);

        let rally_endpoint = env::var("RALLY_ENDPOINT").unwrap_or_else(|_| {
            if environment.is_development() {
                defaults::DEV_RALLY_ENDPOINT.to_string()
            } else {
                String::new()
            }
        });

        let verify_tls = match env::var("RALLY_VERIFY_TLS") {
            Ok(value) => parse_bool(&value)
                .ok_or(ConfigError::InvalidValue("RALLY_VERIFY_TLS must be true or false"))?,
            Err(_) => true,
        };

        let page_size = env::var("RALLY_PAGE_SIZE")
            .unwrap_or_else(|_| defaults::DEV_RALLY_PAGE_SIZE.to_string())
            .parse::<u32>()
            .ok()
            .filter(|size| (1..=2000).contains(size))
            .ok_or(ConfigError::InvalidValue(
                "RALLY_PAGE_SIZE must be a number between 1 and 2000",
            ))?;

        let rally_timeout_secs = env::var("RALLY_TIMEOUT_SECS")
            .unwrap_or_else(|_| defaults::DEV_RALLY_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidValue("RALLY_TIMEOUT_SECS must be a valid number"))?;

        let rally = RallySettings {
            endpoint: normalize_rally_endpoint(&rally_endpoint),
            api_key: SecretString::from(env::var("RALLY_API_KEY").unwrap_or_default()),
            verify_tls,
            page_size,
            timeout_secs: rally_timeout_secs,
        };

        let provider = match env::var("LLM_PROVIDER") {
            Ok(value) => LlmProviderKind::parse(&value).ok_or(ConfigError::InvalidValue(
                "LLM_PROVIDER must be 'openai' or 'azure'",
            ))?,
            Err(_) => LlmProviderKind::OpenAi,
        };

        let llm_timeout_secs = env::var("LLM_TIMEOUT_SECS")
            .unwrap_or_else(|_| defaults::DEV_LLM_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidValue("LLM_TIMEOUT_SECS must be a valid number"))?;

        let llm = LlmSettings {
            provider,
            api_key: SecretString::from(env::var("OPENAI_API_KEY").unwrap_or_default()),
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| defaults::DEV_OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            default_model: env::var("LLM_MODEL")
                .unwrap_or_else(|_| defaults::DEV_LLM_MODEL.to_string()),
            azure_endpoint: env::var("AZURE_OPENAI_ENDPOINT")
                .ok()
                .map(|e| e.trim_end_matches('/').to_string())
                .filter(|e| !e.is_empty()),
            azure_deployment: env::var("AZURE_OPENAI_DEPLOYMENT")
                .ok()
                .filter(|d| !d.is_empty()),
            azure_api_version: env::var("AZURE_OPENAI_API_VERSION")
                .unwrap_or_else(|_| defaults::DEV_AZURE_API_VERSION.to_string()),
            timeout_secs: llm_timeout_secs,
        };

        let config = Config {
            environment,
            host,
            port,
            static_dir,
            rally,
            llm,
        };

        if environment.is_production() {
            config.validate_production()?;
        }

        Ok(config)
    }

    /// Validate that production configuration has real credentials.
    fn validate_production(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if !self.rally.is_configured() {
            errors.push("RALLY_ENDPOINT and RALLY_API_KEY must both be set.".to_string());
        }

        if !self.llm.is_configured() {
            errors.push(match self.llm.provider {
                LlmProviderKind::OpenAi => "OPENAI_API_KEY must be set.".to_string(),
                LlmProviderKind::Azure => {
                    "OPENAI_API_KEY and AZURE_OPENAI_ENDPOINT must be set for the azure provider."
                        .to_string()
                }
            });
        }

        if !self.rally.verify_tls {
            errors.push("RALLY_VERIFY_TLS=false is not allowed in production.".to_string());
        }

        if !errors.is_empty() {
            return Err(ConfigError::ProductionValidation(errors));
        }

        Ok(())
    }

    /// Get the server bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if running in development mode.
    pub fn is_development(&self) -> bool {
        self.environment.is_development()
    }
}

/// Normalize a user-supplied Rally URL into the WSAPI base URL.
///
/// Trailing slashes and `#fragment`s are dropped and `/slm/webservice/v2.0`
/// is appended when missing. An empty input stays empty.
pub fn normalize_rally_endpoint(raw: &str) -> String {
    let without_fragment = raw.split('#').next().unwrap_or_default().trim();
    let base = without_fragment.trim_end_matches('/');
    if base.is_empty() {
        return String::new();
    }
    if base.ends_with(RALLY_API_SUFFIX) {
        base.to_string()
    } else {
        format!("{}{}", base, RALLY_API_SUFFIX)
    }
}

fn endpoint_is_set(endpoint: &str) -> bool {
    !endpoint.trim().is_empty()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(&'static str),

    #[error("Production configuration validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    ProductionValidation(Vec<String>),
}
