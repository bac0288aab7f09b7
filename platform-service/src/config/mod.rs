use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub persistence: PersistenceBackend,
    pub mongodb: MongoConfig,
    pub seed_built_ins: bool,
    pub security: SecurityConfig,
    pub swagger: SwaggerConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    Mongodb,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub max_pool_size: u32,
    pub server_selection_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwaggerConfig {
    pub enabled: SwaggerMode,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SwaggerMode {
    Public,
    Disabled,
}

impl PlatformConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let environment: Environment = parse_env("ENVIRONMENT", Some("dev"), false)?;
        let is_prod = environment == Environment::Prod;

        let persistence: PersistenceBackend =
            parse_env("PERSISTENCE_BACKEND", Some("mongodb"), is_prod)?;
        // Mongo settings are only mandatory when Mongo is the backend.
        let mongo_required = is_prod && persistence == PersistenceBackend::Mongodb;

        let config = PlatformConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("platform-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            persistence,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", Some("mongodb://localhost:27017"), mongo_required)?,
                database: get_env("MONGODB_DATABASE", Some("content_platform"), mongo_required)?,
                max_pool_size: parse_env("MONGODB_MAX_POOL_SIZE", Some("10"), false)?,
                server_selection_timeout_ms: parse_env(
                    "MONGODB_SERVER_SELECTION_TIMEOUT_MS",
                    Some("5000"),
                    false,
                )?,
            },
            seed_built_ins: parse_env("SEED_BUILT_INS", Some("true"), false)?,
            security: SecurityConfig {
                allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            swagger: SwaggerConfig {
                enabled: parse_env("ENABLE_SWAGGER", Some("public"), is_prod)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// In-memory configuration on an ephemeral port, for tests and local runs.
    pub fn in_memory() -> Self {
        PlatformConfig {
            common: core_config::Config { port: 0 },
            environment: Environment::Dev,
            service_name: "platform-service".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            persistence: PersistenceBackend::Memory,
            mongodb: MongoConfig {
                uri: "mongodb://localhost:27017".to_string(),
                database: "content_platform".to_string(),
                max_pool_size: 10,
                server_selection_timeout_ms: 5000,
            },
            seed_built_ins: true,
            security: SecurityConfig {
                allowed_origins: vec!["http://localhost:3000".to_string()],
            },
            swagger: SwaggerConfig {
                enabled: SwaggerMode::Disabled,
            },
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.mongodb.max_pool_size == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "MONGODB_MAX_POOL_SIZE must be positive"
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.persistence == PersistenceBackend::Memory {
                tracing::warn!("In-memory persistence in production - data is lost on restart");
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match (env::var(key), default) {
        (Ok(val), _) => Ok(val),
        (Err(_), _) if is_prod => Err(AppError::ConfigError(anyhow::anyhow!(
            "{} is required in production but not set",
            key
        ))),
        (Err(_), Some(def)) => Ok(def.to_string()),
        (Err(_), None) => Err(AppError::ConfigError(anyhow::anyhow!(
            "{} is required but not set",
            key
        ))),
    }
}

/// `get_env` followed by `FromStr`, naming the variable on failure.
fn parse_env<T>(key: &str, default: Option<&str>, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, default, is_prod)?;
    raw.trim()
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for PersistenceBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(PersistenceBackend::Mongodb),
            "memory" => Ok(PersistenceBackend::Memory),
            _ => Err(format!("Invalid persistence backend: {}", s)),
        }
    }
}

impl std::str::FromStr for SwaggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" | "true" => Ok(SwaggerMode::Public),
            "disabled" | "false" => Ok(SwaggerMode::Disabled),
            _ => Err(format!("Invalid swagger mode: {}", s)),
        }
    }
}
