use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_ORDER_NUMBER_PREFIX: &str = "AMP";
const DEFAULT_BUSINESS_UTC_OFFSET_HOURS: i32 = 7;
const DEFAULT_SHIPMENT_CLAIM_TTL_SECS: u64 = 300;
const SANDBOX_COURIER_BASE_URL: &str = "https://tdev.kiriminaja.com";
pub const PRODUCTION_COURIER_BASE_URL: &str = "https://client.kiriminaja.com";
const DEV_DEFAULT_JWT_SECRET: &str = "development_only_jwt_secret_change_me_before_deploying";

/// Connection settings for the courier aggregator API
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    #[validate(url)]
    #[serde(default = "default_courier_base_url")]
    pub base_url: String,

    /// Bearer token issued by the aggregator
    #[validate(length(min = 1, message = "courier.api_key is required"))]
    pub api_key: String,

    /// Per-request timeout
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_courier_timeout_secs")]
    pub timeout_secs: u64,
}

impl CourierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Pickup origin sent with every booking. Process-wide, never persisted per order.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ShipperConfig {
    #[validate(length(min = 1, message = "shipper.name is required"))]
    pub name: String,
    #[validate(length(min = 6, message = "shipper.phone is required"))]
    pub phone: String,
    /// Courier district (kecamatan) id of the pickup address
    #[validate(range(min = 1))]
    pub district_id: i64,
    /// Courier sub-district (kelurahan) id of the pickup address
    #[validate(range(min = 1))]
    pub sub_district_id: i64,
    #[validate(length(min = 1, message = "shipper.address is required"))]
    pub address: String,
    #[validate(length(min = 5, max = 5, message = "shipper.zip_code must have 5 digits"))]
    pub zip_code: String,
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret key used to verify bearer tokens
    #[validate(length(min = 32), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    /// Prefix of generated order numbers
    #[serde(default = "default_order_number_prefix")]
    #[validate(length(min = 1, max = 8))]
    pub order_number_prefix: String,

    /// UTC offset of the business timezone, used for default pickup schedules
    #[serde(default = "default_business_utc_offset_hours")]
    #[validate(range(min = -12, max = 14))]
    pub business_utc_offset_hours: i32,

    /// How long a shipment booking claim blocks concurrent bookings
    #[serde(default = "default_shipment_claim_ttl_secs")]
    #[validate(range(min = 30))]
    pub shipment_claim_ttl_secs: u64,

    /// Shared secret expected in `x-webhook-secret` on courier callbacks
    #[serde(default)]
    pub webhook_secret: Option<String>,

    #[validate]
    pub courier: CourierConfig,

    #[validate]
    pub shipper: ShipperConfig,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        matches!(
            self.environment.to_ascii_lowercase().as_str(),
            "development" | "test"
        )
    }

    pub fn shipment_claim_ttl(&self) -> Duration {
        Duration::from_secs(self.shipment_claim_ttl_secs)
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.is_development() && self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
            let mut err = ValidationError::new("jwt_secret_default_dev");
            err.message = Some(
                "The bundled development JWT secret must not be used outside development. Set APP__JWT_SECRET."
                    .into(),
            );
            errors.add("jwt_secret", err);
        }

        if self.is_production() && self.courier.base_url != PRODUCTION_COURIER_BASE_URL {
            let mut err = ValidationError::new("courier_sandbox_in_production");
            err.message = Some(
                format!(
                    "courier.base_url must be {} in production",
                    PRODUCTION_COURIER_BASE_URL
                )
                .into(),
            );
            errors.add("courier", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_order_number_prefix() -> String {
    DEFAULT_ORDER_NUMBER_PREFIX.to_string()
}

fn default_business_utc_offset_hours() -> i32 {
    DEFAULT_BUSINESS_UTC_OFFSET_HOURS
}

fn default_shipment_claim_ttl_secs() -> u64 {
    DEFAULT_SHIPMENT_CLAIM_TTL_SECS
}

fn default_courier_base_url() -> String {
    SANDBOX_COURIER_BASE_URL.to_string()
}

fn default_courier_timeout_secs() -> u64 {
    30
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    let trimmed = secret.trim();

    if let Some(first) = trimmed.chars().next() {
        if trimmed.chars().all(|c| c == first) {
            let mut err = ValidationError::new("jwt_secret");
            err.message = Some("JWT secret cannot be a repeated character sequence".into());
            return Err(err);
        }
    }

    let unique_chars: std::collections::HashSet<char> = trimmed.chars().collect();
    if unique_chars.len() < 10 {
        let mut err = ValidationError::new("jwt_secret");
        err.message = Some("JWT secret must have at least 10 unique characters".into());
        return Err(err);
    }

    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| format!("courier_orders_api={},tower_http=debug", level));

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("APP_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://courier_orders.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured".into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;
    validate_config(&app_config)?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

/// Runs field validation and cross-field checks. Shipper and courier sections fail fast here.
pub fn validate_config(app_config: &AppConfig) -> Result<(), AppConfigError> {
    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })
}
