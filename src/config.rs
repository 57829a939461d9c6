use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// Delivery-fee and discount tuning.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct FeeConfig {
    /// Base delivery amount before the distance term, replaced by a
    /// restaurant's own non-zero flat fee when one is configured.
    #[serde(default = "default_base_fee")]
    pub base_fee: f64,

    /// Per-km rates by location classification.
    #[serde(default = "default_urban_rate")]
    pub urban_rate_per_km: f64,
    #[serde(default = "default_suburban_rate")]
    pub suburban_rate_per_km: f64,
    #[serde(default = "default_rural_rate")]
    pub rural_rate_per_km: f64,

    /// Cities treated as major urban centers for rate classification.
    #[serde(default = "default_urban_centers")]
    pub urban_centers: Vec<String>,

    /// Flat service fee added to every order total.
    #[serde(default = "default_service_fee")]
    pub service_fee: f64,

    /// Absolute floor for the computed delivery fee.
    #[serde(default = "default_minimum_fee")]
    pub minimum_fee: f64,

    /// Peak windows, "HH:MM-HH:MM". Neither window may wrap midnight.
    #[serde(default = "default_lunch_window")]
    pub peak_lunch_window: String,
    #[serde(default = "default_dinner_window")]
    pub peak_dinner_window: String,
    /// Percentage bump applied inside a peak window (20 = +20%).
    #[serde(default = "default_peak_percent")]
    pub peak_percent: f64,

    /// Demand surge: active orders / available approved drivers.
    /// Ratio >= tier1 applies tier1 multiplier, >= tier2 applies tier2.
    #[serde(default = "default_surge_tier1_ratio")]
    pub surge_tier1_ratio: f64,
    #[serde(default = "default_surge_tier1_multiplier")]
    pub surge_tier1_multiplier: f64,
    #[serde(default = "default_surge_tier2_ratio")]
    pub surge_tier2_ratio: f64,
    #[serde(default = "default_surge_tier2_multiplier")]
    pub surge_tier2_multiplier: f64,
    /// Applied when no approved driver is available at all. Deliberate
    /// policy: zero supply prices at the ceiling, never a division error.
    #[serde(default = "default_surge_max_multiplier")]
    pub surge_max_multiplier: f64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            base_fee: default_base_fee(),
            urban_rate_per_km: default_urban_rate(),
            suburban_rate_per_km: default_suburban_rate(),
            rural_rate_per_km: default_rural_rate(),
            urban_centers: default_urban_centers(),
            service_fee: default_service_fee(),
            minimum_fee: default_minimum_fee(),
            peak_lunch_window: default_lunch_window(),
            peak_dinner_window: default_dinner_window(),
            peak_percent: default_peak_percent(),
            surge_tier1_ratio: default_surge_tier1_ratio(),
            surge_tier1_multiplier: default_surge_tier1_multiplier(),
            surge_tier2_ratio: default_surge_tier2_ratio(),
            surge_tier2_multiplier: default_surge_tier2_multiplier(),
            surge_max_multiplier: default_surge_max_multiplier(),
        }
    }
}

/// Driver matching tuning.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Maximum driver distance from the restaurant to be a candidate (km).
    #[serde(default = "default_delivery_radius_km")]
    pub delivery_radius_km: f64,

    /// Maximum candidates returned by the ranking pass.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Seconds before a single-driver offer lapses and the next
    /// assign call may create a fresh one.
    #[serde(default = "default_offer_timeout_secs")]
    pub offer_timeout_secs: i64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            delivery_radius_km: default_delivery_radius_km(),
            max_candidates: default_max_candidates(),
            offer_timeout_secs: default_offer_timeout_secs(),
        }
    }
}

/// Delivery-confirmation code tuning.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct VerificationConfig {
    /// Seconds a generated code remains valid.
    #[serde(default = "default_code_ttl_secs")]
    pub code_ttl_secs: i64,

    /// Incorrect submissions allowed per code before the budget is spent.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_ttl_secs: default_code_ttl_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Driver-availability staleness monitor tuning.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    /// Sweep interval in seconds.
    #[serde(default = "default_monitor_interval_secs")]
    pub interval_secs: u64,

    /// Heartbeats older than this (or never recorded) flip the driver
    /// to unavailable.
    #[serde(default = "default_heartbeat_stale_secs")]
    pub heartbeat_stale_secs: i64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_monitor_interval_secs(),
            heartbeat_stale_secs: default_heartbeat_stale_secs(),
        }
    }
}

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Redis connection URL (notification rooms)
    pub redis_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Average travel speed per vehicle class, km/h, used for ETA.
    #[serde(default = "default_speed_bicycle_kmh")]
    pub speed_bicycle_kmh: f64,
    #[serde(default = "default_speed_motorcycle_kmh")]
    pub speed_motorcycle_kmh: f64,
    #[serde(default = "default_speed_car_kmh")]
    pub speed_car_kmh: f64,

    #[serde(default)]
    #[validate]
    pub fees: FeeConfig,

    #[serde(default)]
    #[validate]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    #[validate]
    pub verification: VerificationConfig,

    #[serde(default)]
    #[validate]
    pub monitor: MonitorConfig,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_event_channel_capacity() -> usize {
    1024
}
fn default_speed_bicycle_kmh() -> f64 {
    15.0
}
fn default_speed_motorcycle_kmh() -> f64 {
    30.0
}
fn default_speed_car_kmh() -> f64 {
    40.0
}
fn default_base_fee() -> f64 {
    15.0
}
fn default_urban_rate() -> f64 {
    20.0
}
fn default_suburban_rate() -> f64 {
    25.0
}
fn default_rural_rate() -> f64 {
    30.0
}
fn default_urban_centers() -> Vec<String> {
    ["addis ababa", "adama", "hawassa", "bahir dar", "dire dawa", "mekelle"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_service_fee() -> f64 {
    5.0
}
fn default_minimum_fee() -> f64 {
    25.0
}
fn default_lunch_window() -> String {
    "11:30-14:00".to_string()
}
fn default_dinner_window() -> String {
    "18:00-21:00".to_string()
}
fn default_peak_percent() -> f64 {
    20.0
}
fn default_surge_tier1_ratio() -> f64 {
    1.5
}
fn default_surge_tier1_multiplier() -> f64 {
    1.25
}
fn default_surge_tier2_ratio() -> f64 {
    3.0
}
fn default_surge_tier2_multiplier() -> f64 {
    1.5
}
fn default_surge_max_multiplier() -> f64 {
    2.0
}
fn default_delivery_radius_km() -> f64 {
    10.0
}
fn default_max_candidates() -> usize {
    5
}
fn default_offer_timeout_secs() -> i64 {
    60
}
fn default_code_ttl_secs() -> i64 {
    24 * 60 * 60
}
fn default_max_attempts() -> i32 {
    3
}
fn default_monitor_interval_secs() -> u64 {
    120
}
fn default_heartbeat_stale_secs() -> i64 {
    360
}

impl AppConfig {
    /// Minimal constructor used by tests and tooling.
    pub fn new(
        database_url: String,
        redis_url: String,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            redis_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            speed_bicycle_kmh: default_speed_bicycle_kmh(),
            speed_motorcycle_kmh: default_speed_motorcycle_kmh(),
            speed_car_kmh: default_speed_car_kmh(),
            fees: FeeConfig::default(),
            dispatch: DispatchConfig::default(),
            verification: VerificationConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
            || self.environment.eq_ignore_ascii_case("test")
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Loads configuration from `config/` files layered with `APP__`-prefixed
/// environment variables.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://dispatch.db?mode=rwc")?
        .set_default("redis_url", "redis://localhost:6379")?
        .set_default("host", "0.0.0.0")?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    Ok(app_config)
}

/// Initializes the tracing subscriber for the service.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("dispatch_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);
    let filter = EnvFilter::new(filter_directive);

    if json {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init();
    }
}
