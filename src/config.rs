//! Configuration management for Gatekeeper.
//!
//! Configuration comes from an optional YAML file, then environment
//! overrides. The budget variables (`ADDRESS_LIMIT`, `CREDENTIAL_LIMIT`,
//! `WINDOW_SECONDS`) never fail startup: a missing or invalid value leaves the
//! current setting in place.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{GatekeeperError, Result};
use crate::ratelimit::{
    BudgetPolicies, BudgetPolicy, FallbackPolicy, RouteCostTable, DEFAULT_KEY_PREFIX, MAX_WINDOW_SECONDS,
};

const DEFAULT_ADDRESS_LIMIT: u64 = 100;
const DEFAULT_CREDENTIAL_LIMIT: u64 = 200;
const DEFAULT_WINDOW_SECONDS: u64 = 3600;

/// Main configuration for the Gatekeeper service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatekeeperConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Per-class budgets
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Counter store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Cost of each rate limited route
    #[serde(default = "RouteCostTable::standard")]
    pub routes: RouteCostTable,
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            limits: LimitsConfig::default(),
            store: StoreConfig::default(),
            routes: RouteCostTable::standard(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Take the client address from the first `X-Forwarded-For` hop.
    /// Only enable behind a proxy that sets the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            trust_forwarded_for: false,
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

/// Budget configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Budget per window for anonymous clients
    #[serde(default = "default_address_limit")]
    pub address_limit: u64,

    /// Budget per window for credential-bearing clients
    #[serde(default = "default_credential_limit")]
    pub credential_limit: u64,

    /// Window length shared by both budgets
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            address_limit: default_address_limit(),
            credential_limit: default_credential_limit(),
            window_seconds: default_window_seconds(),
        }
    }
}

fn default_address_limit() -> u64 {
    DEFAULT_ADDRESS_LIMIT
}

fn default_credential_limit() -> u64 {
    DEFAULT_CREDENTIAL_LIMIT
}

fn default_window_seconds() -> u64 {
    DEFAULT_WINDOW_SECONDS
}

impl LimitsConfig {
    /// Build the budget policies, replacing non-positive values by defaults
    /// and capping the window at [`MAX_WINDOW_SECONDS`].
    pub fn policies(&self) -> BudgetPolicies {
        let window_seconds = capped_window(positive_or(
            "window_seconds",
            self.window_seconds,
            DEFAULT_WINDOW_SECONDS,
        ));
        BudgetPolicies::new(
            BudgetPolicy {
                limit: positive_or("address_limit", self.address_limit, DEFAULT_ADDRESS_LIMIT),
                window_seconds,
            },
            BudgetPolicy {
                limit: positive_or("credential_limit", self.credential_limit, DEFAULT_CREDENTIAL_LIMIT),
                window_seconds,
            },
        )
    }
}

fn positive_or(name: &str, value: u64, default: u64) -> u64 {
    if value == 0 {
        warn!(setting = name, default, "Non-positive value configured, using default");
        default
    } else {
        value
    }
}

fn capped_window(window_seconds: u64) -> u64 {
    if window_seconds > MAX_WINDOW_SECONDS {
        warn!(
            window_seconds,
            max = MAX_WINDOW_SECONDS,
            "Window too long, capping it"
        );
        MAX_WINDOW_SECONDS
    } else {
        window_seconds
    }
}

/// Which counter store to run against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local store; budgets are not shared between instances
    #[default]
    Memory,
    /// Redis shared by every instance
    Redis,
}

/// Counter store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Prefix of every counter key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Behaviour when the store cannot be reached
    #[serde(default)]
    pub fallback: FallbackPolicy,

    /// Bound on one store round trip in milliseconds
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// How often the in-process store drops expired windows
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            redis_url: default_redis_url(),
            key_prefix: default_key_prefix(),
            fallback: FallbackPolicy::default(),
            call_timeout_ms: default_call_timeout_ms(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl StoreConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms.max(1))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1/".to_string()
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

fn default_call_timeout_ms() -> u64 {
    250
}

fn default_sweep_interval() -> u64 {
    60
}

impl GatekeeperConfig {
    /// Load configuration from a file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents).map_err(|e| GatekeeperError::Config(e.to_string()))
    }

    /// Load from an optional file, then apply process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                info!(path = %path.display(), "Loading configuration file");
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env(::config::Environment::default());
        Ok(config)
    }

    /// Apply overrides from an environment source.
    ///
    /// Recognised: `ADDRESS_LIMIT`, `CREDENTIAL_LIMIT`, `WINDOW_SECONDS`,
    /// `REDIS_URL`, `PORT`.
    pub fn apply_env(&mut self, source: ::config::Environment) {
        let settings = match ::config::Config::builder().add_source(source).build() {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "Could not read environment, keeping configured values");
                return;
            }
        };

        if let Some(limit) = positive_setting(&settings, "address_limit") {
            self.limits.address_limit = limit;
        }
        if let Some(limit) = positive_setting(&settings, "credential_limit") {
            self.limits.credential_limit = limit;
        }
        if let Some(window) = positive_setting(&settings, "window_seconds") {
            self.limits.window_seconds = window;
        }
        if let Ok(url) = settings.get_string("redis_url") {
            self.store.redis_url = url;
        }
        if let Ok(raw) = settings.get_string("port") {
            match raw.trim().parse::<u16>() {
                Ok(port) => self.server.listen_addr.set_port(port),
                Err(_) => warn!(value = %raw, "Ignoring invalid PORT"),
            }
        }
    }
}

/// A positive integer setting, or `None` (with a warning when present but invalid).
fn positive_setting(settings: &::config::Config, key: &str) -> Option<u64> {
    let raw = settings.get_string(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            warn!(
                setting = %key.to_uppercase(),
                value = %raw,
                "Ignoring invalid value, expected a positive integer"
            );
            None
        }
    }
}
