use std::time::Duration;

use chrono::Duration as ChronoDuration;

use crate::models::Credentials;
use crate::signer::SignatureAlgorithm;

// Service defaults. Override through ClientConfig or the ASSEMBLY_* env vars.
pub const DEFAULT_ENDPOINT: &str = "https://api2.transloadit.com";
pub const ASSEMBLIES_PATH: &str = "assemblies";
pub const UA: &str = "assembly-client";

pub const DEFAULT_MAX_REFRESH: u32 = 100;
pub const DEFAULT_REFRESH_DELAY_MS: u64 = 2_000;
pub const DEFAULT_SIGNATURE_TTL_HOURS: i64 = 24;

pub const ENV_AUTH_KEY: &str = "ASSEMBLY_AUTH_KEY";
pub const ENV_AUTH_SECRET: &str = "ASSEMBLY_AUTH_SECRET";
pub const ENV_ENDPOINT: &str = "ASSEMBLY_ENDPOINT";
pub const ENV_MAX_REFRESH: &str = "ASSEMBLY_MAX_REFRESH";
pub const ENV_REFRESH_DELAY_MS: &str = "ASSEMBLY_REFRESH_DELAY_MS";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    /// Status fetches allowed before the run fails with `MaxRefresh`.
    pub max_refresh: u32,
    pub refresh_delay: Duration,
    pub sign: bool,
    pub algorithm: SignatureAlgorithm,
    /// How far ahead of submission `auth.expires` is placed.
    pub signature_ttl: ChronoDuration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_refresh: DEFAULT_MAX_REFRESH,
            refresh_delay: Duration::from_millis(DEFAULT_REFRESH_DELAY_MS),
            sign: true,
            algorithm: SignatureAlgorithm::default(),
            signature_ttl: ChronoDuration::hours(DEFAULT_SIGNATURE_TTL_HOURS),
        }
    }
}

impl ClientConfig {
    /// Defaults, overridden by any `ASSEMBLY_*` variables that are set and parse.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|e| !e.is_empty()) {
            config.endpoint = endpoint;
        }
        if let Some(max) = lookup(ENV_MAX_REFRESH).and_then(|v| v.parse().ok()) {
            config.max_refresh = max;
        }
        if let Some(ms) = lookup(ENV_REFRESH_DELAY_MS).and_then(|v| v.parse().ok()) {
            config.refresh_delay = Duration::from_millis(ms);
        }
        config
    }
}

impl Credentials {
    /// Reads `ASSEMBLY_AUTH_KEY` and `ASSEMBLY_AUTH_SECRET`. The secret may be unset for unsigned use.
    pub fn from_env() -> Option<Self> {
        let key = std::env::var(ENV_AUTH_KEY).ok()?;
        let secret = std::env::var(ENV_AUTH_SECRET).unwrap_or_default();
        Some(Self::new(key, secret))
    }
}
