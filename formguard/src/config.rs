// formguard/src/config.rs
//
// Runtime configuration. Everything tunable comes from FORMGUARD_* environment
// variables with the defaults below; CLI flags override on top.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const ENV_WINDOW_MS:          &str = "FORMGUARD_RATE_LIMIT_WINDOW_MS";
pub const ENV_MAX_REQUESTS:       &str = "FORMGUARD_RATE_LIMIT_MAX_REQUESTS";
pub const ENV_MIN_COMPLETION_MS:  &str = "FORMGUARD_MIN_COMPLETION_MS";
pub const ENV_MAX_COMPLETION_MS:  &str = "FORMGUARD_MAX_COMPLETION_MS";
pub const ENV_HOUSEKEEPING_SECS:  &str = "FORMGUARD_HOUSEKEEPING_INTERVAL_SECS";

pub const DEFAULT_WINDOW_MS:         u64 = 60_000;
pub const DEFAULT_MAX_REQUESTS:      u32 = 5;
pub const DEFAULT_MIN_COMPLETION_MS: i64 = 3_000;
pub const DEFAULT_MAX_COMPLETION_MS: i64 = 3_600_000;
pub const DEFAULT_HOUSEKEEPING_SECS: u64 = 60;

pub const MAX_WINDOW_MS: u64 = i64::MAX as u64;

// ── Component configs ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub window_ms:    u64,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { window_ms: DEFAULT_WINDOW_MS, max_requests: DEFAULT_MAX_REQUESTS }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Anything faster than this is not a human filling in a form.
    pub min_completion_ms: i64,
    /// Anything slower than this is a stale or replayed session.
    pub max_completion_ms: i64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_completion_ms: DEFAULT_MIN_COMPLETION_MS,
            max_completion_ms: DEFAULT_MAX_COMPLETION_MS,
        }
    }
}

// ── Top-level config ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub rate_limit:             RateLimitConfig,
    pub classifier:             ClassifierConfig,
    pub housekeeping_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rate_limit:                 RateLimitConfig::default(),
            classifier:                 ClassifierConfig::default(),
            housekeeping_interval_secs: DEFAULT_HOUSEKEEPING_SECS,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source. Unset or blank variables keep
    /// their defaults; malformed ones are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = read_u64(&lookup, ENV_WINDOW_MS)? {
            cfg.rate_limit.window_ms = v;
        }
        if let Some(v) = read_u64(&lookup, ENV_MAX_REQUESTS)? {
            cfg.rate_limit.max_requests = narrow(v, ENV_MAX_REQUESTS, u32::MAX as u64)?;
        }
        if let Some(v) = read_u64(&lookup, ENV_MIN_COMPLETION_MS)? {
            cfg.classifier.min_completion_ms = narrow(v, ENV_MIN_COMPLETION_MS, i64::MAX as u64)?;
        }
        if let Some(v) = read_u64(&lookup, ENV_MAX_COMPLETION_MS)? {
            cfg.classifier.max_completion_ms = narrow(v, ENV_MAX_COMPLETION_MS, i64::MAX as u64)?;
        }
        if let Some(v) = read_u64(&lookup, ENV_HOUSEKEEPING_SECS)? {
            cfg.housekeeping_interval_secs = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.window_ms == 0 {
            return Err(ConfigError::Zero { var: ENV_WINDOW_MS });
        }
        // Reset times are i64 epoch ms; a wider window would wrap negative.
        if self.rate_limit.window_ms > MAX_WINDOW_MS {
            return Err(ConfigError::OutOfRange {
                var:   ENV_WINDOW_MS,
                value: self.rate_limit.window_ms,
                max:   MAX_WINDOW_MS,
            });
        }
        if self.rate_limit.max_requests == 0 {
            return Err(ConfigError::Zero { var: ENV_MAX_REQUESTS });
        }
        if self.housekeeping_interval_secs == 0 {
            return Err(ConfigError::Zero { var: ENV_HOUSEKEEPING_SECS });
        }
        let (min, max) = (self.classifier.min_completion_ms, self.classifier.max_completion_ms);
        if min >= max {
            return Err(ConfigError::CompletionBounds { min: min as u64, max: max as u64 });
        }
        Ok(())
    }
}

/// Out-of-range values are an error, never clamped.
fn narrow<T: TryFrom<u64>>(v: u64, var: &'static str, max: u64) -> Result<T, ConfigError> {
    T::try_from(v).map_err(|_| ConfigError::OutOfRange { var, value: v, max })
}

fn read_u64<F>(lookup: &F, var: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::NotANumber { var, value: raw }),
    }
}
