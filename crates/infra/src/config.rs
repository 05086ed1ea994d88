//! Runtime configuration read from the environment.
//!
//! | Variable                         | Default        |
//! |----------------------------------|----------------|
//! | `STOREFRONT_CONFLICT_RETRIES`    | `3`            |
//! | `STOREFRONT_ORDER_NUMBER_PREFIX` | none           |
//! | `STOREFRONT_FROZEN_TIME`         | wall clock     |
//!
//! `STOREFRONT_FROZEN_TIME` takes an RFC 3339 instant and pins every
//! service clock to it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use storefront_core::{Clock, FixedClock, SystemClock};
use storefront_ordering::{MonthlyNumberGenerator, NumberGenerator};

pub const CONFLICT_RETRIES_VAR: &str = "STOREFRONT_CONFLICT_RETRIES";
pub const ORDER_NUMBER_PREFIX_VAR: &str = "STOREFRONT_ORDER_NUMBER_PREFIX";
pub const FROZEN_TIME_VAR: &str = "STOREFRONT_FROZEN_TIME";

pub const DEFAULT_CONFLICT_RETRIES: u32 = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Extra attempts after an optimistic concurrency conflict.
    pub conflict_retries: u32,
    pub order_number_prefix: Option<String>,
    pub frozen_time: Option<DateTime<Utc>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
            order_number_prefix: None,
            frozen_time: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. Unset and blank values take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let conflict_retries = match get(CONFLICT_RETRIES_VAR) {
            Some(raw) => raw.trim().parse::<u32>().map_err(|e| ConfigError::Invalid {
                key: CONFLICT_RETRIES_VAR,
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => {
                tracing::debug!(
                    default = DEFAULT_CONFLICT_RETRIES,
                    "{CONFLICT_RETRIES_VAR} not set; using default"
                );
                DEFAULT_CONFLICT_RETRIES
            }
        };

        let frozen_time = get(FROZEN_TIME_VAR)
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw.trim())
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| ConfigError::Invalid {
                        key: FROZEN_TIME_VAR,
                        value: raw.clone(),
                        reason: e.to_string(),
                    })
            })
            .transpose()?;

        if let Some(at) = frozen_time {
            tracing::warn!(%at, "{FROZEN_TIME_VAR} set; service clock is frozen");
        }

        Ok(Self {
            conflict_retries,
            order_number_prefix: get(ORDER_NUMBER_PREFIX_VAR),
            frozen_time,
        })
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        match self.frozen_time {
            Some(at) => Arc::new(FixedClock::at(at)),
            None => Arc::new(SystemClock),
        }
    }

    pub fn number_generator(&self) -> Arc<dyn NumberGenerator> {
        match &self.order_number_prefix {
            Some(prefix) => Arc::new(MonthlyNumberGenerator::with_prefix(prefix.clone())),
            None => Arc::new(MonthlyNumberGenerator::new()),
        }
    }
}
