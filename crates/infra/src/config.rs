//! Engine configuration loading.
//!
//! Values come from `BLOOMLEDGER_*` environment variables. Unset variables use the
//! defaults; unparseable ones are logged and also fall back to the defaults.

use chrono::{FixedOffset, Offset, Utc};
use core::str::FromStr;
use serde::{Deserialize, Serialize};

pub const ENV_MAX_STOCK_RETRIES: &str = "BLOOMLEDGER_MAX_STOCK_RETRIES";
pub const ENV_MISSING_ITEM_POLICY: &str = "BLOOMLEDGER_MISSING_ITEM_POLICY";
pub const ENV_PARTIAL_FAILURE_POLICY: &str = "BLOOMLEDGER_PARTIAL_FAILURE_POLICY";
pub const ENV_UTC_OFFSET_MINUTES: &str = "BLOOMLEDGER_UTC_OFFSET_MINUTES";

/// What order placement does with a line whose item has no stock row at the branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingItemPolicy {
    /// Skip the line and report it in the placement receipt.
    #[default]
    Skip,
    /// Fail the whole placement before anything is written.
    Reject,
}

impl FromStr for MissingItemPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown missing-item policy '{other}'")),
        }
    }
}

/// What order placement does when a line fails after earlier lines were applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialFailurePolicy {
    /// Restore the applied lines with compensating stock-ins and cancel the order.
    #[default]
    Compensate,
    /// Leave applied lines and the order as they are; the caller gets the outcomes.
    Preserve,
}

impl FromStr for PartialFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compensate" => Ok(Self::Compensate),
            "preserve" => Ok(Self::Preserve),
            other => Err(format!("unknown partial-failure policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Retries after the first attempt when a stock commit hits a version conflict.
    pub max_stock_retries: u32,
    pub missing_item_policy: MissingItemPolicy,
    pub partial_failure_policy: PartialFailurePolicy,
    /// Offset of the chain's business day from UTC, in minutes (540 = UTC+09:00).
    pub utc_offset_minutes: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_stock_retries: 5,
            missing_item_policy: MissingItemPolicy::Skip,
            partial_failure_policy: PartialFailurePolicy::Compensate,
            utc_offset_minutes: 540,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let mut config = Self {
            max_stock_retries: read(&lookup, ENV_MAX_STOCK_RETRIES, defaults.max_stock_retries),
            missing_item_policy: read(&lookup, ENV_MISSING_ITEM_POLICY, defaults.missing_item_policy),
            partial_failure_policy: read(
                &lookup,
                ENV_PARTIAL_FAILURE_POLICY,
                defaults.partial_failure_policy,
            ),
            utc_offset_minutes: read(&lookup, ENV_UTC_OFFSET_MINUTES, defaults.utc_offset_minutes),
        };

        if offset_from_minutes(config.utc_offset_minutes).is_none() {
            tracing::warn!(
                var = ENV_UTC_OFFSET_MINUTES,
                value = config.utc_offset_minutes,
                "utc offset out of range; using default"
            );
            config.utc_offset_minutes = defaults.utc_offset_minutes;
        }

        config
    }

    /// The business-day offset. Out-of-range values resolve to UTC+09:00.
    pub fn business_offset(&self) -> FixedOffset {
        offset_from_minutes(self.utc_offset_minutes)
            .or_else(|| offset_from_minutes(Self::default().utc_offset_minutes))
            .unwrap_or_else(|| Utc.fix())
    }

    pub fn with_partial_failure_policy(mut self, policy: PartialFailurePolicy) -> Self {
        self.partial_failure_policy = policy;
        self
    }

    pub fn with_missing_item_policy(mut self, policy: MissingItemPolicy) -> Self {
        self.missing_item_policy = policy;
        self
    }

    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }
}

fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    minutes.checked_mul(60).and_then(FixedOffset::east_opt)
}

fn read<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: FromStr + core::fmt::Debug,
    T::Err: core::fmt::Display,
{
    match lookup(name) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(var = name, value = %raw, error = %e, ?default, "invalid config value; using default");
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        assert_eq!(EngineConfig::from_lookup(lookup(&[])), EngineConfig::default());
    }

    #[test]
    fn reads_every_variable() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_MAX_STOCK_RETRIES, "2"),
            (ENV_MISSING_ITEM_POLICY, "Reject"),
            (ENV_PARTIAL_FAILURE_POLICY, "preserve"),
            (ENV_UTC_OFFSET_MINUTES, "-300"),
        ]));
        assert_eq!(config.max_stock_retries, 2);
        assert_eq!(config.missing_item_policy, MissingItemPolicy::Reject);
        assert_eq!(config.partial_failure_policy, PartialFailurePolicy::Preserve);
        assert_eq!(config.business_offset().local_minus_utc(), -300 * 60);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_MAX_STOCK_RETRIES, "many"),
            (ENV_MISSING_ITEM_POLICY, "ignore"),
            (ENV_UTC_OFFSET_MINUTES, "100000"),
        ]));
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.business_offset().local_minus_utc(), 9 * 3600);
    }
}
