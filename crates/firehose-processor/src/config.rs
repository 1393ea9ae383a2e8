// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::constants;
use crate::error::ConfigError;
use crate::size_guard::SizeLimits;
use crate::submission::RetryStrategy;

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorConfig {
    /// Hard response size limit of the platform, in bytes.
    pub transport_limit_bytes: usize,
    /// Fraction of `transport_limit_bytes` usable for payloads, when set.
    pub safety_margin: Option<f64>,
    pub max_unit_bytes: usize,
    pub max_batch_bytes: usize,
    pub submission_group_size: usize,
    pub max_submission_attempts: u32,
    /// Base pause between resubmission attempts; 0 retries immediately.
    pub retry_backoff_ms: u64,
    /// Overrides the regional Firehose endpoint, e.g. for a local stand-in.
    pub endpoint: Option<String>,
    pub region: String,
    pub request_timeout_secs: u64,
    pub https_proxy: Option<String>,
    pub log_level: String,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        ProcessorConfig {
            transport_limit_bytes: constants::DEFAULT_TRANSPORT_LIMIT_BYTES,
            safety_margin: None,
            max_unit_bytes: constants::DEFAULT_MAX_UNIT_BYTES,
            max_batch_bytes: constants::DEFAULT_MAX_BATCH_BYTES,
            submission_group_size: constants::DEFAULT_SUBMISSION_GROUP_SIZE,
            max_submission_attempts: constants::DEFAULT_MAX_SUBMISSION_ATTEMPTS,
            retry_backoff_ms: 0,
            endpoint: None,
            region: constants::DEFAULT_REGION.to_string(),
            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT_SECS,
            https_proxy: None,
            log_level: "info".to_string(),
        }
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        None => Ok(None),
    }
}

impl ProcessorConfig {
    /// Reads the configuration from the process environment and validates it.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Builds a validated configuration from `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());
        let defaults = ProcessorConfig::default();

        let transport_limit_bytes = parse_var(&lookup, "FIREHOSE_TRUE_LIMIT_BYTES")?
            .unwrap_or(defaults.transport_limit_bytes);
        let safety_margin: Option<f64> = parse_var(&lookup, "FIREHOSE_SAFETY_MARGIN")?;
        let max_batch_bytes = match parse_var(&lookup, "FIREHOSE_MAX_BATCH_BYTES")? {
            Some(max_batch_bytes) => max_batch_bytes,
            None => match safety_margin {
                Some(margin) => (transport_limit_bytes as f64 * margin).floor() as usize,
                None => defaults.max_batch_bytes,
            },
        };
        let max_unit_bytes =
            parse_var(&lookup, "FIREHOSE_MAX_UNIT_BYTES")?.unwrap_or(max_batch_bytes);

        let config = ProcessorConfig {
            transport_limit_bytes,
            safety_margin,
            max_unit_bytes,
            max_batch_bytes,
            submission_group_size: parse_var(&lookup, "FIREHOSE_SUBMISSION_GROUP_SIZE")?
                .unwrap_or(defaults.submission_group_size),
            max_submission_attempts: parse_var(&lookup, "FIREHOSE_MAX_SUBMISSION_ATTEMPTS")?
                .unwrap_or(defaults.max_submission_attempts),
            retry_backoff_ms: parse_var(&lookup, "FIREHOSE_RETRY_BACKOFF_MS")?
                .unwrap_or(defaults.retry_backoff_ms),
            endpoint: lookup("FIREHOSE_ENDPOINT"),
            region: lookup("AWS_REGION").unwrap_or(defaults.region),
            request_timeout_secs: parse_var(&lookup, "FIREHOSE_REQUEST_TIMEOUT_SECS")?
                .unwrap_or(defaults.request_timeout_secs),
            https_proxy: lookup("HTTPS_PROXY"),
            log_level: lookup("LOG_LEVEL")
                .map(|level| level.trim().to_lowercase())
                .unwrap_or(defaults.log_level),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::InvalidConfig(message));

        if self.transport_limit_bytes == 0 || self.max_unit_bytes == 0 || self.max_batch_bytes == 0
        {
            return invalid("size limits must be greater than zero".to_string());
        }
        if self.max_unit_bytes > self.transport_limit_bytes {
            return invalid(format!(
                "max unit size {} exceeds the transport limit {}",
                self.max_unit_bytes, self.transport_limit_bytes
            ));
        }
        if self.max_batch_bytes > self.transport_limit_bytes {
            return invalid(format!(
                "max batch size {} exceeds the transport limit {}",
                self.max_batch_bytes, self.transport_limit_bytes
            ));
        }
        // A unit between the two ceilings would be deferred by every invocation.
        if self.max_unit_bytes > self.max_batch_bytes {
            return invalid(format!(
                "max unit size {} exceeds the max batch size {}",
                self.max_unit_bytes, self.max_batch_bytes
            ));
        }
        if let Some(margin) = self.safety_margin {
            if !(margin > 0.0 && margin <= 1.0) {
                return invalid(format!("safety margin {margin} must be in (0, 1]"));
            }
        }
        if self.submission_group_size == 0
            || self.submission_group_size > constants::MAX_TRANSPORT_GROUP_SIZE
        {
            return invalid(format!(
                "submission group size {} must be between 1 and {}",
                self.submission_group_size,
                constants::MAX_TRANSPORT_GROUP_SIZE
            ));
        }
        if self.max_submission_attempts == 0 {
            return invalid("at least one submission attempt is required".to_string());
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return invalid(format!("unknown log level '{}'", self.log_level));
        }
        Ok(())
    }

    #[must_use]
    pub fn size_limits(&self) -> SizeLimits {
        SizeLimits {
            max_unit_bytes: self.max_unit_bytes,
            max_batch_bytes: self.max_batch_bytes,
        }
    }

    #[must_use]
    pub fn retry_strategy(&self) -> RetryStrategy {
        if self.retry_backoff_ms == 0 {
            RetryStrategy::Immediate(self.max_submission_attempts)
        } else {
            RetryStrategy::LinearBackoff(self.max_submission_attempts, self.retry_backoff_ms)
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://firehose.{}.amazonaws.com", self.region))
    }
}
