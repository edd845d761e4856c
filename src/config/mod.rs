use crate::scheduler::Policy;
use serde::Deserialize;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

/// Run-time configuration.
///
/// Everything here was a compile-time constant in earlier tooling; a TOML file
/// can override any field, and the positional CLI arguments override the
/// fields they name (host, object count, request budget).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub target: Target,
    #[serde(default)]
    pub workload: Workload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct General {
    /// Wall-clock length of the measurement phase.
    #[serde(default = "default_duration", with = "humantime_serde")]
    pub duration: Duration,
}

impl Default for General {
    fn default() -> Self {
        Self {
            duration: default_duration(),
        }
    }
}

fn default_duration() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Deserialize)]
pub struct Target {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    /// UDP port for preload (SET) traffic.
    #[serde(default = "default_udp_port")]
    pub write_port: u16,
    /// UDP port for measurement (GET) traffic.
    #[serde(default = "default_udp_port")]
    pub read_port: u16,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            host: default_host(),
            write_port: default_udp_port(),
            read_port: default_udp_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_udp_port() -> u16 {
    11212
}

#[derive(Debug, Clone, Deserialize)]
pub struct Workload {
    /// Number of synthetic objects to generate.
    #[serde(default = "default_objects")]
    pub objects: usize,
    /// Fixed key length in characters.
    #[serde(default = "default_key_length")]
    pub key_length: usize,
    /// Value size lower bound (inclusive).
    #[serde(default = "default_value_size_min")]
    pub value_size_min: usize,
    /// Value size upper bound (exclusive).
    #[serde(default = "default_value_size_max")]
    pub value_size_max: usize,
    /// Mean of the exponential per-object request-rate distribution
    /// (requests per second); inter-arrival time is 1000/rate milliseconds.
    #[serde(default = "default_mean_rate")]
    pub mean_rate: f64,
    /// Total request budget for the Zipfian and uniform policies.
    #[serde(default = "default_request_budget")]
    pub request_budget: u64,
    /// Delay between successive preload SETs; throttles the preload burst as a
    /// courtesy to the target, not a correctness requirement.
    #[serde(default = "default_preload_spacing", with = "humantime_serde")]
    pub preload_spacing: Duration,
}

impl Default for Workload {
    fn default() -> Self {
        Self {
            objects: default_objects(),
            key_length: default_key_length(),
            value_size_min: default_value_size_min(),
            value_size_max: default_value_size_max(),
            mean_rate: default_mean_rate(),
            request_budget: default_request_budget(),
            preload_spacing: default_preload_spacing(),
        }
    }
}

fn default_objects() -> usize {
    1000
}

fn default_key_length() -> usize {
    44
}

fn default_value_size_min() -> usize {
    200
}

fn default_value_size_max() -> usize {
    300
}

fn default_mean_rate() -> f64 {
    1.0
}

fn default_request_budget() -> u64 {
    10_000
}

fn default_preload_spacing() -> Duration {
    Duration::from_micros(500)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(String),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate the configuration for the selected scheduling policy.
    pub fn validate(&self, policy: &Policy) -> Result<(), ConfigError> {
        if self.workload.objects == 0 {
            return Err(ConfigError::Invalid(
                "object count must be at least 1".into(),
            ));
        }
        if self.workload.key_length == 0 {
            return Err(ConfigError::Invalid("key length must be at least 1".into()));
        }
        if self.workload.value_size_min >= self.workload.value_size_max {
            return Err(ConfigError::Invalid(format!(
                "value size range is empty: {}..{}",
                self.workload.value_size_min, self.workload.value_size_max
            )));
        }
        if self.workload.mean_rate <= 0.0 {
            return Err(ConfigError::Invalid(
                "mean inter-arrival rate must be positive".into(),
            ));
        }
        if self.general.duration.is_zero() {
            return Err(ConfigError::Invalid("duration must be positive".into()));
        }
        match policy {
            Policy::FixedRate => {}
            Policy::Zipf { alpha } => {
                if !alpha.is_finite() || *alpha < 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "zipf alpha must be a finite non-negative number, got {alpha}"
                    )));
                }
                self.validate_budgeted()?;
            }
            Policy::Uniform => self.validate_budgeted()?,
        }
        Ok(())
    }

    /// The budgeted policies draw from `objects - 1` ranks, so they need at
    /// least two objects and a non-zero budget.
    fn validate_budgeted(&self) -> Result<(), ConfigError> {
        if self.workload.objects < 2 {
            return Err(ConfigError::Invalid(
                "zipf/uniform policies need at least 2 objects".into(),
            ));
        }
        if self.workload.request_budget == 0 {
            return Err(ConfigError::Invalid(
                "request budget must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime_parse(&s).map_err(serde::de::Error::custom)
    }

    fn humantime_parse(s: &str) -> Result<Duration, String> {
        // Simple parser for durations like "30s", "10m", "500us"
        let s = s.trim();
        if s.is_empty() {
            return Err("empty duration".to_string());
        }

        let (num, suffix) = s.split_at(s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len()));

        let value: u64 = num.parse().map_err(|e| format!("invalid number: {e}"))?;

        let multiplier = match suffix.trim() {
            "s" | "sec" | "secs" => 1,
            "m" | "min" | "mins" => 60,
            "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
            "ms" => return Ok(Duration::from_millis(value)),
            "us" => return Ok(Duration::from_micros(value)),
            "ns" => return Ok(Duration::from_nanos(value)),
            "" => 1, // default to seconds
            other => return Err(format!("unknown time unit: {other}")),
        };

        Ok(Duration::from_secs(value * multiplier))
    }
}
