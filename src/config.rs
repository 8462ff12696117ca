use std::collections::BTreeSet;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, SiftError};
use crate::health::{HealthCheckerConfig, ProbeConfig};
use crate::models::{CheckPolicy, SelectionPolicy};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Reachability probe settings
    pub probe: ProbeConfig,
    /// Worker pool settings
    pub checker: HealthCheckerConfig,
    /// Admission toggles for the health-check pass
    pub check_policy: CheckPolicy,
    /// Tiered selection tables and quotas
    pub selection: SelectionPolicy,
    /// Minimum counts gating output
    pub thresholds: ThresholdConfig,
    /// Input and output locations
    pub io: IoConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdConfig {
    /// Below this many alive descriptors nothing is written
    pub min_alive_count: usize,
    /// Below this many selected descriptors the restrictive list is not written
    pub min_restrictive_count: usize,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min_alive_count: 10,
            min_restrictive_count: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoConfig {
    /// Descriptor list to check (plain or base64 subscription payload)
    pub input: PathBuf,
    /// Destination for the full alive set
    pub alive_output: PathBuf,
    /// Destination for the restrictive set
    pub restrictive_output: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let constrained = get_env_or("GITHUB_ACTIONS", "false") == "true";
        let default_workers = if constrained { "20" } else { "50" };

        Ok(Config {
            probe: ProbeConfig {
                connect_timeout: Duration::from_secs(parse_env_or("CHECK_TIMEOUT_SECS", "3")?),
                tcp_attempts: parse_env_or("CHECK_TCP_RETRIES", "2")?,
                retry_backoff: Duration::from_millis(parse_env_or(
                    "CHECK_RETRY_BACKOFF_MS",
                    "100",
                )?),
                ping_enabled: parse_bool_env_or("CHECK_PING_ENABLED", true)?,
                ping_timeout: Duration::from_secs(parse_env_or("CHECK_PING_TIMEOUT_SECS", "2")?),
            },
            checker: HealthCheckerConfig {
                workers: parse_env_or("CHECK_WORKERS", default_workers)?,
                progress_every: parse_env_or("CHECK_PROGRESS_EVERY", "50")?,
            },
            check_policy: CheckPolicy {
                strict_parse: parse_bool_env_or("CHECK_STRICT_PARSE", false)?,
                tcp_only: parse_bool_env_or("CHECK_TCP_ONLY", false)?,
            },
            selection: load_selection_policy()?,
            thresholds: ThresholdConfig {
                min_alive_count: parse_env_or("MIN_ALIVE_COUNT", "10")?,
                min_restrictive_count: parse_env_or("MIN_RESTRICTIVE_COUNT", "1")?,
            },
            io: IoConfig {
                input: PathBuf::from(get_env_or("SIFT_INPUT", "configs.txt")),
                alive_output: PathBuf::from(get_env_or("SIFT_ALIVE_OUTPUT", "sub.txt")),
                restrictive_output: PathBuf::from(get_env_or(
                    "SIFT_RESTRICTIVE_OUTPUT",
                    "restrictive.txt",
                )),
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }
}

/// Built-in tables, optionally replaced by a JSON policy file, then
/// overridden field by field from the environment
fn load_selection_policy() -> Result<SelectionPolicy> {
    let path = get_env_or("SIFT_POLICY_FILE", "");
    let mut policy = if path.trim().is_empty() {
        SelectionPolicy::default()
    } else {
        let raw = std::fs::read_to_string(path.trim())?;
        serde_json::from_str(&raw)?
    };

    if let Some(ports) = parse_list_env::<u16>("SELECT_GOOD_PORTS")? {
        policy.good_ports = ports;
    }
    if let Some(ports) = parse_list_env::<u16>("SELECT_SENSITIVE_PORTS")? {
        policy.sensitive_ports = ports;
    }
    if let Some(countries) = parse_list_env::<String>("SELECT_HIGH_PRIORITY")? {
        policy.high_priority_countries = countries;
    }

    let quotas = &mut policy.quotas;
    quotas.sensitive_per_country = parse_env_or(
        "SELECT_SENSITIVE_QUOTA",
        &quotas.sensitive_per_country.to_string(),
    )?;
    quotas.risky_high_priority = parse_env_or(
        "SELECT_RISKY_QUOTA_HIGH",
        &quotas.risky_high_priority.to_string(),
    )?;
    quotas.risky_other =
        parse_env_or("SELECT_RISKY_QUOTA_OTHER", &quotas.risky_other.to_string())?;

    Ok(policy.normalized())
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env_or<T: FromStr>(key: &str, default: &str) -> Result<T> {
    let raw = get_env_or(key, default);
    raw.trim()
        .parse()
        .map_err(|_| SiftError::InvalidConfig(format!("{} has an invalid value: {:?}", key, raw)))
}

fn parse_bool_env_or(key: &str, default: bool) -> Result<bool> {
    let Ok(raw) = env::var(key) else {
        return Ok(default);
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SiftError::InvalidConfig(format!(
            "{} must be a boolean, got {:?}",
            key, raw
        ))),
    }
}

/// Comma-separated set; `None` when the variable is unset or blank
fn parse_list_env<T: FromStr + Ord>(key: &str) -> Result<Option<BTreeSet<T>>> {
    let raw = get_env_or(key, "");
    if raw.trim().is_empty() {
        return Ok(None);
    }

    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|item| {
            item.parse().map_err(|_| {
                SiftError::InvalidConfig(format!("{} has an invalid entry: {:?}", key, item))
            })
        })
        .collect::<Result<BTreeSet<T>>>()
        .map(Some)
}
