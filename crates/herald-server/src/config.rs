use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use chrono::NaiveTime;

use herald_db::RetryPolicy;
use herald_dispatch::{PipelineConfig, SchedulerConfig};

/// Placeholder secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me", "dev-secret-change-me"];

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// Push gateway credential file.
    pub auth_file: PathBuf,
    /// Bearer secret required on ingress requests.
    pub auth_token: String,
    pub retention_window: Duration,
    pub retention_run_at: NaiveTime,
    pub poll_interval: Duration,
    pub poll_batch: usize,
    pub worker_count: usize,
    pub claim_timeout: Duration,
    pub insert_max_retries: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let auth_token = get("HERALD_AUTH_TOKEN").unwrap_or_default();
        if auth_token.is_empty() || PLACEHOLDER_SECRETS.contains(&auth_token.as_str()) {
            bail!("HERALD_AUTH_TOKEN is unset or still a placeholder");
        }

        let run_at_raw = get("HERALD_RETENTION_RUN_AT").unwrap_or_else(|| "00:00".into());
        let retention_run_at = NaiveTime::parse_from_str(&run_at_raw, "%H:%M")
            .with_context(|| format!("HERALD_RETENTION_RUN_AT must be HH:MM, got '{}'", run_at_raw))?;

        let worker_count: usize = parse_or(&get, "HERALD_WORKER_COUNT", 10)?;
        let poll_batch: usize = parse_or(&get, "HERALD_POLL_BATCH", 100)?;
        if worker_count == 0 {
            bail!("HERALD_WORKER_COUNT must be at least 1");
        }
        if poll_batch == 0 {
            bail!("HERALD_POLL_BATCH must be at least 1");
        }

        let poll_interval_secs: u64 = parse_or(&get, "HERALD_POLL_INTERVAL_SECS", 5)?;
        if poll_interval_secs == 0 {
            bail!("HERALD_POLL_INTERVAL_SECS must be at least 1");
        }

        let retention_hours: u64 = parse_or(&get, "HERALD_RETENTION_HOURS", 24)?;
        let retention_secs = retention_hours
            .checked_mul(3600)
            .ok_or_else(|| anyhow!("HERALD_RETENTION_HOURS is too large: {}", retention_hours))?;

        Ok(Self {
            host: get("HERALD_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "HERALD_PORT", 50001)?,
            db_path: get("HERALD_DB_PATH")
                .unwrap_or_else(|| "notifications.db".into())
                .into(),
            auth_file: get("HERALD_AUTH_FILE")
                .unwrap_or_else(|| "auth.json".into())
                .into(),
            auth_token,
            retention_window: Duration::from_secs(retention_secs),
            retention_run_at,
            poll_interval: Duration::from_secs(poll_interval_secs),
            poll_batch,
            worker_count,
            claim_timeout: Duration::from_secs(parse_or(&get, "HERALD_CLAIM_TIMEOUT_SECS", 300)?),
            insert_max_retries: parse_or(&get, "HERALD_INSERT_MAX_RETRIES", 10)?,
        })
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            worker_count: self.worker_count,
            scheduler: SchedulerConfig {
                poll_interval: self.poll_interval,
                batch_size: self.poll_batch,
                claim_timeout: self.claim_timeout,
            },
            retention_window: self.retention_window,
            retention_run_at: self.retention_run_at,
        }
    }

    pub fn insert_retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.insert_max_retries,
            ..RetryPolicy::default()
        }
    }
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("{} must be a valid number, got '{}'", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_secret_is_set() {
        let c = config(&[("HERALD_AUTH_TOKEN", "abc123")]).unwrap();

        assert_eq!(c.port, 50001);
        assert_eq!(c.worker_count, 10);
        assert_eq!(c.poll_interval, Duration::from_secs(5));
        assert_eq!(c.retention_window, Duration::from_secs(24 * 3600));
        assert_eq!(c.retention_run_at, NaiveTime::from_hms_opt(0, 0, 0).unwrap());
        assert_eq!(c.insert_retry().max_attempts, 10);
        assert_eq!(c.insert_retry().unit, Duration::from_secs(1));
    }

    #[test]
    fn overrides_flow_into_the_pipeline() {
        let c = config(&[
            ("HERALD_AUTH_TOKEN", "abc123"),
            ("HERALD_WORKER_COUNT", "3"),
            ("HERALD_POLL_INTERVAL_SECS", "2"),
            ("HERALD_CLAIM_TIMEOUT_SECS", "60"),
            ("HERALD_RETENTION_HOURS", "48"),
            ("HERALD_RETENTION_RUN_AT", "03:15"),
        ])
        .unwrap();

        let p = c.pipeline();
        assert_eq!(p.worker_count, 3);
        assert_eq!(p.scheduler.poll_interval, Duration::from_secs(2));
        assert_eq!(p.scheduler.claim_timeout, Duration::from_secs(60));
        assert_eq!(p.retention_window, Duration::from_secs(48 * 3600));
        assert_eq!(p.retention_run_at, NaiveTime::from_hms_opt(3, 15, 0).unwrap());
    }

    #[test]
    fn missing_or_placeholder_secret_is_refused() {
        assert!(config(&[]).is_err());
        assert!(config(&[("HERALD_AUTH_TOKEN", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn bad_numbers_and_zero_workers_are_refused() {
        assert!(config(&[("HERALD_AUTH_TOKEN", "x"), ("HERALD_PORT", "http")]).is_err());
        assert!(config(&[("HERALD_AUTH_TOKEN", "x"), ("HERALD_WORKER_COUNT", "0")]).is_err());
        assert!(config(&[("HERALD_AUTH_TOKEN", "x"), ("HERALD_RETENTION_RUN_AT", "midnight")]).is_err());
        assert!(config(&[("HERALD_AUTH_TOKEN", "x"), ("HERALD_POLL_INTERVAL_SECS", "0")]).is_err());
    }

    #[test]
    fn oversized_retention_window_is_refused() {
        let huge = u64::MAX.to_string();
        let err = config(&[("HERALD_AUTH_TOKEN", "x"), ("HERALD_RETENTION_HOURS", &huge)]).unwrap_err();
        assert!(err.to_string().contains("HERALD_RETENTION_HOURS"));
    }
}
