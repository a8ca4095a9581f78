//! Scheduler configuration.
//!
//! Everything here has a sensible default; deployments override individual
//! knobs via `RAILCTL_*` environment variables. Parse failures fall back to
//! the default rather than aborting startup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default HTTP bind address.
const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 3000);

/// Default look-ahead horizon for conflict detection, in route hops.
const DEFAULT_LOOKAHEAD_HOPS: usize = 3;

/// Default delay minutes added each time a train is held at a full section.
const DEFAULT_DELAY_PENALTY_MINUTES: u32 = 5;

/// Default interval between evaluation cycles.
const DEFAULT_EVALUATION_INTERVAL_SECS: u64 = 5;

/// Default lifetime of a pending recommendation.
const DEFAULT_RECOMMENDATION_TTL_SECS: i64 = 300;

/// Default retention of seen request ids.
const DEFAULT_DEDUPE_TTL_HOURS: i64 = 24;

/// Default delay threshold (minutes) under which a train counts as punctual.
const DEFAULT_PUNCTUALITY_THRESHOLD_MINUTES: u32 = 5;

/// Runtime configuration for one scheduler instance.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Address the HTTP API binds to. `RAILCTL_BIND_ADDR`.
    pub bind_addr: SocketAddr,

    /// How many upcoming route hops the conflict detector scans.
    /// `RAILCTL_LOOKAHEAD_HOPS`.
    pub lookahead_hops: usize,

    /// Delay minutes accrued per tick spent waiting on a full section.
    /// `RAILCTL_DELAY_PENALTY_MINUTES`.
    pub delay_penalty_minutes: u32,

    /// Interval between evaluation cycles (conflict scan, recommendation
    /// refresh, expiry sweep). `RAILCTL_EVALUATION_INTERVAL_SECS`.
    pub evaluation_interval: Duration,

    /// How long a pending recommendation stays actionable.
    /// `RAILCTL_RECOMMENDATION_TTL_SECS`.
    pub recommendation_ttl: chrono::Duration,

    /// Retention of seen command request ids. `RAILCTL_DEDUPE_TTL_HOURS`.
    pub dedupe_ttl: chrono::Duration,

    /// Delay at or under this many minutes counts as punctual in the KPI
    /// snapshot. `RAILCTL_PUNCTUALITY_THRESHOLD_MINUTES`.
    pub punctuality_threshold_minutes: u32,

    /// Where the audit log is mirrored; `None` keeps it in memory only.
    /// `RAILCTL_AUDIT_LOG`.
    pub audit_log_path: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        SchedulerConfig {
            bind_addr: SocketAddr::from(DEFAULT_BIND_ADDR),
            lookahead_hops: DEFAULT_LOOKAHEAD_HOPS,
            delay_penalty_minutes: DEFAULT_DELAY_PENALTY_MINUTES,
            evaluation_interval: Duration::from_secs(DEFAULT_EVALUATION_INTERVAL_SECS),
            recommendation_ttl: chrono::Duration::seconds(DEFAULT_RECOMMENDATION_TTL_SECS),
            dedupe_ttl: chrono::Duration::hours(DEFAULT_DEDUPE_TTL_HOURS),
            punctuality_threshold_minutes: DEFAULT_PUNCTUALITY_THRESHOLD_MINUTES,
            audit_log_path: None,
        }
    }

    /// Creates a config from environment variables, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::new();

        SchedulerConfig {
            bind_addr: env_parse("RAILCTL_BIND_ADDR").unwrap_or(defaults.bind_addr),
            lookahead_hops: env_parse("RAILCTL_LOOKAHEAD_HOPS").unwrap_or(defaults.lookahead_hops),
            delay_penalty_minutes: env_parse("RAILCTL_DELAY_PENALTY_MINUTES")
                .unwrap_or(defaults.delay_penalty_minutes),
            evaluation_interval: env_parse("RAILCTL_EVALUATION_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.evaluation_interval),
            recommendation_ttl: env_parse("RAILCTL_RECOMMENDATION_TTL_SECS")
                .map(chrono::Duration::seconds)
                .unwrap_or(defaults.recommendation_ttl),
            dedupe_ttl: env_parse("RAILCTL_DEDUPE_TTL_HOURS")
                .map(chrono::Duration::hours)
                .unwrap_or(defaults.dedupe_ttl),
            punctuality_threshold_minutes: env_parse("RAILCTL_PUNCTUALITY_THRESHOLD_MINUTES")
                .unwrap_or(defaults.punctuality_threshold_minutes),
            audit_log_path: std::env::var("RAILCTL_AUDIT_LOG").ok().map(PathBuf::from),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = SchedulerConfig::new();
        assert_eq!(config.lookahead_hops, 3);
        assert_eq!(config.delay_penalty_minutes, 5);
        assert_eq!(config.recommendation_ttl, chrono::Duration::minutes(5));
        assert!(config.audit_log_path.is_none());
    }
}
