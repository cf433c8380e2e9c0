//! Connection pool statistics and the health report built from them.
//!
//! sqlx only reports open and idle connection counts, so the remaining
//! counters (waits, idle-timeout and max-lifetime closures) are collected by
//! [`PoolCounters`], which the pool hooks and the service update.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Serialize, Serializer};

pub const HEALTHY: &str = "It's healthy";
pub const HEAVY_LOAD: &str = "The database is experiencing heavy load.";
pub const HIGH_WAIT: &str =
    "The database has a high number of wait events, indicating potential bottlenecks.";
pub const IDLE_CHURN: &str =
    "Many idle connections are being closed, consider revising the connection pool settings.";
pub const LIFETIME_CHURN: &str = "Many connections are being closed due to max lifetime, consider increasing max lifetime or revising the connection usage pattern.";

const HEAVY_LOAD_CONNECTIONS: u32 = 40;
const HIGH_WAIT_COUNT: u64 = 1000;

/// Cumulative pool counters shared between the pool hooks and the service.
#[derive(Debug, Default)]
pub struct PoolCounters {
    wait_count: AtomicU64,
    wait_nanos: AtomicU64,
    idle_closed: AtomicU64,
    lifetime_closed: AtomicU64,
}

impl PoolCounters {
    pub fn record_wait(&self, waited: Duration) {
        self.wait_count.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(waited.as_nanos()).unwrap_or(u64::MAX);
        self.wait_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn record_idle_closed(&self) {
        self.idle_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lifetime_closed(&self) {
        self.lifetime_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Combine the counters with the pool's current open/idle counts.
    pub fn snapshot(&self, open_connections: u32, idle: u32) -> PoolStats {
        PoolStats {
            open_connections,
            in_use: open_connections.saturating_sub(idle),
            idle,
            wait_count: self.wait_count.load(Ordering::Relaxed),
            wait_duration: Duration::from_nanos(self.wait_nanos.load(Ordering::Relaxed)),
            max_idle_closed: self.idle_closed.load(Ordering::Relaxed),
            max_lifetime_closed: self.lifetime_closed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the connection pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub open_connections: u32,
    pub in_use: u32,
    pub idle: u32,
    pub wait_count: u64,
    #[serde(serialize_with = "serialize_duration")]
    pub wait_duration: Duration,
    pub max_idle_closed: u64,
    pub max_lifetime_closed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

/// Health report returned by `Service::health` and served at `/api/health`.
///
/// # JSON Example
///
/// ```json
/// {
///   "status": "up",
///   "message": "It's healthy",
///   "open_connections": 3,
///   "in_use": 1,
///   "idle": 2,
///   "wait_count": 0,
///   "wait_duration": "0s",
///   "max_idle_closed": 0,
///   "max_lifetime_closed": 0
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(flatten)]
    pub stats: Option<PoolStats>,
}

impl HealthReport {
    pub fn up(stats: PoolStats) -> Self {
        Self {
            status: HealthStatus::Up,
            message: Some(diagnose(&stats).to_string()),
            error: None,
            stats: Some(stats),
        }
    }

    pub fn down(cause: impl std::fmt::Display) -> Self {
        Self {
            status: HealthStatus::Down,
            message: None,
            error: Some(format!("db down: {cause}")),
            stats: None,
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == HealthStatus::Up
    }
}

/// Pick the diagnostic message for a healthy pool.
///
/// The checks are independent and run in a fixed order; a later match
/// replaces the message chosen by an earlier one.
pub fn diagnose(stats: &PoolStats) -> &'static str {
    let mut message = HEALTHY;
    let half_open = u64::from(stats.open_connections / 2);

    if stats.open_connections > HEAVY_LOAD_CONNECTIONS {
        message = HEAVY_LOAD;
    }

    if stats.wait_count > HIGH_WAIT_COUNT {
        message = HIGH_WAIT;
    }

    if stats.max_idle_closed > half_open {
        message = IDLE_CHURN;
    }

    if stats.max_lifetime_closed > half_open {
        message = LIFETIME_CHURN;
    }

    message
}

fn serialize_duration<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_duration(*duration))
}

/// Render a duration compactly: `0s`, `850ns`, `1.5µs`, `150ms`, `1.5s`, `1m30s`, `1h0m0s`.
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();

    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{nanos}ns");
    }
    if nanos < 1_000_000 {
        return format!("{}µs", decimal(nanos, 1_000));
    }
    if nanos < 1_000_000_000 {
        return format!("{}ms", decimal(nanos, 1_000_000));
    }

    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h{minutes}m"));
    } else if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    out.push_str(&format!("{}s", decimal(nanos % 60_000_000_000, 1_000_000_000)));
    out
}

/// `value / unit` with the fractional part written out and trailing zeros dropped.
fn decimal(value: u128, unit: u128) -> String {
    let whole = value / unit;
    let fraction = value % unit;
    if fraction == 0 {
        return whole.to_string();
    }

    let width = unit.ilog10() as usize;
    let digits = format!("{fraction:0width$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}
