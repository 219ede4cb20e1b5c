//! # Tower runtime configuration.
//!
//! Provides [`TowerConfig`] centralized settings for the tower runtime.
//!
//! Config is used in two ways:
//! 1. **Tower creation**: `Tower::builder(config).build()`
//! 2. **Environment loading**: [`TowerConfig::from_env`] overlays `TOWER_*` variables on the defaults
//!
//! ## Sentinel values
//! - `runways = 0` → treated as 1 (the pool never has zero capacity)
//! - `request_timeout = 0s` → no read timeout on admission connections
//! - `max_request_bytes = 0` → treated as the default 64 KiB
//! - `completed_backlog = 0` → treated as the default 10 000 records

use std::time::Duration;

use crate::error::ConfigError;
use crate::ledger::OperationKind;

const DEFAULT_MAX_REQUEST_BYTES: usize = 64 * 1024;
const DEFAULT_COMPLETED_BACKLOG: usize = 10_000;

/// Global configuration for the tower runtime.
///
/// ## Field semantics
/// - `listen_addr`: admission listener (`host:port`)
/// - `observer_addr`: where snapshots are pushed (`host:port`)
/// - `runways`: runway pool capacity
/// - `snapshot_period`: publisher tick
/// - `landing` / `takeoff`: how long each operation holds its runway
/// - `grace`: shutdown wait for in-flight operations (`0s` = cancel immediately)
///
/// All fields are public. Prefer the helper accessors over sentinel checks.
#[derive(Clone, Debug)]
pub struct TowerConfig {
    /// Admission listener address.
    pub listen_addr: String,

    /// Observer address for snapshot pushes.
    pub observer_addr: String,

    /// Number of runways (pool capacity).
    pub runways: u32,

    /// Interval between snapshot pushes.
    pub snapshot_period: Duration,

    /// Connect timeout for one snapshot push.
    pub observer_timeout: Duration,

    /// Runway hold time for a landing.
    pub landing: Duration,

    /// Runway hold time for a takeoff.
    pub takeoff: Duration,

    /// Maximum time to wait for flight tasks to stop on shutdown.
    ///
    /// Exceeding it returns `RuntimeError::GraceExceeded` with the stuck flights.
    pub grace: Duration,

    /// Maximum time to receive one request.
    pub request_timeout: Duration,

    /// Maximum size of one request.
    pub max_request_bytes: usize,

    /// Most completed records kept while the observer is unreachable.
    ///
    /// Older undelivered completions are dropped first.
    pub completed_backlog: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow listeners that lag behind more than `bus_capacity` events skip older items.
    pub bus_capacity: usize,
}

impl TowerConfig {
    /// Pool capacity, never zero.
    #[inline]
    pub fn runway_capacity(&self) -> u32 {
        self.runways.max(1)
    }

    /// How long `kind` holds its runway.
    #[inline]
    pub fn operation_duration(&self, kind: OperationKind) -> Duration {
        match kind {
            OperationKind::Landing => self.landing,
            OperationKind::Takeoff => self.takeoff,
        }
    }

    /// Request read timeout as an `Option` (`None` = wait indefinitely).
    #[inline]
    pub fn read_timeout(&self) -> Option<Duration> {
        if self.request_timeout == Duration::ZERO {
            None
        } else {
            Some(self.request_timeout)
        }
    }

    /// Request size limit, never zero.
    #[inline]
    pub fn request_limit(&self) -> usize {
        if self.max_request_bytes == 0 {
            DEFAULT_MAX_REQUEST_BYTES
        } else {
            self.max_request_bytes
        }
    }

    /// Completed-record backlog, never zero.
    #[inline]
    pub fn completed_backlog_limit(&self) -> usize {
        if self.completed_backlog == 0 {
            DEFAULT_COMPLETED_BACKLOG
        } else {
            self.completed_backlog
        }
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Defaults overlaid with `TOWER_*` environment variables.
    ///
    /// | Variable                   | Field               |
    /// |----------------------------|---------------------|
    /// | `TOWER_LISTEN_ADDR`        | `listen_addr`       |
    /// | `TOWER_OBSERVER_ADDR`      | `observer_addr`     |
    /// | `TOWER_RUNWAYS`            | `runways`           |
    /// | `TOWER_SNAPSHOT_PERIOD_MS` | `snapshot_period`   |
    /// | `TOWER_OBSERVER_TIMEOUT_MS`| `observer_timeout`  |
    /// | `TOWER_LANDING_MS`         | `landing`           |
    /// | `TOWER_TAKEOFF_MS`         | `takeoff`           |
    /// | `TOWER_GRACE_MS`           | `grace`             |
    /// | `TOWER_REQUEST_TIMEOUT_MS` | `request_timeout`   |
    /// | `TOWER_MAX_REQUEST_BYTES`  | `max_request_bytes` |
    /// | `TOWER_COMPLETED_BACKLOG`  | `completed_backlog` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("TOWER_LISTEN_ADDR") {
            cfg.listen_addr = v;
        }
        if let Some(v) = lookup("TOWER_OBSERVER_ADDR") {
            cfg.observer_addr = v;
        }
        if let Some(v) = lookup("TOWER_RUNWAYS") {
            cfg.runways = match v.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "TOWER_RUNWAYS",
                        value: v.clone(),
                        reason: "expected a positive integer",
                    });
                }
            };
        }

        let millis = |var: &'static str, target: &mut Duration| -> Result<(), ConfigError> {
            if let Some(v) = lookup(var) {
                let ms = v.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                    var,
                    value: v.clone(),
                    reason: "expected milliseconds",
                })?;
                *target = Duration::from_millis(ms);
            }
            Ok(())
        };
        millis("TOWER_SNAPSHOT_PERIOD_MS", &mut cfg.snapshot_period)?;
        millis("TOWER_OBSERVER_TIMEOUT_MS", &mut cfg.observer_timeout)?;
        millis("TOWER_LANDING_MS", &mut cfg.landing)?;
        millis("TOWER_TAKEOFF_MS", &mut cfg.takeoff)?;
        millis("TOWER_GRACE_MS", &mut cfg.grace)?;
        millis("TOWER_REQUEST_TIMEOUT_MS", &mut cfg.request_timeout)?;

        if cfg.snapshot_period.is_zero() {
            return Err(ConfigError::Invalid {
                var: "TOWER_SNAPSHOT_PERIOD_MS",
                value: "0".into(),
                reason: "period must be positive",
            });
        }

        if let Some(v) = lookup("TOWER_MAX_REQUEST_BYTES") {
            cfg.max_request_bytes = v.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "TOWER_MAX_REQUEST_BYTES",
                value: v.clone(),
                reason: "expected a byte count",
            })?;
        }

        if let Some(v) = lookup("TOWER_COMPLETED_BACKLOG") {
            cfg.completed_backlog = v.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "TOWER_COMPLETED_BACKLOG",
                value: v.clone(),
                reason: "expected a record count",
            })?;
        }

        Ok(cfg)
    }
}

impl Default for TowerConfig {
    /// Default configuration:
    ///
    /// - `listen_addr = 127.0.0.1:5000`, `observer_addr = 127.0.0.1:5001`
    /// - `runways = 2`
    /// - `snapshot_period = 1s`, `observer_timeout = 1s`
    /// - `landing = 3s`, `takeoff = 2.5s`
    /// - `grace = 5s`, `request_timeout = 5s`, `max_request_bytes = 64 KiB`
    /// - `completed_backlog = 10 000`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:5000".to_string(),
            observer_addr: "127.0.0.1:5001".to_string(),
            runways: 2,
            snapshot_period: Duration::from_secs(1),
            observer_timeout: Duration::from_secs(1),
            landing: Duration::from_millis(3000),
            takeoff: Duration::from_millis(2500),
            grace: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            completed_backlog: DEFAULT_COMPLETED_BACKLOG,
            bus_capacity: 1024,
        }
    }
}
