//! Cached multi-probe readiness sampler.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::Serialize;

/// One named readiness probe.
pub type CheckFn = Box<dyn Fn() -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// Aggregated probe outcome: overall flag plus per-probe status, where a
/// healthy probe reads `"ok"` and a failed one carries its error message.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub ok: bool,
    pub checks: BTreeMap<String, String>,
    pub at: DateTime<Utc>,
}

struct Cached {
    next_check_at: Option<Instant>,
    last: HealthReport,
}

/// Runs all probes at most once per TTL, serving the cached report in
/// between.
pub struct HealthService {
    checks: Vec<(String, CheckFn)>,
    ttl: Duration,
    cached: Mutex<Cached>,
}

impl HealthService {
    pub fn new(ttl: Duration, checks: Vec<(String, CheckFn)>) -> Self {
        Self {
            checks,
            ttl,
            cached: Mutex::new(Cached {
                next_check_at: None,
                last: HealthReport {
                    ok: false,
                    checks: BTreeMap::new(),
                    at: Utc::now(),
                },
            }),
        }
    }

    /// Returns the cached report while it is fresh; otherwise runs every
    /// probe sequentially and refreshes the cache.
    pub async fn check(&self) -> HealthReport {
        {
            let cached = self.cached.lock().unwrap();
            if let Some(next_check_at) = cached.next_check_at
                && Instant::now() < next_check_at
            {
                return cached.last.clone();
            }
        }

        let mut report = HealthReport {
            ok: true,
            checks: BTreeMap::new(),
            at: Utc::now(),
        };
        for (name, probe) in &self.checks {
            match probe().await {
                Ok(()) => {
                    report.checks.insert(name.clone(), "ok".to_string());
                }
                Err(message) => {
                    report.ok = false;
                    report.checks.insert(name.clone(), message);
                }
            }
        }

        let mut cached = self.cached.lock().unwrap();
        cached.last = report.clone();
        cached.next_check_at = Some(Instant::now() + self.ttl);
        report
    }
}
