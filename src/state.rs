//! # Application State Management
//!
//! Shared state handed to every request handler through `web::Data`.
//!
//! ## Contents:
//! - **config**: the loaded configuration, read-only after startup
//! - **service**: the sonification pipeline and its collaborators
//! - **metrics**: request counters updated by the metrics middleware
//! - **start_time**: used to report uptime
//!
//! Metrics live behind an `RwLock`. A handler that panics while holding it
//! poisons the lock; readers and writers recover the inner value instead of
//! propagating the panic, since counters are never left half-updated.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tracing::warn;

use crate::config::AppConfig;
use crate::sonification::SonificationService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub service: Arc<SonificationService>,
    pub metrics: Arc<RwLock<AppMetrics>>,
    pub start_time: Instant,
}

#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    pub request_count: u64,
    pub error_count: u64,
    /// Successful sonifications since startup
    pub artifacts_rendered: u64,
    /// Sonifications that ended in an error response
    pub sonification_failures: u64,
    /// Keyed by `"{METHOD} {route pattern}"`
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig, service: SonificationService) -> Self {
        Self {
            config: Arc::new(config),
            service: Arc::new(service),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    fn metrics_read(&self) -> RwLockReadGuard<'_, AppMetrics> {
        self.metrics.read().unwrap_or_else(|poisoned| {
            warn!(op = "state.metrics", lock_kind = "rwlock.read", "Recovered from poisoned metrics lock");
            poisoned.into_inner()
        })
    }

    fn metrics_write(&self) -> RwLockWriteGuard<'_, AppMetrics> {
        self.metrics.write().unwrap_or_else(|poisoned| {
            warn!(op = "state.metrics", lock_kind = "rwlock.write", "Recovered from poisoned metrics lock");
            poisoned.into_inner()
        })
    }

    pub fn increment_request_count(&self) {
        self.metrics_write().request_count += 1;
    }

    pub fn increment_error_count(&self) {
        self.metrics_write().error_count += 1;
    }

    pub fn record_sonification(&self, succeeded: bool) {
        let mut metrics = self.metrics_write();
        if succeeded {
            metrics.artifacts_rendered += 1;
        } else {
            metrics.sonification_failures += 1;
        }
    }

    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics_write();
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;
        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics_read().clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
