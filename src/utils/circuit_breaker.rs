use crate::error::{AppError, AppResult};
use log::{info, warn};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

/// Breaker name used by the Google Calendar client.
pub const GOOGLE_CALENDAR: &str = "google_calendar";

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failures: u32,
    successes: u32,
    opened_at: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: &str, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.to_string(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failures: 0,
                successes: 0,
                opened_at: None,
            }),
        }
    }

    /// Run `operation` unless the breaker is open. An open breaker moves to
    /// half-open once `timeout` has passed since it opened.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> AppResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        {
            let mut inner = self.inner.lock().await;
            if inner.state == CircuitState::Open {
                let cooled = inner
                    .opened_at
                    .is_some_and(|at| at.elapsed() > self.config.timeout);
                if !cooled {
                    return Err(AppError::calendar(format!(
                        "Circuit breaker '{}' is open",
                        self.name
                    )));
                }
                inner.state = CircuitState::HalfOpen;
                inner.successes = 0;
                info!("Circuit breaker '{}' half-open after cooldown", self.name);
            }
        }

        let result = operation().await;

        let mut inner = self.inner.lock().await;
        match (&result, inner.state) {
            (Ok(_), CircuitState::HalfOpen) => {
                inner.successes += 1;
                if inner.successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failures = 0;
                    info!("Circuit breaker '{}' closed", self.name);
                }
            }
            (Ok(_), _) => inner.failures = 0,
            (Err(_), CircuitState::HalfOpen) => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                warn!("Circuit breaker '{}' reopened after half-open failure", self.name);
            }
            (Err(_), _) => {
                inner.failures += 1;
                if inner.failures >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    warn!(
                        "Circuit breaker '{}' opened after {} failures",
                        self.name, inner.failures
                    );
                }
            }
        }

        result
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }
}

#[derive(Default)]
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub async fn get_breaker(&self, service_name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().await.get(service_name) {
            return breaker.clone();
        }

        let mut breakers = self.breakers.write().await;
        breakers
            .entry(service_name.to_string())
            .or_insert_with(|| {
                let config = match service_name {
                    GOOGLE_CALENDAR => CircuitBreakerConfig {
                        failure_threshold: 3,
                        success_threshold: 2,
                        timeout: Duration::from_secs(30),
                    },
                    _ => CircuitBreakerConfig::default(),
                };
                info!("Created circuit breaker for service: {}", service_name);
                Arc::new(CircuitBreaker::new(service_name, config))
            })
            .clone()
    }
}

lazy_static::lazy_static! {
    pub static ref CIRCUIT_BREAKER_REGISTRY: CircuitBreakerRegistry = CircuitBreakerRegistry::default();
}

pub async fn get_circuit_breaker(service_name: &str) -> Arc<CircuitBreaker> {
    CIRCUIT_BREAKER_REGISTRY.get_breaker(service_name).await
}
