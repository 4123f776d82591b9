// web-server/src/middleware/rate_limiter.rs
use std::sync::{Arc, Mutex};
use std::time::{Instant, Duration};
use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header,
    Error, ResponseError,
    HttpResponse
};
use common::{ApiResponse, RateLimitConfig};
use dashmap::DashMap;
use futures_util::future::{LocalBoxFuture, Ready, ready};
use std::fmt;

// Custom error for rate limiting
#[derive(Debug)]
struct RateLimitExceeded {
    retry_after: u64,
}

impl fmt::Display for RateLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rate limit exceeded")
    }
}

impl ResponseError for RateLimitExceeded {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::TooManyRequests()
            .append_header((header::RETRY_AFTER, self.retry_after.to_string()))
            .json(ApiResponse::<()>::failure("Rate limit exceeded. Please try again later."))
    }
}

/// Sliding-window limit on requests per client IP for the configured path prefixes
#[derive(Debug, Clone)]
pub struct RateLimiter {
    paths: Vec<String>,
    max_requests: usize,
    window: Duration,
    store: Arc<DashMap<String, Vec<Instant>>>,
    last_prune: Arc<Mutex<Instant>>,
}

impl RateLimiter {
    pub fn new(paths: Vec<String>, max_requests: usize, window: Duration) -> Self {
        Self {
            paths,
            max_requests,
            window,
            store: Arc::new(DashMap::new()),
            last_prune: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.paths.clone(),
            config.max_requests,
            Duration::from_secs(config.window_secs),
        )
    }

    fn applies_to(&self, path: &str) -> bool {
        self.paths.iter().any(|p| path.starts_with(p))
    }

    /// Number of client IPs currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.store.len()
    }

    fn is_rate_limited(&self, ip: &str, now: Instant) -> bool {
        self.prune_if_due(now);

        let mut hits = self.store.entry(ip.to_string()).or_default();
        hits.retain(|time| now.saturating_duration_since(*time) < self.window);

        if hits.len() >= self.max_requests {
            true
        } else {
            hits.push(now);
            false
        }
    }

    // Drop clients with no hits inside the window, at most once per window.
    // Must not run while an entry of `store` is held.
    fn prune_if_due(&self, now: Instant) {
        {
            let mut last = self.last_prune.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if now.saturating_duration_since(*last) < self.window {
                return;
            }
            *last = now;
        }

        let before = self.store.len();
        self.store.retain(|_, hits| {
            hits.retain(|time| now.saturating_duration_since(*time) < self.window);
            !hits.is_empty()
        });

        let dropped = before.saturating_sub(self.store.len());
        if dropped > 0 {
            tracing::debug!("Rate limiter dropped {} idle clients", dropped);
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RateLimiterMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimiterMiddleware {
            service,
            limiter: self.clone(),
        }))
    }
}

pub struct RateLimiterMiddleware<S> {
    service: S,
    limiter: RateLimiter,
}

impl<S, B> Service<ServiceRequest> for RateLimiterMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<ServiceResponse<B>, Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if self.limiter.applies_to(req.path()) {
            let ip = req.connection_info().realip_remote_addr()
                .unwrap_or("unknown")
                .to_string();

            if self.limiter.is_rate_limited(&ip, Instant::now()) {
                tracing::warn!("Rate limit exceeded for IP: {}", ip);

                let retry_after = self.limiter.window.as_secs();
                return Box::pin(async move {
                    Err(RateLimitExceeded { retry_after }.into())
                });
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            fut.await
        })
    }
}
