use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

// Entries beyond this trigger a sweep of expired windows on insert.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Limited,
}

#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    count: u32,
    last_seen: Instant,
}

/// Per-client admission control, anchored to each client's last observed
/// request rather than a calendar window. A request after the window elapses
/// resets the count to 1; at the ceiling, requests are rejected without
/// incrementing. Constructed once at startup and shared through `AppState`.
pub struct RateLimiter {
    window: Duration,
    ceiling: u32,
    clients: Mutex<HashMap<IpAddr, ClientWindow>>,
}

impl RateLimiter {
    pub fn new(window: Duration, ceiling: u32) -> Self {
        Self {
            window,
            ceiling,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, client: IpAddr) -> Decision {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: IpAddr, now: Instant) -> Decision {
        let mut clients = self.clients.lock().unwrap();

        let count = match clients.get(&client) {
            Some(window) if now.duration_since(window.last_seen) <= self.window => {
                if window.count >= self.ceiling {
                    return Decision::Limited;
                }
                window.count + 1
            }
            _ => 1,
        };

        if clients.len() >= SWEEP_THRESHOLD && !clients.contains_key(&client) {
            let window = self.window;
            clients.retain(|_, w| now.duration_since(w.last_seen) <= window);
        }

        clients.insert(
            client,
            ClientWindow {
                count,
                last_seen: now,
            },
        );
        Decision::Allowed
    }
}

/// Outermost request gate; runs before authentication and everything else.
pub async fn limit_requests(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    match state.rate_limiter.check(addr.ip()) {
        Decision::Allowed => next.run(request).await,
        Decision::Limited => {
            warn!(client = %addr.ip(), "rate limit exceeded");
            ApiError::RateLimited.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([127, 0, 0, last])
    }

    #[test]
    fn allows_up_to_ceiling_then_rejects() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 3);
        let now = Instant::now();
        assert_eq!(limiter.check_at(ip(1), now), Decision::Allowed);
        assert_eq!(limiter.check_at(ip(1), now), Decision::Allowed);
        assert_eq!(limiter.check_at(ip(1), now), Decision::Allowed);
        assert_eq!(limiter.check_at(ip(1), now), Decision::Limited);
        // still limited while inside the window
        assert_eq!(
            limiter.check_at(ip(1), now + Duration::from_secs(30)),
            Decision::Limited
        );
    }

    #[test]
    fn window_elapse_resets_count_to_one() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);
        let now = Instant::now();
        assert_eq!(limiter.check_at(ip(2), now), Decision::Allowed);
        assert_eq!(limiter.check_at(ip(2), now), Decision::Allowed);
        assert_eq!(limiter.check_at(ip(2), now), Decision::Limited);

        let later = now + Duration::from_secs(61);
        assert_eq!(limiter.check_at(ip(2), later), Decision::Allowed);
        assert_eq!(limiter.check_at(ip(2), later), Decision::Allowed);
        assert_eq!(limiter.check_at(ip(2), later), Decision::Limited);
    }

    #[test]
    fn clients_are_tracked_independently() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);
        let now = Instant::now();
        assert_eq!(limiter.check_at(ip(3), now), Decision::Allowed);
        assert_eq!(limiter.check_at(ip(3), now), Decision::Limited);
        assert_eq!(limiter.check_at(ip(4), now), Decision::Allowed);
    }

    #[test]
    fn rejection_does_not_consume_budget_after_window() {
        // a rejected request neither increments the count nor extends the
        // window, so the client recovers once the window elapses
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);
        let now = Instant::now();
        assert_eq!(limiter.check_at(ip(5), now), Decision::Allowed);
        assert_eq!(limiter.check_at(ip(5), now), Decision::Limited);
        assert_eq!(
            limiter.check_at(ip(5), now + Duration::from_secs(61)),
            Decision::Allowed
        );
    }
}
