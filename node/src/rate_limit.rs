use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::{HeaderValue, RETRY_AFTER};
use actix_web::middleware::Next;
use actix_web::{web, Error, HttpResponse};
use dashmap::DashMap;

use crate::error_map::error_body;

const WINDOW: Duration = Duration::from_secs(15 * 60);
const LIMIT: u32 = 100;

struct Window {
    started_at: Instant,
    count: u32,
}

/// Fixed-window counter keyed by peer IP, shared across all `/api/*`
/// requests for the process lifetime (SPEC_FULL §6 [AMBIENT]).
#[derive(Clone, Default)]
pub struct RateLimiter(Arc<DashMap<IpAddr, Window>>);

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter(Arc::new(DashMap::new()))
    }

    /// Returns `Some(retry_after)` once the peer's window is exhausted,
    /// otherwise records the hit and returns `None`.
    fn check(&self, peer: IpAddr) -> Option<Duration> {
        let now = Instant::now();
        let mut entry = self.0.entry(peer).or_insert_with(|| Window { started_at: now, count: 0 });

        if now.duration_since(entry.started_at) >= WINDOW {
            entry.started_at = now;
            entry.count = 0;
        }

        if entry.count >= LIMIT {
            return Some(WINDOW - now.duration_since(entry.started_at));
        }

        entry.count += 1;
        None
    }
}

pub async fn enforce(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let limiter = req.app_data::<web::Data<RateLimiter>>().cloned();
    let peer = req.peer_addr().map(|addr| addr.ip());

    let blocked = match (&limiter, peer) {
        (Some(limiter), Some(peer)) => limiter.check(peer),
        _ => None,
    };

    match blocked {
        None => next.call(req).await.map(ServiceResponse::map_into_left_body),
        Some(retry_after) => {
            let mut response = HttpResponse::TooManyRequests().json(error_body("RATE_LIMITED", "too many requests"));
            if let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
            Ok(req.into_response(response).map_into_right_body())
        }
    }
}
