use std::{
    collections::HashMap,
    future::{ready, Ready},
    net::{IpAddr, Ipv4Addr},
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use futures::future::LocalBoxFuture;
use tokio::sync::RwLock;

use crate::handlers::error::HttpErrorResponse;

#[derive(Debug)]
struct LimiterEntry {
    count: u32,
    window_start: Instant,
}

impl LimiterEntry {
    fn record(&mut self, now: Instant, period: Duration, max_per_period: u32) -> bool {
        if now.saturating_duration_since(self.window_start) > period {
            self.window_start = now;
            self.count = 0;
        }

        if self.count >= max_per_period {
            return false;
        }

        self.count += 1;
        true
    }
}

struct LimiterTable {
    map: HashMap<IpAddr, Mutex<LimiterEntry>>,
    last_clear: Instant,
}

impl LimiterTable {
    fn new(now: Instant) -> Self {
        LimiterTable {
            map: HashMap::new(),
            last_clear: now,
        }
    }
}

/// Per-IP fixed-window rate limiting. Clones share the same counters.
#[derive(Clone)]
pub struct Limiter {
    max_per_period: u32,
    period: Duration,
    clear_frequency: Duration,
    limiter_tables: Arc<[RwLock<LimiterTable>; 16]>,
}

impl Limiter {
    /// Panics if period is greater than clear frequency.
    pub fn new(max_per_period: u32, period: Duration, clear_frequency: Duration) -> Self {
        if period > clear_frequency {
            panic!("Period cannot be greater than clear frequency");
        }

        let now = Instant::now();

        Limiter {
            max_per_period,
            period,
            clear_frequency,
            limiter_tables: Arc::new(std::array::from_fn(|_| RwLock::new(LimiterTable::new(now)))),
        }
    }

    /// Counts an access from `ip` and returns whether it is within the limit.
    async fn record_access(&self, ip: IpAddr, now: Instant) -> bool {
        let final_octet = match ip {
            IpAddr::V4(ip) => ip.octets()[3],
            IpAddr::V6(ip) => ip.octets()[15],
        };
        let table = &self.limiter_tables[(final_octet & 0x0F) as usize];

        {
            // Scoped so the read lock is dropped before the write lock is acquired
            let table = table.read().await;

            if let Some(entry) = table.map.get(&ip) {
                let mut entry = entry.lock().unwrap_or_else(PoisonError::into_inner);
                return entry.record(now, self.period, self.max_per_period);
            }
        }

        let mut table = table.write().await;

        if now.saturating_duration_since(table.last_clear) >= self.clear_frequency {
            table.map.clear();
            table.map.shrink_to_fit();
            table.last_clear = now;
        }

        // Another request from the same IP may have inserted the entry while the lock was free
        table
            .map
            .entry(ip)
            .or_insert_with(|| {
                Mutex::new(LimiterEntry {
                    count: 0,
                    window_start: now,
                })
            })
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .record(now, self.period, self.max_per_period)
    }
}

impl<S, B> Transform<S, ServiceRequest> for Limiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = LimiterMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LimiterMiddleware {
            service,
            limiter: self.clone(),
        }))
    }
}

pub struct LimiterMiddleware<S> {
    service: S,
    limiter: Limiter,
}

impl<S, B> Service<ServiceRequest> for LimiterMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // peer_addr() is only missing for requests that didn't come over a socket
        let ip = req
            .peer_addr()
            .map(|addr| addr.ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        let limiter = self.limiter.clone();
        let req_fut = self.service.call(req);

        Box::pin(async move {
            if !limiter.record_access(ip, Instant::now()).await {
                log::warn!("Rate limit exceeded for {ip}");
                return Err(HttpErrorResponse::TooManyRequests(String::from(
                    "Please try again later",
                ))
                .into());
            }

            req_fut.await
        })
    }
}
