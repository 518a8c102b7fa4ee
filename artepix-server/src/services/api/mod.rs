use std::time::Duration;

use actix_web::web::*;

use crate::handlers::error::HttpErrorResponse;
use crate::middleware::Limiter;

mod otp;

#[derive(Clone)]
pub struct RouteLimiters {
    pub send_otp: Limiter,
    pub verify_otp: Limiter,
}

impl Default for RouteLimiters {
    fn default() -> Self {
        const CLEAR_FREQUENCY: Duration = Duration::from_secs(3600 * 24);

        Self {
            send_otp: Limiter::new(6, Duration::from_secs(360), CLEAR_FREQUENCY),
            verify_otp: Limiter::new(12, Duration::from_secs(60), CLEAR_FREQUENCY),
        }
    }
}

pub fn configure(cfg: &mut ServiceConfig, limiters: RouteLimiters) {
    cfg.service(
        scope("/api/v1")
            .app_data(
                JsonConfig::default()
                    .error_handler(|err, _req| HttpErrorResponse::from(err).into()),
            )
            .configure(|cfg| otp::configure(cfg, limiters)),
    );
}
