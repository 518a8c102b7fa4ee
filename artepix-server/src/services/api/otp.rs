use actix_web::web::*;

use crate::handlers::otp;
use crate::services::api::RouteLimiters;

pub fn configure(cfg: &mut ServiceConfig, limiters: RouteLimiters) {
    cfg.service(
        scope("/auth/otp")
            .service(
                resource("/send").route(post().to(otp::send_otp).wrap(limiters.send_otp)),
            )
            .service(
                resource("/verify").route(post().to(otp::verify_otp).wrap(limiters.verify_otp)),
            ),
    );
}
