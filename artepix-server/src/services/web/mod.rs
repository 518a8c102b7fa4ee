use actix_web::web::*;

use crate::handlers::{health, index};

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("")
            .route("/", get().to(index::index))
            .route("/health", get().to(health::health))
            .route("/heartbeat", get().to(health::heartbeat)),
    );
}
