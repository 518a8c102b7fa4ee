use artepix_common::request_io::OutputHealth;

use actix_web::{HttpResponse, Responder};

pub async fn heartbeat() -> impl Responder {
    HttpResponse::Ok()
}

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(OutputHealth {
        status: String::from("healthy"),
        version: String::from(env!("CARGO_PKG_VERSION")),
    })
}
