use artepix_common::request_io::OutputMessage;

use actix_web::{HttpResponse, Responder};

pub async fn index() -> impl Responder {
    HttpResponse::Ok().json(OutputMessage {
        message: String::from("Welcome to Artepix Smart Packaging API"),
    })
}
