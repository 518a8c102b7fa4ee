use artepix_common::otp::OtpManager;
use artepix_common::request_io::{
    InputEmail, InputOtpVerification, OutputOtpIssued, OutputOtpVerified,
};

use actix_web::{web, HttpResponse};

use crate::handlers::error::HttpErrorResponse;
use crate::handlers::verification;

pub async fn send_otp(
    otp_manager: web::Data<OtpManager>,
    input: web::Json<InputEmail>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let email = OtpManager::normalize_email(&input.email);
    verification::validate_email(&email)?;

    let issued = otp_manager.issue(&email).await?;
    log::info!("Issued OTP for {}", issued.email);

    Ok(HttpResponse::Ok().json(OutputOtpIssued {
        message: String::from("OTP sent successfully"),
        email: issued.email,
        expires_in_minutes: issued.lifetime.as_secs() / 60,
    }))
}

pub async fn verify_otp(
    otp_manager: web::Data<OtpManager>,
    input: web::Json<InputOtpVerification>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let email = OtpManager::normalize_email(&input.email);
    verification::validate_email(&email)?;

    if let Err(e) = otp_manager.verify(&email, &input.code) {
        log::info!("OTP verification for {} failed: {:?}", email, e);
        return Err(e.into());
    }

    Ok(HttpResponse::Ok().json(OutputOtpVerified {
        message: String::from("OTP verified successfully"),
        verified: true,
    }))
}
