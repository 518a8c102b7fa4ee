use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OutputOtpIssued {
    pub message: String,
    pub email: String,
    pub expires_in_minutes: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OutputOtpVerified {
    pub message: String,
    pub verified: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OutputMessage {
    pub message: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OutputHealth {
    pub status: String,
    pub version: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    IncorrectlyFormed,
    OtpNotFound,
    OtpExpired,
    IncorrectOtp,
    TooManyAttempts,
    TooManyRequests,
    OtpDeliveryFailed,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ServerErrorResponse {
    pub err_type: ErrorType,
    pub err_message: String,
}
