pub mod health;
pub mod index;
pub mod otp;

pub mod verification {
    use artepix_common::validators::{self, Validity};

    use crate::handlers::error::HttpErrorResponse;

    pub fn validate_email(email: &str) -> Result<(), HttpErrorResponse> {
        match validators::validate_email_address(email) {
            Validity::Valid => Ok(()),
            Validity::Invalid(msg) => Err(HttpErrorResponse::IncorrectlyFormed(msg.into_owned())),
        }
    }
}

pub mod error {
    use artepix_common::otp::OtpError;
    use artepix_common::request_io::{ErrorType, ServerErrorResponse};

    use actix_web::error::JsonPayloadError;
    use actix_web::http::StatusCode;
    use actix_web::{HttpResponse, HttpResponseBuilder};
    use std::fmt;

    #[derive(Debug)]
    pub enum HttpErrorResponse {
        // 400
        IncorrectlyFormed(String),
        OtpNotFound(String),
        OtpExpired(String),
        IncorrectOtp(String),

        // 429
        TooManyAttempts(String),
        TooManyRequests(String),

        // 500
        OtpDeliveryFailed(String),
    }

    impl std::error::Error for HttpErrorResponse {}

    impl fmt::Display for HttpErrorResponse {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let server_error: ServerErrorResponse = self.into();
            write!(f, "{:?}", server_error)
        }
    }

    impl From<HttpErrorResponse> for ServerErrorResponse {
        fn from(resp: HttpErrorResponse) -> Self {
            (&resp).into()
        }
    }

    impl From<&HttpErrorResponse> for ServerErrorResponse {
        fn from(resp: &HttpErrorResponse) -> Self {
            let (err_type, err_message) = match resp {
                // 400
                HttpErrorResponse::IncorrectlyFormed(msg) => (
                    ErrorType::IncorrectlyFormed,
                    format!("Incorrectly formed request: {msg}"),
                ),
                HttpErrorResponse::OtpNotFound(msg) => (ErrorType::OtpNotFound, msg.clone()),
                HttpErrorResponse::OtpExpired(msg) => (ErrorType::OtpExpired, msg.clone()),
                HttpErrorResponse::IncorrectOtp(msg) => (ErrorType::IncorrectOtp, msg.clone()),

                // 429
                HttpErrorResponse::TooManyAttempts(msg) => {
                    (ErrorType::TooManyAttempts, msg.clone())
                }
                HttpErrorResponse::TooManyRequests(msg) => (
                    ErrorType::TooManyRequests,
                    format!("Too many requests: {msg}"),
                ),

                // 500
                HttpErrorResponse::OtpDeliveryFailed(msg) => {
                    (ErrorType::OtpDeliveryFailed, msg.clone())
                }
            };

            ServerErrorResponse {
                err_type,
                err_message,
            }
        }
    }

    impl actix_web::error::ResponseError for HttpErrorResponse {
        fn error_response(&self) -> HttpResponse {
            HttpResponseBuilder::new(self.status_code()).json(ServerErrorResponse::from(self))
        }

        fn status_code(&self) -> StatusCode {
            match *self {
                HttpErrorResponse::IncorrectlyFormed(_)
                | HttpErrorResponse::OtpNotFound(_)
                | HttpErrorResponse::OtpExpired(_)
                | HttpErrorResponse::IncorrectOtp(_) => StatusCode::BAD_REQUEST,
                HttpErrorResponse::TooManyAttempts(_) | HttpErrorResponse::TooManyRequests(_) => {
                    StatusCode::TOO_MANY_REQUESTS
                }
                HttpErrorResponse::OtpDeliveryFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }

    impl From<OtpError> for HttpErrorResponse {
        fn from(err: OtpError) -> Self {
            let msg = err.to_string();

            match err {
                OtpError::NotFound => HttpErrorResponse::OtpNotFound(msg),
                OtpError::Expired => HttpErrorResponse::OtpExpired(msg),
                OtpError::TooManyAttempts => HttpErrorResponse::TooManyAttempts(msg),
                OtpError::Mismatch => HttpErrorResponse::IncorrectOtp(msg),
                OtpError::DeliveryFailed(_) => HttpErrorResponse::OtpDeliveryFailed(msg),
            }
        }
    }

    impl From<JsonPayloadError> for HttpErrorResponse {
        fn from(err: JsonPayloadError) -> Self {
            HttpErrorResponse::IncorrectlyFormed(err.to_string())
        }
    }

}
