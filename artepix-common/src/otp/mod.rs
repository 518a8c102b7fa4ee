mod email_delivery;
mod manager;

pub use email_delivery::EmailOtpDelivery;
pub use manager::{IssuedOtp, OtpManager, OtpSettings};

use async_trait::async_trait;
use rand::Rng;
use std::fmt;

use crate::email::EmailError;
use crate::threadrand::SecureRng;

pub struct Otp {}

impl Otp {
    pub fn generate(length: usize) -> String {
        let mut rng = SecureRng;
        (0..length)
            .map(|_| (b'0' + rng.gen_range(0..10)) as char)
            .collect()
    }

    pub fn are_equal(given: &str, saved: &str) -> bool {
        let given = given.as_bytes();
        let saved = saved.as_bytes();

        if given.len() != saved.len() {
            return false;
        }

        // Fold every byte so the comparison time doesn't depend on where a mismatch is
        let otps_dont_match = saved
            .iter()
            .zip(given)
            .fold(0u8, |acc, (saved_byte, given_byte)| {
                acc | (saved_byte ^ given_byte)
            });

        otps_dont_match == 0
    }
}

#[derive(Debug)]
pub enum DeliveryError {
    Email(EmailError),
}

impl std::error::Error for DeliveryError {}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::Email(e) => write!(f, "DeliveryError: {e}"),
        }
    }
}

impl From<EmailError> for DeliveryError {
    fn from(err: EmailError) -> Self {
        DeliveryError::Email(err)
    }
}

/// A channel capable of getting a passcode to the holder of an address.
#[async_trait]
pub trait DeliverOtp: Send + Sync {
    async fn deliver(&self, address: &str, code: &str) -> Result<(), DeliveryError>;
}

pub type OtpDelivery = Box<dyn DeliverOtp>;

#[derive(Debug)]
pub enum OtpError {
    NotFound,
    Expired,
    TooManyAttempts,
    Mismatch,
    DeliveryFailed(DeliveryError),
}

impl std::error::Error for OtpError {}

impl fmt::Display for OtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OtpError::NotFound => {
                write!(f, "No OTP found for this email. Please request a new one.")
            }
            OtpError::Expired => write!(f, "OTP has expired. Please request a new one."),
            OtpError::TooManyAttempts => {
                write!(f, "Too many attempts. Please request a new OTP.")
            }
            OtpError::Mismatch => write!(f, "Invalid OTP code."),
            OtpError::DeliveryFailed(_) => {
                write!(f, "Failed to send OTP email. Please try again.")
            }
        }
    }
}
