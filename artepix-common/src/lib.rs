#![cfg(not(doctest))]

pub mod email;
pub mod otp;
pub mod request_io;
pub mod threadrand;
pub mod validators;
