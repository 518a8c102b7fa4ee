use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputEmail {
    pub email: String,
}

#[derive(Clone, Deserialize, Serialize, ZeroizeOnDrop)]
pub struct InputOtpVerification {
    pub email: String,
    pub code: String,
}
