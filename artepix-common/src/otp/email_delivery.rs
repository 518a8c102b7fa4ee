use async_trait::async_trait;
use lettre::message::Mailbox;
use std::time::Duration;

use crate::email::templates::OtpMessage;
use crate::email::{EmailMessage, EmailSender};
use crate::otp::{DeliverOtp, DeliveryError};

/// Delivers passcodes as HTML email.
pub struct EmailOtpDelivery {
    sender: EmailSender,
    from: Mailbox,
    reply_to: Mailbox,
    otp_lifetime: Duration,
}

impl EmailOtpDelivery {
    pub fn new(
        sender: EmailSender,
        from: Mailbox,
        reply_to: Mailbox,
        otp_lifetime: Duration,
    ) -> Self {
        Self {
            sender,
            from,
            reply_to,
            otp_lifetime,
        }
    }
}

#[async_trait]
impl DeliverOtp for EmailOtpDelivery {
    async fn deliver(&self, address: &str, code: &str) -> Result<(), DeliveryError> {
        let message = EmailMessage {
            body: OtpMessage::generate(code, self.otp_lifetime),
            subject: OtpMessage::SUBJECT,
            from: self.from.clone(),
            reply_to: self.reply_to.clone(),
            destination: address,
            is_html: true,
        };

        self.sender.send(message).await?;
        Ok(())
    }
}
