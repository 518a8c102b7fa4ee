use async_trait::async_trait;

use crate::email::{EmailError, EmailMessage, SendEmail};

/// Stands in for a real relay when email is disabled. Only the envelope is logged; the body
/// never leaves the process.
#[derive(Default)]
pub struct MockSender {}

impl MockSender {
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl SendEmail for MockSender {
    async fn send<'a>(&self, message: EmailMessage<'a>) -> Result<(), EmailError> {
        log::info!(
            "Email disabled; dropping message \"{}\" addressed to {} ({} byte body)",
            message.subject,
            message.destination,
            message.body.len(),
        );

        Ok(())
    }
}
