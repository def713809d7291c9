//! Mailer service

use async_trait::async_trait;

use super::{errors::MailerError, Message};

/// Submits messages from async code
#[async_trait]
pub trait Mailer: Clone + Send + Sync + 'static {
    /// Send a message
    ///
    /// # Arguments
    /// * `message` - The [`Message`] to render and submit.
    ///
    /// # Returns
    /// A [`Result`] that is [`Ok`] once the server accepted the message data.
    async fn send_message(&self, message: Message) -> Result<(), MailerError>;
}
