//! SMTP submission

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use clap::{ArgAction, Parser};
use lettre::transport::smtp::{authentication::Credentials, extension::ClientId};
use tracing::{info, instrument};

use crate::domain::mail::{
    BoundaryGenerator, ExtraHeaders, HeaderError, Mailer, MailerError, Message, MessageWriter,
    RandomBoundary, SendError,
};

use submission::Submission;

mod session;
mod submission;

#[cfg(test)]
mod test_server;

/// SMTP configuration
#[derive(Clone, Debug, PartialEq, Eq, Parser)]
pub struct SmtpConfig {
    /// The server to submit to, as `host:port`
    #[clap(long = "smtp-address", env = "SMTP_ADDRESS")]
    pub address: String,

    /// The SMTP username
    #[clap(long = "smtp-user", env = "SMTP_USER")]
    pub username: Option<String>,

    /// The SMTP password
    #[clap(long = "smtp-password", env = "SMTP_PASSWORD")]
    pub password: Option<String>,

    /// Verify the server certificate after STARTTLS
    #[clap(
        long = "smtp-verify-tls",
        env = "SMTP_VERIFY_TLS",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub verify_tls: bool,

    /// The name sent with EHLO, defaults to the system hostname
    #[clap(long = "smtp-hello-name", env = "SMTP_HELLO_NAME")]
    pub hello_name: Option<String>,

    /// Deadline in seconds for connecting and for every read and write
    #[clap(long = "smtp-timeout", env = "SMTP_TIMEOUT", default_value_t = 30)]
    pub timeout: u64,

    /// Extra `Name: value` headers added to every message; repeat the flag, or put
    /// one header per line in the environment variable
    #[clap(
        long = "smtp-header",
        env = "SMTP_HEADERS",
        value_delimiter = '\n',
        value_parser = ExtraHeaders::parse_line
    )]
    pub headers: Vec<(String, String)>,
}

impl SmtpConfig {
    /// Configuration for `address` with anonymous submission and default settings.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            username: None,
            password: None,
            verify_tls: true,
            hello_name: None,
            timeout: 30,
            headers: Vec::new(),
        }
    }

    /// Add an extra header after validating it.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, HeaderError> {
        let header = ExtraHeaders::parse_line(&format!("{name}: {value}"))?;
        self.headers.push(header);

        Ok(self)
    }

    /// The host part of the address, used as the TLS server name.
    pub fn host(&self) -> &str {
        let address = self.address.as_str();

        if let Some(bracketed) = address.strip_prefix('[') {
            return bracketed
                .split_once(']')
                .map_or(bracketed, |(host, _)| host);
        }

        address.rsplit_once(':').map_or(address, |(host, _)| host)
    }

    /// The credential, present only when both username and password are set.
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => {
                Some(Credentials::new(username.clone(), password.clone()))
            }
            _ => None,
        }
    }

    /// The client identity sent with EHLO
    pub fn client_id(&self) -> ClientId {
        match &self.hello_name {
            Some(name) => ClientId::Domain(name.clone()),
            None => ClientId::default(),
        }
    }

    /// The I/O deadline
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Renders messages and submits them to one configured SMTP server.
///
/// The configuration and extra headers are fixed at construction and shared by
/// every clone, so a sender can be used from several threads at once. Every call to
/// [`Sender::send`] opens its own connection.
pub struct Sender<G = RandomBoundary> {
    config: Arc<SmtpConfig>,
    headers: Arc<ExtraHeaders>,
    writer: Arc<MessageWriter<G>>,
}

impl Sender {
    /// Create a sender using random boundary tokens
    pub fn new(config: SmtpConfig) -> Self {
        Self::with_writer(config, MessageWriter::new())
    }
}

impl<G: BoundaryGenerator> Sender<G> {
    /// Create a sender rendering messages with `writer`
    pub fn with_writer(config: SmtpConfig, writer: MessageWriter<G>) -> Self {
        let headers = config.headers.iter().cloned().collect();

        Self {
            config: Arc::new(config),
            headers: Arc::new(headers),
            writer: Arc::new(writer),
        }
    }

    /// The configuration this sender submits with
    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }

    /// The headers added to every message
    pub fn extra_headers(&self) -> &ExtraHeaders {
        &self.headers
    }

    /// Render `message` and make a single attempt to submit it.
    ///
    /// Blocks until the server accepted the message data or a stage failed. The
    /// connection is closed before this returns, with `QUIT` whenever the session is
    /// still usable.
    #[instrument(skip_all, fields(message_id = %message.id, server = %self.config.address))]
    pub fn send(&self, message: &Message) -> Result<(), SendError> {
        let payload = self.writer.render(message, &self.headers);

        Submission::new(&self.config, message, &payload).run()?;

        info!("message submitted");

        Ok(())
    }
}

impl<G> Clone for Sender<G> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            headers: Arc::clone(&self.headers),
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<G> fmt::Debug for Sender<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("address", &self.config.address)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<G: BoundaryGenerator + 'static> Mailer for Sender<G> {
    async fn send_message(&self, message: Message) -> Result<(), MailerError> {
        let sender = self.clone();

        tokio::task::spawn_blocking(move || sender.send(&message))
            .await
            .map_err(MailerError::Interrupted)??;

        Ok(())
    }
}
