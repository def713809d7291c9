//! Guards around an SMTP connection

use lettre::{
    address::Address,
    transport::smtp::{
        authentication::{Credentials, Mechanism},
        client::{SmtpConnection, TlsParameters},
        commands::{Data, Mail, Rcpt},
        extension::{ClientId, Extension},
        response::Response,
        Error,
    },
};
use tracing::{debug, warn};

use super::SmtpConfig;

/// Mechanisms tried in order of preference
const MECHANISMS: &[Mechanism] = &[Mechanism::Plain, Mechanism::Login];

/// An open SMTP session.
///
/// Dropping the session ends it: `QUIT` is sent while the connection is healthy,
/// otherwise the socket is shut down. A session whose STARTTLS upgrade failed is left
/// alone, the connection no longer holds a stream to close.
pub(super) struct Session {
    connection: SmtpConnection,
    poisoned: bool,
}

impl Session {
    /// Connect, read the greeting and send EHLO.
    pub(super) fn connect(config: &SmtpConfig) -> Result<Self, Error> {
        let connection = SmtpConnection::connect(
            config.address.as_str(),
            Some(config.timeout()),
            &config.client_id(),
            None,
            None,
        )?;

        Ok(Self {
            connection,
            poisoned: false,
        })
    }

    /// Whether the server advertised STARTTLS in its EHLO reply
    pub(super) fn offers_starttls(&self) -> bool {
        self.connection
            .server_info()
            .supports_feature(Extension::StartTls)
    }

    /// Upgrade to TLS and repeat EHLO over the encrypted channel.
    ///
    /// Any failure poisons the session: either the connection was already aborted or
    /// the plaintext stream was consumed by the handshake.
    pub(super) fn starttls(
        &mut self,
        parameters: &TlsParameters,
        hello_name: &ClientId,
    ) -> Result<(), Error> {
        let result = self.connection.starttls(parameters, hello_name);
        self.poisoned = result.is_err();

        result
    }

    pub(super) fn authenticate(&mut self, credentials: &Credentials) -> Result<Response, Error> {
        self.connection.auth(MECHANISMS, credentials)
    }

    pub(super) fn mail_from(&mut self, sender: Address) -> Result<Response, Error> {
        self.connection.command(Mail::new(Some(sender), vec![]))
    }

    pub(super) fn rcpt_to(&mut self, recipient: Address) -> Result<Response, Error> {
        self.connection.command(Rcpt::new(recipient, vec![]))
    }

    /// Send `DATA` and hand out the open data channel.
    pub(super) fn data(&mut self) -> Result<DataChannel<'_>, Error> {
        self.connection.command(Data)?;

        Ok(DataChannel {
            connection: &mut self.connection,
            open: true,
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.poisoned {
            debug!("session abandoned after a failed STARTTLS");
            return;
        }

        if self.connection.has_broken() {
            self.connection.abort();
            return;
        }

        match self.connection.quit() {
            Ok(_) => debug!("session closed"),
            Err(err) => warn!(error = %err, "QUIT failed"),
        }
    }
}

/// The message data channel opened by `DATA`.
///
/// Dropping the channel while it is still open tears the connection down, since the
/// server would otherwise keep reading whatever comes next as message content.
pub(super) struct DataChannel<'a> {
    connection: &'a mut SmtpConnection,
    open: bool,
}

impl DataChannel<'_> {
    /// Stream the payload dot-stuffed, send the `CRLF.CRLF` terminator and read the
    /// server's verdict.
    pub(super) fn transfer(mut self, payload: &[u8]) -> Result<Response, Error> {
        let result = self.connection.message(payload);

        // a reply code means the terminator went out and the server answered it
        match &result {
            Ok(_) => self.open = false,
            Err(err) if err.status().is_some() => self.open = false,
            Err(_) => {}
        }

        result
    }
}

impl Drop for DataChannel<'_> {
    fn drop(&mut self) {
        if self.open {
            warn!("data channel left open, dropping the connection");
            self.connection.abort();
        }
    }
}
