//! The submission state machine

use lettre::{
    message::{Mailbox, Mailboxes},
    transport::smtp::client::TlsParameters,
};
use tracing::debug;

use crate::domain::mail::{AddressField, Message, SendError, Stage};

use super::{session::Session, SmtpConfig};

/// Where a submission attempt stands.
///
/// Every live state owns the session, so leaving the machine by any path drops the
/// session and ends it.
enum State {
    Connected(Session),
    SecurityNegotiated(Session),
    Authenticated(Session),
    EnvelopeAccepted(Session),
    DataSent(Session),
    Delivered,
    Failed(SendError),
}

/// One attempt at submitting a rendered message
pub(super) struct Submission<'a> {
    config: &'a SmtpConfig,
    message: &'a Message,
    payload: &'a [u8],
}

impl<'a> Submission<'a> {
    pub(super) fn new(config: &'a SmtpConfig, message: &'a Message, payload: &'a [u8]) -> Self {
        Self {
            config,
            message,
            payload,
        }
    }

    /// Drive the attempt from connecting to delivery, stopping at the first failure.
    pub(super) fn run(self) -> Result<(), SendError> {
        let mut state = match self.connect() {
            Ok(session) => State::Connected(session),
            Err(err) => State::Failed(err),
        };

        loop {
            state = match state {
                State::Connected(session) => {
                    self.advance(session, Self::negotiate_security, State::SecurityNegotiated)
                }
                State::SecurityNegotiated(session) => {
                    self.advance(session, Self::authenticate, State::Authenticated)
                }
                State::Authenticated(session) => {
                    self.advance(session, Self::exchange_envelope, State::EnvelopeAccepted)
                }
                State::EnvelopeAccepted(session) => {
                    self.advance(session, Self::transfer, State::DataSent)
                }
                State::DataSent(session) => {
                    drop(session);
                    State::Delivered
                }
                State::Delivered => return Ok(()),
                State::Failed(err) => {
                    debug!(stage = %err.stage(), error = %err, "submission failed");
                    return Err(err);
                }
            };
        }
    }

    fn advance(
        &self,
        mut session: Session,
        step: fn(&Self, &mut Session) -> Result<Stage, SendError>,
        next: fn(Session) -> State,
    ) -> State {
        match step(self, &mut session) {
            Ok(stage) => {
                debug!(%stage, "stage complete");
                next(session)
            }
            Err(err) => State::Failed(err),
        }
    }

    fn connect(&self) -> Result<Session, SendError> {
        let session = Session::connect(self.config).map_err(|source| SendError::Connection {
            address: self.config.address.clone(),
            source,
        })?;

        debug!(stage = %Stage::Connected, "stage complete");

        Ok(session)
    }

    fn negotiate_security(&self, session: &mut Session) -> Result<Stage, SendError> {
        if !session.offers_starttls() {
            debug!("STARTTLS not offered, continuing in plaintext");
            return Ok(Stage::SecurityNegotiated);
        }

        let parameters = TlsParameters::builder(self.config.host().to_string())
            .dangerous_accept_invalid_certs(!self.config.verify_tls)
            .build()
            .map_err(security_upgrade)?;

        session
            .starttls(&parameters, &self.config.client_id())
            .map_err(security_upgrade)?;

        Ok(Stage::SecurityNegotiated)
    }

    fn authenticate(&self, session: &mut Session) -> Result<Stage, SendError> {
        let Some(credentials) = self.config.credentials() else {
            debug!("no credential configured, submitting anonymously");
            return Ok(Stage::Authenticated);
        };

        session
            .authenticate(&credentials)
            .map_err(SendError::Authentication)?;

        Ok(Stage::Authenticated)
    }

    fn exchange_envelope(&self, session: &mut Session) -> Result<Stage, SendError> {
        let sender = parse_mailbox(AddressField::From, &self.message.from)?;

        session
            .mail_from(sender.email.clone())
            .map_err(|source| SendError::EnvelopeRejected {
                address: sender.email.to_string(),
                source,
            })?;

        let mut recipients = parse_mailboxes(AddressField::To, &self.message.to)?;
        if let Some(cc) = self.message.cc() {
            recipients.extend(parse_mailboxes(AddressField::Cc, cc)?);
        }

        for recipient in recipients {
            session
                .rcpt_to(recipient.email.clone())
                .map_err(|source| SendError::EnvelopeRejected {
                    address: recipient.email.to_string(),
                    source,
                })?;
        }

        Ok(Stage::EnvelopeAccepted)
    }

    fn transfer(&self, session: &mut Session) -> Result<Stage, SendError> {
        session
            .data()
            .and_then(|channel| channel.transfer(self.payload))
            .map_err(SendError::Transfer)?;

        Ok(Stage::DataSent)
    }
}

/// A failed handshake error can own the half-open socket, so only its message is kept
/// and the socket closes here.
fn security_upgrade(err: lettre::transport::smtp::Error) -> SendError {
    SendError::SecurityUpgrade {
        reason: format!("{err:#}"),
    }
}

fn parse_mailbox(field: AddressField, value: &str) -> Result<Mailbox, SendError> {
    value
        .parse()
        .map_err(|source| SendError::AddressParse {
            field,
            value: value.to_string(),
            source,
        })
}

fn parse_mailboxes(field: AddressField, value: &str) -> Result<Vec<Mailbox>, SendError> {
    let invalid = |source| SendError::AddressParse {
        field,
        value: value.to_string(),
        source,
    };

    let mailboxes: Vec<Mailbox> = value
        .parse::<Mailboxes>()
        .map_err(invalid)?
        .into_iter()
        .collect();

    if mailboxes.is_empty() {
        return Err(invalid(lettre::address::AddressError::MissingParts));
    }

    Ok(mailboxes)
}
