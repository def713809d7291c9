//! Mail errors

use std::fmt;

use lettre::{address::AddressError, transport::smtp::Error as SmtpError};
use thiserror::Error;

/// A stage of a submission attempt, in the order they are passed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// The connection is open and the server greeted us
    Connected,

    /// STARTTLS was performed, or the server does not offer it
    SecurityNegotiated,

    /// The credential was accepted, or none is configured
    Authenticated,

    /// The server accepted the sender and every recipient
    EnvelopeAccepted,

    /// The server accepted the message data
    DataSent,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Connected => "connect",
            Stage::SecurityNegotiated => "security negotiation",
            Stage::Authenticated => "authentication",
            Stage::EnvelopeAccepted => "envelope",
            Stage::DataSent => "data transfer",
        };

        f.write_str(name)
    }
}

/// The message field an address was read from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressField {
    /// The `From` field
    From,

    /// The `To` field
    To,

    /// The `CC` field
    Cc,
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressField::From => f.write_str("From"),
            AddressField::To => f.write_str("To"),
            AddressField::Cc => f.write_str("CC"),
        }
    }
}

/// Errors that end a submission attempt.
///
/// None of these are retried; the caller decides what to do next.
#[derive(Debug, Error)]
pub enum SendError {
    /// The server could not be reached or did not complete the greeting
    #[error("could not connect to {address}")]
    Connection {
        /// The configured `host:port`
        address: String,

        /// The underlying error
        #[source]
        source: SmtpError,
    },

    /// The STARTTLS upgrade failed.
    ///
    /// Only the rendered cause is kept: a failed handshake would otherwise hold the
    /// connection open for as long as the error lives.
    #[error("could not upgrade the connection to TLS: {reason}")]
    SecurityUpgrade {
        /// The underlying error, rendered
        reason: String,
    },

    /// The server rejected the credential
    #[error("authentication failed")]
    Authentication(#[source] SmtpError),

    /// A message field does not hold valid addresses
    #[error("invalid {field} address {value:?}")]
    AddressParse {
        /// The field holding the value
        field: AddressField,

        /// The raw field value
        value: String,

        /// The underlying error
        #[source]
        source: AddressError,
    },

    /// The server rejected the envelope sender or a recipient
    #[error("the server rejected {address}")]
    EnvelopeRejected {
        /// The rejected address
        address: String,

        /// The underlying error
        #[source]
        source: SmtpError,
    },

    /// Transferring the message data failed
    #[error("could not transfer the message")]
    Transfer(#[source] SmtpError),
}

impl SendError {
    /// The stage that was being attempted when the error occurred.
    pub fn stage(&self) -> Stage {
        match self {
            SendError::Connection { .. } => Stage::Connected,
            SendError::SecurityUpgrade { .. } => Stage::SecurityNegotiated,
            SendError::Authentication(_) => Stage::Authenticated,
            SendError::AddressParse { .. } | SendError::EnvelopeRejected { .. } => {
                Stage::EnvelopeAccepted
            }
            SendError::Transfer(_) => Stage::DataSent,
        }
    }
}

/// Errors from the async [`Mailer`](super::Mailer) facade
#[derive(Debug, Error)]
pub enum MailerError {
    /// The submission attempt failed
    #[error(transparent)]
    Send(#[from] SendError),

    /// The blocking submission task panicked or was cancelled
    #[error("the submission task did not complete")]
    Interrupted(#[source] tokio::task::JoinError),
}

/// Errors in header lines read from configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    /// The line has no `:` between name and value
    #[error("header {0:?} is not of the form `Name: value`")]
    MissingSeparator(String),

    /// The name contains characters not allowed in a header field name
    #[error("invalid header name {0:?}")]
    InvalidName(String),

    /// The value of the named header contains a line break
    #[error("the value of header {0:?} contains a line break")]
    InvalidValue(String),
}
