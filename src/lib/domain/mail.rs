//! Mail messages and their MIME rendering.

mod boundary;
mod headers;
mod mailer;
mod message;
mod writer;

pub mod errors;

pub use boundary::{BoundaryGenerator, RandomBoundary, BOUNDARY_LENGTH};
pub use errors::{AddressField, HeaderError, MailerError, SendError, Stage};
pub use headers::ExtraHeaders;
pub use mailer::Mailer;
pub use message::{File, Message};
pub use writer::MessageWriter;
