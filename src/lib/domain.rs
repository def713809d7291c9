//! Domain types: messages, their MIME rendering and the mailer contract.

pub mod mail;
