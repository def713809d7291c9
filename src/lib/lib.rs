#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Composes multipart e-mail messages and submits them to a mail server over SMTP.

pub mod domain;
pub mod infrastructure;
