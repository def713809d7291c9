//! Delivery backends

pub mod email;
