//! CoAP over UDP - Client Library
//!
//! High-level API: a [`Connection`] sends requests, performs block-wise
//! uploads and delivers observe notifications.

mod config;
mod connection;
mod observe;

pub use config::*;
pub use connection::*;
