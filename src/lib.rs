//! Listening-socket core for an IRC daemon.
//!
//! Parses `<bind>` addresses into IPv4/IPv6 socket addresses, opens and binds
//! client listeners, and reconciles the active listener set against the
//! configuration on every rehash without touching unchanged ports.

pub mod config;
pub mod error;
pub mod logger;
pub mod net;
pub mod server;

pub use error::{AddressError, BindError, ReconcileError, SocketCreateError};
