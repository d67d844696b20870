// Error types
// One enum per layer: address parsing, socket creation, binding, reconciliation

use std::io;

/// Errors converting between textual and socket addresses
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("unsupported address family")]
    UnsupportedFamily,
}

/// No address family could produce a socket descriptor
#[derive(Debug, thiserror::Error)]
#[error("unable to create socket: {source}")]
pub struct SocketCreateError {
    #[from]
    pub source: io::Error,
}

/// Errors binding a descriptor and putting it into listening mode
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("unsupported address family")]
    UnsupportedFamily,

    #[error(transparent)]
    SocketCreate(#[from] SocketCreateError),

    #[error("{0}")]
    BindFailed(io::Error),

    #[error("{0}")]
    ListenFailed(io::Error),

    #[error("unable to set non-blocking mode: {0}")]
    NonBlockingFailed(io::Error),
}

impl From<AddressError> for BindError {
    fn from(err: AddressError) -> Self {
        match err {
            AddressError::InvalidAddress(addr) => Self::InvalidAddress(addr),
            AddressError::UnsupportedFamily => Self::UnsupportedFamily,
        }
    }
}

/// Reconciliation bookkeeping diverged from the live socket set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("port binding {descriptor} slipped out of the active set, aborting close")]
    InvariantViolation { descriptor: String },
}
