// Socket binder module
// Binds descriptors to configured addresses and hands listeners to the engine

use socket2::Socket;

use super::address::{normalize_wildcard, SocketAddress};
use super::engine::SocketEngine;
use super::socket::raw_descriptor;
use crate::error::BindError;
use crate::logger;

/// Where a descriptor should be bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindTarget<'a> {
    /// Configured address text (`*` or empty for all interfaces) and port
    Address { address: &'a str, port: u16 },
    /// Zeroed IPv4 address and port, used by the DNS resolver's UDP socket
    UnspecifiedUdp,
}

impl BindTarget<'_> {
    /// Resolve the target into a concrete socket address
    pub fn resolve(&self) -> Result<SocketAddress, BindError> {
        match *self {
            Self::Address { address, port } => {
                Ok(SocketAddress::from_text(normalize_wildcard(address), port)?)
            }
            Self::UnspecifiedUdp => Ok(SocketAddress::unspecified_udp()),
        }
    }
}

/// Binds sockets through a [`SocketEngine`] using the configured backlog
#[derive(Debug, Clone)]
pub struct SocketBinder<E> {
    engine: E,
    backlog: i32,
}

impl<E: SocketEngine> SocketBinder<E> {
    pub const fn new(engine: E, backlog: i32) -> Self {
        Self { engine, backlog }
    }

    pub const fn backlog(&self) -> i32 {
        self.backlog
    }

    pub fn set_backlog(&mut self, backlog: i32) {
        self.backlog = backlog;
    }

    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// Bind `socket` to `target`, then optionally listen and switch to non-blocking.
    ///
    /// Listen always precedes non-blocking mode. Returns the address bound.
    pub fn bind(
        &self,
        socket: &Socket,
        target: BindTarget<'_>,
        do_listen: bool,
    ) -> Result<SocketAddress, BindError> {
        let addr = match target.resolve() {
            Ok(addr) => addr,
            Err(e) => {
                let descriptor = describe_target(target);
                logger::log_bind_failed(&descriptor, "unknown", &e);
                return Err(e);
            }
        };
        let descriptor = addr.to_user_string();
        let family = addr.family();

        let result = self.bind_resolved(socket, &addr, do_listen);
        match &result {
            Ok(()) => logger::log_bind_success(&descriptor, family, raw_descriptor(socket), do_listen),
            Err(BindError::ListenFailed(e)) => logger::log_listen_failed(&descriptor, family, e),
            Err(e) => logger::log_bind_failed(&descriptor, family, e),
        }
        result.map(|()| addr)
    }

    fn bind_resolved(
        &self,
        socket: &Socket,
        addr: &SocketAddress,
        do_listen: bool,
    ) -> Result<(), BindError> {
        let size = addr.byte_size();
        if size == 0 {
            return Err(BindError::UnsupportedFamily);
        }
        let sockaddr = addr.to_sockaddr()?;

        self.engine
            .bind(socket, &sockaddr, size)
            .map_err(BindError::BindFailed)?;

        if !do_listen {
            return Ok(());
        }

        self.engine
            .listen(socket, self.backlog)
            .map_err(BindError::ListenFailed)?;
        self.engine
            .set_nonblocking(socket)
            .map_err(BindError::NonBlockingFailed)
    }
}

/// Descriptor for a target whose address could not be parsed
fn describe_target(target: BindTarget<'_>) -> String {
    match target {
        BindTarget::Address { address, port } => format!("{address}:{port}"),
        BindTarget::UnspecifiedUdp => "*:0".to_string(),
    }
}
