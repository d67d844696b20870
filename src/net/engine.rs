// Socket engine module
// The syscall seam between the binder and the event-polling engine

use std::io;

use socket2::{SockAddr, Socket};

/// Syscalls the binder needs from the event engine.
///
/// The event engine owns polling; listeners handed to it must be
/// non-blocking, so `set_nonblocking` always follows a successful `listen`.
pub trait SocketEngine {
    /// Bind `socket` to `addr`. `size` is the length of the family-specific structure.
    fn bind(&self, socket: &Socket, addr: &SockAddr, size: usize) -> io::Result<()>;

    fn listen(&self, socket: &Socket, backlog: i32) -> io::Result<()>;

    fn set_nonblocking(&self, socket: &Socket) -> io::Result<()>;
}

/// Engine that issues the real syscalls through `socket2`
#[derive(Debug, Default, Clone, Copy)]
pub struct Socket2Engine;

impl SocketEngine for Socket2Engine {
    fn bind(&self, socket: &Socket, addr: &SockAddr, size: usize) -> io::Result<()> {
        if size != addr.len() as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "socket address length mismatch",
            ));
        }
        socket.bind(addr)
    }

    fn listen(&self, socket: &Socket, backlog: i32) -> io::Result<()> {
        socket.listen(backlog)
    }

    fn set_nonblocking(&self, socket: &Socket) -> io::Result<()> {
        socket.set_nonblocking(true)
    }
}
