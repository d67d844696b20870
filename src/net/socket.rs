// Socket factory module
// Opens sockets for the address family implied by configuration text

use std::time::Duration;

use socket2::{Domain, Socket, Type};

use crate::error::SocketCreateError;
use crate::logger;

/// Linger applied to every new socket so close does not hang in a half-closed state
pub const LINGER: Duration = Duration::from_secs(1);

/// Pick the domains to try, in order, for a textual bind address.
///
/// A `:` anywhere in the text means IPv6. An empty address tries IPv6 first
/// when the build supports it, then falls back to IPv4.
pub fn candidate_domains(address: &str) -> &'static [Domain] {
    if address.is_empty() {
        if cfg!(feature = "ipv6") {
            &[Domain::IPV6, Domain::IPV4]
        } else {
            &[Domain::IPV4]
        }
    } else if address.contains(':') {
        &[Domain::IPV6]
    } else {
        &[Domain::IPV4]
    }
}

/// Open a socket of the given type for `address` and apply the standard options.
pub fn open_socket(address: &str, ty: Type) -> Result<Socket, SocketCreateError> {
    let mut last_err = None;

    for &domain in candidate_domains(address) {
        match Socket::new(domain, ty, None) {
            Ok(socket) => {
                configure(&socket);
                return Ok(socket);
            }
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err
        .unwrap_or_else(|| std::io::Error::from(std::io::ErrorKind::Unsupported))
        .into())
}

/// Open a TCP listening candidate for `address`
pub fn open_stream_socket(address: &str) -> Result<Socket, SocketCreateError> {
    open_socket(address, Type::STREAM)
}

/// Raw descriptor number, for logs and status output
#[cfg(unix)]
pub fn raw_descriptor(socket: &Socket) -> i64 {
    use std::os::fd::AsRawFd;
    i64::from(socket.as_raw_fd())
}

/// Raw descriptor number, for logs and status output
#[cfg(windows)]
pub fn raw_descriptor(socket: &Socket) -> i64 {
    use std::os::windows::io::AsRawSocket;
    i64::try_from(socket.as_raw_socket()).unwrap_or(-1)
}

/// Apply the standard options. A failed option is logged and the socket is still usable.
fn configure(socket: &Socket) {
    // SO_REUSEADDR: a restarted daemon can rebind while old sockets sit in TIME_WAIT
    apply_option("SO_REUSEADDR", socket.set_reuse_address(true));
    // l_onoff must be 1 here; 0 is not BSD compatible
    apply_option("SO_LINGER", socket.set_linger(Some(LINGER)));
}

fn apply_option(option: &str, result: std::io::Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            logger::log_socket_option_failed(option, &e);
            false
        }
    }
}
