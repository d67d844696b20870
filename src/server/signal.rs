// Signal handling module
//
// Supported signals:
// - SIGHUP:  Reload configuration and reconcile listening ports
// - SIGUSR1: Log the active port set
// - SIGTERM: Close all listeners and exit
// - SIGINT:  Close all listeners and exit (Ctrl+C)

use std::io;

/// What the daemon should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Reload,
    Status,
    Shutdown,
}

/// Registered signal streams (Unix)
///
/// | Signal  | Event      |
/// |---------|------------|
/// | SIGHUP  | `Reload`   |
/// | SIGUSR1 | `Status`   |
/// | SIGTERM | `Shutdown` |
/// | SIGINT  | `Shutdown` |
#[cfg(unix)]
pub struct SignalHandler {
    hangup: tokio::signal::unix::Signal,
    user1: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalHandler {
    /// Must be called from within a Tokio runtime
    pub fn register() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            hangup: signal(SignalKind::hangup())?,
            user1: signal(SignalKind::user_defined1())?,
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    /// Wait for the next signal. Events are delivered one at a time, so
    /// reconfiguration passes never overlap.
    pub async fn recv(&mut self) -> ControlEvent {
        tokio::select! {
            _ = self.hangup.recv() => ControlEvent::Reload,
            _ = self.user1.recv() => ControlEvent::Status,
            _ = self.terminate.recv() => ControlEvent::Shutdown,
            _ = self.interrupt.recv() => ControlEvent::Shutdown,
        }
    }
}

/// Windows fallback - only handles Ctrl+C
#[cfg(not(unix))]
pub struct SignalHandler;

#[cfg(not(unix))]
impl SignalHandler {
    pub fn register() -> io::Result<Self> {
        Ok(Self)
    }

    pub async fn recv(&mut self) -> ControlEvent {
        // Ctrl+C registration failure leaves nothing to wait on
        let _ = tokio::signal::ctrl_c().await;
        ControlEvent::Shutdown
    }
}
