//! Logger module
//!
//! Structured logging for the listener core:
//! - Socket bind and listen outcomes
//! - Port reconciliation (bound, retained, removed)
//! - Bookkeeping invariant violations
//!
//! Every event carries the bind descriptor as a field so log lines can be
//! correlated with the operator-facing failure report.

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber
///
/// `RUST_LOG` takes precedence over the configured level. Should be called
/// once at startup; a second call returns an error.
pub fn init(level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| e as Box<dyn std::error::Error>)?;
    Ok(())
}

pub fn log_bind_success(descriptor: &str, family: &str, fd: i64, listening: bool) {
    if listening {
        tracing::debug!(target: "socket", descriptor, family, fd, "New socket binding with listen");
    } else {
        tracing::debug!(target: "socket", descriptor, family, fd, "New socket binding without listen");
    }
}

pub fn log_bind_failed(descriptor: &str, family: &str, err: &dyn std::error::Error) {
    tracing::warn!(target: "socket", descriptor, family, error = %err, "Failed to bind socket");
}

pub fn log_listen_failed(descriptor: &str, family: &str, err: &std::io::Error) {
    tracing::error!(target: "socket", descriptor, family, error = %err, "ERROR in listen()");
}

pub fn log_socket_option_failed(option: &str, err: &std::io::Error) {
    tracing::warn!(target: "socket", option, error = %err, "Unable to set socket option");
}

pub fn log_port_bound(descriptor: &str, description: &str) {
    tracing::info!(target: "socket", descriptor, description, "Listening for clients");
}

pub fn log_port_retained(descriptor: &str) {
    tracing::debug!(target: "socket", descriptor, "Port binding unchanged, keeping it open");
}

pub fn log_port_removed(descriptor: &str) {
    tracing::info!(
        target: "socket",
        descriptor,
        "Port binding was removed from the config file, closing"
    );
}

pub fn log_invariant_violation(descriptor: &str) {
    tracing::error!(
        target: "socket",
        descriptor,
        "Port bindings slipped out of the active set, aborting close!"
    );
}

pub fn log_4in6_address(address: &str) {
    tracing::warn!(
        target: "socket",
        address,
        "Using 4in6 (::ffff:) isn't recommended. You should bind IPv4 addresses directly instead."
    );
}

pub fn log_invalid_port_token(token: &str) {
    tracing::warn!(target: "socket", token, "Ignoring invalid port in bind tag");
}

pub fn log_reconcile_summary(bound: usize, failed: usize, active: usize) {
    if failed == 0 {
        tracing::info!(target: "socket", bound, active, "Port reconciliation complete");
    } else {
        tracing::warn!(target: "socket", bound, failed, active, "Port reconciliation complete with failures");
    }
}

pub fn log_error(message: &str) {
    tracing::error!("{message}");
}

pub fn log_warning(message: &str) {
    tracing::warn!("{message}");
}

pub fn log_info(message: &str) {
    tracing::info!("{message}");
}
