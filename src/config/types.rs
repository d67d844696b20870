// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

/// Bind type handled by the client listener path
pub const CLIENT_BIND_TYPE: &str = "clients";

/// Description recorded for listeners without an `ssl` profile
pub const DEFAULT_DESCRIPTION: &str = "plaintext";

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub listen: ListenConfig,
    pub logging: LoggingConfig,
    /// `<bind>` entries in declaration order
    #[serde(default)]
    pub bind: Vec<BindSpec>,
}

/// Listener configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ListenConfig {
    /// Pending-connection queue length passed to listen()
    pub backlog: u32,
}

impl ListenConfig {
    pub fn backlog(&self) -> i32 {
        i32::try_from(self.backlog).unwrap_or(i32::MAX)
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `ircd_listen=debug`
    pub level: String,
}

/// One `<bind>` entry
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct BindSpec {
    /// Port token: `6667`, `6660-6669`, or a comma list of either
    pub port: String,
    /// Address text; `*` or empty binds all interfaces
    #[serde(default)]
    pub address: String,
    /// Listener type; only `clients` (or empty) is bound here
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Opaque label, normally the TLS profile name
    #[serde(default, rename = "ssl")]
    pub description: String,
}

impl BindSpec {
    pub fn new(port: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            address: address.into(),
            kind: String::new(),
            description: String::new(),
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_client_port(&self) -> bool {
        self.kind.is_empty() || self.kind == CLIENT_BIND_TYPE
    }

    /// Description to record on the listener
    pub fn description_or_default(&self) -> &str {
        if self.description.is_empty() {
            DEFAULT_DESCRIPTION
        } else {
            &self.description
        }
    }
}
