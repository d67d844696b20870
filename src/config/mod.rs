// Configuration module entry point
// Loads listener configuration from file and environment

mod types;

pub use types::{
    BindSpec, Config, ListenConfig, LoggingConfig, CLIENT_BIND_TYPE, DEFAULT_DESCRIPTION,
};

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File, FileFormat};

/// Default config file (without extension)
pub const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(File::with_name(config_path).required(false))
            .add_source(Environment::with_prefix("IRCD").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Parse configuration from TOML text, with the usual defaults applied
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        config::Config::builder()
            .set_default("listen.backlog", 128)?
            .set_default("logging.level", "info")
    }

    /// `<bind>` entries in declaration order
    pub fn bind_specs(&self) -> &[BindSpec] {
        &self.bind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg.listen.backlog(), 128);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.bind_specs().is_empty());
    }

    #[test]
    fn test_bind_entries_keep_order() {
        let cfg = Config::from_toml_str(
            r#"
            [listen]
            backlog = 32

            [[bind]]
            port = 6667
            address = "*"
            type = "clients"

            [[bind]]
            port = "6697,7000-7001"
            address = "::1"
            ssl = "gnutls"

            [[bind]]
            port = "7000"
            type = "servers"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.listen.backlog(), 32);
        let specs = cfg.bind_specs();
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].port, "6667");
        assert_eq!(specs[0].address, "*");
        assert!(specs[0].is_client_port());
        assert_eq!(specs[0].description_or_default(), DEFAULT_DESCRIPTION);
        assert_eq!(specs[1].port, "6697,7000-7001");
        assert!(specs[1].is_client_port());
        assert_eq!(specs[1].description_or_default(), "gnutls");
        assert!(!specs[2].is_client_port());
        assert_eq!(specs[2].address, "");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let cfg = Config::load_from("/nonexistent/ircd-listen-config").unwrap();
        assert_eq!(cfg.listen.backlog(), 128);
    }
}
