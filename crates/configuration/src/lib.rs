use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use error::ConfigError;
pub use logging::init_tracing;
pub use settings::{
    AllocationSettings, Config, DatabaseSettings, IngestSettings, LogSettings, ServerSettings,
};

/// Prefix of the environment variables that override file settings,
/// e.g. `FXDASH__SERVER__ADDR=127.0.0.1:8080`.
pub const ENV_PREFIX: &str = "FXDASH";

/// Loads the application configuration.
///
/// Sources, later ones winning:
/// 1. built-in defaults,
/// 2. the given file, or `config.toml` in the working directory if present,
/// 3. `FXDASH__SECTION__KEY` environment variables.
///
/// The merged result is validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name("config.toml").required(false),
    };

    let builder = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::CanonicalField;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[server]\naddr = \"127.0.0.1:8080\"").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.server.addr, "127.0.0.1:8080");
        assert_eq!(config.server.body_limit_mb, 50);
        assert_eq!(config.ingest.insert_chunk_size, 1000);
        assert_eq!(config.allocation.capacity_percentile, dec!(0.95));
    }

    #[test]
    fn extra_aliases_are_resolved_to_canonical_fields() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[ingest.extra_aliases]\namount = [\"Notional\"]").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        let aliases = config.ingest.aliases().unwrap();
        assert_eq!(aliases, vec![(CanonicalField::Amount, vec!["Notional".to_string()])]);
    }

    #[test]
    fn unknown_alias_field_is_a_validation_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[ingest.extra_aliases]\nnotional = [\"Notional\"]").unwrap();

        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn inverted_share_bounds_are_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[allocation]\nmin_share = 0.6\nmax_share = 0.4").unwrap();

        assert!(load_config(Some(file.path())).is_err());
    }

    #[test]
    fn body_limit_is_bounded() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[server]\nbody_limit_mb = 4096").unwrap();
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let mut config = Config::default();
        config.server.body_limit_mb = usize::MAX;
        assert!(config.validate().is_err());
        assert_eq!(config.server.body_limit_bytes(), usize::MAX);
        config.server.body_limit_mb = 2;
        assert_eq!(config.server.body_limit_bytes(), 2 * 1024 * 1024);
    }

    #[test]
    fn explicit_url_wins_over_environment() {
        let mut config = Config::default();
        config.database.url = Some("postgres://localhost/fx".to_string());
        assert_eq!(config.database_url().unwrap(), "postgres://localhost/fx");
    }
}
