//! Declarative, typed configuration loaded from environment variables.
//!
//! A configuration declares its fields with a kind (string, number, boolean,
//! object or secret) and per-field options. Loading reads each variable,
//! coerces and validates it against the declared kind, applies defaults,
//! and assigns the result onto the configuration.
//!
//! ```rust
//! use envprop::{EnvConfig, LoadOptions};
//!
//! #[derive(Debug, EnvConfig)]
//! pub struct ServerConfig {
//!     #[env(default = 8080u16, doc = "Port to listen on")]
//!     pub port: u16,
//!
//!     #[env(optional, separator = ",")]
//!     pub allowed_hosts: Vec<String>,
//! }
//!
//! # temp_env::with_vars([("PORT", Some("9000")), ("ALLOWED_HOSTS", Some("a, b"))], || {
//! let config = ServerConfig::from_env(&LoadOptions::new().load_env(false)).unwrap();
//! assert_eq!(config.port, 9000);
//! assert_eq!(config.allowed_hosts, vec!["a", "b"]);
//! # });
//! ```

pub mod error;
pub mod field;
pub mod kind;
pub mod loader;
pub mod registry;
pub mod store;

// Re-export main types
pub use error::ConfigError;
pub use field::{FieldOptions, Validator};
pub use kind::KnownType;
pub use loader::LoadOptions;
pub use registry::{FieldRegistry, Registrar};
pub use serde_json::Value;
pub use store::{EnvStore, MemoryEnv, ProcessEnv};

// Re-export derive macro
pub use envprop_macros::EnvConfig;

/// A configuration whose fields are populated from environment variables
///
/// Implemented by `#[derive(EnvConfig)]`. Manual implementations can register
/// fields imperatively from [`configure`](EnvConfig::configure).
pub trait EnvConfig: Sized {
    /// Fields declared statically for this type, ancestors already merged
    fn fields() -> FieldRegistry;

    /// Setup hook run before every load.
    ///
    /// Overrides must end up calling the default implementation of the type
    /// they build on (ultimately [`Registrar::configure_base`]), otherwise
    /// loading fails with [`ConfigError::ConfigureNotCalled`].
    fn configure(&self, registrar: &mut Registrar) {
        registrar.configure_base();
    }

    /// Current value of a field, `None` when it holds no default
    fn current(&self, name: &str) -> Option<Value>;

    /// Store a loaded value into a field
    fn assign(&mut self, name: &str, value: Value) -> Result<(), ConfigError>;

    /// Load from the process environment
    fn load(&mut self, options: &LoadOptions) -> Result<(), ConfigError> {
        loader::load(self, &mut ProcessEnv, options)
    }

    /// Load from an arbitrary variable store
    ///
    /// Env file substitutions still resolve against the process environment,
    /// see [`LoadOptions::path`].
    fn load_from<S: EnvStore>(
        &mut self,
        store: &mut S,
        options: &LoadOptions,
    ) -> Result<(), ConfigError> {
        loader::load(self, store, options)
    }

    /// Construct with defaults and load from the process environment
    fn from_env(options: &LoadOptions) -> Result<Self, ConfigError>
    where
        Self: Default,
    {
        let mut config = Self::default();
        config.load(options)?;
        Ok(config)
    }

    /// Like [`from_env`](EnvConfig::from_env), panicking with a readable report
    fn from_env_or_panic(options: &LoadOptions) -> Self
    where
        Self: Default,
    {
        match Self::from_env(options) {
            Ok(config) => config,
            Err(e) => panic!("Configuration failed:\n  - {}", e.report()),
        }
    }
}
