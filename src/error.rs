use colored::Colorize;
use std::fmt;

/// Errors that can occur during configuration loading
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A required environment variable is missing and the field has no default
    MissingEnvVar { key: String },
    /// A value was found but does not match the declared kind
    InvalidType {
        key: String,
        /// Position inside a separator-delimited value
        index: Option<usize>,
        /// JSON rendering of the offending value
        value: String,
        reason: String,
    },
    /// An element of an object-typed list could not be parsed as JSON
    MalformedValue {
        key: String,
        index: usize,
        value: String,
        reason: String,
    },
    /// A kind name that is not one of the supported kinds
    InvalidKind { name: String },
    /// A `configure` override did not reach the base hook
    ConfigureNotCalled,
    /// Raised by a field validator, message is passed through untouched
    Validation(String),
    /// The loaded value could not be stored in the Rust field
    Decode { key: String, reason: String },
    /// The configuration has no field with this name
    UnknownField(String),
    /// The env file could not be read or parsed
    EnvFile { path: String, reason: String },
}

impl ConfigError {
    /// Build the error a field validator returns on failure
    pub fn validation(message: impl Into<String>) -> Self {
        ConfigError::Validation(message.into())
    }

    /// Environment variable the error refers to, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            ConfigError::MissingEnvVar { key }
            | ConfigError::InvalidType { key, .. }
            | ConfigError::MalformedValue { key, .. }
            | ConfigError::Decode { key, .. }
            | ConfigError::UnknownField(key) => Some(key.as_str()),
            _ => None,
        }
    }

    /// Coloured, multi-line description meant for terminals
    pub fn report(&self) -> String {
        match self {
            ConfigError::MissingEnvVar { key } => format!(
                "{}: Is missing from environment and is required",
                key.magenta().bold()
            ),
            ConfigError::InvalidType {
                key,
                index,
                value,
                reason,
            } => {
                let target = match index {
                    Some(i) => format!("{}[{}]", key, i),
                    None => key.clone(),
                };
                format!(
                    "{}: Invalid value {}\n\tReason: {}",
                    target.magenta().bold(),
                    value.red(),
                    reason
                )
            }
            ConfigError::MalformedValue {
                key,
                index,
                value,
                reason,
            } => format!(
                "{}: Malformed value {}\n\tReason: {}",
                format!("{}[{}]", key, index).magenta().bold(),
                value.red(),
                reason
            ),
            ConfigError::Decode { key, reason } => format!(
                "{}: Value does not fit the field\n\tReason: {}",
                key.magenta().bold(),
                reason
            ),
            ConfigError::EnvFile { path, reason } => format!(
                "{}: Env file could not be loaded\n\tReason: {}",
                path.cyan(),
                reason
            ),
            other => other.to_string().yellow().to_string(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingEnvVar { key } => {
                write!(f, "Missing required env variable {}", key)
            }
            ConfigError::InvalidType {
                key,
                index: Some(index),
                value,
                reason,
            }
            | ConfigError::MalformedValue {
                key,
                index,
                value,
                reason,
            } => write!(f, "Invalid type for {}[{}] = {}: {}", key, index, value, reason),
            ConfigError::InvalidType {
                key,
                index: None,
                value,
                reason,
            } => write!(f, "Invalid type for {} = {}: {}", key, value, reason),
            ConfigError::InvalidKind { name } => write!(f, "Invalid type {}", name),
            ConfigError::ConfigureNotCalled => write!(
                f,
                "configure() not called, did you forget to call the base configure()?"
            ),
            ConfigError::Validation(message) => f.write_str(message),
            ConfigError::Decode { key, reason } => {
                write!(f, "Cannot assign {}: {}", key, reason)
            }
            ConfigError::UnknownField(key) => write!(f, "Unknown configuration field {}", key),
            ConfigError::EnvFile { path, reason } => {
                write!(f, "Failed to load env file {}: {}", path, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
