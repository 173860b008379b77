use crate::error::ConfigError;
use crate::kind::KnownType;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{fmt, sync::Arc};

/// Custom check run on the final value of a field
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), ConfigError> + Send + Sync>;

/// Declared options of a single configuration field
#[derive(Clone)]
pub struct FieldOptions {
    /// Kind the value is coerced to and validated against
    pub kind: KnownType,
    /// Absent values fall back to the kind's default instead of failing
    pub optional: bool,
    /// Remove the variable from the environment once it has been read
    pub unset: bool,
    /// Variable name to read instead of the field name
    pub env_name: Option<String>,
    /// Split the raw value on this delimiter and treat it as a list
    pub separator: Option<String>,
    pub validator: Option<Validator>,
    /// Human-readable description, used for generated docs
    pub description: Option<String>,
}

impl FieldOptions {
    pub fn new(kind: KnownType) -> Self {
        Self {
            kind,
            optional: false,
            unset: kind.forces_unset(),
            env_name: None,
            separator: None,
            validator: None,
            description: None,
        }
    }

    pub fn string() -> Self {
        Self::new(KnownType::String)
    }

    pub fn number() -> Self {
        Self::new(KnownType::Number)
    }

    pub fn boolean() -> Self {
        Self::new(KnownType::Boolean)
    }

    pub fn object() -> Self {
        Self::new(KnownType::Object)
    }

    /// A string field that is always unset after reading
    pub fn secret() -> Self {
        Self::new(KnownType::Secret)
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.optional = false;
        self
    }

    pub fn unset(mut self) -> Self {
        self.unset = true;
        self
    }

    pub fn env_name(mut self, name: impl Into<String>) -> Self {
        self.env_name = Some(name.into());
        self
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<(), ConfigError> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_required(&self) -> bool {
        !self.optional
    }

    /// Whether the variable is removed after reading, secrets always are
    pub fn unsets(&self) -> bool {
        self.unset || self.kind.forces_unset()
    }

    /// Variable name looked up for a field registered as `field_name`
    pub fn lookup_name<'a>(&'a self, field_name: &'a str) -> &'a str {
        self.env_name.as_deref().unwrap_or(field_name)
    }
}

impl fmt::Debug for FieldOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldOptions")
            .field("kind", &self.kind)
            .field("optional", &self.optional)
            .field("unset", &self.unset)
            .field("env_name", &self.env_name)
            .field("separator", &self.separator)
            .field("validator", &self.validator.as_ref().map(|_| "<fn>"))
            .field("description", &self.description)
            .finish()
    }
}

/// Current value of a field as seen by the loader, `None` when undefined
pub fn encode<T: Serialize>(value: &T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(Value::Null) | Err(_) => None,
        Ok(value) => Some(value),
    }
}

/// Convert a loaded value into the Rust type of the field
pub fn decode<T: DeserializeOwned>(key: &str, value: Value) -> Result<T, ConfigError> {
    serde_json::from_value(value).map_err(|e| ConfigError::Decode {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
