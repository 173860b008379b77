//! Resolves every declared field of a configuration against an [`EnvStore`].
//!
//! Loading fails fast: the first failing field aborts the call, fields
//! assigned before it keep their new values.

use crate::EnvConfig;
use crate::error::ConfigError;
use crate::field::FieldOptions;
use crate::kind::KnownType;
use crate::registry::Registrar;
use crate::store::EnvStore;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Options for a single `load` call
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Tried in front of every variable name before the bare name
    pub prefix: Option<String>,
    /// Env file to merge before resolving, `.env` lookup when unset.
    ///
    /// `${VAR}` references inside the file are expanded by `dotenvy` against
    /// the process environment and earlier lines of the same file, never
    /// against the store being filled.
    pub path: Option<PathBuf>,
    /// Whether an env file is consulted at all
    pub load_env: bool,
    /// Keep variables in the environment even for `unset` fields
    pub disable_unset: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            prefix: None,
            path: None,
            load_env: true,
            disable_unset: false,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn load_env(mut self, load_env: bool) -> Self {
        self.load_env = load_env;
        self
    }

    pub fn disable_unset(mut self, disable_unset: bool) -> Self {
        self.disable_unset = disable_unset;
        self
    }
}

/// Populate `config` from `store`
pub fn load<C, S>(config: &mut C, store: &mut S, options: &LoadOptions) -> Result<(), ConfigError>
where
    C: EnvConfig,
    S: EnvStore,
{
    let mut registrar = Registrar::new(C::fields());
    config.configure(&mut registrar);
    let registry = registrar.finish()?;

    if options.load_env {
        merge_env_file(store, options.path.as_deref())?;
    }

    for (name, field) in registry.iter() {
        if let Some(value) = resolve_field(&*config, store, options, name, field)? {
            config.assign(name, value)?;
        }
    }

    Ok(())
}

/// Final value for one field, `None` when the current value is kept
fn resolve_field<C, S>(
    config: &C,
    store: &mut S,
    options: &LoadOptions,
    name: &str,
    field: &FieldOptions,
) -> Result<Option<Value>, ConfigError>
where
    C: EnvConfig,
    S: EnvStore,
{
    let (key, raw) = lookup(store, options.prefix.as_deref(), field.lookup_name(name));

    if raw.is_some() && field.unsets() && !options.disable_unset {
        store.remove(&key);
        debug!(field = name, env = %key, "unset environment variable after read");
    }

    let Some(raw) = raw else {
        if config.current(name).is_some() {
            trace!(field = name, env = %key, "keeping current value");
            return Ok(None);
        }
        if field.optional {
            trace!(field = name, env = %key, "applying kind default");
            return Ok(Some(default_for(field)));
        }
        return Err(ConfigError::MissingEnvVar { key });
    };

    if field.unsets() {
        debug!(field = name, env = %key, kind = %field.kind, "resolved environment variable");
    } else {
        debug!(field = name, env = %key, kind = %field.kind, value = %raw, "resolved environment variable");
    }

    let value = match field.separator.as_deref().filter(|s| !s.is_empty()) {
        Some(separator) => parse_list(&key, field.kind, &raw, separator)?,
        None => parse_scalar(&key, field.kind, &raw)?,
    };

    if let Some(validator) = &field.validator {
        validator(&value)?;
    }

    Ok(Some(value))
}

/// Resolved lookup name and raw value, preferring the prefixed variable
fn lookup<S: EnvStore>(store: &S, prefix: Option<&str>, name: &str) -> (String, Option<String>) {
    if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
        let prefixed = format!("{}{}", prefix, name);
        if let Some(value) = store.get(&prefixed) {
            return (prefixed, Some(value));
        }
    }
    (name.to_string(), store.get(name))
}

fn default_for(field: &FieldOptions) -> Value {
    if field.separator.as_deref().is_some_and(|s| !s.is_empty()) {
        Value::Array(Vec::new())
    } else {
        field.kind.default_value()
    }
}

/// Parse as JSON where possible, otherwise keep the raw string
fn parse_scalar(key: &str, kind: KnownType, raw: &str) -> Result<Value, ConfigError> {
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));

    kind.validate(&value).map_err(|e| ConfigError::InvalidType {
        key: key.to_string(),
        index: None,
        value: render(&value),
        reason: e.to_string(),
    })?;
    Ok(value)
}

/// Split, trim and coerce every element before validating any of them
fn parse_list(key: &str, kind: KnownType, raw: &str, separator: &str) -> Result<Value, ConfigError> {
    let items = raw
        .split(separator)
        .map(str::trim)
        .enumerate()
        .map(|(index, part)| {
            kind.coerce(part).map_err(|reason| ConfigError::MalformedValue {
                key: key.to_string(),
                index,
                value: Value::String(part.to_string()).to_string(),
                reason,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    for (index, item) in items.iter().enumerate() {
        kind.validate(item).map_err(|e| ConfigError::InvalidType {
            key: key.to_string(),
            index: Some(index),
            value: render(item),
            reason: e.to_string(),
        })?;
    }

    Ok(Value::Array(items))
}

/// JSON text of `value` with whole-valued floats written as integers
fn render(value: &Value) -> String {
    normalize(value.clone()).to_string()
}

fn normalize(value: Value) -> Value {
    match value {
        Value::Number(n) => match n.as_f64() {
            // Exact below 2^53
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => {
                Value::from(f as i64)
            }
            _ => Value::Number(n),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, normalize(v))).collect()),
        other => other,
    }
}

/// Merge `KEY=VALUE` lines from an env file without overriding existing variables
fn merge_env_file<S: EnvStore>(store: &mut S, path: Option<&Path>) -> Result<(), ConfigError> {
    let shown = path.map_or_else(|| ".env".to_string(), |p| p.display().to_string());
    let env_file_error = |e: dotenvy::Error| ConfigError::EnvFile {
        path: shown.clone(),
        reason: e.to_string(),
    };

    let iter = match path {
        Some(path) => dotenvy::from_path_iter(path).map_err(env_file_error)?,
        None => match dotenvy::dotenv_iter() {
            Ok(iter) => iter,
            Err(e) if e.not_found() => {
                trace!("no .env file found");
                return Ok(());
            }
            Err(e) => return Err(env_file_error(e)),
        },
    };

    let mut merged = 0usize;
    for item in iter {
        let (key, value) = item.map_err(env_file_error)?;
        if !store.contains(&key) {
            store.set(&key, &value);
            merged += 1;
        }
    }

    debug!(path = %shown, merged, "merged env file into environment");
    Ok(())
}
