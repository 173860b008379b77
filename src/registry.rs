use crate::error::ConfigError;
use crate::field::FieldOptions;
use std::{fs, path::Path};

/// Ordered mapping from field name to its declared options
///
/// Iteration follows first-declaration order. Redeclaring a name replaces its
/// options but keeps its position.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    entries: Vec<(String, FieldOptions)>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `options` under `name`, replacing any earlier declaration
    pub fn declare(&mut self, name: impl Into<String>, options: FieldOptions) -> &mut Self {
        let name = name.into();
        match self.position(&name) {
            Some(i) => self.entries[i].1 = options,
            None => self.entries.push((name, options)),
        }
        self
    }

    /// Chainable form of [`declare`](Self::declare)
    pub fn with(mut self, name: impl Into<String>, options: FieldOptions) -> Self {
        self.declare(name, options);
        self
    }

    /// Add the declarations of an ancestor that are not shadowed here
    pub fn merge_ancestor(&mut self, ancestor: &FieldRegistry) -> &mut Self {
        for (name, options) in &ancestor.entries {
            if self.position(name).is_none() {
                self.entries.push((name.clone(), options.clone()));
            }
        }
        self
    }

    /// Merge a lineage ordered from most-derived to least-derived.
    ///
    /// The first registry in the lineage that declares a name wins.
    pub fn resolve<'a>(lineage: impl IntoIterator<Item = &'a FieldRegistry>) -> Self {
        let mut result = Self::new();
        for registry in lineage {
            result.merge_ancestor(registry);
        }
        result
    }

    pub fn get(&self, name: &str) -> Option<&FieldOptions> {
        self.position(name).map(|i| &self.entries[i].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldOptions)> {
        self.entries.iter().map(|(name, options)| (name.as_str(), options))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }

    /// Markdown summary of the declared variables
    pub fn render_docs(&self) -> String {
        let mut md = String::new();

        md.push_str("## Environment Variables Summary\n\n");
        md.push_str("| Variable | Type | Required | Separator | Description |\n");
        md.push_str("|----------|------|----------|-----------|-------------|\n");
        for (name, field) in self.iter() {
            let required_str = if field.is_required() { "Yes" } else { "No" };
            let separator = match field.separator.as_deref() {
                Some(s) => format!("`{}`", s),
                None => "-".to_string(),
            };
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                field.lookup_name(name),
                field.kind,
                required_str,
                separator,
                field.description.as_deref().unwrap_or("-"),
            ));
        }

        md
    }

    /// Write the documentation produced by [`render_docs`](Self::render_docs)
    ///
    /// # Example
    /// ```no_run
    /// use envprop::{FieldOptions, FieldRegistry};
    ///
    /// let registry = FieldRegistry::new()
    ///     .with("PORT", FieldOptions::number().description("Server port"));
    /// registry.write_docs("CONFIG.md").unwrap();
    /// ```
    pub fn write_docs(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        fs::write(path, self.render_docs())
    }
}

/// Collects imperative registrations made from [`EnvConfig::configure`]
///
/// [`EnvConfig::configure`]: crate::EnvConfig::configure
#[derive(Debug)]
pub struct Registrar {
    registry: FieldRegistry,
    base_configured: bool,
}

impl Registrar {
    /// Start from the statically declared fields of a configuration
    pub fn new(declared: FieldRegistry) -> Self {
        Self {
            registry: declared,
            base_configured: false,
        }
    }

    /// Register a field, later registrations of the same name win
    pub fn register(&mut self, name: impl Into<String>, options: FieldOptions) {
        self.registry.declare(name, options);
    }

    /// Mark the base hook as reached. Called by the default `configure`.
    pub fn configure_base(&mut self) {
        self.base_configured = true;
    }

    pub fn is_base_configured(&self) -> bool {
        self.base_configured
    }

    /// Resulting registry, failing if the configure chain was broken
    pub fn finish(self) -> Result<FieldRegistry, ConfigError> {
        if !self.base_configured {
            return Err(ConfigError::ConfigureNotCalled);
        }
        Ok(self.registry)
    }
}
