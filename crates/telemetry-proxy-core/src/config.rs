//! Configuration types for the interception engine.
//!
//! [`ProxyOptions`] is immutable once handed to an engine and is shared
//! read-only across every call that engine intercepts. It can be built in
//! code or bound from the `TelemetryProxy` section of a TOML or JSON document.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Name of the configuration section the options are bound from.
pub const SECTION: &str = "TelemetryProxy";

/// Parameter name fragments treated as secrets when redaction is enabled.
pub const SECRET_NAMES: [&str; 4] = ["secret", "password", "connectionstring", "accesskey"];

/// Replacement value for redacted arguments.
pub const REDACTED: &str = "***";

/// How ignore entries are matched against namespaces and type names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// An entry matches itself and anything nested below it, where nesting is
    /// separated by `::` or `.`. `"Foo"` matches `"Foo::Bar"` but not `"FooBar"`.
    #[default]
    Segment,
    /// An entry matches any name it is a literal string prefix of.
    /// `"Foo"` matches both `"Foo::Bar"` and `"FooBar"`.
    Prefix,
}

/// Options controlling which calls are instrumented.
///
/// Empty sets mean "ignore nothing"; the default instruments every call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProxyOptions {
    /// Namespaces (module paths) whose calls are not instrumented.
    pub ignored_namespaces: BTreeSet<String>,

    /// Declaring type names whose calls are not instrumented.
    #[serde(alias = "ignoredTypeNames")]
    pub ignored_types: BTreeSet<String>,

    /// Skip members that are not publicly exposed.
    pub ignore_private: bool,

    /// How ignore entries are matched.
    pub match_mode: MatchMode,

    /// Replace secret-looking arguments with [`REDACTED`].
    pub redact_secrets: bool,
}

impl ProxyOptions {
    /// Create options that instrument everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create options from explicit ignore lists.
    pub fn from_lists<N, T>(namespaces: N, types: T, ignore_private: bool) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            ignored_namespaces: namespaces.into_iter().map(Into::into).collect(),
            ignored_types: types.into_iter().map(Into::into).collect(),
            ignore_private,
            ..Self::default()
        }
    }

    /// Process-wide default options, created on first use.
    pub fn shared_default() -> Arc<ProxyOptions> {
        static DEFAULT: OnceLock<Arc<ProxyOptions>> = OnceLock::new();
        Arc::clone(DEFAULT.get_or_init(|| Arc::new(ProxyOptions::default())))
    }

    /// Ignore a namespace and everything nested below it.
    pub fn ignore_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.ignored_namespaces.insert(namespace.into());
        self
    }

    /// Ignore a declaring type.
    pub fn ignore_type(mut self, type_name: impl Into<String>) -> Self {
        self.ignored_types.insert(type_name.into());
        self
    }

    /// Enable or disable skipping of private members.
    pub fn with_ignore_private(mut self, enabled: bool) -> Self {
        self.ignore_private = enabled;
        self
    }

    /// Set the entry matching mode.
    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    /// Enable or disable secret redaction.
    pub fn with_redact_secrets(mut self, enabled: bool) -> Self {
        self.redact_secrets = enabled;
        self
    }

    /// Check whether a parameter's value should be masked.
    pub fn redacts(&self, parameter: &str) -> bool {
        if !self.redact_secrets {
            return false;
        }
        let normalized: String = parameter
            .chars()
            .filter(|c| *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        SECRET_NAMES.iter().any(|secret| normalized.contains(secret))
    }

    /// Bind options from the `[TelemetryProxy]` table of a TOML document.
    ///
    /// A document without that table yields the defaults.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        #[derive(Deserialize)]
        struct Document {
            #[serde(rename = "TelemetryProxy", default)]
            section: Option<ProxyOptions>,
        }

        let document: Document = toml::from_str(source)?;
        Ok(document.section.unwrap_or_default())
    }

    /// Bind options from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Bind options from the `TelemetryProxy` key of a JSON document.
    pub fn from_json(document: &serde_json::Value) -> ConfigResult<Self> {
        match document.get(SECTION) {
            Some(section) => Ok(serde_json::from_value(section.clone())?),
            None => Ok(Self::default()),
        }
    }

    /// Serialize these options as a TOML document with the section header.
    pub fn to_toml_string(&self) -> String {
        let mut document = toml::Table::new();
        if let Ok(toml::Value::Table(section)) = toml::Value::try_from(self) {
            document.insert(SECTION.to_string(), toml::Value::Table(section));
        }
        document.to_string()
    }
}
