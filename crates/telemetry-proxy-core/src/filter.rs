//! Filter policy deciding which calls are instrumented.

use std::sync::Arc;

use crate::config::{MatchMode, ProxyOptions};
use crate::site::{CallSite, Visibility};

/// Pure predicate over [`ProxyOptions`] and a call site.
///
/// Filtering never fails and has no side effects: the same site and options
/// always produce the same answer.
#[derive(Debug, Clone)]
pub struct FilterPolicy {
    options: Arc<ProxyOptions>,
}

impl FilterPolicy {
    /// Create a policy over shared options.
    pub fn new(options: Arc<ProxyOptions>) -> Self {
        Self { options }
    }

    /// The options this policy evaluates.
    pub fn options(&self) -> &ProxyOptions {
        &self.options
    }

    /// Decide whether a call through `site` must skip instrumentation.
    ///
    /// Sites that cannot be identified are always skipped.
    pub fn should_ignore(&self, site: &CallSite) -> bool {
        if !site.is_identified() {
            return true;
        }
        self.is_ignored(site.namespace(), site.type_name(), site.visibility())
    }

    /// Evaluate the rules against an explicit namespace, type and visibility.
    pub fn is_ignored(&self, namespace: &str, type_name: &str, visibility: Visibility) -> bool {
        self.is_namespace_ignored(namespace)
            || self.is_type_ignored(type_name)
            || self.is_visibility_ignored(visibility)
    }

    /// Whether `namespace` equals or descends from an ignored namespace.
    pub fn is_namespace_ignored(&self, namespace: &str) -> bool {
        let mode = self.options.match_mode;
        self.options
            .ignored_namespaces
            .iter()
            .any(|entry| matches_entry(mode, entry, namespace))
    }

    /// Whether `type_name` equals or descends from an ignored type name.
    pub fn is_type_ignored(&self, type_name: &str) -> bool {
        let mode = self.options.match_mode;
        self.options
            .ignored_types
            .iter()
            .any(|entry| matches_entry(mode, entry, type_name))
    }

    /// Whether members of this visibility are skipped.
    pub fn is_visibility_ignored(&self, visibility: Visibility) -> bool {
        visibility == Visibility::Private && self.options.ignore_private
    }
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self::new(ProxyOptions::shared_default())
    }
}

/// Match a single ignore entry against a name.
///
/// Empty entries never match.
pub fn matches_entry(mode: MatchMode, entry: &str, name: &str) -> bool {
    if entry.is_empty() {
        return false;
    }
    let Some(rest) = name.strip_prefix(entry) else {
        return false;
    };
    match mode {
        MatchMode::Prefix => true,
        MatchMode::Segment => rest.is_empty() || rest.starts_with("::") || rest.starts_with('.'),
    }
}
