//! Call-site and invocation descriptors.
//!
//! A [`CallSite`] is the static identity of one wrapped method: its name,
//! declaring namespace and type, visibility and parameter names. The
//! [`intercept!`](crate::intercept) macro generates one `static` site per
//! method so nothing has to be discovered at run time. An [`Invocation`]
//! pairs a site with the argument values of a single call.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::render::ArgValue;

/// Visibility of an intercepted member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Part of the public interface.
    #[default]
    Public,
    /// Not publicly exposed.
    Private,
}

/// Static description of one intercepted method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSite {
    method: &'static str,
    namespace: &'static str,
    type_name: &'static str,
    visibility: Visibility,
    parameters: &'static [&'static str],
}

impl CallSite {
    /// Describe a public method with no declared parameters.
    pub const fn new(
        method: &'static str,
        namespace: &'static str,
        type_name: &'static str,
    ) -> Self {
        Self {
            method,
            namespace,
            type_name,
            visibility: Visibility::Public,
            parameters: &[],
        }
    }

    /// A site that cannot be identified. It is never instrumented.
    pub const fn unknown() -> Self {
        Self::new("", "", "")
    }

    /// Set the declared parameter names, in order.
    pub const fn with_parameters(self, parameters: &'static [&'static str]) -> Self {
        Self { parameters, ..self }
    }

    /// Set the member visibility.
    pub const fn with_visibility(self, visibility: Visibility) -> Self {
        Self { visibility, ..self }
    }

    /// Mark the member as private.
    pub const fn private(self) -> Self {
        self.with_visibility(Visibility::Private)
    }

    /// Method name.
    pub fn method(&self) -> &'static str {
        self.method
    }

    /// Declaring namespace (usually a module path).
    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    /// Declaring type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Member visibility.
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Whether the member is private.
    pub fn is_private(&self) -> bool {
        self.visibility == Visibility::Private
    }

    /// Declared parameter names.
    pub fn parameters(&self) -> &'static [&'static str] {
        self.parameters
    }

    /// Whether the site names a method at all.
    pub fn is_identified(&self) -> bool {
        !self.method.is_empty()
    }

    /// Logical name of the argument at `index`.
    ///
    /// Falls back to `arg<index>` when the signature declares fewer names
    /// than arguments were supplied, or declares an empty name.
    pub fn parameter_name(&self, index: usize) -> Cow<'static, str> {
        match self.parameters.get(index) {
            Some(name) if !name.is_empty() => Cow::Borrowed(name),
            _ => Cow::Owned(format!("arg{index}")),
        }
    }
}

/// Descriptor of a single call: the site plus the borrowed argument values.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    site: &'a CallSite,
    arguments: &'a [ArgValue<'a>],
}

impl<'a> Invocation<'a> {
    /// Describe a call.
    pub fn new(site: &'a CallSite, arguments: &'a [ArgValue<'a>]) -> Self {
        Self { site, arguments }
    }

    /// The static call site.
    pub fn site(&self) -> &'a CallSite {
        self.site
    }

    /// The argument values, in call order.
    pub fn arguments(&self) -> &'a [ArgValue<'a>] {
        self.arguments
    }

    /// Arguments paired with their logical names.
    pub fn named_arguments(&self) -> impl Iterator<Item = (Cow<'static, str>, ArgValue<'a>)> + 'a {
        let site = self.site;
        self.arguments
            .iter()
            .enumerate()
            .map(move |(index, value)| (site.parameter_name(index), *value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static SITE: CallSite = CallSite::new("do_work", "app::services", "Worker")
        .with_parameters(&["x", "y"]);

    #[test]
    fn test_static_site() {
        assert_eq!(SITE.method(), "do_work");
        assert_eq!(SITE.namespace(), "app::services");
        assert_eq!(SITE.type_name(), "Worker");
        assert_eq!(SITE.visibility(), Visibility::Public);
        assert!(SITE.is_identified());
    }

    #[test]
    fn test_parameter_names() {
        assert_eq!(SITE.parameter_name(0), "x");
        assert_eq!(SITE.parameter_name(1), "y");
        assert_eq!(SITE.parameter_name(2), "arg2");
        assert_eq!(SITE.parameter_name(7), "arg7");
    }

    #[test]
    fn test_empty_parameter_name_falls_back() {
        let site = CallSite::new("m", "ns", "T").with_parameters(&["", "b"]);
        assert_eq!(site.parameter_name(0), "arg0");
        assert_eq!(site.parameter_name(1), "b");
    }

    #[test]
    fn test_unknown_site() {
        let site = CallSite::unknown();
        assert!(!site.is_identified());
    }

    #[test]
    fn test_private() {
        let site = CallSite::new("helper", "ns", "T").private();
        assert!(site.is_private());
    }

    #[test]
    fn test_named_arguments() {
        let arguments = [ArgValue::Null, ArgValue::Null, ArgValue::Null];
        let invocation = Invocation::new(&SITE, &arguments);
        let names: Vec<_> = invocation
            .named_arguments()
            .map(|(name, _)| name.into_owned())
            .collect();
        assert_eq!(names, vec!["x", "y", "arg2"]);
    }
}
