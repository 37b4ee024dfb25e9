//! Algorithm names, qualified product names, and declaration-time labels
//!
//! This is the leaf-level name model: every other module names things
//! through [`AlgorithmName`], [`QualifiedName`], and [`SpecifiedLabel`].

use std::cmp::Ordering;
use std::fmt;

/// A `(plugin, algorithm)` pair with a "specified-ness" tag folded into
/// the `Option`s themselves: a `None` field is the wildcard ("either"),
/// both present is "both" specified, one present is "neither" fully
/// specified but still more specific than a double wildcard.
///
/// Two names [`matches`](Self::matches) when every field that is `Some`
/// on *both* sides is equal; a `None` field matches anything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AlgorithmName {
    pub plugin: Option<String>,
    pub algorithm: Option<String>,
}

impl AlgorithmName {
    /// A fully specified name: `plugin:algorithm`.
    pub fn new(plugin: impl Into<String>, algorithm: impl Into<String>) -> Self {
        Self {
            plugin: Some(plugin.into()),
            algorithm: Some(algorithm.into()),
        }
    }

    /// Matches any plugin, a specific algorithm.
    pub fn any_plugin(algorithm: impl Into<String>) -> Self {
        Self {
            plugin: None,
            algorithm: Some(algorithm.into()),
        }
    }

    /// Matches a specific plugin, any algorithm.
    pub fn any_algorithm(plugin: impl Into<String>) -> Self {
        Self {
            plugin: Some(plugin.into()),
            algorithm: None,
        }
    }

    /// Matches anything ("neither" field specified).
    pub fn wildcard() -> Self {
        Self {
            plugin: None,
            algorithm: None,
        }
    }

    /// True when both `plugin` and `algorithm` are present.
    pub fn is_fully_specified(&self) -> bool {
        self.plugin.is_some() && self.algorithm.is_some()
    }

    /// True when every field specified on both sides agrees.
    pub fn matches(&self, other: &AlgorithmName) -> bool {
        match (&self.plugin, &other.plugin) {
            (Some(a), Some(b)) if a != b => return false,
            _ => {}
        }
        match (&self.algorithm, &other.algorithm) {
            (Some(a), Some(b)) if a != b => return false,
            _ => {}
        }
        true
    }

    /// `plugin:algorithm` when fully specified, `None` otherwise.
    ///
    /// Node registration requires a fully specified name (a node has one
    /// concrete identity), so this is the key used by [`crate::catalog::Catalog`].
    pub fn full_name(&self) -> Option<String> {
        match (&self.plugin, &self.algorithm) {
            (Some(p), Some(a)) => Some(format!("{p}:{a}")),
            _ => None,
        }
    }
}

impl fmt::Display for AlgorithmName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.plugin.as_deref().unwrap_or("*"),
            self.algorithm.as_deref().unwrap_or("*")
        )
    }
}

impl PartialOrd for AlgorithmName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AlgorithmName {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.plugin, &self.algorithm).cmp(&(&other.plugin, &other.algorithm))
    }
}

/// A product identified by `(qualifier, name)`, where `qualifier` is the
/// fully specified name of the node that produced it.
///
/// Equality and ordering are lexicographic over `(qualifier, name)`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifiedName {
    pub qualifier: AlgorithmName,
    pub name: String,
}

impl QualifiedName {
    pub fn new(qualifier: AlgorithmName, name: impl Into<String>) -> Self {
        Self {
            qualifier,
            name: name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.qualifier, self.name)
    }
}

/// A declaration-time selector for a product: a bare name (matches any
/// producer) or `plugin:algorithm:name` (matches only that producer).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecifiedLabel {
    pub name: String,
    pub qualifier: Option<AlgorithmName>,
}

impl SpecifiedLabel {
    /// A bare label with no producer qualifier.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            qualifier: None,
        }
    }

    /// Parse either a bare product name or a `plugin:algorithm:product` label.
    pub fn parse(label: &str) -> Self {
        let parts: Vec<&str> = label.split(':').collect();
        match parts.as_slice() {
            [name] => Self::bare(*name),
            [plugin, algorithm, name] => Self {
                name: (*name).to_string(),
                qualifier: Some(AlgorithmName::new(*plugin, *algorithm)),
            },
            _ => Self::bare(label),
        }
    }
}

impl From<&str> for SpecifiedLabel {
    fn from(s: &str) -> Self {
        SpecifiedLabel::parse(s)
    }
}

impl From<String> for SpecifiedLabel {
    fn from(s: String) -> Self {
        SpecifiedLabel::parse(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches_anything() {
        let wildcard = AlgorithmName::wildcard();
        let concrete = AlgorithmName::new("plugin_a", "double");
        assert!(wildcard.matches(&concrete));
        assert!(concrete.matches(&wildcard));
    }

    #[test]
    fn fully_specified_names_must_agree_on_both_fields() {
        let a = AlgorithmName::new("plugin_a", "double");
        let b = AlgorithmName::new("plugin_a", "triple");
        assert!(!a.matches(&b));
    }

    #[test]
    fn partial_names_only_constrain_the_specified_field() {
        let any_plugin = AlgorithmName::any_plugin("double");
        let concrete = AlgorithmName::new("plugin_a", "double");
        assert!(any_plugin.matches(&concrete));

        let other = AlgorithmName::new("plugin_a", "triple");
        assert!(!any_plugin.matches(&other));
    }

    #[test]
    fn full_name_renders_plugin_colon_algorithm() {
        let name = AlgorithmName::new("plugin_a", "double");
        assert_eq!(name.full_name().as_deref(), Some("plugin_a:double"));
        assert_eq!(AlgorithmName::wildcard().full_name(), None);
    }

    #[test]
    fn qualified_name_ordering_is_lexicographic() {
        let a = QualifiedName::new(AlgorithmName::new("p", "a"), "x");
        let b = QualifiedName::new(AlgorithmName::new("p", "a"), "y");
        let c = QualifiedName::new(AlgorithmName::new("p", "b"), "a");
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn label_parses_bare_and_qualified_forms() {
        let bare = SpecifiedLabel::parse("x");
        assert_eq!(bare.name, "x");
        assert!(bare.qualifier.is_none());

        let qualified = SpecifiedLabel::parse("plugin_a:double:y");
        assert_eq!(qualified.name, "y");
        assert_eq!(qualified.qualifier, Some(AlgorithmName::new("plugin_a", "double")));
    }
}
