//! Formal parameter descriptions for callables.
//!
//! A [`ParameterList`] is what the tree builder hands over for every callable: the
//! positional parameters (some of which may be tuple parameters), the optional `*` and `**`
//! catch-alls and the default values of the trailing parameters.

use std::{borrow::Cow, fmt};

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::{constants::ConstantValue, errors::SignatureError};

/// One formal parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterSpec {
    /// A named parameter.
    Plain(String),
    /// A tuple parameter: its value is unpacked positionally into the children.
    Nested(Vec<ParameterSpec>),
}

impl ParameterSpec {
    /// Creates a named parameter.
    #[must_use]
    pub fn plain(name: impl Into<String>) -> Self {
        Self::Plain(name.into())
    }

    /// Creates a tuple parameter from its children.
    #[must_use]
    pub fn nested(children: impl IntoIterator<Item = Self>) -> Self {
        Self::Nested(children.into_iter().collect())
    }

    /// Returns the name used for this parameter's slot in emitted code.
    ///
    /// Tuple parameters have no source name. They are named after their leaves joined by
    /// `__`, prefixed with one `_` per nesting level, so `((a, b), c)` is `__a__b__c` and
    /// its first child `_a__b`. The prefix keeps `(a,)` apart from `a`.
    #[must_use]
    pub fn name(&self) -> Cow<'_, str> {
        match self {
            Self::Plain(name) => Cow::Borrowed(name),
            Self::Nested(_) => Cow::Owned(format!(
                "{}{}",
                "_".repeat(self.nesting_depth()),
                self.leaf_names().join("__")
            )),
        }
    }

    /// Returns the name used in error messages: the plain name or the tuple's source form.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.to_string()
    }

    /// Returns whether this is a tuple parameter.
    #[must_use]
    pub fn is_nested(&self) -> bool {
        matches!(self, Self::Nested(_))
    }

    /// Returns the children of a tuple parameter, or an empty slice for a named one.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match self {
            Self::Plain(_) => &[],
            Self::Nested(children) => children,
        }
    }

    /// Returns every named parameter below (or at) this one, depth first.
    #[must_use]
    pub fn leaf_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_leaf_names(&mut names);
        names
    }

    fn collect_leaf_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Self::Plain(name) => names.push(name),
            Self::Nested(children) => {
                for child in children {
                    child.collect_leaf_names(names);
                }
            }
        }
    }

    /// Depth of tuple nesting: 0 for a named parameter.
    #[must_use]
    pub fn nesting_depth(&self) -> usize {
        match self {
            Self::Plain(_) => 0,
            Self::Nested(children) => 1 + children.iter().map(Self::nesting_depth).max().unwrap_or(0),
        }
    }
}

impl fmt::Display for ParameterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(name) => f.write_str(name),
            Self::Nested(children) => {
                f.write_str("(")?;
                for (index, child) in children.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{child}")?;
                }
                if children.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// The default value of one trailing parameter.
///
/// The value is computed once, when the callable object is created, and is shared by every
/// call until the callable object goes away. Binding code only ever borrows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultBinding {
    /// A literal known at compile time; emitted code references it through the constant table.
    Literal(ConstantValue),
    /// An expression evaluated at creation time; stored in the callable's owning context.
    Computed,
}

/// The complete signature of a callable.
///
/// Defaults align with the trailing top-level parameters: with `n` parameters and `d`
/// defaults, parameter `i` has default `i - (n - d)` when `i >= n - d`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterList {
    top_level: Vec<ParameterSpec>,
    star_list: Option<String>,
    star_dict: Option<String>,
    defaults: Vec<DefaultBinding>,
}

impl ParameterList {
    /// Creates a parameter list with the given positional parameters and nothing else.
    #[must_use]
    pub fn new(top_level: impl IntoIterator<Item = ParameterSpec>) -> Self {
        Self {
            top_level: top_level.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Adds a `*name` parameter collecting excess positional arguments.
    #[must_use]
    pub fn with_star_list(mut self, name: impl Into<String>) -> Self {
        self.star_list = Some(name.into());
        self
    }

    /// Adds a `**name` parameter collecting unmatched keyword arguments.
    #[must_use]
    pub fn with_star_dict(mut self, name: impl Into<String>) -> Self {
        self.star_dict = Some(name.into());
        self
    }

    /// Sets the defaults of the trailing parameters, left to right.
    #[must_use]
    pub fn with_defaults(mut self, defaults: impl IntoIterator<Item = DefaultBinding>) -> Self {
        self.defaults = defaults.into_iter().collect();
        self
    }

    #[must_use]
    pub fn top_level(&self) -> &[ParameterSpec] {
        &self.top_level
    }

    #[must_use]
    pub fn star_list(&self) -> Option<&str> {
        self.star_list.as_deref()
    }

    #[must_use]
    pub fn star_dict(&self) -> Option<&str> {
        self.star_dict.as_deref()
    }

    #[must_use]
    pub fn defaults(&self) -> &[DefaultBinding] {
        &self.defaults
    }

    /// Returns whether the callable takes no parameters at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.top_level.is_empty() && self.star_list.is_none() && self.star_dict.is_none()
    }

    /// Number of top-level parameters that must be given: those without a default.
    #[must_use]
    pub fn required_count(&self) -> usize {
        self.top_level.len().saturating_sub(self.defaults.len())
    }

    /// Returns the index into [`Self::defaults`] for the top-level parameter at `position`.
    #[must_use]
    pub fn default_index(&self, position: usize) -> Option<usize> {
        let first = self.required_count();
        (position >= first && position < self.top_level.len()).then(|| position - first)
    }

    /// Returns whether the first parameter is the receiver, making the callable usable as a
    /// bound method.
    #[must_use]
    pub fn has_receiver(&self, receiver_name: &str) -> bool {
        matches!(self.top_level.first(), Some(ParameterSpec::Plain(name)) if name == receiver_name)
    }

    /// Returns the names the callable's body sees, in declaration order.
    ///
    /// Tuple parameters contribute their leaves; the catch-alls come last.
    #[must_use]
    pub fn parameter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.top_level.iter().flat_map(ParameterSpec::leaf_names).collect();
        names.extend(self.star_list.as_deref());
        names.extend(self.star_dict.as_deref());
        names
    }

    /// Checks that the list can be lowered to binding code.
    ///
    /// Rejects duplicate names anywhere in the list, more defaults than parameters, empty
    /// tuple parameters, tuple nesting deeper than `max_nesting_depth` and names that are
    /// not identifiers.
    pub fn validate(&self, function: &str, max_nesting_depth: usize) -> Result<(), SignatureError> {
        if self.defaults.len() > self.top_level.len() {
            return Err(SignatureError::TooManyDefaults {
                function: function.to_owned(),
                defaults: self.defaults.len(),
                parameters: self.top_level.len(),
            });
        }

        for spec in &self.top_level {
            check_nested(spec, function)?;
            let depth = spec.nesting_depth();
            if depth > max_nesting_depth {
                return Err(SignatureError::NestingTooDeep {
                    function: function.to_owned(),
                    limit: max_nesting_depth,
                    depth,
                });
            }
        }

        let mut seen = AHashSet::new();
        for name in self.parameter_names() {
            if !is_identifier(name) {
                return Err(SignatureError::InvalidName {
                    function: function.to_owned(),
                    name: name.to_owned(),
                });
            }
            if !seen.insert(name.to_owned()) {
                return Err(SignatureError::DuplicateParameter {
                    function: function.to_owned(),
                    name: name.to_owned(),
                });
            }
        }
        let mut nested = Vec::new();
        collect_nested(&self.top_level, &mut nested);
        for spec in nested {
            let name = spec.name().into_owned();
            if !seen.insert(name.clone()) {
                return Err(SignatureError::DuplicateParameter {
                    function: function.to_owned(),
                    name,
                });
            }
        }
        Ok(())
    }
}

fn collect_nested<'a>(specs: &'a [ParameterSpec], out: &mut Vec<&'a ParameterSpec>) {
    for spec in specs {
        if spec.is_nested() {
            out.push(spec);
            collect_nested(spec.children(), out);
        }
    }
}

fn check_nested(spec: &ParameterSpec, function: &str) -> Result<(), SignatureError> {
    if let ParameterSpec::Nested(children) = spec {
        if children.is_empty() {
            return Err(SignatureError::EmptyNested {
                function: function.to_owned(),
            });
        }
        for child in children {
            check_nested(child, function)?;
        }
    }
    Ok(())
}

/// ASCII identifier check; emitted code embeds names in C identifiers.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first == '_' || first.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_parameter_names() {
        let spec = ParameterSpec::nested([
            ParameterSpec::nested([ParameterSpec::plain("a"), ParameterSpec::plain("b")]),
            ParameterSpec::plain("c"),
        ]);
        assert_eq!(spec.name(), "__a__b__c");
        assert_eq!(spec.display_name(), "((a, b), c)");
        assert_eq!(spec.nesting_depth(), 2);
    }

    #[test]
    fn defaults_align_to_trailing_parameters() {
        let list = ParameterList::new([
            ParameterSpec::plain("a"),
            ParameterSpec::plain("b"),
            ParameterSpec::plain("c"),
        ])
        .with_defaults([DefaultBinding::Computed]);
        assert_eq!(list.required_count(), 2);
        assert_eq!(list.default_index(1), None);
        assert_eq!(list.default_index(2), Some(0));
        assert_eq!(list.default_index(3), None);
    }

    #[test]
    fn duplicate_leaf_is_rejected() {
        let list = ParameterList::new([
            ParameterSpec::nested([ParameterSpec::plain("a"), ParameterSpec::plain("b")]),
            ParameterSpec::plain("a"),
        ]);
        assert!(matches!(
            list.validate("f", 8),
            Err(SignatureError::DuplicateParameter { name, .. }) if name == "a"
        ));
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a-b"));
    }
}
