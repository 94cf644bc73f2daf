//! Configuration of the call-binding generator.

use serde::{Deserialize, Serialize};

/// Default limit on tuple-parameter nesting.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 32;

/// Identifier prefixes of the functions handed to the surrounding code generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPointPrefixes {
    /// Prefix of the plain-call entry point.
    pub plain: String,
    /// Prefix of the bound-method entry point.
    pub method: String,
    /// Prefix of the implementation function both entry points call.
    pub implementation: String,
}

impl Default for EntryPointPrefixes {
    fn default() -> Self {
        Self {
            plain: "_fparse_".to_owned(),
            method: "_mparse_".to_owned(),
            implementation: "impl_".to_owned(),
        }
    }
}

/// Options for [`CallBindingGenerator`](crate::CallBindingGenerator).
///
/// Use `CodegenOptions::default()` for the conventional setup, or adjust it with the
/// builder methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenOptions {
    /// Name of the first parameter that marks a callable as a method.
    pub receiver_name: String,
    /// Deepest tuple-parameter nesting accepted.
    pub max_nesting_depth: usize,
    /// Spaces per indentation level in emitted code.
    pub indent_width: usize,
    pub entry_point_prefixes: EntryPointPrefixes,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            receiver_name: "self".to_owned(),
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            indent_width: 4,
            entry_point_prefixes: EntryPointPrefixes::default(),
        }
    }
}

impl CodegenOptions {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the receiver parameter name.
    #[must_use]
    pub fn receiver_name(mut self, name: impl Into<String>) -> Self {
        self.receiver_name = name.into();
        self
    }

    /// Sets the tuple-parameter nesting limit.
    #[must_use]
    pub fn max_nesting_depth(mut self, limit: usize) -> Self {
        self.max_nesting_depth = limit;
        self
    }

    /// Sets the indentation width of emitted code.
    #[must_use]
    pub fn indent_width(mut self, width: usize) -> Self {
        self.indent_width = width;
        self
    }

    /// Sets the entry-point identifier prefixes.
    #[must_use]
    pub fn entry_point_prefixes(mut self, prefixes: EntryPointPrefixes) -> Self {
        self.entry_point_prefixes = prefixes;
        self
    }

    /// Reads options from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Writes options as JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let options = CodegenOptions::from_json(r#"{"receiver_name": "cls"}"#).unwrap();
        assert_eq!(options.receiver_name, "cls");
        assert_eq!(options.max_nesting_depth, DEFAULT_MAX_NESTING_DEPTH);
        assert_eq!(options.entry_point_prefixes.plain, "_fparse_");
    }
}
