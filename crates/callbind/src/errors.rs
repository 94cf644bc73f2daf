//! Error types for call binding and signature validation.
//!
//! Two universes exist. [`BindingError`] is what emitted code raises at call time; it is an
//! ordinary Python exception from the caller's point of view and carries CPython-compatible
//! wording. [`SignatureError`] is returned at generation time when a parameter list cannot be
//! lowered at all.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// The closed set of call-time binding failures.
///
/// The string representation matches the variant name exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum BindingErrorKind {
    /// A parameter received a value both positionally and by keyword.
    DuplicateBinding,
    /// A keyword matched no parameter and there is no `**` catch-all.
    UnexpectedKeyword,
    /// More positional arguments than slots and there is no `*` catch-all.
    TooManyPositional,
    /// One or more parameters without default received no value.
    MissingRequired,
    /// A tuple parameter's value did not unpack to the expected number of elements.
    NestedUnpackMismatch,
}

/// Python exception classes raised by emitted binding code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ExcType {
    TypeError,
    ValueError,
}

/// What a tuple parameter's value turned out to be when it failed to unpack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnpackShape {
    /// The iterator ran out after this many elements.
    TooFew(usize),
    /// The iterator still had elements after the expected count.
    TooMany,
    /// The value cannot be iterated; carries its type name.
    NotIterable(String),
}

/// A call-time binding failure, as raised by emitted code.
///
/// Exactly one of these aborts a call; the callable's body never runs after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingError {
    DuplicateBinding {
        function: String,
        parameter: String,
    },
    UnexpectedKeyword {
        function: String,
        keyword: String,
    },
    /// `min == max` when the callable has no defaults.
    TooManyPositional {
        function: String,
        min: usize,
        max: usize,
        given: usize,
    },
    /// Names are in declaration order and never empty.
    MissingRequired {
        function: String,
        parameters: Vec<String>,
    },
    NestedUnpackMismatch {
        parameter: String,
        expected: usize,
        actual: UnpackShape,
    },
}

impl BindingError {
    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> BindingErrorKind {
        match self {
            Self::DuplicateBinding { .. } => BindingErrorKind::DuplicateBinding,
            Self::UnexpectedKeyword { .. } => BindingErrorKind::UnexpectedKeyword,
            Self::TooManyPositional { .. } => BindingErrorKind::TooManyPositional,
            Self::MissingRequired { .. } => BindingErrorKind::MissingRequired,
            Self::NestedUnpackMismatch { .. } => BindingErrorKind::NestedUnpackMismatch,
        }
    }

    /// Returns the Python exception class emitted code raises for this error.
    ///
    /// Unpacking a non-iterable is a `TypeError`; a wrong element count is a `ValueError`.
    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        match self {
            Self::NestedUnpackMismatch {
                actual: UnpackShape::TooFew(_) | UnpackShape::TooMany,
                ..
            } => ExcType::ValueError,
            _ => ExcType::TypeError,
        }
    }
}

impl Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateBinding { function, parameter } => {
                write!(f, "{function}() got multiple values for argument '{parameter}'")
            }
            Self::UnexpectedKeyword { function, keyword } => {
                write!(f, "{function}() got an unexpected keyword argument '{keyword}'")
            }
            Self::TooManyPositional {
                function,
                min,
                max,
                given,
            } => {
                let verb = if *given == 1 { "was" } else { "were" };
                if min == max {
                    let plural = if *max == 1 { "" } else { "s" };
                    write!(
                        f,
                        "{function}() takes {max} positional argument{plural} but {given} {verb} given"
                    )
                } else {
                    write!(
                        f,
                        "{function}() takes from {min} to {max} positional arguments but {given} {verb} given"
                    )
                }
            }
            Self::MissingRequired { function, parameters } => {
                let count = parameters.len();
                let plural = if count == 1 { "" } else { "s" };
                write!(
                    f,
                    "{function}() missing {count} required positional argument{plural}: {}",
                    format_param_names(parameters)
                )
            }
            Self::NestedUnpackMismatch { expected, actual, .. } => match actual {
                UnpackShape::TooFew(got) => {
                    write!(f, "not enough values to unpack (expected {expected}, got {got})")
                }
                UnpackShape::TooMany => write!(f, "too many values to unpack (expected {expected})"),
                UnpackShape::NotIterable(type_name) => {
                    write!(f, "cannot unpack non-iterable {type_name} object")
                }
            },
        }
    }
}

impl std::error::Error for BindingError {}

/// Formats parameter names the way CPython lists missing arguments.
///
/// - `["a"]` -> `'a'`
/// - `["a", "b"]` -> `'a' and 'b'`
/// - `["a", "b", "c"]` -> `'a', 'b', and 'c'`
pub(crate) fn format_param_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [only] => format!("'{only}'"),
        [first, second] => format!("'{first}' and '{second}'"),
        [rest @ .., last] => {
            let rest: Vec<_> = rest.iter().map(|n| format!("'{n}'")).collect();
            format!("{}, and '{last}'", rest.join(", "))
        }
    }
}

/// A parameter list that cannot be lowered to binding code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureError {
    /// Two parameters (at any nesting level) share a name.
    DuplicateParameter { function: String, name: String },
    /// More default values than top-level parameters.
    TooManyDefaults {
        function: String,
        defaults: usize,
        parameters: usize,
    },
    /// A tuple parameter with no children.
    EmptyNested { function: String },
    /// Tuple parameters nested deeper than the configured limit.
    NestingTooDeep {
        function: String,
        limit: usize,
        depth: usize,
    },
    /// A name that cannot be used as an identifier in emitted code.
    InvalidName { function: String, name: String },
}

impl Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateParameter { function, name } => {
                write!(f, "duplicate argument '{name}' in definition of {function}()")
            }
            Self::TooManyDefaults {
                function,
                defaults,
                parameters,
            } => write!(
                f,
                "{function}() has {defaults} default values for {parameters} positional parameters"
            ),
            Self::EmptyNested { function } => {
                write!(f, "empty tuple parameter in definition of {function}()")
            }
            Self::NestingTooDeep { function, limit, depth } => write!(
                f,
                "tuple parameters of {function}() nest {depth} levels deep, limit is {limit}"
            ),
            Self::InvalidName { function, name } => {
                write!(f, "invalid parameter name '{name}' in definition of {function}()")
            }
        }
    }
}

impl std::error::Error for SignatureError {}
