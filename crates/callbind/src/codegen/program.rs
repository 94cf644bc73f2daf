//! The structured form of an emitted entry point.
//!
//! A [`BindingProgram`] is the binding algorithm for one callable, fully decided at
//! generation time: which slots exist, and the exact sequence of checks and assignments the
//! entry point performs. It is rendered to target source by [`render`](super::render) and
//! can be executed directly by [`runtime`](crate::runtime); both walk the operations in
//! the same order, so they raise the same error for the same call.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Index of a slot in [`BindingProgram::slots`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotId(usize);

impl SlotId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// What a slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotKind {
    /// A named positional parameter.
    Plain,
    /// The value of a tuple parameter, before unpacking.
    Nested,
    /// The `*` catch-all.
    StarList,
    /// The `**` catch-all.
    StarDict,
    /// The receiver of a method entry point, bound before anything else runs.
    Receiver,
}

/// A local variable of the entry point holding one parameter's value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Parameter name; tuple parameters use their joined leaf names.
    pub name: String,
    /// Name shown in error messages.
    pub display_name: String,
    /// Identifier of the local in emitted code.
    pub identifier: String,
    pub kind: SlotKind,
}

/// A named parameter that keyword arguments may address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordTarget {
    pub slot: SlotId,
    /// The interned parameter name. Keyword keys sharing this allocation take the quick path.
    pub name: Arc<str>,
    /// Code name of the name's string constant.
    pub name_constant: String,
}

/// Where a default value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultSource {
    /// A shared immutable constant.
    Constant { code: String },
    /// A field of the callable's owning context.
    Context { field: String },
}

/// A default value reference, by index into the callable's defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultRef {
    pub index: usize,
    pub source: DefaultSource,
}

impl DefaultRef {
    /// The expression emitted code uses to read the default.
    #[must_use]
    pub fn code(&self) -> String {
        match &self.source {
            DefaultSource::Constant { code } => code.clone(),
            DefaultSource::Context { field } => format!("_python_context->{field}"),
        }
    }
}

/// One step of an entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindOp {
    /// The callable takes nothing; any positional or keyword argument is an error.
    RefuseArguments,
    /// Walks the keyword mapping in order, binding named parameters and collecting
    /// everything else into the `**` slot.
    CollectKeywords { star_dict: SlotId, targets: Vec<KeywordTarget> },
    /// Matches every keyword against the named parameters, identity first, then equality.
    /// A keyword matching nothing is an error.
    AssignKeywords { targets: Vec<KeywordTarget> },
    /// Rejects more positional arguments than `max`.
    ///
    /// `min` and `max` count the receiver when there is one, like the error message does.
    CheckPositionalCount { min: usize, max: usize },
    /// Binds positional argument `arg_index` to `slot`, unless fewer were given.
    AssignPositional { slot: SlotId, arg_index: usize },
    /// Collects positional arguments from `first_index` on into the `*` slot.
    CollectStarList {
        slot: SlotId,
        first_index: usize,
        empty_tuple: String,
    },
    /// Fills `slot` from its default if nothing bound it.
    AssignDefault { slot: SlotId, default: DefaultRef },
    /// Reports every listed slot that is still unbound, in one error.
    CheckRequired { slots: Vec<SlotId> },
    /// Unpacks a tuple parameter's value into its children.
    ///
    /// `default` is used when the source slot is unbound; only top-level tuple parameters
    /// have one.
    UnpackNested {
        source: SlotId,
        default: Option<DefaultRef>,
        targets: SmallVec<[SlotId; 4]>,
    },
}

/// One generated entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingProgram {
    pub(crate) identifier: String,
    pub(crate) impl_identifier: String,
    pub(crate) function_name: String,
    pub(crate) context_type: Option<String>,
    pub(crate) is_method: bool,
    pub(crate) slots: Vec<Slot>,
    pub(crate) ops: Vec<BindOp>,
    /// Slots handed to the implementation function, in declaration order.
    pub(crate) call_arguments: Vec<SlotId>,
}

impl BindingProgram {
    /// Identifier of the entry point function.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Identifier of the implementation function the entry point calls.
    #[must_use]
    pub fn impl_identifier(&self) -> &str {
        &self.impl_identifier
    }

    /// Name of the callable, as used in error messages.
    #[must_use]
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Whether this is the method entry point with a pre-bound receiver.
    #[must_use]
    pub fn is_method(&self) -> bool {
        self.is_method
    }

    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    #[must_use]
    pub fn slot(&self, id: SlotId) -> &Slot {
        &self.slots[id.index()]
    }

    #[must_use]
    pub fn ops(&self) -> &[BindOp] {
        &self.ops
    }

    /// Number of default values the callable must supply: one past the highest default
    /// index any step reads.
    #[must_use]
    pub fn defaults_needed(&self) -> usize {
        self.ops
            .iter()
            .filter_map(|op| match op {
                BindOp::AssignDefault { default, .. }
                | BindOp::UnpackNested {
                    default: Some(default), ..
                } => Some(default.index + 1),
                _ => None,
            })
            .max()
            .unwrap_or_default()
    }

    /// Slots passed to the implementation function, in declaration order.
    pub fn call_arguments(&self) -> impl Iterator<Item = &Slot> {
        self.call_arguments.iter().map(|id| self.slot(*id))
    }
}
