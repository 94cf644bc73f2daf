//! Reference execution of binding programs.
//!
//! [`execute`] runs a [`BindingProgram`] over runtime values with the same operation order
//! as the rendered entry point, so it raises the same error for the same call. Values are
//! `Arc<ConstantValue>`; keyword keys are `Arc<str>` and compare by identity on the quick
//! path, exactly like the interned name objects in emitted code.
//!
//! Default values belong to the callable object. Binding clones the `Arc`, never the value.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::{
    codegen::program::{BindOp, BindingProgram, DefaultRef, KeywordTarget, SlotId, SlotKind},
    constants::ConstantValue,
    errors::{BindingError, UnpackShape},
};

/// A runtime value.
pub type RuntimeValue = Arc<ConstantValue>;

/// The arguments of one call.
#[derive(Debug, Clone, Default)]
pub struct CallArguments {
    /// The receiver, for method entry points.
    pub receiver: Option<RuntimeValue>,
    pub positional: Vec<RuntimeValue>,
    /// The keyword mapping, if the caller passed one. Keys are unique.
    pub keywords: Option<Vec<(Arc<str>, RuntimeValue)>>,
}

impl CallArguments {
    /// Creates a call with positional arguments only.
    #[must_use]
    pub fn positional(values: impl IntoIterator<Item = RuntimeValue>) -> Self {
        Self {
            positional: values.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Adds a keyword argument, creating the mapping on first use.
    #[must_use]
    pub fn keyword(mut self, key: Arc<str>, value: RuntimeValue) -> Self {
        self.keywords.get_or_insert_with(Vec::new).push((key, value));
        self
    }

    /// Sets the receiver of a method call.
    #[must_use]
    pub fn with_receiver(mut self, receiver: RuntimeValue) -> Self {
        self.receiver = Some(receiver);
        self
    }
}

/// The outcome of a successful binding.
#[derive(Debug, Clone, Default)]
pub struct BoundArguments {
    values: IndexMap<String, RuntimeValue>,
    quick_path_hits: usize,
    slow_path_hits: usize,
}

impl BoundArguments {
    /// Returns the value bound to a parameter the body sees.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RuntimeValue> {
        self.values.get(name)
    }

    /// Iterates over bound parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RuntimeValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keywords matched by identity with an interned parameter name.
    ///
    /// Counted for every keyword bound to a named parameter, with or without `**`.
    #[must_use]
    pub fn quick_path_hits(&self) -> usize {
        self.quick_path_hits
    }

    /// Keywords matched only by string equality.
    #[must_use]
    pub fn slow_path_hits(&self) -> usize {
        self.slow_path_hits
    }
}

/// Binds one call's arguments.
///
/// `defaults` holds the callable's default values, one per default of its parameter list.
/// Literal defaults are part of the callable too, so they are passed here as well.
///
/// A method program binds its receiver from [`CallArguments::receiver`].
///
/// # Panics
///
/// Panics when `defaults` holds fewer values than [`BindingProgram::defaults_needed`], or
/// when a method program gets no receiver. Both describe a callable that does not match the
/// program, so no call can be bound.
pub fn execute(
    program: &BindingProgram,
    defaults: &[RuntimeValue],
    arguments: &CallArguments,
) -> Result<BoundArguments, BindingError> {
    assert!(
        defaults.len() >= program.defaults_needed(),
        "'{}' needs {} default values but got {}",
        program.function_name(),
        program.defaults_needed(),
        defaults.len()
    );
    let mut frame = Frame {
        program,
        defaults,
        arguments,
        slots: vec![None; program.slots().len()],
        bound: BoundArguments::default(),
    };
    for (index, slot) in program.slots().iter().enumerate() {
        if slot.kind == SlotKind::Receiver {
            let Some(receiver) = &arguments.receiver else {
                panic!("method entry point of '{}' called without a receiver", program.function_name());
            };
            frame.slots[index] = Some(Arc::clone(receiver));
        }
    }
    for op in program.ops() {
        frame.run(op)?;
    }

    let mut bound = frame.bound;
    for (id, slot) in program.call_arguments.iter().zip(program.call_arguments()) {
        if let Some(value) = &frame.slots[id.index()] {
            bound.values.insert(slot.name.clone(), Arc::clone(value));
        }
    }
    Ok(bound)
}

struct Frame<'a> {
    program: &'a BindingProgram,
    defaults: &'a [RuntimeValue],
    arguments: &'a CallArguments,
    slots: Vec<Option<RuntimeValue>>,
    bound: BoundArguments,
}

impl<'a> Frame<'a> {
    fn run(&mut self, op: &BindOp) -> Result<(), BindingError> {
        match op {
            BindOp::RefuseArguments => {
                if !self.arguments.positional.is_empty() {
                    return Err(BindingError::TooManyPositional {
                        function: self.function(),
                        min: 0,
                        max: 0,
                        given: self.args_given(),
                    });
                }
                if let Some((key, _)) = self.keywords().first() {
                    return Err(BindingError::UnexpectedKeyword {
                        function: self.function(),
                        keyword: key.to_string(),
                    });
                }
            }
            BindOp::CollectKeywords { star_dict, targets } => {
                let mut collected = Vec::new();
                for (key, value) in self.keywords() {
                    match self.match_keyword(targets, key) {
                        Some(target) => self.bind(target.slot, value)?,
                        None => collected.push((ConstantValue::Str(key.to_string()), ConstantValue::clone(value))),
                    }
                }
                self.slots[star_dict.index()] = Some(Arc::new(ConstantValue::Dict(collected)));
            }
            BindOp::AssignKeywords { targets } => {
                for (key, value) in self.keywords() {
                    let Some(target) = self.match_keyword(targets, key) else {
                        return Err(BindingError::UnexpectedKeyword {
                            function: self.function(),
                            keyword: key.to_string(),
                        });
                    };
                    self.bind(target.slot, value)?;
                }
            }
            BindOp::CheckPositionalCount { min, max } => {
                let given = self.args_given();
                if given > *max {
                    return Err(BindingError::TooManyPositional {
                        function: self.function(),
                        min: *min,
                        max: *max,
                        given,
                    });
                }
            }
            BindOp::AssignPositional { slot, arg_index } => {
                let arguments = self.arguments;
                if let Some(value) = arguments.positional.get(*arg_index) {
                    self.bind(*slot, value)?;
                }
            }
            BindOp::CollectStarList { slot, first_index, .. } => {
                let rest = self
                    .arguments
                    .positional
                    .get(*first_index..)
                    .unwrap_or_default()
                    .iter()
                    .map(|value| ConstantValue::clone(value))
                    .collect();
                self.slots[slot.index()] = Some(Arc::new(ConstantValue::Tuple(rest)));
            }
            BindOp::AssignDefault { slot, default } => {
                if self.slots[slot.index()].is_none() {
                    self.slots[slot.index()] = Some(self.default_value(default));
                }
            }
            BindOp::CheckRequired { slots } => {
                let missing: Vec<String> = slots
                    .iter()
                    .filter(|id| self.slots[id.index()].is_none())
                    .map(|id| self.program.slot(*id).display_name.clone())
                    .collect();
                if !missing.is_empty() {
                    return Err(BindingError::MissingRequired {
                        function: self.function(),
                        parameters: missing,
                    });
                }
            }
            BindOp::UnpackNested {
                source,
                default,
                targets,
            } => self.unpack(*source, default.as_ref(), targets)?,
        }
        Ok(())
    }

    fn function(&self) -> String {
        self.program.function_name().to_owned()
    }

    /// Positional count as the error messages report it, receiver included.
    fn args_given(&self) -> usize {
        self.arguments.positional.len() + usize::from(self.program.is_method())
    }

    fn keywords(&self) -> &'a [(Arc<str>, RuntimeValue)] {
        self.arguments.keywords.as_deref().unwrap_or_default()
    }

    fn bind(&mut self, slot: SlotId, value: &RuntimeValue) -> Result<(), BindingError> {
        let entry = &mut self.slots[slot.index()];
        if entry.is_some() {
            return Err(BindingError::DuplicateBinding {
                function: self.program.function_name().to_owned(),
                parameter: self.program.slot(slot).name.clone(),
            });
        }
        *entry = Some(Arc::clone(value));
        Ok(())
    }

    fn default_value(&self, default: &DefaultRef) -> RuntimeValue {
        Arc::clone(&self.defaults[default.index])
    }

    /// Finds the named parameter a keyword binds to, identity first, then equality.
    fn match_keyword<'t>(&mut self, targets: &'t [KeywordTarget], key: &Arc<str>) -> Option<&'t KeywordTarget> {
        if let Some(target) = targets.iter().find(|target| Arc::ptr_eq(&target.name, key)) {
            self.bound.quick_path_hits += 1;
            return Some(target);
        }
        let target = targets.iter().find(|target| *target.name == **key)?;
        self.bound.slow_path_hits += 1;
        Some(target)
    }

    fn unpack(
        &mut self,
        source: SlotId,
        default: Option<&DefaultRef>,
        targets: &[SlotId],
    ) -> Result<(), BindingError> {
        let value = match (&self.slots[source.index()], default) {
            (Some(value), _) => Arc::clone(value),
            (None, Some(default)) => self.default_value(default),
            // Required tuple parameters are bound once the required check passed.
            (None, None) => return Ok(()),
        };

        let parameter = self.program.slot(source).display_name.clone();
        let Some(items) = value.unpack_items() else {
            return Err(BindingError::NestedUnpackMismatch {
                parameter,
                expected: targets.len(),
                actual: UnpackShape::NotIterable(value.type_name().to_owned()),
            });
        };
        if items.len() < targets.len() {
            return Err(BindingError::NestedUnpackMismatch {
                parameter,
                expected: targets.len(),
                actual: UnpackShape::TooFew(items.len()),
            });
        }
        if items.len() > targets.len() {
            return Err(BindingError::NestedUnpackMismatch {
                parameter,
                expected: targets.len(),
                actual: UnpackShape::TooMany,
            });
        }
        for (target, item) in targets.iter().zip(items) {
            self.slots[target.index()] = Some(Arc::new(item));
        }
        Ok(())
    }
}
