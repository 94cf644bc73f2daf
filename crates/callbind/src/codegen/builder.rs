//! Lowering of parameter lists to binding programs.
//!
//! This is where the binding algorithm is decided. For one callable and one entry point
//! kind the builder declares the slots and lays out the operations in their final order:
//!
//! 1. keyword pass (collecting into `**` or matching against named parameters)
//! 2. positional count check (only without `*`)
//! 3. positional assignment, left to right
//! 4. `*` collection
//! 5. defaults, then the aggregated missing-argument check
//! 6. tuple-parameter unpacking, one nesting level at a time

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::{
    codegen::program::{BindOp, BindingProgram, DefaultRef, DefaultSource, KeywordTarget, Slot, SlotId, SlotKind},
    constant_table::SharedConstantTable,
    constants::{ConstantValue, is_mutable},
    signature::{DefaultBinding, ParameterList, ParameterSpec},
    tracer::CodegenTracer,
};

/// Identifier of the local holding a parameter in emitted code.
#[must_use]
pub(crate) fn slot_identifier(name: &str) -> String {
    format!("_python_par_{name}")
}

/// Name of the owning-context field storing a parameter's default.
#[must_use]
pub(crate) fn default_field_name(spec: &ParameterSpec) -> String {
    match spec {
        ParameterSpec::Plain(name) => format!("default_value_{name}"),
        ParameterSpec::Nested(_) => format!("default_values_{}", spec.leaf_names().join("__")),
    }
}

/// Resolves every default of `list` to where emitted code reads it from.
///
/// Immutable literals are shared constants. Mutable literals and computed defaults are
/// stored in the callable's context, so every call sees the one object created with the
/// callable.
pub(crate) fn resolve_defaults<Tr: CodegenTracer>(
    list: &ParameterList,
    table: &SharedConstantTable,
    tracer: &mut Tr,
) -> Vec<DefaultRef> {
    let first = list.required_count();
    list.defaults()
        .iter()
        .enumerate()
        .map(|(index, binding)| {
            let source = match binding {
                DefaultBinding::Literal(value) if !is_mutable(value) => {
                    let constant = table.get_or_insert(value);
                    tracer.on_constant(&constant.code, constant.inserted);
                    DefaultSource::Constant { code: constant.code }
                }
                DefaultBinding::Literal(_) | DefaultBinding::Computed => DefaultSource::Context {
                    field: default_field_name(&list.top_level()[first + index]),
                },
            };
            DefaultRef { index, source }
        })
        .collect()
}

/// Builds the binding program of one entry point.
pub(crate) struct ProgramBuilder<'a, Tr: CodegenTracer> {
    list: &'a ParameterList,
    function_name: &'a str,
    table: &'a SharedConstantTable,
    tracer: &'a mut Tr,
    defaults: &'a [DefaultRef],
    is_method: bool,
    slots: Vec<Slot>,
    ops: Vec<BindOp>,
}

impl<'a, Tr: CodegenTracer> ProgramBuilder<'a, Tr> {
    pub(crate) fn new(
        list: &'a ParameterList,
        function_name: &'a str,
        table: &'a SharedConstantTable,
        tracer: &'a mut Tr,
        defaults: &'a [DefaultRef],
        is_method: bool,
    ) -> Self {
        Self {
            list,
            function_name,
            table,
            tracer,
            defaults,
            is_method,
            slots: Vec::new(),
            ops: Vec::new(),
        }
    }

    /// Lays out slots and operations, consuming the builder.
    pub(crate) fn build(
        mut self,
        identifier: String,
        impl_identifier: String,
        context_type: Option<String>,
    ) -> BindingProgram {
        let list = self.list;
        let top_level = list.top_level();
        let offset = usize::from(self.is_method);

        for (position, spec) in top_level.iter().enumerate() {
            let kind = match spec {
                _ if self.is_method && position == 0 => SlotKind::Receiver,
                ParameterSpec::Plain(_) => SlotKind::Plain,
                ParameterSpec::Nested(_) => SlotKind::Nested,
            };
            self.add_slot(spec, kind);
        }
        let star_list = list
            .star_list()
            .map(|name| self.add_slot(&ParameterSpec::plain(name), SlotKind::StarList));
        let star_dict = list
            .star_dict()
            .map(|name| self.add_slot(&ParameterSpec::plain(name), SlotKind::StarDict));
        let unpacks = self.declare_nested();

        if list.is_empty() {
            self.ops.push(BindOp::RefuseArguments);
        } else {
            self.keyword_pass(star_dict);

            if star_list.is_none() {
                self.ops.push(BindOp::CheckPositionalCount {
                    min: list.required_count(),
                    max: top_level.len(),
                });
            }

            for position in offset..top_level.len() {
                self.ops.push(BindOp::AssignPositional {
                    slot: SlotId::new(position),
                    arg_index: position - offset,
                });
            }

            if let Some(slot) = star_list {
                let empty_tuple = self.constant_code(&ConstantValue::tuple([]));
                self.ops.push(BindOp::CollectStarList {
                    slot,
                    first_index: top_level.len() - offset,
                    empty_tuple,
                });
            }

            self.defaults_pass();
        }
        self.ops.extend(unpacks);

        let call_arguments = self.call_arguments();
        let program = BindingProgram {
            identifier,
            impl_identifier,
            function_name: self.function_name.to_owned(),
            context_type,
            is_method: self.is_method,
            slots: self.slots,
            ops: self.ops,
            call_arguments,
        };
        self.tracer
            .on_entry_point(&program.identifier, program.is_method, program.ops.len());
        program
    }

    fn add_slot(&mut self, spec: &ParameterSpec, kind: SlotKind) -> SlotId {
        let name = spec.name().into_owned();
        let id = SlotId::new(self.slots.len());
        self.slots.push(Slot {
            identifier: slot_identifier(&name),
            display_name: spec.display_name(),
            name,
            kind,
        });
        id
    }

    /// Declares the slots of all tuple-parameter children and returns the unpack operations,
    /// shallowest level first.
    fn declare_nested(&mut self) -> Vec<BindOp> {
        let list = self.list;
        let mut level: Vec<(SlotId, &ParameterSpec, Option<DefaultRef>)> = list
            .top_level()
            .iter()
            .enumerate()
            .filter(|(_, spec)| spec.is_nested())
            .map(|(position, spec)| (SlotId::new(position), spec, self.default_for(position).cloned()))
            .collect();

        let mut unpacks = Vec::new();
        while !level.is_empty() {
            let mut next_level = Vec::new();
            for (source, spec, default) in level {
                let targets: SmallVec<[SlotId; 4]> = spec
                    .children()
                    .iter()
                    .map(|child| {
                        let kind = if child.is_nested() {
                            SlotKind::Nested
                        } else {
                            SlotKind::Plain
                        };
                        let id = self.add_slot(child, kind);
                        if child.is_nested() {
                            next_level.push((id, child, None));
                        }
                        id
                    })
                    .collect();
                unpacks.push(BindOp::UnpackNested {
                    source,
                    default,
                    targets,
                });
            }
            level = next_level;
        }
        unpacks
    }

    fn keyword_pass(&mut self, star_dict: Option<SlotId>) {
        let list = self.list;
        let targets: Vec<KeywordTarget> = list
            .top_level()
            .iter()
            .enumerate()
            .filter_map(|(position, spec)| match spec {
                ParameterSpec::Plain(name) => Some((position, name)),
                ParameterSpec::Nested(_) => None,
            })
            .map(|(position, name)| KeywordTarget {
                slot: SlotId::new(position),
                name: self.table.intern_name(name),
                name_constant: self.constant_code(&ConstantValue::str(name)),
            })
            .collect();

        match star_dict {
            Some(star_dict) => self.ops.push(BindOp::CollectKeywords { star_dict, targets }),
            None => self.ops.push(BindOp::AssignKeywords { targets }),
        }
    }

    fn defaults_pass(&mut self) {
        let offset = usize::from(self.is_method);
        let mut required = Vec::new();
        let list = self.list;
        for (position, spec) in list.top_level().iter().enumerate().skip(offset) {
            let slot = SlotId::new(position);
            match self.default_for(position) {
                Some(default) if !spec.is_nested() => self.ops.push(BindOp::AssignDefault {
                    slot,
                    default: default.clone(),
                }),
                Some(_) => {}
                None => required.push(slot),
            }
        }
        if !required.is_empty() {
            self.ops.push(BindOp::CheckRequired { slots: required });
        }
    }

    fn default_for(&self, position: usize) -> Option<&'a DefaultRef> {
        self.list
            .default_index(position)
            .and_then(|index| self.defaults.get(index))
    }

    fn constant_code(&mut self, value: &ConstantValue) -> String {
        let constant = self.table.get_or_insert(value);
        self.tracer.on_constant(&constant.code, constant.inserted);
        constant.code
    }

    fn call_arguments(&self) -> Vec<SlotId> {
        let by_name: AHashMap<&str, SlotId> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.kind != SlotKind::Nested)
            .map(|(index, slot)| (slot.name.as_str(), SlotId::new(index)))
            .collect();
        self.list
            .parameter_names()
            .into_iter()
            .filter_map(|name| by_name.get(name).copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::NoopTracer;

    fn build(list: &ParameterList, is_method: bool) -> BindingProgram {
        let table = SharedConstantTable::default();
        let mut tracer = NoopTracer;
        let defaults = resolve_defaults(list, &table, &mut tracer);
        ProgramBuilder::new(list, "f", &table, &mut tracer, &defaults, is_method).build(
            "_fparse_f".to_owned(),
            "impl_f".to_owned(),
            None,
        )
    }

    #[test]
    fn operation_order() {
        let list = ParameterList::new([ParameterSpec::plain("a"), ParameterSpec::plain("b")])
            .with_defaults([DefaultBinding::Literal(ConstantValue::int(1))]);
        let program = build(&list, false);
        let kinds: Vec<&str> = program
            .ops()
            .iter()
            .map(|op| match op {
                BindOp::AssignKeywords { .. } => "keywords",
                BindOp::CheckPositionalCount { .. } => "count",
                BindOp::AssignPositional { .. } => "positional",
                BindOp::AssignDefault { .. } => "default",
                BindOp::CheckRequired { .. } => "required",
                _ => "other",
            })
            .collect();
        assert_eq!(
            kinds,
            ["keywords", "count", "positional", "positional", "default", "required"]
        );
    }

    #[test]
    fn nested_children_get_slots_level_by_level() {
        let list = ParameterList::new([
            ParameterSpec::nested([
                ParameterSpec::nested([ParameterSpec::plain("a"), ParameterSpec::plain("b")]),
                ParameterSpec::plain("c"),
            ]),
            ParameterSpec::plain("d"),
        ]);
        let program = build(&list, false);
        let names: Vec<&str> = program.slots().iter().map(|slot| slot.name.as_str()).collect();
        assert_eq!(names, ["__a__b__c", "d", "_a__b", "c", "a", "b"]);
        let arguments: Vec<&str> = program.call_arguments().map(|slot| slot.name.as_str()).collect();
        assert_eq!(arguments, ["a", "b", "c", "d"]);
    }

    #[test]
    fn mutable_literal_defaults_live_in_the_context() {
        let list = ParameterList::new([ParameterSpec::plain("a")])
            .with_defaults([DefaultBinding::Literal(ConstantValue::List(vec![]))]);
        let table = SharedConstantTable::default();
        let defaults = resolve_defaults(&list, &table, &mut NoopTracer);
        assert_eq!(
            defaults[0].source,
            DefaultSource::Context {
                field: "default_value_a".to_owned()
            }
        );
    }

    #[test]
    fn method_entry_skips_receiver_positionally() {
        let list = ParameterList::new([ParameterSpec::plain("self"), ParameterSpec::plain("x")]);
        let program = build(&list, true);
        assert_eq!(program.slots()[0].kind, SlotKind::Receiver);
        assert!(program.ops().contains(&BindOp::AssignPositional {
            slot: SlotId::new(1),
            arg_index: 0,
        }));
    }
}
