//! Rendering of binding programs to target source.
//!
//! The output is C++ against the CPython C-API plus the compiler's runtime helpers
//! (`INCREASE_REFCOUNT`, `RICH_COMPARE_BOOL_EQ`, `MAKE_ITERATOR`, `UNPACK_PARAMETER_NEXT`,
//! `ERROR_MISSING_ARGUMENTS`, ...). Every owned reference lives in a `_python_par_*` local;
//! all failures jump to `error_exit`, which releases whatever was bound so far.

use std::fmt::Write;

use crate::codegen::program::{BindOp, BindingProgram, DefaultRef, KeywordTarget, Slot, SlotId, SlotKind};

/// Quotes bytes as a C string literal.
///
/// Non-printable bytes use three-digit octal escapes, which cannot run into a following
/// digit the way hex escapes do. `?` is escaped to rule out trigraphs.
#[must_use]
pub(crate) fn c_string_literal(bytes: &[u8]) -> String {
    let mut literal = String::with_capacity(bytes.len() + 2);
    literal.push('"');
    for &byte in bytes {
        match byte {
            b'"' => literal.push_str("\\\""),
            b'\\' => literal.push_str("\\\\"),
            b'?' => literal.push_str("\\?"),
            b'\n' => literal.push_str("\\n"),
            b'\t' => literal.push_str("\\t"),
            0x20..=0x7e => literal.push(char::from(byte)),
            _ => {
                write!(literal, "\\{byte:03o}").ok();
            }
        }
    }
    literal.push('"');
    literal
}

/// Line-oriented writer with brace-aware indentation.
struct Emitter {
    out: String,
    depth: usize,
    width: usize,
}

impl Emitter {
    fn new(width: usize) -> Self {
        Self {
            out: String::new(),
            depth: 0,
            width,
        }
    }

    fn line(&mut self, text: &str) {
        if !text.is_empty() {
            for _ in 0..self.depth * self.width {
                self.out.push(' ');
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn open(&mut self) {
        self.line("{");
        self.depth += 1;
    }

    fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.line("}");
    }

    /// Emits `if ( condition ) { ... }` with the body produced by `body`.
    fn block(&mut self, condition: &str, body: impl FnOnce(&mut Self)) {
        self.line(&format!("if ( {condition} )"));
        self.open();
        body(self);
        self.close();
    }

    fn raise(&mut self, format: &str, arguments: &[String]) {
        let mut call = format!("PyErr_Format( PyExc_TypeError, {}", c_string_literal(format.as_bytes()));
        for argument in arguments {
            call.push_str(", ");
            call.push_str(argument);
        }
        call.push_str(" );");
        self.line(&call);
        self.line("goto error_exit;");
    }
}

/// Renders one entry point as a complete C++ function.
#[must_use]
pub(crate) fn render_program(program: &BindingProgram, indent_width: usize) -> String {
    let mut e = Emitter::new(indent_width);
    let function = c_string_literal(program.function_name.as_bytes());

    let receiver_parameter = if program.is_method {
        "PyObject *_python_receiver, "
    } else {
        ""
    };
    e.line(&format!(
        "static PyObject *{}( Nuitka_FunctionObject *self, {receiver_parameter}PyObject **args, Py_ssize_t args_size, PyObject *kw )",
        program.identifier
    ));
    e.open();
    e.line("assert( kw == NULL || PyDict_Check( kw ) );");
    e.blank();
    e.line("NUITKA_MAY_BE_UNUSED Py_ssize_t kw_size = kw ? PyDict_Size( kw ) : 0;");
    if program.is_method {
        e.line("NUITKA_MAY_BE_UNUSED Py_ssize_t args_given = args_size + 1;");
    } else {
        e.line("NUITKA_MAY_BE_UNUSED Py_ssize_t args_given = args_size;");
    }
    if let Some(context_type) = &program.context_type {
        e.line(&format!(
            "struct {context_type} *_python_context = (struct {context_type} *)self->m_context;"
        ));
    }
    for slot in &program.slots {
        if slot.kind == SlotKind::Receiver {
            e.line(&format!(
                "PyObject *{} = INCREASE_REFCOUNT( _python_receiver );",
                slot.identifier
            ));
        } else {
            e.line(&format!("PyObject *{} = NULL;", slot.identifier));
        }
    }

    for op in &program.ops {
        e.blank();
        render_op(&mut e, program, op, &function);
    }

    e.blank();
    for slot in program.slots.iter().filter(|slot| slot.kind == SlotKind::Nested) {
        e.line(&format!("Py_XDECREF( {} );", slot.identifier));
    }
    let mut call = format!("return {}( self", program.impl_identifier);
    for slot in program.call_arguments() {
        call.push_str(", ");
        call.push_str(&slot.identifier);
    }
    call.push_str(" );");
    e.line(&call);
    e.blank();
    e.depth = 0;
    e.line("error_exit:;");
    e.blank();
    e.depth = 1;
    for slot in &program.slots {
        e.line(&format!("Py_XDECREF( {} );", slot.identifier));
    }
    e.blank();
    e.line("return NULL;");
    e.close();
    e.out
}

fn render_op(e: &mut Emitter, program: &BindingProgram, op: &BindOp, function: &str) {
    match op {
        BindOp::RefuseArguments => {
            e.block("unlikely( args_size > 0 )", |e| {
                e.raise(
                    "%s() takes 0 positional arguments but %zd %s given",
                    &[function.to_owned(), "args_given".to_owned(), was_were()],
                );
            });
            e.blank();
            e.block("unlikely( kw_size > 0 )", |e| {
                e.line("Py_ssize_t ppos = 0;");
                e.line("PyObject *key, *value;");
                e.blank();
                e.line("PyDict_Next( kw, &ppos, &key, &value );");
                e.raise(
                    "%s() got an unexpected keyword argument '%s'",
                    &[function.to_owned(), "Nuitka_String_AsString( key )".to_owned()],
                );
            });
        }
        BindOp::CollectKeywords { star_dict, targets } => {
            let dict = &program.slot(*star_dict).identifier;
            e.line("// Copy given dictionary values to the respective variables:");
            e.line(&format!("{dict} = kw ? PyDict_Copy( kw ) : PyDict_New();"));
            e.blank();
            e.block(&format!("unlikely( {dict} == NULL )"), |e| e.line("goto error_exit;"));
            for target in targets {
                let slot = program.slot(target.slot);
                e.blank();
                e.open();
                e.line(&format!(
                    "PyObject *kw_arg_value = PyDict_GetItem( {dict}, {} );",
                    target.name_constant
                ));
                e.blank();
                e.block("kw_arg_value != NULL", |e| {
                    raise_if_bound(e, slot, function);
                    e.blank();
                    e.line(&format!("{} = INCREASE_REFCOUNT( kw_arg_value );", slot.identifier));
                    e.line(&format!("PyDict_DelItem( {dict}, {} );", target.name_constant));
                });
                e.close();
            }
        }
        BindOp::AssignKeywords { targets } => {
            e.block("kw_size > 0", |e| {
                e.line("Py_ssize_t ppos = 0;");
                e.line("PyObject *key, *value;");
                e.blank();
                e.line("while( PyDict_Next( kw, &ppos, &key, &value ) )");
                e.open();
                e.line("NUITKA_MAY_BE_UNUSED bool found = false;");
                if !targets.is_empty() {
                    e.blank();
                    e.line("// Quick path, could be our value.");
                    for target in targets {
                        keyword_match(e, program, target, function, &format!("{} == key", target.name_constant));
                    }
                    e.blank();
                    e.line("// Slow path, compare against all parameter names.");
                    for target in targets {
                        keyword_match(
                            e,
                            program,
                            target,
                            function,
                            &format!("RICH_COMPARE_BOOL_EQ( {}, key )", target.name_constant),
                        );
                    }
                }
                e.blank();
                e.block("unlikely( found == false )", |e| {
                    e.raise(
                        "%s() got an unexpected keyword argument '%s'",
                        &[function.to_owned(), "Nuitka_String_AsString( key )".to_owned()],
                    );
                });
                e.close();
            });
        }
        BindOp::CheckPositionalCount { min, max } => {
            let format = if min == max {
                let plural = if *max == 1 { "" } else { "s" };
                format!("%s() takes {max} positional argument{plural} but %zd %s given")
            } else {
                format!("%s() takes from {min} to {max} positional arguments but %zd %s given")
            };
            e.line("// Check if too many arguments were given.");
            e.block(&format!("unlikely( args_given > {max} )"), |e| {
                e.raise(&format, &[function.to_owned(), "args_given".to_owned(), was_were()]);
            });
        }
        BindOp::AssignPositional { slot, arg_index } => {
            let slot = program.slot(*slot);
            e.block(&format!("args_size > {arg_index}"), |e| {
                if slot.kind != SlotKind::Nested {
                    raise_if_bound(e, slot, function);
                    e.blank();
                }
                e.line(&format!(
                    "{} = INCREASE_REFCOUNT( args[ {arg_index} ] );",
                    slot.identifier
                ));
            });
        }
        BindOp::CollectStarList {
            slot,
            first_index,
            empty_tuple,
        } => {
            let list = &program.slot(*slot).identifier;
            e.block(&format!("args_size > {first_index}"), |e| {
                e.line(&format!("{list} = PyTuple_New( args_size - {first_index} );"));
                e.blank();
                e.line(&format!("for( Py_ssize_t i = 0; i < args_size - {first_index}; i++ )"));
                e.open();
                e.line(&format!(
                    "PyTuple_SET_ITEM( {list}, i, INCREASE_REFCOUNT( args[ {first_index} + i ] ) );"
                ));
                e.close();
            });
            e.line("else");
            e.open();
            e.line(&format!("{list} = INCREASE_REFCOUNT( {empty_tuple} );"));
            e.close();
        }
        BindOp::AssignDefault { slot, default } => {
            let slot = program.slot(*slot);
            e.block(&format!("{} == NULL", slot.identifier), |e| {
                e.line(&format!("{} = INCREASE_REFCOUNT( {} );", slot.identifier, default.code()));
            });
        }
        BindOp::CheckRequired { slots } => {
            let slots: Vec<&Slot> = slots.iter().map(|id| program.slot(*id)).collect();
            let condition = slots
                .iter()
                .map(|slot| format!("{} == NULL", slot.identifier))
                .collect::<Vec<_>>()
                .join(" || ");
            e.block(&format!("unlikely( {condition} )"), |e| {
                let values: Vec<&str> = slots.iter().map(|slot| slot.identifier.as_str()).collect();
                let names: Vec<String> = slots
                    .iter()
                    .map(|slot| c_string_literal(slot.display_name.as_bytes()))
                    .collect();
                e.line(&format!("PyObject *given[] = {{ {} }};", values.join(", ")));
                e.line(&format!("static char const *names[] = {{ {} }};", names.join(", ")));
                e.blank();
                e.line(&format!(
                    "ERROR_MISSING_ARGUMENTS( {function}, given, names, {} );",
                    slots.len()
                ));
                e.line("goto error_exit;");
            });
        }
        BindOp::UnpackNested {
            source,
            default,
            targets,
        } => render_unpack(e, program, *source, default.as_ref(), targets),
    }
}

fn was_were() -> String {
    "args_given == 1 ? \"was\" : \"were\"".to_owned()
}

fn raise_if_bound(e: &mut Emitter, slot: &Slot, function: &str) {
    e.block(&format!("unlikely( {} != NULL )", slot.identifier), |e| {
        e.raise(
            "%s() got multiple values for argument '%s'",
            &[function.to_owned(), c_string_literal(slot.name.as_bytes())],
        );
    });
}

fn keyword_match(e: &mut Emitter, program: &BindingProgram, target: &KeywordTarget, function: &str, test: &str) {
    let slot = program.slot(target.slot);
    e.block(&format!("found == false && {test}"), |e| {
        raise_if_bound(e, slot, function);
        e.blank();
        e.line(&format!("{} = INCREASE_REFCOUNT( value );", slot.identifier));
        e.line("found = true;");
    });
}

fn render_unpack(
    e: &mut Emitter,
    program: &BindingProgram,
    source: SlotId,
    default: Option<&DefaultRef>,
    targets: &[SlotId],
) {
    let source = program.slot(source);
    let iterator = format!("_python_iter_{}", source.name);
    let value = match default {
        Some(default) => format!("{0} ? {0} : {1}", source.identifier, default.code()),
        None => source.identifier.clone(),
    };

    e.line(&format!("// Unpack from {}", source.identifier));
    e.open();
    e.line(&format!("PyObject *{iterator} = MAKE_ITERATOR( {value} );"));
    e.blank();
    e.block(&format!("unlikely( {iterator} == NULL )"), |e| e.line("goto error_exit;"));
    for (index, target) in targets.iter().enumerate() {
        let target = program.slot(*target);
        e.blank();
        e.line(&format!(
            "{} = UNPACK_PARAMETER_NEXT( {iterator}, {index} );",
            target.identifier
        ));
        e.block(&format!("unlikely( {} == NULL )", target.identifier), |e| {
            e.line(&format!("Py_DECREF( {iterator} );"));
            e.line("goto error_exit;");
        });
    }
    e.blank();
    e.block(
        &format!("unlikely( !UNPACK_PARAMETER_ITERATOR_CHECK( {iterator}, {} ) )", targets.len()),
        |e| {
            e.line(&format!("Py_DECREF( {iterator} );"));
            e.line("goto error_exit;");
        },
    );
    e.blank();
    e.line(&format!("Py_DECREF( {iterator} );"));
    e.close();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_literals_escape_quotes_and_control_bytes() {
        assert_eq!(c_string_literal(b"a\"b"), "\"a\\\"b\"");
        assert_eq!(c_string_literal(b"\x01"), "\"\\001\"");
        assert_eq!(c_string_literal(b"??="), "\"\\?\\?=\"");
    }

    #[test]
    fn emitter_indents_blocks() {
        let mut e = Emitter::new(2);
        e.block("x", |e| e.line("y;"));
        assert_eq!(e.out, "if ( x )\n{\n  y;\n}\n");
    }
}
