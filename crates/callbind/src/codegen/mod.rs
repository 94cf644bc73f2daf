//! Call-binding code generation.
//!
//! For every callable the surrounding compiler discovers, [`CallBindingGenerator::generate`]
//! produces the entry points that bind call arguments to the callable's parameters and then
//! hand over to its implementation function:
//!
//! - `_fparse_<id>` takes the positional array, its size and an optional keyword dict.
//! - `_mparse_<id>` exists only when the first parameter is the receiver (`self`); it takes
//!   the receiver separately and binds everything else like the plain entry point does.
//!
//! Generation is a pure function of the parameter list and the constant table, so the same
//! declaration always yields the same code.

pub mod builder;
pub mod program;
pub mod render;

use serde::{Deserialize, Serialize};

use crate::{
    codegen::{
        builder::{ProgramBuilder, resolve_defaults, slot_identifier},
        program::{BindingProgram, DefaultSource},
        render::render_program,
    },
    constant_table::SharedConstantTable,
    errors::SignatureError,
    options::CodegenOptions,
    signature::{ParameterList, is_identifier},
    tracer::{CodegenTracer, NoopTracer},
};

/// A callable as seen by the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    /// Unique identifier used to derive entry point and implementation names.
    pub identifier: String,
    /// Source name of the callable, used in error messages.
    pub name: String,
    pub parameters: ParameterList,
}

impl FunctionDecl {
    #[must_use]
    pub fn new(identifier: impl Into<String>, name: impl Into<String>, parameters: ParameterList) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            parameters,
        }
    }
}

/// Code the owning context (the callable object) needs to keep defaults alive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextCode {
    /// Field declarations, e.g. `PyObject *default_value_b;`.
    pub declarations: Vec<String>,
    /// Statements storing the creation-time values into the context.
    pub copies: Vec<String>,
    /// Statements releasing the fields when the callable object dies.
    pub releases: Vec<String>,
}

impl ContextCode {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

/// One emitted entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub identifier: String,
    pub code: String,
    pub program: BindingProgram,
}

/// Everything the surrounding code generator needs for one callable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedEntryPoints {
    pub plain: EntryPoint,
    /// Absent unless the first parameter is the receiver.
    pub method: Option<EntryPoint>,
    pub context: ContextCode,
    /// `_python_par_*` identifiers of the parameters the body sees, in declaration order.
    pub parameter_identifiers: Vec<String>,
    /// Parameter list of the implementation function, e.g. `, PyObject *_python_par_a`.
    pub parameter_declarations: String,
    /// Expression reading each default, in default order.
    pub default_identifiers: Vec<String>,
}

impl GeneratedEntryPoints {
    /// Identifier of the method entry point, or `NULL` when there is none.
    #[must_use]
    pub fn method_identifier(&self) -> &str {
        self.method.as_ref().map_or("NULL", |method| method.identifier.as_str())
    }

    /// Code of all entry points, plain first.
    #[must_use]
    pub fn code(&self) -> String {
        let mut code = self.plain.code.clone();
        if let Some(method) = &self.method {
            code.push('\n');
            code.push_str(&method.code);
        }
        code
    }
}

/// Generates call-binding entry points.
///
/// The generator borrows the constant table shared by the whole compilation and carries a
/// [`CodegenTracer`] as a type parameter; the default [`NoopTracer`] costs nothing.
#[derive(Debug)]
pub struct CallBindingGenerator<'t, Tr: CodegenTracer = NoopTracer> {
    options: CodegenOptions,
    table: &'t SharedConstantTable,
    tracer: Tr,
}

impl<'t> CallBindingGenerator<'t, NoopTracer> {
    #[must_use]
    pub fn new(options: CodegenOptions, table: &'t SharedConstantTable) -> Self {
        Self::with_tracer(options, table, NoopTracer)
    }
}

impl<'t, Tr: CodegenTracer> CallBindingGenerator<'t, Tr> {
    #[must_use]
    pub fn with_tracer(options: CodegenOptions, table: &'t SharedConstantTable, tracer: Tr) -> Self {
        Self { options, table, tracer }
    }

    #[must_use]
    pub fn options(&self) -> &CodegenOptions {
        &self.options
    }

    #[must_use]
    pub fn tracer(&self) -> &Tr {
        &self.tracer
    }

    /// Consumes the generator, returning its tracer.
    #[must_use]
    pub fn into_tracer(self) -> Tr {
        self.tracer
    }

    /// Generates the entry points of one callable.
    ///
    /// Fails if the parameter list cannot be lowered; see [`ParameterList::validate`].
    pub fn generate(&mut self, decl: &FunctionDecl) -> Result<GeneratedEntryPoints, SignatureError> {
        if let Err(error) = self.validate(decl) {
            self.tracer.on_signature_rejected(&decl.name, &error);
            return Err(error);
        }
        let list = &decl.parameters;
        self.tracer
            .on_signature(&decl.name, list.top_level().len(), list.defaults().len());

        let defaults = resolve_defaults(list, self.table, &mut self.tracer);
        let context = context_code(&defaults);
        let context_type = (!context.is_empty()).then(|| format!("_context_function_{}_t", decl.identifier));
        let prefixes = &self.options.entry_point_prefixes;
        let impl_identifier = format!("{}{}", prefixes.implementation, decl.identifier);

        let plain_identifier = format!("{}{}", prefixes.plain, decl.identifier);
        let plain = ProgramBuilder::new(list, &decl.name, self.table, &mut self.tracer, &defaults, false).build(
            plain_identifier,
            impl_identifier.clone(),
            context_type.clone(),
        );

        let method = list.has_receiver(&self.options.receiver_name).then(|| {
            let method_identifier = format!("{}{}", prefixes.method, decl.identifier);
            ProgramBuilder::new(list, &decl.name, self.table, &mut self.tracer, &defaults, true).build(
                method_identifier,
                impl_identifier,
                context_type,
            )
        });

        let parameter_identifiers: Vec<String> = list
            .parameter_names()
            .into_iter()
            .map(slot_identifier)
            .collect();
        let parameter_declarations = parameter_identifiers
            .iter()
            .map(|identifier| format!(", PyObject *{identifier}"))
            .collect();

        Ok(GeneratedEntryPoints {
            plain: self.entry_point(plain),
            method: method.map(|program| self.entry_point(program)),
            context,
            parameter_identifiers,
            parameter_declarations,
            default_identifiers: defaults.iter().map(program::DefaultRef::code).collect(),
        })
    }

    fn validate(&self, decl: &FunctionDecl) -> Result<(), SignatureError> {
        if !is_identifier(&decl.identifier) {
            return Err(SignatureError::InvalidName {
                function: decl.name.clone(),
                name: decl.identifier.clone(),
            });
        }
        decl.parameters.validate(&decl.name, self.options.max_nesting_depth)
    }

    fn entry_point(&self, program: BindingProgram) -> EntryPoint {
        EntryPoint {
            identifier: program.identifier().to_owned(),
            code: render_program(&program, self.options.indent_width),
            program,
        }
    }
}

/// Builds the context fields for every default stored outside the constant table.
fn context_code(defaults: &[program::DefaultRef]) -> ContextCode {
    let mut context = ContextCode::default();
    for default in defaults {
        if let DefaultSource::Context { field } = &default.source {
            context.declarations.push(format!("PyObject *{field};"));
            context.copies.push(format!("_python_context->{field} = {field};"));
            context.releases.push(format!("Py_DECREF( _python_context->{field} );"));
        }
    }
    context
}
