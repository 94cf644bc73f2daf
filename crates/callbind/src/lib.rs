//! Call-binding code generation and constant classification for an ahead-of-time Python
//! compiler.
//!
//! Two layers:
//!
//! - [`constants`] classifies literal values (mutability, iterability, numeric-ness),
//!   compares them structurally and wraps them as deduplication keys. [`ConstantTable`]
//!   gives every distinct literal one code name and emits the constants module.
//! - [`codegen`] turns a callable's [`ParameterList`] into the entry points that bind call
//!   arguments to parameters, with CPython's matching rules and error messages.
//!
//! ```
//! use callbind::{
//!     CallBindingGenerator, CodegenOptions, ConstantValue, DefaultBinding, FunctionDecl, ParameterList,
//!     ParameterSpec, SharedConstantTable,
//! };
//!
//! let table = SharedConstantTable::default();
//! let mut generator = CallBindingGenerator::new(CodegenOptions::default(), &table);
//! let parameters = ParameterList::new([ParameterSpec::plain("a"), ParameterSpec::plain("b")])
//!     .with_defaults([DefaultBinding::Literal(ConstantValue::int(2))]);
//! let entry_points = generator.generate(&FunctionDecl::new("f_1", "f", parameters)).unwrap();
//!
//! assert_eq!(entry_points.plain.identifier, "_fparse_f_1");
//! assert_eq!(entry_points.method_identifier(), "NULL");
//! ```
#![expect(clippy::cast_possible_truncation, reason = "hash arithmetic truncates like CPython")]
#![expect(clippy::cast_sign_loss, reason = "hash arithmetic reinterprets signs like CPython")]
#![expect(clippy::cast_possible_wrap, reason = "hash arithmetic wraps like CPython")]
#![expect(clippy::float_cmp, reason = "constant equality is exact by definition")]

pub mod codegen;
pub mod constant_table;
pub mod constants;
pub mod errors;
pub mod options;
mod py_hash;
pub mod runtime;
pub mod signature;
pub mod tracer;

pub use crate::{
    codegen::{CallBindingGenerator, ContextCode, EntryPoint, FunctionDecl, GeneratedEntryPoints},
    constant_table::{ConstantRef, ConstantTable, SharedConstantTable},
    constants::{
        ConstantValue, FALLBACK_HASH_BUCKET, HashableConstant, compare_constants, is_index_constant,
        is_iterable_constant, is_mutable, is_number_constant,
    },
    errors::{BindingError, BindingErrorKind, ExcType, SignatureError, UnpackShape},
    options::{CodegenOptions, DEFAULT_MAX_NESTING_DEPTH, EntryPointPrefixes},
    runtime::{BoundArguments, CallArguments, RuntimeValue, execute},
    signature::{DefaultBinding, ParameterList, ParameterSpec},
    tracer::{CodegenTracer, NoopTracer, RecordingTracer, StderrTracer, TraceEvent},
};
