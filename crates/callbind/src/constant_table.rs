//! The constant deduplication table.
//!
//! Every literal referenced by emitted code is registered here once and gets a stable code
//! name. The table is an explicit context object: created when compilation starts, shared
//! by every generator that emits code, and turned into the constants module at the end.
//!
//! Lookups are keyed by [`HashableConstant`], so structurally equal literals (including
//! NaN-bearing ones and everything in the fallback hash bucket) share one entry. The first
//! insert wins; later equal inserts return the existing name.

use std::{
    fmt::Write,
    sync::{Arc, PoisonError, RwLock},
};

use ahash::{AHashMap, AHashSet};
use indexmap::IndexMap;
use md5::{Digest, Md5};
use num_traits::ToPrimitive;

use crate::{
    codegen::render::c_string_literal,
    constants::{ConstantValue, HashableConstant, float_repr, is_mutable},
};

/// A reference to a registered constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantRef {
    /// Code name of the constant in emitted code.
    pub code: String,
    /// Whether this call added the constant to the table.
    pub inserted: bool,
    /// Whether users must copy the constant before handing it out.
    pub mutable: bool,
}

#[derive(Debug, Clone)]
struct ConstantEntry {
    code: String,
    /// Code names of the elements, in construction order. Dicts store key, value pairs.
    children: Vec<String>,
    mutable: bool,
}

/// The deduplication table, owned by one thread at a time.
///
/// Use [`SharedConstantTable`] to share one table between generators.
#[derive(Debug, Default)]
pub struct ConstantTable {
    entries: IndexMap<HashableConstant, ConstantEntry>,
    used_names: AHashSet<String>,
    names: AHashMap<String, Arc<str>>,
}

impl ConstantTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered constants, singletons excluded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the code name of a constant if it is registered (or is a singleton).
    #[must_use]
    pub fn lookup(&self, value: &ConstantValue) -> Option<ConstantRef> {
        if let Some(code) = singleton_code(value) {
            return Some(ConstantRef {
                code: code.to_owned(),
                inserted: false,
                mutable: false,
            });
        }
        self.entries
            .get(&HashableConstant::new(value.clone()))
            .map(|entry| ConstantRef {
                code: entry.code.clone(),
                inserted: false,
                mutable: entry.mutable,
            })
    }

    /// Registers a constant, returning its code name.
    ///
    /// Container elements are registered first, so the definitions build children before
    /// the containers holding them.
    ///
    /// # Panics
    ///
    /// Panics on [`ConstantValue::Unclassified`], see [`is_mutable`].
    pub fn get_or_insert(&mut self, value: &ConstantValue) -> ConstantRef {
        if let Some(existing) = self.lookup(value) {
            return existing;
        }
        let mutable = is_mutable(value);

        let children = match value {
            ConstantValue::Tuple(items)
            | ConstantValue::List(items)
            | ConstantValue::Set(items)
            | ConstantValue::FrozenSet(items) => items.iter().map(|item| self.get_or_insert(item).code).collect(),
            ConstantValue::Dict(entries) => entries
                .iter()
                .flat_map(|(key, value)| [self.get_or_insert(key).code, self.get_or_insert(value).code])
                .collect(),
            _ => Vec::new(),
        };

        let code = self.unique_name(base_name(value));
        self.entries.insert(
            HashableConstant::new(value.clone()),
            ConstantEntry {
                code: code.clone(),
                children,
                mutable,
            },
        );
        ConstantRef {
            code,
            inserted: true,
            mutable,
        }
    }

    /// Returns the shared handle for a parameter name.
    ///
    /// Every call with the same text returns a clone of the same `Arc`, so callers that
    /// build keyword keys through the table hit the identity check in binding code.
    pub fn intern_name(&mut self, name: &str) -> Arc<str> {
        if let Some(interned) = self.names.get(name) {
            return Arc::clone(interned);
        }
        let interned: Arc<str> = Arc::from(name);
        self.names.insert(name.to_owned(), Arc::clone(&interned));
        interned
    }

    /// Iterates over registered constants and their code names, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&ConstantValue, &str)> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.constant(), entry.code.as_str()))
    }

    /// Emits the declarations header of the constants module.
    #[must_use]
    pub fn declarations_code(&self) -> String {
        let mut code = String::from("// Constants module declarations.\n\n");
        for entry in self.entries.values() {
            writeln!(code, "extern PyObject *{};", entry.code).ok();
        }
        code.push_str("\nextern void _initConstants( void );\n");
        code
    }

    /// Emits the definitions of the constants module, including `_initConstants`.
    #[must_use]
    pub fn definitions_code(&self) -> String {
        let mut code = String::from("// Constants module definitions.\n\n");
        for entry in self.entries.values() {
            writeln!(code, "PyObject *{};", entry.code).ok();
        }
        code.push_str("\nvoid _initConstants( void )\n{\n");
        for (key, entry) in &self.entries {
            for statement in init_statements(key.constant(), entry) {
                writeln!(code, "    {statement}").ok();
            }
        }
        code.push_str("}\n");
        code
    }

    fn unique_name(&mut self, base: String) -> String {
        let mut name = base.clone();
        let mut suffix = 1;
        while self.used_names.contains(&name) {
            name = format!("{base}_{suffix}");
            suffix += 1;
        }
        self.used_names.insert(name.clone());
        name
    }
}

/// A [`ConstantTable`] shared between generators, possibly on several threads.
///
/// Inserts are serialized; lookups of registered constants only take the read lock.
#[derive(Debug, Clone, Default)]
pub struct SharedConstantTable {
    inner: Arc<RwLock<ConstantTable>>,
}

impl SharedConstantTable {
    #[must_use]
    pub fn new(table: ConstantTable) -> Self {
        Self {
            inner: Arc::new(RwLock::new(table)),
        }
    }

    /// See [`ConstantTable::get_or_insert`].
    pub fn get_or_insert(&self, value: &ConstantValue) -> ConstantRef {
        if let Some(existing) = self.inner.read().unwrap_or_else(PoisonError::into_inner).lookup(value) {
            return existing;
        }
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert(value)
    }

    /// See [`ConstantTable::lookup`].
    #[must_use]
    pub fn lookup(&self, value: &ConstantValue) -> Option<ConstantRef> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).lookup(value)
    }

    /// See [`ConstantTable::intern_name`].
    pub fn intern_name(&self, name: &str) -> Arc<str> {
        if let Some(interned) = self.inner.read().unwrap_or_else(PoisonError::into_inner).names.get(name) {
            return Arc::clone(interned);
        }
        self.inner.write().unwrap_or_else(PoisonError::into_inner).intern_name(name)
    }

    /// Runs `f` with read access to the table.
    pub fn with_table<R>(&self, f: impl FnOnce(&ConstantTable) -> R) -> R {
        f(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Interpreter singletons, which are never registered.
fn singleton_code(value: &ConstantValue) -> Option<&'static str> {
    match value {
        ConstantValue::None => Some("Py_None"),
        ConstantValue::Bool(true) => Some("Py_True"),
        ConstantValue::Bool(false) => Some("Py_False"),
        ConstantValue::Ellipsis => Some("Py_Ellipsis"),
        _ => None,
    }
}

fn base_name(value: &ConstantValue) -> String {
    match value {
        ConstantValue::Str(s) if s.is_empty() => "_python_str_empty".to_owned(),
        ConstantValue::Str(s) if crate::signature::is_identifier(s) => format!("_python_str_plain_{s}"),
        ConstantValue::Int(i) if i.sign() == num_bigint::Sign::Minus => format!("_python_int_neg_{}", i.magnitude()),
        ConstantValue::Int(i) => format!("_python_int_{i}"),
        ConstantValue::Tuple(items) if items.is_empty() => "_python_tuple_empty".to_owned(),
        ConstantValue::List(items) if items.is_empty() => "_python_list_empty".to_owned(),
        ConstantValue::Dict(entries) if entries.is_empty() => "_python_dict_empty".to_owned(),
        other => {
            let kind: String = other
                .type_name()
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect();
            format!("_python_{kind}_digest_{}", md5_hex(&other.to_string()))
        }
    }
}

fn md5_hex(text: &str) -> String {
    let digest = Md5::digest(text.as_bytes());
    let mut hex = String::with_capacity(32);
    for byte in digest.iter() {
        write!(hex, "{byte:02x}").ok();
    }
    hex
}

fn c_double(value: f64) -> String {
    if value.is_nan() {
        "Py_NAN".to_owned()
    } else if value.is_infinite() {
        if value > 0.0 { "Py_HUGE_VAL" } else { "-Py_HUGE_VAL" }.to_owned()
    } else {
        float_repr(value)
    }
}

fn init_statements(value: &ConstantValue, entry: &ConstantEntry) -> Vec<String> {
    let name = &entry.code;
    match value {
        ConstantValue::Str(s) => vec![format!(
            "{name} = UNSTREAM_STRING( {}, {}, {} );",
            c_string_literal(s.as_bytes()),
            s.len(),
            u8::from(crate::signature::is_identifier(s))
        )],
        ConstantValue::Bytes(b) => vec![format!(
            "{name} = PyBytes_FromStringAndSize( {}, {} );",
            c_string_literal(b),
            b.len()
        )],
        ConstantValue::Int(i) => match i.to_i32() {
            Some(small) => vec![format!("{name} = PyLong_FromLong( {small} );")],
            None => vec![format!("{name} = PyLong_FromString( (char *)\"{i}\", NULL, 10 );")],
        },
        ConstantValue::Float(f) => vec![format!("{name} = PyFloat_FromDouble( {} );", c_double(*f))],
        ConstantValue::Complex { real, imag } => vec![format!(
            "{name} = PyComplex_FromDoubles( {}, {} );",
            c_double(*real),
            c_double(*imag)
        )],
        ConstantValue::Range { start, stop, step } => vec![format!(
            "{name} = PyObject_CallFunction( (PyObject *)&PyRange_Type, \"LLL\", {start}LL, {stop}LL, {step}LL );"
        )],
        ConstantValue::Tuple(_) => container_statements(name, "PyTuple_New", "PyTuple_SET_ITEM", &entry.children),
        ConstantValue::List(_) => container_statements(name, "PyList_New", "PyList_SET_ITEM", &entry.children),
        ConstantValue::Dict(_) => {
            let mut statements = vec![format!("{name} = _PyDict_NewPresized( {} );", entry.children.len() / 2)];
            for pair in entry.children.chunks_exact(2) {
                statements.push(format!("PyDict_SetItem( {name}, {}, {} );", pair[0], pair[1]));
            }
            statements
        }
        ConstantValue::Set(_) | ConstantValue::FrozenSet(_) => {
            let constructor = if matches!(value, ConstantValue::Set(_)) {
                "PySet_New"
            } else {
                "PyFrozenSet_New"
            };
            let mut statements = vec![format!("{name} = {constructor}( NULL );")];
            for child in &entry.children {
                statements.push(format!("PySet_Add( {name}, {child} );"));
            }
            statements
        }
        ConstantValue::None | ConstantValue::Bool(_) | ConstantValue::Ellipsis | ConstantValue::Unclassified(_) => {
            Vec::new()
        }
    }
}

fn container_statements(name: &str, constructor: &str, setter: &str, children: &[String]) -> Vec<String> {
    let mut statements = vec![format!("{name} = {constructor}( {} );", children.len())];
    for (index, child) in children.iter().enumerate() {
        statements.push(format!("{setter}( {name}, {index}, INCREASE_REFCOUNT( {child} ) );"));
    }
    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_kind() {
        let mut table = ConstantTable::new();
        assert_eq!(table.get_or_insert(&ConstantValue::str("a")).code, "_python_str_plain_a");
        assert_eq!(table.get_or_insert(&ConstantValue::str("")).code, "_python_str_empty");
        assert_eq!(table.get_or_insert(&ConstantValue::int(-3)).code, "_python_int_neg_3");
        assert_eq!(table.get_or_insert(&ConstantValue::tuple([])).code, "_python_tuple_empty");
        assert_eq!(table.get_or_insert(&ConstantValue::None).code, "Py_None");
        assert!(
            table
                .get_or_insert(&ConstantValue::str("a b"))
                .code
                .starts_with("_python_str_digest_")
        );
    }

    #[test]
    fn children_are_defined_before_containers() {
        let mut table = ConstantTable::new();
        let tuple = ConstantValue::tuple([ConstantValue::int(7), ConstantValue::str("x")]);
        let reference = table.get_or_insert(&tuple);
        let order: Vec<&str> = table.iter().map(|(_, code)| code).collect();
        assert_eq!(order.last().copied(), Some(reference.code.as_str()));
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn md5_hex_is_lowercase_and_full_length() {
        let hex = md5_hex("");
        assert_eq!(hex, "d41d8cd98f00b204e9800998ecf8427e");
    }
}
