//! Code generation tracing.
//!
//! The [`CodegenTracer`] trait defines hook points at the events of entry-point generation.
//! The generator carries its tracer as a type parameter, so with [`NoopTracer`] every hook
//! compiles away.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | Zero-cost no-op (default) |
//! | [`StderrTracer`] | Human-readable generation log to stderr |
//! | [`RecordingTracer`] | Full event recording for tests and post-mortem |

use crate::errors::SignatureError;

/// Trace event emitted during code generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A parameter list was accepted for lowering.
    Signature {
        function: String,
        top_level: usize,
        defaults: usize,
    },
    /// A parameter list was rejected.
    SignatureRejected { function: String, error: SignatureError },
    /// A constant was referenced from emitted code.
    Constant {
        /// Code name of the constant.
        code: String,
        /// Whether this reference added it to the table.
        inserted: bool,
    },
    /// An entry point was emitted.
    EntryPoint {
        identifier: String,
        is_method: bool,
        /// Number of binding operations in its body.
        operations: usize,
    },
}

/// Trait for code generation tracing.
///
/// All methods have default no-op implementations; implementations only override the
/// hooks they care about.
pub trait CodegenTracer: std::fmt::Debug {
    /// Called when a parameter list passed validation.
    #[inline(always)]
    fn on_signature(&mut self, _function: &str, _top_level: usize, _defaults: usize) {}

    /// Called when a parameter list failed validation.
    #[inline(always)]
    fn on_signature_rejected(&mut self, _function: &str, _error: &SignatureError) {}

    /// Called for every constant reference emitted code makes.
    #[inline(always)]
    fn on_constant(&mut self, _code: &str, _inserted: bool) {}

    /// Called after an entry point was built.
    #[inline(always)]
    fn on_entry_point(&mut self, _identifier: &str, _is_method: bool, _operations: usize) {}
}

/// A tracer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl CodegenTracer for NoopTracer {}

/// Tracer that prints a generation log to stderr.
///
/// Output format:
/// ```text
///   --- SIGNATURE f              top_level=2 defaults=1
///   +++ CONSTANT  _python_str_plain_a (new)
///   >>> ENTRY     _fparse_f      ops=7
/// ```
#[derive(Debug, Default)]
pub struct StderrTracer {
    /// Maximum number of lines to print. None = unlimited.
    limit: Option<usize>,
    count: usize,
}

impl StderrTracer {
    /// Creates a new stderr tracer with no line limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new stderr tracer that stops after `limit` lines.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            count: 0,
        }
    }

    fn emit(&mut self, line: &str) {
        if self.limit.is_some_and(|limit| self.count >= limit) {
            return;
        }
        eprintln!("{line}");
        self.count += 1;
        if let Some(limit) = self.limit
            && self.count >= limit
        {
            eprintln!("--- trace limit reached ({limit} lines) ---");
        }
    }
}

impl CodegenTracer for StderrTracer {
    fn on_signature(&mut self, function: &str, top_level: usize, defaults: usize) {
        self.emit(&format!(
            "  --- SIGNATURE {function:<16} top_level={top_level} defaults={defaults}"
        ));
    }

    fn on_signature_rejected(&mut self, function: &str, error: &SignatureError) {
        self.emit(&format!("  !!! REJECTED  {function:<16} {error}"));
    }

    fn on_constant(&mut self, code: &str, inserted: bool) {
        if inserted {
            self.emit(&format!("  +++ CONSTANT  {code} (new)"));
        }
    }

    fn on_entry_point(&mut self, identifier: &str, is_method: bool, operations: usize) {
        let kind = if is_method { "METHOD" } else { "ENTRY " };
        self.emit(&format!("  >>> {kind}    {identifier:<16} ops={operations}"));
    }
}

/// Tracer that records every event.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the events recorded so far.
    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Consumes the tracer, returning the recorded events.
    #[must_use]
    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }
}

impl CodegenTracer for RecordingTracer {
    fn on_signature(&mut self, function: &str, top_level: usize, defaults: usize) {
        self.events.push(TraceEvent::Signature {
            function: function.to_owned(),
            top_level,
            defaults,
        });
    }

    fn on_signature_rejected(&mut self, function: &str, error: &SignatureError) {
        self.events.push(TraceEvent::SignatureRejected {
            function: function.to_owned(),
            error: error.clone(),
        });
    }

    fn on_constant(&mut self, code: &str, inserted: bool) {
        self.events.push(TraceEvent::Constant {
            code: code.to_owned(),
            inserted,
        });
    }

    fn on_entry_point(&mut self, identifier: &str, is_method: bool, operations: usize) {
        self.events.push(TraceEvent::EntryPoint {
            identifier: identifier.to_owned(),
            is_method,
            operations,
        });
    }
}
