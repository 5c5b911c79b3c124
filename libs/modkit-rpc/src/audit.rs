//! Audit logging of unexpected errors.
//!
//! Every undeclared error is written to the configured [`AuditSink`] as a single
//! critical entry. The correlation identifier shown to the caller travels in the entry's
//! context so operators can find the diagnostics behind a redacted fault.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::RpcWrapperConfig;
use crate::invocation::InvocationError;
use crate::naming::{has_namespace_prefix, segments};

/// A failing sink is reported on its first failure and then on every Nth one.
const SINK_FAILURE_WARN_EVERY: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
        }
    }
}

/// One record handed to a sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub message: String,
    pub severity: Severity,
    /// Structured context: `identifier`, and `stacktrace` when enabled.
    pub context: Map<String, Value>,
    /// Coarse grouping tag (package / module of the raising type).
    pub group: Option<String>,
    /// Declaring type of the innermost frame.
    pub type_id: Option<String>,
    /// Function of the innermost frame.
    pub method: Option<String>,
}

impl AuditEntry {
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        self.context.get("identifier").and_then(Value::as_str)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AuditSinkError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
    #[error("failed to write audit entry: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable destination of audit entries.
pub trait AuditSink: Send + Sync {
    /// # Errors
    /// Returns an error when the entry could not be recorded.
    fn write(&self, entry: &AuditEntry) -> Result<(), AuditSinkError>;
}

/// Emits audit entries as `tracing` events on the `modkit_rpc::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn write(&self, entry: &AuditEntry) -> Result<(), AuditSinkError> {
        let stacktrace = entry.context.get("stacktrace").map(Value::to_string);
        tracing::error!(
            target: "modkit_rpc::audit",
            severity = entry.severity.as_str(),
            group = entry.group.as_deref(),
            type_id = entry.type_id.as_deref(),
            method = entry.method.as_deref(),
            identifier = entry.identifier(),
            stacktrace = stacktrace.as_deref(),
            "{}",
            entry.message
        );
        Ok(())
    }
}

/// Keeps entries in memory; useful for tests and for embedding hosts that forward them.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl AuditSink for MemoryAuditSink {
    fn write(&self, entry: &AuditEntry) -> Result<(), AuditSinkError> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

/// Composes audit entries for undeclared errors and writes them to the sink.
pub struct AuditLogger {
    sink: Option<Arc<dyn AuditSink>>,
    log_stack_traces: bool,
    group_segment: usize,
    groups: BTreeMap<String, String>,
    sink_failures: AtomicU64,
}

impl AuditLogger {
    #[must_use]
    pub fn new(sink: Option<Arc<dyn AuditSink>>, config: &RpcWrapperConfig) -> Self {
        Self {
            sink,
            log_stack_traces: config.log_stack_traces,
            group_segment: config.log_group_segment,
            groups: config.log_groups.clone(),
            sink_failures: AtomicU64::new(0),
        }
    }

    /// A logger without a sink; `log` does nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(None, &RpcWrapperConfig::default())
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Entries the sink rejected so far.
    #[must_use]
    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }

    /// Records `error` with the caller-visible `identifier`, if any.
    ///
    /// Sink failures never propagate. They are counted, and a warning is emitted on the
    /// first one and then on every hundredth.
    pub fn log(&self, error: &InvocationError, identifier: Option<&str>) {
        let Some(sink) = &self.sink else {
            return;
        };
        let entry = self.compose(error, identifier);
        if let Err(e) = sink.write(&entry) {
            let failures = self.sink_failures.fetch_add(1, Ordering::Relaxed) + 1;
            if failures % SINK_FAILURE_WARN_EVERY == 1 {
                tracing::warn!(error = %e, identifier, failures, "audit sink rejected entry");
            }
        }
    }

    /// Builds the entry `log` would write.
    #[must_use]
    pub fn compose(&self, error: &InvocationError, identifier: Option<&str>) -> AuditEntry {
        let origin = error.frames().first();

        let code = if error.code() > 0 {
            format!(" #{}", error.code())
        } else {
            String::new()
        };
        let location = origin
            .and_then(|frame| frame.source_location())
            .map(|(file, line)| format!(" in line {line} of {file}"))
            .unwrap_or_default();
        let message = format!("Uncaught exception{code}. {}{location}.", error.message());

        let type_id = origin.and_then(|frame| frame.declaring_type.clone());
        let method = origin.and_then(|frame| frame.function.clone());
        let group = type_id.as_deref().and_then(|ty| self.group_of(ty));

        let mut context = Map::new();
        if let Some(id) = identifier {
            context.insert("identifier".to_owned(), Value::String(id.to_owned()));
        }
        if self.log_stack_traces {
            context.insert(
                "stacktrace".to_owned(),
                serde_json::to_value(error.frames()).unwrap_or_default(),
            );
        }

        AuditEntry {
            message,
            severity: Severity::Critical,
            context,
            group,
            type_id,
            method,
        }
    }

    /// Explicit table entry with the longest matching prefix, else the configured segment.
    fn group_of(&self, type_id: &str) -> Option<String> {
        self.groups
            .iter()
            .filter(|(prefix, _)| has_namespace_prefix(type_id, prefix))
            .max_by_key(|(prefix, _)| segments(prefix).len())
            .map(|(_, group)| group.clone())
            .or_else(|| {
                segments(type_id)
                    .get(self.group_segment)
                    .map(|s| (*s).to_owned())
            })
    }
}
