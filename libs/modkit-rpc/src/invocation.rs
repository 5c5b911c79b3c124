//! Errors raised by service handlers, as seen by the fault pipeline.

use std::borrow::Cow;
use std::fmt;
use std::panic::Location;

use serde::Serialize;

/// An error a service handler can raise.
///
/// `fault_type` is the runtime type identifier matched against a method's declared
/// faults. It defaults to the Rust type path; override it to publish a stable name.
pub trait ServiceError: std::error::Error + Send + Sync + 'static {
    fn fault_type(&self) -> Cow<'static, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }

    /// Numeric error code; `0` means none.
    fn code(&self) -> i64 {
        0
    }
}

/// One entry of an error's captured trace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StackFrame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declaring_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl StackFrame {
    #[must_use]
    pub fn at(location: &Location<'_>) -> Self {
        Self {
            declaring_type: None,
            function: None,
            file: Some(location.file().to_owned()),
            line: Some(location.line()),
        }
    }

    #[must_use]
    pub fn in_function(
        mut self,
        declaring_type: impl Into<String>,
        function: impl Into<String>,
    ) -> Self {
        self.declaring_type = Some(declaring_type.into());
        self.function = Some(function.into());
        self
    }

    /// File and line, when both are known.
    #[must_use]
    pub fn source_location(&self) -> Option<(&str, u32)> {
        Some((self.file.as_deref()?, self.line?))
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.declaring_type, &self.function) {
            (Some(ty), Some(func)) => write!(f, "{ty}::{func}()")?,
            (None, Some(func)) => write!(f, "{func}()")?,
            (Some(ty), None) => f.write_str(ty)?,
            (None, None) => f.write_str("?")?,
        }
        if let Some((file, line)) = self.source_location() {
            write!(f, " at {file}:{line}")?;
        }
        Ok(())
    }
}

/// A captured handler error: type identifier, code, message and trace.
///
/// Every [`ServiceError`] converts into this with `?`; the first frame records where
/// the conversion happened.
#[derive(Debug)]
pub struct InvocationError {
    fault_type: String,
    code: i64,
    message: String,
    frames: Vec<StackFrame>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl InvocationError {
    #[track_caller]
    pub fn new(fault_type: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self {
            fault_type: fault_type.into(),
            code,
            message: message.into(),
            frames: vec![StackFrame::at(Location::caller())],
            source: None,
        }
    }

    #[track_caller]
    pub fn from_service_error<E: ServiceError>(err: E) -> Self {
        let mut captured = Self::new(err.fault_type(), err.code(), err.to_string());
        captured.source = Some(Box::new(err));
        captured
    }

    /// Appends an outer frame.
    #[must_use]
    pub fn with_frame(mut self, frame: StackFrame) -> Self {
        self.frames.push(frame);
        self
    }

    /// Names the service method on the innermost frame if the raise site left it blank.
    pub(crate) fn annotate_origin(&mut self, declaring_type: &str, function: &str) {
        match self.frames.first_mut() {
            Some(frame) => {
                if frame.declaring_type.is_none() {
                    frame.declaring_type = Some(declaring_type.to_owned());
                }
                if frame.function.is_none() {
                    frame.function = Some(function.to_owned());
                }
            }
            None => self
                .frames
                .push(StackFrame::default().in_function(declaring_type, function)),
        }
    }

    #[must_use]
    pub fn fault_type(&self) -> &str {
        &self.fault_type
    }

    #[must_use]
    pub fn code(&self) -> i64 {
        self.code
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    /// The original error, when the invocation error was converted from one.
    #[must_use]
    pub fn source_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Formatted trace, one numbered frame per line.
    #[must_use]
    pub fn trace_string(&self) -> String {
        self.frames
            .iter()
            .enumerate()
            .map(|(i, frame)| format!("#{i} {frame}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.fault_type, self.message)
    }
}

impl<E: ServiceError> From<E> for InvocationError {
    #[track_caller]
    fn from(err: E) -> Self {
        Self::from_service_error(err)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("connect failed")]
    struct DatabaseTimeout;

    impl ServiceError for DatabaseTimeout {
        fn code(&self) -> i64 {
            7
        }
    }

    fn connect() -> Result<(), DatabaseTimeout> {
        Err(DatabaseTimeout)
    }

    fn failing() -> Result<(), InvocationError> {
        connect()?;
        Ok(())
    }

    #[test]
    fn conversion_captures_type_code_and_location() {
        let err = failing().unwrap_err();
        assert!(err.fault_type().ends_with("DatabaseTimeout"));
        assert_eq!(err.code(), 7);
        assert_eq!(err.message(), "connect failed");
        assert_eq!(err.frames().len(), 1);
        assert!(err.frames()[0].line.is_some());
        assert!(err.source_error().is_some());
    }

    #[test]
    fn annotate_origin_fills_blank_frame_only() {
        let mut err = InvocationError::new("x::Boom", 0, "boom");
        err.annotate_origin("bank::Accounts", "transfer");
        err.annotate_origin("other::Type", "other");
        let frame = &err.frames()[0];
        assert_eq!(frame.declaring_type.as_deref(), Some("bank::Accounts"));
        assert_eq!(frame.function.as_deref(), Some("transfer"));
    }

    #[test]
    fn trace_string_numbers_frames() {
        let err = InvocationError::new("x::Boom", 0, "boom")
            .with_frame(StackFrame::default().in_function("bank::Gateway", "call"));
        let trace = err.trace_string();
        let lines: Vec<&str> = trace.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("#0 ?"));
        assert_eq!(lines[1], "#1 bank::Gateway::call()");
    }
}
