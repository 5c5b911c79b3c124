//! Error types raised by the wrapper itself.

use std::borrow::Cow;

use crate::invocation::ServiceError;

/// A nested object or collection argument could not be fully mapped.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Could not map argument {parameter} to type {type_id}: {}", .errors.join("; "))]
pub struct MappingError {
    pub parameter: String,
    pub type_id: String,
    /// One entry per property the mapper rejected.
    pub errors: Vec<String>,
}

impl MappingError {
    /// Runtime type identifier used when a mapping error is classified.
    ///
    /// A method that lists this identifier among its declared faults turns mapping
    /// failures into client faults.
    pub const TYPE_ID: &'static str = "modkit_rpc::MappingError";
}

impl ServiceError for MappingError {
    fn fault_type(&self) -> Cow<'static, str> {
        Cow::Borrowed(Self::TYPE_ID)
    }
}

/// Rejected while assembling a service's dispatch table.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("method '{method}' is already registered for type '{type_id}'")]
    DuplicateMethod { type_id: String, method: String },
    #[error("method name must not be empty (type '{type_id}')")]
    EmptyMethodName { type_id: String },
    #[error(
        "parameter '{parameter}' of method '{method}' has position {position}, expected {expected}"
    )]
    InvalidPosition {
        method: String,
        parameter: String,
        position: usize,
        expected: usize,
    },
    #[error("type '{type_id}' does not serialize to a record")]
    NotARecord { type_id: String },
}

/// A handler asked for an argument in a shape the coercer did not produce.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("no argument at position {position}")]
    Missing { position: usize },
    #[error("argument {position} is not {expected}")]
    WrongShape {
        position: usize,
        expected: &'static str,
    },
    #[error("argument {position} cannot be read as {target}: {reason}")]
    Deserialize {
        position: usize,
        target: &'static str,
        reason: String,
    },
}

impl ServiceError for ArgumentError {
    fn fault_type(&self) -> Cow<'static, str> {
        Cow::Borrowed("modkit_rpc::ArgumentError")
    }
}
