//! Declared vs. undeclared error classification.

use crate::descriptor::MethodSignature;
use crate::invocation::InvocationError;
use crate::naming::{same_type, trim_leading_separators};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The error's type is part of the method's documented fault contract.
    Declared(String),
    Undeclared,
}

/// A caught error tagged with its classification.
#[derive(Debug)]
pub struct ClassifiedError {
    pub error: InvocationError,
    pub classification: Classification,
}

impl ClassifiedError {
    #[must_use]
    pub fn is_declared(&self) -> bool {
        matches!(self.classification, Classification::Declared(_))
    }
}

/// Tags `error` as declared iff `signature` lists its exact type.
#[must_use]
pub fn classify(error: InvocationError, signature: &MethodSignature) -> ClassifiedError {
    let classification = if is_declared(error.fault_type(), &signature.declared_faults) {
        Classification::Declared(trim_leading_separators(error.fault_type()).to_owned())
    } else {
        Classification::Undeclared
    };
    ClassifiedError {
        error,
        classification,
    }
}

/// Whether any declaration names `fault_type`.
///
/// Only the first whitespace-delimited token of a declaration is significant; the rest
/// is documentation. Matching is exact identity, never subtype.
#[must_use]
pub fn is_declared(fault_type: &str, declarations: &[String]) -> bool {
    declarations
        .iter()
        .filter_map(|declaration| declaration.split_whitespace().next())
        .any(|declared| same_type(declared, fault_type))
}
