//! RPC service wrapper for modkit services
//!
//! Sits between an RPC transport and a plain service object:
//! - Signature-driven coercion of untyped arguments into typed values (`ArgumentCoercer`)
//! - Per-service dispatch table (`ServiceWrapper`, `ServiceWrapperBuilder`)
//! - Declared vs. undeclared error classification (`classify`)
//! - Fault construction under an exposure policy (`FaultBuilder`)
//! - Audit logging of unexpected errors (`AuditLogger`, `AuditSink`)
//!
//! Method signatures and coercion targets are registered once at startup in a
//! [`TypeRegistry`].
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod arguments;
pub mod audit;
pub mod classify;
pub mod coerce;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod fault_builder;
pub mod invocation;
pub mod mapper;
pub mod naming;
pub mod registry;
pub mod service;

// Re-export commonly used types
pub use arguments::{Argument, CoercedArguments, TypedObject};
pub use audit::{
    AuditEntry, AuditLogger, AuditSink, AuditSinkError, MemoryAuditSink, Severity,
    TracingAuditSink,
};
pub use classify::{Classification, ClassifiedError, classify};
pub use coerce::ArgumentCoercer;
pub use config::{ConfigError, ConfigProvider, ExposurePolicy, RpcWrapperConfig};
pub use descriptor::{MethodSignature, ParameterDescriptor, ParameterKind};
pub use error::{ArgumentError, MappingError, RegistrationError};
pub use fault_builder::FaultBuilder;
pub use invocation::{InvocationError, ServiceError, StackFrame};
pub use mapper::{DefaultPropertyMapper, Mappable, ObjectFactory, PropertyMapper, SerdeObject};
pub use registry::{TypeDescriptor, TypeDescriptorLookup, TypeRegistry};
pub use service::{Handler, ServiceHandle, ServiceWrapper, ServiceWrapperBuilder};

pub use modkit_errors::{Fault, FaultKind};
