//! Core fault types for RPC service wrappers
//!
//! This crate provides pure data types for the outward side of a failed call, with no
//! dependencies on a wire protocol. It includes:
//! - Transport faults (`Fault`, `FaultKind`)
//! - Static fault catalog support (`FaultDef`)
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod catalog;
pub mod fault;

// Re-export commonly used types
pub use catalog::{FaultDef, METHOD_NOT_FOUND};
pub use fault::{Fault, FaultKind};
