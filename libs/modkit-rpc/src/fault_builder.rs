//! Turns classified errors into outward faults.
//!
//! Declared errors become client faults carrying the handler's message. Undeclared errors
//! become server faults whose content depends on the [`ExposurePolicy`]; they are always
//! written to the audit log first.

use std::collections::BTreeMap;

use modkit_errors::Fault;
use uuid::Uuid;

use crate::audit::AuditLogger;
use crate::classify::{Classification, ClassifiedError};
use crate::config::{ExposurePolicy, RpcWrapperConfig};
use crate::invocation::InvocationError;
use crate::naming::{same_type, segments, trim_leading_separators};

pub struct FaultBuilder {
    policy: ExposurePolicy,
    detail_strip_segments: usize,
    fault_codes: BTreeMap<String, String>,
    audit: AuditLogger,
}

impl FaultBuilder {
    #[must_use]
    pub fn new(config: &RpcWrapperConfig, audit: AuditLogger) -> Self {
        Self {
            policy: config.exposure_policy(),
            detail_strip_segments: config.detail_strip_segments,
            fault_codes: config.fault_codes.clone(),
            audit,
        }
    }

    #[must_use]
    pub fn policy(&self) -> ExposurePolicy {
        self.policy
    }

    pub fn build(&self, classified: ClassifiedError) -> Fault {
        let ClassifiedError {
            error,
            classification,
        } = classified;
        match classification {
            Classification::Declared(fault_type) => self.declared(&fault_type, &error),
            Classification::Undeclared => self.undeclared(&error),
        }
    }

    fn declared(&self, fault_type: &str, error: &InvocationError) -> Fault {
        let fault = Fault::client(error.message(), self.detail_for(fault_type));
        if error.code() > 0 {
            fault.with_code(error.code().to_string())
        } else {
            fault
        }
    }

    fn undeclared(&self, error: &InvocationError) -> Fault {
        if self.policy.expose_internal_details {
            self.audit.log(error, None);
            return Fault::server(
                format!(
                    "{} ({}): {}",
                    trim_leading_separators(error.fault_type()),
                    error.code(),
                    error.message()
                ),
                error.trace_string(),
            );
        }

        let identifier = Uuid::new_v4().to_string();
        self.audit.log(error, Some(&identifier));
        tracing::debug!(%identifier, fault_type = error.fault_type(), "redacted undeclared error");
        Fault::server(
            format!("Internal server error. The error was logged as {identifier}"),
            identifier,
        )
    }

    /// Short identifier of a declared fault type.
    ///
    /// An explicit `fault_codes` entry wins; otherwise the leading
    /// `detail_strip_segments` namespace segments are dropped (the last one always
    /// survives) and the rest joined with `_`.
    #[must_use]
    pub fn detail_for(&self, fault_type: &str) -> String {
        if let Some(code) = self
            .fault_codes
            .iter()
            .find_map(|(ty, code)| same_type(ty, fault_type).then_some(code))
        {
            return code.clone();
        }
        let parts = segments(fault_type);
        let keep_from = self.detail_strip_segments.min(parts.len().saturating_sub(1));
        parts
            .get(keep_from..)
            .map(|rest| rest.join("_"))
            .unwrap_or_default()
    }
}
