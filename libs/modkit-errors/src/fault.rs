//! Transport fault model (pure data, no wire-format dependencies)

use std::fmt;

use serde::{Deserialize, Serialize};

/// Who is responsible for a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    /// The caller caused the failure; the message is part of the method's contract.
    Client,
    /// The failure is internal; details are governed by the exposure policy.
    Server,
}

impl FaultKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Client => "Client",
            Self::Server => "Server",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outward representation of a failed call.
///
/// A transport encodes this into its own protocol fault (a SOAP fault, a JSON-RPC error
/// object, a gRPC status).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct Fault {
    /// Client or server side failure.
    pub kind: FaultKind,
    /// Human-readable message, always shown to the caller.
    pub message: String,
    /// Short fault identifier for client faults; diagnostics or a correlation
    /// identifier for server faults.
    pub detail: String,
    /// Optional machine-readable code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: detail.into(),
            code: None,
        }
    }

    pub fn client(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(FaultKind::Client, message, detail)
    }

    pub fn server(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(FaultKind::Server, message, detail)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn is_client(&self) -> bool {
        self.kind == FaultKind::Client
    }

    #[must_use]
    pub fn is_server(&self) -> bool {
        self.kind == FaultKind::Server
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fault: {}", self.kind, self.message)
    }
}

impl std::error::Error for Fault {}
