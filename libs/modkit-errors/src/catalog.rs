//! Static fault catalog for failures raised by the wrapper itself

use crate::fault::{Fault, FaultKind};

/// Static fault definition from catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultDef {
    pub kind: FaultKind,
    pub title: &'static str,
    pub code: &'static str,
}

/// The called method is not part of the service's dispatch table.
pub const METHOD_NOT_FOUND: FaultDef = FaultDef {
    kind: FaultKind::Client,
    title: "Method not found",
    code: "METHOD_NOT_FOUND",
};

impl FaultDef {
    /// Convert this definition into a Fault; `subject` is appended to the title.
    ///
    /// The detail carries the catalog code so callers can match on it.
    #[inline]
    pub fn as_fault(&self, subject: impl AsRef<str>) -> Fault {
        let subject = subject.as_ref();
        let message = if subject.is_empty() {
            self.title.to_owned()
        } else {
            format!("{}: {subject}", self.title)
        };
        Fault::new(self.kind, message, self.code).with_code(self.code)
    }
}
