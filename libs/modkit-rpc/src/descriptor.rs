//! Method signatures as registered at startup.

use serde::{Deserialize, Serialize};

/// How a parameter's raw value is coerced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    /// Passed through unchanged.
    Scalar,
    /// Coerced into a single instance of the named type.
    Object(String),
    /// Coerced into a sequence of instances of the named element type.
    CollectionOfObject(String),
}

impl ParameterKind {
    pub fn object(type_id: impl Into<String>) -> Self {
        Self::Object(type_id.into())
    }

    pub fn collection_of(element_type_id: impl Into<String>) -> Self {
        Self::CollectionOfObject(element_type_id.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    /// 0-based position in the argument list.
    pub position: usize,
    pub name: String,
    pub kind: ParameterKind,
}

/// Name, ordered parameters and declared faults of one service method.
///
/// `declared_faults` holds raw declarations: a type identifier optionally followed by
/// free text (`"Acme\\InsufficientFunds when the balance is too low"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct MethodSignature {
    pub name: String,
    pub parameters: Vec<ParameterDescriptor>,
    pub declared_faults: Vec<String>,
}

impl MethodSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            declared_faults: Vec::new(),
        }
    }

    /// Appends a parameter at the next position.
    pub fn param(mut self, name: impl Into<String>, kind: ParameterKind) -> Self {
        self.parameters.push(ParameterDescriptor {
            position: self.parameters.len(),
            name: name.into(),
            kind,
        });
        self
    }

    pub fn scalar(self, name: impl Into<String>) -> Self {
        self.param(name, ParameterKind::Scalar)
    }

    pub fn object(self, name: impl Into<String>, type_id: impl Into<String>) -> Self {
        self.param(name, ParameterKind::object(type_id))
    }

    pub fn collection(
        self,
        name: impl Into<String>,
        element_type_id: impl Into<String>,
    ) -> Self {
        self.param(name, ParameterKind::collection_of(element_type_id))
    }

    /// Adds a declared fault ("throws" contract entry).
    pub fn throws(mut self, declaration: impl Into<String>) -> Self {
        self.declared_faults.push(declaration.into());
        self
    }

    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn builder_assigns_consecutive_positions() {
        let sig = MethodSignature::new("placeOrder")
            .scalar("customerId")
            .object("address", "Acme\\Address")
            .collection("lines", "Acme\\OrderLine")
            .throws("Acme\\OutOfStock if an item is unavailable");

        let positions: Vec<usize> = sig.parameters.iter().map(|p| p.position).collect();
        assert_eq!(positions, [0, 1, 2]);
        assert_eq!(
            sig.parameter("lines").map(|p| &p.kind),
            Some(&ParameterKind::CollectionOfObject("Acme\\OrderLine".to_owned()))
        );
        assert_eq!(sig.declared_faults.len(), 1);
        assert!(sig.parameter("missing").is_none());
    }
}
