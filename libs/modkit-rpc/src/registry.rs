//! Type descriptor lookup and the in-memory registry backing it.
//!
//! Design goals:
//! - Everything a call needs is registered once at startup; calls only read.
//! - Keys are type identifiers with leading separators removed, so `\Acme\Account` and
//!   `Acme\Account` address the same entry.
//! - Sync hot path: lookups take a shared `parking_lot` read lock and clone out small
//!   descriptors, never holding the lock while user code runs.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::descriptor::{MethodSignature, ParameterDescriptor, ParameterKind};
use crate::error::RegistrationError;
use crate::mapper::{Mappable, ObjectFactory, SerdeObject, serde_property_names};
use crate::naming::registry_key;

/// Read access to method signatures and type metadata.
pub trait TypeDescriptorLookup: Send + Sync {
    /// Ordered parameters of `method` on `type_id`, or `None` if the method is unknown.
    fn parameters(&self, type_id: &str, method: &str) -> Option<Vec<ParameterDescriptor>>;

    /// Raw "throws" declarations of `method` on `type_id`.
    fn declared_fault_types(&self, type_id: &str, method: &str) -> Vec<String>;

    fn is_known_type(&self, type_id: &str) -> bool;

    fn property_names(&self, type_id: &str) -> BTreeSet<String>;

    /// Properties that need coercion themselves (nested objects and collections).
    fn property_kinds(&self, _type_id: &str) -> BTreeMap<String, ParameterKind> {
        BTreeMap::new()
    }

    /// Full signature assembled from `parameters` and `declared_fault_types`.
    fn method_signature(&self, type_id: &str, method: &str) -> Option<MethodSignature> {
        let parameters = self.parameters(type_id, method)?;
        Some(MethodSignature {
            name: method.to_owned(),
            parameters,
            declared_faults: self.declared_fault_types(type_id, method),
        })
    }
}

type Constructor = Arc<dyn Fn() -> Box<dyn Mappable> + Send + Sync>;

/// Metadata of one registered coercion target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub type_id: String,
    pub property_names: BTreeSet<String>,
    pub property_kinds: BTreeMap<String, ParameterKind>,
}

impl TypeDescriptor {
    pub fn new(
        type_id: impl Into<String>,
        property_names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            type_id: type_id.into(),
            property_names: property_names.into_iter().map(Into::into).collect(),
            property_kinds: BTreeMap::new(),
        }
    }

    /// Declares how a nested property is coerced.
    #[must_use]
    pub fn with_property_kind(mut self, property: impl Into<String>, kind: ParameterKind) -> Self {
        self.property_kinds.insert(property.into(), kind);
        self
    }
}

struct TypeEntry {
    descriptor: TypeDescriptor,
    constructor: Constructor,
}

/// In-memory [`TypeDescriptorLookup`] and [`ObjectFactory`].
pub struct TypeRegistry {
    types: RwLock<HashMap<String, TypeEntry>>,
    methods: RwLock<HashMap<(String, String), MethodSignature>>,
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            types: RwLock::new(HashMap::new()),
            methods: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a coercion target with an explicit constructor.
    ///
    /// Re-registering a type replaces the previous entry.
    pub fn register_type<F>(&self, descriptor: TypeDescriptor, constructor: F)
    where
        F: Fn() -> Box<dyn Mappable> + Send + Sync + 'static,
    {
        let key = registry_key(&descriptor.type_id);
        tracing::debug!(type_id = %key, "registering coercion target");
        self.types.write().insert(
            key,
            TypeEntry {
                descriptor,
                constructor: Arc::new(constructor),
            },
        );
    }

    /// Registers a serde record type; property names are read from `T::default()`.
    ///
    /// # Errors
    /// Returns `NotARecord` if `T` does not serialize to a JSON object.
    pub fn register_serde_type<T>(&self, type_id: &str) -> Result<(), RegistrationError>
    where
        T: Serialize + DeserializeOwned + Default + Send + 'static,
    {
        self.register_serde_type_with::<T>(type_id, std::iter::empty::<(&str, ParameterKind)>())
    }

    /// Like [`register_serde_type`](Self::register_serde_type), declaring nested property kinds.
    ///
    /// # Errors
    /// Returns `NotARecord` if `T` does not serialize to a JSON object.
    pub fn register_serde_type_with<T>(
        &self,
        type_id: &str,
        property_kinds: impl IntoIterator<Item = (impl Into<String>, ParameterKind)>,
    ) -> Result<(), RegistrationError>
    where
        T: Serialize + DeserializeOwned + Default + Send + 'static,
    {
        let names = serde_property_names::<T>().ok_or_else(|| RegistrationError::NotARecord {
            type_id: type_id.to_owned(),
        })?;
        let descriptor = property_kinds.into_iter().fold(
            TypeDescriptor::new(type_id, names),
            |descriptor, (property, kind)| descriptor.with_property_kind(property, kind),
        );
        self.register_type(descriptor, || -> Box<dyn Mappable> {
            Box::new(SerdeObject::<T>::new())
        });
        Ok(())
    }

    /// Registers a method signature under `type_id`.
    ///
    /// # Errors
    /// Returns an error for empty names, duplicate methods, or parameter positions that
    /// are not `0..n` in order.
    pub fn register_method(
        &self,
        type_id: &str,
        signature: MethodSignature,
    ) -> Result<(), RegistrationError> {
        self.register_methods(type_id, vec![signature])
    }

    /// Registers a batch of method signatures under `type_id`, all or nothing.
    ///
    /// Every signature is checked before the first one is stored, so a rejected batch
    /// leaves the registry unchanged.
    ///
    /// # Errors
    /// Returns the first error found: empty names, parameter positions that are not
    /// `0..n`, or a method already registered (or repeated within the batch).
    pub fn register_methods(
        &self,
        type_id: &str,
        signatures: Vec<MethodSignature>,
    ) -> Result<(), RegistrationError> {
        let key = registry_key(type_id);
        for signature in &signatures {
            validate_signature(&key, signature)?;
        }

        let mut methods = self.methods.write();
        let mut batch = HashSet::with_capacity(signatures.len());
        for signature in &signatures {
            let name = signature.name.as_str();
            if !batch.insert(name) || methods.contains_key(&(key.clone(), name.to_owned())) {
                return Err(RegistrationError::DuplicateMethod {
                    type_id: key,
                    method: name.to_owned(),
                });
            }
        }

        for signature in signatures {
            tracing::debug!(type_id = %key, method = %signature.name, "registering method signature");
            methods.insert((key.clone(), signature.name.clone()), signature);
        }
        Ok(())
    }

    /// Registered descriptor of a type.
    #[must_use]
    pub fn descriptor(&self, type_id: &str) -> Option<TypeDescriptor> {
        self.types
            .read()
            .get(&registry_key(type_id))
            .map(|entry| entry.descriptor.clone())
    }

    /// Introspection: (registered types, registered methods).
    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        (self.types.read().len(), self.methods.read().len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty() && self.methods.read().is_empty()
    }

    fn with_method<R>(
        &self,
        type_id: &str,
        method: &str,
        f: impl FnOnce(&MethodSignature) -> R,
    ) -> Option<R> {
        let methods = self.methods.read();
        methods
            .get(&(registry_key(type_id), method.to_owned()))
            .map(f)
    }
}

fn validate_signature(type_id: &str, signature: &MethodSignature) -> Result<(), RegistrationError> {
    if signature.name.is_empty() {
        return Err(RegistrationError::EmptyMethodName {
            type_id: type_id.to_owned(),
        });
    }
    for (expected, parameter) in signature.parameters.iter().enumerate() {
        if parameter.position != expected {
            return Err(RegistrationError::InvalidPosition {
                method: signature.name.clone(),
                parameter: parameter.name.clone(),
                position: parameter.position,
                expected,
            });
        }
    }
    Ok(())
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (types, methods) = self.counts();
        f.debug_struct("TypeRegistry")
            .field("types", &types)
            .field("methods", &methods)
            .finish()
    }
}

impl TypeDescriptorLookup for TypeRegistry {
    fn parameters(&self, type_id: &str, method: &str) -> Option<Vec<ParameterDescriptor>> {
        self.with_method(type_id, method, |sig| sig.parameters.clone())
    }

    fn declared_fault_types(&self, type_id: &str, method: &str) -> Vec<String> {
        self.with_method(type_id, method, |sig| sig.declared_faults.clone())
            .unwrap_or_default()
    }

    fn is_known_type(&self, type_id: &str) -> bool {
        self.types.read().contains_key(&registry_key(type_id))
    }

    fn property_names(&self, type_id: &str) -> BTreeSet<String> {
        self.descriptor(type_id)
            .map(|d| d.property_names)
            .unwrap_or_default()
    }

    fn property_kinds(&self, type_id: &str) -> BTreeMap<String, ParameterKind> {
        self.descriptor(type_id)
            .map(|d| d.property_kinds)
            .unwrap_or_default()
    }

    fn method_signature(&self, type_id: &str, method: &str) -> Option<MethodSignature> {
        self.with_method(type_id, method, Clone::clone)
    }
}

impl ObjectFactory for TypeRegistry {
    fn create(&self, type_id: &str) -> Option<Box<dyn Mappable>> {
        let constructor = self
            .types
            .read()
            .get(&registry_key(type_id))
            .map(|entry| Arc::clone(&entry.constructor))?;
        Some(constructor())
    }
}
