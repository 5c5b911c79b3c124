//! Coerced, positional arguments handed to a method handler.

use std::any::{Any, type_name};
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ArgumentError;

/// An instance produced by the object factory and filled by the property mapper.
pub struct TypedObject {
    type_id: String,
    value: Box<dyn Any + Send>,
}

impl TypedObject {
    #[must_use]
    pub fn new(type_id: impl Into<String>, value: Box<dyn Any + Send>) -> Self {
        Self {
            type_id: type_id.into(),
            value,
        }
    }

    /// The registered type identifier this instance was coerced to.
    #[must_use]
    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Takes the concrete value out.
    ///
    /// # Errors
    /// Returns `self` unchanged when the instance is not a `T`.
    pub fn downcast<T: 'static>(self) -> Result<T, Self> {
        let Self { type_id, value } = self;
        value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|value| Self { type_id, value })
    }
}

impl fmt::Debug for TypedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedObject")
            .field("type_id", &self.type_id)
            .finish_non_exhaustive()
    }
}

/// One coerced argument.
#[derive(Debug)]
pub enum Argument {
    /// Scalar parameters and parameters of unregistered types, unchanged.
    Raw(Value),
    Object(TypedObject),
    Objects(Vec<TypedObject>),
}

impl Argument {
    const fn shape(&self) -> &'static str {
        match self {
            Self::Raw(_) => "a raw value",
            Self::Object(_) => "a typed object",
            Self::Objects(_) => "a typed collection",
        }
    }
}

/// Positional arguments matching a method signature one to one.
#[derive(Debug)]
pub struct CoercedArguments {
    slots: Vec<Option<Argument>>,
}

impl CoercedArguments {
    #[must_use]
    pub fn new(arguments: Vec<Argument>) -> Self {
        Self {
            slots: arguments.into_iter().map(Some).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Borrows an argument that has not been taken yet.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&Argument> {
        self.slots.get(position).and_then(Option::as_ref)
    }

    /// Takes an argument out, whatever its shape.
    ///
    /// # Errors
    /// Returns `Missing` if there is no such position or it was already taken.
    pub fn take(&mut self, position: usize) -> Result<Argument, ArgumentError> {
        self.slots
            .get_mut(position)
            .and_then(Option::take)
            .ok_or(ArgumentError::Missing { position })
    }

    /// Takes a raw (scalar or pass-through) argument.
    ///
    /// # Errors
    /// Returns an error if the position is missing or holds a typed object.
    pub fn take_raw(&mut self, position: usize) -> Result<Value, ArgumentError> {
        match self.take(position)? {
            Argument::Raw(value) => Ok(value),
            other => self.put_back(position, other, "a raw value"),
        }
    }

    /// Deserializes a raw argument into `T`.
    ///
    /// # Errors
    /// Returns an error if the position is missing, holds a typed object, or does not
    /// deserialize into `T`.
    pub fn deserialize<T: DeserializeOwned>(&mut self, position: usize) -> Result<T, ArgumentError> {
        let value = self.take_raw(position)?;
        serde_json::from_value(value).map_err(|e| ArgumentError::Deserialize {
            position,
            target: type_name::<T>(),
            reason: e.to_string(),
        })
    }

    /// Takes a coerced object of concrete type `T`.
    ///
    /// # Errors
    /// Returns an error if the position is missing, is not an object, or holds another type.
    pub fn take_object<T: 'static>(&mut self, position: usize) -> Result<T, ArgumentError> {
        match self.take(position)? {
            Argument::Object(object) => match object.downcast::<T>() {
                Ok(value) => Ok(value),
                Err(object) => {
                    self.put_back(position, Argument::Object(object), type_name::<T>())
                }
            },
            other => self.put_back(position, other, "a typed object"),
        }
    }

    /// Takes a coerced collection whose elements are all of type `T`.
    ///
    /// # Errors
    /// Returns an error if the position is missing, is not a collection, or holds
    /// elements of another type.
    pub fn take_objects<T: 'static>(&mut self, position: usize) -> Result<Vec<T>, ArgumentError> {
        let objects = match self.take(position)? {
            Argument::Objects(objects) => objects,
            other => return self.put_back(position, other, "a typed collection"),
        };
        if objects.iter().any(|o| o.downcast_ref::<T>().is_none()) {
            return self.put_back(position, Argument::Objects(objects), type_name::<T>());
        }
        Ok(objects
            .into_iter()
            .filter_map(|o| o.downcast::<T>().ok())
            .collect())
    }

    /// Remaining arguments in position order; taken positions are skipped.
    #[must_use]
    pub fn into_vec(self) -> Vec<Argument> {
        self.slots.into_iter().flatten().collect()
    }

    fn put_back<R>(
        &mut self,
        position: usize,
        argument: Argument,
        expected: &'static str,
    ) -> Result<R, ArgumentError> {
        tracing::trace!(position, found = argument.shape(), expected, "argument shape mismatch");
        if let Some(slot) = self.slots.get_mut(position) {
            *slot = Some(argument);
        }
        Err(ArgumentError::WrongShape { position, expected })
    }
}
