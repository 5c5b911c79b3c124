//! Property mapping: copying fields from an untyped record onto a fresh typed instance.
//!
//! The [`PropertyMapper`] and [`ObjectFactory`] traits are the seams to the hosting
//! framework. [`DefaultPropertyMapper`] and [`SerdeObject`] implement them on top of
//! serde so any `Serialize + DeserializeOwned + Default` type can be a coercion target.

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A typed instance whose properties can be assigned one by one.
pub trait Mappable: Send + 'static {
    /// Assigns one property.
    ///
    /// # Errors
    /// Returns a human-readable reason when the value does not fit the property.
    fn set_property(&mut self, name: &str, value: Value) -> Result<(), String>;

    /// Current state as an untyped record, used when this instance is nested in another.
    ///
    /// # Errors
    /// Returns a reason when the instance cannot be represented as a value.
    fn to_value(&self) -> Result<Value, String> {
        Err("type cannot be nested in another coerced type".to_owned())
    }

    /// Assigns a coerced nested object.
    ///
    /// Types that hold their children natively override this; the default assigns the
    /// child's [`to_value`](Self::to_value) through [`set_property`](Self::set_property).
    ///
    /// # Errors
    /// Returns a reason when the child does not fit the property.
    fn set_object(&mut self, name: &str, object: Box<dyn Mappable>) -> Result<(), String> {
        let value = object.to_value()?;
        self.set_property(name, value)
    }

    /// Assigns a coerced nested collection, elements in order.
    ///
    /// # Errors
    /// Returns a reason when the elements do not fit the property.
    fn set_objects(&mut self, name: &str, objects: Vec<Box<dyn Mappable>>) -> Result<(), String> {
        let mut values = Vec::with_capacity(objects.len());
        for object in &objects {
            values.push(object.to_value()?);
        }
        self.set_property(name, Value::Array(values))
    }

    /// Releases the finished instance for handing over to a method handler.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

/// Creates empty instances of registered types.
pub trait ObjectFactory: Send + Sync {
    /// Returns `None` when no constructor is registered for `type_id`.
    fn create(&self, type_id: &str) -> Option<Box<dyn Mappable>>;
}

/// Copies the declared properties from a flat record onto a target instance.
pub trait PropertyMapper: Send + Sync {
    /// Maps every name in `property_names` that `source` carries.
    ///
    /// # Errors
    /// Returns every property that could not be mapped, one message per property.
    fn map(
        &self,
        property_names: &BTreeSet<String>,
        source: &Map<String, Value>,
        target: &mut dyn Mappable,
    ) -> Result<(), Vec<String>>;
}

/// Field-name matching mapper.
///
/// Source keys outside `property_names` are ignored; declared properties missing from
/// the source keep the instance's defaults.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPropertyMapper;

impl PropertyMapper for DefaultPropertyMapper {
    fn map(
        &self,
        property_names: &BTreeSet<String>,
        source: &Map<String, Value>,
        target: &mut dyn Mappable,
    ) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        for name in property_names {
            let Some(value) = source.get(name) else {
                continue;
            };
            if let Err(reason) = target.set_property(name, value.clone()) {
                errors.push(format!("{name}: {reason}"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Adapter that makes a serde type assignable property by property.
///
/// Each assignment round-trips the current value through `serde_json::Value`, so a
/// rejected property leaves the instance unchanged.
pub struct SerdeObject<T> {
    value: T,
}

impl<T: Default> SerdeObject<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            value: T::default(),
        }
    }
}

impl<T: Default> Default for SerdeObject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SerdeObject<T> {
    #[must_use]
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for SerdeObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerdeObject")
            .field("value", &self.value)
            .finish()
    }
}

impl<T> Mappable for SerdeObject<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    fn set_property(&mut self, name: &str, value: Value) -> Result<(), String> {
        let mut current = serde_json::to_value(&self.value).map_err(|e| e.to_string())?;
        let Some(fields) = current.as_object_mut() else {
            return Err("target type is not a record".to_owned());
        };
        fields.insert(name.to_owned(), value);
        self.value = serde_json::from_value(current).map_err(|e| e.to_string())?;
        Ok(())
    }

    fn to_value(&self) -> Result<Value, String> {
        serde_json::to_value(&self.value).map_err(|e| e.to_string())
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        Box::new(self.value)
    }
}

/// Property names of a serde record type, read from its default value.
///
/// Returns `None` when `T` does not serialize to a record.
#[must_use]
pub fn serde_property_names<T: Serialize + Default>() -> Option<BTreeSet<String>> {
    match serde_json::to_value(T::default()) {
        Ok(Value::Object(fields)) => Some(fields.keys().cloned().collect()),
        _ => None,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Address {
        street: String,
        zip: u32,
    }

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn serde_object_assigns_properties() {
        let mut obj = SerdeObject::<Address>::new();
        obj.set_property("street", json!("Main St")).unwrap();
        obj.set_property("zip", json!(12345)).unwrap();
        assert_eq!(obj.into_inner(), Address {
            street: "Main St".to_owned(),
            zip: 12345
        });
    }

    #[test]
    fn rejected_property_keeps_previous_value() {
        let mut obj = SerdeObject::<Address>::new();
        obj.set_property("zip", json!(7)).unwrap();
        assert!(obj.set_property("zip", json!("not a number")).is_err());
        assert_eq!(obj.into_inner().zip, 7);
    }

    #[test]
    fn into_any_yields_the_inner_type() {
        let obj: Box<dyn Mappable> = Box::new(SerdeObject::<Address>::new());
        let any = obj.into_any();
        assert!(any.downcast::<Address>().is_ok());
    }

    #[test]
    fn mapper_collects_every_failure() {
        let mut obj = SerdeObject::<Address>::new();
        let source = json!({ "street": 5, "zip": "x", "ignored": true });
        let errors = DefaultPropertyMapper
            .map(
                &names(&["street", "zip"]),
                source.as_object().unwrap(),
                &mut obj,
            )
            .unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("street: "));
        assert!(errors[1].starts_with("zip: "));
    }

    #[test]
    fn mapper_ignores_undeclared_and_missing_keys() {
        let mut obj = SerdeObject::<Address>::new();
        let source = json!({ "street": "Elm", "extra": [1, 2] });
        DefaultPropertyMapper
            .map(
                &names(&["street", "zip"]),
                source.as_object().unwrap(),
                &mut obj,
            )
            .unwrap();
        assert_eq!(obj.into_inner(), Address {
            street: "Elm".to_owned(),
            zip: 0
        });
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Customer {
        name: String,
        address: Option<Address>,
        previous: Vec<Address>,
    }

    /// Accepts any property but has no value representation.
    struct Opaque;

    impl Mappable for Opaque {
        fn set_property(&mut self, _name: &str, _value: Value) -> Result<(), String> {
            Ok(())
        }

        fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
            self
        }
    }

    fn address(zip: u32) -> Box<dyn Mappable> {
        let mut obj = SerdeObject::<Address>::new();
        obj.set_property("zip", json!(zip)).unwrap();
        Box::new(obj)
    }

    #[test]
    fn nested_objects_are_assigned_through_their_value() {
        let mut customer = SerdeObject::<Customer>::new();
        customer.set_object("address", address(1)).unwrap();
        customer
            .set_objects("previous", vec![address(2), address(3)])
            .unwrap();
        let customer = customer.into_inner();
        assert_eq!(customer.address.map(|a| a.zip), Some(1));
        let zips: Vec<u32> = customer.previous.iter().map(|a| a.zip).collect();
        assert_eq!(zips, [2, 3]);
    }

    #[test]
    fn types_without_value_cannot_be_nested() {
        let mut customer = SerdeObject::<Customer>::new();
        let err = customer.set_object("address", Box::new(Opaque)).unwrap_err();
        assert!(err.contains("cannot be nested"));
    }

    #[test]
    fn property_names_come_from_default_value() {
        assert_eq!(serde_property_names::<Address>(), Some(names(&["street", "zip"])));
        assert_eq!(serde_property_names::<u32>(), None);
    }
}
