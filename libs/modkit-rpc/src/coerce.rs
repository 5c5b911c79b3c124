//! Signature-driven argument coercion.
//!
//! Raw arguments arrive as untyped JSON records. Each parameter's [`ParameterKind`]
//! decides what happens to its value:
//! - `Scalar`, and `Object` of an unregistered type: passed through unchanged
//! - `Object` of a registered type: a fresh instance filled by the property mapper
//! - `CollectionOfObject`: elements unwrapped from their keyed form, then coerced one by
//!   one when the element type is registered
//!
//! Properties of a registered type that carry a kind of their own (see
//! [`TypeDescriptor::with_property_kind`](crate::registry::TypeDescriptor::with_property_kind))
//! follow the same rules recursively: each nested instance comes from the factory, is
//! filled by the mapper and is then assigned to its parent.
//!
//! Nothing is returned unless every parameter coerced, so a handler never sees a
//! partially-coerced argument list.

use serde_json::{Map, Value};

use crate::arguments::{Argument, CoercedArguments, TypedObject};
use crate::descriptor::{ParameterDescriptor, ParameterKind};
use crate::error::MappingError;
use crate::mapper::{Mappable, ObjectFactory, PropertyMapper};
use crate::naming::short_name;
use crate::registry::TypeDescriptorLookup;

/// Borrowed view over the collaborators one coercion pass needs.
#[derive(Clone, Copy)]
pub struct ArgumentCoercer<'a> {
    lookup: &'a dyn TypeDescriptorLookup,
    factory: &'a dyn ObjectFactory,
    mapper: &'a dyn PropertyMapper,
}

impl<'a> ArgumentCoercer<'a> {
    #[must_use]
    pub fn new(
        lookup: &'a dyn TypeDescriptorLookup,
        factory: &'a dyn ObjectFactory,
        mapper: &'a dyn PropertyMapper,
    ) -> Self {
        Self {
            lookup,
            factory,
            mapper,
        }
    }

    /// Coerces `raw` against `parameters`, one output per parameter in position order.
    ///
    /// Positions without a raw value coerce from `null`; raw values beyond the declared
    /// parameters are dropped.
    ///
    /// # Errors
    /// Returns the first `MappingError`; no arguments are produced in that case.
    pub fn coerce(
        &self,
        raw: Vec<Value>,
        parameters: &[ParameterDescriptor],
    ) -> Result<CoercedArguments, MappingError> {
        if raw.len() > parameters.len() {
            tracing::debug!(
                received = raw.len(),
                declared = parameters.len(),
                "ignoring surplus raw arguments"
            );
        }
        let mut slots: Vec<Option<Value>> = raw.into_iter().map(Some).collect();
        let mut ordered: Vec<&ParameterDescriptor> = parameters.iter().collect();
        ordered.sort_by_key(|p| p.position);

        let mut arguments = Vec::with_capacity(ordered.len());
        for parameter in ordered {
            let value = slots
                .get_mut(parameter.position)
                .and_then(Option::take)
                .unwrap_or(Value::Null);
            arguments.push(self.coerce_parameter(parameter, value)?);
        }
        Ok(CoercedArguments::new(arguments))
    }

    fn coerce_parameter(
        &self,
        parameter: &ParameterDescriptor,
        raw: Value,
    ) -> Result<Argument, MappingError> {
        match &parameter.kind {
            ParameterKind::Scalar => Ok(Argument::Raw(raw)),
            ParameterKind::Object(type_id) if !self.lookup.is_known_type(type_id) => {
                Ok(Argument::Raw(raw))
            }
            ParameterKind::Object(type_id) => self
                .coerce_object(type_id, raw)
                .map(Argument::Object)
                .map_err(|errors| mapping_error(parameter, type_id, errors)),
            ParameterKind::CollectionOfObject(element_type) => {
                let elements = keyed_elements(raw, element_type)
                    .map_err(|reason| mapping_error(parameter, element_type, vec![reason]))?;
                if !self.lookup.is_known_type(element_type) {
                    return Ok(Argument::Raw(Value::Array(elements)));
                }
                let mut objects = Vec::with_capacity(elements.len());
                for (index, element) in elements.into_iter().enumerate() {
                    let object = self.coerce_object(element_type, element).map_err(|errors| {
                        mapping_error(parameter, element_type, prefixed(&format!("[{index}]"), errors))
                    })?;
                    objects.push(object);
                }
                Ok(Argument::Objects(objects))
            }
        }
    }

    /// Builds one instance of a registered type from a raw record.
    fn coerce_object(&self, type_id: &str, raw: Value) -> Result<TypedObject, Vec<String>> {
        self.build_object(type_id, raw)
            .map(|target| TypedObject::new(type_id, target.into_any()))
    }

    /// Creates an instance through the factory and fills it.
    ///
    /// Plain properties go through the mapper; properties with a registered kind are
    /// coerced like top-level parameters and assigned to the instance afterwards.
    fn build_object(&self, type_id: &str, raw: Value) -> Result<Box<dyn Mappable>, Vec<String>> {
        let mut record = match raw {
            Value::Null => Map::new(),
            Value::Object(record) => record,
            other => {
                return Err(vec![format!(
                    "expected a record for {type_id}, got {}",
                    json_type(&other)
                )]);
            }
        };
        let Some(mut target) = self.factory.create(type_id) else {
            return Err(vec![format!("no constructor registered for {type_id}")]);
        };

        let mut plain_names = self.lookup.property_names(type_id);
        let mut nested = Vec::new();
        for (property, kind) in self.lookup.property_kinds(type_id) {
            if kind == ParameterKind::Scalar {
                continue;
            }
            plain_names.remove(&property);
            if let Some(value) = record.remove(&property) {
                nested.push((property, kind, value));
            }
        }

        let mut errors = self
            .mapper
            .map(&plain_names, &record, target.as_mut())
            .err()
            .unwrap_or_default();
        for (property, kind, value) in nested {
            if let Err(nested_errors) = self.assign_nested(target.as_mut(), &property, &kind, value)
            {
                errors.extend(nested_errors);
            }
        }

        if errors.is_empty() {
            Ok(target)
        } else {
            Err(errors)
        }
    }

    /// Coerces one nested property and assigns it; errors are qualified with `property`.
    fn assign_nested(
        &self,
        target: &mut dyn Mappable,
        property: &str,
        kind: &ParameterKind,
        value: Value,
    ) -> Result<(), Vec<String>> {
        let leaf = |reason: String| vec![format!("{property}: {reason}")];
        match kind {
            ParameterKind::Object(type_id)
                if !value.is_null() && self.lookup.is_known_type(type_id) =>
            {
                let child = self
                    .build_object(type_id, value)
                    .map_err(|errors| prefixed(property, errors))?;
                target.set_object(property, child).map_err(leaf)
            }
            ParameterKind::CollectionOfObject(element_type) => {
                let elements = keyed_elements(value, element_type).map_err(leaf)?;
                if !self.lookup.is_known_type(element_type) {
                    return target
                        .set_property(property, Value::Array(elements))
                        .map_err(leaf);
                }
                let mut children = Vec::with_capacity(elements.len());
                let mut errors = Vec::new();
                for (index, element) in elements.into_iter().enumerate() {
                    match self.build_object(element_type, element) {
                        Ok(child) => children.push(child),
                        Err(nested) => {
                            errors.extend(prefixed(&format!("{property}[{index}]"), nested));
                        }
                    }
                }
                if !errors.is_empty() {
                    return Err(errors);
                }
                target.set_objects(property, children).map_err(leaf)
            }
            _ => target.set_property(property, value).map_err(leaf),
        }
    }
}

/// Extracts the element sequence of a collection argument.
///
/// Wire encodings wrap collections in a record keyed by the element type's short name
/// (`{"OrderLine": [...]}`); a single element may appear without the array. The result is
/// always a sequence: a lone keyed element becomes a one-element sequence, also when the
/// element type is unregistered and the sequence is passed through as is.
fn keyed_elements(raw: Value, element_type: &str) -> Result<Vec<Value>, String> {
    match raw {
        Value::Null => Ok(Vec::new()),
        Value::Array(elements) => Ok(elements),
        Value::Object(mut record) => match record.remove(short_name(element_type)) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(elements)) => Ok(elements),
            Some(single) => Ok(vec![single]),
        },
        other => Err(format!(
            "expected a collection of {}, got {}",
            short_name(element_type),
            json_type(&other)
        )),
    }
}

fn mapping_error(parameter: &ParameterDescriptor, type_id: &str, errors: Vec<String>) -> MappingError {
    MappingError {
        parameter: parameter.name.clone(),
        type_id: type_id.to_owned(),
        errors,
    }
}

/// Qualifies nested errors with the property or index they occurred under.
///
/// Mapper errors already read `property: reason`; bare reasons get the path prepended.
fn prefixed(prefix: &str, errors: Vec<String>) -> Vec<String> {
    errors
        .into_iter()
        .map(|e| {
            if e.starts_with('[') {
                format!("{prefix}{e}")
            } else if e.contains(": ") {
                format!("{prefix}.{e}")
            } else {
                format!("{prefix}: {e}")
            }
        })
        .collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a record",
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::descriptor::MethodSignature;
    use crate::mapper::{DefaultPropertyMapper, SerdeObject};
    use crate::registry::{TypeDescriptor, TypeRegistry};
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Default mapping, counting every call.
    #[derive(Default)]
    struct CountingMapper {
        calls: AtomicUsize,
    }

    impl PropertyMapper for CountingMapper {
        fn map(
            &self,
            property_names: &BTreeSet<String>,
            source: &Map<String, Value>,
            target: &mut dyn Mappable,
        ) -> Result<(), Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            DefaultPropertyMapper.map(property_names, source, target)
        }
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Address {
        street: String,
        zip: u32,
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct OrderLine {
        sku: String,
        quantity: u32,
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Order {
        reference: String,
        lines: Vec<OrderLine>,
        shipping: Option<Address>,
    }

    fn registry() -> TypeRegistry {
        let registry = TypeRegistry::new();
        registry.register_serde_type::<Address>("Acme\\Shop\\Address").unwrap();
        registry.register_serde_type::<OrderLine>("Acme\\Shop\\OrderLine").unwrap();
        registry
            .register_serde_type_with::<Order>("Acme\\Shop\\Order", [
                ("lines", ParameterKind::collection_of("Acme\\Shop\\OrderLine")),
                ("shipping", ParameterKind::object("Acme\\Shop\\Address")),
            ])
            .unwrap();
        registry
    }

    fn coerce(
        registry: &TypeRegistry,
        signature: &MethodSignature,
        raw: Vec<Value>,
    ) -> Result<CoercedArguments, MappingError> {
        ArgumentCoercer::new(registry, registry, &DefaultPropertyMapper).coerce(raw, &signature.parameters)
    }

    #[test]
    fn scalars_pass_through() {
        let registry = registry();
        let sig = MethodSignature::new("ping").scalar("payload");
        let mut args = coerce(&registry, &sig, vec![json!({"a": [1, 2]})]).unwrap();
        assert_eq!(args.take_raw(0).unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn known_object_is_mapped_into_its_type() {
        let registry = registry();
        let sig = MethodSignature::new("ship").object("address", "\\Acme\\Shop\\Address");
        let mut args = coerce(&registry, &sig, vec![json!({"street": "Main", "zip": 10115})]).unwrap();
        assert_eq!(args.take_object::<Address>(0).unwrap(), Address {
            street: "Main".to_owned(),
            zip: 10115
        });
    }

    #[test]
    fn unknown_object_type_is_treated_as_scalar() {
        let registry = registry();
        let sig = MethodSignature::new("ship").object("address", "Acme\\Shop\\Unregistered");
        let raw = json!({"street": 1});
        let mut args = coerce(&registry, &sig, vec![raw.clone()]).unwrap();
        assert_eq!(args.take_raw(0).unwrap(), raw);
    }

    #[test]
    fn mapper_failure_names_the_parameter() {
        let registry = registry();
        let sig = MethodSignature::new("ship")
            .scalar("note")
            .object("address", "Acme\\Shop\\Address");
        let err = coerce(&registry, &sig, vec![json!("x"), json!({"zip": "ten"})]).unwrap_err();
        assert_eq!(err.parameter, "address");
        assert_eq!(err.type_id, "Acme\\Shop\\Address");
        assert_eq!(err.errors.len(), 1);
        assert!(err.errors[0].starts_with("zip: "));
    }

    #[test]
    fn non_record_object_argument_fails() {
        let registry = registry();
        let sig = MethodSignature::new("ship").object("address", "Acme\\Shop\\Address");
        let err = coerce(&registry, &sig, vec![json!(42)]).unwrap_err();
        assert_eq!(err.parameter, "address");
        assert!(err.errors[0].contains("a number"));
    }

    #[test]
    fn unknown_element_type_passes_keyed_sequence_through() {
        let registry = registry();
        let sig = MethodSignature::new("tag").collection("tags", "Acme\\Shop\\Tag");
        let elements = json!([{"name": "a"}, {"name": "b", "extra": 1}]);
        let mut args = coerce(&registry, &sig, vec![json!({ "Tag": elements.clone() })]).unwrap();
        assert_eq!(args.take_raw(0).unwrap(), elements);
    }

    #[test]
    fn known_element_type_coerces_every_element() {
        let registry = registry();
        let sig = MethodSignature::new("add").collection("lines", "Acme\\Shop\\OrderLine");
        let raw = json!({ "OrderLine": [
            {"sku": "A-1", "quantity": 2},
            {"sku": "B-2", "quantity": 1}
        ]});
        let mut args = coerce(&registry, &sig, vec![raw]).unwrap();
        let lines = args.take_objects::<OrderLine>(0).unwrap();
        assert_eq!(lines, [
            OrderLine {
                sku: "A-1".to_owned(),
                quantity: 2
            },
            OrderLine {
                sku: "B-2".to_owned(),
                quantity: 1
            },
        ]);
    }

    #[test]
    fn element_failure_reports_index() {
        let registry = registry();
        let sig = MethodSignature::new("add").collection("lines", "Acme\\Shop\\OrderLine");
        let raw = json!({ "OrderLine": [{"sku": "A"}, {"quantity": -1}] });
        let err = coerce(&registry, &sig, vec![raw]).unwrap_err();
        assert_eq!(err.parameter, "lines");
        assert!(err.errors[0].starts_with("[1].quantity: "), "{:?}", err.errors);
    }

    #[test]
    fn single_element_and_missing_key_collections() {
        let registry = registry();
        let sig = MethodSignature::new("add").collection("lines", "Acme\\Shop\\OrderLine");

        let mut single = coerce(&registry, &sig, vec![json!({"OrderLine": {"sku": "A", "quantity": 1}})]).unwrap();
        assert_eq!(single.take_objects::<OrderLine>(0).unwrap().len(), 1);

        let mut empty = coerce(&registry, &sig, vec![json!({})]).unwrap();
        assert!(empty.take_objects::<OrderLine>(0).unwrap().is_empty());

        let mut absent = coerce(&registry, &sig, vec![]).unwrap();
        assert!(absent.take_objects::<OrderLine>(0).unwrap().is_empty());
    }

    #[test]
    fn nested_graph_is_normalized_recursively() {
        let registry = registry();
        let sig = MethodSignature::new("place").object("order", "Acme\\Shop\\Order");
        let raw = json!({
            "reference": "PO-7",
            "lines": { "OrderLine": [{"sku": "A", "quantity": 3}] },
            "shipping": {"street": "Dock 4", "zip": 20095}
        });
        let mut args = coerce(&registry, &sig, vec![raw]).unwrap();
        let order = args.take_object::<Order>(0).unwrap();
        assert_eq!(order.reference, "PO-7");
        assert_eq!(order.lines, [OrderLine {
            sku: "A".to_owned(),
            quantity: 3
        }]);
        assert_eq!(order.shipping.map(|a| a.zip), Some(20095));
    }

    #[test]
    fn nested_failure_carries_property_path() {
        let registry = registry();
        let sig = MethodSignature::new("place").object("order", "Acme\\Shop\\Order");
        let raw = json!({ "lines": { "OrderLine": ["not a record"] } });
        let err = coerce(&registry, &sig, vec![raw]).unwrap_err();
        assert_eq!(err.parameter, "order");
        assert!(err.errors[0].starts_with("lines[0]: expected a record"), "{:?}", err.errors);
    }

    #[test]
    fn argument_count_always_matches_signature() {
        let registry = registry();
        let sig = MethodSignature::new("m").scalar("a").scalar("b");
        let args = coerce(&registry, &sig, vec![json!(1), json!(2), json!(3)]).unwrap();
        assert_eq!(args.len(), 2);
        let args = coerce(&registry, &sig, vec![json!(1)]).unwrap();
        assert_eq!(args.len(), 2);
        assert!(matches!(args.get(1), Some(Argument::Raw(Value::Null))));
    }

    #[test]
    fn unknown_element_type_wraps_a_lone_keyed_record() {
        let registry = registry();
        let sig = MethodSignature::new("tag").collection("tags", "Acme\\Shop\\Tag");
        let mut args = coerce(&registry, &sig, vec![json!({ "Tag": {"name": "a"} })]).unwrap();
        assert_eq!(args.take_raw(0).unwrap(), json!([{"name": "a"}]));
    }

    #[test]
    fn nested_records_are_filtered_like_top_level_ones() {
        let registry = registry();
        let address = json!({"street": "Main", "zip": 10115, "extra": true});

        let ship = MethodSignature::new("ship").object("address", "Acme\\Shop\\Address");
        let mut args = coerce(&registry, &ship, vec![address.clone()]).unwrap();
        assert_eq!(args.take_object::<Address>(0).unwrap().zip, 10115);

        let place = MethodSignature::new("place").object("order", "Acme\\Shop\\Order");
        let mut args = coerce(&registry, &place, vec![json!({ "shipping": address })]).unwrap();
        let order = args.take_object::<Order>(0).unwrap();
        assert_eq!(order.shipping.map(|a| a.street), Some("Main".to_owned()));
    }

    #[test]
    fn nested_objects_go_through_the_configured_mapper() {
        let registry = registry();
        let mapper = CountingMapper::default();
        let sig = MethodSignature::new("place").object("order", "Acme\\Shop\\Order");
        let raw = json!({
            "reference": "PO-8",
            "shipping": {"street": "Dock 4", "zip": 20095},
            "lines": { "OrderLine": [{"sku": "A", "quantity": 1}, {"sku": "B", "quantity": 2}] }
        });
        ArgumentCoercer::new(&registry, &registry, &mapper)
            .coerce(vec![raw], &sig.parameters)
            .unwrap();
        assert_eq!(mapper.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn nested_objects_use_their_registered_constructor() {
        let registry = registry();
        registry.register_type(
            TypeDescriptor::new("Acme\\Shop\\Address", ["street", "zip"]),
            || -> Box<dyn Mappable> {
                let mut address = SerdeObject::<Address>::new();
                address.set_property("zip", json!(99999)).unwrap();
                Box::new(address)
            },
        );
        let sig = MethodSignature::new("place").object("order", "Acme\\Shop\\Order");
        let raw = json!({ "shipping": {"street": "Quay 1"} });
        let mut args = coerce(&registry, &sig, vec![raw]).unwrap();
        let shipping = args.take_object::<Order>(0).unwrap().shipping.unwrap();
        assert_eq!(shipping.zip, 99999);
        assert_eq!(shipping.street, "Quay 1");
    }

    #[test]
    fn nested_object_failure_is_qualified_with_its_property() {
        let registry = registry();
        let sig = MethodSignature::new("place").object("order", "Acme\\Shop\\Order");
        let raw = json!({ "shipping": {"zip": "ten"}, "lines": {"OrderLine": {"quantity": -1}} });
        let err = coerce(&registry, &sig, vec![raw]).unwrap_err();
        assert_eq!(err.errors.len(), 2, "{:?}", err.errors);
        assert!(err.errors.iter().any(|e| e.starts_with("shipping.zip: ")));
        assert!(err.errors.iter().any(|e| e.starts_with("lines[0].quantity: ")));
    }
}
