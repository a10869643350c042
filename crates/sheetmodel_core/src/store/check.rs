//! Per-object cleaning and validation, per-model uniqueness.
//!
//! # Responsibility
//! - Coerce raw scalar values in place (`clean`).
//! - Check constraints and relationship integrity on both sides
//!   (`validate`).
//! - Detect repeated `unique` values and `unique_together` combinations.
//!
//! # Invariants
//! - Data problems come back as `Invalid*` values, never as `Err`.
//! - `clean` only writes values that cleaned successfully.

use crate::attribute::{Field, Side, Value};
use crate::invalid::{InvalidAttribute, InvalidModel, InvalidObject};
use crate::schema::ModelId;
use crate::store::{endpoint, Endpoint, ModelError, ModelResult, ObjectId, Slot, Store};
use crate::util::natural_sorted;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

impl Store {
    /// Coerces every scalar attribute of `obj` through its kind's `clean`.
    pub fn clean(&mut self, obj: ObjectId) -> ModelResult<Option<InvalidObject>> {
        let schema = Arc::clone(&self.schema);
        let model = schema.get(self.instance(obj)?.model);
        let mut errors = Vec::new();
        for (index, attr) in model.attributes.iter().enumerate() {
            if attr.is_related() {
                continue;
            }
            let Field::Value(raw) = self.field(obj, Slot::Forward(index))? else {
                continue;
            };
            match attr.clean(raw) {
                Ok(value) => {
                    *self.instance_mut(obj)?.slot_mut(Slot::Forward(index)) = Field::Value(value)
                }
                Err(error) => errors.push(error),
            }
        }
        Ok(self.invalid_object(obj, errors))
    }

    /// Checks scalar constraints and relationship integrity of `obj`.
    pub fn validate(&self, obj: ObjectId) -> ModelResult<Option<InvalidObject>> {
        let model = self.schema.get(self.instance(obj)?.model);
        let mut errors = Vec::new();
        for (index, attr) in model.attributes.iter().enumerate() {
            let field = self.field(obj, Slot::Forward(index))?;
            let error = match (field, endpoint(&self.schema, model, Slot::Forward(index))) {
                (Field::Value(value), None) => attr.validate_value(value),
                (field, Some(end)) => self.validate_endpoint(obj, &end, field)?,
                _ => None,
            };
            errors.extend(error);
        }
        for index in 0..model.related_attributes.len() {
            let slot = Slot::Reverse(index);
            if let Some(end) = endpoint(&self.schema, model, slot) {
                errors.extend(self.validate_endpoint(obj, &end, self.field(obj, slot)?)?);
            }
        }
        Ok(self.invalid_object(obj, errors))
    }

    fn validate_endpoint(
        &self,
        obj: ObjectId,
        end: &Endpoint<'_>,
        field: &Field,
    ) -> ModelResult<Option<InvalidAttribute>> {
        let expected = self.schema.get(end.peer_model()).name.clone();
        let mut messages = Vec::new();
        match field {
            Field::Object(None) => {
                if !end.nullable() {
                    messages.push("Value cannot be `None`".to_string());
                }
            }
            Field::Object(Some(peer)) => {
                if !self.peer_has_type(*peer, end.peer_model()) {
                    messages.push(format!(
                        "Value must be an instance of \"{expected}\" or `None`"
                    ));
                } else if let Some(message) = self.mirror_message(obj, *peer, end) {
                    messages.push(message);
                }
            }
            Field::Objects(peers) => {
                for peer in peers {
                    if !self.peer_has_type(*peer, end.peer_model()) {
                        messages.push(match end.side {
                            Side::Forward => {
                                format!("Value must be an instance of \"{expected}\"")
                            }
                            Side::Reverse => {
                                format!("Related value must be an instance of \"{expected}\"")
                            }
                        });
                    } else if let Some(message) = self.mirror_message(obj, *peer, end) {
                        messages.push(message);
                    }
                }
            }
            Field::Value(_) => {}
        }

        if messages.is_empty() {
            return Ok(None);
        }
        Ok(Some(match end.side {
            Side::Forward => end.attribute.invalid(messages),
            Side::Reverse => end.attribute.invalid_related(messages),
        }))
    }

    fn peer_has_type(&self, peer: ObjectId, expected: ModelId) -> bool {
        self.instance(peer)
            .map(|instance| self.schema.is_subclass(instance.model, expected))
            .unwrap_or(false)
    }

    /// Message when `peer` does not link back to `obj`.
    fn mirror_message(&self, obj: ObjectId, peer: ObjectId, end: &Endpoint<'_>) -> Option<String> {
        let mirror = self.mirror_slot(&self.schema, peer, end)?;
        match self.field(peer, mirror).ok()? {
            Field::Object(back) if *back != Some(obj) => {
                Some("Object must be related value".to_string())
            }
            Field::Objects(back) if !back.contains(&obj) => {
                Some("Object must be in related values".to_string())
            }
            _ => None,
        }
    }

    fn invalid_object(&self, obj: ObjectId, errors: Vec<InvalidAttribute>) -> Option<InvalidObject> {
        if errors.is_empty() {
            return None;
        }
        let model = self.model_of(obj).ok()?;
        Some(InvalidObject {
            object: obj,
            model: model.id,
            model_name: model.name.clone(),
            primary_key: self.serialize(obj),
            attributes: errors,
        })
    }

    /// Checks `unique` attributes and `unique_together` tuples of `model`
    /// over `objects`; a custom hook replaces both checks.
    ///
    /// # Errors
    /// - `UniqueTogetherCollection` when a tuple names a collection side.
    pub fn validate_unique(
        &self,
        model: ModelId,
        objects: &[ObjectId],
    ) -> ModelResult<Option<InvalidModel>> {
        let descriptor = self.schema.get(model);
        if let Some(hook) = &descriptor.validate_unique {
            return Ok(hook(self, objects));
        }

        let mut errors = Vec::new();
        for attr in descriptor.attributes.iter().filter(|attr| attr.unique) {
            let mut seen = HashSet::new();
            let mut repeated = BTreeSet::new();
            for obj in objects {
                let key = match self.get(*obj, &attr.name)? {
                    Field::Value(value) => attr.unique_key(value),
                    Field::Object(Some(peer)) => self.serialize(*peer),
                    _ => None,
                };
                if let Some(key) = key {
                    if !seen.insert(key.clone()) {
                        repeated.insert(key);
                    }
                }
            }
            if !repeated.is_empty() {
                let values = natural_sorted(repeated)
                    .into_iter()
                    .map(|value| format!("'{value}'"))
                    .collect::<Vec<_>>()
                    .join(", ");
                errors.push(attr.invalid(vec![format!(
                    "{} values must be unique, but these values are repeated: {}",
                    attr.name, values
                )]));
            }
        }

        for group in &descriptor.unique_together {
            let mut seen = HashSet::new();
            let mut repeated = Vec::new();
            for obj in objects {
                let mut combination = Vec::with_capacity(group.len());
                for name in group {
                    combination.push(match self.get(*obj, name)? {
                        Field::Objects(_) => {
                            return Err(ModelError::UniqueTogetherCollection(
                                descriptor.name.clone(),
                            ))
                        }
                        Field::Object(peer) => peer
                            .and_then(|peer| self.serialize(peer))
                            .unwrap_or_default(),
                        Field::Value(Value::None) => String::new(),
                        Field::Value(value) => {
                            let attr = descriptor.attribute(name);
                            attr.and_then(|attr| attr.unique_key(value))
                                .unwrap_or_default()
                        }
                    });
                }
                if !seen.insert(combination.clone()) && !repeated.contains(&combination) {
                    repeated.push(combination);
                }
            }
            if !repeated.is_empty() {
                let mut message = format!(
                    "Combinations of ({}) must be unique. The following combinations are repeated:",
                    group.join(", ")
                );
                for combination in repeated {
                    message.push_str(&format!("\n  {}", combination.join(", ")));
                }
                if let Some(first) = group.first().and_then(|name| descriptor.attribute(name)) {
                    errors.push(first.invalid(vec![message]));
                }
            }
        }

        if errors.is_empty() {
            return Ok(None);
        }
        Ok(Some(InvalidModel {
            model,
            model_name: descriptor.name.clone(),
            attributes: errors,
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::attribute::{Attribute, Field, Value};
    use crate::schema::{ModelDef, SchemaBuilder};
    use crate::store::Store;

    fn store() -> Store {
        let schema = SchemaBuilder::new()
            .model(
                ModelDef::new("Node")
                    .attribute(Attribute::slug("id"))
                    .attribute(Attribute::float("weight").with_max(3.0))
                    .attribute(Attribute::string("label"))
                    .attribute(Attribute::string("group"))
                    .unique_together([["label", "group"]]),
            )
            .model(
                ModelDef::new("Edge")
                    .attribute(Attribute::slug("id"))
                    .attribute(
                        Attribute::many_to_one("source", "Node")
                            .related_name("edges")
                            .with_none(false),
                    ),
            )
            .build()
            .unwrap();
        Store::new(schema)
    }

    #[test]
    fn clean_coerces_in_place_and_reports_failures() {
        let mut store = store();
        let node = store
            .create("Node", vec![("id", "n1".into()), ("weight", "2.5".into())])
            .unwrap();
        assert!(store.clean(node).unwrap().is_none());
        assert_eq!(store.value(node, "weight").unwrap(), &Value::Float(2.5));

        store.set(node, "weight", "heavy").unwrap();
        let invalid = store.clean(node).unwrap().unwrap();
        assert_eq!(invalid.attributes[0].attribute, "weight");
        assert_eq!(invalid.primary_key.as_deref(), Some("n1"));
    }

    #[test]
    fn validate_reports_bounds_and_required_relationships() {
        let mut store = store();
        let node = store
            .create("Node", vec![("id", "n1".into()), ("weight", Field::Value(Value::Float(4.0)))])
            .unwrap();
        let invalid = store.validate(node).unwrap().unwrap();
        assert_eq!(invalid.attributes[0].messages, vec!["Value must be at most 3"]);

        let edge = store.create("Edge", vec![("id", "e1".into())]).unwrap();
        let invalid = store.validate(edge).unwrap().unwrap();
        assert_eq!(invalid.attributes[0].attribute, "source");
        assert_eq!(invalid.attributes[0].messages, vec!["Value cannot be `None`"]);

        store.set(edge, "source", node).unwrap();
        assert!(store.validate(edge).unwrap().is_none());
    }

    #[test]
    fn repeated_unique_values_are_reported_once() {
        let mut store = store();
        let a = store.create("Node", vec![("id", "node_2".into())]).unwrap();
        let b = store.create("Node", vec![("id", "node_2".into())]).unwrap();
        let node = store.schema().model_id("Node").unwrap();
        let invalid = store.validate_unique(node, &[a, b]).unwrap().unwrap();
        assert_eq!(invalid.attributes.len(), 2);
        let id_error = invalid
            .attributes
            .iter()
            .find(|error| error.attribute == "id")
            .unwrap();
        assert_eq!(
            id_error.messages,
            vec!["id values must be unique, but these values are repeated: 'node_2'"]
        );
    }

    #[test]
    fn unique_together_lists_repeated_combinations() {
        let mut store = store();
        let a = store
            .create(
                "Node",
                vec![("id", "a".into()), ("label", "x".into()), ("group", "g".into())],
            )
            .unwrap();
        let b = store
            .create(
                "Node",
                vec![("id", "b".into()), ("label", "x".into()), ("group", "g".into())],
            )
            .unwrap();
        let node = store.schema().model_id("Node").unwrap();
        let invalid = store.validate_unique(node, &[a, b]).unwrap().unwrap();
        assert_eq!(invalid.attributes[0].attribute, "label");
        assert_eq!(
            invalid.attributes[0].messages,
            vec!["Combinations of (label, group) must be unique. The following combinations are repeated:\n  x, g"]
        );
    }
}
