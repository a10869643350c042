//! Batch validation.
//!
//! # Responsibility
//! - Clean, validate and uniqueness-check a batch of objects in one pass.
//! - Aggregate every failure into a single `InvalidObjectSet`.
//!
//! # Invariants
//! - Validation only starts once every object cleaned successfully.
//! - Uniqueness runs once per class, over every object that is an
//!   instance of that class or of a subclass.

use crate::invalid::InvalidObjectSet;
use crate::schema::ModelId;
use crate::store::{ModelResult, ObjectId, Store};
use log::info;
use std::collections::{BTreeMap, HashSet};

/// Cleans and validates batches of objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    get_related: bool,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also checks every object reachable from the given ones.
    pub fn with_related(mut self) -> Self {
        self.get_related = true;
        self
    }

    /// Runs clean, then validate and uniqueness checks.
    ///
    /// # Contract
    /// - Returns `Ok(None)` when the batch is valid.
    /// - Returns the clean failures alone when any object fails to clean.
    pub fn run(&self, store: &mut Store, objects: &[ObjectId]) -> ModelResult<Option<InvalidObjectSet>> {
        let objects = self.expand(store, objects)?;

        let mut invalid_objects = Vec::new();
        for obj in &objects {
            invalid_objects.extend(store.clean(*obj)?);
        }
        if !invalid_objects.is_empty() {
            info!(
                "event=validate module=validator status=error phase=clean invalid_objects={}",
                invalid_objects.len()
            );
            return Ok(Some(InvalidObjectSet::new(invalid_objects, Vec::new())?));
        }

        let report = self.validate(store, &objects)?;
        info!(
            "event=validate module=validator status={} objects={}",
            if report.is_some() { "error" } else { "ok" },
            objects.len()
        );
        Ok(report)
    }

    /// Validates objects and per-class uniqueness without cleaning.
    pub fn validate(&self, store: &Store, objects: &[ObjectId]) -> ModelResult<Option<InvalidObjectSet>> {
        let mut invalid_objects = Vec::new();
        let mut by_class: BTreeMap<ModelId, Vec<ObjectId>> = BTreeMap::new();
        for obj in objects {
            invalid_objects.extend(store.validate(*obj)?);
            for class in &store.model_of(*obj)?.inheritance {
                by_class.entry(*class).or_default().push(*obj);
            }
        }

        let mut invalid_models = Vec::new();
        for (class, members) in by_class {
            invalid_models.extend(store.validate_unique(class, &members)?);
        }

        if invalid_objects.is_empty() && invalid_models.is_empty() {
            return Ok(None);
        }
        Ok(Some(InvalidObjectSet::new(invalid_objects, invalid_models)?))
    }

    fn expand(&self, store: &Store, objects: &[ObjectId]) -> ModelResult<Vec<ObjectId>> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(objects.len());
        for obj in objects {
            if seen.insert(*obj) {
                out.push(*obj);
            }
            if self.get_related {
                for related in store.get_related(*obj)? {
                    if seen.insert(related) {
                        out.push(related);
                    }
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::Validator;
    use crate::attribute::Attribute;
    use crate::schema::{ModelDef, SchemaBuilder};
    use crate::store::Store;

    fn store() -> Store {
        let schema = SchemaBuilder::new()
            .model(
                ModelDef::new("Node")
                    .attribute(Attribute::slug("id"))
                    .attribute(Attribute::integer("rank").with_min(0.0)),
            )
            .model(ModelDef::new("SpecialNode").extends("Node"))
            .build()
            .unwrap();
        Store::new(schema)
    }

    #[test]
    fn valid_batch_returns_none() {
        let mut store = store();
        let a = store
            .create("Node", vec![("id", "a".into()), ("rank", "1".into())])
            .unwrap();
        assert!(Validator::new().run(&mut store, &[a]).unwrap().is_none());
    }

    #[test]
    fn clean_failures_stop_before_validation() {
        let mut store = store();
        let a = store
            .create("Node", vec![("id", "a".into()), ("rank", "high".into())])
            .unwrap();
        let b = store.create("Node", vec![("id", "a".into()), ("rank", "1".into())]).unwrap();
        let report = Validator::new().run(&mut store, &[a, b]).unwrap().unwrap();
        assert_eq!(report.invalid_objects.len(), 1);
        assert!(report.invalid_models.is_empty());
    }

    #[test]
    fn uniqueness_spans_subclasses() {
        let mut store = store();
        let a = store
            .create("Node", vec![("id", "node_2".into()), ("rank", "1".into())])
            .unwrap();
        let b = store
            .create("SpecialNode", vec![("id", "node_2".into()), ("rank", "2".into())])
            .unwrap();
        let report = Validator::new().run(&mut store, &[a, b]).unwrap().unwrap();
        assert!(report.invalid_objects.is_empty());
        let node_error = report.model_error("Node").unwrap();
        assert!(node_error.attributes[0].messages[0].contains("'node_2'"));
        assert!(report.model_error("SpecialNode").is_none());
    }
}
