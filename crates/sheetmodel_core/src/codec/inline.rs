//! Single-cell encodings of related objects.
//!
//! Inline classes have no worksheet; the owning relationship carries an
//! `InlineCodec` that renders its peers into the owner's cell and rebuilds
//! them on read.

use crate::attribute::{Field, Value};
use crate::schema::ModelId;
use crate::store::{ObjectId, Store};
use crate::util::{natural_sorted, quote};
use crate::workbook::Cell;
use std::fmt::Debug;
use std::sync::Arc;

/// Custom cell codec attached to a relationship attribute.
pub trait InlineCodec: Debug + Send + Sync {
    /// Renders the related `objects` into one cell.
    fn serialize(&self, store: &Store, objects: &[ObjectId]) -> String;

    /// Builds (or finds) objects of `model` from a cell.
    ///
    /// Returns the objects in cell order, or the messages explaining why
    /// the cell could not be decoded.
    fn deserialize(
        &self,
        store: &mut Store,
        model: ModelId,
        text: &str,
    ) -> Result<Vec<ObjectId>, Vec<String>>;
}

/// Stores each peer's `attribute` value, natural-sorted and joined by
/// `", "`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyListCodec {
    attribute: String,
    reuse: bool,
}

impl KeyListCodec {
    /// Creates a fresh object per listed key on read.
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            reuse: false,
        }
    }

    /// Links an existing object of the same class and key instead of
    /// creating one; suits many-to-many relationships.
    pub fn reusing(mut self) -> Self {
        self.reuse = true;
        self
    }

    fn key(&self, store: &Store, obj: ObjectId) -> Option<String> {
        let attr = store.model_of(obj).ok()?.attribute(&self.attribute)?;
        match store.value(obj, &self.attribute).ok()? {
            Value::None => None,
            value => Some(attr.serialize_value(value).to_string()),
        }
    }
}

impl InlineCodec for KeyListCodec {
    fn serialize(&self, store: &Store, objects: &[ObjectId]) -> String {
        natural_sorted(objects.iter().filter_map(|obj| self.key(store, *obj))).join(", ")
    }

    fn deserialize(
        &self,
        store: &mut Store,
        model: ModelId,
        text: &str,
    ) -> Result<Vec<ObjectId>, Vec<String>> {
        let schema = Arc::clone(store.schema());
        let Some(descriptor) = schema.try_get(model) else {
            return Err(vec![format!("model #{} is not registered", model.index())]);
        };
        let Some(attr) = descriptor.attribute(&self.attribute) else {
            return Err(vec![format!(
                "{} has no attribute {}",
                descriptor.name, self.attribute
            )]);
        };

        let mut objects = Vec::new();
        let mut errors = Vec::new();
        for key in text.split(',').map(str::trim).filter(|key| !key.is_empty()) {
            let value = match attr.deserialize_value(&Cell::Text(key.to_string())) {
                Ok(value) => value,
                Err(invalid) => {
                    errors.extend(
                        invalid
                            .messages
                            .into_iter()
                            .map(|message| format!("{}: {message}", quote(key))),
                    );
                    continue;
                }
            };
            if self.reuse {
                let shared: &Store = store;
                let existing = shared.objects_of(model).into_iter().find(|obj| {
                    shared
                        .value(*obj, &attr.name)
                        .is_ok_and(|current| attr.value_equal(current, &value))
                });
                if let Some(obj) = existing {
                    objects.push(obj);
                    continue;
                }
            }
            match store.create_in(model, vec![(attr.name.as_str(), Field::Value(value))]) {
                Ok(obj) => objects.push(obj),
                Err(err) => errors.push(err.to_string()),
            }
        }

        if errors.is_empty() {
            Ok(objects)
        } else {
            Err(errors)
        }
    }
}
