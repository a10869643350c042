//! Whole-graph algorithms over a store.
//!
//! # Responsibility
//! - Reachability, structural equality and difference reports.
//! - Canonical ordering of collections and deep copy.
//!
//! # Invariants
//! - Every traversal terminates on cyclic graphs: equality and difference
//!   memoize on `(left, right)` pairs, reachability keeps a visited set.
//! - A pair still being compared counts as equal until proven otherwise.
//! - Comparisons across stores require the same `Schema` instance.

use crate::attribute::Field;
use crate::schema::builder::collection_element_classes;
use crate::store::{relationship_slots, slot_name, ModelError, ModelResult, ObjectId, Slot, Store};
use crate::util::{natural_cmp, natural_sort_by_key};
use log::debug;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

impl Store {
    /// Every object reachable from `obj` through any relationship side,
    /// excluding `obj`, in breadth-first order.
    pub fn get_related(&self, obj: ObjectId) -> ModelResult<Vec<ObjectId>> {
        self.instance(obj)?;
        let mut visited = HashSet::from([obj]);
        let mut queue = VecDeque::from([obj]);
        let mut related = Vec::new();
        while let Some(current) = queue.pop_front() {
            let instance = self.instance(current)?;
            for field in instance.values.iter().chain(instance.related.iter()) {
                for peer in field.linked() {
                    if visited.insert(peer) {
                        related.push(peer);
                        queue.push_back(peer);
                    }
                }
            }
        }
        Ok(related)
    }

    /// Whether `obj` and `other_obj` (of `other`) are structurally equal.
    ///
    /// # Errors
    /// - `SchemaMismatch` when the stores use different schemas.
    /// - `DeletedObject` for dead handles.
    pub fn is_equal(&self, obj: ObjectId, other: &Store, other_obj: ObjectId) -> ModelResult<bool> {
        self.comparable(obj, other, other_obj)?;
        let mut comparison = Comparison {
            left: self,
            right: other,
            same_store: std::ptr::eq(self, other),
            seen: HashMap::new(),
        };
        Ok(comparison.is_equal(obj, other_obj))
    }

    /// Indented report of the differences between two objects; empty when
    /// they are equal.
    pub fn difference(&self, obj: ObjectId, other: &Store, other_obj: ObjectId) -> ModelResult<String> {
        self.comparable(obj, other, other_obj)?;
        let mut differ = Differ {
            left: self,
            right: other,
            same_store: std::ptr::eq(self, other),
            seen: HashMap::new(),
        };
        Ok(differ.difference(obj, other_obj))
    }

    fn comparable(&self, obj: ObjectId, other: &Store, other_obj: ObjectId) -> ModelResult<()> {
        if !Arc::ptr_eq(&self.schema, &other.schema) {
            return Err(ModelError::SchemaMismatch);
        }
        self.instance(obj)?;
        other.instance(other_obj)?;
        Ok(())
    }

    /// Fails unless every class whose instances end up in collections
    /// around `model` is reproducibly orderable.
    pub fn validate_normalizable(&self, model: crate::schema::ModelId) -> ModelResult<()> {
        for class in collection_element_classes(&self.schema, model) {
            let descriptor = self.schema.get(class);
            if !descriptor.is_reproducibly_orderable() {
                return Err(ModelError::NotReproduciblyOrderable(descriptor.name.clone()));
            }
        }
        Ok(())
    }

    /// Sorts every multi-element collection reachable from `obj` by the
    /// natural order of its elements' keys.
    pub fn normalize(&mut self, obj: ObjectId) -> ModelResult<()> {
        let mut objects = vec![obj];
        objects.extend(self.get_related(obj)?);

        let mut checked = HashSet::new();
        for current in &objects {
            let model = self.instance(*current)?.model;
            if checked.insert(model) {
                self.validate_normalizable(model)?;
            }
        }

        let schema = Arc::clone(&self.schema);
        for current in objects {
            let model = schema.get(self.instance(current)?.model);
            for slot in relationship_slots(model) {
                let Field::Objects(peers) = self.field(current, slot)? else {
                    continue;
                };
                if peers.len() < 2 {
                    continue;
                }
                let mut keyed = peers
                    .iter()
                    .map(|peer| (self.serialize(*peer).unwrap_or_default(), *peer))
                    .collect::<Vec<_>>();
                keyed.sort_by(|(a, _), (b, _)| natural_cmp(a, b));
                let sorted = keyed.into_iter().map(|(_, peer)| peer).collect();
                *self.instance_mut(current)?.slot_mut(slot) = Field::Objects(sorted);
            }
        }
        debug!("event=normalize module=store status=ok root={obj}");
        Ok(())
    }

    /// Deep-copies `obj` and everything reachable from it inside this
    /// store; links between copied objects point at the copies.
    pub fn copy(&mut self, obj: ObjectId) -> ModelResult<ObjectId> {
        let mut originals = vec![obj];
        originals.extend(self.get_related(obj)?);

        let mut copies = HashMap::with_capacity(originals.len());
        for original in &originals {
            let model = self.instance(*original)?.model;
            copies.insert(*original, self.allocate(model));
        }

        let map = |field: &Field| match field {
            Field::Value(value) => Field::Value(value.clone()),
            Field::Object(peer) => Field::Object(peer.and_then(|peer| copies.get(&peer).copied())),
            Field::Objects(peers) => Field::Objects(
                peers
                    .iter()
                    .filter_map(|peer| copies.get(peer).copied())
                    .collect(),
            ),
        };
        let mut updates = Vec::with_capacity(originals.len());
        for original in &originals {
            let instance = self.instance(*original)?;
            let values = instance.values.iter().map(map).collect::<Vec<_>>();
            let related = instance.related.iter().map(map).collect::<Vec<_>>();
            updates.push((copies[original], values, related));
        }
        for (copy, values, related) in updates {
            let instance = self.instance_mut(copy)?;
            instance.values = values;
            instance.related = related;
        }
        Ok(copies[&obj])
    }
}

struct Comparison<'a> {
    left: &'a Store,
    right: &'a Store,
    same_store: bool,
    /// `None` while the pair is still being compared.
    seen: HashMap<(ObjectId, ObjectId), Option<bool>>,
}

impl Comparison<'_> {
    fn is_equal(&mut self, l: ObjectId, r: ObjectId) -> bool {
        if let Some(state) = self.seen.get(&(l, r)) {
            return state.unwrap_or(true);
        }
        if self.same_store && l == r {
            self.seen.insert((l, r), Some(true));
            return true;
        }
        if !self.attributes_equal(l, r) {
            self.seen.insert((l, r), Some(false));
            return false;
        }
        self.seen.insert((l, r), None);

        let slots = self.slots(l);
        for slot in &slots {
            let pair = self.peer_pair(l, r, *slot);
            if let Some((a, b)) = pair {
                if !self.is_equal(a, b) {
                    self.seen.insert((l, r), Some(false));
                    return false;
                }
            }
        }
        for slot in &slots {
            if !self.sets_equal(l, r, *slot) {
                self.seen.insert((l, r), Some(false));
                return false;
            }
        }

        self.seen.insert((l, r), Some(true));
        true
    }

    fn slots(&self, obj: ObjectId) -> Vec<Slot> {
        self.left
            .model_of(obj)
            .map(relationship_slots)
            .unwrap_or_default()
    }

    fn attributes_equal(&self, l: ObjectId, r: ObjectId) -> bool {
        let (Ok(left), Ok(right)) = (self.left.instance(l), self.right.instance(r)) else {
            return false;
        };
        if left.model != right.model {
            return false;
        }
        let model = self.left.schema.get(left.model);
        let scalars_equal = left
            .values
            .iter()
            .zip(&right.values)
            .zip(&model.attributes)
            .all(|((a, b), attr)| fields_match(a, b, |x, y| attr.value_equal(x, y)));
        scalars_equal
            && left
                .related
                .iter()
                .zip(&right.related)
                .all(|(a, b)| fields_match(a, b, |x, y| x == y))
    }

    /// Singular peers (or single-element collections) to recurse into.
    fn peer_pair(&self, l: ObjectId, r: ObjectId, slot: Slot) -> Option<(ObjectId, ObjectId)> {
        match (self.left.field(l, slot).ok()?, self.right.field(r, slot).ok()?) {
            (Field::Object(Some(a)), Field::Object(Some(b))) => Some((*a, *b)),
            (Field::Objects(a), Field::Objects(b)) if a.len() == 1 && b.len() == 1 => {
                Some((a[0], b[0]))
            }
            _ => None,
        }
    }

    fn sets_equal(&mut self, l: ObjectId, r: ObjectId, slot: Slot) -> bool {
        let (Ok(Field::Objects(left)), Ok(Field::Objects(right))) =
            (self.left.field(l, slot), self.right.field(r, slot))
        else {
            return true;
        };
        if left.len() < 2 {
            return true;
        }
        let left = left.clone();
        let mut remaining = right.clone();
        for v in left {
            match remaining.iter().position(|ov| self.is_equal(v, *ov)) {
                Some(index) => {
                    remaining.remove(index);
                }
                None => return false,
            }
        }
        true
    }
}

/// Shape-level equality: scalars by `eq`, singular sides by presence,
/// collections by length.
fn fields_match(a: &Field, b: &Field, eq: impl Fn(&crate::attribute::Value, &crate::attribute::Value) -> bool) -> bool {
    match (a, b) {
        (Field::Value(x), Field::Value(y)) => eq(x, y),
        (Field::Object(x), Field::Object(y)) => x.is_some() == y.is_some(),
        (Field::Objects(x), Field::Objects(y)) => x.len() == y.len(),
        _ => false,
    }
}

struct Differ<'a> {
    left: &'a Store,
    right: &'a Store,
    same_store: bool,
    /// `None` while the pair is still being compared.
    seen: HashMap<(ObjectId, ObjectId), Option<String>>,
}

impl Differ<'_> {
    fn difference(&mut self, l: ObjectId, r: ObjectId) -> String {
        if let Some(state) = self.seen.get(&(l, r)) {
            return state.clone().unwrap_or_default();
        }
        if self.same_store && l == r {
            self.seen.insert((l, r), Some(String::new()));
            return String::new();
        }
        let left_store = self.left;
        let right_store = self.right;
        let (Ok(left_model), Ok(right_model)) = (left_store.model_of(l), right_store.model_of(r)) else {
            return String::new();
        };
        if left_model.id != right_model.id {
            let message = format!(
                "Objects {} and {} have different types \"{}\" and \"{}\"",
                left_store.display(l),
                right_store.display(r),
                left_model.name,
                right_model.name
            );
            self.seen.insert((l, r), Some(message.clone()));
            return message;
        }

        let model = left_model;
        let id = quoted_id(left_store.serialize(l), &model.name);
        let other_id = quoted_id(right_store.serialize(r), &model.name);

        let attribute_diffs = self.attribute_differences(l, r);
        if !attribute_diffs.is_empty() {
            return self.finish(l, r, &id, &other_id, attribute_diffs);
        }

        self.seen.insert((l, r), None);
        let slots = relationship_slots(model);
        let forward = slots
            .iter()
            .copied()
            .filter(|slot| matches!(slot, Slot::Forward(_)))
            .collect::<Vec<_>>();
        let reverse = slots
            .iter()
            .copied()
            .filter(|slot| matches!(slot, Slot::Reverse(_)))
            .collect::<Vec<_>>();

        for (group, sets) in [(&forward, false), (&reverse, false), (&forward, true), (&reverse, true)] {
            let mut diffs = Vec::new();
            for slot in group {
                let diff = if sets {
                    self.set_difference(l, r, *slot)
                } else {
                    self.object_difference(l, r, *slot)
                };
                if !diff.is_empty() {
                    diffs.push((slot_name(model, *slot).to_string(), diff));
                }
            }
            if !diffs.is_empty() {
                return self.finish(l, r, &id, &other_id, diffs);
            }
        }

        self.seen.insert((l, r), Some(String::new()));
        String::new()
    }

    fn finish(&mut self, l: ObjectId, r: ObjectId, id: &str, other_id: &str, mut diffs: Vec<(String, String)>) -> String {
        natural_sort_by_key(&mut diffs, |(name, _)| name.clone());
        let mut message = format!("Objects ({id}, {other_id}) have different attribute values:");
        for (name, diff) in diffs {
            message.push_str(&format!(
                "\n  `{name}` are not equal:\n    {}",
                diff.replace('\n', "\n    ")
            ));
        }
        self.seen.insert((l, r), Some(message.clone()));
        message
    }

    fn attribute_differences(&self, l: ObjectId, r: ObjectId) -> Vec<(String, String)> {
        let (Ok(left), Ok(right)) = (self.left.instance(l), self.right.instance(r)) else {
            return Vec::new();
        };
        let model = self.left.schema.get(left.model);
        let mut diffs = Vec::new();
        let slots = (0..model.attributes.len())
            .map(Slot::Forward)
            .chain((0..model.related_attributes.len()).map(Slot::Reverse));
        for slot in slots {
            let diff = match (left.slot(slot), right.slot(slot), slot) {
                (Field::Value(a), Field::Value(b), Slot::Forward(index)) => {
                    (!model.attributes[index].value_equal(a, b)).then(|| format!("{a} != {b}"))
                }
                (Field::Objects(a), Field::Objects(b), _) => (a.len() != b.len())
                    .then(|| format!("Length: {} != Length: {}", a.len(), b.len())),
                (Field::Object(a), Field::Object(b), _) => (a.is_some() != b.is_some()).then(|| {
                    format!(
                        "{} != {}",
                        a.map(|peer| self.left.display(peer)).unwrap_or_else(|| "None".into()),
                        b.map(|peer| self.right.display(peer)).unwrap_or_else(|| "None".into())
                    )
                }),
                _ => None,
            };
            if let Some(diff) = diff {
                diffs.push((slot_name(model, slot).to_string(), diff));
            }
        }
        diffs
    }

    fn object_difference(&mut self, l: ObjectId, r: ObjectId, slot: Slot) -> String {
        let pair = match (self.left.field(l, slot), self.right.field(r, slot)) {
            (Ok(Field::Object(Some(a))), Ok(Field::Object(Some(b)))) => Some((*a, *b)),
            (Ok(Field::Objects(a)), Ok(Field::Objects(b))) if a.len() == 1 && b.len() == 1 => {
                Some((a[0], b[0]))
            }
            _ => None,
        };
        pair.map(|(a, b)| self.difference(a, b)).unwrap_or_default()
    }

    fn set_difference(&mut self, l: ObjectId, r: ObjectId, slot: Slot) -> String {
        let (Ok(Field::Objects(left)), Ok(Field::Objects(right))) =
            (self.left.field(l, slot), self.right.field(r, slot))
        else {
            return String::new();
        };
        if left.len() < 2 {
            return String::new();
        }
        let left = left.clone();
        let mut remaining = right.clone();
        let mut diffs = Vec::new();
        for v in left {
            let serial_v = self.left.serialize(v);
            let mut partial = None;
            let mut matched = false;
            let mut last_diff = String::new();
            for index in 0..remaining.len() {
                let ov = remaining[index];
                let serial_ov = self.right.serialize(ov);
                if serial_ov == serial_v {
                    partial = serial_ov;
                    last_diff = self.difference(v, ov);
                    if last_diff.is_empty() {
                        matched = true;
                        remaining.remove(index);
                        break;
                    }
                }
            }
            if !matched {
                let key = serial_v.unwrap_or_else(|| "None".to_string());
                diffs.push(match partial {
                    Some(other_key) => format!(
                        "element: \"{key}\" != element: \"{other_key}\"\n  {}",
                        last_diff.replace('\n', "\n  ")
                    ),
                    None => format!("No matching element {key}"),
                });
            }
        }
        diffs.join("\n")
    }
}

fn quoted_id(key: Option<String>, model: &str) -> String {
    match key {
        Some(key) if !key.is_empty() => format!("\"{key}\""),
        _ => format!("instance: {model}"),
    }
}

#[cfg(test)]
mod tests {
    use crate::attribute::{Attribute, Field, Value};
    use crate::schema::{ModelDef, SchemaBuilder};
    use crate::store::{ModelError, Store};

    fn store() -> Store {
        let schema = SchemaBuilder::new()
            .model(
                ModelDef::new("Root")
                    .attribute(Attribute::slug("id"))
                    .attribute(Attribute::string("label")),
            )
            .model(
                ModelDef::new("Leaf")
                    .attribute(Attribute::slug("id"))
                    .attribute(Attribute::float("size"))
                    .attribute(Attribute::many_to_one("root", "Root").related_name("leaves")),
            )
            .build()
            .unwrap();
        Store::new(schema)
    }

    fn tree(store: &mut Store, leaves: &[(&str, f64)]) -> crate::store::ObjectId {
        let root = store
            .create("Root", vec![("id", "root".into()), ("label", "r".into())])
            .unwrap();
        for (id, size) in leaves {
            store
                .create(
                    "Leaf",
                    vec![
                        ("id", (*id).into()),
                        ("size", Field::Value(Value::Float(*size))),
                        ("root", root.into()),
                    ],
                )
                .unwrap();
        }
        root
    }

    #[test]
    fn get_related_walks_both_directions() {
        let mut store = store();
        let root = tree(&mut store, &[("leaf_0", 1.0), ("leaf_1", 2.0)]);
        let leaf = store.objects(root, "leaves").unwrap()[0];
        let mut related = store.get_related(leaf).unwrap();
        related.sort();
        assert_eq!(related.len(), 2);
        assert!(related.contains(&root));
    }

    #[test]
    fn equality_is_reflexive_symmetric_and_detects_changes() {
        let mut left = store();
        let mut right = Store::new(left.schema().clone());
        let a = tree(&mut left, &[("leaf_0", 1.0), ("leaf_1", 2.0)]);
        let b = tree(&mut right, &[("leaf_1", 2.0), ("leaf_0", 1.0)]);
        assert!(left.is_equal(a, &left, a).unwrap());
        assert!(left.is_equal(a, &right, b).unwrap());
        assert!(right.is_equal(b, &left, a).unwrap());

        let leaf = right.objects(b, "leaves").unwrap()[0];
        right.set(leaf, "size", Field::Value(Value::Float(7.0))).unwrap();
        assert!(!left.is_equal(a, &right, b).unwrap());
    }

    #[test]
    fn stores_with_different_schemas_are_not_comparable() {
        let mut left = store();
        let mut right = store();
        let a = tree(&mut left, &[]);
        let b = tree(&mut right, &[]);
        assert_eq!(left.is_equal(a, &right, b).unwrap_err(), ModelError::SchemaMismatch);
    }

    #[test]
    fn difference_names_the_changed_attribute() {
        let mut left = store();
        let mut right = Store::new(left.schema().clone());
        let a = tree(&mut left, &[]);
        let b = tree(&mut right, &[]);
        assert_eq!(left.difference(a, &right, b).unwrap(), "");

        right.set(b, "label", "s").unwrap();
        assert_eq!(
            left.difference(a, &right, b).unwrap(),
            "Objects (\"root\", \"root\") have different attribute values:\n  `label` are not equal:\n    r != s"
        );
    }

    #[test]
    fn difference_reports_mismatched_collection_elements() {
        let mut left = store();
        let mut right = Store::new(left.schema().clone());
        let a = tree(&mut left, &[("leaf_0", 1.0), ("leaf_1", 2.0)]);
        let b = tree(&mut right, &[("leaf_0", 1.0), ("leaf_1", 3.0)]);
        let report = left.difference(a, &right, b).unwrap();
        assert!(report.starts_with("Objects (\"root\", \"root\") have different attribute values:\n  `leaves` are not equal:"));
        assert!(report.contains("element: \"leaf_1\" != element: \"leaf_1\""));
        assert!(report.contains("2 != 3"));
    }

    #[test]
    fn normalize_sorts_collections_naturally() {
        let mut store = store();
        let root = store.create("Root", vec![("id", "root".into())]).unwrap();
        for id in ["leaf_10", "leaf_2", "leaf_1"] {
            store
                .create("Leaf", vec![("id", id.into()), ("root", root.into())])
                .unwrap();
        }
        store.normalize(root).unwrap();
        let keys = store
            .objects(root, "leaves")
            .unwrap()
            .iter()
            .map(|leaf| store.serialize(*leaf).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["leaf_1", "leaf_2", "leaf_10"]);
    }

    #[test]
    fn normalize_rejects_collections_of_unorderable_classes() {
        let schema = SchemaBuilder::new()
            .model(ModelDef::new("Topic").attribute(Attribute::slug("id")))
            .model(
                ModelDef::new("Note")
                    .attribute(Attribute::string("text"))
                    .attribute(Attribute::many_to_many("topics", "Topic").related_name("notes")),
            )
            .build()
            .unwrap();
        let mut store = Store::new(schema);
        let topic = store.create("Topic", vec![("id", "t".into())]).unwrap();
        let note = store.create("Note", vec![("topics", vec![topic].into())]).unwrap();
        assert_eq!(
            store.normalize(note).unwrap_err(),
            ModelError::NotReproduciblyOrderable("Note".into())
        );
    }

    #[test]
    fn copy_rewires_links_to_copies() {
        let mut store = store();
        let root = tree(&mut store, &[("leaf_0", 1.0), ("leaf_1", 2.0)]);
        let copy = store.copy(root).unwrap();
        assert_ne!(copy, root);
        let copied_leaves = store.objects(copy, "leaves").unwrap().to_vec();
        assert_eq!(copied_leaves.len(), 2);
        for leaf in &copied_leaves {
            assert_eq!(store.object(*leaf, "root").unwrap(), Some(copy));
        }
        assert!(store.is_equal(root, &store, copy).unwrap());
        assert_eq!(store.len(), 6);
    }
}
