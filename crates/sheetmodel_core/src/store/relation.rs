//! Mirror-aware relationship mutation.
//!
//! # Responsibility
//! - Apply every relationship change to both ends of the link in one step.
//! - Expose collection sides through `RelatedManager`.
//!
//! # Invariants
//! - `local_*` helpers touch one slot only and are never public.
//! - Every public mutator type-checks peers before changing any slot.
//! - A one-to-one slot already held by another object is never stolen.

use crate::attribute::{Field, Side};
use crate::schema::{ModelId, Schema};
use crate::store::{endpoint, resolve_slot, slot_name, Endpoint, ModelError, ModelResult, ObjectId, Slot, Store};
use std::sync::Arc;

impl Store {
    /// Slot on `peer` that mirrors `end`, if the relationship has a mirror.
    pub(crate) fn mirror_slot(&self, schema: &Schema, peer: ObjectId, end: &Endpoint<'_>) -> Option<Slot> {
        let peer_model = schema.get(self.instance(peer).ok()?.model);
        match end.side {
            Side::Forward => end
                .relation
                .related_name
                .as_deref()
                .and_then(|name| peer_model.related_position(name))
                .map(Slot::Reverse),
            Side::Reverse => peer_model
                .attribute_position(&end.attribute.name)
                .map(Slot::Forward),
        }
    }

    fn check_peer(&self, schema: &Schema, end: &Endpoint<'_>, peer: ObjectId) -> ModelResult<()> {
        let actual = self.instance(peer)?.model;
        let expected = end.peer_model();
        if schema.is_subclass(actual, expected) {
            Ok(())
        } else {
            Err(ModelError::WrongRelatedType {
                attribute: end.name.to_string(),
                expected: schema.get(expected).name.clone(),
                actual: schema.get(actual).name.clone(),
            })
        }
    }

    fn endpoint_of(&self, schema: &Arc<Schema>, obj: ObjectId, slot: Slot) -> ModelResult<(ModelId, String)> {
        let model = schema.get(self.instance(obj)?.model);
        Ok((model.id, slot_name(model, slot).to_string()))
    }

    pub(crate) fn local_link(&mut self, obj: ObjectId, slot: Slot, peer: ObjectId) {
        if let Ok(instance) = self.instance_mut(obj) {
            match instance.slot_mut(slot) {
                Field::Object(current) => *current = Some(peer),
                Field::Objects(peers) => {
                    if !peers.contains(&peer) {
                        peers.push(peer);
                    }
                }
                Field::Value(_) => {}
            }
        }
    }

    pub(crate) fn local_unlink(&mut self, obj: ObjectId, slot: Slot, peer: ObjectId) {
        if let Ok(instance) = self.instance_mut(obj) {
            match instance.slot_mut(slot) {
                Field::Object(current) => {
                    if *current == Some(peer) {
                        *current = None;
                    }
                }
                Field::Objects(peers) => peers.retain(|linked| *linked != peer),
                Field::Value(_) => {}
            }
        }
    }

    /// Points single-valued side `slot` of `obj` at `peer`.
    pub(crate) fn set_one(&mut self, obj: ObjectId, slot: Slot, peer: Option<ObjectId>) -> ModelResult<()> {
        let schema = Arc::clone(&self.schema);
        let model = schema.get(self.instance(obj)?.model);
        let Some(end) = endpoint(&schema, model, slot) else {
            return Err(ModelError::WrongFieldShape {
                model: model.name.clone(),
                attribute: slot_name(model, slot).to_string(),
                expected: "a scalar value",
            });
        };
        let old = self.field(obj, slot)?.as_object().flatten();
        if old == peer {
            return Ok(());
        }

        if let Some(new) = peer {
            self.check_peer(&schema, &end, new)?;
            if !end.mirror_is_many() {
                if let Some(mirror) = self.mirror_slot(&schema, new, &end) {
                    let holder = self.field(new, mirror)?.as_object().flatten();
                    if holder.is_some() && holder != Some(obj) {
                        let (peer_model, peer_attribute) = self.endpoint_of(&schema, new, mirror)?;
                        return Err(ModelError::OccupiedOneToOne {
                            model: schema.get(peer_model).name.clone(),
                            attribute: peer_attribute,
                        });
                    }
                }
            }
        }

        if let Some(old) = old {
            if let Some(mirror) = self.mirror_slot(&schema, old, &end) {
                self.local_unlink(old, mirror, obj);
            }
        }
        *self.instance_mut(obj)?.slot_mut(slot) = Field::Object(peer);
        if let Some(new) = peer {
            if let Some(mirror) = self.mirror_slot(&schema, new, &end) {
                self.local_link(new, mirror, obj);
            }
        }
        Ok(())
    }

    /// Adds `peer` to collection side `slot` of `obj`.
    pub(crate) fn add_peer(&mut self, obj: ObjectId, slot: Slot, peer: ObjectId) -> ModelResult<()> {
        let schema = Arc::clone(&self.schema);
        let model = schema.get(self.instance(obj)?.model);
        let Some(end) = endpoint(&schema, model, slot) else {
            return Ok(());
        };
        self.check_peer(&schema, &end, peer)?;
        if self.field(obj, slot)?.linked().contains(&peer) {
            return Ok(());
        }

        match self.mirror_slot(&schema, peer, &end) {
            Some(mirror) if !end.mirror_is_many() => self.set_one(peer, mirror, Some(obj)),
            Some(mirror) => {
                self.local_link(obj, slot, peer);
                self.local_link(peer, mirror, obj);
                Ok(())
            }
            None => {
                self.local_link(obj, slot, peer);
                Ok(())
            }
        }
    }

    /// Removes `peer` from collection side `slot` of `obj`.
    pub(crate) fn remove_peer(&mut self, obj: ObjectId, slot: Slot, peer: ObjectId) -> ModelResult<()> {
        let schema = Arc::clone(&self.schema);
        let model = schema.get(self.instance(obj)?.model);
        if !self.field(obj, slot)?.linked().contains(&peer) {
            return Err(ModelError::NotRelated {
                model: model.name.clone(),
                attribute: slot_name(model, slot).to_string(),
            });
        }
        self.local_unlink(obj, slot, peer);
        if let Some(end) = endpoint(&schema, model, slot) {
            if let Some(mirror) = self.mirror_slot(&schema, peer, &end) {
                self.local_unlink(peer, mirror, obj);
            }
        }
        Ok(())
    }

    /// Replaces the content of collection side `slot` of `obj`.
    pub(crate) fn set_many(&mut self, obj: ObjectId, slot: Slot, peers: Vec<ObjectId>) -> ModelResult<()> {
        let schema = Arc::clone(&self.schema);
        let model = schema.get(self.instance(obj)?.model);
        if let Some(end) = endpoint(&schema, model, slot) {
            for peer in &peers {
                self.check_peer(&schema, &end, *peer)?;
            }
        }
        for current in self.field(obj, slot)?.linked() {
            if !peers.contains(&current) {
                self.remove_peer(obj, slot, current)?;
            }
        }
        for peer in peers {
            self.add_peer(obj, slot, peer)?;
        }
        Ok(())
    }
}

/// Live view over one collection side of one object.
///
/// Reads always reflect the current linked set; every mutation keeps the
/// mirrored side in sync.
pub struct RelatedManager<'a> {
    store: &'a mut Store,
    object: ObjectId,
    slot: Slot,
}

impl<'a> RelatedManager<'a> {
    pub(crate) fn new(store: &'a mut Store, object: ObjectId, slot: Slot) -> Self {
        Self {
            store,
            object,
            slot,
        }
    }

    /// Linked objects in collection order.
    pub fn all(&self) -> Vec<ObjectId> {
        self.store
            .field(self.object, self.slot)
            .map(Field::linked)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.all().is_empty()
    }

    pub fn contains(&self, peer: ObjectId) -> bool {
        self.all().contains(&peer)
    }

    pub fn add(&mut self, peer: ObjectId) -> ModelResult<()> {
        self.store.add_peer(self.object, self.slot, peer)
    }

    /// Removes `peer`; fails when it is not linked.
    pub fn remove(&mut self, peer: ObjectId) -> ModelResult<()> {
        self.store.remove_peer(self.object, self.slot, peer)
    }

    /// Removes `peer` when linked; otherwise does nothing.
    pub fn discard(&mut self, peer: ObjectId) -> ModelResult<()> {
        if self.contains(peer) {
            self.remove(peer)?;
        }
        Ok(())
    }

    pub fn clear(&mut self) -> ModelResult<()> {
        for peer in self.all().into_iter().rev() {
            self.remove(peer)?;
        }
        Ok(())
    }

    /// Unlinks and returns the last element.
    pub fn pop(&mut self) -> ModelResult<Option<ObjectId>> {
        match self.all().last().copied() {
            Some(peer) => {
                self.remove(peer)?;
                Ok(Some(peer))
            }
            None => Ok(None),
        }
    }

    pub fn extend(&mut self, peers: impl IntoIterator<Item = ObjectId>) -> ModelResult<()> {
        for peer in peers {
            self.add(peer)?;
        }
        Ok(())
    }

    pub fn update(&mut self, peers: impl IntoIterator<Item = ObjectId>) -> ModelResult<()> {
        self.extend(peers)
    }

    /// Keeps only the elements also in `peers`.
    pub fn intersection_update(&mut self, peers: &[ObjectId]) -> ModelResult<()> {
        for current in self.all() {
            if !peers.contains(&current) {
                self.remove(current)?;
            }
        }
        Ok(())
    }

    /// Removes every element of `peers`.
    pub fn difference_update(&mut self, peers: &[ObjectId]) -> ModelResult<()> {
        for peer in peers {
            self.discard(*peer)?;
        }
        Ok(())
    }

    /// Toggles membership of every element of `peers`.
    pub fn symmetric_difference_update(&mut self, peers: &[ObjectId]) -> ModelResult<()> {
        let current = self.all();
        for peer in peers {
            if current.contains(peer) {
                self.discard(*peer)?;
            } else {
                self.add(*peer)?;
            }
        }
        Ok(())
    }

    /// Creates an object of the peer class and links it.
    ///
    /// # Errors
    /// - `InvalidCreateKeyword` when `kwargs` names the attribute that links
    ///   the new object back to this collection.
    pub fn create(&mut self, kwargs: Vec<(&str, Field)>) -> ModelResult<ObjectId> {
        let schema = Arc::clone(&self.store.schema);
        let model = schema.get(self.store.instance(self.object)?.model);
        let end = endpoint(&schema, model, self.slot).ok_or(ModelError::NoMatch)?;
        let back_name = match end.side {
            Side::Forward => end.relation.related_name.clone(),
            Side::Reverse => Some(end.attribute.name.clone()),
        };
        if let Some(back) = &back_name {
            if kwargs.iter().any(|(name, _)| *name == back.as_str()) {
                return Err(ModelError::InvalidCreateKeyword(back.clone()));
            }
        }

        let peer = self.store.create_in(end.peer_model(), kwargs)?;
        if let Err(err) = self.add(peer) {
            self.store.delete(peer)?;
            return Err(err);
        }
        Ok(peer)
    }

    /// Every element whose attributes equal all of `filters`.
    pub fn filter(&self, filters: &[(&str, Field)]) -> ModelResult<Vec<ObjectId>> {
        let mut out = Vec::new();
        for peer in self.all() {
            if self.matches(peer, filters)? {
                out.push(peer);
            }
        }
        Ok(out)
    }

    /// The single element matching `filters`, if any.
    pub fn get(&self, filters: &[(&str, Field)]) -> ModelResult<Option<ObjectId>> {
        let mut matches = self.filter(filters)?;
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => Err(ModelError::MultipleMatches),
        }
    }

    /// Position of the single element matching `filters`.
    pub fn index(&self, filters: &[(&str, Field)]) -> ModelResult<usize> {
        let mut position = None;
        for (index, peer) in self.all().into_iter().enumerate() {
            if self.matches(peer, filters)? {
                if position.is_some() {
                    return Err(ModelError::AmbiguousIndex);
                }
                position = Some(index);
            }
        }
        position.ok_or(ModelError::NoMatch)
    }

    fn matches(&self, peer: ObjectId, filters: &[(&str, Field)]) -> ModelResult<bool> {
        let model = self.store.model_of(peer)?;
        for (name, expected) in filters {
            let slot = resolve_slot(model, name).ok_or_else(|| ModelError::UnknownAttribute {
                model: model.name.clone(),
                attribute: name.to_string(),
            })?;
            let actual = self.store.field(peer, slot)?;
            let equal = match (slot, actual, expected) {
                (Slot::Forward(index), Field::Value(left), Field::Value(right)) => {
                    model.attributes[index].value_equal(left, right)
                }
                _ => actual == expected,
            };
            if !equal {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
