//! Declaration-time construction of a `Schema`.
//!
//! # Responsibility
//! - Turn `ModelDef` declarations into immutable `Model` descriptors.
//! - Resolve inheritance, relationship targets, mirrors and display names.
//!
//! # Invariants
//! - Parents are declared before their children.
//! - Overrides of inherited attributes keep the inherited kind lineage.
//! - Mirror names never collide with attributes or with another
//!   relationship's mirror on the same class.
//! - Advisory problems are logged with `warn!`; the rest are fatal.

use crate::attribute::{Attribute, Cardinality};
use crate::schema::{
    MirrorAttribute, Model, ModelId, Orientation, Schema, SchemaError, SchemaResult,
    SerializeHook, UniqueHook,
};
use crate::store::{ObjectId, Store};
use crate::invalid::InvalidModel;
use crate::util::{natural_sorted, pluralize, sentence_case};
use log::{info, warn};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Declaration of one model type.
#[derive(Clone, Default)]
pub struct ModelDef {
    name: String,
    parent: Option<String>,
    attributes: Vec<Attribute>,
    verbose_name: Option<String>,
    verbose_name_plural: Option<String>,
    attribute_order: Option<Vec<String>>,
    unique_together: Option<Vec<Vec<String>>>,
    ordering: Option<Vec<String>>,
    orientation: Option<Orientation>,
    frozen_columns: Option<usize>,
    validate_unique: Option<UniqueHook>,
    serialize: Option<SerializeHook>,
}

impl ModelDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn attributes(mut self, attributes: impl IntoIterator<Item = Attribute>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    pub fn verbose_name(mut self, verbose_name: impl Into<String>) -> Self {
        self.verbose_name = Some(verbose_name.into());
        self
    }

    pub fn verbose_name_plural(mut self, plural: impl Into<String>) -> Self {
        self.verbose_name_plural = Some(plural.into());
        self
    }

    /// Column order; unlisted attributes follow in natural order.
    pub fn attribute_order<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.attribute_order = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn unique_together<S, T>(mut self, groups: impl IntoIterator<Item = T>) -> Self
    where
        S: Into<String>,
        T: IntoIterator<Item = S>,
    {
        self.unique_together = Some(
            groups
                .into_iter()
                .map(|group| group.into_iter().map(Into::into).collect())
                .collect(),
        );
        self
    }

    /// Sort keys; prefix a name with `-` to sort descending.
    pub fn ordering<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.ordering = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = Some(orientation);
        self
    }

    pub fn frozen_columns(mut self, frozen_columns: usize) -> Self {
        self.frozen_columns = Some(frozen_columns);
        self
    }

    /// Replaces the default uniqueness check of this model.
    pub fn validate_unique_with<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Store, &[ObjectId]) -> Option<InvalidModel> + Send + Sync + 'static,
    {
        self.validate_unique = Some(Arc::new(hook));
        self
    }

    /// Replaces the primary-key based external key of this model.
    pub fn serialize_with<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Store, ObjectId) -> Option<String> + Send + Sync + 'static,
    {
        self.serialize = Some(Arc::new(hook));
        self
    }
}

/// Collects declarations and validates them into a `Schema`.
#[derive(Default)]
pub struct SchemaBuilder {
    defs: Vec<ModelDef>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, def: ModelDef) -> Self {
        self.defs.push(def);
        self
    }

    /// Builds the registry.
    ///
    /// # Errors
    /// - Returns `SchemaError` for every fatal declaration mistake.
    pub fn build(self) -> SchemaResult<Arc<Schema>> {
        let mut models: Vec<Model> = Vec::with_capacity(self.defs.len());
        let mut ids: HashMap<String, ModelId> = HashMap::new();

        for def in self.defs {
            if ids.contains_key(&def.name) {
                return Err(SchemaError::DuplicateModel(def.name));
            }
            let id = ModelId::from_index(models.len());
            let parent = match &def.parent {
                Some(parent) => Some(*ids.get(parent).ok_or_else(|| {
                    SchemaError::UnknownParent {
                        model: def.name.clone(),
                        parent: parent.clone(),
                    }
                })?),
                None => None,
            };
            let model = init_model(id, def, parent.map(|parent| &models[parent.index()]))?;
            ids.insert(model.name.clone(), id);
            models.push(model);
        }

        resolve_related_classes(&mut models, &ids)?;
        let mut schema = Schema::from_parts(models);
        register_mirrors(&mut schema)?;
        validate_inline_models(&schema)?;
        warn_unorderable(&schema);

        info!(
            "event=schema_build module=schema status=ok models={}",
            schema.len()
        );
        Ok(Arc::new(schema))
    }
}

fn init_model(id: ModelId, def: ModelDef, parent: Option<&Model>) -> SchemaResult<Model> {
    let ModelDef {
        name,
        attributes: own_attributes,
        verbose_name,
        verbose_name_plural,
        attribute_order,
        unique_together,
        ordering,
        orientation,
        frozen_columns,
        validate_unique,
        serialize,
        ..
    } = def;

    let mut attributes = parent
        .map(|parent| parent.attributes.clone())
        .unwrap_or_default();
    let mut own_names = HashSet::new();
    for mut attr in own_attributes {
        if !own_names.insert(attr.name.clone()) {
            return Err(SchemaError::DuplicateAttribute {
                model: name.clone(),
                attribute: attr.name,
            });
        }
        if let crate::attribute::AttributeKind::Related(relation) = &mut attr.kind {
            relation.primary_model = id;
        }
        match attributes.iter().position(|existing| existing.name == attr.name) {
            Some(index) => {
                let inherited = &attributes[index];
                if !attr.kind.tag().is_subtype_of(inherited.kind.tag()) {
                    return Err(SchemaError::IncompatibleOverride {
                        model: name.clone(),
                        attribute: attr.name,
                        parent: parent.map(|parent| parent.name.clone()).unwrap_or_default(),
                        expected: inherited.kind.class_name().to_string(),
                    });
                }
                attributes[index] = attr;
            }
            None => attributes.push(attr),
        }
    }

    let primaries = attributes
        .iter()
        .enumerate()
        .filter(|(_, attr)| attr.primary)
        .map(|(index, _)| index)
        .collect::<Vec<_>>();
    if primaries.len() > 1 {
        return Err(SchemaError::MultiplePrimary(name));
    }
    let primary_attribute = primaries.first().copied();

    let inheritance = std::iter::once(id)
        .chain(parent.into_iter().flat_map(|parent| parent.inheritance.iter().copied()))
        .collect::<Vec<_>>();

    let (verbose_name, verbose_name_plural) = match (verbose_name, verbose_name_plural) {
        (Some(singular), Some(plural)) => (singular, plural),
        (Some(singular), None) => {
            let plural = pluralize(&singular);
            (singular, plural)
        }
        (None, plural) => (
            sentence_case(&name),
            plural.unwrap_or_else(|| sentence_case(&pluralize(&name))),
        ),
    };

    // Own entries lead, then the parent's order for whatever they left out.
    let mut explicit_order = attribute_order.unwrap_or_default();
    if let Some(parent) = parent {
        let inherited = parent
            .attribute_order
            .iter()
            .filter(|attr_name| !explicit_order.contains(*attr_name))
            .cloned()
            .collect::<Vec<_>>();
        explicit_order.extend(inherited);
    }
    for attr_name in &explicit_order {
        if !attributes.iter().any(|attr| &attr.name == attr_name) {
            return Err(SchemaError::UnknownOrderAttribute {
                model: name,
                attribute: attr_name.clone(),
            });
        }
    }
    let remaining = attributes
        .iter()
        .filter(|attr| !explicit_order.contains(&attr.name))
        .map(|attr| attr.name.clone());
    let mut attribute_order = explicit_order.clone();
    attribute_order.extend(natural_sorted(remaining));

    let unique_together = unique_together
        .or_else(|| parent.map(|parent| parent.unique_together.clone()))
        .unwrap_or_default();
    validate_unique_together(&name, &attributes, &unique_together)?;

    let ordering = ordering
        .or_else(|| parent.map(|parent| parent.ordering.clone()))
        .filter(|ordering| !ordering.is_empty())
        .unwrap_or_else(|| {
            primary_attribute
                .map(|index| vec![attributes[index].name.clone()])
                .unwrap_or_default()
        });
    for key in &ordering {
        let attr_name = key.strip_prefix('-').unwrap_or(key);
        if !attributes.iter().any(|attr| attr.name == attr_name) {
            return Err(SchemaError::UnknownOrderAttribute {
                model: name,
                attribute: attr_name.to_string(),
            });
        }
    }

    let mut model = Model {
        id,
        name,
        verbose_name,
        verbose_name_plural,
        parent: parent.map(|parent| parent.id),
        inheritance,
        attributes,
        related_attributes: Vec::new(),
        primary_attribute,
        attribute_order,
        unique_together,
        ordering,
        orientation: orientation
            .or_else(|| parent.map(|parent| parent.orientation))
            .unwrap_or_default(),
        frozen_columns: frozen_columns
            .or_else(|| parent.map(|parent| parent.frozen_columns))
            .unwrap_or(1),
        validate_unique,
        serialize,
        attribute_index: HashMap::new(),
        related_index: HashMap::new(),
    };
    model.rebuild_indexes();
    Ok(model)
}

fn validate_unique_together(
    model: &str,
    attributes: &[Attribute],
    groups: &[Vec<String>],
) -> SchemaResult<()> {
    let invalid = |message: &str| SchemaError::InvalidUniqueTogether {
        model: model.to_string(),
        message: message.to_string(),
    };
    let mut seen_groups = BTreeSet::new();
    for group in groups {
        let mut seen = HashSet::new();
        for attr_name in group {
            if !attributes.iter().any(|attr| &attr.name == attr_name) {
                return Err(invalid("`unique_together` must be a tuple of tuple of attribute names"));
            }
            if !seen.insert(attr_name) {
                return Err(invalid(
                    "`unique_together` cannot contain repeated attribute names with each tuple",
                ));
            }
        }
        let mut key = group.clone();
        key.sort();
        if !seen_groups.insert(key) {
            return Err(invalid("`unique_together` cannot contain repeated tuples"));
        }
    }
    Ok(())
}

fn resolve_related_classes(models: &mut [Model], ids: &HashMap<String, ModelId>) -> SchemaResult<()> {
    for model in models.iter_mut() {
        let model_name = model.name.clone();
        for attr in &mut model.attributes {
            let attr_name = attr.name.clone();
            if let crate::attribute::AttributeKind::Related(relation) = &mut attr.kind {
                relation.related_model = *ids.get(&relation.related_class).ok_or_else(|| {
                    SchemaError::UnknownRelatedClass {
                        model: model_name.clone(),
                        attribute: attr_name,
                        related_class: relation.related_class.clone(),
                    }
                })?;
            }
        }
    }
    Ok(())
}

/// Own relationship declarations: `(declaring model, attribute index)`.
fn own_relations(schema: &Schema) -> Vec<(ModelId, usize)> {
    let mut out = Vec::new();
    for id in schema.models(true) {
        let model = schema.get(id);
        for (index, attr) in model.attributes.iter().enumerate() {
            if let Some(relation) = attr.relation() {
                if relation.primary_model == id {
                    out.push((id, index));
                }
            }
        }
    }
    out
}

fn register_mirrors(schema: &mut Schema) -> SchemaResult<()> {
    for (declaring, index) in own_relations(schema) {
        let declaring_model = schema.get(declaring);
        let attr = declaring_model.attributes[index].clone();
        let declaring_name = declaring_model.name.clone();
        let Some(relation) = attr.relation() else {
            continue;
        };
        let Some(related_name) = relation.related_name.clone() else {
            continue;
        };
        let targets = schema.subclasses(relation.related_model).to_vec();

        for target in &targets {
            let related = schema.get(*target);
            if relation.inline.is_none() {
                check_related_primary(&declaring_name, related)?;
            }
        }
        for target in targets {
            let related = schema.get(target);
            if related.attribute(&related_name).is_some() {
                return Err(SchemaError::RelatedNameCollision {
                    model: declaring_name.clone(),
                    attribute: attr.name.clone(),
                    related_class: related.name.clone(),
                    related_name,
                });
            }
            if let Some(existing) = related.related_attribute(&related_name) {
                let same = existing.declaring_model == declaring && existing.attribute == attr.name;
                let overridden = schema.is_subclass(declaring, existing.declaring_model)
                    && existing.attribute == attr.name;
                if same || overridden {
                    continue;
                }
                return Err(SchemaError::RelatedNameClash {
                    model: declaring_name.clone(),
                    attribute: attr.name.clone(),
                    other_model: schema.get(existing.declaring_model).name.clone(),
                    other_attribute: existing.attribute.clone(),
                    related_class: related.name.clone(),
                    related_name,
                });
            }

            let related = &mut schema.models[target.index()];
            related.related_attributes.push(MirrorAttribute {
                name: related_name.clone(),
                declaring_model: declaring,
                attribute: attr.name.clone(),
            });
            related.rebuild_indexes();
        }
    }
    Ok(())
}

fn check_related_primary(declaring: &str, related: &Model) -> SchemaResult<()> {
    match related.primary() {
        None if related.is_inline() => {
            warn!(
                "event=schema_warning module=schema status=warn message=\"Primary class: {}: Related class {} must have a primary attribute\"",
                declaring, related.name
            );
            Ok(())
        }
        None => Err(SchemaError::RelatedClassWithoutPrimary {
            related_class: related.name.clone(),
        }),
        Some(primary) if !primary.unique && related.is_inline() => {
            warn!(
                "event=schema_warning module=schema status=warn message=\"Primary attribute {} of related class {} must be unique\"",
                primary.name, related.name
            );
            Ok(())
        }
        Some(primary) if !primary.unique => Err(SchemaError::RelatedPrimaryNotUnique {
            related_class: related.name.clone(),
            attribute: primary.name.clone(),
        }),
        Some(_) => Ok(()),
    }
}

fn validate_inline_models(schema: &Schema) -> SchemaResult<()> {
    let relations = own_relations(schema);
    for id in schema.models(true) {
        let model = schema.get(id);
        if !model.is_inline() {
            continue;
        }
        let incoming = relations
            .iter()
            .filter_map(|(declaring, index)| {
                schema.get(*declaring).attributes[*index].relation()
            })
            .filter(|relation| model.inheritance.contains(&relation.related_model))
            .collect::<Vec<_>>();

        if incoming.is_empty() {
            return Err(SchemaError::InlineWithoutRelationship(model.name.clone()));
        }
        if incoming.iter().any(|relation| relation.inline.is_none()) {
            return Err(SchemaError::InlineWithoutCodec(model.name.clone()));
        }
        let well_shaped = incoming.len() == 1
            && matches!(
                incoming[0].cardinality,
                Cardinality::OneToOne | Cardinality::OneToMany
            )
            && !incoming[0].related_none;
        if !well_shaped {
            warn!(
                "event=schema_warning module=schema status=warn message=\"{}\"",
                SchemaError::InlineWithoutRelationship(model.name.clone())
            );
        }
    }
    Ok(())
}

/// Classes whose instances end up in unordered collections.
pub(crate) fn collection_element_classes(schema: &Schema, model: ModelId) -> Vec<ModelId> {
    let mut out = Vec::new();
    let current = schema.get(model);
    for attr in &current.attributes {
        if let Some(relation) = attr.relation() {
            if matches!(
                relation.cardinality,
                Cardinality::OneToMany | Cardinality::ManyToMany
            ) {
                out.push(relation.related_model);
            }
            if matches!(
                relation.cardinality,
                Cardinality::ManyToOne | Cardinality::ManyToMany
            ) {
                out.push(model);
            }
        }
    }
    for mirror in &current.related_attributes {
        if let Some(relation) = schema.relation_of_mirror(mirror) {
            if matches!(
                relation.cardinality,
                Cardinality::ManyToOne | Cardinality::ManyToMany
            ) {
                out.push(relation.primary_model);
            }
            if matches!(
                relation.cardinality,
                Cardinality::OneToMany | Cardinality::ManyToMany
            ) {
                out.push(model);
            }
        }
    }
    out.sort();
    out.dedup();
    out
}

fn warn_unorderable(schema: &Schema) {
    let mut warned = BTreeSet::new();
    for id in schema.models(true) {
        for class in collection_element_classes(schema, id) {
            let model = schema.get(class);
            if !model.is_reproducibly_orderable() && warned.insert(class) {
                warn!(
                    "event=schema_warning module=schema status=warn message=\"Class {} cannot be reproducibly ordered\"",
                    model.name
                );
            }
        }
    }
}
