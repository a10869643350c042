//! Model type registry.
//!
//! # Responsibility
//! - Hold the immutable descriptors of every declared model.
//! - Answer name, inheritance and mirror lookups for the runtime and codec.
//!
//! # Invariants
//! - A `Schema` is built once by `SchemaBuilder::build` and never mutated.
//! - Every relationship descriptor inside a built schema is resolved to
//!   concrete `ModelId`s.
//! - Each model has at most one primary attribute.
//!
//! # See also
//! - `builder` for declaration-time checks.

pub mod builder;

use crate::attribute::{Attribute, Relation};
use crate::invalid::InvalidModel;
use crate::store::{ObjectId, Store};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

pub use builder::{ModelDef, SchemaBuilder};

pub type SchemaResult<T> = Result<T, SchemaError>;

/// Index of a model inside its schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(usize);

impl ModelId {
    pub(crate) const UNRESOLVED: ModelId = ModelId(usize::MAX);

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// How a model's instances are laid out in a worksheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// Header row of attribute names, one object per following row.
    #[default]
    Row,
    /// Header column of attribute names, one object per following column.
    Column,
    /// Embedded in a cell of the owning object; no sheet of its own.
    Inline,
}

/// Custom uniqueness check over the objects of one model.
pub type UniqueHook = Arc<dyn Fn(&Store, &[ObjectId]) -> Option<InvalidModel> + Send + Sync>;
/// Custom external key of an object.
pub type SerializeHook = Arc<dyn Fn(&Store, ObjectId) -> Option<String> + Send + Sync>;

/// Relationship declared on another class and mirrored onto this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorAttribute {
    /// Name of the mirror on this class (the declaration's `related_name`).
    pub name: String,
    /// Class that declares the relationship.
    pub declaring_model: ModelId,
    /// Name of the forward attribute on the declaring class.
    pub attribute: String,
}

/// Immutable descriptor of one model type.
#[derive(Clone)]
pub struct Model {
    pub id: ModelId,
    pub name: String,
    pub verbose_name: String,
    pub verbose_name_plural: String,
    pub parent: Option<ModelId>,
    /// This model first, then its ancestors from nearest to farthest.
    pub inheritance: Vec<ModelId>,
    /// Own and inherited attributes; inherited ones come first.
    pub attributes: Vec<Attribute>,
    pub related_attributes: Vec<MirrorAttribute>,
    pub primary_attribute: Option<usize>,
    pub attribute_order: Vec<String>,
    pub unique_together: Vec<Vec<String>>,
    pub ordering: Vec<String>,
    pub orientation: Orientation,
    pub frozen_columns: usize,
    pub(crate) validate_unique: Option<UniqueHook>,
    pub(crate) serialize: Option<SerializeHook>,
    attribute_index: HashMap<String, usize>,
    related_index: HashMap<String, usize>,
}

impl Model {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attribute_position(name)
            .map(|index| &self.attributes[index])
    }

    pub fn attribute_position(&self, name: &str) -> Option<usize> {
        self.attribute_index.get(name).copied()
    }

    pub fn related_attribute(&self, name: &str) -> Option<&MirrorAttribute> {
        self.related_position(name)
            .map(|index| &self.related_attributes[index])
    }

    pub fn related_position(&self, name: &str) -> Option<usize> {
        self.related_index.get(name).copied()
    }

    pub fn primary(&self) -> Option<&Attribute> {
        self.primary_attribute.map(|index| &self.attributes[index])
    }

    /// Attributes in display order.
    pub fn ordered_attributes(&self) -> Vec<&Attribute> {
        self.attribute_order
            .iter()
            .filter_map(|name| self.attribute(name))
            .collect()
    }

    pub fn is_inline(&self) -> bool {
        self.orientation == Orientation::Inline
    }

    /// Sheet name the writer uses for this model.
    pub fn sheet_name(&self) -> &str {
        match self.orientation {
            Orientation::Column => &self.verbose_name,
            _ => &self.verbose_name_plural,
        }
    }

    pub fn has_unique_hook(&self) -> bool {
        self.validate_unique.is_some()
    }

    pub fn has_serialize_hook(&self) -> bool {
        self.serialize.is_some()
    }

    /// Whether a deterministic sort key always exists for this model.
    pub fn is_reproducibly_orderable(&self) -> bool {
        !self.unique_together.is_empty()
            || self.validate_unique.is_some()
            || self.serialize.is_some()
            || self.attributes.iter().any(|attr| attr.unique)
    }

    pub(crate) fn rebuild_indexes(&mut self) {
        self.attribute_index = self
            .attributes
            .iter()
            .enumerate()
            .map(|(index, attr)| (attr.name.clone(), index))
            .collect();
        self.related_index = self
            .related_attributes
            .iter()
            .enumerate()
            .map(|(index, mirror)| (mirror.name.clone(), index))
            .collect();
    }
}

impl Debug for Model {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("verbose_name", &self.verbose_name)
            .field("orientation", &self.orientation)
            .field("attributes", &self.attribute_order)
            .finish()
    }
}

/// Immutable registry of model types.
#[derive(Debug)]
pub struct Schema {
    models: Vec<Model>,
    by_name: HashMap<String, ModelId>,
    /// For each model: itself followed by every descendant.
    descendants: Vec<Vec<ModelId>>,
}

impl Schema {
    /// Panics when `id` was not issued by this schema; see [`Schema::try_get`].
    pub fn get(&self, id: ModelId) -> &Model {
        &self.models[id.0]
    }

    /// `None` for ids from another schema or for unresolved ids.
    pub fn try_get(&self, id: ModelId) -> Option<&Model> {
        self.models.get(id.0)
    }

    pub fn model(&self, name: &str) -> Option<&Model> {
        self.by_name.get(name).map(|id| self.get(*id))
    }

    pub fn model_id(&self, name: &str) -> Option<ModelId> {
        self.by_name.get(name).copied()
    }

    /// Every model id in declaration order, optionally without inline models.
    pub fn models(&self, include_inline: bool) -> Vec<ModelId> {
        self.models
            .iter()
            .filter(|model| include_inline || !model.is_inline())
            .map(|model| model.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// `model` followed by all of its descendants.
    pub fn subclasses(&self, model: ModelId) -> &[ModelId] {
        self.descendants
            .get(model.0)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether `model` is `ancestor` or inherits from it.
    pub fn is_subclass(&self, model: ModelId, ancestor: ModelId) -> bool {
        self.get(model).inheritance.contains(&ancestor)
    }

    /// Resolves the relationship behind a forward attribute or a mirror.
    pub fn relation_of_mirror(&self, mirror: &MirrorAttribute) -> Option<&Relation> {
        self.get(mirror.declaring_model)
            .attribute(&mirror.attribute)
            .and_then(Attribute::relation)
    }

    /// Sheet names that select `model` when reading: its name, verbose name
    /// and plural verbose name.
    pub fn possible_sheet_names(&self, model: ModelId) -> Vec<String> {
        let model = self.get(model);
        let mut names = vec![
            model.name.clone(),
            model.verbose_name.clone(),
            model.verbose_name_plural.clone(),
        ];
        names.dedup();
        names
    }
}

/// Fatal schema declaration mistakes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    DuplicateModel(String),
    UnknownParent { model: String, parent: String },
    DuplicateAttribute { model: String, attribute: String },
    IncompatibleOverride {
        model: String,
        attribute: String,
        parent: String,
        expected: String,
    },
    MultiplePrimary(String),
    UnknownOrderAttribute { model: String, attribute: String },
    InvalidUniqueTogether { model: String, message: String },
    UnknownRelatedClass { model: String, attribute: String, related_class: String },
    RelatedClassWithoutPrimary { related_class: String },
    RelatedPrimaryNotUnique { related_class: String, attribute: String },
    RelatedNameCollision {
        model: String,
        attribute: String,
        related_class: String,
        related_name: String,
    },
    RelatedNameClash {
        model: String,
        attribute: String,
        other_model: String,
        other_attribute: String,
        related_class: String,
        related_name: String,
    },
    InlineWithoutCodec(String),
    InlineWithoutRelationship(String),
    InvalidPattern { pattern: String, message: String },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateModel(name) => write!(f, "Model {name} is declared more than once"),
            Self::UnknownParent { model, parent } => write!(
                f,
                "Parent class {parent} of {model} must be declared before {model}"
            ),
            Self::DuplicateAttribute { model, attribute } => {
                write!(f, "Attribute {model}.{attribute} is declared more than once")
            }
            Self::IncompatibleOverride {
                model,
                attribute,
                parent,
                expected,
            } => write!(
                f,
                "Attribute \"{attribute}\" of class \"{model}\" inherited from \"{parent}\" must be a subclass of {expected} because the attribute is already defined in the superclass"
            ),
            Self::MultiplePrimary(model) => {
                write!(f, "Model {model} cannot have more than one primary attribute")
            }
            Self::UnknownOrderAttribute { model, attribute } => {
                write!(f, "'{attribute}' not found in attributes of {model}")
            }
            Self::InvalidUniqueTogether { model, message } => {
                write!(f, "{model}.unique_together is invalid: {message}")
            }
            Self::UnknownRelatedClass {
                model,
                attribute,
                related_class,
            } => write!(
                f,
                "Related class {related_class} of {model}.{attribute} must be defined"
            ),
            Self::RelatedClassWithoutPrimary { related_class } => {
                write!(f, "Related class {related_class} must have a primary attribute")
            }
            Self::RelatedPrimaryNotUnique {
                related_class,
                attribute,
            } => write!(
                f,
                "Primary attribute {attribute} of related class {related_class} must be unique"
            ),
            Self::RelatedNameCollision {
                model,
                attribute,
                related_class,
                related_name,
            } => write!(
                f,
                "Related attribute {model}.{attribute} cannot use the same related name as {related_class}.{related_name}"
            ),
            Self::RelatedNameClash {
                model,
                attribute,
                other_model,
                other_attribute,
                related_class,
                related_name,
            } => write!(
                f,
                "Attributes {model}.{attribute} and {other_model}.{other_attribute} cannot use the same related attribute name {related_class}.{related_name}"
            ),
            Self::InlineWithoutCodec(model) => write!(
                f,
                "Inline model \"{model}\" must define their own serialization/deserialization methods"
            ),
            Self::InlineWithoutRelationship(model) => write!(
                f,
                "Inline model \"{model}\" should have a single required related one-to-one or one-to-many attribute"
            ),
            Self::InvalidPattern { pattern, message } => {
                write!(f, "invalid pattern `{pattern}`: {message}")
            }
        }
    }
}

impl Error for SchemaError {}

impl Schema {
    pub(crate) fn from_parts(models: Vec<Model>) -> Self {
        let by_name = models
            .iter()
            .map(|model| (model.name.clone(), model.id))
            .collect();
        let mut descendants = models
            .iter()
            .map(|model| vec![model.id])
            .collect::<Vec<_>>();
        for model in &models {
            for ancestor in model.inheritance.iter().skip(1) {
                descendants[ancestor.0].push(model.id);
            }
        }
        Self {
            models,
            by_name,
            descendants,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ModelDef, ModelId, Orientation, SchemaBuilder};
    use crate::attribute::Attribute;

    #[test]
    fn subclasses_include_self_and_descendants() {
        let schema = SchemaBuilder::new()
            .model(ModelDef::new("Base").attribute(Attribute::slug("id")))
            .model(ModelDef::new("Child").extends("Base"))
            .model(ModelDef::new("GrandChild").extends("Child"))
            .build()
            .unwrap();
        let base = schema.model_id("Base").unwrap();
        let grand_child = schema.model_id("GrandChild").unwrap();
        assert_eq!(schema.subclasses(base).len(), 3);
        assert!(schema.is_subclass(grand_child, base));
        assert!(!schema.is_subclass(base, grand_child));
    }

    #[test]
    fn unresolved_id_has_no_model_and_no_subclasses() {
        let schema = SchemaBuilder::new()
            .model(ModelDef::new("Base").attribute(Attribute::slug("id")))
            .build()
            .unwrap();
        assert!(schema.try_get(ModelId::UNRESOLVED).is_none());
        assert!(schema.subclasses(ModelId::UNRESOLVED).is_empty());
        assert!(schema.try_get(schema.model_id("Base").unwrap()).is_some());
    }

    #[test]
    fn sheet_name_follows_orientation() {
        let schema = SchemaBuilder::new()
            .model(ModelDef::new("Reference").attribute(Attribute::slug("id")))
            .model(
                ModelDef::new("Parameter")
                    .attribute(Attribute::slug("id"))
                    .orientation(Orientation::Column),
            )
            .build()
            .unwrap();
        assert_eq!(schema.model("Reference").unwrap().sheet_name(), "References");
        assert_eq!(schema.model("Parameter").unwrap().sheet_name(), "Parameter");
        assert_eq!(
            schema.possible_sheet_names(schema.model_id("Reference").unwrap()),
            vec!["Reference", "References"]
        );
    }
}
