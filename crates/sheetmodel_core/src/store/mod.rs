//! Instance runtime.
//!
//! # Responsibility
//! - Own every model instance of one object graph in a single arena.
//! - Route reads and writes through the schema's per-model slot tables.
//! - Track where loaded instances came from for located error reports.
//!
//! # Invariants
//! - `ObjectId`s are arena indexes and are never reused; deleting an object
//!   only invalidates its handle.
//! - Relationship slots only change through the mirror-aware mutators in
//!   `relation`, so both ends of a link always agree.
//! - A store is bound to exactly one `Schema` for its whole life.
//!
//! # See also
//! - `graph` for equality, difference, normalization and copy.
//! - `check` for clean/validate/uniqueness.

pub mod check;
pub mod graph;
pub mod relation;

use crate::attribute::scalar::number_to_text;
use crate::attribute::{Attribute, Field, Relation, Side, Value};
use crate::schema::{Model, ModelId, Orientation, Schema};
use crate::util::{excel_col_name, natural_cmp, quote};
use crate::workbook::{Cell, SourceKind};
use log::debug;
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

pub use relation::RelatedManager;

pub type ModelResult<T> = Result<T, ModelError>;

/// Handle of one instance inside a `Store`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

impl ObjectId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Usage errors of the instance runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    UnknownModel(String),
    UnknownAttribute { model: String, attribute: String },
    InvalidKeyword { model: String, keyword: String },
    DeletedObject(ObjectId),
    WrongFieldShape { model: String, attribute: String, expected: &'static str },
    WrongRelatedType { attribute: String, expected: String, actual: String },
    OccupiedOneToOne { model: String, attribute: String },
    NotRelated { model: String, attribute: String },
    MultipleMatches,
    NoMatch,
    AmbiguousIndex,
    InvalidCreateKeyword(String),
    NotReproduciblyOrderable(String),
    LocationUnavailable(ObjectId),
    UnknownLocationAttribute { model: String, attribute: String },
    SchemaMismatch,
    UniqueTogetherCollection(String),
    DuplicateInvalidModels(Vec<String>),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownModel(name) => write!(f, "model {name} is not registered"),
            Self::UnknownAttribute { model, attribute } => {
                write!(f, "{model} has no attribute {attribute}")
            }
            Self::InvalidKeyword { model, keyword } => write!(
                f,
                "'{keyword}' is an invalid keyword argument for {model}.__init__"
            ),
            Self::DeletedObject(id) => write!(f, "object {id} has been deleted"),
            Self::WrongFieldShape {
                model,
                attribute,
                expected,
            } => write!(f, "{model}.{attribute} expects {expected}"),
            Self::WrongRelatedType {
                attribute,
                expected,
                actual,
            } => write!(
                f,
                "{attribute} must be an instance of \"{expected}\", not \"{actual}\""
            ),
            Self::OccupiedOneToOne { model, attribute } => write!(
                f,
                "{model}.{attribute} of the new value is already set to another object"
            ),
            Self::NotRelated { model, attribute } => {
                write!(f, "object is not in {model}.{attribute}")
            }
            Self::MultipleMatches => {
                write!(f, "Multiple objects match the attribute name/value pair(s)")
            }
            Self::NoMatch => write!(f, "No matching object"),
            Self::AmbiguousIndex => write!(
                f,
                "Keyword argument attribute/value pairs match multiple objects"
            ),
            Self::InvalidCreateKeyword(keyword) => write!(
                f,
                "'{keyword}' is set automatically by the collection and cannot be passed"
            ),
            Self::NotReproduciblyOrderable(model) => {
                write!(f, "Class {model} cannot be reproducibly ordered")
            }
            Self::LocationUnavailable(id) => {
                write!(f, "location information unavailable for object {id}")
            }
            Self::UnknownLocationAttribute { model, attribute } => {
                write!(f, "cannot find attr {attribute} in the location of {model}")
            }
            Self::SchemaMismatch => write!(f, "objects belong to stores with different schemas"),
            Self::UniqueTogetherCollection(model) => write!(
                f,
                "Values of attributes in {model}.unique_together must be scalars"
            ),
            Self::DuplicateInvalidModels(models) => write!(
                f,
                "Models {} appear more than once in the invalid models",
                models.join(", ")
            ),
        }
    }
}

impl Error for ModelError {}

/// Sheet or file an instance was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLocation {
    /// Display path of the source (a concrete file for delimited sources).
    pub path: String,
    pub sheet: String,
    pub kind: SourceKind,
    /// Attribute name of each column (row models) or row (column models);
    /// `None` for cells that did not map to an attribute.
    pub attribute_seq: Vec<Option<String>>,
}

/// Resolved file position of one attribute of one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellLocation {
    pub extension: String,
    pub basename: String,
    pub sheet: String,
    /// 1-based row.
    pub row: usize,
    /// 1-based column.
    pub column: usize,
    pub kind: SourceKind,
}

impl Display for CellLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            SourceKind::Spreadsheet => write!(
                f,
                "{}:{}:{}{}",
                self.basename,
                self.sheet,
                excel_col_name(self.column),
                self.row
            ),
            SourceKind::Delimited => write!(
                f,
                "{}:{}:{},{}",
                self.basename, self.sheet, self.row, self.column
            ),
        }
    }
}

/// Slot of an instance: a declared attribute or a mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Slot {
    Forward(usize),
    Reverse(usize),
}

/// Relationship behind a slot, seen from the side that holds it.
#[derive(Clone, Copy)]
pub(crate) struct Endpoint<'s> {
    pub relation: &'s Relation,
    /// The declaring attribute.
    pub attribute: &'s Attribute,
    pub side: Side,
    /// Name of the slot on this side.
    pub name: &'s str,
}

impl<'s> Endpoint<'s> {
    pub fn is_many(&self) -> bool {
        self.relation.cardinality.is_many(self.side)
    }

    pub fn mirror_is_many(&self) -> bool {
        self.relation.cardinality.is_many(self.side.flip())
    }

    pub fn peer_model(&self) -> ModelId {
        self.relation.peer_model(self.side)
    }

    pub fn nullable(&self) -> bool {
        match self.side {
            Side::Forward => self.relation.none,
            Side::Reverse => self.relation.related_none,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Instance {
    pub model: ModelId,
    /// Parallel to `Model::attributes`.
    pub values: Vec<Field>,
    /// Parallel to `Model::related_attributes`.
    pub related: Vec<Field>,
    pub alive: bool,
    pub location: Option<(Arc<SheetLocation>, usize)>,
}

impl Instance {
    fn slot(&self, slot: Slot) -> &Field {
        match slot {
            Slot::Forward(index) => &self.values[index],
            Slot::Reverse(index) => &self.related[index],
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Field {
        match slot {
            Slot::Forward(index) => &mut self.values[index],
            Slot::Reverse(index) => &mut self.related[index],
        }
    }
}

/// Arena of instances sharing one schema.
#[derive(Debug, Clone)]
pub struct Store {
    id: Uuid,
    schema: Arc<Schema>,
    objects: Vec<Instance>,
}

impl Store {
    pub fn new(schema: Arc<Schema>) -> Self {
        let id = Uuid::new_v4();
        debug!("event=store_new module=store status=ok store_id={id}");
        Self {
            id,
            schema,
            objects: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.objects.iter().filter(|instance| instance.alive).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, obj: ObjectId) -> bool {
        self.objects
            .get(obj.0)
            .map(|instance| instance.alive)
            .unwrap_or(false)
    }

    /// Every live object in creation order.
    pub fn ids(&self) -> Vec<ObjectId> {
        self.objects
            .iter()
            .enumerate()
            .filter(|(_, instance)| instance.alive)
            .map(|(index, _)| ObjectId(index))
            .collect()
    }

    /// Live objects whose exact model is `model`.
    pub fn objects_of(&self, model: ModelId) -> Vec<ObjectId> {
        self.objects
            .iter()
            .enumerate()
            .filter(|(_, instance)| instance.alive && instance.model == model)
            .map(|(index, _)| ObjectId(index))
            .collect()
    }

    pub fn model_id_of(&self, obj: ObjectId) -> ModelResult<ModelId> {
        Ok(self.instance(obj)?.model)
    }

    pub fn model_of(&self, obj: ObjectId) -> ModelResult<&Model> {
        let model = self.instance(obj)?.model;
        Ok(self.schema.get(model))
    }

    /// Creates an instance of the model named `model`.
    ///
    /// Every attribute starts at its initial value and every relationship
    /// side starts empty; `kwargs` are then applied through the
    /// mirror-aware setters.
    ///
    /// # Errors
    /// - `UnknownModel` or `InvalidKeyword` before anything is allocated.
    ///   [`Store::create_in`] reports ids from another schema the same way.
    /// - Any setter error; the half-built object is deleted first.
    pub fn create(&mut self, model: &str, kwargs: Vec<(&str, Field)>) -> ModelResult<ObjectId> {
        let model_id = self
            .schema
            .model_id(model)
            .ok_or_else(|| ModelError::UnknownModel(model.to_string()))?;
        self.create_in(model_id, kwargs)
    }

    pub fn create_in(
        &mut self,
        model: ModelId,
        kwargs: Vec<(&str, Field)>,
    ) -> ModelResult<ObjectId> {
        let schema = Arc::clone(&self.schema);
        let descriptor = schema
            .try_get(model)
            .ok_or_else(|| ModelError::UnknownModel(format!("#{}", model.index())))?;
        let mut slots = Vec::with_capacity(kwargs.len());
        for (name, field) in kwargs {
            let slot = resolve_slot(descriptor, name).ok_or_else(|| ModelError::InvalidKeyword {
                model: descriptor.name.clone(),
                keyword: name.to_string(),
            })?;
            slots.push((slot, field));
        }

        let obj = self.allocate(model);
        for (slot, field) in slots {
            if let Err(err) = self.set_slot(obj, slot, field) {
                self.delete(obj)?;
                return Err(err);
            }
        }
        Ok(obj)
    }

    /// Allocates an instance holding initial values only.
    pub(crate) fn allocate(&mut self, model: ModelId) -> ObjectId {
        let schema = Arc::clone(&self.schema);
        let descriptor = schema.get(model);
        let values = descriptor
            .attributes
            .iter()
            .map(|attr| match attr.relation() {
                Some(relation) if relation.cardinality.is_many(Side::Forward) => {
                    Field::Objects(Vec::new())
                }
                Some(_) => Field::Object(None),
                None => Field::Value(attr.initial_value()),
            })
            .collect();
        let related = descriptor
            .related_attributes
            .iter()
            .map(|mirror| match schema.relation_of_mirror(mirror) {
                Some(relation) if relation.cardinality.is_many(Side::Reverse) => {
                    Field::Objects(Vec::new())
                }
                _ => Field::Object(None),
            })
            .collect();

        self.objects.push(Instance {
            model,
            values,
            related,
            alive: true,
            location: None,
        });
        ObjectId(self.objects.len() - 1)
    }

    /// Current content of attribute or mirror `name`.
    pub fn get(&self, obj: ObjectId, name: &str) -> ModelResult<&Field> {
        let (instance, slot) = self.locate(obj, name)?;
        Ok(instance.slot(slot))
    }

    /// Scalar value of attribute `name`.
    pub fn value(&self, obj: ObjectId, name: &str) -> ModelResult<&Value> {
        self.get(obj, name)?
            .as_value()
            .ok_or_else(|| self.shape_error(obj, name, "a scalar value"))
    }

    /// Peer held by single-valued relationship side `name`.
    pub fn object(&self, obj: ObjectId, name: &str) -> ModelResult<Option<ObjectId>> {
        self.get(obj, name)?
            .as_object()
            .ok_or_else(|| self.shape_error(obj, name, "a single related object"))
    }

    /// Peers held by collection side `name`, in collection order.
    pub fn objects(&self, obj: ObjectId, name: &str) -> ModelResult<&[ObjectId]> {
        self.get(obj, name)?
            .as_objects()
            .ok_or_else(|| self.shape_error(obj, name, "a collection of related objects"))
    }

    /// Assigns attribute or mirror `name`.
    ///
    /// Scalars take `Field::Value` and are stored as given (cleaning is a
    /// separate step); relationship sides keep their mirrors in sync.
    pub fn set(&mut self, obj: ObjectId, name: &str, field: impl Into<Field>) -> ModelResult<()> {
        let (_, slot) = self.locate(obj, name)?;
        self.set_slot(obj, slot, field.into())
    }

    pub(crate) fn set_slot(&mut self, obj: ObjectId, slot: Slot, field: Field) -> ModelResult<()> {
        let schema = Arc::clone(&self.schema);
        let model = schema.get(self.instance(obj)?.model);
        match endpoint(&schema, model, slot) {
            None => match field {
                Field::Value(value) => {
                    *self.instance_mut(obj)?.slot_mut(slot) = Field::Value(value);
                    Ok(())
                }
                _ => Err(self.slot_shape_error(model, slot, "a scalar value")),
            },
            Some(end) if end.is_many() => match field {
                Field::Objects(peers) => self.set_many(obj, slot, peers),
                _ => Err(self.slot_shape_error(model, slot, "a collection of related objects")),
            },
            Some(_) => match field {
                Field::Object(peer) => self.set_one(obj, slot, peer),
                _ => Err(self.slot_shape_error(model, slot, "a single related object")),
            },
        }
    }

    /// Live manager over collection side `name`.
    pub fn related(&mut self, obj: ObjectId, name: &str) -> ModelResult<RelatedManager<'_>> {
        let (_, slot) = self.locate(obj, name)?;
        let schema = Arc::clone(&self.schema);
        let model = schema.get(self.instance(obj)?.model);
        match endpoint(&schema, model, slot) {
            Some(end) if end.is_many() => Ok(RelatedManager::new(self, obj, slot)),
            _ => Err(self.shape_error(obj, name, "a collection of related objects")),
        }
    }

    /// Unlinks every relationship of `obj` and invalidates the handle.
    pub fn delete(&mut self, obj: ObjectId) -> ModelResult<()> {
        let schema = Arc::clone(&self.schema);
        let model = schema.get(self.instance(obj)?.model);
        for slot in relationship_slots(model) {
            let Some(end) = endpoint(&schema, model, slot) else {
                continue;
            };
            let peers = self.instance(obj)?.slot(slot).linked();
            for peer in peers {
                if let Some(mirror) = self.mirror_slot(&schema, peer, &end) {
                    self.local_unlink(peer, mirror, obj);
                }
            }
            let cleared = if end.is_many() {
                Field::Objects(Vec::new())
            } else {
                Field::Object(None)
            };
            *self.instance_mut(obj)?.slot_mut(slot) = cleared;
        }
        self.instance_mut(obj)?.alive = false;
        Ok(())
    }

    /// External key of `obj`: the serialize hook, else the primary value.
    pub fn serialize(&self, obj: ObjectId) -> Option<String> {
        let instance = self.instance(obj).ok()?;
        let model = self.schema.get(instance.model);
        if let Some(hook) = &model.serialize {
            return hook(self, obj);
        }
        let index = model.primary_attribute?;
        match &instance.values[index] {
            Field::Value(value) => cell_key(&model.attributes[index].serialize_value(value)),
            Field::Object(Some(peer)) => self.serialize(*peer),
            _ => None,
        }
    }

    /// Human-readable label such as `<Leaf: leaf_1>`.
    pub fn display(&self, obj: ObjectId) -> String {
        let name = self
            .model_of(obj)
            .map(|model| model.name.as_str())
            .unwrap_or("Deleted");
        match self.serialize(obj) {
            Some(key) => format!("<{name}: {key}>"),
            None => format!("<{name}: {obj}>"),
        }
    }

    /// Remembers that `obj` is the `object_number`-th (1-based) object of
    /// `location`.
    pub fn set_location(
        &mut self,
        obj: ObjectId,
        location: Arc<SheetLocation>,
        object_number: usize,
    ) -> ModelResult<()> {
        self.instance_mut(obj)?.location = Some((location, object_number));
        Ok(())
    }

    /// File position of attribute `attr` of a loaded object.
    ///
    /// The header occupies the first row (row models) or column (column
    /// models), so object `n` sits in row `n + 1` before any transposition.
    pub fn get_location(&self, obj: ObjectId, attr: &str) -> ModelResult<CellLocation> {
        let instance = self.instance(obj)?;
        let model = self.schema.get(instance.model);
        let (location, object_number) = instance
            .location
            .as_ref()
            .ok_or(ModelError::LocationUnavailable(obj))?;

        let mut row = 1 + object_number;
        let mut column = location
            .attribute_seq
            .iter()
            .position(|name| name.as_deref() == Some(attr))
            .map(|index| index + 1)
            .ok_or_else(|| ModelError::UnknownLocationAttribute {
                model: model.name.clone(),
                attribute: attr.to_string(),
            })?;
        if model.orientation == Orientation::Column {
            std::mem::swap(&mut row, &mut column);
        }

        let path = Path::new(&location.path);
        Ok(CellLocation {
            extension: path
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_default(),
            basename: quote(
                &path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            ),
            sheet: quote(&location.sheet),
            row,
            column,
            kind: location.kind,
        })
    }

    /// `file:sheet:B3` for spreadsheets, `file:sheet:3,2` for delimited files.
    pub fn location_report(&self, obj: ObjectId, attr: &str) -> ModelResult<String> {
        Ok(self.get_location(obj, attr)?.to_string())
    }

    /// Sorts `objects` by the `ordering` of `model`; `-name` sorts
    /// descending.
    pub fn sort(&self, model: ModelId, objects: &mut [ObjectId]) -> ModelResult<()> {
        let descriptor = self.schema.get(model);
        if descriptor.ordering.is_empty() {
            return Ok(());
        }
        let mut keyed = Vec::with_capacity(objects.len());
        for obj in objects.iter() {
            let mut key = Vec::with_capacity(descriptor.ordering.len());
            for order in &descriptor.ordering {
                let (name, descending) = match order.strip_prefix('-') {
                    Some(name) => (name, true),
                    None => (order.as_str(), false),
                };
                key.push((self.sort_cell(*obj, name)?, descending));
            }
            keyed.push((key, *obj));
        }
        keyed.sort_by(|(left, _), (right, _)| {
            left.iter()
                .zip(right)
                .map(|((a, descending), (b, _))| {
                    let ord = compare_cells(a, b);
                    if *descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        for (target, (_, obj)) in objects.iter_mut().zip(keyed) {
            *target = obj;
        }
        Ok(())
    }

    fn sort_cell(&self, obj: ObjectId, name: &str) -> ModelResult<Cell> {
        let model = self.model_of(obj)?;
        let attr = model
            .attribute(name)
            .ok_or_else(|| ModelError::UnknownAttribute {
                model: model.name.clone(),
                attribute: name.to_string(),
            })?;
        Ok(match self.get(obj, name)? {
            Field::Value(value) => attr.serialize_value(value),
            Field::Object(Some(peer)) => self
                .serialize(*peer)
                .map(Cell::Text)
                .unwrap_or(Cell::Empty),
            _ => Cell::Empty,
        })
    }

    pub(crate) fn instance(&self, obj: ObjectId) -> ModelResult<&Instance> {
        self.objects
            .get(obj.0)
            .filter(|instance| instance.alive)
            .ok_or(ModelError::DeletedObject(obj))
    }

    pub(crate) fn instance_mut(&mut self, obj: ObjectId) -> ModelResult<&mut Instance> {
        self.objects
            .get_mut(obj.0)
            .filter(|instance| instance.alive)
            .ok_or(ModelError::DeletedObject(obj))
    }

    pub(crate) fn field(&self, obj: ObjectId, slot: Slot) -> ModelResult<&Field> {
        Ok(self.instance(obj)?.slot(slot))
    }

    fn locate(&self, obj: ObjectId, name: &str) -> ModelResult<(&Instance, Slot)> {
        let instance = self.instance(obj)?;
        let model = self.schema.get(instance.model);
        let slot = resolve_slot(model, name).ok_or_else(|| ModelError::UnknownAttribute {
            model: model.name.clone(),
            attribute: name.to_string(),
        })?;
        Ok((instance, slot))
    }

    fn shape_error(&self, obj: ObjectId, name: &str, expected: &'static str) -> ModelError {
        ModelError::WrongFieldShape {
            model: self
                .model_of(obj)
                .map(|model| model.name.clone())
                .unwrap_or_default(),
            attribute: name.to_string(),
            expected,
        }
    }

    fn slot_shape_error(&self, model: &Model, slot: Slot, expected: &'static str) -> ModelError {
        ModelError::WrongFieldShape {
            model: model.name.clone(),
            attribute: slot_name(model, slot).to_string(),
            expected,
        }
    }
}

/// Finds the slot of `name`: declared attributes first, then mirrors.
pub(crate) fn resolve_slot(model: &Model, name: &str) -> Option<Slot> {
    model
        .attribute_position(name)
        .map(Slot::Forward)
        .or_else(|| model.related_position(name).map(Slot::Reverse))
}

pub(crate) fn slot_name(model: &Model, slot: Slot) -> &str {
    match slot {
        Slot::Forward(index) => &model.attributes[index].name,
        Slot::Reverse(index) => &model.related_attributes[index].name,
    }
}

/// Relationship behind `slot`, or `None` for scalar attributes.
pub(crate) fn endpoint<'s>(schema: &'s Schema, model: &'s Model, slot: Slot) -> Option<Endpoint<'s>> {
    match slot {
        Slot::Forward(index) => {
            let attribute = &model.attributes[index];
            attribute.relation().map(|relation| Endpoint {
                relation,
                attribute,
                side: Side::Forward,
                name: &attribute.name,
            })
        }
        Slot::Reverse(index) => {
            let mirror = &model.related_attributes[index];
            let attribute = schema
                .get(mirror.declaring_model)
                .attribute(&mirror.attribute)?;
            attribute.relation().map(|relation| Endpoint {
                relation,
                attribute,
                side: Side::Reverse,
                name: &mirror.name,
            })
        }
    }
}

/// Relationship slots of `model`: forward attributes, then mirrors.
pub(crate) fn relationship_slots(model: &Model) -> Vec<Slot> {
    model
        .attributes
        .iter()
        .enumerate()
        .filter(|(_, attr)| attr.is_related())
        .map(|(index, _)| Slot::Forward(index))
        .chain((0..model.related_attributes.len()).map(Slot::Reverse))
        .collect()
}

/// Text form of a serialized cell used as an external key.
pub(crate) fn cell_key(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Empty => None,
        Cell::Text(text) => Some(text.clone()),
        Cell::Number(number) => Some(number_to_text(*number)),
        Cell::Bool(_) => Some(cell.to_string()),
    }
}

/// Orders cells numerically when both are numbers, else naturally by text.
pub(crate) fn compare_cells(left: &Cell, right: &Cell) -> Ordering {
    match (left, right) {
        (Cell::Number(a), Cell::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Cell::Empty, Cell::Empty) => Ordering::Equal,
        (Cell::Empty, _) => Ordering::Less,
        (_, Cell::Empty) => Ordering::Greater,
        _ => natural_cmp(&left.to_string(), &right.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::{ModelError, SheetLocation, Store};
    use crate::attribute::{Attribute, Field, Value};
    use crate::schema::{ModelDef, Orientation, SchemaBuilder};
    use crate::workbook::SourceKind;
    use std::sync::Arc;

    fn store() -> Store {
        let schema = SchemaBuilder::new()
            .model(
                ModelDef::new("Root")
                    .attribute(Attribute::slug("id"))
                    .attribute(Attribute::string("label").unique()),
            )
            .model(
                ModelDef::new("Leaf")
                    .attribute(Attribute::slug("id"))
                    .attribute(Attribute::integer("size"))
                    .attribute(Attribute::many_to_one("root", "Root").related_name("leaves"))
                    .ordering(["-size", "id"]),
            )
            .model(
                ModelDef::new("Setting")
                    .attribute(Attribute::slug("id"))
                    .attribute(Attribute::float("value"))
                    .orientation(Orientation::Column),
            )
            .build()
            .unwrap();
        Store::new(schema)
    }

    #[test]
    fn create_seeds_defaults_and_applies_kwargs() {
        let mut store = store();
        let root = store.create("Root", vec![("id", "root".into())]).unwrap();
        assert_eq!(store.value(root, "id").unwrap(), &Value::String("root".into()));
        assert_eq!(store.value(root, "label").unwrap(), &Value::String(String::new()));
        assert!(store.objects(root, "leaves").unwrap().is_empty());

        let setting = store.create("Setting", vec![]).unwrap();
        assert!(matches!(store.value(setting, "value").unwrap(), Value::Float(v) if v.is_nan()));
    }

    #[test]
    fn unknown_keyword_is_rejected_without_allocating() {
        let mut store = store();
        let error = store
            .create("Root", vec![("colour", "red".into())])
            .unwrap_err();
        assert_eq!(
            error,
            ModelError::InvalidKeyword {
                model: "Root".into(),
                keyword: "colour".into()
            }
        );
        assert!(store.is_empty());
    }

    #[test]
    fn model_id_from_another_schema_is_rejected() {
        let mut store = store();
        let wider = SchemaBuilder::new()
            .model(ModelDef::new("A").attribute(Attribute::slug("id")))
            .model(ModelDef::new("B").attribute(Attribute::slug("id")))
            .model(ModelDef::new("C").attribute(Attribute::slug("id")))
            .model(ModelDef::new("D").attribute(Attribute::slug("id")))
            .build()
            .unwrap();
        let foreign = wider.model_id("D").unwrap();
        let error = store.create_in(foreign, vec![]).unwrap_err();
        assert_eq!(error, ModelError::UnknownModel("#3".into()));
        assert!(store.is_empty());
    }

    #[test]
    fn relationship_kwargs_wire_both_sides() {
        let mut store = store();
        let root = store.create("Root", vec![("id", "root".into())]).unwrap();
        let leaf = store
            .create("Leaf", vec![("id", "leaf".into()), ("root", root.into())])
            .unwrap();
        assert_eq!(store.objects(root, "leaves").unwrap(), &[leaf]);
    }

    #[test]
    fn wrong_related_type_fails_and_discards_object() {
        let mut store = store();
        let setting = store.create("Setting", vec![]).unwrap();
        let error = store
            .create("Leaf", vec![("root", setting.into())])
            .unwrap_err();
        assert!(matches!(error, ModelError::WrongRelatedType { .. }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_unlinks_and_invalidates() {
        let mut store = store();
        let root = store.create("Root", vec![("id", "root".into())]).unwrap();
        let leaf = store.create("Leaf", vec![("root", root.into())]).unwrap();
        store.delete(leaf).unwrap();
        assert!(store.objects(root, "leaves").unwrap().is_empty());
        assert_eq!(store.get(leaf, "id").unwrap_err(), ModelError::DeletedObject(leaf));
    }

    #[test]
    fn serialize_and_display_use_primary_key() {
        let mut store = store();
        let root = store.create("Root", vec![("id", "root_1".into())]).unwrap();
        assert_eq!(store.serialize(root).as_deref(), Some("root_1"));
        assert_eq!(store.display(root), "<Root: root_1>");
    }

    #[test]
    fn sort_follows_ordering_with_descending_keys() {
        let mut store = store();
        let a = store
            .create("Leaf", vec![("id", "a".into()), ("size", Field::Value(Value::Integer(1)))])
            .unwrap();
        let b = store
            .create("Leaf", vec![("id", "b".into()), ("size", Field::Value(Value::Integer(5)))])
            .unwrap();
        let c = store
            .create("Leaf", vec![("id", "c".into()), ("size", Field::Value(Value::Integer(5)))])
            .unwrap();
        let leaf = store.schema().model_id("Leaf").unwrap();
        let mut objects = vec![a, c, b];
        store.sort(leaf, &mut objects).unwrap();
        assert_eq!(objects, vec![b, c, a]);
    }

    #[test]
    fn location_report_depends_on_source_kind_and_orientation() {
        let mut store = store();
        let leaf = store.create("Leaf", vec![]).unwrap();
        let setting = store.create("Setting", vec![]).unwrap();
        assert_eq!(
            store.location_report(leaf, "id").unwrap_err(),
            ModelError::LocationUnavailable(leaf)
        );

        let seq = vec![Some("id".to_string()), Some("size".to_string())];
        store
            .set_location(
                leaf,
                Arc::new(SheetLocation {
                    path: "model.xlsx".into(),
                    sheet: "Leaves".into(),
                    kind: SourceKind::Spreadsheet,
                    attribute_seq: seq.clone(),
                }),
                2,
            )
            .unwrap();
        assert_eq!(store.location_report(leaf, "size").unwrap(), "model.xlsx:Leaves:B3");

        store
            .set_location(
                setting,
                Arc::new(SheetLocation {
                    path: "/tmp/data/model-Setting.csv".into(),
                    sheet: "Setting".into(),
                    kind: SourceKind::Delimited,
                    attribute_seq: vec![Some("id".to_string()), Some("value".to_string())],
                }),
                1,
            )
            .unwrap();
        assert_eq!(
            store.location_report(setting, "value").unwrap(),
            "model-Setting.csv:Setting:2,2"
        );
    }
}
