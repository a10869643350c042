//! Data-level validation reports.
//!
//! # Responsibility
//! - Carry every coercion, constraint and uniqueness failure as a value.
//! - Render reports as indented text trees that name the attribute, the
//!   file location and each message.
//!
//! # Invariants
//! - These are never raised for programmer mistakes; those are typed errors
//!   (`SchemaError`, `ModelError`).
//! - An `InvalidObjectSet` never holds two `InvalidModel` entries for the
//!   same model.

use crate::schema::ModelId;
use crate::store::{ModelError, ModelResult, ObjectId};
use crate::util::{indent_forest, natural_cmp, Forest};
use std::collections::{BTreeMap, HashSet};
use std::fmt::{Display, Formatter};

/// One attribute's failure, optionally tagged with its file location.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidAttribute {
    /// Attribute name, or the mirror name when `related` is set.
    pub attribute: String,
    pub messages: Vec<String>,
    /// Whether the error is about the mirrored side of a relationship.
    pub related: bool,
    /// Rendered cell location such as `file.csv:Sheet:3,2`.
    pub location: Option<String>,
    /// Raw input that failed to load.
    pub value: Option<String>,
}

impl InvalidAttribute {
    pub fn new(attribute: impl Into<String>, messages: Vec<String>) -> Self {
        Self {
            attribute: attribute.into(),
            messages,
            related: false,
            location: None,
            value: None,
        }
    }

    /// Tags the error with the cell it was read from.
    pub fn set_location_and_value(&mut self, location: impl Into<String>, value: Option<String>) {
        self.location = Some(location.into());
        self.value = Some(value.unwrap_or_default());
    }

    fn forest(&self) -> Vec<Forest> {
        let mut head = format!("'{}':", self.attribute);
        if let Some(value) = &self.value {
            head.push_str(&format!("'{value}'"));
        }

        let messages = self
            .messages
            .iter()
            .map(|message| Forest::leaf(message.trim_end()))
            .collect::<Vec<_>>();
        let body = match &self.location {
            Some(location) if !location.is_empty() => {
                Forest::node([Forest::leaf(location.clone()), Forest::Node(messages)])
            }
            _ => Forest::Node(messages),
        };
        vec![Forest::Leaf(head), body]
    }
}

impl Display for InvalidAttribute {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", indent_forest(&self.forest()))
    }
}

fn attribute_forest(attributes: &[InvalidAttribute]) -> Vec<Forest> {
    let mut sorted = attributes.iter().collect::<Vec<_>>();
    sorted.sort_by(|a, b| natural_cmp(&a.attribute, &b.attribute));
    sorted.into_iter().flat_map(InvalidAttribute::forest).collect()
}

/// Failures of a single instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidObject {
    pub object: ObjectId,
    pub model: ModelId,
    pub model_name: String,
    /// Primary key at the time of the check, used to order reports.
    pub primary_key: Option<String>,
    pub attributes: Vec<InvalidAttribute>,
}

impl Display for InvalidObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", indent_forest(&attribute_forest(&self.attributes)))
    }
}

/// Collection-level failures (uniqueness) of one model.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidModel {
    pub model: ModelId,
    pub model_name: String,
    pub attributes: Vec<InvalidAttribute>,
}

impl Display for InvalidModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", indent_forest(&attribute_forest(&self.attributes)))
    }
}

/// Aggregated result of validating a batch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InvalidObjectSet {
    pub invalid_objects: Vec<InvalidObject>,
    pub invalid_models: Vec<InvalidModel>,
}

impl InvalidObjectSet {
    /// Builds a report; fails when two model reports target the same model.
    pub fn new(
        invalid_objects: Vec<InvalidObject>,
        invalid_models: Vec<InvalidModel>,
    ) -> ModelResult<Self> {
        let mut seen = HashSet::new();
        let mut duplicates = invalid_models
            .iter()
            .filter(|invalid| !seen.insert(invalid.model))
            .map(|invalid| invalid.model_name.clone())
            .collect::<Vec<_>>();
        if !duplicates.is_empty() {
            duplicates.dedup();
            return Err(ModelError::DuplicateInvalidModels(duplicates));
        }
        Ok(Self {
            invalid_objects,
            invalid_models,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.invalid_objects.is_empty() && self.invalid_models.is_empty()
    }

    /// Object reports grouped by model name.
    pub fn object_errors_by_model(&self) -> BTreeMap<&str, Vec<&InvalidObject>> {
        let mut grouped: BTreeMap<&str, Vec<&InvalidObject>> = BTreeMap::new();
        for invalid in &self.invalid_objects {
            grouped
                .entry(invalid.model_name.as_str())
                .or_default()
                .push(invalid);
        }
        grouped
    }

    pub fn model_error(&self, model_name: &str) -> Option<&InvalidModel> {
        self.invalid_models
            .iter()
            .find(|invalid| invalid.model_name == model_name)
    }
}

impl Display for InvalidObjectSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let object_errors = self.object_errors_by_model();
        let mut names = object_errors.keys().copied().collect::<Vec<_>>();
        for invalid in &self.invalid_models {
            if !names.contains(&invalid.model_name.as_str()) {
                names.push(invalid.model_name.as_str());
            }
        }
        names.sort_by(|a, b| natural_cmp(a, b));

        let mut forest = Vec::new();
        for name in names {
            forest.push(Forest::leaf(format!("{name}:")));
            if let Some(invalid) = self.model_error(name) {
                forest.push(Forest::node([Forest::leaf(invalid.to_string())]));
            }
            if let Some(objects) = object_errors.get(name) {
                let mut objects = objects.clone();
                objects.sort_by(|a, b| {
                    natural_cmp(
                        a.primary_key.as_deref().unwrap_or_default(),
                        b.primary_key.as_deref().unwrap_or_default(),
                    )
                });
                forest.push(Forest::node(
                    objects
                        .into_iter()
                        .map(|invalid| Forest::leaf(invalid.to_string())),
                ));
            }
        }
        write!(f, "{}", indent_forest(&forest))
    }
}

/// Structural problems of one worksheet or delimited file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidWorksheet {
    pub source: String,
    pub sheet: String,
    pub errors: Vec<String>,
}

impl Display for InvalidWorksheet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let forest = vec![
            Forest::leaf(format!("'{}':'{}':", self.source, self.sheet)),
            Forest::node(self.errors.iter().cloned().map(Forest::Leaf)),
        ];
        write!(f, "{}", indent_forest(&forest))
    }
}

#[cfg(test)]
mod tests {
    use super::{InvalidAttribute, InvalidModel, InvalidObject, InvalidObjectSet, InvalidWorksheet};
    use crate::schema::ModelId;
    use crate::store::{ModelError, ObjectId};

    fn object_error(primary_key: &str, attribute: &str, message: &str) -> InvalidObject {
        InvalidObject {
            object: ObjectId::from_index(0),
            model: ModelId::from_index(0),
            model_name: "Leaf".to_string(),
            primary_key: Some(primary_key.to_string()),
            attributes: vec![InvalidAttribute::new(attribute, vec![message.to_string()])],
        }
    }

    #[test]
    fn attribute_report_includes_value_and_location() {
        let mut error = InvalidAttribute::new("size", vec!["Value must be a `float`".to_string()]);
        error.set_location_and_value("'leaves.csv':'Leaves':2,3", Some("big".to_string()));
        assert_eq!(
            error.to_string(),
            "'size':'big'\n  'leaves.csv':'Leaves':2,3\n    Value must be a `float`"
        );
    }

    #[test]
    fn object_set_groups_by_model_and_sorts_by_key() {
        let set = InvalidObjectSet::new(
            vec![
                object_error("leaf_10", "size", "bad"),
                object_error("leaf_2", "size", "worse"),
            ],
            vec![InvalidModel {
                model: ModelId::from_index(0),
                model_name: "Leaf".to_string(),
                attributes: vec![InvalidAttribute::new("id", vec!["repeated".to_string()])],
            }],
        )
        .unwrap();
        assert_eq!(
            set.to_string(),
            "Leaf:\n  'id':\n    repeated\n  'size':\n    worse\n  'size':\n    bad"
        );
    }

    #[test]
    fn duplicate_model_reports_are_rejected() {
        let model = InvalidModel {
            model: ModelId::from_index(1),
            model_name: "Root".to_string(),
            attributes: Vec::new(),
        };
        let error = InvalidObjectSet::new(Vec::new(), vec![model.clone(), model]).unwrap_err();
        assert!(matches!(error, ModelError::DuplicateInvalidModels(names) if names == vec!["Root"]));
    }

    #[test]
    fn worksheet_report_names_source_and_sheet() {
        let error = InvalidWorksheet {
            source: "model.csv".to_string(),
            sheet: "Leaves".to_string(),
            errors: vec!["Duplicate, case insensitive, header fields: 'a', 'A'".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "'model.csv':'Leaves':\n  Duplicate, case insensitive, header fields: 'a', 'A'"
        );
    }
}
