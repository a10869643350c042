//! Worksheets → object graph.
//!
//! # Responsibility
//! - Map worksheets to models and header cells to attributes.
//! - Phase 1: create one object per record and decode its scalar cells.
//! - Phase 2: resolve relationship cells against every phase-1 object.
//! - Validate the loaded graph before handing it out.
//!
//! # Invariants
//! - Relationship cells are only resolved after every sheet is parsed, so
//!   sheet order never matters.
//! - Every cell-level error carries its `file:sheet:cell` location.

use crate::attribute::{Attribute, Field, Side};
use crate::codec::{check_models, CodecError, CodecResult, ReaderOptions};
use crate::invalid::{InvalidAttribute, InvalidObject, InvalidObjectSet, InvalidWorksheet};
use crate::schema::{Model, ModelId, Orientation, Schema};
use crate::store::{cell_key, ModelError, ObjectId, SheetLocation, Store};
use crate::util::{excel_col_name, indent_forest, natural_cmp, natural_sorted, quote, Forest};
use crate::validator::Validator;
use crate::workbook::{get_reader, Cell, SheetReader, SourceKind, Worksheet};
use log::{info, warn};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

/// Result of a successful read.
#[derive(Debug)]
pub struct LoadedObjects {
    pub store: Store,
    /// Loaded objects by exact model; every requested model has an entry.
    pub objects: BTreeMap<ModelId, Vec<ObjectId>>,
}

impl LoadedObjects {
    pub fn of(&self, model: ModelId) -> &[ObjectId] {
        self.objects.get(&model).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn by_name(&self, model: &str) -> &[ObjectId] {
        match self.store.schema().model_id(model) {
            Some(id) => self.of(id),
            None => &[],
        }
    }
}

/// Reads model files written by `Writer` (or by hand).
#[derive(Debug, Clone, Copy, Default)]
pub struct Reader {
    options: ReaderOptions,
}

/// Parsed sheet of one model.
struct Table {
    model: ModelId,
    /// Attribute name per header cell; `None` for ignored headers.
    attributes: Vec<Option<String>>,
    records: Vec<(ObjectId, Vec<Cell>)>,
}

/// Rendered errors by model name.
type ErrorsByModel = BTreeMap<String, Vec<String>>;

impl Reader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ReaderOptions) -> Self {
        Self { options }
    }

    /// Reads the file(s) at `path` into a fresh store over `schema`.
    ///
    /// # Contract
    /// - Only sheets of `models` are read; inline models are rebuilt by
    ///   their owners' codecs.
    /// - Any header, cell, relationship or validation error aborts the read
    ///   with one aggregated report.
    pub fn run(
        &self,
        path: &str,
        schema: &Arc<Schema>,
        models: &[ModelId],
    ) -> CodecResult<LoadedObjects> {
        let source = get_reader(path)?;
        self.read_from(source.as_ref(), schema, models)
    }

    /// Same as `run`, against an already opened sheet reader.
    pub fn read_from(
        &self,
        source: &dyn SheetReader,
        schema: &Arc<Schema>,
        models: &[ModelId],
    ) -> CodecResult<LoadedObjects> {
        check_models(schema, models)?;
        let readable = models
            .iter()
            .copied()
            .filter(|model| !schema.get(*model).is_inline())
            .collect::<Vec<_>>();
        let sheet_names = source.sheet_names()?;
        let assignments = self.assign_sheets(source, schema, &readable, &sheet_names)?;

        let mut store = Store::new(Arc::clone(schema));
        let mut errors = ErrorsByModel::new();
        let mut tables = Vec::with_capacity(assignments.len());
        for (model, sheet) in assignments {
            match self.read_table(source, &mut store, model, &sheet)? {
                Ok((table, invalid_objects)) => {
                    push_errors(&mut errors, schema.get(model), invalid_objects);
                    tables.push(table);
                }
                Err(invalid_sheet) => errors
                    .entry(schema.get(model).name.clone())
                    .or_default()
                    .push(invalid_sheet.to_string()),
            }
        }
        if !errors.is_empty() {
            return Err(parse_error(source, errors));
        }

        let index = key_index(&store, &tables);
        for table in &tables {
            let invalid_objects = link_table(&mut store, table, &index)?;
            push_errors(&mut errors, schema.get(table.model), invalid_objects);
        }
        if !errors.is_empty() {
            return Err(parse_error(source, errors));
        }

        let all_objects = store.ids();
        if let Some(mut invalid) = Validator::new().run(&mut store, &all_objects)? {
            tag_locations(&store, &mut invalid);
            warn!(
                "event=model_read module=codec status=error reason=validation source={}",
                source.display_name()
            );
            return Err(CodecError::Validation(invalid));
        }

        let mut objects: BTreeMap<ModelId, Vec<ObjectId>> =
            models.iter().map(|model| (*model, Vec::new())).collect();
        for obj in store.ids() {
            objects.entry(store.model_id_of(obj)?).or_default().push(obj);
        }
        info!(
            "event=model_read module=codec status=ok source={} sheets={} objects={}",
            source.display_name(),
            tables.len(),
            store.len()
        );
        Ok(LoadedObjects { store, objects })
    }

    /// Pairs each worksheet with the one model it names.
    fn assign_sheets(
        &self,
        source: &dyn SheetReader,
        schema: &Schema,
        models: &[ModelId],
        sheet_names: &[String],
    ) -> CodecResult<Vec<(ModelId, String)>> {
        let mut ambiguous = get_ambiguous_sheet_names(sheet_names, schema, models)
            .into_iter()
            .collect::<Vec<_>>();

        let mut assignments: Vec<(ModelId, String)> = Vec::new();
        let mut extra = Vec::new();
        for sheet in sheet_names {
            match matching_models(sheet, schema, models).as_slice() {
                [model] => assignments.push((*model, sheet.clone())),
                [] => extra.push(sheet.clone()),
                _ => {}
            }
        }
        for model in models {
            let sheets = assignments
                .iter()
                .filter(|(assigned, _)| assigned == model)
                .map(|(_, sheet)| sheet.clone())
                .collect::<Vec<_>>();
            if sheets.len() > 1 {
                ambiguous.push((sheets.join(", "), vec![schema.get(*model).name.clone()]));
            }
        }
        if !ambiguous.is_empty() {
            return Err(CodecError::AmbiguousSheets(ambiguous));
        }

        if !extra.is_empty() {
            if !self.options.ignore_other_sheets {
                return Err(CodecError::ExtraSheets {
                    source: source.display_name(),
                    sheets: natural_sorted(extra),
                });
            }
            info!(
                "event=model_read module=codec status=ok ignored_sheets={}",
                extra.join("|")
            );
        }
        Ok(assignments)
    }

    /// Phase 1 for one sheet: headers, then one object per record with its
    /// scalar cells decoded.
    fn read_table(
        &self,
        source: &dyn SheetReader,
        store: &mut Store,
        model_id: ModelId,
        sheet: &str,
    ) -> CodecResult<Result<(Table, Vec<InvalidObject>), InvalidWorksheet>> {
        let schema = Arc::clone(store.schema());
        let model = schema.get(model_id);
        let grid = source.read_worksheet(sheet)?;
        let (headers, records) = split_table(&grid, model.orientation);

        let sheet_path = source.sheet_path(sheet);
        let attributes = match self.match_headers(model, &headers, source.kind()) {
            Ok(attributes) => attributes,
            Err(errors) => {
                return Ok(Err(InvalidWorksheet {
                    source: file_name(&sheet_path),
                    sheet: sheet.to_string(),
                    errors,
                }))
            }
        };

        let location = Arc::new(SheetLocation {
            path: sheet_path,
            sheet: sheet.to_string(),
            kind: source.kind(),
            attribute_seq: attributes.clone(),
        });

        let mut table = Table {
            model: model_id,
            attributes,
            records: Vec::with_capacity(records.len()),
        };
        let mut invalid_objects = Vec::new();
        for (position, cells) in records.into_iter().enumerate() {
            if cells.iter().all(Cell::is_empty) {
                continue;
            }
            let obj = store.create_in(model_id, Vec::new())?;
            store.set_location(obj, Arc::clone(&location), position + 1)?;

            let mut errors = Vec::new();
            for (name, cell) in table.attributes.iter().zip(cells.iter()) {
                let Some(attr) = name.as_deref().and_then(|name| model.attribute(name)) else {
                    continue;
                };
                if attr.is_related() {
                    continue;
                }
                let outcome = attr.deserialize_value(cell).and_then(|value| {
                    match attr.validate_value(&value) {
                        Some(error) => Err(error),
                        None => Ok(value),
                    }
                });
                match outcome {
                    Ok(value) => store.set(obj, &attr.name, Field::Value(value))?,
                    Err(mut error) => {
                        error.set_location_and_value(
                            store.location_report(obj, &attr.name)?,
                            Some(cell.to_string()),
                        );
                        errors.push(error);
                    }
                }
            }
            invalid_objects.extend(invalid_object(store, obj, model, errors));
            table.records.push((obj, cells));
        }
        Ok(Ok((table, invalid_objects)))
    }

    /// Attribute name per header cell, or every header problem found.
    fn match_headers(
        &self,
        model: &Model,
        headers: &[Cell],
        kind: SourceKind,
    ) -> Result<Vec<Option<String>>, Vec<String>> {
        let mut errors = Vec::new();
        let mut attributes = Vec::with_capacity(headers.len());
        for (index, header) in headers.iter().enumerate() {
            let (row, column) = match model.orientation {
                Orientation::Column => (index + 1, 1),
                _ => (1, index + 1),
            };
            let column = match kind {
                SourceKind::Spreadsheet => excel_col_name(column),
                SourceKind::Delimited => column.to_string(),
            };
            let text = header.to_string();
            if text.trim().is_empty() {
                let what = match model.orientation {
                    Orientation::Column => "row(s)",
                    _ => "column(s)",
                };
                errors.push(format!(
                    "Empty header field in row {row}, col {column} - delete empty {what}"
                ));
                attributes.push(None);
                continue;
            }
            match match_attribute(model, text.trim()) {
                Some(attr) => attributes.push(Some(attr.name.clone())),
                None if self.options.ignore_extra_attributes => attributes.push(None),
                None => {
                    errors.push(format!(
                        "Header '{text}' in row {row}, col {column} does not match any attribute"
                    ));
                    attributes.push(None);
                }
            }
        }

        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for header in headers.iter().map(Cell::to_string) {
            if !header.trim().is_empty() {
                groups.entry(header.trim().to_lowercase()).or_default().push(header);
            }
        }
        for group in groups.values().filter(|group| group.len() > 1) {
            errors.push(format!(
                "Duplicate, case insensitive, header fields: {}",
                group
                    .iter()
                    .map(|header| format!("'{header}'"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }

        if errors.is_empty() {
            Ok(attributes)
        } else {
            Err(errors)
        }
    }
}

/// Sheets matched by more than one of `models`, with the matching model
/// names.
pub fn get_ambiguous_sheet_names(
    sheet_names: &[String],
    schema: &Schema,
    models: &[ModelId],
) -> BTreeMap<String, Vec<String>> {
    sheet_names
        .iter()
        .filter_map(|sheet| {
            let matches = matching_models(sheet, schema, models);
            if matches.len() < 2 {
                return None;
            }
            let names = matches
                .iter()
                .map(|model| schema.get(*model).name.clone())
                .collect();
            Some((sheet.clone(), names))
        })
        .collect()
}

fn matching_models(sheet: &str, schema: &Schema, models: &[ModelId]) -> Vec<ModelId> {
    let sheet = sheet.to_lowercase();
    models
        .iter()
        .copied()
        .filter(|model| {
            schema
                .possible_sheet_names(*model)
                .iter()
                .any(|name| name.to_lowercase() == sheet)
        })
        .collect()
}

/// Exact name first, then name or verbose name ignoring case.
fn match_attribute<'a>(model: &'a Model, header: &str) -> Option<&'a Attribute> {
    model.attribute(header).or_else(|| {
        let lower = header.to_lowercase();
        model.attributes.iter().find(|attr| {
            attr.name.to_lowercase() == lower || attr.verbose_name.to_lowercase() == lower
        })
    })
}

/// Header cells and records; column models are read column by column.
fn split_table(grid: &Worksheet, orientation: Orientation) -> (Vec<Cell>, Vec<Vec<Cell>>) {
    let cell = |row: usize, column: usize| {
        grid.get(row)
            .and_then(|cells| cells.get(column))
            .cloned()
            .unwrap_or_default()
    };
    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    match orientation {
        Orientation::Column => {
            let headers = (0..grid.len()).map(|row| cell(row, 0)).collect();
            let records = (1..width)
                .map(|column| (0..grid.len()).map(|row| cell(row, column)).collect())
                .collect();
            (headers, records)
        }
        _ => {
            let headers = (0..width).map(|column| cell(0, column)).collect();
            let records = (1..grid.len())
                .map(|row| (0..width).map(|column| cell(row, column)).collect())
                .collect();
            (headers, records)
        }
    }
}

/// Phase-1 objects by exact model and external key.
fn key_index(store: &Store, tables: &[Table]) -> HashMap<ModelId, HashMap<String, Vec<ObjectId>>> {
    let mut index: HashMap<ModelId, HashMap<String, Vec<ObjectId>>> = HashMap::new();
    for table in tables {
        let keys = index.entry(table.model).or_default();
        for (obj, _) in &table.records {
            if let Some(key) = store.serialize(*obj) {
                keys.entry(key).or_default().push(*obj);
            }
        }
    }
    index
}

/// Phase 2 for one sheet: resolve and assign every relationship cell.
fn link_table(
    store: &mut Store,
    table: &Table,
    index: &HashMap<ModelId, HashMap<String, Vec<ObjectId>>>,
) -> CodecResult<Vec<InvalidObject>> {
    let schema = Arc::clone(store.schema());
    let model = schema.get(table.model);
    let mut invalid_objects = Vec::new();
    for (obj, cells) in &table.records {
        let mut errors = Vec::new();
        for (name, cell) in table.attributes.iter().zip(cells.iter()) {
            let Some(attr) = name.as_deref().and_then(|name| model.attribute(name)) else {
                continue;
            };
            let Some(relation) = attr.relation() else {
                continue;
            };
            let Some(text) = cell_key(cell) else {
                continue;
            };
            let many = relation.cardinality.is_many(Side::Forward);

            let resolved = match &relation.inline {
                Some(codec) => codec.deserialize(store, relation.related_model(), &text),
                None => resolve_keys(&schema, index, attr, &text, many),
            };
            let peers = match resolved {
                Ok(peers) => peers,
                Err(messages) => {
                    errors.push(cell_error(store, *obj, attr, messages, text)?);
                    continue;
                }
            };
            let field = if many {
                Field::Objects(peers)
            } else {
                Field::Object(peers.first().copied())
            };
            match store.set(*obj, &attr.name, field) {
                Ok(()) => {}
                Err(err @ ModelError::OccupiedOneToOne { .. }) => {
                    errors.push(cell_error(store, *obj, attr, vec![err.to_string()], text)?);
                }
                Err(err) => return Err(err.into()),
            }
        }
        invalid_objects.extend(invalid_object(store, *obj, model, errors));
    }
    Ok(invalid_objects)
}

/// Looks up each key among objects of the related class and its
/// subclasses.
fn resolve_keys(
    schema: &Schema,
    index: &HashMap<ModelId, HashMap<String, Vec<ObjectId>>>,
    attr: &Attribute,
    text: &str,
    many: bool,
) -> Result<Vec<ObjectId>, Vec<String>> {
    let Some(relation) = attr.relation() else {
        return Ok(Vec::new());
    };
    let related = schema.get(relation.related_model());
    let keys: Vec<&str> = if many {
        text.split(',').map(str::trim).filter(|key| !key.is_empty()).collect()
    } else {
        vec![text.trim()]
    };

    let mut peers = Vec::with_capacity(keys.len());
    let mut errors = Vec::new();
    for key in keys {
        let matches = schema
            .subclasses(related.id)
            .iter()
            .filter_map(|class| index.get(class).and_then(|keys| keys.get(key)))
            .flatten()
            .copied()
            .collect::<Vec<_>>();
        match matches.as_slice() {
            [peer] => peers.push(*peer),
            [] => errors.push(format!(
                "Unable to find {} with {}={}",
                related.name,
                related.primary().map(|primary| primary.name.as_str()).unwrap_or("key"),
                quote(key)
            )),
            _ => errors.push(format!(
                "Multiple matching objects with primary attribute = {key}"
            )),
        }
    }
    if errors.is_empty() {
        Ok(peers)
    } else {
        Err(errors)
    }
}

fn cell_error(
    store: &Store,
    obj: ObjectId,
    attr: &Attribute,
    messages: Vec<String>,
    text: String,
) -> CodecResult<InvalidAttribute> {
    let mut error = attr.invalid(messages);
    error.set_location_and_value(store.location_report(obj, &attr.name)?, Some(text));
    Ok(error)
}

fn invalid_object(
    store: &Store,
    obj: ObjectId,
    model: &Model,
    errors: Vec<InvalidAttribute>,
) -> Option<InvalidObject> {
    if errors.is_empty() {
        return None;
    }
    Some(InvalidObject {
        object: obj,
        model: model.id,
        model_name: model.name.clone(),
        primary_key: store.serialize(obj),
        attributes: errors,
    })
}

fn push_errors(errors: &mut ErrorsByModel, model: &Model, invalid_objects: Vec<InvalidObject>) {
    if invalid_objects.is_empty() {
        return;
    }
    errors
        .entry(model.name.clone())
        .or_default()
        .extend(invalid_objects.iter().map(ToString::to_string));
}

fn parse_error(source: &dyn SheetReader, errors: ErrorsByModel) -> CodecError {
    let mut models = errors.into_iter().collect::<Vec<_>>();
    models.sort_by(|(a, _), (b, _)| natural_cmp(a, b));

    let mut sections = Vec::new();
    for (model, messages) in models {
        sections.push(Forest::leaf(format!("{model}:")));
        sections.push(Forest::node(messages.into_iter().map(Forest::Leaf)));
    }
    let forest = vec![
        Forest::leaf(format!(
            "The model cannot be loaded because '{}' contains error(s):",
            source.display_name()
        )),
        Forest::Node(sections),
    ];
    warn!(
        "event=model_read module=codec status=error reason=parse source={}",
        source.display_name()
    );
    CodecError::Parse(indent_forest(&forest))
}

/// Adds file locations to validation errors of loaded objects.
fn tag_locations(store: &Store, invalid: &mut InvalidObjectSet) {
    for object in &mut invalid.invalid_objects {
        for error in &mut object.attributes {
            if error.location.is_none() && !error.related {
                if let Ok(location) = store.location_report(object.object, &error.attribute) {
                    error.location = Some(location);
                }
            }
        }
    }
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::{get_ambiguous_sheet_names, split_table, Reader};
    use crate::attribute::Attribute;
    use crate::codec::{CodecError, ReaderOptions};
    use crate::schema::{ModelDef, Orientation, SchemaBuilder};
    use crate::store::ModelError;
    use crate::workbook::{Cell, Workbook};
    use std::sync::Arc;

    fn schema() -> Arc<crate::schema::Schema> {
        SchemaBuilder::new()
            .model(ModelDef::new("Root").attribute(Attribute::slug("label")))
            .model(
                ModelDef::new("Leaf")
                    .attribute(Attribute::slug("id"))
                    .attribute(Attribute::many_to_one("root", "Root").related_name("leaves"))
                    .attribute(Attribute::float("size").with_max(3.0)),
            )
            .build()
            .unwrap()
    }

    fn cells(values: &[&str]) -> Vec<Cell> {
        values
            .iter()
            .map(|value| if value.is_empty() { Cell::Empty } else { Cell::from(*value) })
            .collect()
    }

    fn workbook(leaves: Vec<Vec<Cell>>) -> Workbook {
        let mut workbook = Workbook::delimited("model-*.csv");
        workbook.insert("Roots".to_string(), vec![cells(&["Label"]), cells(&["r"])]);
        workbook.insert("Leaves".to_string(), leaves);
        workbook
    }

    #[test]
    fn split_table_transposes_column_sheets() {
        let grid = vec![cells(&["Key", "a", "b"]), cells(&["Value", "1"])];
        let (headers, records) = split_table(&grid, Orientation::Column);
        assert_eq!(headers, cells(&["Key", "Value"]));
        assert_eq!(records, vec![cells(&["a", "1"]), cells(&["b", ""])]);
    }

    #[test]
    fn reads_and_links_objects() {
        let schema = schema();
        let source = workbook(vec![
            cells(&["Id", "Root", "Size"]),
            cells(&["leaf_1", "r", "2"]),
            cells(&["", "", ""]),
            cells(&["leaf_2", "r", ""]),
        ]);
        let loaded = Reader::new()
            .read_from(&source, &schema, &schema.models(false))
            .unwrap();
        let root = loaded.by_name("Root")[0];
        assert_eq!(loaded.by_name("Leaf").len(), 2);
        assert_eq!(loaded.store.objects(root, "leaves").unwrap().len(), 2);
        let leaf_2 = loaded.by_name("Leaf")[1];
        assert_eq!(
            loaded.store.location_report(leaf_2, "size").unwrap(),
            "model-Leaves.csv:Leaves:4,3"
        );
    }

    #[test]
    fn model_ids_from_another_schema_are_rejected() {
        let schema = schema();
        let wider = SchemaBuilder::new()
            .model(ModelDef::new("A").attribute(Attribute::slug("id")))
            .model(ModelDef::new("B").attribute(Attribute::slug("id")))
            .model(ModelDef::new("C").attribute(Attribute::slug("id")))
            .build()
            .unwrap();
        let source = workbook(vec![cells(&["Id"])]);
        let error = Reader::new()
            .read_from(&source, &schema, &[wider.model_id("C").unwrap()])
            .unwrap_err();
        assert!(matches!(
            error,
            CodecError::Model(ModelError::UnknownModel(ref id)) if id == "#2"
        ));
    }

    #[test]
    fn unknown_header_is_reported_with_position() {
        let schema = schema();
        let source = workbook(vec![cells(&["Id", "y"]), cells(&["leaf_1", "1"])]);
        let error = Reader::new()
            .read_from(&source, &schema, &schema.models(false))
            .unwrap_err();
        let message = error.to_string();
        assert!(message.contains("Header 'y' in row 1, col 2 does not match any attribute"));

        let loaded = Reader::with_options(ReaderOptions {
            ignore_extra_attributes: true,
            ..ReaderOptions::default()
        })
        .read_from(&source, &schema, &schema.models(false))
        .unwrap();
        assert_eq!(loaded.by_name("Leaf").len(), 1);
    }

    #[test]
    fn cell_and_relationship_errors_carry_locations() {
        let schema = schema();
        let source = workbook(vec![
            cells(&["Id", "Root", "Size"]),
            cells(&["leaf_1", "missing", "4"]),
        ]);
        let error = Reader::new()
            .read_from(&source, &schema, &schema.models(false))
            .unwrap_err();
        assert!(matches!(error, CodecError::Parse(_)));
        let message = error.to_string();
        assert!(message.starts_with("The model cannot be loaded because 'model-*.csv' contains error(s):"));
        assert!(message.contains("model-Leaves.csv:Leaves:2,3"));
        assert!(message.contains("Value must be at most 3"));

        let source = workbook(vec![
            cells(&["Id", "Root", "Size"]),
            cells(&["leaf_1", "missing", "1"]),
        ]);
        let message = Reader::new()
            .read_from(&source, &schema, &schema.models(false))
            .unwrap_err()
            .to_string();
        assert!(message.contains("Unable to find Root with label=missing"));
        assert!(message.contains("model-Leaves.csv:Leaves:2,2"));
    }

    #[test]
    fn extra_and_ambiguous_sheets() {
        let schema = schema();
        let mut source = workbook(vec![cells(&["Id"])]);
        source.insert("Notes".to_string(), vec![cells(&["x"])]);
        let error = Reader::new()
            .read_from(&source, &schema, &schema.models(false))
            .unwrap_err();
        assert!(matches!(error, CodecError::ExtraSheets { ref sheets, .. } if sheets == &vec!["Notes".to_string()]));

        let loaded = Reader::with_options(ReaderOptions {
            ignore_other_sheets: true,
            ..ReaderOptions::default()
        })
        .read_from(&source, &schema, &schema.models(false))
        .unwrap();
        assert!(loaded.by_name("Leaf").is_empty());

        let clash = SchemaBuilder::new()
            .model(ModelDef::new("Leaf").attribute(Attribute::slug("id")))
            .model(
                ModelDef::new("Leaves")
                    .attribute(Attribute::slug("id"))
                    .verbose_name_plural("Leaves list"),
            )
            .build()
            .unwrap();
        let ambiguous = get_ambiguous_sheet_names(
            &["Leaves".to_string(), "Leaf".to_string()],
            &clash,
            &clash.models(false),
        );
        assert_eq!(ambiguous.len(), 1);
        assert_eq!(ambiguous["Leaves"], vec!["Leaf", "Leaves"]);
    }

    #[test]
    fn repeated_primary_values_fail_validation() {
        let schema = schema();
        let source = workbook(vec![
            cells(&["Id", "Root"]),
            cells(&["node_2", "r"]),
            cells(&["node_2", "r"]),
        ]);
        let error = Reader::new()
            .read_from(&source, &schema, &schema.models(false))
            .unwrap_err();
        assert!(matches!(error, CodecError::Validation(_)));
        let message = error.to_string();
        assert!(message.starts_with("The model cannot be loaded because it fails to validate:"));
        assert!(message.contains("Leaf:"));
        assert!(message.contains("'node_2'"));
    }
}
