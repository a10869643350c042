//! Object graph → worksheets.

use crate::attribute::Field;
use crate::codec::{check_models, create_worksheet_style, CodecResult, WriterMetadata};
use crate::schema::{Model, ModelId, Orientation};
use crate::store::{ObjectId, Store};
use crate::util::{natural_cmp, natural_sort_by_key, natural_sorted};
use crate::validator::Validator;
use crate::workbook::{get_writer, Cell, SheetWriter, Worksheet};
use log::{info, warn};
use std::collections::{BTreeMap, HashSet};

/// Writes object graphs, one worksheet per non-inline model.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    metadata: WriterMetadata,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(metadata: WriterMetadata) -> Self {
        Self { metadata }
    }

    /// Writes `objects` and everything reachable from them to `path`.
    ///
    /// # Contract
    /// - Sheets for `models` come first, in the given order; other models
    ///   with objects follow, natural-sorted by verbose name.
    /// - Invalid objects are written anyway, with a warning.
    pub fn run(
        &self,
        path: &str,
        store: &Store,
        objects: &[ObjectId],
        models: &[ModelId],
    ) -> CodecResult<()> {
        let mut writer = get_writer(path)?;
        self.write_to(writer.as_mut(), store, objects, models)?;
        info!("event=model_write module=codec status=ok path={path}");
        Ok(())
    }

    /// Same as `run`, against an already opened sheet writer.
    pub fn write_to(
        &self,
        writer: &mut dyn SheetWriter,
        store: &Store,
        objects: &[ObjectId],
        models: &[ModelId],
    ) -> CodecResult<()> {
        check_models(store.schema(), models)?;
        let mut seen = HashSet::new();
        let mut all_objects = Vec::new();
        for obj in objects {
            for candidate in std::iter::once(*obj).chain(store.get_related(*obj)?) {
                if seen.insert(candidate) {
                    all_objects.push(candidate);
                }
            }
        }

        if let Some(invalid) = Validator::new().validate(store, &all_objects)? {
            warn!(
                "event=model_write module=codec status=warn reason=invalid_objects \
                 message=\"Storage may be lossy because the objects are not valid\" invalid_objects={} invalid_models={}",
                invalid.invalid_objects.len(),
                invalid.invalid_models.len()
            );
        }

        let mut grouped: BTreeMap<ModelId, Vec<ObjectId>> = BTreeMap::new();
        for obj in &all_objects {
            grouped.entry(store.model_id_of(*obj)?).or_default().push(*obj);
        }

        let schema = store.schema();
        let mut unordered = grouped
            .keys()
            .filter(|model| !models.contains(model))
            .copied()
            .collect::<Vec<_>>();
        unordered.sort_by(|a, b| natural_cmp(&schema.get(*a).verbose_name, &schema.get(*b).verbose_name));

        writer.initialize(&self.metadata)?;
        for model_id in models.iter().chain(unordered.iter()) {
            let model = schema.get(*model_id);
            if model.is_inline() {
                continue;
            }
            let mut members = grouped.get(model_id).cloned().unwrap_or_default();
            natural_sort_by_key(&mut members, |obj| store.serialize(*obj).unwrap_or_default());
            let grid = model_grid(store, model, &members)?;
            writer.write_worksheet(model.sheet_name(), &grid, Some(&create_worksheet_style(model)))?;
        }
        writer.finalize()?;
        Ok(())
    }
}

/// Header plus one record per object, transposed for column models.
fn model_grid(store: &Store, model: &Model, objects: &[ObjectId]) -> CodecResult<Worksheet> {
    let attributes = model.ordered_attributes();
    let mut rows: Worksheet = Vec::with_capacity(objects.len() + 1);
    rows.push(
        attributes
            .iter()
            .map(|attr| Cell::Text(attr.verbose_name.clone()))
            .collect(),
    );
    for obj in objects {
        let mut record = Vec::with_capacity(attributes.len());
        for attr in &attributes {
            let field = store.get(*obj, &attr.name)?;
            let cell = match (field, attr.relation()) {
                (Field::Value(value), _) => attr.serialize_value(value),
                (field, Some(relation)) => match &relation.inline {
                    Some(codec) => text_cell(codec.serialize(store, &field.linked())),
                    None => text_cell(related_keys(store, &field.linked())),
                },
                (_, None) => Cell::Empty,
            };
            record.push(cell);
        }
        rows.push(record);
    }

    if model.orientation == Orientation::Column {
        return Ok(transpose(&rows));
    }
    Ok(rows)
}

fn related_keys(store: &Store, peers: &[ObjectId]) -> String {
    natural_sorted(peers.iter().filter_map(|peer| store.serialize(*peer))).join(", ")
}

fn text_cell(text: String) -> Cell {
    if text.is_empty() {
        Cell::Empty
    } else {
        Cell::Text(text)
    }
}

fn transpose(rows: &Worksheet) -> Worksheet {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    (0..width)
        .map(|column| {
            rows.iter()
                .map(|row| row.get(column).cloned().unwrap_or_default())
                .collect()
        })
        .collect()
}
