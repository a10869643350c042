//! Tabular encoding of object graphs.
//!
//! # Responsibility
//! - Write every model of an object graph to its own worksheet.
//! - Read worksheets back into a fresh store, resolving relationships only
//!   once every sheet has been parsed.
//! - Produce header-only templates and convert files between backends.
//!
//! # Invariants
//! - Inline models never get a worksheet; their owning relationship's
//!   `InlineCodec` carries them.
//! - A failed read returns one aggregated report naming sheet, row, column
//!   and message for every problem.
//!
//! # See also
//! - `workbook` for the grid backends.

pub mod inline;
pub mod reader;
pub mod writer;

use crate::invalid::InvalidObjectSet;
use crate::schema::{Model, ModelId, Orientation, Schema};
use crate::store::{ModelError, Store};
use crate::util::indent_forest;
use crate::util::Forest;
use crate::workbook::{self, WorkbookError, WorkbookStyle, WorksheetStyle};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub use crate::config::{ReaderOptions, WriterMetadata};
pub use inline::{InlineCodec, KeyListCodec};
pub use reader::{get_ambiguous_sheet_names, LoadedObjects, Reader};
pub use writer::Writer;

pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Debug)]
pub enum CodecError {
    Workbook(WorkbookError),
    Model(ModelError),
    /// Worksheets that match none of the requested models.
    ExtraSheets { source: String, sheets: Vec<String> },
    /// Worksheet name → every model it matches.
    AmbiguousSheets(Vec<(String, Vec<String>)>),
    /// Rendered report of header, cell and relationship errors.
    Parse(String),
    Validation(InvalidObjectSet),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Workbook(err) => write!(f, "{err}"),
            Self::Model(err) => write!(f, "{err}"),
            Self::ExtraSheets { source, sheets } => write!(
                f,
                "No matching models for worksheets/files {} / {}",
                source,
                sheets.join(", ")
            ),
            Self::AmbiguousSheets(sheets) => {
                let mut forest = vec![Forest::leaf(
                    "The following sheets cannot be unambiguously mapped to models:",
                )];
                forest.push(Forest::node(sheets.iter().map(|(sheet, models)| {
                    Forest::leaf(format!("{sheet}: {}", models.join(", ")))
                })));
                write!(f, "{}", indent_forest(&forest))
            }
            Self::Parse(report) => write!(f, "{report}"),
            Self::Validation(invalid) => {
                let forest = vec![
                    Forest::leaf("The model cannot be loaded because it fails to validate:"),
                    Forest::node([Forest::leaf(invalid.to_string())]),
                ];
                write!(f, "{}", indent_forest(&forest))
            }
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Workbook(err) => Some(err),
            Self::Model(err) => Some(err),
            _ => None,
        }
    }
}

impl From<WorkbookError> for CodecError {
    fn from(value: WorkbookError) -> Self {
        Self::Workbook(value)
    }
}

impl From<ModelError> for CodecError {
    fn from(value: ModelError) -> Self {
        Self::Model(value)
    }
}

/// Frozen, bold, grey header row (or column for column models).
pub fn create_worksheet_style(model: &Model) -> WorksheetStyle {
    let (head_rows, head_columns) = match model.orientation {
        Orientation::Column => (model.frozen_columns, 1),
        _ => (1, model.frozen_columns),
    };
    WorksheetStyle {
        head_rows,
        head_columns,
        head_row_font_bold: true,
        head_row_fill_pattern: "solid".to_string(),
        head_row_fill_fgcolor: "CCCCCC".to_string(),
        row_height: 15.0,
        ..WorksheetStyle::default()
    }
}

/// Rejects model ids that `schema` did not issue.
pub(crate) fn check_models(schema: &Schema, models: &[ModelId]) -> CodecResult<()> {
    match models.iter().find(|model| schema.try_get(**model).is_none()) {
        Some(model) => Err(ModelError::UnknownModel(format!("#{}", model.index())).into()),
        None => Ok(()),
    }
}

/// Sheet order and styles for `models`, skipping inline ones.
pub(crate) fn sheet_layout(schema: &Schema, models: &[ModelId]) -> (Vec<String>, WorkbookStyle) {
    let mut order = Vec::new();
    let mut style = WorkbookStyle::new();
    for model in models.iter().map(|id| schema.get(*id)) {
        if model.is_inline() {
            continue;
        }
        order.push(model.sheet_name().to_string());
        style.insert(model.sheet_name(), create_worksheet_style(model));
    }
    (order, style)
}

/// Writes header-only sheets for `models`.
pub fn create_template(
    path: &str,
    schema: &Arc<Schema>,
    models: &[ModelId],
    metadata: WriterMetadata,
) -> CodecResult<()> {
    let store = Store::new(Arc::clone(schema));
    Writer::with_metadata(metadata).run(path, &store, &[], models)
}

/// Converts `source` to `destination`, putting the sheets of `models`
/// first and styling them like the writer does.
pub fn convert(
    source: &str,
    destination: &str,
    schema: &Schema,
    models: &[ModelId],
) -> CodecResult<()> {
    check_models(schema, models)?;
    let (order, style) = sheet_layout(schema, models);
    workbook::convert(source, destination, &order, &style)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{create_worksheet_style, sheet_layout, CodecError};
    use crate::attribute::Attribute;
    use crate::schema::{ModelDef, Orientation, SchemaBuilder};

    #[test]
    fn styles_freeze_header_by_orientation() {
        let schema = SchemaBuilder::new()
            .model(ModelDef::new("Leaf").attribute(Attribute::slug("id")).frozen_columns(2))
            .model(
                ModelDef::new("Setting")
                    .attribute(Attribute::slug("key"))
                    .orientation(Orientation::Column),
            )
            .build()
            .unwrap();
        let leaf = create_worksheet_style(schema.model("Leaf").unwrap());
        assert_eq!((leaf.head_rows, leaf.head_columns), (1, 2));
        assert!(leaf.head_row_font_bold);
        let setting = create_worksheet_style(schema.model("Setting").unwrap());
        assert_eq!((setting.head_rows, setting.head_columns), (1, 1));

        let models = schema.models(false);
        let (order, style) = sheet_layout(&schema, &models);
        assert_eq!(order, vec!["Leaves", "Setting"]);
        assert_eq!(style.len(), 2);
    }

    #[test]
    fn extra_sheet_message_names_source_and_sheets() {
        let error = CodecError::ExtraSheets {
            source: "model-*.csv".to_string(),
            sheets: vec!["Notes".to_string(), "Other".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "No matching models for worksheets/files model-*.csv / Notes, Other"
        );
    }
}
