//! Grid abstraction over spreadsheet-like sources.
//!
//! # Responsibility
//! - Define the primitive `Cell` and the row-major `Worksheet` grid.
//! - Define the `SheetReader`/`SheetWriter` seams the codec talks to.
//! - Pick a backend from a path's extension and convert between backends.
//!
//! # Invariants
//! - Worksheets returned by readers have no trailing empty rows or
//!   columns.
//! - Backends never interpret cell contents beyond the primitive types.
//!
//! # See also
//! - `delimited` for `.csv`/`.tsv` files, `memory` for in-process grids.

pub mod delimited;
pub mod memory;
pub mod style;

use crate::attribute::scalar::number_to_text;
use crate::config::WriterMetadata;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub use delimited::DelimitedWorkbook;
pub use memory::Workbook;
pub use style::{WorkbookStyle, WorksheetStyle};

pub type WorkbookResult<T> = Result<T, WorkbookError>;

/// Primitive cell value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Text content, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Bool(true) => write!(f, "True"),
            Self::Bool(false) => write!(f, "False"),
            Self::Number(number) => write!(f, "{}", number_to_text(*number)),
            Self::Text(text) => write!(f, "{text}"),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

pub type Row = Vec<Cell>;
/// Rows outer, columns inner.
pub type Worksheet = Vec<Row>;

/// Drops trailing empty rows, then trailing columns empty in every row.
pub fn trim_worksheet(worksheet: &mut Worksheet) {
    while worksheet
        .last()
        .is_some_and(|row| row.iter().all(Cell::is_empty))
    {
        worksheet.pop();
    }
    let width = worksheet
        .iter()
        .filter_map(|row| row.iter().rposition(|cell| !cell.is_empty()))
        .map(|index| index + 1)
        .max()
        .unwrap_or(0);
    for row in worksheet.iter_mut() {
        row.truncate(width);
    }
}

/// How cell coordinates of a source are rendered in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// Letter columns, `B3`.
    #[default]
    Spreadsheet,
    /// Numeric coordinates, `3,2`.
    Delimited,
}

#[derive(Debug)]
pub enum WorkbookError {
    Io {
        path: String,
        source: std::io::Error,
    },
    Csv {
        path: String,
        source: csv::Error,
    },
    UnsupportedExtension(String),
    GlobInDirectory(String),
    GlobCount(String),
    NoMatchingFiles(String),
    MissingSheet {
        source: String,
        sheet: String,
    },
    SameSourceAndDestination(String),
}

impl Display for WorkbookError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "I/O error on '{path}': {source}"),
            Self::Csv { path, source } => write!(f, "invalid delimited file '{path}': {source}"),
            Self::UnsupportedExtension(path) => write!(
                f,
                "Extension of path '{path}' must be one of '.csv' or '.tsv'"
            ),
            Self::GlobInDirectory(path) => write!(
                f,
                "path '{path}' cannot have glob pattern '*' in its directory name"
            ),
            Self::GlobCount(path) => write!(
                f,
                "path '{path}' must have one glob pattern '*' in its base name"
            ),
            Self::NoMatchingFiles(path) => {
                write!(f, "glob of path '{path}' does not match any files")
            }
            Self::MissingSheet { source, sheet } => {
                write!(f, "'{source}' has no worksheet '{sheet}'")
            }
            Self::SameSourceAndDestination(path) => write!(
                f,
                "Source and destination names must be different: '{path}'"
            ),
        }
    }
}

impl Error for WorkbookError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Source of named worksheets.
pub trait SheetReader {
    fn kind(&self) -> SourceKind;

    /// Path or name used in reports about the whole source.
    fn display_name(&self) -> String;

    /// Path or name of the file holding `sheet`.
    fn sheet_path(&self, sheet: &str) -> String {
        let _ = sheet;
        self.display_name()
    }

    /// Sheet names in source order.
    fn sheet_names(&self) -> WorkbookResult<Vec<String>>;

    /// Reads one sheet, trimmed of trailing empty rows and columns.
    fn read_worksheet(&self, name: &str) -> WorkbookResult<Worksheet>;
}

/// Sink of named worksheets.
pub trait SheetWriter {
    fn kind(&self) -> SourceKind;

    fn initialize(&mut self, metadata: &WriterMetadata) -> WorkbookResult<()>;

    fn write_worksheet(
        &mut self,
        name: &str,
        rows: &Worksheet,
        style: Option<&WorksheetStyle>,
    ) -> WorkbookResult<()>;

    fn finalize(&mut self) -> WorkbookResult<()>;
}

fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Opens a reader for `path` by extension.
///
/// # Errors
/// - `UnsupportedExtension` for anything but `.csv`/`.tsv`, including
///   `.xlsx`.
/// - Glob errors from `DelimitedWorkbook::open`.
pub fn get_reader(path: &str) -> WorkbookResult<Box<dyn SheetReader>> {
    match extension_of(path).as_str() {
        "csv" | "tsv" => Ok(Box::new(DelimitedWorkbook::open(path)?)),
        _ => Err(WorkbookError::UnsupportedExtension(path.to_string())),
    }
}

/// Opens a writer for `path` by extension.
pub fn get_writer(path: &str) -> WorkbookResult<Box<dyn SheetWriter>> {
    match extension_of(path).as_str() {
        "csv" | "tsv" => Ok(Box::new(DelimitedWorkbook::open(path)?)),
        _ => Err(WorkbookError::UnsupportedExtension(path.to_string())),
    }
}

/// Reads every sheet of `reader` into memory.
pub fn read_all(reader: &dyn SheetReader) -> WorkbookResult<Workbook> {
    let mut workbook = Workbook::new(reader.display_name());
    workbook.set_kind(reader.kind());
    for name in reader.sheet_names()? {
        let worksheet = reader.read_worksheet(&name)?;
        workbook.insert(name, worksheet);
    }
    Ok(workbook)
}

/// Writes every sheet of `workbook`, in order, to `writer`.
pub fn write_all(
    writer: &mut dyn SheetWriter,
    workbook: &Workbook,
    metadata: &WriterMetadata,
    style: &WorkbookStyle,
) -> WorkbookResult<()> {
    writer.initialize(metadata)?;
    for (name, worksheet) in workbook.iter() {
        writer.write_worksheet(name, worksheet, style.get(name))?;
    }
    writer.finalize()
}

/// Copies sheets from `reader` to `writer`: names in `worksheet_order`
/// first, then the remaining sheets in source order. Ordered names the
/// source lacks are skipped.
pub fn convert_between(
    reader: &dyn SheetReader,
    writer: &mut dyn SheetWriter,
    worksheet_order: &[String],
    style: &WorkbookStyle,
) -> WorkbookResult<()> {
    let source = read_all(reader)?;
    let mut ordered = Workbook::new(source.name().to_string());
    for name in worksheet_order
        .iter()
        .map(String::as_str)
        .chain(source.sheet_names())
    {
        if ordered.get(name).is_some() {
            continue;
        }
        if let Some(worksheet) = source.get(name) {
            ordered.insert(name.to_string(), worksheet.clone());
        }
    }
    write_all(writer, &ordered, &WriterMetadata::default(), style)?;
    info!(
        "event=grid_convert module=workbook status=ok source={} sheets={}",
        source.name(),
        ordered.len()
    );
    Ok(())
}

/// Converts the file(s) at `source` into `destination`.
///
/// # Errors
/// - `SameSourceAndDestination` when both paths are equal.
/// - Backend selection and I/O errors.
pub fn convert(
    source: &str,
    destination: &str,
    worksheet_order: &[String],
    style: &WorkbookStyle,
) -> WorkbookResult<()> {
    if source == destination {
        return Err(WorkbookError::SameSourceAndDestination(source.to_string()));
    }
    let reader = get_reader(source)?;
    let mut writer = get_writer(destination)?;
    convert_between(reader.as_ref(), writer.as_mut(), worksheet_order, style)
}

#[cfg(test)]
mod tests {
    use super::{convert_between, get_reader, trim_worksheet, Cell, Workbook, WorkbookError, WorkbookStyle};

    #[test]
    fn cell_display_matches_delimited_text() {
        assert_eq!(Cell::Empty.to_string(), "");
        assert_eq!(Cell::Bool(true).to_string(), "True");
        assert_eq!(Cell::Number(3.0).to_string(), "3");
        assert_eq!(Cell::Number(2.5).to_string(), "2.5");
        assert_eq!(Cell::from("leaf_1").to_string(), "leaf_1");
    }

    #[test]
    fn trim_removes_trailing_empty_rows_and_columns() {
        let mut worksheet = vec![
            vec![Cell::from("id"), Cell::Empty, Cell::from("size"), Cell::Empty],
            vec![Cell::from("a"), Cell::Empty, Cell::Empty],
            vec![Cell::Empty, Cell::Empty],
            vec![],
        ];
        trim_worksheet(&mut worksheet);
        assert_eq!(
            worksheet,
            vec![
                vec![Cell::from("id"), Cell::Empty, Cell::from("size")],
                vec![Cell::from("a"), Cell::Empty, Cell::Empty],
            ]
        );
    }

    #[test]
    fn xlsx_is_unsupported() {
        let error = get_reader("model.xlsx").err().unwrap();
        assert!(matches!(error, WorkbookError::UnsupportedExtension(path) if path == "model.xlsx"));
    }

    #[test]
    fn convert_puts_ordered_sheets_first() {
        let mut source = Workbook::new("source.xlsx");
        source.insert("A".to_string(), vec![vec![Cell::from("a")]]);
        source.insert("B".to_string(), vec![vec![Cell::from("b")]]);
        source.insert("C".to_string(), vec![vec![Cell::from("c")]]);
        let mut destination = Workbook::new("destination.xlsx");

        convert_between(
            &source,
            &mut destination,
            &["C".to_string(), "Missing".to_string()],
            &WorkbookStyle::default(),
        )
        .unwrap();
        assert_eq!(destination.sheet_names().collect::<Vec<_>>(), vec!["C", "A", "B"]);
    }
}
