//! In-memory workbook.
//!
//! # Responsibility
//! - Hold named worksheets in insertion order.
//! - Act as both `SheetReader` and `SheetWriter`, so codecs can round-trip
//!   without touching the filesystem.
//!
//! # Invariants
//! - Sheet names are unique; inserting an existing name replaces its grid in
//!   place.

use crate::config::WriterMetadata;
use crate::workbook::{
    trim_worksheet, SheetReader, SheetWriter, SourceKind, WorkbookError, WorkbookResult,
    Worksheet, WorksheetStyle,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workbook {
    name: String,
    kind: SourceKind,
    sheets: Vec<(String, Worksheet)>,
    styles: Vec<(String, WorksheetStyle)>,
    metadata: WriterMetadata,
}

impl Workbook {
    /// Spreadsheet-like workbook; `name` stands in for the file path in
    /// reports.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Workbook that reports cell coordinates like a delimited file.
    pub fn delimited(name: impl Into<String>) -> Self {
        let mut workbook = Self::new(name);
        workbook.kind = SourceKind::Delimited;
        workbook
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_kind(&mut self, kind: SourceKind) {
        self.kind = kind;
    }

    pub fn insert(&mut self, name: String, worksheet: Worksheet) {
        match self.sheets.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, grid)) => *grid = worksheet,
            None => self.sheets.push((name, worksheet)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Worksheet> {
        self.sheets
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, grid)| grid)
    }

    pub fn remove(&mut self, name: &str) -> Option<Worksheet> {
        let index = self.sheets.iter().position(|(existing, _)| existing == name)?;
        Some(self.sheets.remove(index).1)
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.sheets.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Worksheet)> + '_ {
        self.sheets.iter().map(|(name, grid)| (name.as_str(), grid))
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Style recorded by the last write of `sheet`.
    pub fn style(&self, sheet: &str) -> Option<&WorksheetStyle> {
        self.styles
            .iter()
            .find(|(existing, _)| existing == sheet)
            .map(|(_, style)| style)
    }

    /// Metadata recorded by the last `initialize`.
    pub fn metadata(&self) -> &WriterMetadata {
        &self.metadata
    }
}

impl SheetReader for Workbook {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }

    /// A `*` in the name stands for the sheet, as with delimited patterns.
    fn sheet_path(&self, sheet: &str) -> String {
        self.name.replacen('*', sheet, 1)
    }

    fn sheet_names(&self) -> WorkbookResult<Vec<String>> {
        Ok(self.sheet_names().map(str::to_string).collect())
    }

    fn read_worksheet(&self, name: &str) -> WorkbookResult<Worksheet> {
        let mut worksheet = self
            .get(name)
            .cloned()
            .ok_or_else(|| WorkbookError::MissingSheet {
                source: self.name.clone(),
                sheet: name.to_string(),
            })?;
        trim_worksheet(&mut worksheet);
        Ok(worksheet)
    }
}

impl SheetWriter for Workbook {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn initialize(&mut self, metadata: &WriterMetadata) -> WorkbookResult<()> {
        self.sheets.clear();
        self.styles.clear();
        self.metadata = metadata.clone();
        Ok(())
    }

    fn write_worksheet(
        &mut self,
        name: &str,
        rows: &Worksheet,
        style: Option<&WorksheetStyle>,
    ) -> WorkbookResult<()> {
        self.insert(name.to_string(), rows.clone());
        self.styles.retain(|(existing, _)| existing != name);
        if let Some(style) = style {
            self.styles.push((name.to_string(), style.clone()));
        }
        Ok(())
    }

    fn finalize(&mut self) -> WorkbookResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Workbook;
    use crate::config::WriterMetadata;
    use crate::workbook::{Cell, SheetReader, SheetWriter, WorkbookError, WorksheetStyle};

    #[test]
    fn insert_replaces_in_place() {
        let mut workbook = Workbook::new("book.xlsx");
        workbook.insert("A".to_string(), vec![vec![Cell::from("1")]]);
        workbook.insert("B".to_string(), vec![]);
        workbook.insert("A".to_string(), vec![vec![Cell::from("2")]]);
        assert_eq!(workbook.sheet_names().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(workbook.get("A").unwrap()[0][0], Cell::from("2"));
    }

    #[test]
    fn reads_trimmed_copies_and_reports_missing_sheets() {
        let mut workbook = Workbook::new("book.xlsx");
        workbook.insert(
            "A".to_string(),
            vec![vec![Cell::from("x"), Cell::Empty], vec![Cell::Empty]],
        );
        assert_eq!(workbook.read_worksheet("A").unwrap(), vec![vec![Cell::from("x")]]);
        assert!(matches!(
            workbook.read_worksheet("Z"),
            Err(WorkbookError::MissingSheet { sheet, .. }) if sheet == "Z"
        ));
    }

    #[test]
    fn writer_records_metadata_and_styles() {
        let mut workbook = Workbook::new("book.xlsx");
        workbook.insert("Stale".to_string(), vec![]);
        let metadata = WriterMetadata {
            title: Some("Model".to_string()),
            ..WriterMetadata::default()
        };
        workbook.initialize(&metadata).unwrap();
        let style = WorksheetStyle {
            head_rows: 1,
            ..WorksheetStyle::default()
        };
        workbook
            .write_worksheet("Leaves", &vec![vec![Cell::from("Id")]], Some(&style))
            .unwrap();
        workbook.finalize().unwrap();

        assert_eq!(workbook.sheet_names().collect::<Vec<_>>(), vec!["Leaves"]);
        assert_eq!(workbook.metadata().title.as_deref(), Some("Model"));
        assert_eq!(workbook.style("Leaves").unwrap().head_rows, 1);
    }
}
