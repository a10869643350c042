//! Presentation hints for written worksheets.
//!
//! Only backends with a notion of formatting act on these; delimited files
//! ignore them and the in-memory workbook records them.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct WorksheetStyle {
    /// Number of frozen header rows.
    pub head_rows: usize,
    /// Number of frozen header columns.
    pub head_columns: usize,
    pub head_row_font_bold: bool,
    pub head_row_fill_pattern: String,
    pub head_row_fill_fgcolor: String,
    pub font_family: String,
    pub font_size: f64,
    pub row_height: f64,
    pub col_width: f64,
    pub auto_filter: bool,
}

impl Default for WorksheetStyle {
    fn default() -> Self {
        Self {
            head_rows: 0,
            head_columns: 0,
            head_row_font_bold: false,
            head_row_fill_pattern: "solid".to_string(),
            head_row_fill_fgcolor: String::new(),
            font_family: "Arial".to_string(),
            font_size: 11.0,
            row_height: 15.0,
            col_width: 15.0,
            auto_filter: true,
        }
    }
}

/// Worksheet styles keyed by sheet name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkbookStyle {
    sheets: BTreeMap<String, WorksheetStyle>,
}

impl WorkbookStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sheet: impl Into<String>, style: WorksheetStyle) {
        self.sheets.insert(sheet.into(), style);
    }

    pub fn get(&self, sheet: &str) -> Option<&WorksheetStyle> {
        self.sheets.get(sheet)
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}
