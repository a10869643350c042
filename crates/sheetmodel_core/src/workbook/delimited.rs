//! Delimited-file backend (`.csv`, `.tsv`).
//!
//! # Responsibility
//! - Map each sheet to one file: the `*` of the path pattern is replaced by
//!   the sheet name.
//! - Convert between text fields and primitive cells.
//!
//! # Invariants
//! - The pattern has exactly one `*`, in its base name.
//! - `True`/`False` read as booleans, numeric text as numbers, empty fields
//!   as `Cell::Empty`; everything else stays text.

use crate::config::WriterMetadata;
use crate::util::natural_cmp;
use crate::workbook::{
    trim_worksheet, Cell, SheetReader, SheetWriter, SourceKind, WorkbookError, WorkbookResult,
    Worksheet, WorksheetStyle,
};
use log::debug;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedWorkbook {
    pattern: String,
    delimiter: u8,
}

impl DelimitedWorkbook {
    /// Validates `pattern` and picks the delimiter from its extension.
    ///
    /// # Errors
    /// - `UnsupportedExtension` unless the extension is `.csv` or `.tsv`.
    /// - `GlobInDirectory` / `GlobCount` for a misplaced or missing `*`.
    pub fn open(pattern: &str) -> WorkbookResult<Self> {
        let path = Path::new(pattern);
        let delimiter = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => b',',
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
            _ => return Err(WorkbookError::UnsupportedExtension(pattern.to_string())),
        };
        let directory = path
            .parent()
            .map(|dir| dir.to_string_lossy().into_owned())
            .unwrap_or_default();
        if directory.contains('*') {
            return Err(WorkbookError::GlobInDirectory(pattern.to_string()));
        }
        let base = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if base.matches('*').count() != 1 {
            return Err(WorkbookError::GlobCount(pattern.to_string()));
        }
        Ok(Self {
            pattern: pattern.to_string(),
            delimiter,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn file_for(&self, sheet: &str) -> String {
        self.pattern.replacen('*', sheet, 1)
    }

    fn base_parts(&self) -> (String, String) {
        let base = Path::new(&self.pattern)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        match base.split_once('*') {
            Some((prefix, suffix)) => (prefix.to_string(), suffix.to_string()),
            None => (base, String::new()),
        }
    }
}

fn parse_field(field: &str) -> Cell {
    match field {
        "" => Cell::Empty,
        "True" => Cell::Bool(true),
        "False" => Cell::Bool(false),
        text if looks_numeric(text) => text
            .parse::<f64>()
            .map(Cell::Number)
            .unwrap_or_else(|_| Cell::Text(text.to_string())),
        text => Cell::Text(text.to_string()),
    }
}

/// Plain decimal or scientific notation; excludes `inf`/`nan` spellings.
fn looks_numeric(text: &str) -> bool {
    text.bytes().any(|byte| byte.is_ascii_digit())
        && text
            .bytes()
            .all(|byte| byte.is_ascii_digit() || matches!(byte, b'+' | b'-' | b'.' | b'e' | b'E'))
}

impl SheetReader for DelimitedWorkbook {
    fn kind(&self) -> SourceKind {
        SourceKind::Delimited
    }

    fn display_name(&self) -> String {
        self.pattern.clone()
    }

    fn sheet_path(&self, sheet: &str) -> String {
        self.file_for(sheet)
    }

    /// Sheets are the `*` matches of existing files, naturally sorted.
    fn sheet_names(&self) -> WorkbookResult<Vec<String>> {
        let directory = match Path::new(&self.pattern).parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => Path::new(".").to_path_buf(),
        };
        let (prefix, suffix) = self.base_parts();
        let entries = std::fs::read_dir(&directory).map_err(|source| WorkbookError::Io {
            path: directory.display().to_string(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| WorkbookError::Io {
                path: directory.display().to_string(),
                source,
            })?;
            if !entry.path().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.len() < prefix.len() + suffix.len() {
                continue;
            }
            if let Some(name) = file_name
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_suffix(suffix.as_str()))
            {
                names.push(name.to_string());
            }
        }
        if names.is_empty() {
            return Err(WorkbookError::NoMatchingFiles(self.pattern.clone()));
        }
        names.sort_by(|a, b| natural_cmp(a, b));
        Ok(names)
    }

    fn read_worksheet(&self, name: &str) -> WorkbookResult<Worksheet> {
        let path = self.file_for(name);
        let csv_error = |source| WorkbookError::Csv {
            path: path.clone(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_path(&path)
            .map_err(csv_error)?;

        let mut worksheet = Worksheet::new();
        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            worksheet.push(record.iter().map(parse_field).collect());
        }
        trim_worksheet(&mut worksheet);
        debug!(
            "event=sheet_read module=workbook status=ok path={} rows={}",
            path,
            worksheet.len()
        );
        Ok(worksheet)
    }
}

impl SheetWriter for DelimitedWorkbook {
    fn kind(&self) -> SourceKind {
        SourceKind::Delimited
    }

    fn initialize(&mut self, _metadata: &WriterMetadata) -> WorkbookResult<()> {
        Ok(())
    }

    fn write_worksheet(
        &mut self,
        name: &str,
        rows: &Worksheet,
        _style: Option<&WorksheetStyle>,
    ) -> WorkbookResult<()> {
        let path = self.file_for(name);
        let csv_error = |source| WorkbookError::Csv {
            path: path.clone(),
            source,
        };
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .delimiter(self.delimiter)
            .from_path(&path)
            .map_err(csv_error)?;
        for row in rows {
            writer
                .write_record(row.iter().map(Cell::to_string))
                .map_err(csv_error)?;
        }
        writer.flush().map_err(|source| WorkbookError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(
            "event=sheet_write module=workbook status=ok path={} rows={}",
            path,
            rows.len()
        );
        Ok(())
    }

    fn finalize(&mut self) -> WorkbookResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_field, DelimitedWorkbook};
    use crate::config::WriterMetadata;
    use crate::workbook::{Cell, SheetReader, SheetWriter, WorkbookError};

    #[test]
    fn pattern_must_have_one_star_in_base_name() {
        assert!(matches!(
            DelimitedWorkbook::open("out/model.csv"),
            Err(WorkbookError::GlobCount(_))
        ));
        assert!(matches!(
            DelimitedWorkbook::open("out/*-*.csv"),
            Err(WorkbookError::GlobCount(_))
        ));
        assert!(matches!(
            DelimitedWorkbook::open("out*/model-*.csv"),
            Err(WorkbookError::GlobInDirectory(_))
        ));
        assert!(matches!(
            DelimitedWorkbook::open("model-*.txt"),
            Err(WorkbookError::UnsupportedExtension(_))
        ));
        assert_eq!(
            WorkbookError::GlobCount("model.csv".to_string()).to_string(),
            "path 'model.csv' must have one glob pattern '*' in its base name"
        );
    }

    #[test]
    fn fields_parse_into_primitive_cells() {
        assert_eq!(parse_field(""), Cell::Empty);
        assert_eq!(parse_field("True"), Cell::Bool(true));
        assert_eq!(parse_field("False"), Cell::Bool(false));
        assert_eq!(parse_field("2.5"), Cell::Number(2.5));
        assert_eq!(parse_field("-1e3"), Cell::Number(-1000.0));
        assert_eq!(parse_field("nan"), Cell::Text("nan".to_string()));
        assert_eq!(parse_field("node_2"), Cell::Text("node_2".to_string()));
        assert_eq!(parse_field("1-2"), Cell::Text("1-2".to_string()));
    }

    #[test]
    fn writes_one_file_per_sheet_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("model-*.tsv");
        let pattern = pattern.to_str().unwrap();
        let mut workbook = DelimitedWorkbook::open(pattern).unwrap();

        workbook.initialize(&WriterMetadata::default()).unwrap();
        workbook
            .write_worksheet(
                "Leaves",
                &vec![
                    vec![Cell::from("Id"), Cell::from("Size"), Cell::from("Note")],
                    vec![Cell::from("leaf_1"), Cell::Number(2.5), Cell::from("a, b")],
                    vec![Cell::from("leaf_2"), Cell::Empty, Cell::Bool(false)],
                ],
                None,
            )
            .unwrap();
        workbook
            .write_worksheet("Root", &vec![vec![Cell::from("Label"), Cell::from("r")]], None)
            .unwrap();
        workbook.finalize().unwrap();

        assert!(dir.path().join("model-Leaves.tsv").is_file());
        assert_eq!(workbook.sheet_names().unwrap(), vec!["Leaves", "Root"]);
        assert_eq!(
            workbook.read_worksheet("Leaves").unwrap(),
            vec![
                vec![Cell::from("Id"), Cell::from("Size"), Cell::from("Note")],
                vec![Cell::from("leaf_1"), Cell::Number(2.5), Cell::from("a, b")],
                vec![Cell::from("leaf_2"), Cell::Empty, Cell::Bool(false)],
            ]
        );
        assert!(workbook.sheet_path("Root").ends_with("model-Root.tsv"));
    }

    #[test]
    fn missing_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("model-*.csv");
        let workbook = DelimitedWorkbook::open(pattern.to_str().unwrap()).unwrap();
        assert!(matches!(
            workbook.sheet_names(),
            Err(WorkbookError::NoMatchingFiles(_))
        ));
    }
}
