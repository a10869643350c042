use sheetmodel_core::workbook::WorkbookError;
use sheetmodel_core::{
    Attribute, CodecError, ModelDef, Reader, ReaderOptions, Schema, SchemaBuilder,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn schema() -> Arc<Schema> {
    SchemaBuilder::new()
        .model(ModelDef::new("Root").attribute(Attribute::slug("label")))
        .model(
            ModelDef::new("Node")
                .attribute(Attribute::slug("id"))
                .attribute(Attribute::many_to_one("root", "Root").related_name("nodes"))
                .attribute(Attribute::float("weight").with_min(0.0)),
        )
        .build()
        .unwrap()
}

fn write_files(dir: &Path, files: &[(&str, &str)]) -> String {
    for (sheet, body) in files {
        fs::write(dir.join(format!("model-{sheet}.csv")), body).unwrap();
    }
    dir.join("model-*.csv").to_str().unwrap().to_string()
}

fn read(pattern: &str) -> Result<sheetmodel_core::LoadedObjects, CodecError> {
    let schema = schema();
    let models = schema.models(false);
    Reader::new().run(pattern, &schema, &models)
}

#[test]
fn unknown_header_names_its_cell() {
    let dir = tempfile::tempdir().unwrap();
    let pattern = write_files(
        dir.path(),
        &[("Roots", "Label\nr\n"), ("Nodes", "Id,Root,y\nnode_1,r,1\n")],
    );
    let message = read(&pattern).unwrap_err().to_string();
    assert!(message.contains("contains error(s):"));
    assert!(message.contains("Node:"));
    assert!(message.contains("'model-Nodes.csv':'Nodes':"));
    assert!(message.contains("Header 'y' in row 1, col 3 does not match any attribute"));
}

#[test]
fn empty_and_duplicate_headers_are_reported_together() {
    let dir = tempfile::tempdir().unwrap();
    let pattern = write_files(
        dir.path(),
        &[("Roots", "Label\nr\n"), ("Nodes", "Id,,id\nnode_1,,node_1\n")],
    );
    let message = read(&pattern).unwrap_err().to_string();
    assert!(message.contains("Empty header field in row 1, col 2 - delete empty column(s)"));
    assert!(message.contains("Duplicate, case insensitive, header fields: 'Id', 'id'"));
}

#[test]
fn repeated_primary_value_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let pattern = write_files(
        dir.path(),
        &[
            ("Roots", "Label\nr\n"),
            ("Nodes", "Id,Root,Weight\nnode_1,r,1\nnode_2,r,2\nnode_2,r,3\n"),
        ],
    );
    let error = read(&pattern).unwrap_err();
    let CodecError::Validation(invalid) = &error else {
        panic!("expected a validation error, got {error}");
    };
    let node = invalid.model_error("Node").unwrap();
    assert!(node.attributes[0].messages[0].contains("'node_2'"));
    assert!(error.to_string().contains("fails to validate"));
}

#[test]
fn bad_cells_and_missing_keys_carry_locations() {
    let dir = tempfile::tempdir().unwrap();
    let pattern = write_files(
        dir.path(),
        &[
            ("Roots", "Label\nr\n"),
            ("Nodes", "Id,Root,Weight\nnode_1,r,-1\nnode_2,r,heavy\n"),
        ],
    );
    let message = read(&pattern).unwrap_err().to_string();
    assert!(message.contains("model-Nodes.csv:Nodes:2,3"));
    assert!(message.contains("Value must be at least 0"));
    assert!(message.contains("model-Nodes.csv:Nodes:3,3"));
    assert!(message.contains("'weight':'heavy'"));

    let pattern = write_files(
        dir.path(),
        &[("Nodes", "Id,Root,Weight\nnode_1,other root,1\n")],
    );
    let message = read(&pattern).unwrap_err().to_string();
    assert!(message.contains("Unable to find Root with label='other root'"));
    assert!(message.contains("model-Nodes.csv:Nodes:2,2"));
}

#[test]
fn extra_sheets_and_attributes_can_be_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let pattern = write_files(
        dir.path(),
        &[
            ("Roots", "Label\nr\n"),
            ("Nodes", "Id,Root,Comment\nnode_1,r,keep me\n"),
            ("Notes", "Text\nhello\n"),
        ],
    );
    let error = read(&pattern).unwrap_err();
    assert!(matches!(error, CodecError::ExtraSheets { .. }));
    assert!(error.to_string().ends_with(" / Notes"));

    let schema = schema();
    let loaded = Reader::with_options(ReaderOptions {
        ignore_other_sheets: true,
        ignore_extra_attributes: true,
    })
    .run(&pattern, &schema, &schema.models(false))
    .unwrap();
    let node = loaded.by_name("Node")[0];
    let root = loaded.by_name("Root")[0];
    assert_eq!(loaded.store.object(node, "root").unwrap(), Some(root));
}

#[test]
fn spreadsheet_files_are_unsupported() {
    let error = read("model.xlsx").unwrap_err();
    assert!(matches!(
        error,
        CodecError::Workbook(WorkbookError::UnsupportedExtension(_))
    ));
}
