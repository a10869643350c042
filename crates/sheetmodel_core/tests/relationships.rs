use sheetmodel_core::{
    Attribute, Field, ModelDef, ModelError, ObjectId, SchemaBuilder, Store, Validator, Value,
};

fn store() -> Store {
    let schema = SchemaBuilder::new()
        .model(ModelDef::new("Root").attribute(Attribute::string("label").unique()))
        .model(
            ModelDef::new("Leaf")
                .attribute(Attribute::slug("id"))
                .attribute(Attribute::many_to_one("root", "Root").related_name("leaves"))
                .attribute(Attribute::float("size").with_max(3.0)),
        )
        .build()
        .unwrap();
    Store::new(schema)
}

fn leaf(store: &mut Store, id: &str, root: ObjectId) -> ObjectId {
    store
        .create("Leaf", vec![("id", id.into()), ("root", root.into())])
        .unwrap()
}

#[test]
fn leaves_follow_their_root_assignment() {
    let mut store = store();
    let r = store.create("Root", vec![("label", "r".into())]).unwrap();
    let l1 = leaf(&mut store, "l1", r);
    let l2 = leaf(&mut store, "l2", r);
    assert_eq!(store.objects(r, "leaves").unwrap(), &[l1, l2]);

    store.set(l1, "root", Field::Object(None)).unwrap();
    assert_eq!(store.objects(r, "leaves").unwrap(), &[l2]);
    assert_eq!(store.object(l1, "root").unwrap(), None);
}

#[test]
fn reassigning_root_moves_leaf_between_collections() {
    let mut store = store();
    let a = store.create("Root", vec![("label", "a".into())]).unwrap();
    let b = store.create("Root", vec![("label", "b".into())]).unwrap();
    let l1 = leaf(&mut store, "l1", a);

    store.related(b, "leaves").unwrap().add(l1).unwrap();
    assert!(store.objects(a, "leaves").unwrap().is_empty());
    assert_eq!(store.object(l1, "root").unwrap(), Some(b));
}

#[test]
fn float_maximum_is_inclusive() {
    let mut store = store();
    let r = store.create("Root", vec![("label", "r".into())]).unwrap();
    let over = leaf(&mut store, "over", r);
    let edge = leaf(&mut store, "edge", r);
    store.set(over, "size", Field::Value(Value::Float(4.0))).unwrap();
    store.set(edge, "size", Field::Value(Value::Float(3.0))).unwrap();

    let report = store.validate(over).unwrap().unwrap();
    assert_eq!(report.attributes[0].messages, vec!["Value must be at most 3"]);
    assert!(store.validate(edge).unwrap().is_none());
}

#[test]
fn repeated_unique_value_is_reported_once() {
    let mut store = store();
    let a = store.create("Root", vec![("label", "same".into())]).unwrap();
    let b = store.create("Root", vec![("label", "same".into())]).unwrap();
    let root = store.schema().model_id("Root").unwrap();

    let invalid = store.validate_unique(root, &[a, b]).unwrap().unwrap();
    assert_eq!(invalid.attributes.len(), 1);
    assert!(invalid.attributes[0].messages[0].contains("'same'"));

    let report = Validator::new().run(&mut store, &[a, b]).unwrap().unwrap();
    assert_eq!(report.invalid_models.len(), 1);
}

#[test]
fn deleted_objects_leave_no_dangling_links() {
    let mut store = store();
    let r = store.create("Root", vec![("label", "r".into())]).unwrap();
    let l1 = leaf(&mut store, "l1", r);
    store.delete(r).unwrap();

    assert_eq!(store.object(l1, "root").unwrap(), None);
    assert!(matches!(
        store.objects(r, "leaves"),
        Err(ModelError::DeletedObject(_))
    ));
}
