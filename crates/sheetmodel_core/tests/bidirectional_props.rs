use proptest::prelude::*;
use sheetmodel_core::{Attribute, Field, ModelDef, ObjectId, SchemaBuilder, Store};

const OWNERS: usize = 3;
const MEMBERS: usize = 4;
const LABELS: usize = 3;

#[derive(Debug, Clone)]
enum Op {
    SetOwner(usize, Option<usize>),
    AddMember(usize, usize),
    RemoveMember(usize, usize),
    Tag(usize, usize),
    Untag(usize, usize),
    ClearLabels(usize),
    SetPartner(usize, Option<usize>),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..MEMBERS, proptest::option::of(0..OWNERS)).prop_map(|(m, o)| Op::SetOwner(m, o)),
        (0..OWNERS, 0..MEMBERS).prop_map(|(o, m)| Op::AddMember(o, m)),
        (0..OWNERS, 0..MEMBERS).prop_map(|(o, m)| Op::RemoveMember(o, m)),
        (0..MEMBERS, 0..LABELS).prop_map(|(m, l)| Op::Tag(m, l)),
        (0..LABELS, 0..MEMBERS).prop_map(|(l, m)| Op::Untag(l, m)),
        (0..MEMBERS).prop_map(Op::ClearLabels),
        (0..OWNERS, proptest::option::of(0..MEMBERS)).prop_map(|(o, m)| Op::SetPartner(o, m)),
    ]
}

struct Graph {
    store: Store,
    owners: Vec<ObjectId>,
    members: Vec<ObjectId>,
    labels: Vec<ObjectId>,
}

fn graph() -> Graph {
    let schema = SchemaBuilder::new()
        .model(
            ModelDef::new("Owner")
                .attribute(Attribute::slug("id"))
                .attribute(Attribute::one_to_one("partner", "Member").related_name("partner_of")),
        )
        .model(
            ModelDef::new("Member")
                .attribute(Attribute::slug("id"))
                .attribute(Attribute::many_to_one("owner", "Owner").related_name("members")),
        )
        .model(
            ModelDef::new("Label")
                .attribute(Attribute::slug("id"))
                .attribute(Attribute::many_to_many("members", "Member").related_name("labels")),
        )
        .build()
        .unwrap();
    let mut store = Store::new(schema);
    let mut make = |model: &str, count: usize| {
        (0..count)
            .map(|index| {
                store
                    .create(model, vec![("id", format!("{}_{index}", model.to_lowercase()).into())])
                    .unwrap()
            })
            .collect::<Vec<_>>()
    };
    let owners = make("Owner", OWNERS);
    let members = make("Member", MEMBERS);
    let labels = make("Label", LABELS);
    Graph {
        store,
        owners,
        members,
        labels,
    }
}

impl Graph {
    /// Applies `op`; usage errors such as removing a non-member are expected
    /// and leave the graph untouched.
    fn apply(&mut self, op: &Op) {
        let store = &mut self.store;
        let _ = match *op {
            Op::SetOwner(m, o) => store.set(
                self.members[m],
                "owner",
                Field::Object(o.map(|o| self.owners[o])),
            ),
            Op::AddMember(o, m) => store
                .related(self.owners[o], "members")
                .and_then(|mut members| members.add(self.members[m])),
            Op::RemoveMember(o, m) => store
                .related(self.owners[o], "members")
                .and_then(|mut members| members.remove(self.members[m])),
            Op::Tag(m, l) => store
                .related(self.members[m], "labels")
                .and_then(|mut labels| labels.add(self.labels[l])),
            Op::Untag(l, m) => store
                .related(self.labels[l], "members")
                .and_then(|mut members| members.discard(self.members[m])),
            Op::ClearLabels(m) => store
                .related(self.members[m], "labels")
                .and_then(|mut labels| labels.clear()),
            Op::SetPartner(o, m) => store.set(
                self.owners[o],
                "partner",
                Field::Object(m.map(|m| self.members[m])),
            ),
        };
    }

    fn assert_consistent(&self) {
        let store = &self.store;
        for member in &self.members {
            if let Some(owner) = store.object(*member, "owner").unwrap() {
                assert!(store.objects(owner, "members").unwrap().contains(member));
            }
            if let Some(owner) = store.object(*member, "partner_of").unwrap() {
                assert_eq!(store.object(owner, "partner").unwrap(), Some(*member));
            }
            let labels = store.objects(*member, "labels").unwrap();
            assert_no_duplicates(labels);
            for label in labels {
                assert!(store.objects(*label, "members").unwrap().contains(member));
            }
        }
        for owner in &self.owners {
            let members = store.objects(*owner, "members").unwrap();
            assert_no_duplicates(members);
            for member in members {
                assert_eq!(store.object(*member, "owner").unwrap(), Some(*owner));
            }
            if let Some(member) = store.object(*owner, "partner").unwrap() {
                assert_eq!(store.object(member, "partner_of").unwrap(), Some(*owner));
            }
        }
        for label in &self.labels {
            let members = store.objects(*label, "members").unwrap();
            assert_no_duplicates(members);
            for member in members {
                assert!(store.objects(*member, "labels").unwrap().contains(label));
            }
        }
    }
}

fn assert_no_duplicates(objects: &[ObjectId]) {
    let mut sorted = objects.to_vec();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), objects.len());
}

proptest! {
    #[test]
    fn mirrors_stay_consistent_under_random_mutations(ops in prop::collection::vec(op(), 0..60)) {
        let mut graph = graph();
        for op in &ops {
            graph.apply(op);
            graph.assert_consistent();
        }
    }

    #[test]
    fn graph_equals_its_copy_until_mutated(ops in prop::collection::vec(op(), 0..30)) {
        let mut graph = graph();
        for op in &ops {
            graph.apply(op);
        }
        let root = graph.owners[0];
        let copy = graph.store.copy(root).unwrap();
        prop_assert!(graph.store.is_equal(root, &graph.store, copy).unwrap());
        prop_assert!(graph.store.is_equal(copy, &graph.store, root).unwrap());

        graph.store.set(copy, "id", Field::from("renamed")).unwrap();
        prop_assert!(!graph.store.is_equal(root, &graph.store, copy).unwrap());
    }
}
