use pretty_assertions::assert_eq;
use roost::config::{Cardinality, EntityDecl, Field, LinkKind, SchemaBuilder};
use roost::SchemaError;

#[test]
fn weak_identity_flattens_through_the_chain() {
    let schema = SchemaBuilder::new()
        .with(EntityDecl::new("ResA").field(Field::string("a")))
        .with(EntityDecl::new("ResB").field(Field::string("a")).composed_by("res_a_set", "ResA"))
        .with(EntityDecl::new("ResC").field(Field::string("a")).composed_by("res_b_set", "ResB"))
        .initialize()
        .unwrap();

    assert_eq!(schema.entity("ResC").unwrap().identity, vec!["id"]);
    assert_eq!(schema.entity("ResB").unwrap().identity, vec!["weak_id", "res_c_id"]);
    assert_eq!(
        schema.entity("ResA").unwrap().identity,
        vec!["weak_id", "res_b_weak_id", "res_b_res_c_id"]
    );

    let a = schema.entity("ResA").unwrap();
    assert_eq!(a.required_for_pk, vec!["ResB"]);
    assert_eq!(a.inherited_identity(), vec!["res_b_weak_id", "res_b_res_c_id"]);
    let weak = a.field("weak_id").unwrap();
    assert!(weak.weak_id && weak.generated && !weak.unique && weak.kind.is_auto_increment());
    assert!(a.primary_key().next().is_none());
}

#[test]
fn unkeyed_entities_get_an_id() {
    let schema = SchemaBuilder::new()
        .with(EntityDecl::new("Plain").field(Field::string("name")))
        .with(EntityDecl::new("Keyed").field(Field::string("code").primary_key()))
        .initialize()
        .unwrap();
    let plain = schema.entity("Plain").unwrap();
    assert_eq!(plain.field_names(), vec!["id", "name"]);
    assert!(plain.field("id").unwrap().kind.is_auto_increment());
    assert_eq!(schema.entity("Keyed").unwrap().field_names(), vec!["code"]);
    assert_eq!(schema.entity("Keyed").unwrap().identity, vec!["code"]);
}

#[test]
fn has_cardinality_controls_uniqueness() {
    let schema = SchemaBuilder::new()
        .with(
            EntityDecl::new("Owner")
                .has("one", "One", Cardinality::One)
                .has("maybe", "Maybe", Cardinality::ZeroOrOne)
                .has("some", "Some", Cardinality::OneOrMore)
                .has("any", "Any", Cardinality::ZeroOrMore),
        )
        .with(EntityDecl::new("One"))
        .with(EntityDecl::new("Maybe"))
        .with(EntityDecl::new("Some"))
        .with(EntityDecl::new("Any"))
        .initialize()
        .unwrap();

    for (name, unique) in [("One", true), ("Maybe", true), ("Some", false), ("Any", false)] {
        let e = schema.entity(name).unwrap();
        let fk = e.field("owner_id").unwrap();
        assert!(fk.nullable, "{}", name);
        assert_eq!(e.uniques == vec![vec!["owner_id".to_string()]], unique, "{}", name);
        assert_eq!(e.foreign_keys[0].referenced_table, "owner");
    }
}

#[test]
fn association_cardinality_and_links() {
    let schema = SchemaBuilder::new()
        .with(EntityDecl::new("Person"))
        .with(EntityDecl::new("Passport"))
        .with(
            EntityDecl::new("Issue")
                .field(Field::date("issued"))
                .associates("Person", Cardinality::ZeroOrMore)
                .associates("Passport", Cardinality::One),
        )
        .initialize()
        .unwrap();

    let issue = schema.entity("Issue").unwrap();
    assert_eq!(issue.identity, vec!["id", "person_id", "passport_id"]);
    assert_eq!(issue.required_for_pk, vec!["Person", "Passport"]);
    assert_eq!(issue.uniques, vec![vec!["passport_id".to_string()]]);
    assert!(!issue.field("person_id").unwrap().nullable);
    assert_eq!(issue.foreign_keys.len(), 2);
    assert_eq!(
        issue.link("passport_ref").map(|l| &l.kind),
        Some(&LinkKind::FromAssociation {
            participant: "Passport".into()
        })
    );
    assert_eq!(
        schema.entity("Person").unwrap().link("issue_set").map(|l| &l.kind),
        Some(&LinkKind::ToAssociation {
            association: "Issue".into()
        })
    );
}

#[test]
fn declaration_errors() {
    let unknown = SchemaBuilder::new()
        .with(EntityDecl::new("A").composed_by("bs", "B"))
        .initialize()
        .unwrap_err();
    assert!(matches!(unknown, SchemaError::Reference { .. }));

    let keyed_child = SchemaBuilder::new()
        .with(EntityDecl::new("A").composed_by("bs", "B"))
        .with(EntityDecl::new("B").field(Field::integer("code").primary_key()))
        .initialize()
        .unwrap_err();
    assert!(matches!(keyed_child, SchemaError::Conflict(_)));

    let bad_range = SchemaBuilder::new()
        .with(EntityDecl::new("A").field(Field::integer("n").range(5, 5)))
        .initialize()
        .unwrap_err();
    assert!(matches!(bad_range, SchemaError::InvalidField { .. }));

    let twice = SchemaBuilder::new()
        .with(EntityDecl::new("A"))
        .with(EntityDecl::new("A"))
        .initialize()
        .unwrap_err();
    assert_eq!(twice, SchemaError::DuplicateEntity("A".into()));

    let collision = SchemaBuilder::new()
        .with(EntityDecl::new("Hotel").composed_by("rooms", "Room"))
        .with(EntityDecl::new("Room").field(Field::string("hotel_id")))
        .initialize()
        .unwrap_err();
    assert!(matches!(collision, SchemaError::Conflict(_)));

    let unanchored = SchemaBuilder::new()
        .with(EntityDecl::new("Room").field(Field::integer("number").weak_id()))
        .initialize()
        .unwrap_err();
    assert!(matches!(unanchored, SchemaError::Conflict(_)), "{:?}", unanchored);

    let same_target = SchemaBuilder::new()
        .with(
            EntityDecl::new("A")
                .composed_by("bs", "B")
                .has("best", "B", Cardinality::ZeroOrOne),
        )
        .with(EntityDecl::new("B"))
        .initialize()
        .unwrap_err();
    assert!(matches!(same_target, SchemaError::Conflict(_)), "{:?}", same_target);

    // an association end and a Has relation resolving to the same columns
    let shared_fk = SchemaBuilder::new()
        .with(EntityDecl::new("Guest").has("stay", "Stay", Cardinality::ZeroOrOne))
        .with(EntityDecl::new("Hotel"))
        .with(
            EntityDecl::new("Stay")
                .associates("Guest", Cardinality::ZeroOrMore)
                .associates("Hotel", Cardinality::ZeroOrMore),
        )
        .initialize()
        .unwrap_err();
    assert!(matches!(shared_fk, SchemaError::Conflict(_)), "{:?}", shared_fk);
}

#[test]
fn reinitializing_keeps_has_uniqueness() {
    let schema = SchemaBuilder::new()
        .with(
            EntityDecl::new("Hotel")
                .composed_by("rooms", "Room")
                .has("manager", "Guest", Cardinality::ZeroOrOne),
        )
        .with(EntityDecl::new("Room").field(Field::integer("number").weak_id()))
        .with(EntityDecl::new("Guest"))
        .initialize()
        .unwrap();
    let again = schema.reinitialize().unwrap();
    let guest = again.entity("Guest").unwrap();
    assert_eq!(guest.uniques, vec![vec!["hotel_id".to_string()]]);
    assert_eq!(guest.foreign_keys.len(), 1);
    assert_eq!(again.entities(), schema.entities());
}

#[test]
fn declarations_load_from_json() {
    let decls = roost::config::parse_declarations(
        r#"[
            {"name": "Hotel", "fields": [{"name": "name", "type": "string", "length": 40}],
             "relations": [{"name": "rooms", "kind": "composed_by", "target": "Room", "cardinality": "1..*"}]},
            {"name": "Room", "fields": [{"name": "number", "type": "integer", "weak_id": true}]}
        ]"#,
    )
    .unwrap();
    let schema = SchemaBuilder::new().extend(decls).initialize().unwrap();
    assert_eq!(schema.entity("Room").unwrap().identity, vec!["number", "hotel_id"]);
    assert_eq!(schema.len(), 2);
}
