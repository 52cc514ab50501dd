use crmkit_model::{
    AliasedValue, ColumnSet, EarlyBound, Entity, EntityReference, ModelError, ParameterCollection,
    QueryByAttribute, Value,
};
use crmkit_types::{Money, OptionSetEnum, OptionSetValue, RecordId};
use pretty_assertions::assert_eq;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy)]
enum Priority {
    Low = 1,
    High = 3,
}

impl OptionSetEnum for Priority {
    fn option_value(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone)]
struct Account(Entity);

impl EarlyBound for Account {
    const LOGICAL_NAME: &'static str = "account";

    fn from_entity(entity: Entity) -> Self {
        Self(entity)
    }

    fn as_entity(&self) -> &Entity {
        &self.0
    }

    fn into_entity(self) -> Entity {
        self.0
    }
}

fn make_joined_row() -> Entity {
    let contact_id = RecordId::new();
    let mut row = Entity::with_id("account", RecordId::new());
    row.set(
        "pc.contactid",
        AliasedValue::new("contact", "contactid", contact_id),
    );
    row.set("pc.fullname", AliasedValue::new("contact", "fullname", "Ada Lovelace"));
    row.set("pc.priority", AliasedValue::new("contact", "priority", Value::from_enum(Priority::High)));
    row.set("pc.nickname", AliasedValue::new("contact", "nickname", Value::Null));
    row.formatted_values
        .insert("pc.priority".to_string(), "High".to_string());
    row
}

// ── Typed attribute reads ─────────────────────────────────────────

#[test]
fn typed_read_returns_value() {
    let entity = Entity::new("account").with("name", "Contoso").with("revenue", Money(12.5));
    assert_eq!(
        entity.get_attribute_value::<String>("name").unwrap(),
        Some("Contoso".to_string())
    );
    assert_eq!(
        entity.get_attribute_value::<Money>("revenue").unwrap(),
        Some(Money(12.5))
    );
}

#[test]
fn typed_read_absent_and_null_are_none() {
    let entity = Entity::new("account").with("name", Value::Null);
    assert_eq!(entity.get_attribute_value::<String>("name").unwrap(), None);
    assert_eq!(entity.get_attribute_value::<String>("missing").unwrap(), None);
}

#[test]
fn typed_read_wrong_type_is_cast_error() {
    let entity = Entity::new("account").with("count", 4);
    let err = entity.get_attribute_value::<String>("count").unwrap_err();
    assert!(matches!(
        err,
        ModelError::InvalidCast { expected: "string", found: "integer" }
    ));
}

#[test]
fn value_or_null_normalizes_enums() {
    let entity = Entity::new("account").with("priority", Value::from_enum(Priority::Low));
    assert_eq!(entity.value_or_null("priority"), Value::OptionSet(OptionSetValue(1)));
    assert_eq!(entity.value_or_null("missing"), Value::Null);
}

#[test]
fn option_from_none_is_null() {
    assert_eq!(Value::from(None::<String>), Value::Null);
    assert_eq!(Value::from(Some(5)), Value::Integer(5));
}

// ── References ────────────────────────────────────────────────────

#[test]
fn reference_equality_ignores_name() {
    let id = RecordId::new();
    let a = EntityReference::new("account", id).with_name("Contoso");
    let b = EntityReference::new("account", id);
    assert_eq!(a, b);

    let mut set = HashSet::new();
    set.insert(a);
    set.insert(b);
    assert_eq!(set.len(), 1);
}

#[test]
fn reference_differs_on_logical_name() {
    let id = RecordId::new();
    assert_ne!(EntityReference::new("account", id), EntityReference::new("contact", id));
}

#[test]
fn same_record_requires_non_empty_id() {
    let id = RecordId::new();
    assert!(Entity::with_id("account", id).same_record(&Entity::with_id("account", id)));
    assert!(!Entity::new("account").same_record(&Entity::new("account")));
}

#[test]
fn to_entity_reference_carries_identity() {
    let id = RecordId::new();
    let reference = Entity::with_id("account", id).to_entity_reference();
    assert_eq!(reference.id, id);
    assert_eq!(reference.logical_name, "account");
}

// ── Aliased values ────────────────────────────────────────────────

#[test]
fn aliased_value_typed_read() {
    let row = make_joined_row();
    assert_eq!(
        row.get_aliased_value::<String>("pc", "fullname").unwrap(),
        Some("Ada Lovelace".to_string())
    );
    assert_eq!(
        row.get_aliased_value::<OptionSetValue>("pc", "priority").unwrap(),
        Some(OptionSetValue(3))
    );
}

#[test]
fn aliased_value_absent_or_null_is_none() {
    let row = make_joined_row();
    assert_eq!(row.get_aliased_value::<String>("pc", "nickname").unwrap(), None);
    assert_eq!(row.get_aliased_value::<String>("zz", "fullname").unwrap(), None);
}

#[test]
fn aliased_value_wrong_type_errors() {
    let row = make_joined_row();
    assert!(row.get_aliased_value::<i32>("pc", "fullname").is_err());
}

#[test]
fn aliased_formatted_value_falls_back() {
    let row = make_joined_row();
    assert_eq!(row.aliased_formatted_value("pc", "priority"), "High");
    assert_eq!(row.aliased_formatted_value("pc", "fullname"), "Ada Lovelace");
    assert_eq!(row.aliased_formatted_value("pc", "missing"), "");
}

#[test]
fn extract_aliased_builds_record() {
    let row = make_joined_row();
    let contact = row.extract_aliased("pc").unwrap();

    assert_eq!(contact.logical_name, "contact");
    assert!(!contact.id.is_empty());
    assert_eq!(contact.get("fullname"), Some(&Value::from("Ada Lovelace")));
    assert_eq!(contact.formatted_value("priority"), "High");
    assert!(row.extract_aliased("nope").is_none());
}

// ── Early-bound projection ────────────────────────────────────────

#[test]
fn early_bound_rejects_other_types() {
    assert!(Account::try_from_entity(Entity::new("account")).is_ok());
    assert!(matches!(
        Account::try_from_entity(Entity::new("contact")),
        Err(ModelError::LogicalNameMismatch { .. })
    ));
}

#[test]
fn dynamic_entity_accepts_anything() {
    let entity = Entity::try_from_entity(Entity::new("anything")).unwrap();
    assert_eq!(entity.logical_name, "anything");
}

// ── Parameters and queries ────────────────────────────────────────

#[test]
fn parameter_collection_typed_reads() {
    let mut params = ParameterCollection::new();
    params.insert("Target", Entity::new("account"));
    params.insert("Count", 3);

    assert!(params.contains("Target"));
    assert_eq!(params.get_as::<Entity>("Target").unwrap().unwrap().logical_name, "account");
    assert!(params.get_as::<Entity>("Count").is_err());
    assert_eq!(params.get_as::<i32>("Missing").unwrap(), None);
}

#[test]
fn query_matches_on_normalized_values() {
    let record = Entity::new("account")
        .with("priority", OptionSetValue(3))
        .with("name", "Contoso");
    let query = QueryByAttribute::new("account")
        .with_condition("priority", Value::from_enum(Priority::High))
        .with_condition("name", "Contoso");
    assert!(query.matches(&record));
    assert!(!QueryByAttribute::new("contact").matches(&record));
}

#[test]
fn column_set_projects_selected_fields() {
    let record = Entity::with_id("account", RecordId::new())
        .with("name", "Contoso")
        .with("city", "Oslo");
    let projected = ColumnSet::columns(["name"]).project(&record);
    assert_eq!(projected.id, record.id);
    assert!(projected.contains("name"));
    assert!(!projected.contains("city"));
    assert_eq!(ColumnSet::All.project(&record), record);
}

#[test]
fn entity_serialization_roundtrip() {
    let record = Entity::with_id("account", RecordId::new())
        .with("name", "Contoso")
        .with("owner", EntityReference::new("systemuser", RecordId::new()));
    let json = serde_json::to_string(&record).unwrap();
    let parsed: Entity = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, record);
}
