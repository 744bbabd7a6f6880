#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::*;
use xformhub_core::router::{Attachment, FnHandler};
use xformhub_core::NamespaceRouter;
use xformhub_engine::{handler_name, RegistryOptions, SchemaRegistry};
use xformhub_store::PopulateMode;

#[test]
fn test_end_to_end_populates_root_and_child() {
    // Given: the users schema registered in domain "demo"
    let registry = registry();
    let record = registry
        .add_schema("Users", USERS_XSD.as_bytes(), "demo")
        .unwrap();
    assert_eq!(record.target_namespace, "urn:test");

    // When: an instance is submitted
    let outcome = registry
        .submit(&Attachment::new("demo", USERS_INSTANCE).with_id("att-1"))
        .unwrap();

    // Then: it was routed to exactly one handler
    assert_eq!(outcome.namespace, "urn:test");
    assert_eq!(outcome.handlers, 1);

    // And: one root row with the device id, one child row pointing at it
    assert_eq!(
        query_i64(&registry, "SELECT COUNT(*) FROM x_demo_urn_test_data"),
        1
    );
    assert_eq!(
        query_i64(
            &registry,
            "SELECT COUNT(*) FROM x_demo_urn_test_data WHERE device_id = 'RKEBWRSWIAFQ5VGKRC93YBV2C'"
        ),
        1
    );
    assert_eq!(
        query_i64(&registry, "SELECT COUNT(*) FROM x_demo_urn_test_data_users"),
        1
    );
    assert_eq!(
        query_i64(
            &registry,
            "SELECT COUNT(*) FROM x_demo_urn_test_data_users u
             JOIN x_demo_urn_test_data d ON u._parent_id = d._id
             WHERE u.username = 'siwema'"
        ),
        1
    );

    let instances = registry.instances(record.id).unwrap();
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].attachment_id.as_deref(), Some("att-1"));
}

#[test]
fn test_add_then_remove_leaves_nothing() {
    let registry = registry();
    let record = registry
        .add_schema("Users", USERS_XSD.as_bytes(), "demo")
        .unwrap();
    registry
        .submit(&Attachment::new("demo", USERS_INSTANCE))
        .unwrap();
    assert_eq!(form_tables(&registry).len(), 2);

    registry.remove_schema(record.id).unwrap();

    assert!(form_tables(&registry).is_empty());
    assert_eq!(query_i64(&registry, "SELECT COUNT(*) FROM form_defs"), 0);
    assert_eq!(query_i64(&registry, "SELECT COUNT(*) FROM element_defs"), 0);
    assert_eq!(query_i64(&registry, "SELECT COUNT(*) FROM form_instances"), 0);
    assert!(!registry
        .router()
        .is_registered("urn:test", &handler_name("demo")));

    // a removed schema can be registered again
    registry
        .add_schema("Users", USERS_XSD.as_bytes(), "demo")
        .unwrap();
}

#[test]
fn test_remove_unknown_schema_is_not_found() {
    let registry = registry();
    let err = registry.remove_schema(42).unwrap_err();
    assert_eq!(err.code(), "ERR_NOT_FOUND");
}

#[test]
fn test_duplicate_schema_leaves_existing_untouched() {
    // Given: a registered schema with one stored instance
    let registry = registry();
    let first = registry
        .add_schema("Users", USERS_XSD.as_bytes(), "demo")
        .unwrap();
    registry
        .submit(&Attachment::new("demo", USERS_INSTANCE))
        .unwrap();

    // When: the same namespace is registered again in the same domain
    let identical = registry
        .add_schema("Users again", USERS_XSD.as_bytes(), "demo")
        .unwrap_err();
    let changed = registry
        .add_schema("Users v2", USERS_XSD_V2.as_bytes(), "demo")
        .unwrap_err();

    // Then: both fail as duplicates, annotated with how they differ
    assert_eq!(identical.code(), "ERR_DUPLICATE_SCHEMA");
    assert!(identical.message().contains("identical"));
    assert_eq!(changed.code(), "ERR_DUPLICATE_SCHEMA");
    assert!(changed.message().contains("differs"));
    assert_eq!(changed.form_id(), Some(first.id));

    // And: the existing form, its tables and its data are intact
    assert_eq!(registry.list_schemas().unwrap().len(), 1);
    assert_eq!(form_tables(&registry).len(), 2);
    assert_eq!(
        query_i64(&registry, "SELECT COUNT(*) FROM x_demo_urn_test_data"),
        1
    );
}

#[test]
fn test_same_namespace_in_two_domains() {
    let registry = registry();
    registry
        .add_schema("Users", USERS_XSD.as_bytes(), "demo")
        .unwrap();
    registry
        .add_schema("Users", USERS_XSD.as_bytes(), "other")
        .unwrap();

    // both handlers are routed, only the submitting domain takes it
    let outcome = registry
        .submit(&Attachment::new("other", USERS_INSTANCE))
        .unwrap();
    assert_eq!(outcome.handlers, 1);
    assert_eq!(registry.router().handlers("urn:test").len(), 2);
    assert_eq!(
        query_i64(&registry, "SELECT COUNT(*) FROM x_other_urn_test_data"),
        1
    );
    assert_eq!(
        query_i64(&registry, "SELECT COUNT(*) FROM x_demo_urn_test_data"),
        0
    );
}

#[test]
fn test_submit_from_unregistered_domain_is_unhandled() {
    // Given: the schema registered in "demo" only
    let registry = registry();
    let record = registry
        .add_schema("Users", USERS_XSD.as_bytes(), "demo")
        .unwrap();

    // When: a urn:test instance arrives for domain "other"
    let outcome = registry
        .submit(&Attachment::new("other", USERS_INSTANCE))
        .unwrap();

    // Then: no handler took it and nothing was stored
    assert_eq!(outcome.namespace, "urn:test");
    assert_eq!(outcome.handlers, 0);
    assert!(registry.instances(record.id).unwrap().is_empty());
    assert_eq!(
        query_i64(&registry, "SELECT COUNT(*) FROM x_demo_urn_test_data"),
        0
    );
}

#[test]
fn test_submission_meta_block_is_recorded() {
    let registry = registry();
    let record = registry
        .add_schema("Users", USERS_XSD.as_bytes(), "demo")
        .unwrap();
    let xml = r#"<data xmlns="urn:test" version="2" uiversion="5">
  <device_id>D1</device_id>
  <meta><deviceid>phone-1</deviceid><username>juma</username></meta>
</data>"#;

    registry.submit(&Attachment::new("demo", xml)).unwrap();

    let instance = registry.instances(record.id).unwrap().remove(0);
    assert_eq!(instance.version, Some(2));
    assert_eq!(instance.uiversion, Some(5));
    assert_eq!(
        query_i64(
            &registry,
            "SELECT COUNT(*) FROM instance_meta WHERE value IS NOT NULL"
        ),
        2
    );
    assert_eq!(
        query_i64(&registry, "SELECT COUNT(*) FROM instance_meta"),
        6
    );
}

#[test]
fn test_missing_namespace_creates_nothing() {
    let registry = registry();
    let xsd = r#"<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema">
  <xsd:element name="data" type="xsd:string"/>
</xsd:schema>"#;

    let err = registry.add_schema("Bad", xsd.as_bytes(), "demo").unwrap_err();

    assert_eq!(err.code(), "ERR_MISSING_NAMESPACE");
    assert!(form_tables(&registry).is_empty());
    assert!(registry.list_schemas().unwrap().is_empty());
}

#[test]
fn test_colliding_identifiers_are_rejected_at_creation() {
    // Given: two fields whose names only differ before the truncation point
    let long = "x".repeat(70);
    let xsd = format!(
        r#"<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:long">
  <xsd:element name="data">
    <xsd:complexType>
      <xsd:sequence>
        <xsd:element name="first_{long}" type="xsd:string"/>
        <xsd:element name="second_{long}" type="xsd:string"/>
      </xsd:sequence>
    </xsd:complexType>
  </xsd:element>
</xsd:schema>"#
    );
    let registry = registry();

    // When / Then: checking reports the collision and adding refuses
    let (_, check) = registry.check_schema_source(xsd.as_bytes()).unwrap();
    assert!(!check.is_ok());

    let err = registry.add_schema("Long", xsd.as_bytes(), "demo").unwrap_err();
    assert_eq!(err.code(), "ERR_IDENTIFIER_COLLISION");
    assert!(form_tables(&registry).is_empty());
    assert!(registry.list_schemas().unwrap().is_empty());
}

#[test]
fn test_submit_unknown_namespace_is_noop() {
    let registry = registry();
    let outcome = registry
        .submit(&Attachment::new("demo", r#"<data xmlns="unused_ns"/>"#))
        .unwrap();
    assert_eq!(outcome.handlers, 0);
}

#[test]
fn test_submit_without_namespace_fails() {
    let registry = registry();
    let err = registry
        .submit(&Attachment::new("demo", "<data/>"))
        .unwrap_err();
    assert_eq!(err.code(), "ERR_INSTANCE_PARSE");
    assert!(err.message().contains("namespace"));
}

#[test]
fn test_strict_mode_rejects_invalid_submission() {
    let registry = registry_with(RegistryOptions {
        populate_mode: PopulateMode::Strict,
        ..RegistryOptions::default()
    });
    let xsd = USERS_XSD.replace(
        r#"name="device_id" type="xsd:string""#,
        r#"name="device_id" type="xsd:string" minOccurs="1""#,
    );
    registry.add_schema("Users", xsd.as_bytes(), "demo").unwrap();

    let attachment = Attachment::new(
        "demo",
        r#"<data xmlns="urn:test"><users><username>siwema</username></users></data>"#,
    );
    let err = registry.submit(&attachment).unwrap_err();

    assert_eq!(err.code(), "ERR_VALIDATION_FAILED");
    assert_eq!(err.request_id(), Some(&attachment.request_id));
    assert_eq!(
        query_i64(&registry, "SELECT COUNT(*) FROM x_demo_urn_test_data"),
        0
    );
}

#[test]
fn test_remove_instance() {
    let registry = registry();
    let record = registry
        .add_schema("Users", USERS_XSD.as_bytes(), "demo")
        .unwrap();
    registry
        .submit(&Attachment::new("demo", USERS_INSTANCE))
        .unwrap();
    let instance = registry.instances(record.id).unwrap().remove(0);

    let deleted = registry
        .remove_instance(record.id, instance.root_row_id)
        .unwrap();

    assert_eq!(deleted, 2);
    assert!(registry.instances(record.id).unwrap().is_empty());
    assert_eq!(
        query_i64(&registry, "SELECT COUNT(*) FROM x_demo_urn_test_data_users"),
        0
    );
    assert_eq!(
        registry.remove_instance(999, 1).unwrap_err().code(),
        "ERR_NOT_FOUND"
    );
}

#[test]
fn test_registry_routes_are_idempotent() {
    // Given: a registered schema and an extra observer on its namespace
    let registry = registry();
    registry
        .add_schema("Users", USERS_XSD.as_bytes(), "demo")
        .unwrap();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let observer = Arc::new(FnHandler::new("observer", move |_, _, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }));
    for _ in 0..3 {
        registry.router().register("urn:test", observer.clone());
    }

    // When: routes are restored on top of the live ones
    assert_eq!(registry.restore_routes().unwrap(), 0);
    registry
        .submit(&Attachment::new("demo", USERS_INSTANCE))
        .unwrap();

    // Then: each handler ran exactly once
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(
        query_i64(&registry, "SELECT COUNT(*) FROM x_demo_urn_test_data"),
        1
    );
    assert_eq!(
        registry.router().handlers("urn:test"),
        vec![handler_name("demo"), "observer".to_string()]
    );
}

#[test]
fn test_restore_routes_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");

    {
        let registry = SchemaRegistry::open(
            &path,
            Arc::new(NamespaceRouter::new()),
            RegistryOptions::default(),
        )
        .unwrap();
        registry
            .add_schema("Users", USERS_XSD.as_bytes(), "demo")
            .unwrap();
    }

    // A new process starts with an empty router
    let registry = SchemaRegistry::open(
        &path,
        Arc::new(NamespaceRouter::new()),
        RegistryOptions::default(),
    )
    .unwrap();
    assert_eq!(
        registry
            .submit(&Attachment::new("demo", USERS_INSTANCE))
            .unwrap()
            .handlers,
        0
    );

    assert_eq!(registry.restore_routes().unwrap(), 1);
    assert_eq!(
        registry
            .submit(&Attachment::new("demo", USERS_INSTANCE))
            .unwrap()
            .handlers,
        1
    );
    assert_eq!(
        query_i64(&registry, "SELECT COUNT(*) FROM x_demo_urn_test_data"),
        1
    );
}
