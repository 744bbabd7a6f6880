//! CLI integration tests
//!
//! Drive the built binary against an on-disk store in a temp directory.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const USERS_XSD: &str = r#"<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:test">
  <xsd:element name="data">
    <xsd:complexType>
      <xsd:sequence>
        <xsd:element name="device_id" type="xsd:string"/>
        <xsd:element name="users" maxOccurs="unbounded">
          <xsd:complexType>
            <xsd:sequence>
              <xsd:element name="username" type="xsd:string"/>
            </xsd:sequence>
          </xsd:complexType>
        </xsd:element>
      </xsd:sequence>
    </xsd:complexType>
  </xsd:element>
</xsd:schema>"#;

const USERS_V2_XSD: &str = r#"<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:test">
  <xsd:element name="data">
    <xsd:complexType>
      <xsd:sequence>
        <xsd:element name="device_id" type="xsd:int"/>
        <xsd:element name="village" type="xsd:string"/>
      </xsd:sequence>
    </xsd:complexType>
  </xsd:element>
</xsd:schema>"#;

const USERS_INSTANCE: &str = r#"<data xmlns="urn:test">
  <device_id>RKEBWRSWIAFQ5VGKRC93YBV2C</device_id>
  <users><username>siwema</username></users>
</data>"#;

const NO_NAMESPACE_XSD: &str = r#"<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema">
  <xsd:element name="data" type="xsd:string"/>
</xsd:schema>"#;

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn run(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_xformhub"))
        .current_dir(dir.path())
        .args(args)
        .output()
        .expect("Failed to execute CLI")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "CLI command should succeed. Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_cli_add_submit_list_remove() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "users.xsd", USERS_XSD);
    write(temp_dir.path(), "instance.xml", USERS_INSTANCE);
    let db = temp_dir.path().join("store.db");
    let db = db.to_str().unwrap();

    // add
    let output = run(&temp_dir, &["schema", "add", "users.xsd", "--domain", "demo", "--db", db]);
    assert_success(&output);
    let out = stdout(&output);
    assert!(out.contains("namespace: urn:test"));
    assert!(out.contains("x_demo_urn_test_data_users"));

    // submit runs in a fresh process, so routes come back from the store
    let output = run(&temp_dir, &["submit", "instance.xml", "--domain", "demo", "--db", db]);
    assert_success(&output);
    assert!(stdout(&output).contains("Submission stored"));

    let conn = Connection::open(db).unwrap();
    let username: String = conn
        .query_row(
            "SELECT u.username FROM x_demo_urn_test_data_users u
             JOIN x_demo_urn_test_data d ON u._parent_id = d._id
             WHERE d.device_id = 'RKEBWRSWIAFQ5VGKRC93YBV2C'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(username, "siwema");
    drop(conn);

    // list
    let output = run(&temp_dir, &["schema", "list", "--db", db]);
    assert_success(&output);
    assert!(stdout(&output).contains("urn:test"));

    // remove
    let output = run(&temp_dir, &["schema", "remove", "1", "--db", db]);
    assert_success(&output);

    let output = run(&temp_dir, &["schema", "list", "--db", db]);
    assert_success(&output);
    assert!(stdout(&output).contains("No schemas registered"));

    let conn = Connection::open(db).unwrap();
    let tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name LIKE 'x\\_%' ESCAPE '\\'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(tables, 0);
}

#[test]
fn test_cli_duplicate_add_fails() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "users.xsd", USERS_XSD);

    assert_success(&run(&temp_dir, &["schema", "add", "users.xsd", "--domain", "demo"]));
    let output = run(&temp_dir, &["schema", "add", "users.xsd", "--domain", "demo"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ERR_DUPLICATE_SCHEMA"));
    // default store location
    assert!(temp_dir.path().join(".xformhub/store.db").exists());
}

#[test]
fn test_cli_submit_unregistered_namespace_fails() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "instance.xml", USERS_INSTANCE);

    let output = run(&temp_dir, &["submit", "instance.xml", "--domain", "demo"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no schema registered"));
}

#[test]
fn test_cli_submit_from_other_domain_fails() {
    // Given: the schema registered in domain "demo"
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "users.xsd", USERS_XSD);
    write(temp_dir.path(), "instance.xml", USERS_INSTANCE);
    assert_success(&run(&temp_dir, &["schema", "add", "users.xsd", "--domain", "demo"]));

    // When: the instance is submitted for domain "other"
    let output = run(&temp_dir, &["submit", "instance.xml", "--domain", "other"]);

    // Then: the command fails and no row is stored
    assert!(!output.status.success());
    assert!(!stdout(&output).contains("Submission stored"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no schema registered"));
    let conn = Connection::open(temp_dir.path().join(".xformhub/store.db")).unwrap();
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM form_instances", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 0);
}

#[test]
fn test_cli_check_reports_warnings_and_errors() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "users.xsd", USERS_XSD);
    write(temp_dir.path(), "bad.xsd", NO_NAMESPACE_XSD);

    let output = run(&temp_dir, &["schema", "check", "users.xsd"]);
    assert_success(&output);
    let out = stdout(&output);
    assert!(out.contains("warning: No version number found"));
    assert!(out.contains("is valid"));

    let output = run(&temp_dir, &["schema", "check", "bad.xsd"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("namespace"));
}

#[test]
fn test_cli_diff() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "v1.xsd", USERS_XSD);
    write(temp_dir.path(), "v2.xsd", USERS_V2_XSD);

    let output = run(&temp_dir, &["schema", "diff", "v1.xsd", "v1.xsd"]);
    assert_success(&output);
    assert!(stdout(&output).contains("no differences"));

    let output = run(&temp_dir, &["schema", "diff", "v1.xsd", "v2.xsd"]);
    assert_success(&output);
    let out = stdout(&output);
    assert!(out.contains("added: data/village"));
    assert!(out.contains("data/users"));
    assert!(out.contains("type changed: data/device_id"));
}

#[test]
fn test_cli_bundle_validate() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "good/forms/users.xsd", USERS_XSD);
    write(temp_dir.path(), "good/readme.txt", "not a form");
    write(temp_dir.path(), "bad/users.xsd", USERS_XSD);
    write(temp_dir.path(), "bad/nested/deep/broken.xsd", NO_NAMESPACE_XSD);

    let output = run(&temp_dir, &["bundle", "validate", "good"]);
    assert_success(&output);
    let out = stdout(&output);
    assert!(out.contains("ok: forms/users.xsd (urn:test)"));
    assert!(out.contains("1 form(s) valid"));

    let output = run(&temp_dir, &["bundle", "validate", "bad"]);
    assert!(!output.status.success());
    let out = stdout(&output);
    assert!(out.contains("error: nested/deep/broken.xsd"));
    assert!(out.contains("namespace"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("1 form(s) in the bundle failed validation"));
}
