#![allow(dead_code)]

use std::sync::Arc;

use xformhub_core::NamespaceRouter;
use xformhub_engine::{RegistryOptions, SchemaRegistry};

pub const USERS_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:test">
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

pub const USERS_INSTANCE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<data xmlns="urn:test">
  <device_id>RKEBWRSWIAFQ5VGKRC93YBV2C</device_id>
  <users>
    <username>siwema</username>
  </users>
</data>"#;

/// Same namespace, one more field
pub const USERS_XSD_V2: &str = r#"<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:test">
  <xsd:element name="data">
    <xsd:complexType>
      <xsd:sequence>
        <xsd:element name="device_id" type="xsd:string"/>
        <xsd:element name="village" type="xsd:string"/>
      </xsd:sequence>
    </xsd:complexType>
  </xsd:element>
</xsd:schema>"#;

pub fn registry() -> SchemaRegistry {
    registry_with(RegistryOptions::default())
}

pub fn registry_with(options: RegistryOptions) -> SchemaRegistry {
    SchemaRegistry::in_memory(Arc::new(NamespaceRouter::new()), options)
        .expect("in-memory registry")
}

/// Names of the tables created for forms
pub fn form_tables(registry: &SchemaRegistry) -> Vec<String> {
    registry
        .with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'x\\_%' ESCAPE '\\'
                     ORDER BY name",
                )
                .unwrap();
            let names = stmt
                .query_map([], |row| row.get(0))
                .unwrap()
                .collect::<Result<Vec<String>, _>>()
                .unwrap();
            Ok(names)
        })
        .unwrap()
}

pub fn query_i64(registry: &SchemaRegistry, sql: &str) -> i64 {
    registry
        .with_connection(|conn| Ok(conn.query_row(sql, [], |row| row.get(0)).unwrap()))
        .unwrap()
}
