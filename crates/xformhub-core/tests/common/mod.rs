use xformhub_core::model::FormDef;
use xformhub_core::xsd;

/// Registration example: a device id and a repeating list of users
#[allow(dead_code)]
pub const USERS_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema"
            targetNamespace="urn:test" elementFormDefault="qualified">
  <xsd:element name="data">
    <xsd:complexType>
      <xsd:sequence>
        <xsd:element name="device_id" type="xsd:string" minOccurs="1"/>
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

#[allow(dead_code)]
pub const USERS_INSTANCE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<data xmlns="urn:test">
  <device_id>RKEBWRSWIAFQ5VGKRC93YBV2C</device_id>
  <users>
    <username>siwema</username>
  </users>
</data>"#;

/// A household visit form with a meta block, selects and a multi-select
#[allow(dead_code)]
pub const VISIT_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           targetNamespace="http://dev.test.org/household/visit" version="4" uiVersion="2">
  <xs:simpleType name="yesno">
    <xs:restriction base="xs:string">
      <xs:enumeration value="yes"/>
      <xs:enumeration value="no"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:simpleType name="danger_sign">
    <xs:restriction base="xs:string">
      <xs:enumeration value="fever"/>
      <xs:enumeration value="convulsions"/>
      <xs:enumeration value="bleeding"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:simpleType name="danger_signs">
    <xs:list itemType="danger_sign"/>
  </xs:simpleType>
  <xs:element name="visit">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="meta">
          <xs:complexType>
            <xs:sequence>
              <xs:element name="DeviceID" type="xs:string"/>
              <xs:element name="TimeStart" type="xs:dateTime"/>
              <xs:element name="TimeEnd" type="xs:dateTime"/>
              <xs:element name="username" type="xs:string"/>
              <xs:element name="chw_id" type="xs:string"/>
              <xs:element name="uid" type="xs:string"/>
            </xs:sequence>
          </xs:complexType>
        </xs:element>
        <xs:element name="household_id" type="xs:string" minOccurs="1"/>
        <xs:element name="visit_date" type="xs:date" minOccurs="1"/>
        <xs:element name="pregnant" type="yesno"/>
        <xs:element name="danger_signs" type="danger_signs"/>
        <xs:element name="member" minOccurs="0" maxOccurs="unbounded">
          <xs:complexType>
            <xs:sequence>
              <xs:element name="name" type="xs:string" minOccurs="1"/>
              <xs:element name="age" type="xs:int"/>
            </xs:sequence>
          </xs:complexType>
        </xs:element>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

#[allow(dead_code)]
pub fn parse(xsd_text: &str) -> FormDef {
    xsd::parse_str(xsd_text).expect("fixture schema should parse")
}
