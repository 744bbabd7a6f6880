use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::simple_type::SimpleType;

/// Index of an [`ElementDef`] inside its owning [`FormDef`](super::FormDef) arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub(crate) usize);

impl ElementId {
    /// Position of the element in the arena
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Primitive type a scalar value must coerce to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    String,
    Int,
    Decimal,
    Double,
    Boolean,
    Date,
    DateTime,
    Time,
    GYear,
    GMonth,
    GDay,
    GYearMonth,
    GMonthDay,
    Base64Binary,
    HexBinary,
    AnyUri,
    /// Single choice from a named enumeration
    Select(String),
    /// Whitespace-separated choices from a named list type
    MultiSelect(String),
}

impl DataType {
    /// Resolve a declared `type` attribute against the builtin XSD types and
    /// the form's named simple types.
    ///
    /// Unknown or absent types fall back to `String`.
    pub fn resolve(declared: Option<&str>, types: &BTreeMap<String, SimpleType>) -> DataType {
        let Some(declared) = declared.map(str::trim).filter(|t| !t.is_empty()) else {
            return DataType::String;
        };
        let local = declared.rsplit(':').next().unwrap_or(declared);

        match local.to_ascii_lowercase().as_str() {
            "string" | "normalizedstring" | "token" => return DataType::String,
            "int" | "integer" | "long" | "short" | "byte" | "nonnegativeinteger"
            | "positiveinteger" => return DataType::Int,
            "decimal" => return DataType::Decimal,
            "double" | "float" => return DataType::Double,
            "boolean" => return DataType::Boolean,
            "date" => return DataType::Date,
            "datetime" => return DataType::DateTime,
            "time" => return DataType::Time,
            "gyear" => return DataType::GYear,
            "gmonth" => return DataType::GMonth,
            "gday" => return DataType::GDay,
            "gyearmonth" => return DataType::GYearMonth,
            "gmonthday" => return DataType::GMonthDay,
            "base64binary" => return DataType::Base64Binary,
            "hexbinary" => return DataType::HexBinary,
            "anyuri" => return DataType::AnyUri,
            _ => {}
        }

        match types.get(local).or_else(|| types.get(declared)) {
            Some(simple) if simple.is_list => DataType::MultiSelect(simple.name.clone()),
            Some(simple) => DataType::Select(simple.name.clone()),
            None => {
                tracing::warn!(declared_type = declared, "unknown type, storing as string");
                DataType::String
            }
        }
    }

    /// Check that a present, non-empty value coerces to this type.
    ///
    /// Returns a human-readable reason on failure.
    pub fn coerce(&self, value: &str) -> std::result::Result<(), String> {
        let value = value.trim();
        let ok = match self {
            DataType::Int | DataType::GYear => value.parse::<i64>().is_ok(),
            DataType::Decimal | DataType::Double => value.parse::<f64>().is_ok(),
            DataType::Boolean => matches!(value, "true" | "false" | "1" | "0"),
            DataType::Date => NaiveDate::parse_from_str(strip_zone(value), "%Y-%m-%d").is_ok(),
            DataType::DateTime => is_datetime(value),
            DataType::Time => {
                let bare = strip_zone(value);
                NaiveTime::parse_from_str(bare, "%H:%M:%S%.f").is_ok()
                    || NaiveTime::parse_from_str(bare, "%H:%M").is_ok()
            }
            DataType::HexBinary => value.len() % 2 == 0 && value.bytes().all(|b| b.is_ascii_hexdigit()),
            DataType::String
            | DataType::GMonth
            | DataType::GDay
            | DataType::GYearMonth
            | DataType::GMonthDay
            | DataType::Base64Binary
            | DataType::AnyUri
            | DataType::Select(_)
            | DataType::MultiSelect(_) => true,
        };

        if ok {
            Ok(())
        } else {
            Err(format!("value '{}' is not a valid {}", value, self.label()))
        }
    }

    /// XSD-style name used in messages
    pub fn label(&self) -> &str {
        match self {
            DataType::String => "string",
            DataType::Int => "int",
            DataType::Decimal => "decimal",
            DataType::Double => "double",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
            DataType::DateTime => "dateTime",
            DataType::Time => "time",
            DataType::GYear => "gYear",
            DataType::GMonth => "gMonth",
            DataType::GDay => "gDay",
            DataType::GYearMonth => "gYearMonth",
            DataType::GMonthDay => "gMonthDay",
            DataType::Base64Binary => "base64Binary",
            DataType::HexBinary => "hexBinary",
            DataType::AnyUri => "anyURI",
            DataType::Select(name) | DataType::MultiSelect(name) => name,
        }
    }
}

fn is_datetime(value: &str) -> bool {
    if DateTime::parse_from_rfc3339(value).is_ok() {
        return true;
    }
    let bare = strip_zone(value);
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .any(|fmt| NaiveDateTime::parse_from_str(bare, fmt).is_ok())
}

/// Drop a trailing `Z` or `±HH:MM` zone designator
fn strip_zone(value: &str) -> &str {
    if let Some(stripped) = value.strip_suffix('Z') {
        return stripped;
    }
    let bytes = value.as_bytes();
    let len = bytes.len();
    if len > 6 && matches!(bytes[len - 6], b'+' | b'-') && bytes[len - 3] == b':' {
        return &value[..len - 6];
    }
    value
}

/// Shape of a schema node
///
/// A non-repeatable element starts out as `Scalar` and becomes a `Group` once
/// a child is declared under it. Repeatable elements are always `Repeat`; a
/// repeat without children is a repeated scalar of `item_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaNode {
    Scalar(DataType),
    Group(Vec<ElementId>),
    Repeat {
        children: Vec<ElementId>,
        item_type: DataType,
    },
}

/// One declared element or attribute of a form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDef {
    /// Local name as declared in the schema
    pub name: String,
    /// Path from the form root, e.g. `data/users/username`
    pub xpath: String,
    /// Raw `type` attribute, if any
    pub type_name: Option<String>,
    pub min_occurs: u32,
    /// `None` means unbounded
    pub max_occurs: Option<u32>,
    pub is_attribute: bool,
    /// Navigation only; the parent owns this element through its child list
    pub parent: Option<ElementId>,
    pub node: SchemaNode,
}

impl ElementDef {
    /// A non-repeatable, optional element of the given type
    pub fn element(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            xpath: String::new(),
            type_name: None,
            min_occurs: 0,
            max_occurs: Some(1),
            is_attribute: false,
            parent: None,
            node: SchemaNode::Scalar(data_type),
        }
    }

    /// An optional attribute of the given type
    pub fn attribute(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            is_attribute: true,
            ..Self::element(name, data_type)
        }
    }

    /// Mark as repeatable (`maxOccurs` unbounded)
    pub fn repeatable(mut self) -> Self {
        let item_type = self.value_type().cloned().unwrap_or(DataType::String);
        self.max_occurs = None;
        self.node = SchemaNode::Repeat {
            children: Vec::new(),
            item_type,
        };
        self
    }

    /// Mark as required (`minOccurs="1"`)
    pub fn required(mut self) -> Self {
        self.min_occurs = self.min_occurs.max(1);
        self
    }

    /// Record the raw declared type name
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn is_repeatable(&self) -> bool {
        matches!(self.node, SchemaNode::Repeat { .. })
    }

    pub fn is_required(&self) -> bool {
        self.min_occurs >= 1
    }

    /// Ordered child ids (empty for scalars)
    pub fn children(&self) -> &[ElementId] {
        match &self.node {
            SchemaNode::Scalar(_) => &[],
            SchemaNode::Group(children) => children,
            SchemaNode::Repeat { children, .. } => children,
        }
    }

    /// Type of the element's own text, for scalars and repeated scalars
    pub fn value_type(&self) -> Option<&DataType> {
        match &self.node {
            SchemaNode::Scalar(data_type) => Some(data_type),
            SchemaNode::Repeat {
                children,
                item_type,
            } if children.is_empty() => Some(item_type),
            _ => None,
        }
    }

    pub(crate) fn push_child(&mut self, child: ElementId) {
        match &mut self.node {
            SchemaNode::Scalar(_) => self.node = SchemaNode::Group(vec![child]),
            SchemaNode::Group(children) => children.push(child),
            SchemaNode::Repeat { children, .. } => children.push(child),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_types() -> BTreeMap<String, SimpleType> {
        BTreeMap::new()
    }

    #[test]
    fn test_resolve_builtin_types_ignores_prefix_and_case() {
        assert_eq!(DataType::resolve(Some("xsd:string"), &no_types()), DataType::String);
        assert_eq!(DataType::resolve(Some("xs:int"), &no_types()), DataType::Int);
        assert_eq!(DataType::resolve(Some("xsd:dateTime"), &no_types()), DataType::DateTime);
        assert_eq!(DataType::resolve(None, &no_types()), DataType::String);
    }

    #[test]
    fn test_resolve_named_simple_types() {
        let mut types = no_types();
        types.insert("gender".to_string(), SimpleType::enumeration("gender"));
        types.insert("list.symptoms".to_string(), SimpleType::list("list.symptoms"));

        assert_eq!(
            DataType::resolve(Some("gender"), &types),
            DataType::Select("gender".to_string())
        );
        assert_eq!(
            DataType::resolve(Some("list.symptoms"), &types),
            DataType::MultiSelect("list.symptoms".to_string())
        );
    }

    #[test]
    fn test_coerce_numbers() {
        assert!(DataType::Int.coerce("42").is_ok());
        assert!(DataType::Int.coerce(" 42 ").is_ok());
        assert!(DataType::Int.coerce("4.2").is_err());
        assert!(DataType::Decimal.coerce("4.2").is_ok());
        assert!(DataType::Decimal.coerce("four").is_err());
    }

    #[test]
    fn test_coerce_dates_and_times() {
        assert!(DataType::Date.coerce("2009-03-12").is_ok());
        assert!(DataType::Date.coerce("12/03/2009").is_err());
        assert!(DataType::DateTime.coerce("2009-03-12T14:23:15.000-05:00").is_ok());
        assert!(DataType::DateTime.coerce("2009-03-12 14:23:15").is_ok());
        assert!(DataType::DateTime.coerce("yesterday").is_err());
        assert!(DataType::Time.coerce("14:23:15.000Z").is_ok());
        assert!(DataType::Time.coerce("25:99").is_err());
    }

    #[test]
    fn test_repeatable_keeps_item_type() {
        let def = ElementDef::element("visit_date", DataType::Date).repeatable();
        assert!(def.is_repeatable());
        assert_eq!(def.value_type(), Some(&DataType::Date));
        assert_eq!(def.max_occurs, None);
    }

    #[test]
    fn test_push_child_turns_scalar_into_group() {
        let mut def = ElementDef::element("meta", DataType::String);
        def.push_child(ElementId(3));
        assert_eq!(def.node, SchemaNode::Group(vec![ElementId(3)]));
        assert_eq!(def.value_type(), None);
    }
}
