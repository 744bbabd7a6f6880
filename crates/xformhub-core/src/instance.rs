//! Helpers for reading submitted instance documents
//!
//! Instance element names are matched against schema names by local name,
//! ignoring namespace prefixes and ASCII case.

use roxmltree::{Document, Node, ParsingOptions};

use crate::errors::{Result, XFormError};
use crate::model::force_to_int;

/// Parse an instance document
///
/// # Errors
///
/// Returns `InstanceParse` when the document is not well-formed XML.
pub fn parse_instance(xml: &str) -> Result<Document<'_>> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    Document::parse_with_options(xml, options).map_err(|e| XFormError::InstanceParse {
        message: format!("XML: {}", e),
    })
}

/// Namespace and integer version declared on an instance's root element
///
/// # Errors
///
/// Returns `InstanceParse` when the document is malformed or its root
/// carries no namespace.
pub fn sniff_namespace(xml: &str) -> Result<(String, Option<u32>)> {
    let doc = parse_instance(xml)?;
    let root = doc.root_element();
    let namespace = root
        .tag_name()
        .namespace()
        .map(str::trim)
        .filter(|ns| !ns.is_empty())
        .ok_or_else(|| XFormError::InstanceParse {
            message: format!(
                "no namespace (xmlns) declared on instance root <{}>",
                root.tag_name().name()
            ),
        })?;
    let version = root
        .attributes()
        .find(|a| a.name().eq_ignore_ascii_case("version"))
        .and_then(|a| force_to_int(a.value()));
    Ok((namespace.to_string(), version))
}

/// True when `node` is an element whose local name matches `name`
pub fn is_named(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name().eq_ignore_ascii_case(name)
}

/// Child elements of `node` named `name`, in document order
pub fn children_named<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |n| is_named(n, name))
}

/// Attribute value by local name, ignoring ASCII case
pub fn attribute<'a>(node: &Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes()
        .find(|a| a.name().eq_ignore_ascii_case(name))
        .map(|a| a.value())
}

/// Concatenated, trimmed text content of an element; `None` when blank
pub fn text_value(node: &Node) -> Option<String> {
    let text: String = node
        .children()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
