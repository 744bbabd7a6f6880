//! XSD to schema model parser
//!
//! Only the subset of XML Schema that form designers emit is understood:
//! nested `element` declarations (inline or via a named `complexType`),
//! `attribute`s, and named or inline `simpleType` restrictions and lists.
//! Structural wrappers (`complexType`, `sequence`, `all`, `choice`,
//! `complexContent`, ...) are flattened into the nearest element ancestor.

use roxmltree::{Document, Node, ParsingOptions};
use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use crate::errors::{Result, XFormError};
use crate::model::{DataType, ElementDef, ElementId, FormDef, SchemaNode, SimpleType};

/// Name of a top-level wrapper element that is not itself a form field
pub const PASSTHROUGH_ROOT: &str = "root";

/// Parse an XSD from any reader
///
/// # Errors
///
/// See [`parse_str`]. Read failures are reported as `SchemaParse`.
pub fn parse<R: Read>(mut reader: R) -> Result<FormDef> {
    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .map_err(|e| XFormError::SchemaParse {
            message: format!("could not read schema: {}", e),
        })?;
    parse_str(&content)
}

/// Parse an XSD document held in memory
///
/// # Errors
///
/// - `SchemaParse` when the document is not well-formed, is not a schema,
///   does not declare exactly one form root, or uses unsupported constructs
/// - `MissingNamespace` when the schema has no `targetNamespace`
pub fn parse_str(xsd: &str) -> Result<FormDef> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let doc = Document::parse_with_options(xsd, options).map_err(|e| XFormError::SchemaParse {
        message: format!("XML: {}", e),
    })?;
    let schema = doc.root_element();
    if schema.tag_name().name() != "schema" {
        return Err(XFormError::SchemaParse {
            message: format!(
                "root element must be xs:schema, found <{}>",
                schema.tag_name().name()
            ),
        });
    }

    let mut roots = Vec::new();
    collect_roots(schema, &mut roots);
    let form_name = roots
        .first()
        .and_then(|n| n.attribute("name"))
        .unwrap_or("unknown")
        .to_string();

    let namespace = attribute_ci(schema, "targetNamespace")
        .map(str::trim)
        .filter(|ns| !ns.is_empty())
        .ok_or_else(|| XFormError::MissingNamespace {
            form_name: form_name.clone(),
        })?
        .to_string();

    let root = match roots.as_slice() {
        [single] => *single,
        other => {
            return Err(XFormError::SchemaParse {
                message: format!(
                    "expected exactly one root element, found {}",
                    other.len()
                ),
            })
        }
    };

    let mut form = FormDef::new(namespace, form_name);
    form.set_versions(
        attribute_ci(schema, "version"),
        attribute_ci(schema, "uiversion"),
    );
    form.types = collect_simple_types(schema);

    let mut walker = Walker {
        complex_types: collect_complex_types(schema),
        expanding: Vec::new(),
    };
    let root_id = form.root();
    walker.expand_element_content(&mut form, root_id, root)?;
    if let Some(named) = walker.named_complex_type(root.attribute("type")) {
        walker.expand_named(&mut form, root_id, named)?;
    }

    tracing::debug!(
        namespace = %form.target_namespace,
        form_name = %form.form_name,
        element_count = form.len(),
        "parsed schema"
    );
    Ok(form)
}

/// Attribute lookup ignoring ASCII case of the local name
fn attribute_ci<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes()
        .find(|a| a.name().eq_ignore_ascii_case(name))
        .map(|a| a.value())
}

fn local<'a, 'input>(node: &Node<'a, 'input>) -> &'input str {
    node.tag_name().name()
}

fn element_children<'a, 'input>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

/// Top-level element declarations, seeing through a `root` wrapper
fn collect_roots<'a, 'input>(node: Node<'a, 'input>, out: &mut Vec<Node<'a, 'input>>) {
    for child in element_children(node) {
        match local(&child) {
            "element" => {
                let is_passthrough = child
                    .attribute("name")
                    .map(|n| n.eq_ignore_ascii_case(PASSTHROUGH_ROOT))
                    .unwrap_or(false);
                if is_passthrough {
                    collect_nested_elements(child, out);
                } else {
                    out.push(child);
                }
            }
            "complexType" | "simpleType" | "annotation" | "import" | "include" => {}
            _ => collect_roots(child, out),
        }
    }
}

/// First element declarations below `node`, through structural wrappers
fn collect_nested_elements<'a, 'input>(node: Node<'a, 'input>, out: &mut Vec<Node<'a, 'input>>) {
    for child in element_children(node) {
        match local(&child) {
            "element" => out.push(child),
            "simpleType" | "annotation" | "attribute" => {}
            _ => collect_nested_elements(child, out),
        }
    }
}

fn collect_complex_types<'a, 'input>(schema: Node<'a, 'input>) -> HashMap<String, Node<'a, 'input>> {
    element_children(schema)
        .filter(|n| local(n) == "complexType")
        .filter_map(|n| n.attribute("name").map(|name| (name.to_string(), n)))
        .collect()
}

/// Named simple types; lists are resolved after plain restrictions so that
/// `itemType` can refer to any enumeration in the schema
fn collect_simple_types(schema: Node) -> BTreeMap<String, SimpleType> {
    let named: Vec<(String, Node)> = element_children(schema)
        .filter(|n| local(n) == "simpleType")
        .filter_map(|n| n.attribute("name").map(|name| (name.to_string(), n)))
        .collect();

    let mut types = BTreeMap::new();
    for (name, node) in named.iter().filter(|(_, n)| find_child(*n, "list").is_none()) {
        types.insert(name.clone(), simple_type(name, *node, &BTreeMap::new()));
    }
    for (name, node) in named.iter().filter(|(_, n)| find_child(*n, "list").is_some()) {
        let parsed = simple_type(name, *node, &types);
        types.insert(name.clone(), parsed);
    }
    types
}

fn find_child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    element_children(node).find(|n| local(n) == name)
}

fn enumerations(restriction: Node) -> Vec<String> {
    element_children(restriction)
        .filter(|n| local(n) == "enumeration")
        .filter_map(|n| n.attribute("value").map(str::to_string))
        .collect()
}

fn simple_type(name: &str, node: Node, known: &BTreeMap<String, SimpleType>) -> SimpleType {
    if let Some(list) = find_child(node, "list") {
        let mut values = Vec::new();
        if let Some(item_type) = list.attribute("itemType") {
            let key = item_type.rsplit(':').next().unwrap_or(item_type);
            if let Some(item) = known.get(key).or_else(|| known.get(item_type)) {
                values = item.allowable_values.clone();
            }
        } else if let Some(restriction) =
            find_child(list, "simpleType").and_then(|st| find_child(st, "restriction"))
        {
            values = enumerations(restriction);
        }
        return SimpleType::list(name).with_values(values);
    }

    let mut simple = SimpleType::enumeration(name);
    if let Some(restriction) = find_child(node, "restriction") {
        simple.base = restriction.attribute("base").map(str::to_string);
        simple.allowable_values = enumerations(restriction);
    }
    simple
}

struct Walker<'a, 'input> {
    complex_types: HashMap<String, Node<'a, 'input>>,
    /// Named complex types currently being expanded, for cycle detection
    expanding: Vec<String>,
}

impl<'a, 'input> Walker<'a, 'input> {
    /// Walk the content of `node` and attach declarations under `parent`
    fn expand_element_content(
        &mut self,
        form: &mut FormDef,
        parent: ElementId,
        node: Node<'a, 'input>,
    ) -> Result<()> {
        for child in element_children(node) {
            match local(&child) {
                "element" => self.element(form, parent, child)?,
                "attribute" => attribute(form, parent, child)?,
                "simpleType" | "annotation" | "documentation" | "appinfo" => {}
                _ => self.expand_element_content(form, parent, child)?,
            }
        }
        Ok(())
    }

    fn element(&mut self, form: &mut FormDef, parent: ElementId, node: Node<'a, 'input>) -> Result<()> {
        let Some(name) = node.attribute("name") else {
            let message = match node.attribute("ref") {
                Some(reference) => format!("element references are not supported (ref=\"{}\")", reference),
                None => "element declaration without a name".to_string(),
            };
            return Err(XFormError::SchemaParse { message });
        };

        let min_occurs = occurs(node.attribute("minOccurs"), 0)?;
        let max_occurs = match node.attribute("maxOccurs").map(str::trim) {
            Some("unbounded") => None,
            Some(raw) => Some(occurs(Some(raw), 1)?),
            None => Some(1),
        };

        let type_name = node.attribute("type");
        let named_complex = self.named_complex_type(type_name);

        let data_type = if named_complex.is_some() {
            DataType::String
        } else {
            DataType::resolve(type_name, &form.types)
        };

        let mut def = ElementDef::element(name, data_type);
        def.type_name = type_name.map(str::to_string);
        if max_occurs.map(|m| m > 1).unwrap_or(true) {
            def = def.repeatable();
        }
        def.min_occurs = min_occurs;
        def.max_occurs = max_occurs;

        let id = form.add_element(parent, def);

        if let Some(inline) = find_child(node, "simpleType") {
            self.inline_simple_type(form, id, inline);
        }

        self.expand_element_content(form, id, node)?;

        if let Some(named) = named_complex {
            self.expand_named(form, id, named)?;
        }
        Ok(())
    }

    fn named_complex_type(&self, type_name: Option<&str>) -> Option<(String, Node<'a, 'input>)> {
        let key = type_name.map(|t| t.rsplit(':').next().unwrap_or(t))?;
        self.complex_types
            .get(key)
            .map(|node| (key.to_string(), *node))
    }

    fn expand_named(
        &mut self,
        form: &mut FormDef,
        id: ElementId,
        (type_key, complex): (String, Node<'a, 'input>),
    ) -> Result<()> {
        if self.expanding.contains(&type_key) {
            return Err(XFormError::SchemaParse {
                message: format!("recursive complex type '{}'", type_key),
            });
        }
        self.expanding.push(type_key);
        let expanded = self.expand_element_content(form, id, complex);
        self.expanding.pop();
        expanded
    }

    /// Register an element's anonymous simple type under its xpath
    fn inline_simple_type(&self, form: &mut FormDef, id: ElementId, node: Node) {
        let Some(xpath) = form.get(id).map(|e| e.xpath.clone()) else {
            return;
        };
        let simple = simple_type(&xpath, node, &form.types);

        let data_type = if simple.is_list {
            DataType::MultiSelect(xpath.clone())
        } else if !simple.allowable_values.is_empty() {
            DataType::Select(xpath.clone())
        } else {
            DataType::resolve(simple.base.as_deref(), &form.types)
        };
        form.types.insert(xpath, simple);

        if let Some(def) = form.get_mut(id) {
            match &mut def.node {
                SchemaNode::Scalar(dt) => *dt = data_type,
                SchemaNode::Repeat { item_type, .. } => *item_type = data_type,
                SchemaNode::Group(_) => {}
            }
        }
    }
}

fn attribute(form: &mut FormDef, parent: ElementId, node: Node) -> Result<()> {
    let Some(name) = node.attribute("name") else {
        return Err(XFormError::SchemaParse {
            message: "attribute declaration without a name".to_string(),
        });
    };
    let type_name = node.attribute("type");
    let mut def = ElementDef::attribute(name, DataType::resolve(type_name, &form.types));
    def.type_name = type_name.map(str::to_string);
    if node.attribute("use") == Some("required") {
        def = def.required();
    }
    form.add_element(parent, def);
    Ok(())
}

fn occurs(raw: Option<&str>, default: u32) -> Result<u32> {
    match raw.map(str::trim) {
        None => Ok(default),
        Some(value) => value.parse::<u32>().map_err(|_| XFormError::SchemaParse {
            message: format!("invalid occurrence bound '{}'", value),
        }),
    }
}
