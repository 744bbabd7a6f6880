//! Instance validation against a parsed form
//!
//! Walks schema and instance in lock-step. Structural mismatches are data in
//! the returned [`ValidationErrorSet`]; only a malformed document is an error.

use roxmltree::{Document, Node};

use super::error_set::ValidationErrorSet;
use crate::errors::Result;
use crate::instance::{attribute, children_named, is_named, parse_instance, text_value};
use crate::model::{ElementId, FormDef};

/// Validate raw instance XML against `form`
///
/// # Errors
///
/// Returns `InstanceParse` when `xml` is not well-formed.
pub fn validate(form: &FormDef, xml: &str) -> Result<ValidationErrorSet> {
    let doc = parse_instance(xml)?;
    Ok(validate_document(form, &doc))
}

/// Validate an already parsed instance document
pub fn validate_document(form: &FormDef, doc: &Document) -> ValidationErrorSet {
    let mut errors = schema_errors(form);
    let root = doc.root_element();
    let root_def = form.root_element();

    if is_named(&root, &root_def.name) {
        walk(form, form.root(), root, &mut errors);
    } else {
        errors.push_missing(root_def.xpath.clone());
        errors.push_extra(root.tag_name().name().to_string());
    }

    tracing::debug!(
        namespace = %form.target_namespace,
        missing = errors.missing.len(),
        duplicate = errors.duplicate.len(),
        extra = errors.extra.len(),
        bad_type = errors.bad_type.len(),
        "validated instance"
    );
    errors
}

/// Problems in the schema itself: repeated declarations and repeated
/// enumeration values
pub fn schema_errors(form: &FormDef) -> ValidationErrorSet {
    let mut errors = ValidationErrorSet::new();
    for xpath in form.redeclared() {
        errors.push_duplicate(xpath.clone());
    }
    for (name, simple) in &form.types {
        for value in simple.duplicate_values() {
            errors.push_duplicate(format!("{}:{}", name, value));
        }
    }
    errors
}

fn walk(form: &FormDef, id: ElementId, node: Node, errors: &mut ValidationErrorSet) {
    let Some(def) = form.get(id) else {
        return;
    };

    if let Some(data_type) = def.value_type() {
        if let Some(value) = text_value(&node) {
            if data_type.coerce(&value).is_err() {
                errors.push_bad_type(def.xpath.clone());
            }
        }
    }

    for (child_id, child) in form.children(id) {
        if child.is_attribute {
            match attribute(&node, &child.name) {
                None if child.is_required() => errors.push_missing(child.xpath.clone()),
                None => {}
                Some(value) => {
                    let bad = child
                        .value_type()
                        .map(|dt| !value.trim().is_empty() && dt.coerce(value).is_err())
                        .unwrap_or(false);
                    if bad {
                        errors.push_bad_type(child.xpath.clone());
                    }
                }
            }
            continue;
        }

        let occurrences: Vec<Node> = children_named(node, &child.name).collect();
        if occurrences.is_empty() {
            if child.is_required() {
                errors.push_missing(child.xpath.clone());
            }
            continue;
        }

        let over_limit = match child.max_occurs {
            Some(max) => occurrences.len() > max as usize,
            None => false,
        };
        if over_limit || (occurrences.len() > 1 && !child.is_repeatable()) {
            errors.push_duplicate(child.xpath.clone());
        }

        for occurrence in occurrences {
            walk(form, child_id, occurrence, errors);
        }
    }

    for instance_child in node.children().filter(|n| n.is_element()) {
        let declared = form
            .children(id)
            .any(|(_, c)| !c.is_attribute && is_named(&instance_child, &c.name));
        if !declared {
            errors.push_extra(format!("{}/{}", def.xpath, instance_child.tag_name().name()));
        }
    }
}
