//! Instance populator
//!
//! Validates an instance, then inserts one row per table-bearing node in a
//! single transaction. Rows are written parent first because each child row
//! carries its parent's generated id. Values are stored verbatim as trimmed
//! text; blank values are stored as NULL.
//!
//! Alongside the rows, the instance record keeps the submitted root version
//! attributes and the values of the configured meta block fields.

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, Result};
use crate::repo::{FormRecord, InstanceRepo, MetaValue, NewInstance};
use crate::tables::quote;
use roxmltree::Node;
use rusqlite::types::Value;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use xformhub_core::errors::{ExError, ExErrorKind, XFormError};
use xformhub_core::instance::{attribute, children_named, is_named, parse_instance, text_value};
use xformhub_core::model::{
    force_to_int, ColumnSource, FormDef, TableLayout, ID_COLUMN, PARENT_COLUMN,
};
use xformhub_core::validation::{
    validate_document, ExtraFieldPolicy, ValidationErrorSet, DEFAULT_META_FIELDS,
};

/// Whether validation errors stop population
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopulateMode {
    /// Refuse instances that fail validation
    Strict,
    /// Store what can be stored and report the errors
    #[default]
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulateOptions {
    pub mode: PopulateMode,
    pub extra_fields: ExtraFieldPolicy,
    /// Meta block fields captured with each instance
    pub meta_fields: Vec<String>,
}

impl Default for PopulateOptions {
    fn default() -> Self {
        Self {
            mode: PopulateMode::default(),
            extra_fields: ExtraFieldPolicy::default(),
            meta_fields: DEFAULT_META_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Result of populating one instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulateOutcome {
    pub form_id: i64,
    pub instance_id: i64,
    pub root_row_id: i64,
    pub rows_inserted: usize,
    /// Validation findings; may be non-empty in lenient mode
    pub errors: ValidationErrorSet,
}

/// Validate and store `xml` as an instance of `record`
///
/// # Errors
///
/// - `InstanceParse` when `xml` is malformed
/// - `ValidationFailed` when the instance root is not the form root, or in
///   strict mode when validation does not pass
/// - `Persistence` on database failure; nothing is written in that case
pub fn populate(
    conn: &mut Connection,
    record: &FormRecord,
    form: &FormDef,
    xml: &str,
    options: &PopulateOptions,
    attachment_id: Option<&str>,
    request_id: Option<&str>,
) -> Result<PopulateOutcome> {
    let doc = parse_instance(xml)?;
    let errors = validate_document(form, &doc);
    let root = doc.root_element();

    let layout = &record.layout;
    let root_table = layout.root().ok_or_else(|| {
        ExError::new(ExErrorKind::Internal)
            .with_form_id(record.id)
            .with_message("form has no root table")
    })?;
    if !is_named(&root, &root_table.element_name) {
        return Err(XFormError::RootMismatch {
            expected: root_table.element_name.clone(),
            found: root.tag_name().name().to_string(),
        }
        .into());
    }

    if !errors.passes(options.extra_fields) {
        match options.mode {
            PopulateMode::Strict => {
                return Err(ExError::from(XFormError::ValidationFailed {
                    namespace: record.target_namespace.clone(),
                    errors,
                })
                .with_form_id(record.id));
            }
            PopulateMode::Lenient => {
                tracing::warn!(
                    form_id = record.id,
                    namespace = %record.target_namespace,
                    errors = %errors,
                    "populating instance despite validation errors"
                );
            }
        }
    }

    let meta = meta_values(root, &options.meta_fields);

    let tx = conn.transaction().map_err(from_rusqlite)?;
    let mut rows_inserted = 0;
    let root_row_id = insert_rows(&tx, layout, 0, root, None, &mut rows_inserted)?;
    let instance_id = InstanceRepo::insert(
        &tx,
        &NewInstance {
            form_id: record.id,
            root_row_id,
            attachment_id,
            request_id,
            version: attribute(&root, "version").and_then(force_to_int),
            uiversion: attribute(&root, "uiversion").and_then(force_to_int),
        },
    )?;
    InstanceRepo::insert_meta(&tx, instance_id, &meta)?;
    tx.commit().map_err(from_rusqlite)?;

    tracing::debug!(
        form_id = record.id,
        root_row_id,
        row_count = rows_inserted,
        "populated instance"
    );

    Ok(PopulateOutcome {
        form_id: record.id,
        instance_id,
        root_row_id,
        rows_inserted,
        errors,
    })
}

/// Configured meta fields read from the root's `meta` child
fn meta_values(root: Node, fields: &[String]) -> Vec<MetaValue> {
    let meta = children_named(root, "meta").next();
    fields
        .iter()
        .map(|field| MetaValue {
            field: field.clone(),
            value: meta.and_then(|m| children_named(m, field).next().and_then(|c| text_value(&c))),
        })
        .collect()
}

fn insert_rows(
    conn: &Connection,
    layout: &TableLayout,
    table_index: usize,
    node: Node,
    parent_row: Option<i64>,
    rows_inserted: &mut usize,
) -> Result<i64> {
    let table = &layout.tables[table_index];

    let mut names = Vec::with_capacity(table.columns.len() + 1);
    let mut values = Vec::with_capacity(table.columns.len() + 1);
    if let Some(parent_id) = parent_row {
        names.push(quote(PARENT_COLUMN));
        values.push(Value::Integer(parent_id));
    }
    for column in &table.columns {
        names.push(quote(&column.name));
        values.push(column_value(&column.source, node));
    }

    let sql = if names.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", quote(&table.name))
    } else {
        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(&table.name),
            names.join(", "),
            placeholders.join(", ")
        )
    };
    conn.execute(&sql, rusqlite::params_from_iter(values.iter()))
        .map_err(from_rusqlite)?;
    let row_id = conn.last_insert_rowid();
    *rows_inserted += 1;

    for &child_index in &table.children {
        let child = &layout.tables[child_index];
        let occurrences = children_named(node, &child.element_name);
        if child.repeat {
            for occurrence in occurrences {
                insert_rows(conn, layout, child_index, occurrence, Some(row_id), rows_inserted)?;
            }
        } else if let Some(first) = occurrences.into_iter().next() {
            insert_rows(conn, layout, child_index, first, Some(row_id), rows_inserted)?;
        }
    }

    Ok(row_id)
}

fn column_value(source: &ColumnSource, node: Node) -> Value {
    let text = match source {
        ColumnSource::ChildText { name } => children_named(node, name).next().and_then(|c| text_value(&c)),
        ColumnSource::Attribute { name } => attribute(&node, name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string),
        ColumnSource::OwnText => text_value(&node),
        ColumnSource::Flag { name, value } => {
            let selected = children_named(node, name)
                .next()
                .and_then(|c| text_value(&c))
                .map(|text| text.split_whitespace().any(|v| v == value))
                .unwrap_or(false);
            return Value::Integer(i64::from(selected));
        }
    };
    text.map(Value::Text).unwrap_or(Value::Null)
}

/// Delete one populated instance: its rows in every table, children first,
/// then its instance record
///
/// # Errors
///
/// Returns `NotFound` when no instance with this root row is recorded.
pub fn remove_instance(conn: &mut Connection, record: &FormRecord, root_row_id: i64) -> Result<usize> {
    if InstanceRepo::find(conn, record.id, root_row_id)?.is_none() {
        return Err(ExError::new(ExErrorKind::NotFound)
            .with_form_id(record.id)
            .with_message(format!("Instance with root row {} not found", root_row_id)));
    }

    let tx = conn.transaction().map_err(from_rusqlite)?;
    let deleted = delete_rows(&tx, &record.layout, 0, &[root_row_id])?;
    InstanceRepo::delete(&tx, record.id, root_row_id)?;
    tx.commit().map_err(from_rusqlite)?;

    tracing::debug!(form_id = record.id, root_row_id, row_count = deleted, "removed instance");
    Ok(deleted)
}

fn delete_rows(conn: &Connection, layout: &TableLayout, table_index: usize, ids: &[i64]) -> Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let table = &layout.tables[table_index];
    let mut deleted = 0;

    for &child_index in &table.children {
        let child = &layout.tables[child_index];
        let mut child_ids = Vec::new();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM {} WHERE {} = ?1",
                quote(ID_COLUMN),
                quote(&child.name),
                quote(PARENT_COLUMN)
            ))
            .map_err(from_rusqlite)?;
        for id in ids {
            let found = stmt
                .query_map([id], |row| row.get::<_, i64>(0))
                .map_err(from_rusqlite)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(from_rusqlite)?;
            child_ids.extend(found);
        }
        deleted += delete_rows(conn, layout, child_index, &child_ids)?;
    }

    let sql = format!("DELETE FROM {} WHERE {} = ?1", quote(&table.name), quote(ID_COLUMN));
    for id in ids {
        deleted += conn.execute(&sql, [id]).map_err(from_rusqlite)?;
    }
    Ok(deleted)
}
