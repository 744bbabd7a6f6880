//! Relational layout planning
//!
//! Every group or repeat node of a form maps to one table. Scalar children
//! become columns of the nearest table-bearing ancestor; repeated scalars get
//! a single-column child table. Tables below the root carry a foreign key to
//! their parent table's row.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::element::{DataType, ElementDef, ElementId, SchemaNode};
use super::form_def::FormDef;
use crate::errors::{Result, XFormError};
use crate::sanitize::IdentifierSanitizer;

/// Generated primary key column on every table
pub const ID_COLUMN: &str = "_id";

/// Foreign key column on every non-root table
pub const PARENT_COLUMN: &str = "_parent_id";

/// Where a column's value comes from, relative to the table's element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnSource {
    /// Text of the first child element with this name
    ChildText { name: String },
    /// Attribute on the table's element
    Attribute { name: String },
    /// Text of the table's element itself
    OwnText,
    /// 1 when the child element's whitespace-separated text contains `value`
    Flag { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub xpath: String,
    pub source: ColumnSource,
}

impl ColumnSpec {
    pub fn is_flag(&self) -> bool {
        matches!(self.source, ColumnSource::Flag { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub xpath: String,
    pub element: ElementId,
    /// Local element name matched against instance nodes
    pub element_name: String,
    /// Index of the parent table in [`TableLayout::tables`]
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub repeat: bool,
    pub columns: Vec<ColumnSpec>,
}

/// Planned tables in creation (pre-)order; index 0 is the root table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLayout {
    pub tables: Vec<TableSpec>,
}

impl TableLayout {
    /// Plan the tables for `form`
    ///
    /// # Errors
    ///
    /// Returns `IdentifierCollision` when two tables, or two columns of one
    /// table, sanitize to the same identifier.
    pub fn plan(form: &FormDef, sanitizer: &IdentifierSanitizer) -> Result<TableLayout> {
        let mut planner = Planner {
            form,
            sanitizer,
            domain: form.domain.as_deref().unwrap_or(""),
            layout: TableLayout::default(),
            table_names: HashMap::new(),
        };
        planner.table(form.root(), None)?;
        tracing::debug!(
            namespace = %form.target_namespace,
            table_count = planner.layout.tables.len(),
            "planned table layout"
        );
        Ok(planner.layout)
    }

    pub fn root(&self) -> Option<&TableSpec> {
        self.tables.first()
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Tables in drop order: children before parents
    pub fn drop_order(&self) -> impl Iterator<Item = &TableSpec> {
        self.tables.iter().rev()
    }
}

struct Planner<'a> {
    form: &'a FormDef,
    sanitizer: &'a IdentifierSanitizer,
    domain: &'a str,
    layout: TableLayout,
    table_names: HashMap<String, String>,
}

impl<'a> Planner<'a> {
    fn table(&mut self, id: ElementId, parent: Option<usize>) -> Result<usize> {
        let def = self.element(id)?;
        let name = self
            .sanitizer
            .table_name(self.domain, &self.form.target_namespace, &def.xpath);
        if let Some(first) = self.table_names.get(&name) {
            return Err(XFormError::IdentifierCollision {
                identifier: name,
                first: first.clone(),
                second: def.xpath.clone(),
            });
        }
        self.table_names.insert(name.clone(), def.xpath.clone());

        let index = self.layout.tables.len();
        self.layout.tables.push(TableSpec {
            name,
            xpath: def.xpath.clone(),
            element: id,
            element_name: def.name.clone(),
            parent,
            children: Vec::new(),
            repeat: def.is_repeatable(),
            columns: Vec::new(),
        });
        if let Some(parent) = parent {
            self.layout.tables[parent].children.push(index);
        }

        let mut columns = ColumnSet::new(parent.is_some());

        if def.value_type().is_some() {
            // repeated scalar: the element's own text is the only value
            columns.push(ColumnSpec {
                name: self.sanitizer.sanitize(&def.name),
                xpath: def.xpath.clone(),
                source: ColumnSource::OwnText,
            })?;
        }

        let children: Vec<ElementId> = def.children().to_vec();
        for child_id in children {
            let child = self.element(child_id)?;
            match &child.node {
                SchemaNode::Scalar(data_type) => {
                    for column in self.scalar_columns(child, data_type) {
                        columns.push(column)?;
                    }
                }
                SchemaNode::Group(_) | SchemaNode::Repeat { .. } => {
                    self.table(child_id, Some(index))?;
                }
            }
        }

        self.layout.tables[index].columns = columns.finish();
        Ok(index)
    }

    fn scalar_columns(&self, child: &ElementDef, data_type: &DataType) -> Vec<ColumnSpec> {
        if child.is_attribute {
            return vec![ColumnSpec {
                name: self.sanitizer.sanitize(&child.name),
                xpath: child.xpath.clone(),
                source: ColumnSource::Attribute {
                    name: child.name.clone(),
                },
            }];
        }

        if let DataType::MultiSelect(_) = data_type {
            if let Some(simple) = self.form.simple_type(data_type) {
                if !simple.multiselect_values.is_empty() {
                    let mut seen = Vec::new();
                    return simple
                        .multiselect_values
                        .iter()
                        .filter(|v| {
                            let fresh = !seen.contains(v);
                            seen.push(*v);
                            fresh
                        })
                        .map(|value| ColumnSpec {
                            name: self.sanitizer.sanitize(&format!("{}_{}", child.name, value)),
                            xpath: format!("{}[{}]", child.xpath, value),
                            source: ColumnSource::Flag {
                                name: child.name.clone(),
                                value: value.clone(),
                            },
                        })
                        .collect();
                }
            }
        }

        vec![ColumnSpec {
            name: self.sanitizer.sanitize(&child.name),
            xpath: child.xpath.clone(),
            source: ColumnSource::ChildText {
                name: child.name.clone(),
            },
        }]
    }

    fn element(&self, id: ElementId) -> Result<&'a ElementDef> {
        self.form.get(id).ok_or_else(|| XFormError::Internal {
            message: format!("dangling element id {}", id.index()),
        })
    }
}

/// Column accumulator that rejects identifier collisions within one table
struct ColumnSet {
    columns: Vec<ColumnSpec>,
    names: HashMap<String, String>,
}

impl ColumnSet {
    fn new(has_parent: bool) -> Self {
        let mut names = HashMap::new();
        names.insert(ID_COLUMN.to_string(), ID_COLUMN.to_string());
        if has_parent {
            names.insert(PARENT_COLUMN.to_string(), PARENT_COLUMN.to_string());
        }
        Self {
            columns: Vec::new(),
            names,
        }
    }

    fn push(&mut self, column: ColumnSpec) -> Result<()> {
        if let Some(first) = self.names.get(&column.name) {
            return Err(XFormError::IdentifierCollision {
                identifier: column.name,
                first: first.clone(),
                second: column.xpath,
            });
        }
        self.names.insert(column.name.clone(), column.xpath.clone());
        self.columns.push(column);
        Ok(())
    }

    fn finish(self) -> Vec<ColumnSpec> {
        self.columns
    }
}
