//! Dynamic table manager
//!
//! Turns a planned [`TableLayout`] into DDL. Tables are created in layout
//! (pre-)order so every parent exists before its children reference it, and
//! dropped in reverse order.

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, table_exists, Result};
use rusqlite::Connection;
use xformhub_core::model::{TableLayout, TableSpec, ID_COLUMN, PARENT_COLUMN};

/// Double-quote an identifier for SQLite
pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// CREATE TABLE statement for one planned table
pub fn create_table_sql(layout: &TableLayout, table: &TableSpec) -> String {
    let mut columns = vec![format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quote(ID_COLUMN))];
    if let Some(parent) = table.parent.and_then(|p| layout.tables.get(p)) {
        columns.push(format!(
            "{} INTEGER NOT NULL REFERENCES {}({})",
            quote(PARENT_COLUMN),
            quote(&parent.name),
            quote(ID_COLUMN)
        ));
    }
    for column in &table.columns {
        if column.is_flag() {
            columns.push(format!("{} INTEGER NOT NULL DEFAULT 0", quote(&column.name)));
        } else {
            columns.push(format!("{} TEXT", quote(&column.name)));
        }
    }
    format!("CREATE TABLE {} (\n    {}\n)", quote(&table.name), columns.join(",\n    "))
}

/// Returns true if a table with this name exists
pub fn table_exists_in(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )
        .map_err(from_rusqlite)?;
    Ok(count > 0)
}

/// Create every table of `layout`
///
/// Call inside a transaction; a name that already exists aborts with
/// `IdentifierCollision` and nothing is overwritten.
pub fn create_tables(conn: &Connection, layout: &TableLayout) -> Result<()> {
    for table in &layout.tables {
        if table_exists_in(conn, &table.name)? {
            return Err(table_exists(&table.name, &table.xpath));
        }
        conn.execute_batch(&create_table_sql(layout, table))
            .map_err(from_rusqlite)?;
        tracing::debug!(table = %table.name, xpath = %table.xpath, "created table");
    }
    Ok(())
}

/// Drop every table of `layout`, children before parents
///
/// Missing tables are skipped so a retried drop succeeds.
pub fn drop_tables(conn: &Connection, layout: &TableLayout) -> Result<()> {
    for table in layout.drop_order() {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote(&table.name)))
            .map_err(from_rusqlite)?;
        tracing::debug!(table = %table.name, "dropped table");
    }
    Ok(())
}

/// Number of rows currently in a table
pub fn row_count(conn: &Connection, table: &str) -> Result<i64> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", quote(table)), [], |row| {
        row.get(0)
    })
    .map_err(from_rusqlite)
}
