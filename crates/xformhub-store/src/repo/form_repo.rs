//! SQLite repository for registered forms

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, json_error, Result};
use crate::migrations::compute_checksum;
use crate::repo::InstanceRepo;
use rusqlite::{Connection, OptionalExtension, Row};
use xformhub_core::model::{FormDef, TableLayout};
use xformhub_core::xsd;

/// A registered form as stored in `form_defs`
#[derive(Debug, Clone, PartialEq)]
pub struct FormRecord {
    pub id: i64,
    pub domain: String,
    pub target_namespace: String,
    pub form_name: String,
    pub display_name: String,
    pub version: Option<u32>,
    pub uiversion: Option<u32>,
    pub root_table: String,
    pub xsd: String,
    pub xsd_digest: String,
    pub layout: TableLayout,
    pub created_at: i64,
}

impl FormRecord {
    /// Re-parse the stored schema source
    pub fn form_def(&self) -> Result<FormDef> {
        let form = xsd::parse_str(&self.xsd)?;
        Ok(form.with_domain(self.domain.clone()))
    }
}

const SELECT_COLUMNS: &str = "id, domain, target_namespace, form_name, display_name, version, \
     uiversion, root_table, xsd, xsd_digest, layout_json, created_at";

/// SQLite repository for form metadata
pub struct FormRepo;

impl FormRepo {
    /// Insert a form and its table list; returns the new form id
    ///
    /// Call inside the same transaction as the DDL.
    pub fn insert(
        conn: &Connection,
        display_name: &str,
        form: &FormDef,
        xsd_source: &str,
        layout: &TableLayout,
    ) -> Result<i64> {
        let layout_json = serde_json::to_string(layout).map_err(|e| json_error("insert_form", e))?;
        let root_table = layout
            .root()
            .map(|t| t.name.clone())
            .unwrap_or_default();

        conn.execute(
            "INSERT INTO form_defs (domain, target_namespace, form_name, display_name, version,
                uiversion, root_table, xsd, xsd_digest, layout_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            rusqlite::params![
                form.domain.as_deref().unwrap_or(""),
                form.target_namespace,
                form.form_name,
                display_name,
                form.version,
                form.uiversion,
                root_table,
                xsd_source,
                compute_checksum(xsd_source),
                layout_json,
                chrono::Utc::now().timestamp(),
            ],
        )
        .map_err(from_rusqlite)?;
        let form_id = conn.last_insert_rowid();

        for (order, table) in layout.tables.iter().enumerate() {
            let parent_table = table
                .parent
                .and_then(|p| layout.tables.get(p))
                .map(|p| p.name.clone());
            conn.execute(
                "INSERT INTO element_defs (form_id, xpath, table_name, parent_table, is_repeatable,
                    creation_order)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    form_id,
                    table.xpath,
                    table.name,
                    parent_table,
                    table.repeat,
                    order as i64,
                ],
            )
            .map_err(from_rusqlite)?;
        }

        tracing::debug!(form_id, namespace = %form.target_namespace, "persisted form metadata");
        Ok(form_id)
    }

    pub fn get(conn: &Connection, form_id: i64) -> Result<Option<FormRecord>> {
        let sql = format!("SELECT {} FROM form_defs WHERE id = ?1", SELECT_COLUMNS);
        let raw = conn
            .query_row(&sql, [form_id], raw_record)
            .optional()
            .map_err(from_rusqlite)?;
        raw.map(RawRecord::decode).transpose()
    }

    pub fn find_by_namespace(
        conn: &Connection,
        domain: &str,
        namespace: &str,
    ) -> Result<Option<FormRecord>> {
        let sql = format!(
            "SELECT {} FROM form_defs WHERE domain = ?1 AND target_namespace = ?2",
            SELECT_COLUMNS
        );
        let raw = conn
            .query_row(&sql, [domain, namespace], raw_record)
            .optional()
            .map_err(from_rusqlite)?;
        raw.map(RawRecord::decode).transpose()
    }

    /// All registered forms ordered by id
    pub fn list(conn: &Connection) -> Result<Vec<FormRecord>> {
        let sql = format!("SELECT {} FROM form_defs ORDER BY id", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql).map_err(from_rusqlite)?;
        let raws = stmt
            .query_map([], raw_record)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        raws.into_iter().map(RawRecord::decode).collect()
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        conn.query_row("SELECT COUNT(*) FROM form_defs", [], |row| row.get(0))
            .map_err(from_rusqlite)
    }

    /// Delete a form's metadata (instances, table list, then the form row)
    pub fn delete(conn: &Connection, form_id: i64) -> Result<()> {
        InstanceRepo::delete_for_form(conn, form_id)?;
        conn.execute("DELETE FROM element_defs WHERE form_id = ?1", [form_id])
            .map_err(from_rusqlite)?;
        conn.execute("DELETE FROM form_defs WHERE id = ?1", [form_id])
            .map_err(from_rusqlite)?;
        Ok(())
    }

    /// Table names recorded for a form, in creation order
    pub fn table_names(conn: &Connection, form_id: i64) -> Result<Vec<String>> {
        let mut stmt = conn
            .prepare("SELECT table_name FROM element_defs WHERE form_id = ?1 ORDER BY creation_order")
            .map_err(from_rusqlite)?;
        let names = stmt
            .query_map([form_id], |row| row.get(0))
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(from_rusqlite)?;
        Ok(names)
    }
}

/// Row as read, before the layout JSON is decoded
struct RawRecord {
    id: i64,
    domain: String,
    target_namespace: String,
    form_name: String,
    display_name: String,
    version: Option<u32>,
    uiversion: Option<u32>,
    root_table: String,
    xsd: String,
    xsd_digest: String,
    layout_json: String,
    created_at: i64,
}

fn raw_record(row: &Row) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        id: row.get(0)?,
        domain: row.get(1)?,
        target_namespace: row.get(2)?,
        form_name: row.get(3)?,
        display_name: row.get(4)?,
        version: row.get(5)?,
        uiversion: row.get(6)?,
        root_table: row.get(7)?,
        xsd: row.get(8)?,
        xsd_digest: row.get(9)?,
        layout_json: row.get(10)?,
        created_at: row.get(11)?,
    })
}

impl RawRecord {
    fn decode(self) -> Result<FormRecord> {
        let layout = serde_json::from_str(&self.layout_json)
            .map_err(|e| json_error("decode_form", e).with_form_id(self.id))?;
        Ok(FormRecord {
            id: self.id,
            domain: self.domain,
            target_namespace: self.target_namespace,
            form_name: self.form_name,
            display_name: self.display_name,
            version: self.version,
            uiversion: self.uiversion,
            root_table: self.root_table,
            xsd: self.xsd,
            xsd_digest: self.xsd_digest,
            layout,
            created_at: self.created_at,
        })
    }
}
