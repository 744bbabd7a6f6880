//! SQLite repository for populated instances

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, Result};
use rusqlite::{Connection, OptionalExtension, Row};

/// One populated submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRecord {
    pub id: i64,
    pub form_id: i64,
    pub root_row_id: i64,
    pub attachment_id: Option<String>,
    pub request_id: Option<String>,
    /// Root `version` attribute as submitted
    pub version: Option<u32>,
    pub uiversion: Option<u32>,
    pub created_at: i64,
}

/// Instance record fields known before insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NewInstance<'a> {
    pub form_id: i64,
    pub root_row_id: i64,
    pub attachment_id: Option<&'a str>,
    pub request_id: Option<&'a str>,
    pub version: Option<u32>,
    pub uiversion: Option<u32>,
}

/// One captured meta block field; `None` when absent or blank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaValue {
    pub field: String,
    pub value: Option<String>,
}

const SELECT_COLUMNS: &str =
    "id, form_id, root_row_id, attachment_id, request_id, version, uiversion, created_at";

fn instance_record(row: &Row) -> rusqlite::Result<InstanceRecord> {
    Ok(InstanceRecord {
        id: row.get(0)?,
        form_id: row.get(1)?,
        root_row_id: row.get(2)?,
        attachment_id: row.get(3)?,
        request_id: row.get(4)?,
        version: row.get(5)?,
        uiversion: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub struct InstanceRepo;

impl InstanceRepo {
    pub fn insert(conn: &Connection, instance: &NewInstance) -> Result<i64> {
        conn.execute(
            "INSERT INTO form_instances (form_id, root_row_id, attachment_id, request_id, version,
                uiversion, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                instance.form_id,
                instance.root_row_id,
                instance.attachment_id,
                instance.request_id,
                instance.version,
                instance.uiversion,
                chrono::Utc::now().timestamp()
            ],
        )
        .map_err(from_rusqlite)?;
        Ok(conn.last_insert_rowid())
    }

    /// Record the meta block values of an instance
    pub fn insert_meta(conn: &Connection, instance_id: i64, values: &[MetaValue]) -> Result<()> {
        let mut stmt = conn
            .prepare("INSERT INTO instance_meta (instance_id, field, value) VALUES (?1, ?2, ?3)")
            .map_err(from_rusqlite)?;
        for meta in values {
            stmt.execute(rusqlite::params![instance_id, meta.field, meta.value])
                .map_err(from_rusqlite)?;
        }
        Ok(())
    }

    /// Meta values of an instance, ordered by field name
    pub fn meta(conn: &Connection, instance_id: i64) -> Result<Vec<MetaValue>> {
        let mut stmt = conn
            .prepare("SELECT field, value FROM instance_meta WHERE instance_id = ?1 ORDER BY field")
            .map_err(from_rusqlite)?;
        let values = stmt
            .query_map([instance_id], |row| {
                Ok(MetaValue {
                    field: row.get(0)?,
                    value: row.get(1)?,
                })
            })
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        Ok(values)
    }

    pub fn find(conn: &Connection, form_id: i64, root_row_id: i64) -> Result<Option<InstanceRecord>> {
        let sql = format!(
            "SELECT {} FROM form_instances WHERE form_id = ?1 AND root_row_id = ?2",
            SELECT_COLUMNS
        );
        conn.query_row(&sql, [form_id, root_row_id], instance_record)
            .optional()
            .map_err(from_rusqlite)
    }

    pub fn list_for_form(conn: &Connection, form_id: i64) -> Result<Vec<InstanceRecord>> {
        let sql = format!(
            "SELECT {} FROM form_instances WHERE form_id = ?1 ORDER BY id",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql).map_err(from_rusqlite)?;
        let records = stmt
            .query_map([form_id], instance_record)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        Ok(records)
    }

    /// Delete an instance record and its meta values
    pub fn delete(conn: &Connection, form_id: i64, root_row_id: i64) -> Result<()> {
        conn.execute(
            "DELETE FROM instance_meta WHERE instance_id IN
                (SELECT id FROM form_instances WHERE form_id = ?1 AND root_row_id = ?2)",
            [form_id, root_row_id],
        )
        .map_err(from_rusqlite)?;
        conn.execute(
            "DELETE FROM form_instances WHERE form_id = ?1 AND root_row_id = ?2",
            [form_id, root_row_id],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    /// Delete every instance record of a form
    pub fn delete_for_form(conn: &Connection, form_id: i64) -> Result<()> {
        conn.execute(
            "DELETE FROM instance_meta WHERE instance_id IN
                (SELECT id FROM form_instances WHERE form_id = ?1)",
            [form_id],
        )
        .map_err(from_rusqlite)?;
        conn.execute("DELETE FROM form_instances WHERE form_id = ?1", [form_id])
            .map_err(from_rusqlite)?;
        Ok(())
    }
}
