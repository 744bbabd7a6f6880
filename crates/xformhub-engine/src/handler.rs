//! Population handler
//!
//! The router-side half of a registration: one handler per domain, routed on
//! every namespace that domain registered. On dispatch it looks the form up
//! by (domain, namespace) and populates the instance. Attachments from other
//! domains are declined.

#![allow(clippy::result_large_err)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use xformhub_core::errors::{ExError, ExErrorKind, XFormError};
use xformhub_core::model::FormDef;
use xformhub_core::router::{Attachment, SubmissionHandler};
use xformhub_store::errors::Result;
use xformhub_store::{populate, FormRecord, FormRepo, PopulateOptions};

const HANDLER_PREFIX: &str = "xformhub.populate:";

/// Router identity of the population handler for `domain`
pub fn handler_name(domain: &str) -> String {
    format!("{}{}", HANDLER_PREFIX, domain)
}

pub(crate) fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|_| {
        ExError::new(ExErrorKind::Concurrency)
            .with_op("lock_connection")
            .with_message("database connection lock poisoned")
    })
}

/// Parsed forms keyed by form id, valid while the stored schema digest matches
#[derive(Debug, Default)]
pub(crate) struct FormCache {
    forms: Mutex<HashMap<i64, (String, Arc<FormDef>)>>,
}

impl FormCache {
    pub(crate) fn get(&self, record: &FormRecord) -> Result<Arc<FormDef>> {
        let mut forms = self.forms.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some((digest, form)) = forms.get(&record.id) {
            if *digest == record.xsd_digest {
                return Ok(form.clone());
            }
        }
        let form = Arc::new(record.form_def()?);
        tracing::debug!(form_id = record.id, namespace = %record.target_namespace, "cached parsed form");
        forms.insert(record.id, (record.xsd_digest.clone(), form.clone()));
        Ok(form)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.forms.lock().map(|f| f.len()).unwrap_or(0)
    }
}

pub struct PopulationHandler {
    name: String,
    domain: String,
    conn: Arc<Mutex<Connection>>,
    options: PopulateOptions,
    forms: FormCache,
}

impl PopulationHandler {
    pub fn new(domain: &str, conn: Arc<Mutex<Connection>>, options: PopulateOptions) -> Self {
        Self {
            name: handler_name(domain),
            domain: domain.to_string(),
            conn,
            options,
            forms: FormCache::default(),
        }
    }
}

impl SubmissionHandler for PopulationHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(
        &self,
        attachment: &Attachment,
        namespace: &str,
        version: Option<u32>,
    ) -> std::result::Result<bool, ExError> {
        // Another domain registered the same namespace
        if attachment.domain != self.domain {
            return Ok(false);
        }

        let mut conn = lock(&self.conn)?;
        let record = FormRepo::find_by_namespace(&conn, &self.domain, namespace)?.ok_or_else(|| {
            ExError::from(XFormError::FormNotRegistered {
                namespace: namespace.to_string(),
                domain: self.domain.clone(),
            })
            .with_request_id(attachment.request_id.clone())
        })?;

        if version.is_some() && record.version.is_some() && version != record.version {
            tracing::warn!(
                form_id = record.id,
                namespace,
                submitted = ?version,
                registered = ?record.version,
                "submission version differs from registered form"
            );
        }

        let form = self.forms.get(&record)?;
        let outcome = populate(
            &mut conn,
            &record,
            &form,
            &attachment.content,
            &self.options,
            attachment.id.as_deref(),
            Some(attachment.request_id.as_str()),
        )
        .map_err(|e| e.with_request_id(attachment.request_id.clone()))?;

        tracing::info!(
            form_id = outcome.form_id,
            namespace,
            domain = %self.domain,
            root_row_id = outcome.root_row_id,
            row_count = outcome.rows_inserted,
            request_id = %attachment.request_id,
            "stored submission"
        );
        Ok(true)
    }
}

impl std::fmt::Debug for PopulationHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopulationHandler")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish()
    }
}
