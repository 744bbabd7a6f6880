//! Schema registry
//!
//! Registration is two-phase: DDL and metadata are written in one database
//! transaction, and only after it commits is the population handler routed
//! on the form's namespace. Removal runs the phases in reverse: unroute,
//! then drop tables and metadata in one transaction. A failure at any step
//! leaves a state from which the same call can be retried.

#![allow(clippy::result_large_err)]

use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use rusqlite::Connection;
use xformhub_core::errors::{ExError, XFormError};
use xformhub_core::instance::sniff_namespace;
use xformhub_core::model::{FormDef, TableLayout};
use xformhub_core::router::{Attachment, NamespaceRouter, SubmissionHandler};
use xformhub_core::validation::{check_form, FormCheckOptions, IssueKind, SchemaCheck};
use xformhub_core::{log_op_end, log_op_error, log_op_start, xsd, IdentifierSanitizer};
use xformhub_store::errors::{form_not_found, from_rusqlite, io_error, Result};
use xformhub_store::tables::{create_tables, drop_tables};
use xformhub_store::{db, migrations, FormRecord, FormRepo, InstanceRecord, InstanceRepo};

use crate::handler::{handler_name, lock, PopulationHandler};
use crate::options::RegistryOptions;

/// What a submission was routed as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub namespace: String,
    pub version: Option<u32>,
    /// Handlers that took the submission; zero when no form in the
    /// submitting domain is registered on the namespace
    pub handlers: usize,
}

pub struct SchemaRegistry {
    conn: Arc<Mutex<Connection>>,
    router: Arc<NamespaceRouter>,
    options: RegistryOptions,
    sanitizer: IdentifierSanitizer,
}

impl SchemaRegistry {
    /// Wrap an open connection, bringing its metadata schema up to date
    pub fn new(
        mut conn: Connection,
        router: Arc<NamespaceRouter>,
        options: RegistryOptions,
    ) -> Result<Self> {
        let sanitizer = options.sanitizer()?;
        db::configure(&conn)?;
        migrations::apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            router,
            options,
            sanitizer,
        })
    }

    /// Open (or create) the database at `path`
    pub fn open<P: AsRef<Path>>(
        path: P,
        router: Arc<NamespaceRouter>,
        options: RegistryOptions,
    ) -> Result<Self> {
        Self::new(db::open(path)?, router, options)
    }

    pub fn in_memory(router: Arc<NamespaceRouter>, options: RegistryOptions) -> Result<Self> {
        Self::new(db::open_in_memory()?, router, options)
    }

    pub fn router(&self) -> &Arc<NamespaceRouter> {
        &self.router
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    /// Run `f` with exclusive access to the connection
    pub fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = lock(&self.conn)?;
        f(&mut *conn)
    }

    /// Register a schema for `domain` and start routing its submissions
    ///
    /// # Errors
    ///
    /// - `SchemaParse` / `MissingNamespace` for an unusable schema
    /// - `DuplicateSchema` when the namespace is already registered in the
    ///   domain; the existing form and its tables are untouched
    /// - `IdentifierCollision` when planned tables or columns collide, or a
    ///   planned table name is already taken
    ///
    /// Nothing is created when any of these is returned.
    pub fn add_schema<R: Read>(&self, name: &str, reader: R, domain: &str) -> Result<FormRecord> {
        let start = Instant::now();
        log_op_start!("add_schema", domain = domain, display_name = name);

        let result = self.add_schema_impl(name, reader, domain);
        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(record) => {
                log_op_end!(
                    "add_schema",
                    duration_ms = duration_ms,
                    form_id = record.id,
                    namespace = record.target_namespace.as_str(),
                    table_count = record.layout.tables.len()
                );
            }
            Err(e) => log_op_error!("add_schema", e.clone(), duration_ms = duration_ms),
        }
        result
    }

    fn add_schema_impl<R: Read>(&self, name: &str, mut reader: R, domain: &str) -> Result<FormRecord> {
        let mut source = String::new();
        reader
            .read_to_string(&mut source)
            .map_err(|e| io_error("add_schema", e))?;
        let form = xsd::parse_str(&source)?.with_domain(domain);
        let namespace = form.target_namespace.clone();

        let record = {
            let mut conn = lock(&self.conn)?;
            if let Some(existing) = FormRepo::find_by_namespace(&conn, domain, &namespace)? {
                return Err(duplicate_error(&existing, &form));
            }

            let layout = TableLayout::plan(&form, &self.sanitizer)?;
            let display_name = if name.trim().is_empty() {
                form.form_name.as_str()
            } else {
                name
            };

            let tx = conn.transaction().map_err(from_rusqlite)?;
            create_tables(&tx, &layout)?;
            let form_id = FormRepo::insert(&tx, display_name, &form, &source, &layout)?;
            tx.commit().map_err(from_rusqlite)?;

            FormRepo::get(&conn, form_id)?.ok_or_else(|| form_not_found(form_id))?
        };

        self.route(&record);
        Ok(record)
    }

    /// Stop routing a form and delete its tables and metadata
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    pub fn remove_schema(&self, form_id: i64) -> Result<FormRecord> {
        let start = Instant::now();
        log_op_start!("remove_schema", form_id = form_id);

        let result = self.remove_schema_impl(form_id);
        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(record) => {
                log_op_end!(
                    "remove_schema",
                    duration_ms = duration_ms,
                    form_id = form_id,
                    namespace = record.target_namespace.as_str(),
                    table_count = record.layout.tables.len()
                );
            }
            Err(e) => log_op_error!("remove_schema", e.clone(), duration_ms = duration_ms),
        }
        result
    }

    fn remove_schema_impl(&self, form_id: i64) -> Result<FormRecord> {
        let record = self.get_schema(form_id)?;

        self.router
            .unregister(&record.target_namespace, &handler_name(&record.domain));

        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction().map_err(from_rusqlite)?;
        drop_tables(&tx, &record.layout)?;
        FormRepo::delete(&tx, form_id)?;
        tx.commit().map_err(from_rusqlite)?;

        Ok(record)
    }

    /// Registration diagnostics for a parsed form; mutates nothing
    pub fn check_schema(&self, form: &FormDef) -> SchemaCheck {
        let start = Instant::now();
        log_op_start!("check_schema", namespace = form.target_namespace.as_str());

        let check = schema_diagnostics(form, &self.options.form_check_options(), &self.sanitizer);

        log_op_end!(
            "check_schema",
            duration_ms = start.elapsed().as_millis() as u64,
            namespace = form.target_namespace.as_str(),
            errors = check.errors.len(),
            warnings = check.warnings.len()
        );
        check
    }

    /// Parse a schema and check it
    ///
    /// # Errors
    ///
    /// Returns the parse error when the schema cannot be read at all.
    pub fn check_schema_source<R: Read>(&self, reader: R) -> Result<(FormDef, SchemaCheck)> {
        let form = xsd::parse(reader)?;
        let check = self.check_schema(&form);
        Ok((form, check))
    }

    /// Route a submission by the namespace on its root element
    ///
    /// # Errors
    ///
    /// - `InstanceParse` when the content is malformed or carries no namespace
    /// - whatever a handler returns, e.g. `ValidationFailed` in strict mode
    pub fn submit(&self, attachment: &Attachment) -> Result<SubmitOutcome> {
        let start = Instant::now();
        log_op_start!(
            "submit",
            domain = attachment.domain.as_str(),
            request_id = attachment.request_id.as_str()
        );

        let result = self.submit_impl(attachment);
        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(outcome) => {
                log_op_end!(
                    "submit",
                    duration_ms = duration_ms,
                    namespace = outcome.namespace.as_str(),
                    handlers = outcome.handlers,
                    request_id = attachment.request_id.as_str()
                );
            }
            Err(e) => log_op_error!(
                "submit",
                e.clone(),
                duration_ms = duration_ms,
                request_id = attachment.request_id.as_str()
            ),
        }
        result
    }

    fn submit_impl(&self, attachment: &Attachment) -> Result<SubmitOutcome> {
        let (namespace, version) = sniff_namespace(&attachment.content)
            .map_err(|e| ExError::from(e).with_request_id(attachment.request_id.clone()))?;
        let handlers = self.router.process(attachment, &namespace, version)?;
        if handlers == 0 {
            tracing::warn!(
                namespace = %namespace,
                domain = %attachment.domain,
                request_id = %attachment.request_id,
                "no form registered for submission"
            );
        }
        Ok(SubmitOutcome {
            namespace,
            version,
            handlers,
        })
    }

    /// Delete one stored instance and its rows
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the form or the instance does not exist.
    pub fn remove_instance(&self, form_id: i64, root_row_id: i64) -> Result<usize> {
        let start = Instant::now();
        log_op_start!("remove_instance", form_id = form_id, root_row_id = root_row_id);

        let result = self.with_connection(|conn| {
            let record = FormRepo::get(conn, form_id)?.ok_or_else(|| form_not_found(form_id))?;
            xformhub_store::remove_instance(conn, &record, root_row_id)
        });
        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(rows) => {
                log_op_end!(
                    "remove_instance",
                    duration_ms = duration_ms,
                    form_id = form_id,
                    row_count = *rows
                );
            }
            Err(e) => log_op_error!("remove_instance", e.clone(), duration_ms = duration_ms),
        }
        result
    }

    pub fn get_schema(&self, form_id: i64) -> Result<FormRecord> {
        self.with_connection(|conn| {
            FormRepo::get(conn, form_id)?.ok_or_else(|| form_not_found(form_id))
        })
    }

    pub fn list_schemas(&self) -> Result<Vec<FormRecord>> {
        self.with_connection(|conn| FormRepo::list(conn))
    }

    pub fn instances(&self, form_id: i64) -> Result<Vec<InstanceRecord>> {
        self.with_connection(|conn| InstanceRepo::list_for_form(conn, form_id))
    }

    /// Route every persisted form; returns how many routes were added
    ///
    /// The router lives for the process while the metadata persists, so
    /// this runs once at startup.
    pub fn restore_routes(&self) -> Result<usize> {
        let records = self.list_schemas()?;
        let restored = records.iter().filter(|r| self.route(r)).count();
        tracing::info!(table_count = records.len(), restored, "restored namespace routes");
        Ok(restored)
    }

    fn route(&self, record: &FormRecord) -> bool {
        let handler: Arc<dyn SubmissionHandler> = Arc::new(PopulationHandler::new(
            &record.domain,
            self.conn.clone(),
            self.options.populate_options(),
        ));
        self.router.register(&record.target_namespace, handler)
    }
}

/// Form checks plus a trial layout plan, so identifier collisions are
/// reported before anything is created
pub fn schema_diagnostics(
    form: &FormDef,
    options: &FormCheckOptions,
    sanitizer: &IdentifierSanitizer,
) -> SchemaCheck {
    let mut check = check_form(form, options);
    if let Err(err) = TableLayout::plan(form, sanitizer) {
        check.error(IssueKind::IdentifierCollision, err.to_string());
    }
    check
}

fn duplicate_error(existing: &FormRecord, form: &FormDef) -> ExError {
    let err = ExError::from(XFormError::DuplicateSchema {
        target_namespace: existing.target_namespace.clone(),
        domain: existing.domain.clone(),
    })
    .with_form_id(existing.id);

    let note = match existing.form_def() {
        Ok(registered) => {
            let diff = registered.differences(form);
            if diff.is_empty() {
                "the registered schema is identical".to_string()
            } else {
                format!("the registered schema differs: {}", diff)
            }
        }
        Err(_) => "the registered schema could not be re-read".to_string(),
    };
    let message = format!("{}; {}", err.message(), note);
    err.with_message(message)
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("router", &self.router)
            .field("options", &self.options)
            .finish()
    }
}
