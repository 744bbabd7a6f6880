//! Registration-time diagnostics for a parsed form
//!
//! These checks never mutate anything. Errors block registration in a bundle
//! build; warnings are reported and otherwise ignored.

use serde::Serialize;

use super::error_set::{ExtraFieldPolicy, ValidationErrorSet};
use super::validator::schema_errors;
use crate::model::FormDef;

/// Meta fields every form is expected to carry
pub const DEFAULT_META_FIELDS: &[&str] =
    &["deviceid", "timestart", "timeend", "username", "chw_id", "uid"];

const NAMESPACE_HELP: &str = "Find the <instance> block of the form and add an xmlns attribute \
     to its first element, e.g. <instance><node xmlns=\"http://your.xmlns.goes/here\">";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingNamespace,
    NonUniqueNamespace,
    SchemaDuplicate,
    IdentifierCollision,
    MissingVersion,
    InvalidVersion,
    MissingMeta,
    MetaMissing,
    MetaDuplicate,
    MetaExtra,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaIssue {
    pub kind: IssueKind,
    pub message: String,
}

impl SchemaIssue {
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Diagnostics returned by a form check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaCheck {
    pub errors: Vec<SchemaIssue>,
    pub warnings: Vec<SchemaIssue>,
    /// Classified field problems behind the errors and warnings
    pub fields: ValidationErrorSet,
}

impl SchemaCheck {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(&mut self, kind: IssueKind, message: impl Into<String>) {
        self.errors.push(SchemaIssue::new(kind, message));
    }

    pub fn warning(&mut self, kind: IssueKind, message: impl Into<String>) {
        self.warnings.push(SchemaIssue::new(kind, message));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormCheckOptions {
    pub required_meta_fields: Vec<String>,
    pub extra_fields: ExtraFieldPolicy,
}

impl Default for FormCheckOptions {
    fn default() -> Self {
        Self {
            required_meta_fields: DEFAULT_META_FIELDS.iter().map(|f| f.to_string()).collect(),
            extra_fields: ExtraFieldPolicy::Warn,
        }
    }
}

/// Run namespace, duplicate, version and meta-block checks on `form`
pub fn check_form(form: &FormDef, options: &FormCheckOptions) -> SchemaCheck {
    let mut check = SchemaCheck::default();
    let namespace = form.target_namespace.trim();

    if namespace.is_empty() {
        check.error(
            IssueKind::MissingNamespace,
            format!(
                "No namespace (xmlns) found in submitted form: {}. {}",
                form.form_name, NAMESPACE_HELP
            ),
        );
    } else if namespace.to_ascii_lowercase().contains("www.w3.org") {
        check.error(
            IssueKind::NonUniqueNamespace,
            format!(
                "No unique namespace (xmlns) found in submitted form: {}. {}",
                namespace, NAMESPACE_HELP
            ),
        );
    }

    let duplicates = schema_errors(form);
    for entry in &duplicates.duplicate {
        check.error(
            IssueKind::SchemaDuplicate,
            format!("Duplicate declaration in schema: {}", entry),
        );
    }
    check.fields.merge(duplicates);

    match form.raw_version.as_deref().map(str::trim) {
        None | Some("") => check.warning(
            IssueKind::MissingVersion,
            format!("No version number found in submitted form: {}", namespace),
        ),
        Some(raw) if form.version.is_none() => check.warning(
            IssueKind::InvalidVersion,
            format!(
                "Version attribute must be an integer in xform {} but was {}",
                namespace, raw
            ),
        ),
        Some(_) => {}
    }

    match form.meta_element() {
        None => check.warning(
            IssueKind::MissingMeta,
            format!("Form {} had no meta block", namespace),
        ),
        Some(meta) => check_meta(form, meta, options, &mut check),
    }

    check
}

fn check_meta(
    form: &FormDef,
    meta: crate::model::ElementId,
    options: &FormCheckOptions,
    check: &mut SchemaCheck,
) {
    let mut expected: Vec<String> = options
        .required_meta_fields
        .iter()
        .map(|f| f.to_ascii_lowercase())
        .collect();
    let mut found: Vec<String> = Vec::new();
    let mut meta_errors = ValidationErrorSet::new();
    let meta_xpath = form.get(meta).map(|e| e.xpath.clone()).unwrap_or_default();

    let redeclared = form
        .redeclared()
        .iter()
        .filter_map(|x| x.strip_prefix(&format!("{}/", meta_xpath)).map(str::to_string));
    let declared = form.children(meta).map(|(_, c)| c.name.clone());

    for field in declared.chain(redeclared) {
        let field = field.to_ascii_lowercase();
        if let Some(pos) = expected.iter().position(|e| *e == field) {
            expected.remove(pos);
            found.push(field);
        } else if found.contains(&field) {
            meta_errors.push_duplicate(field);
        } else {
            meta_errors.push_extra(field);
        }
    }
    for field in expected {
        meta_errors.push_missing(field);
    }

    if !meta_errors.missing.is_empty() {
        check.error(
            IssueKind::MetaMissing,
            format!(
                "Meta block of {} is missing fields: {}",
                form.target_namespace,
                meta_errors.missing.join(", ")
            ),
        );
    }
    if !meta_errors.duplicate.is_empty() {
        check.error(
            IssueKind::MetaDuplicate,
            format!(
                "Meta block of {} has duplicate fields: {}",
                form.target_namespace,
                meta_errors.duplicate.join(", ")
            ),
        );
    }
    if !meta_errors.extra.is_empty() {
        let message = format!(
            "Meta block of {} has extra fields: {}",
            form.target_namespace,
            meta_errors.extra.join(", ")
        );
        match options.extra_fields {
            ExtraFieldPolicy::Warn => {
                tracing::warn!(namespace = %form.target_namespace, extra = ?meta_errors.extra, "extra meta fields");
                check.warning(IssueKind::MetaExtra, message);
            }
            ExtraFieldPolicy::Reject => check.error(IssueKind::MetaExtra, message),
        }
    }
    check.fields.merge(meta_errors);
}
