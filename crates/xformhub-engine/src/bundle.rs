//! Bundle validation
//!
//! A bundle is an archive of form schemas at arbitrary paths. An extractor
//! turns it into `(file name, content)` pairs; every form found is parsed
//! and checked, and each offending form contributes one classified entry to
//! a [`BuildError`].

#![allow(clippy::result_large_err)]

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use xformhub_core::errors::{ExError, ExErrorKind, XFormError};
use xformhub_core::validation::{FormCheckOptions, IssueKind, SchemaCheck, SchemaIssue};
use xformhub_core::{log_op_end, log_op_error, log_op_start, xsd, ExtraFieldPolicy, IdentifierSanitizer};
use xformhub_store::errors::{io_error, Result};

use crate::options::RegistryOptions;
use crate::registry::schema_diagnostics;

/// Source of the form files inside a bundle
pub trait BundleExtractor {
    /// Every form file in the bundle as `(file name, content)`
    fn extract(&self, path: &Path) -> Result<Vec<(String, String)>>;
}

/// Treats a directory as an unpacked bundle: every `*.xsd` file at any depth
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryExtractor;

impl BundleExtractor for DirectoryExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<(String, String)>> {
        let mut files = Vec::new();
        collect_xsd(path, path, &mut files)?;
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }
}

fn collect_xsd(root: &Path, dir: &Path, files: &mut Vec<(String, String)>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_error("extract_bundle", e))?;
    for entry in entries {
        let path = entry.map_err(|e| io_error("extract_bundle", e))?.path();
        if path.is_dir() {
            collect_xsd(root, &path, files)?;
            continue;
        }
        let is_xsd = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xsd"));
        if !is_xsd {
            continue;
        }
        let content = std::fs::read_to_string(&path).map_err(|e| io_error("extract_bundle", e))?;
        let name = path.strip_prefix(root).unwrap_or(path.as_path()).to_string_lossy().replace('\\', "/");
        files.push((name, content));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildErrorKind {
    MissingNamespace,
    SchemaParse,
    Missing,
    Duplicate,
    Extra,
    IdentifierCollision,
    /// The bundle itself could not be read
    Unreadable,
}

/// One offending form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormBuildError {
    pub file_name: String,
    pub kind: BuildErrorKind,
    pub message: String,
}

impl std::fmt::Display for FormBuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.file_name, self.message)
    }
}

/// Every form of a bundle that failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} form(s) in the bundle failed validation", .errors.len())]
pub struct BuildError {
    pub errors: Vec<FormBuildError>,
}

impl From<BuildError> for ExError {
    fn from(err: BuildError) -> Self {
        let details: Vec<String> = err.errors.iter().map(|e| e.to_string()).collect();
        ExError::new(ExErrorKind::BuildFailed)
            .with_op("validate_bundle")
            .with_message(format!("{}: {}", err, details.join("; ")))
    }
}

/// A form that passed, with whatever warnings it raised
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleForm {
    pub file_name: String,
    pub namespace: String,
    pub version: Option<u32>,
    pub warnings: Vec<SchemaIssue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BundleReport {
    pub forms: Vec<BundleForm>,
}

#[derive(Debug, Clone, Default)]
pub struct BundleValidator {
    checks: FormCheckOptions,
    sanitizer: IdentifierSanitizer,
}

impl BundleValidator {
    pub fn new(options: &RegistryOptions) -> Result<Self> {
        Ok(Self {
            checks: options.form_check_options(),
            sanitizer: options.sanitizer()?,
        })
    }

    /// Check every form in the bundle at `path`
    ///
    /// # Errors
    ///
    /// Returns a [`BuildError`] listing each offending form, or a single
    /// `Unreadable` entry when the bundle cannot be extracted.
    pub fn validate(
        &self,
        extractor: &dyn BundleExtractor,
        path: &Path,
    ) -> std::result::Result<BundleReport, BuildError> {
        let start = Instant::now();
        let bundle = path.display().to_string();
        log_op_start!("validate_bundle", bundle = bundle.as_str());

        let result = self.validate_impl(extractor, path);
        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(report) => {
                log_op_end!(
                    "validate_bundle",
                    duration_ms = duration_ms,
                    bundle = bundle.as_str(),
                    form_count = report.forms.len()
                );
            }
            Err(e) => log_op_error!("validate_bundle", e.clone(), duration_ms = duration_ms),
        }
        result
    }

    fn validate_impl(
        &self,
        extractor: &dyn BundleExtractor,
        path: &Path,
    ) -> std::result::Result<BundleReport, BuildError> {
        let files = extractor.extract(path).map_err(|e| BuildError {
            errors: vec![FormBuildError {
                file_name: path.display().to_string(),
                kind: BuildErrorKind::Unreadable,
                message: e.message().to_string(),
            }],
        })?;

        let mut report = BundleReport::default();
        let mut errors = Vec::new();
        let mut seen: HashMap<String, String> = HashMap::new();

        for (file_name, content) in files {
            let form = match xsd::parse_str(&content) {
                Ok(form) => form,
                Err(err) => {
                    let kind = match err {
                        XFormError::MissingNamespace { .. } => BuildErrorKind::MissingNamespace,
                        _ => BuildErrorKind::SchemaParse,
                    };
                    errors.push(FormBuildError {
                        file_name,
                        kind,
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            if let Some(first) = seen.get(&form.target_namespace) {
                errors.push(FormBuildError {
                    message: format!(
                        "Namespace {} is declared by both {} and {}",
                        form.target_namespace, first, file_name
                    ),
                    file_name,
                    kind: BuildErrorKind::Duplicate,
                });
                continue;
            }
            seen.insert(form.target_namespace.clone(), file_name.clone());

            let check = schema_diagnostics(&form, &self.checks, &self.sanitizer);
            if let Some(kind) = classify(&check, self.checks.extra_fields) {
                let messages: Vec<String> = check.errors.iter().map(|e| e.to_string()).collect();
                errors.push(FormBuildError {
                    file_name,
                    kind,
                    message: messages.join("; "),
                });
                continue;
            }

            report.forms.push(BundleForm {
                file_name,
                namespace: form.target_namespace.clone(),
                version: form.version,
                warnings: check.warnings,
            });
        }

        if errors.is_empty() {
            Ok(report)
        } else {
            Err(BuildError { errors })
        }
    }
}

/// The single kind a failing form is reported under
fn classify(check: &SchemaCheck, policy: ExtraFieldPolicy) -> Option<BuildErrorKind> {
    if check.is_ok() {
        return None;
    }
    let has = |kind: IssueKind| check.errors.iter().any(|e| e.kind == kind);

    let kind = if has(IssueKind::MissingNamespace) || has(IssueKind::NonUniqueNamespace) {
        BuildErrorKind::MissingNamespace
    } else if !check.fields.duplicate.is_empty() {
        BuildErrorKind::Duplicate
    } else if !check.fields.missing.is_empty() {
        BuildErrorKind::Missing
    } else if has(IssueKind::IdentifierCollision) {
        BuildErrorKind::IdentifierCollision
    } else if policy == ExtraFieldPolicy::Reject && !check.fields.extra.is_empty() {
        BuildErrorKind::Extra
    } else {
        BuildErrorKind::SchemaParse
    };
    Some(kind)
}

/// Validate an unpacked bundle directory with default options
///
/// # Errors
///
/// See [`BundleValidator::validate`].
pub fn validate_jar<P: AsRef<Path>>(path: P) -> std::result::Result<BundleReport, BuildError> {
    BundleValidator::default().validate(&DirectoryExtractor, path.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<(&'static str, &'static str)>);

    impl BundleExtractor for Fixed {
        fn extract(&self, _path: &Path) -> Result<Vec<(String, String)>> {
            Ok(self
                .0
                .iter()
                .map(|(n, c)| (n.to_string(), c.to_string()))
                .collect())
        }
    }

    struct Broken;

    impl BundleExtractor for Broken {
        fn extract(&self, _path: &Path) -> Result<Vec<(String, String)>> {
            Err(ExError::new(ExErrorKind::Io).with_message("archive is corrupt"))
        }
    }

    const NO_NAMESPACE: &str = r#"<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema">
  <xsd:element name="data"/>
</xsd:schema>"#;

    const PLAIN: &str = r#"<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:plain">
  <xsd:element name="data">
    <xsd:complexType><xsd:sequence>
      <xsd:element name="name" type="xsd:string"/>
    </xsd:sequence></xsd:complexType>
  </xsd:element>
</xsd:schema>"#;

    #[test]
    fn test_empty_bundle_passes() {
        let report = BundleValidator::default()
            .validate(&Fixed(vec![]), Path::new("empty.jar"))
            .unwrap();
        assert!(report.forms.is_empty());
    }

    #[test]
    fn test_missing_namespace_is_classified() {
        let err = BundleValidator::default()
            .validate(&Fixed(vec![("forms/a.xsd", NO_NAMESPACE)]), Path::new("b.jar"))
            .unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].kind, BuildErrorKind::MissingNamespace);
        assert!(err.errors[0].message.contains("namespace"));
    }

    #[test]
    fn test_warnings_do_not_fail_the_bundle() {
        let report = BundleValidator::default()
            .validate(&Fixed(vec![("a.xsd", PLAIN)]), Path::new("b.jar"))
            .unwrap();
        assert_eq!(report.forms[0].namespace, "urn:plain");
        assert!(!report.forms[0].warnings.is_empty());
    }

    #[test]
    fn test_same_namespace_twice_is_duplicate() {
        let err = BundleValidator::default()
            .validate(&Fixed(vec![("a.xsd", PLAIN), ("b.xsd", PLAIN)]), Path::new("b.jar"))
            .unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].file_name, "b.xsd");
        assert_eq!(err.errors[0].kind, BuildErrorKind::Duplicate);
    }

    #[test]
    fn test_unreadable_bundle() {
        let err = BundleValidator::default()
            .validate(&Broken, Path::new("b.jar"))
            .unwrap_err();
        assert_eq!(err.errors[0].kind, BuildErrorKind::Unreadable);

        let ex: ExError = err.into();
        assert_eq!(ex.code(), "ERR_BUILD_FAILED");
        assert!(ex.message().contains("archive is corrupt"));
    }
}
