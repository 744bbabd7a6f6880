//! Storage identifier sanitizer
//!
//! Maps arbitrary element paths and namespaces onto SQL identifiers that are
//! lower-case, limited to `[a-z0-9_]`, capped so that `prefix + identifier`
//! fits the platform limit, and never a bare SQL keyword. Truncation keeps the
//! rightmost (most specific) part of the name.

use crate::errors::{Result, XFormError};

/// Default platform identifier limit
pub const DEFAULT_IDENTIFIER_LIMIT: usize = 64;

/// Default fixed prefix for generated table names
pub const DEFAULT_TABLE_PREFIX: &str = "x_";

const RESERVED_WORDS: &[&str] = &[
    "abort", "action", "add", "after", "all", "alter", "analyze", "and", "as", "asc", "attach",
    "autoincrement", "before", "begin", "between", "by", "cascade", "case", "cast", "check",
    "collate", "column", "commit", "conflict", "constraint", "create", "cross", "current",
    "current_date", "current_time", "current_timestamp", "database", "default", "deferrable",
    "deferred", "delete", "desc", "detach", "distinct", "do", "drop", "each", "else", "end",
    "escape", "except", "exclusive", "exists", "explain", "fail", "filter", "for", "foreign",
    "from", "full", "glob", "group", "having", "if", "ignore", "immediate", "in", "index",
    "indexed", "initially", "inner", "insert", "instead", "intersect", "into", "is", "isnull",
    "join", "key", "left", "like", "limit", "match", "natural", "no", "not", "nothing",
    "notnull", "null", "of", "offset", "on", "or", "order", "outer", "over", "plan", "pragma",
    "primary", "query", "raise", "recursive", "references", "regexp", "reindex", "release",
    "rename", "replace", "restrict", "right", "rollback", "row", "rows", "savepoint", "select",
    "set", "table", "temp", "temporary", "then", "to", "transaction", "trigger", "union",
    "unique", "update", "user", "using", "vacuum", "values", "view", "virtual", "when", "where",
    "window", "with", "without",
];

/// Returns true if `word` is an SQL keyword that cannot be a bare identifier
pub fn is_reserved(word: &str) -> bool {
    RESERVED_WORDS.binary_search(&word).is_ok()
}

/// Deterministic, idempotent identifier sanitizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierSanitizer {
    limit: usize,
    prefix: String,
}

impl Default for IdentifierSanitizer {
    fn default() -> Self {
        Self {
            limit: DEFAULT_IDENTIFIER_LIMIT,
            prefix: DEFAULT_TABLE_PREFIX.to_string(),
        }
    }
}

impl IdentifierSanitizer {
    /// Build a sanitizer for a platform limit and table prefix
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdentifierLimit` when the prefix leaves fewer than two
    /// characters for the identifier itself.
    pub fn new(limit: usize, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        if limit < prefix.len() + 2 {
            return Err(XFormError::InvalidIdentifierLimit { limit, prefix });
        }
        Ok(Self { limit, prefix })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Maximum length of a sanitized identifier
    pub fn capacity(&self) -> usize {
        self.limit - self.prefix.len()
    }

    /// Sanitize a single name or path
    pub fn sanitize(&self, name: &str) -> String {
        let cap = self.capacity();
        let mapped: String = name
            .chars()
            .map(|c| {
                let c = c.to_ascii_lowercase();
                if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        // all ascii from here on, byte slicing is char slicing
        let mut ident = if mapped.len() > cap {
            mapped[mapped.len() - cap..].to_string()
        } else {
            mapped
        };

        if ident.is_empty() {
            return "_".to_string();
        }

        let needs_guard = ident.starts_with(|c: char| c.is_ascii_digit()) || is_reserved(&ident);
        if needs_guard {
            if ident.len() >= cap {
                ident.remove(0);
            }
            ident.insert(0, '_');
        }
        ident
    }

    /// Prefixed table name for a form node
    ///
    /// The key combines domain, namespace and node xpath so that the same form
    /// registered in two domains gets distinct tables.
    pub fn table_name(&self, domain: &str, namespace: &str, xpath: &str) -> String {
        let key = if domain.is_empty() {
            format!("{}_{}", namespace, xpath)
        } else {
            format!("{}_{}_{}", domain, namespace, xpath)
        };
        format!("{}{}", self.prefix, self.sanitize(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reserved_word_list_is_sorted() {
        let mut sorted = RESERVED_WORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, RESERVED_WORDS);
    }

    #[test]
    fn test_replaces_separators_and_lowercases() {
        let s = IdentifierSanitizer::default();
        assert_eq!(s.sanitize("data/Meta/device-id"), "data_meta_device_id");
        assert_eq!(s.sanitize("http://dev.commcarehq.org/x"), "http___dev_commcarehq_org_x");
        assert_eq!(s.sanitize("first name"), "first_name");
    }

    #[test]
    fn test_reserved_word_gets_underscore() {
        let s = IdentifierSanitizer::default();
        assert_eq!(s.sanitize("where"), "_where");
        assert_eq!(s.sanitize("Group"), "_group");
        assert_eq!(s.sanitize("_where"), "_where");
    }

    #[test]
    fn test_leading_digit_gets_underscore() {
        let s = IdentifierSanitizer::default();
        assert_eq!(s.sanitize("2nd_visit"), "_2nd_visit");
    }

    #[test]
    fn test_truncation_keeps_rightmost_suffix() {
        let s = IdentifierSanitizer::new(12, "x_").unwrap();
        let out = s.sanitize("household/members/first_name");
        assert_eq!(out.len(), 10);
        assert_eq!(out, "first_name");
    }

    #[test]
    fn test_limit_too_small_for_prefix() {
        let err = IdentifierSanitizer::new(3, "x_").unwrap_err();
        assert!(matches!(err, XFormError::InvalidIdentifierLimit { .. }));
    }

    #[test]
    fn test_table_name_includes_prefix() {
        let s = IdentifierSanitizer::default();
        assert_eq!(s.table_name("demo", "urn:test", "data"), "x_demo_urn_test_data");
        assert_eq!(s.table_name("", "urn:test", "data/users"), "x_urn_test_data_users");
    }

    proptest! {
        #[test]
        fn prop_sanitize_is_idempotent(name in ".{0,120}") {
            let s = IdentifierSanitizer::default();
            let once = s.sanitize(&name);
            prop_assert_eq!(s.sanitize(&once), once);
        }

        #[test]
        fn prop_sanitize_respects_capacity(name in ".{0,200}", limit in 8usize..80) {
            let s = IdentifierSanitizer::new(limit, "x_").unwrap();
            let out = s.sanitize(&name);
            prop_assert!(!out.is_empty());
            prop_assert!(out.len() <= s.capacity());
            prop_assert!(out.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
            prop_assert!(!is_reserved(&out));
        }
    }
}
