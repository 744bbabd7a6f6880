use serde::{Deserialize, Serialize};

/// What to do with instance or meta fields the schema does not declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtraFieldPolicy {
    /// Report extras but never fail because of them
    #[default]
    Warn,
    /// Treat extras as failures
    Reject,
}

/// Classified result of one validation run
///
/// The four lists are independent; a single run may populate several of
/// them. Entries are xpaths (or `type:value` for duplicate enumeration
/// values) and are kept unique within each list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorSet {
    pub missing: Vec<String>,
    pub duplicate: Vec<String>,
    pub extra: Vec<String>,
    pub bad_type: Vec<String>,
}

impl ValidationErrorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_missing(&mut self, entry: impl Into<String>) {
        push_unique(&mut self.missing, entry.into());
    }

    pub fn push_duplicate(&mut self, entry: impl Into<String>) {
        push_unique(&mut self.duplicate, entry.into());
    }

    pub fn push_extra(&mut self, entry: impl Into<String>) {
        push_unique(&mut self.extra, entry.into());
    }

    pub fn push_bad_type(&mut self, entry: impl Into<String>) {
        push_unique(&mut self.bad_type, entry.into());
    }

    /// True when nothing build-breaking was found
    ///
    /// `extra` is informational and does not count.
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.duplicate.is_empty() && self.bad_type.is_empty()
    }

    /// True when all four lists are empty
    pub fn is_clean(&self) -> bool {
        self.is_empty() && self.extra.is_empty()
    }

    /// Pass/fail under an extra-field policy
    pub fn passes(&self, policy: ExtraFieldPolicy) -> bool {
        match policy {
            ExtraFieldPolicy::Warn => self.is_empty(),
            ExtraFieldPolicy::Reject => self.is_clean(),
        }
    }

    /// Fold another result into this one
    pub fn merge(&mut self, other: ValidationErrorSet) {
        other.missing.into_iter().for_each(|e| self.push_missing(e));
        other.duplicate.into_iter().for_each(|e| self.push_duplicate(e));
        other.extra.into_iter().for_each(|e| self.push_extra(e));
        other.bad_type.into_iter().for_each(|e| self.push_bad_type(e));
    }
}

fn push_unique(list: &mut Vec<String>, entry: String) {
    if !list.contains(&entry) {
        list.push(entry);
    }
}

impl std::fmt::Display for ValidationErrorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_clean() {
            return write!(f, "no validation errors");
        }
        let mut parts = Vec::new();
        for (label, items) in [
            ("missing", &self.missing),
            ("duplicate", &self.duplicate),
            ("extra", &self.extra),
            ("bad type", &self.bad_type),
        ] {
            if !items.is_empty() {
                parts.push(format!("{}: {}", label, items.join(", ")));
            }
        }
        write!(f, "{}", parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extra_only_is_still_empty() {
        let mut errors = ValidationErrorSet::new();
        errors.push_extra("data/unexpected");
        assert!(errors.is_empty());
        assert!(!errors.is_clean());
        assert!(errors.passes(ExtraFieldPolicy::Warn));
        assert!(!errors.passes(ExtraFieldPolicy::Reject));
    }

    #[test]
    fn test_entries_are_unique() {
        let mut errors = ValidationErrorSet::new();
        errors.push_missing("data/device_id");
        errors.push_missing("data/device_id");
        assert_eq!(errors.missing.len(), 1);
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_display_lists_populated_categories() {
        let mut errors = ValidationErrorSet::new();
        errors.push_missing("data/a");
        errors.push_bad_type("data/b");
        assert_eq!(errors.to_string(), "missing: data/a; bad type: data/b");
        assert_eq!(ValidationErrorSet::new().to_string(), "no validation errors");
    }

    #[test]
    fn test_policy_deserializes_lowercase() {
        let policy: ExtraFieldPolicy = serde_json::from_str("\"reject\"").unwrap();
        assert_eq!(policy, ExtraFieldPolicy::Reject);
    }
}
