use serde::{Deserialize, Serialize};

/// A named (or inline) restricted type declared by the schema
///
/// Enumerations become single-choice selects; `xs:list` types whose item type
/// is an enumeration become multi-selects stored as one flag column per value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SimpleType {
    pub name: String,
    /// Restriction base, e.g. `xsd:string`
    pub base: Option<String>,
    /// Values allowed by `xs:enumeration` facets, in declaration order
    pub allowable_values: Vec<String>,
    /// Values a multi-select list may contain
    pub multiselect_values: Vec<String>,
    pub is_list: bool,
}

impl SimpleType {
    pub fn enumeration(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn list(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_list: true,
            ..Self::default()
        }
    }

    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if self.is_list {
            self.multiselect_values = values;
        } else {
            self.allowable_values = values;
        }
        self
    }

    /// Values repeated within the enumeration, each reported once
    pub fn duplicate_values(&self) -> Vec<String> {
        let values = if self.is_list {
            &self.multiselect_values
        } else {
            &self.allowable_values
        };
        let mut seen = std::collections::HashSet::new();
        let mut dups = Vec::new();
        for value in values {
            if !seen.insert(value.as_str()) && !dups.contains(value) {
                dups.push(value.clone());
            }
        }
        dups
    }
}
