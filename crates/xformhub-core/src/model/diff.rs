use serde::Serialize;
use std::collections::BTreeMap;

use super::element::ElementDef;
use super::form_def::FormDef;

/// Structural differences between two versions of a form, keyed by xpath
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Differences {
    /// Present in the other form only
    pub fields_added: Vec<String>,
    /// Present in this form only
    pub fields_removed: Vec<String>,
    /// Same xpath, different shape (repeatability, attribute-ness, occurrence)
    pub fields_changed: Vec<String>,
    /// Same xpath, different declared type
    pub types_changed: Vec<String>,
}

impl Differences {
    pub fn is_empty(&self) -> bool {
        self.fields_added.is_empty()
            && self.fields_removed.is_empty()
            && self.fields_changed.is_empty()
            && self.types_changed.is_empty()
    }
}

impl std::fmt::Display for Differences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "no differences");
        }
        let sections = [
            ("added", &self.fields_added),
            ("removed", &self.fields_removed),
            ("changed", &self.fields_changed),
            ("type changed", &self.types_changed),
        ];
        let mut first = true;
        for (label, items) in sections {
            if items.is_empty() {
                continue;
            }
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            write!(f, "{}: {}", label, items.join(", "))?;
        }
        Ok(())
    }
}

impl FormDef {
    /// Compare this form against `other`
    pub fn differences(&self, other: &FormDef) -> Differences {
        let mine = by_xpath(self);
        let theirs = by_xpath(other);
        let mut diff = Differences::default();

        for (xpath, def) in &mine {
            match theirs.get(xpath) {
                None => diff.fields_removed.push(xpath.clone()),
                Some(other_def) => {
                    if shape(def) != shape(other_def) {
                        diff.fields_changed.push(xpath.clone());
                    }
                    if def.value_type() != other_def.value_type() {
                        diff.types_changed.push(xpath.clone());
                    }
                }
            }
        }
        diff.fields_added = theirs
            .keys()
            .filter(|xpath| !mine.contains_key(*xpath))
            .cloned()
            .collect();
        diff
    }

    /// True when both forms share a namespace and have identical structure
    pub fn is_compatible_with(&self, other: &FormDef) -> bool {
        self.target_namespace == other.target_namespace && self.differences(other).is_empty()
    }
}

fn by_xpath(form: &FormDef) -> BTreeMap<String, &ElementDef> {
    form.iter()
        .into_iter()
        .map(|(_, def)| (def.xpath.clone(), def))
        .collect()
}

fn shape(def: &ElementDef) -> (bool, bool, bool, bool) {
    (
        def.is_repeatable(),
        def.is_attribute,
        def.is_required(),
        def.children().is_empty(),
    )
}
