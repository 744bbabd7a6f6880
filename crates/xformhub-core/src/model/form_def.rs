use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::element::{DataType, ElementDef, ElementId, SchemaNode};
use super::simple_type::SimpleType;

/// A parsed form schema
///
/// Elements live in an arena owned by the form; parents refer to children by
/// [`ElementId`] and children point back through `ElementDef::parent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormDef {
    pub target_namespace: String,
    pub form_name: String,
    pub domain: Option<String>,
    /// Integer version, `None` when absent or not an integer
    pub version: Option<u32>,
    pub uiversion: Option<u32>,
    /// Version attribute exactly as declared
    pub raw_version: Option<String>,
    pub raw_uiversion: Option<String>,
    /// Named and inline simple types, keyed by name
    pub types: BTreeMap<String, SimpleType>,
    elements: Vec<ElementDef>,
    root: ElementId,
    xpath_index: HashMap<String, ElementId>,
    /// Xpaths declared more than once in the schema
    redeclared: Vec<String>,
}

impl FormDef {
    /// Create a form whose root element is an empty group named `root_name`
    pub fn new(target_namespace: impl Into<String>, root_name: impl Into<String>) -> Self {
        let root_name = root_name.into();
        let mut root = ElementDef::element(root_name.clone(), DataType::String);
        root.xpath = root_name.clone();
        root.min_occurs = 1;
        root.node = SchemaNode::Group(Vec::new());

        let mut xpath_index = HashMap::new();
        xpath_index.insert(root_name.clone(), ElementId(0));

        Self {
            target_namespace: target_namespace.into(),
            form_name: root_name,
            domain: None,
            version: None,
            uiversion: None,
            raw_version: None,
            raw_uiversion: None,
            types: BTreeMap::new(),
            elements: vec![root],
            root: ElementId(0),
            xpath_index,
            redeclared: Vec::new(),
        }
    }

    /// Set the owning domain
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Record the declared version strings and their integer forms
    pub fn set_versions(&mut self, version: Option<&str>, uiversion: Option<&str>) {
        self.raw_version = version.map(str::to_string);
        self.raw_uiversion = uiversion.map(str::to_string);
        self.version = version.and_then(force_to_int);
        self.uiversion = uiversion.and_then(force_to_int);
    }

    /// Attach `def` under `parent` and return its id
    ///
    /// The xpath is computed from the parent. A second declaration of an
    /// existing xpath is recorded as redeclared and the first one is kept.
    pub fn add_element(&mut self, parent: ElementId, mut def: ElementDef) -> ElementId {
        let parent_xpath = self.elements[parent.0].xpath.clone();
        def.xpath = if def.is_attribute {
            format!("{}/@{}", parent_xpath, def.name)
        } else {
            format!("{}/{}", parent_xpath, def.name)
        };

        if let Some(existing) = self.xpath_index.get(&def.xpath) {
            if !self.redeclared.contains(&def.xpath) {
                self.redeclared.push(def.xpath.clone());
            }
            return *existing;
        }

        def.parent = Some(parent);
        let id = ElementId(self.elements.len());
        self.xpath_index.insert(def.xpath.clone(), id);
        self.elements.push(def);
        self.elements[parent.0].push_child(id);
        id
    }

    pub fn root(&self) -> ElementId {
        self.root
    }

    pub fn root_element(&self) -> &ElementDef {
        &self.elements[self.root.0]
    }

    pub fn get(&self, id: ElementId) -> Option<&ElementDef> {
        self.elements.get(id.0)
    }

    /// Mutable access for the parser to adjust occurrence bounds
    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut ElementDef> {
        self.elements.get_mut(id.0)
    }

    /// Child elements of `id`, in declaration order
    pub fn children(&self, id: ElementId) -> impl Iterator<Item = (ElementId, &ElementDef)> {
        self.get(id)
            .map(|e| e.children())
            .unwrap_or(&[])
            .iter()
            .filter_map(move |child| self.get(*child).map(|def| (*child, def)))
    }

    /// Every element in pre-order, root first
    pub fn iter(&self) -> Vec<(ElementId, &ElementDef)> {
        let mut out = Vec::with_capacity(self.elements.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if let Some(def) = self.get(id) {
                out.push((id, def));
                stack.extend(def.children().iter().rev().copied());
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.len() <= 1
    }

    pub fn find_by_xpath(&self, xpath: &str) -> Option<ElementId> {
        self.xpath_index.get(xpath).copied()
    }

    /// All xpaths in pre-order
    pub fn xpaths(&self) -> Vec<String> {
        self.iter().into_iter().map(|(_, e)| e.xpath.clone()).collect()
    }

    pub fn redeclared(&self) -> &[String] {
        &self.redeclared
    }

    /// Direct child of the root named `meta` (case-insensitive), if any
    pub fn meta_element(&self) -> Option<ElementId> {
        self.children(self.root)
            .find(|(_, e)| !e.is_attribute && e.name.eq_ignore_ascii_case("meta"))
            .map(|(id, _)| id)
    }

    /// Simple type for a select or multi-select element
    pub fn simple_type(&self, data_type: &DataType) -> Option<&SimpleType> {
        match data_type {
            DataType::Select(name) | DataType::MultiSelect(name) => self.types.get(name),
            _ => None,
        }
    }
}

/// Integer form of a version attribute, or `None` when it does not parse
pub fn force_to_int(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}
