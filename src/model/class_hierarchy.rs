use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Single-inheritance class model: each class names at most one superclass.
/// Classes that were never registered are treated as leaves with no parent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassHierarchy {
    superclasses: BTreeMap<String, String>,
}

impl ClassHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges<I, K, V>(edges: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut hierarchy = Self::new();
        for (class, superclass) in edges {
            hierarchy.register(class, superclass);
        }
        hierarchy
    }

    pub fn register(&mut self, class: impl Into<String>, superclass: impl Into<String>) {
        self.superclasses.insert(class.into(), superclass.into());
    }

    pub fn superclass(&self, class: &str) -> Option<&str> {
        self.superclasses.get(class).map(String::as_str)
    }

    /// True when `class` is `ancestor` or inherits from it.
    pub fn is_a(&self, class: &str, ancestor: &str) -> bool {
        let mut current = Some(class);
        // Bounded walk so a cyclic configuration cannot loop forever.
        for _ in 0..=self.superclasses.len() {
            match current {
                Some(name) if name == ancestor => return true,
                Some(name) => current = self.superclass(name),
                None => return false,
            }
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.superclasses.is_empty()
    }
}
