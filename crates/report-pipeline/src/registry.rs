//! Name -> implementation lookup for parsers and vector backends

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Registry of trait objects addressed by lowercase name
pub struct Registry<T: ?Sized> {
    kind: &'static str,
    entries: BTreeMap<String, Arc<T>>,
    aliases: BTreeMap<String, String>,
}

impl<T: ?Sized> Registry<T> {
    /// Create an empty registry; `kind` names the entries in error messages
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
            aliases: BTreeMap::new(),
        }
    }

    /// Register an implementation, replacing any previous one with the same name
    pub fn register(&mut self, name: impl AsRef<str>, entry: Arc<T>) {
        self.entries.insert(name.as_ref().to_lowercase(), entry);
    }

    /// Accept `alias` as another name for `target`; aliases are not listed by `names`
    pub fn alias(&mut self, alias: impl AsRef<str>, target: impl AsRef<str>) {
        self.aliases
            .insert(alias.as_ref().to_lowercase(), target.as_ref().to_lowercase());
    }

    /// Look up an implementation by name or alias
    pub fn get(&self, name: &str) -> Result<Arc<T>> {
        let mut name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(Error::validation(format!("Select a {} first", self.kind)));
        }
        if let Some(target) = self.aliases.get(&name) {
            name = target.clone();
        }
        self.entries.get(&name).cloned().ok_or_else(|| {
            Error::validation(format!(
                "Unknown {} '{}' (available: {})",
                self.kind,
                name,
                self.names().join(", ")
            ))
        })
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Sorted names of the entries matching `predicate`
    pub fn names_where(&self, predicate: impl Fn(&T) -> bool) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| predicate(&***entry))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
