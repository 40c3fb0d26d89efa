//! Lookup of live instances by composition identifier.
//!
//! Every instance of a composition tree registers here on creation and
//! removes itself on teardown. Entries are weak, so the directory never keeps
//! an instance alive.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use sluice_core::CompositionIdentifier;

use crate::instance::InstanceCore;

#[derive(Default)]
pub(crate) struct InstanceDirectory {
    entries: RwLock<HashMap<CompositionIdentifier, Weak<InstanceCore>>>,
}

impl InstanceDirectory {
    pub fn insert(&self, identifier: CompositionIdentifier, core: Weak<InstanceCore>) {
        self.entries.write().insert(identifier, core);
    }

    pub fn remove(&self, identifier: &CompositionIdentifier) {
        self.entries.write().remove(identifier);
    }

    pub fn get(&self, identifier: &CompositionIdentifier) -> Option<Arc<InstanceCore>> {
        self.entries.read().get(identifier).and_then(Weak::upgrade)
    }

    /// Identifiers of live instances, sorted.
    pub fn identifiers(&self) -> Vec<CompositionIdentifier> {
        let mut identifiers: Vec<_> = self
            .entries
            .read()
            .iter()
            .filter(|(_, core)| core.strong_count() > 0)
            .map(|(identifier, _)| identifier.clone())
            .collect();
        identifiers.sort();
        identifiers
    }
}
