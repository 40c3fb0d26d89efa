//! Schedule diffs for live replacement.
//!
//! When a running composition is replaced, the runtime needs to know which
//! nodes of the new schedule are "the same" as nodes of the old one, so their
//! persistent instance data and port values are migrated instead of recreated.
//! A [`ScheduleDiff`] records that mapping by node name.

use std::collections::HashMap;

use super::schedule::GraphSchedule;

/// Maps nodes of a new schedule to the nodes of the old schedule they carry
/// over from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleDiff {
    carried: HashMap<String, String>,
}

impl ScheduleDiff {
    /// A diff that carries nothing: every node is recreated.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Carries every node of `new` whose name and class match a node of `old`.
    pub fn between(old: &GraphSchedule, new: &GraphSchedule) -> Self {
        let carried = new
            .nodes()
            .iter()
            .filter(|node| {
                old.node_by_name(node.name())
                    .is_some_and(|id| old.node(id).class() == node.class())
            })
            .map(|node| (node.name().to_string(), node.name().to_string()))
            .collect();
        Self { carried }
    }

    /// Carries every node of `schedule` onto itself.
    pub fn identity(schedule: &GraphSchedule) -> Self {
        Self::between(schedule, schedule)
    }

    /// Records that new node `new_name` carries over from old node `old_name`
    /// (a rename).
    pub fn with_carried(mut self, new_name: &str, old_name: &str) -> Self {
        self.carried
            .insert(new_name.to_string(), old_name.to_string());
        self
    }

    /// Forces new node `new_name` to be recreated.
    pub fn without(mut self, new_name: &str) -> Self {
        self.carried.remove(new_name);
        self
    }

    /// Old node name that new node `new_name` carries over from.
    pub fn carried_from(&self, new_name: &str) -> Option<&str> {
        self.carried.get(new_name).map(String::as_str)
    }

    /// Number of carried nodes.
    pub fn carried_count(&self) -> usize {
        self.carried.len()
    }

    /// Iterates `(new name, old name)` pairs.
    pub fn carried(&self) -> impl Iterator<Item = (&str, &str)> {
        self.carried.iter().map(|(n, o)| (n.as_str(), o.as_str()))
    }
}
