//! Deferred cross-class semantics.
//!
//! In group-inherit scope a call site's semantics are stashed under the
//! called class and member until that class is transformed. Entries are
//! consumed at most once: the transformer takes the whole class entry when
//! it processes the class, whether or not a member used it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::semantics::Monitor;

/// Member key: name followed by the JVM descriptor, `bar()V`.
pub fn member_key(name: &str, descriptor: &str) -> String {
    format!("{name}{descriptor}")
}

/// Semantics assigned to one class, keyed by [`member_key`].
pub type ClassAssignments = HashMap<String, Arc<Monitor>>;

#[derive(Debug, Default)]
pub struct AssignmentRegistry {
    classes: Mutex<HashMap<String, ClassAssignments>>,
}

impl AssignmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `semantics` for `member` of `class_name` (dotted). A later
    /// assignment to the same member replaces the earlier one.
    pub fn assign(&self, class_name: &str, member: String, semantics: Arc<Monitor>) {
        self.classes
            .lock()
            .entry(class_name.to_string())
            .or_default()
            .insert(member, semantics);
    }

    /// Removes and returns the entry of a class. Removing twice is a no-op.
    pub fn delete(&self, class_name: &str) -> Option<ClassAssignments> {
        self.classes.lock().remove(class_name)
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.classes.lock().contains_key(class_name)
    }

    /// The semantics waiting for one member, without consuming them.
    pub fn lookup(&self, class_name: &str, member: &str) -> Option<Arc<Monitor>> {
        self.classes.lock().get(class_name).and_then(|members| members.get(member)).cloned()
    }

    /// Snapshot of the class names with pending entries.
    ///
    /// The returned list is detached from the registry, so transforming
    /// the named classes (which deletes their entries and may add new
    /// ones) cannot disturb the iteration.
    pub fn pending(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.classes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.lock().is_empty()
    }
}
