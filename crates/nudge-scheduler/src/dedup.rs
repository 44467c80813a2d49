//! Process-lifetime set of notification ids already reported to the host.
//! Not persisted: duplicate suppression is best-effort per attachment.

use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<i32>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as reported. Returns `true` if it was not already marked.
    pub fn mark(&mut self, id: i32) -> bool {
        self.seen.insert(id)
    }

    pub fn contains(&self, id: i32) -> bool {
        self.seen.contains(&id)
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Sorted snapshot of the marked ids.
    pub fn ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self.seen.iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}
