//! Identifier allocation for nodes referenced in generated statements.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};

/// Identifier used when a label normalizes to nothing.
pub const FALLBACK_IDENTIFIER: &str = "n";

/// Hands out unique, readable statement identifiers derived from labels.
///
/// The first identifier for a label is the bare normalized label
/// (`Person` -> `person`), later ones get an increasing suffix
/// (`person0`, `person1`, ...).
#[derive(Debug, Default)]
pub struct IdentifierAllocator {
    counters: BTreeMap<String, usize>,
    issued: BTreeSet<String>,
}

impl IdentifierAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, label: &str) -> String {
        let base = normalize(label);
        if !self.counters.contains_key(&base) && !self.issued.contains(&base) {
            self.counters.insert(base.clone(), 0);
            self.issued.insert(base.clone());
            return base;
        }

        let counter = self.counters.entry(base.clone()).or_insert(0);
        // A suffixed candidate can clash with another label's bare form
        // (`Person0`), so skip anything already handed out.
        loop {
            let candidate = format!("{base}{counter}");
            *counter += 1;
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Forgets every identifier issued so far.
    pub fn reset(&mut self) {
        self.counters.clear();
        self.issued.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}

fn normalize(label: &str) -> String {
    let normalized: String = label
        .chars()
        .filter(|c| *c != ' ')
        .flat_map(char::to_lowercase)
        .collect();
    if normalized.is_empty() {
        FALLBACK_IDENTIFIER.to_string()
    } else {
        normalized
    }
}

static GLOBAL: Mutex<IdentifierAllocator> = Mutex::new(IdentifierAllocator {
    counters: BTreeMap::new(),
    issued: BTreeSet::new(),
});

/// Allocates from the process-wide allocator.
pub fn allocate(label: &str) -> String {
    GLOBAL
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .allocate(label)
}

/// Clears the process-wide allocator. Call whenever the graph is rebuilt.
pub fn reset() {
    GLOBAL
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .reset();
    tracing::debug!("identifier allocator reset");
}
