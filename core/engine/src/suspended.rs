//! FILENAME: core/engine/src/suspended.rs
//! PURPOSE: Tracks columns whose construction waits on columns declared later.
//! CONTEXT: One list exists per output sheet. A deferred column is filed under
//! every key it waits for. Each time a column of the sheet is placed, the
//! migration calls `notify` with its key; entries whose last unmet key was
//! that one are handed back for another construction attempt, in the order
//! they were deferred.
//!
//! TERMINOLOGY:
//! - Unmet set: the `_This` keys a deferred column still waits for.
//! - Waitlist:  reverse index from a key to the entries waiting on it.
//!
//! Anything still waiting once the sheet's columns are exhausted is either a
//! reference to a column that is never declared or a cycle; both are reported
//! by `drain_check`.

use std::collections::{BTreeSet, HashMap};

use crate::config::ColumnSpec;
use crate::error::{BlockedColumn, ColumnKey, EngineError};

/// A deferred column.
#[derive(Debug, Clone)]
struct SuspendedColumn {
    spec: ColumnSpec,
    /// Placeholder position reserved in the target table.
    position: usize,
    unmet: BTreeSet<ColumnKey>,
    released: bool,
}

/// A column whose unmet set just became empty.
#[derive(Debug, Clone)]
pub struct Released {
    pub spec: ColumnSpec,
    pub position: usize,
}

#[derive(Debug, Default)]
pub struct SuspendedList {
    sheet: String,
    entries: Vec<SuspendedColumn>,
    waitlist: HashMap<ColumnKey, Vec<usize>>,
}

impl SuspendedList {
    pub fn new(sheet: impl Into<String>) -> Self {
        SuspendedList {
            sheet: sheet.into(),
            entries: Vec::new(),
            waitlist: HashMap::new(),
        }
    }

    /// Files a column under every key of its unmet set.
    pub fn defer(
        &mut self,
        spec: ColumnSpec,
        position: usize,
        unmet: BTreeSet<ColumnKey>,
    ) -> Result<(), EngineError> {
        if unmet.is_empty() {
            return Err(EngineError::Config(format!(
                "column '{}' in sheet '{}' was deferred without naming what it waits for",
                spec.title, self.sheet
            )));
        }
        let id = self.entries.len();
        for key in &unmet {
            self.waitlist.entry(key.clone()).or_default().push(id);
        }
        self.entries.push(SuspendedColumn {
            spec,
            position,
            unmet,
            released: false,
        });
        Ok(())
    }

    /// Marks `key` as available. Returns the entries it released.
    pub fn notify(&mut self, key: &ColumnKey) -> Vec<Released> {
        let Some(waiting) = self.waitlist.remove(key) else {
            return Vec::new();
        };
        let mut released = Vec::new();
        for id in waiting {
            let entry = &mut self.entries[id];
            entry.unmet.remove(key);
            if entry.unmet.is_empty() && !entry.released {
                entry.released = true;
                released.push(Released {
                    spec: entry.spec.clone(),
                    position: entry.position,
                });
            }
        }
        released
    }

    /// Number of entries still waiting.
    pub fn pending(&self) -> usize {
        self.entries.iter().filter(|e| !e.released).count()
    }

    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }

    /// Entries still waiting, ordered by reserved position.
    pub fn blocked(&self) -> Vec<BlockedColumn> {
        let mut blocked: Vec<BlockedColumn> = self
            .entries
            .iter()
            .filter(|e| !e.released)
            .map(|e| BlockedColumn {
                title: e.spec.title.clone(),
                position: e.position,
                unmet: e.unmet.iter().cloned().collect(),
            })
            .collect();
        blocked.sort_by_key(|b| b.position);
        blocked
    }

    /// Fails if any entry is still waiting.
    pub fn drain_check(&self) -> Result<(), EngineError> {
        let blocked = self.blocked();
        if blocked.is_empty() {
            return Ok(());
        }
        Err(EngineError::Dependency {
            sheet: self.sheet.clone(),
            blocked,
        })
    }
}
