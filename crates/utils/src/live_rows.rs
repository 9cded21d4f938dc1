//! Idempotent merge of rows arriving from a snapshot and a change feed.
//!
//! A feed may deliver the same row twice (once in the initial snapshot, once
//! as a live event) or deliver an older version after a newer one. Rows are
//! keyed by id and only a strictly newer version replaces what is held.

use std::{collections::HashMap, hash::Hash};

use chrono::{DateTime, Utc};

pub trait LiveRow {
    type Key: Eq + Hash + Clone;

    fn key(&self) -> Self::Key;
    fn version(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Replaced,
    /// Same or older version than the one already held; ignored.
    Stale,
}

impl MergeOutcome {
    pub fn is_fresh(self) -> bool {
        !matches!(self, MergeOutcome::Stale)
    }
}

#[derive(Debug, Clone)]
pub struct LiveRows<T: LiveRow> {
    rows: HashMap<T::Key, T>,
    order: Vec<T::Key>,
}

impl<T: LiveRow> Default for LiveRows<T> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<T: LiveRow> LiveRows<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, row: T) -> MergeOutcome {
        let key = row.key();
        match self.rows.get(&key) {
            Some(held) if held.version() >= row.version() => MergeOutcome::Stale,
            Some(_) => {
                self.rows.insert(key, row);
                MergeOutcome::Replaced
            }
            None => {
                self.order.push(key.clone());
                self.rows.insert(key, row);
                MergeOutcome::Inserted
            }
        }
    }

    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.rows.get(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in the order their keys were first seen.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.order.iter().filter_map(|key| self.rows.get(key))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use uuid::Uuid;

    use super::*;

    #[derive(Debug, Clone)]
    struct Row {
        id: Uuid,
        at: DateTime<Utc>,
        body: &'static str,
    }

    impl LiveRow for Row {
        type Key = Uuid;

        fn key(&self) -> Uuid {
            self.id
        }

        fn version(&self) -> DateTime<Utc> {
            self.at
        }
    }

    #[test]
    fn duplicate_delivery_is_ignored() {
        let now = Utc::now();
        let row = Row { id: Uuid::new_v4(), at: now, body: "hi" };
        let mut rows = LiveRows::new();

        assert_eq!(rows.apply(row.clone()), MergeOutcome::Inserted);
        assert_eq!(rows.apply(row), MergeOutcome::Stale);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn older_version_does_not_overwrite_newer() {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let mut rows = LiveRows::new();

        rows.apply(Row { id, at: now, body: "read" });
        let outcome = rows.apply(Row { id, at: now - Duration::seconds(5), body: "unread" });

        assert_eq!(outcome, MergeOutcome::Stale);
        assert_eq!(rows.get(&id).map(|r| r.body), Some("read"));
    }

    #[test]
    fn newer_version_replaces_in_place() {
        let now = Utc::now();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let mut rows = LiveRows::new();

        rows.apply(Row { id: first, at: now, body: "a" });
        rows.apply(Row { id: second, at: now, body: "b" });
        let outcome = rows.apply(Row { id: first, at: now + Duration::seconds(1), body: "a2" });

        assert_eq!(outcome, MergeOutcome::Replaced);
        let bodies: Vec<_> = rows.iter().map(|r| r.body).collect();
        assert_eq!(bodies, vec!["a2", "b"]);
    }
}
