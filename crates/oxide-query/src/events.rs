//! Before/after hooks around terminal operations.
//!
//! Hooks are registered per `(event, table)`; hooks registered for
//! [`ANY_TABLE`] run for every table, after the table-specific ones. A hook
//! returning `Some` short-circuits the remaining hooks, and for `Before*`
//! events also replaces the database round-trip with the returned outcome.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use oxide_query_core::{Query, Record};

use crate::row::Row;

/// Table key matching every table.
pub const ANY_TABLE: &str = ":any";

/// Hookable events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    BeforeSelect,
    AfterSelect,
    BeforeInsert,
    AfterInsert,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
}

impl Event {
    /// Returns the event name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BeforeSelect => "before-select",
            Self::AfterSelect => "after-select",
            Self::BeforeInsert => "before-insert",
            Self::AfterInsert => "after-insert",
            Self::BeforeUpdate => "before-update",
            Self::AfterUpdate => "after-update",
            Self::BeforeDelete => "before-delete",
            Self::AfterDelete => "after-delete",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a hook gets to see.
#[derive(Debug, Clone, Copy)]
pub struct EventContext<'a> {
    pub event: Event,
    pub table: &'a str,
    /// The compiled statement. For batch inserts, the first one.
    pub query: Option<&'a Query>,
    /// Insert payload.
    pub records: Option<&'a [Record]>,
    /// Rows returned by a select.
    pub rows: Option<&'a [Row]>,
    /// Identifiers returned by an insert.
    pub insert_ids: Option<&'a [Option<i64>]>,
    /// Rows touched by an update or delete.
    pub affected: Option<u64>,
    /// Time spent in the database.
    pub elapsed: Option<Duration>,
}

impl<'a> EventContext<'a> {
    /// Creates an empty context.
    #[must_use]
    pub const fn new(event: Event, table: &'a str) -> Self {
        Self {
            event,
            table,
            query: None,
            records: None,
            rows: None,
            insert_ids: None,
            affected: None,
            elapsed: None,
        }
    }
}

/// A substitute result.
#[derive(Debug, Clone, PartialEq)]
pub enum HookOutcome {
    Rows(Vec<Row>),
    InsertIds(Vec<Option<i64>>),
    Affected(u64),
}

/// A registered hook.
pub type Hook = Arc<dyn Fn(&EventContext<'_>) -> Option<HookOutcome> + Send + Sync>;

/// Hooks keyed by `(event, table)`.
#[derive(Default)]
pub struct EventRegistry {
    hooks: RwLock<HashMap<(Event, String), Vec<Hook>>>,
}

impl EventRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hook for a table, or for [`ANY_TABLE`].
    pub fn register<F>(&self, event: Event, table: &str, hook: F)
    where
        F: Fn(&EventContext<'_>) -> Option<HookOutcome> + Send + Sync + 'static,
    {
        self.hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((event, table.to_string()))
            .or_default()
            .push(Arc::new(hook));
    }

    /// Returns the hooks registered under exactly this key.
    #[must_use]
    pub fn get(&self, event: Event, table: &str) -> Vec<Hook> {
        self.hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(event, table.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Removes every hook under a key. Returns whether any were removed.
    pub fn remove(&self, event: Event, table: &str) -> bool {
        self.hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(event, table.to_string()))
            .is_some()
    }

    /// Runs the table's hooks, then the [`ANY_TABLE`] hooks.
    ///
    /// Hooks run outside the lock, so a hook may register or remove hooks.
    pub fn fire(&self, context: &EventContext<'_>) -> Option<HookOutcome> {
        let mut hooks = self.get(context.event, context.table);
        if context.table != ANY_TABLE {
            hooks.extend(self.get(context.event, ANY_TABLE));
        }
        hooks.iter().find_map(|hook| hook(context))
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hooks = self.hooks.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<String> = hooks
            .iter()
            .map(|((event, table), list)| format!("{event}@{table} x{}", list.len()))
            .collect();
        keys.sort();
        f.debug_struct("EventRegistry").field("hooks", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_table_hooks_run_before_any_hooks() {
        let registry = EventRegistry::new();
        registry.register(Event::BeforeDelete, ANY_TABLE, |_| Some(HookOutcome::Affected(1)));
        registry.register(Event::BeforeDelete, "users", |_| Some(HookOutcome::Affected(2)));

        let users = EventContext::new(Event::BeforeDelete, "users");
        assert_eq!(registry.fire(&users), Some(HookOutcome::Affected(2)));

        let posts = EventContext::new(Event::BeforeDelete, "posts");
        assert_eq!(registry.fire(&posts), Some(HookOutcome::Affected(1)));
    }

    #[test]
    fn test_none_lets_later_hooks_run() {
        let registry = EventRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        registry.register(Event::AfterInsert, "users", move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            None
        });
        registry.register(Event::AfterInsert, ANY_TABLE, |_| None);

        let context = EventContext::new(Event::AfterInsert, "users");
        assert_eq!(registry.fire(&context), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.get(Event::AfterInsert, "users").len(), 1);

        assert!(registry.remove(Event::AfterInsert, "users"));
        assert!(!registry.remove(Event::AfterInsert, "users"));
    }
}
