//! The single authoritative store.
//!
//! Every mutation flows through `Store::mutate`, which applies the change to
//! the in-memory `Database`, persists it, and then notifies subscribers with
//! the fresh snapshot. Scheduler and report code only ever see a `&Database`
//! snapshot, never intermediate state.
//!
//! Subscriptions are a callback registry with a cancellation handle; they
//! stand in for the push-based snapshot stream a remote backing store would
//! provide. Single-threaded by design, matching the event-driven execution
//! model: no locks, the JSON file is the sole serialization point.

use std::path::PathBuf;

use crate::db::Database;
use crate::error::Result;
use crate::log;

type Watcher = Box<dyn FnMut(&Database)>;

/// Cancellation handle returned by `Store::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(u64);

pub struct Store {
    db: Database,
    path: PathBuf,
    watchers: Vec<(u64, Watcher)>,
    next_watcher: u64,
}

impl Store {
    /// Open the store backed by the given JSON file, loading it if present.
    pub fn open(path: PathBuf) -> Self {
        let db = Database::load(&path);
        Store {
            db,
            path,
            watchers: Vec::new(),
            next_watcher: 1,
        }
    }

    /// Read-only view of the current snapshot.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Register a change callback; it fires after every committed mutation.
    pub fn subscribe(&mut self, watcher: impl FnMut(&Database) + 'static) -> Subscription {
        let id = self.next_watcher;
        self.next_watcher += 1;
        self.watchers.push((id, Box::new(watcher)));
        Subscription(id)
    }

    /// Cancel a subscription. Unknown handles are a no-op.
    pub fn unsubscribe(&mut self, subscription: Subscription) {
        self.watchers.retain(|(id, _)| *id != subscription.0);
    }

    /// Apply a mutation, persist, and notify subscribers.
    ///
    /// If the closure fails the database may have been partially modified in
    /// memory but nothing is persisted and nobody is notified; the next load
    /// sees the last committed state.
    pub fn mutate<R>(&mut self, f: impl FnOnce(&mut Database) -> Result<R>) -> Result<R> {
        let result = f(&mut self.db)?;
        self.db.save(&self.path)?;
        log::debug(&format!("committed {}", self.path.display()));
        for (_, watcher) in self.watchers.iter_mut() {
            watcher(&self.db);
        }
        Ok(result)
    }

    /// Discard the in-memory snapshot and reload from disk. Used by the
    /// watch loop to pick up writes from other invocations.
    pub fn reload(&mut self) {
        self.db = Database::load(&self.path);
    }
}
