//! The synchronous store core.
//!
//! [`Keyspace`] holds the shared data and executes commands without ever
//! suspending. It is what the script command bridge talks to: a script runs
//! while the store's execution gate is already held, so everything reachable
//! from here only takes the short-lived data lock and never the gate.
//!
//! ```text
//! Store (async, takes the gate)
//!   └── Keyspace::dispatch (sync, takes the data lock)
//!         └── commands::* handlers over Db
//! ```

mod commands;

use crate::{Result, Value};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

/// Synchronous command execution against shared store state.
///
/// Implementations must not block on anything the caller of a script might
/// be holding, since dispatch happens from inside a running script.
pub trait CommandDispatcher: Send + Sync {
    /// Executes `name` (case-insensitive) with `args` and returns its reply.
    fn dispatch(&self, name: &str, args: &[String]) -> Result<Value>;
}

/// The data held under one key.
#[derive(Debug, Clone)]
pub(crate) enum Data {
    Str(Bytes),
    Set(BTreeSet<String>),
    ZSet(HashMap<String, f64>),
}

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) data: Data,
    pub(crate) expires_at: Option<Instant>,
}

impl Entry {
    pub(crate) fn new(data: Data) -> Self {
        Self {
            data,
            expires_at: None,
        }
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// Remaining time to live, or None for persistent keys.
    pub(crate) fn ttl(&self, now: Instant) -> Option<Duration> {
        self.expires_at.map(|at| at.saturating_duration_since(now))
    }
}

/// Connection metadata tracked by `CLIENT`.
#[derive(Debug, Default)]
pub(crate) struct ClientProps {
    pub(crate) name: Option<String>,
}

/// All mutable store state, guarded by the keyspace lock.
#[derive(Debug, Default)]
pub(crate) struct Db {
    pub(crate) entries: HashMap<String, Entry>,
    pub(crate) client: ClientProps,
}

impl Db {
    /// Returns the live entry for `key`, dropping it first if it has expired.
    pub(crate) fn entry(&mut self, key: &str) -> Option<&mut Entry> {
        let now = Instant::now();
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            log::debug!("expiring key {}", key);
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    pub(crate) fn contains(&mut self, key: &str) -> bool {
        self.entry(key).is_some()
    }

    pub(crate) fn remove(&mut self, key: &str) -> bool {
        let live = self.contains(key);
        self.entries.remove(key);
        live
    }

    pub(crate) fn live_len(&self) -> usize {
        let now = Instant::now();
        self.entries.values().filter(|e| !e.is_expired(now)).count()
    }
}

/// The in-memory keyspace and its synchronous command dispatcher.
///
/// # Thread Safety
///
/// `Keyspace` is `Send + Sync`; each dispatch holds the internal data lock
/// for the duration of one command only.
#[derive(Debug, Default)]
pub struct Keyspace {
    db: Mutex<Db>,
}

impl Keyspace {
    /// Creates an empty keyspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live keys.
    pub fn len(&self) -> usize {
        self.db.lock().live_len()
    }

    /// Returns true if no live keys exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CommandDispatcher for Keyspace {
    fn dispatch(&self, name: &str, args: &[String]) -> Result<Value> {
        let command = name.to_ascii_uppercase();
        let (handler, arity) = commands::lookup(&command)
            .ok_or_else(|| crate::Error::command(format!("ERR unknown command '{}'", name)))?;
        if !arity.accepts(args.len()) {
            return Err(crate::Error::wrong_arity(name));
        }

        log::trace!("dispatch {} {:?}", command, args);
        let mut db = self.db.lock();
        handler(&mut db, args)
    }
}
