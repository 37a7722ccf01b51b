//! Virtual sequential identity over opaque record handles.
//!
//! The record store only knows opaque string handles. Clients address entities by
//! small integers instead, so this module keeps, per entity kind, a bidirectional
//! map between virtual IDs and handles plus a counter for the next unused ID.
//!
//! ```text
//!   virtual ID ──forward──▶ RecordHandle
//!   virtual ID ◀──reverse── RecordHandle
//!   next: one past the largest ID ever seen or issued
//! ```
//!
//! The map is rebuilt at startup from a scan of every table (see
//! [`Repository::load_identities`](crate::Repository::load_identities)). Until that
//! scan finishes for a kind, lookups may miss and new IDs may collide with records
//! that were not loaded yet.
//!
//! Each kind is guarded by its own mutex. Every method takes that lock exactly once.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::record::RecordHandle;
use crate::schema::EntityKind;

#[derive(Debug)]
struct KindState {
    forward: HashMap<u64, RecordHandle>,
    reverse: HashMap<RecordHandle, u64>,
    next: u64,
    loaded: bool,
}

impl Default for KindState {
    fn default() -> Self {
        Self {
            forward: HashMap::new(),
            reverse: HashMap::new(),
            next: 1,
            loaded: false,
        }
    }
}

impl KindState {
    fn bind(&mut self, id: u64, handle: RecordHandle) {
        if let Some(previous) = self.forward.remove(&id) {
            self.reverse.remove(&previous);
        }
        if let Some(other) = self.reverse.remove(&handle) {
            self.forward.remove(&other);
        }
        self.reverse.insert(handle.clone(), id);
        self.forward.insert(id, handle);
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Per-kind bidirectional mapping between virtual IDs and record handles.
#[derive(Debug, Default)]
pub struct IdentityMap {
    kinds: [Mutex<KindState>; 5],
}

impl IdentityMap {
    /// Create an empty map. Every counter starts at 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self, kind: EntityKind) -> &Mutex<KindState> {
        &self.kinds[kind.index()]
    }

    /// Look up the handle bound to `id`.
    #[must_use]
    pub fn resolve(&self, kind: EntityKind, id: u64) -> Option<RecordHandle> {
        self.state(kind).lock().forward.get(&id).cloned()
    }

    /// Look up the virtual ID bound to `handle`.
    #[must_use]
    pub fn reverse_lookup(&self, kind: EntityKind, handle: &RecordHandle) -> Option<u64> {
        self.state(kind).lock().reverse.get(handle).copied()
    }

    /// Bind `id` to `handle`, replacing any earlier binding of either side.
    ///
    /// Idempotent. Does not move the counter.
    pub fn bind(&self, kind: EntityKind, id: u64, handle: RecordHandle) {
        self.state(kind).lock().bind(id, handle);
    }

    /// Bind `id` to `handle` and make sure `id` is never issued by [`next_id`].
    ///
    /// [`next_id`]: Self::next_id
    pub fn observe(&self, kind: EntityKind, id: u64, handle: RecordHandle) {
        let mut state = self.state(kind).lock();
        state.bind(id, handle);
        state.next = state.next.max(id.saturating_add(1));
    }

    /// Remove the binding for `id`, returning the handle it pointed to.
    ///
    /// The ID is retired: the counter is not moved back.
    pub fn unbind(&self, kind: EntityKind, id: u64) -> Option<RecordHandle> {
        let mut state = self.state(kind).lock();
        let handle = state.forward.remove(&id)?;
        state.reverse.remove(&handle);
        Some(handle)
    }

    /// Issue the next unused ID and advance the counter.
    pub fn next_id(&self, kind: EntityKind) -> u64 {
        self.state(kind).lock().allocate()
    }

    /// Return the ID bound to `handle`, issuing and binding a fresh one if unbound.
    ///
    /// Used for records whose ID cannot be recovered from their fields.
    pub fn adopt(&self, kind: EntityKind, handle: &RecordHandle) -> u64 {
        let mut state = self.state(kind).lock();
        if let Some(id) = state.reverse.get(handle) {
            return *id;
        }
        let id = state.allocate();
        state.bind(id, handle.clone());
        id
    }

    /// Record that the startup scan for `kind` completed.
    pub fn mark_loaded(&self, kind: EntityKind) {
        self.state(kind).lock().loaded = true;
    }

    /// Whether the startup scan for `kind` completed.
    #[must_use]
    pub fn is_loaded(&self, kind: EntityKind) -> bool {
        self.state(kind).lock().loaded
    }

    /// Number of bound IDs for `kind`.
    #[must_use]
    pub fn len(&self, kind: EntityKind) -> usize {
        self.state(kind).lock().forward.len()
    }

    /// Whether no IDs are bound for `kind`.
    #[must_use]
    pub fn is_empty(&self, kind: EntityKind) -> bool {
        self.len(kind) == 0
    }
}
