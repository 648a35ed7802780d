//! Fetch tokens and per-slot response sequencing.
//!
//! Every outbound request gets a [`FetchToken`] from a shared
//! [`FetchSequencer`]. When the response arrives it is checked against the
//! last token accepted for its [`SlotKey`]; a response older than that is
//! discarded whole. There is no real cancellation: a superseded request
//! still completes, its result is just ignored.
//!
//! Ordering comes from an atomic counter, not from the wall clock, so two
//! tokens issued in the same instant still have a strict order. Each token
//! also carries a UUIDv7 and its issue time for logging.

use mapcache_core::{Clock, EntityId, EntityKind, SystemClock, Timestamp};
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Ordering identifier attached to one outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchToken {
    sequence: u64,
    id: Uuid,
    issued_at: Timestamp,
}

impl FetchToken {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn issued_at(&self) -> Timestamp {
        self.issued_at
    }
}

impl PartialOrd for FetchToken {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for FetchToken {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.sequence.cmp(&other.sequence)
    }
}

impl fmt::Display for FetchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.sequence, self.id)
    }
}

/// Logical resource whose fetch history is tracked independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey(String);

impl SlotKey {
    /// Slot for one entity, e.g. "this challenge id".
    pub fn entity(kind: EntityKind, id: &EntityId) -> Self {
        Self(format!("{}/{}", kind, id))
    }

    /// Slot for a non-entity resource, e.g. "the clusters currently shown".
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether `incoming` may overwrite a slot whose last accepted token is
/// `last`. Ties are accepted: a token is never rejected against itself.
pub fn accepts(last: Option<&FetchToken>, incoming: &FetchToken) -> bool {
    last.map_or(true, |last| incoming >= last)
}

/// Issues tokens and tracks the last accepted token per slot.
pub struct FetchSequencer {
    next: AtomicU64,
    slots: Mutex<HashMap<SlotKey, FetchToken>>,
    clock: Arc<dyn Clock>,
}

impl FetchSequencer {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            next: AtomicU64::new(1),
            slots: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Issue a token ordered after every token issued before it.
    pub fn issue_token(&self) -> FetchToken {
        FetchToken {
            sequence: self.next.fetch_add(1, Ordering::SeqCst),
            id: Uuid::now_v7(),
            issued_at: self.clock.now(),
        }
    }

    /// Check `token` against `slot` and, if accepted, advance the slot to it.
    pub fn accept(&self, slot: &SlotKey, token: &FetchToken) -> bool {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if accepts(slots.get(slot), token) {
            slots.insert(slot.clone(), *token);
            true
        } else {
            tracing::debug!(
                %slot,
                %token,
                last = ?slots.get(slot).map(FetchToken::sequence),
                "Discarding stale response"
            );
            false
        }
    }

    /// Whether `token` would be accepted for `slot`, without advancing it.
    /// Failed fetches are checked this way so they never move a slot on.
    pub fn admits(&self, slot: &SlotKey, token: &FetchToken) -> bool {
        let slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        accepts(slots.get(slot), token)
    }

    pub fn last_token(&self, slot: &SlotKey) -> Option<FetchToken> {
        let slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.get(slot).copied()
    }

    /// Drop a slot's history; the next response for it is accepted.
    pub fn forget(&self, slot: &SlotKey) {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.remove(slot);
    }
}

impl Default for FetchSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FetchSequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchSequencer")
            .field("next", &self.next.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
