// ABOUTME: Lock-guarded map of live sessions plus in-flight id reservations.
// ABOUTME: The only authority on which sessions exist.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::record::SessionRecord;
use crate::types::SessionId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Session limit reached ({max}). Close a session before opening a new one.")]
pub struct CapacityError {
    pub max: usize,
}

#[derive(Debug, Default)]
struct Inner {
    live: HashMap<SessionId, SessionRecord>,
    reserved: HashSet<SessionId>,
}

impl Inner {
    fn is_taken(&self, id: &SessionId) -> bool {
        self.live.contains_key(id) || self.reserved.contains(id)
    }
}

/// Concurrency-safe session registry. The lock is never held across an await.
#[derive(Debug, Default)]
pub struct SessionTable {
    inner: Arc<Mutex<Inner>>,
}

/// A claimed slot and id for a session that is still opening.
/// Dropping it without committing frees both.
#[derive(Debug)]
pub struct Reservation {
    id: SessionId,
    inner: Arc<Mutex<Inner>>,
    committed: bool,
}

impl Reservation {
    pub fn id(&self) -> &SessionId {
        &self.id
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.committed {
            self.inner.lock().reserved.remove(&self.id);
        }
    }
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a slot and a fresh id. Live sessions and pending opens both count
    /// against `max_sessions`.
    pub fn reserve(&self, max_sessions: usize) -> Result<Reservation, CapacityError> {
        let mut inner = self.inner.lock();
        if inner.live.len() + inner.reserved.len() >= max_sessions {
            return Err(CapacityError { max: max_sessions });
        }
        let id = loop {
            let candidate = SessionId::generate();
            if !inner.is_taken(&candidate) {
                break candidate;
            }
        };
        inner.reserved.insert(id.clone());
        Ok(Reservation {
            id,
            inner: Arc::clone(&self.inner),
            committed: false,
        })
    }

    /// Turn a reservation into a live session.
    pub fn commit(&self, mut reservation: Reservation, mut record: SessionRecord) {
        reservation.committed = true;
        record.id = reservation.id.clone();
        let mut inner = self.inner.lock();
        inner.reserved.remove(&reservation.id);
        inner.live.insert(reservation.id.clone(), record);
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionRecord> {
        self.inner.lock().live.get(id).cloned()
    }

    pub fn remove(&self, id: &SessionId) -> Option<SessionRecord> {
        self.inner.lock().live.remove(id)
    }

    /// Record use of a session. Timestamps only move forward.
    pub fn touch(&self, id: &SessionId, now: Instant) -> bool {
        match self.inner.lock().live.get_mut(id) {
            Some(record) => {
                record.last_used_at = record.last_used_at.max(now);
                true
            }
            None => false,
        }
    }

    pub fn list(&self) -> Vec<SessionRecord> {
        self.inner.lock().live.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return every session idle for at least `idle_timeout`.
    /// A session with a command in flight is busy, not idle, and is skipped.
    pub fn sweep(&self, idle_timeout: Duration, now: Instant) -> Vec<SessionRecord> {
        let mut inner = self.inner.lock();
        let expired: Vec<SessionId> = inner
            .live
            .values()
            .filter(|record| record.idle_for(now) >= idle_timeout && !record.is_busy())
            .map(|record| record.id.clone())
            .collect();
        expired
            .iter()
            .filter_map(|id| inner.live.remove(id))
            .collect()
    }

    /// Remove every live session.
    pub fn drain(&self) -> Vec<SessionRecord> {
        self.inner.lock().live.drain().map(|(_, record)| record).collect()
    }
}
