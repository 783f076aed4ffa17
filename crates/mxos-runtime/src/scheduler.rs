//! Round-robin rotation over registrations.
//!
//! Pure state: no I/O, no sleeping, no clock of its own. The kernel passes
//! `now` into [`Scheduler::tick`] and applies the returned [`Transition`].
//!
//! # Timing
//!
//! The switch timer resets to the exact boundary, not to the tick that
//! observed it. A sparse tick therefore lands on the same slot as a dense
//! sequence of ticks would:
//!
//! ```text
//! durations [15, 15, 15, 15]
//! t:  0        15        30        45        60
//!     │ slot 0 │ slot 1  │ slot 2  │ slot 3  │ slot 0 ...
//!     ▲tick       ▲tick(16)                       ▲tick(61)
//! ```
//!
//! # Changes
//!
//! Adding or removing a registration while something is active is queued
//! and applied at the next boundary. The active slot is never cut short.

use mxos_types::RegistrationId;
use std::time::{Duration, Instant};
use tracing::debug;

/// Shortest slot the scheduler accepts.
pub const MIN_SLOT: Duration = Duration::from_millis(1);

/// A switch decided by [`Scheduler::tick`] or [`Scheduler::force`].
///
/// `deactivate` and `activate` are both `None` when the active registration
/// is unchanged and only `retired` carries news. Retired ids are not
/// repeated in `deactivate`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    pub deactivate: Option<RegistrationId>,
    pub activate: Option<RegistrationId>,
    /// Registrations removed from the rotation at this boundary.
    pub retired: Vec<RegistrationId>,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    id: RegistrationId,
    duration: Duration,
}

#[derive(Debug, Clone, Copy)]
enum Change {
    Add(Slot),
    Remove(RegistrationId),
}

/// Rotation state.
#[derive(Debug, Default)]
pub struct Scheduler {
    slots: Vec<Slot>,
    active: Option<usize>,
    switched_at: Option<Instant>,
    pending: Vec<Change>,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a registration to the end of the rotation.
    ///
    /// Applied immediately while nothing is active, else at the next
    /// boundary. Returns `false` if the id is already scheduled.
    pub fn add(&mut self, id: RegistrationId, duration: Duration) -> bool {
        if self.contains(id) || self.pending_add(id) {
            return false;
        }
        let slot = Slot {
            id,
            duration: duration.max(MIN_SLOT),
        };
        if self.active.is_none() {
            self.slots.push(slot);
        } else {
            self.pending.push(Change::Add(slot));
        }
        true
    }

    /// Removes a registration from the rotation.
    ///
    /// Applied immediately while nothing is active, else at the next
    /// boundary. Returns `false` if the id is unknown.
    pub fn remove(&mut self, id: RegistrationId) -> bool {
        if self.pending_add(id) {
            self.pending
                .retain(|c| !matches!(c, Change::Add(slot) if slot.id == id));
            return true;
        }
        if !self.contains(id) {
            return false;
        }
        if self.active.is_none() {
            self.slots.retain(|s| s.id != id);
        } else if !self.pending_remove(id) {
            self.pending.push(Change::Remove(id));
        }
        true
    }

    /// Advances the rotation to `now`.
    ///
    /// Returns a transition when the active registration changes (or the
    /// first time something becomes active).
    pub fn tick(&mut self, now: Instant) -> Option<Transition> {
        let (Some(index), Some(anchor)) = (self.active, self.switched_at) else {
            return self.activate_first(now);
        };

        let current = self.slots[index];
        if now.saturating_duration_since(anchor) < current.duration {
            return None;
        }

        let anchor = anchor + current.duration;
        let retired = self.apply_pending();
        let Some(next) = self.index_after(current.id, index) else {
            self.active = None;
            self.switched_at = None;
            debug!(prev = %current.id, "rotation empty");
            return Some(Transition {
                deactivate: None,
                activate: None,
                retired,
            });
        };

        let (next_index, anchor) = self.skip_elapsed(next, anchor, now);
        self.active = Some(next_index);
        self.switched_at = Some(anchor);

        self.transition(current.id, retired)
    }

    /// Makes `id` active immediately and restarts its slot at `now`.
    ///
    /// Pending changes are applied first. Returns `None`, leaving the
    /// rotation and its pending changes untouched, if `id` would not be in
    /// the rotation afterwards.
    pub fn force(&mut self, id: RegistrationId, now: Instant) -> Option<Transition> {
        let survives = self.pending_add(id) || (self.contains(id) && !self.pending_remove(id));
        if !survives {
            return None;
        }
        let prev = self.active_id();
        let retired = self.apply_pending();
        let index = self.slots.iter().position(|s| s.id == id)?;
        self.active = Some(index);
        self.switched_at = Some(now);
        match prev {
            Some(prev) => self.transition(prev, retired),
            None => Some(Transition {
                deactivate: None,
                activate: Some(id),
                retired,
            }),
        }
    }

    /// The active registration, if any.
    #[must_use]
    pub fn active(&self) -> Option<RegistrationId> {
        self.active_id()
    }

    /// When the active slot began.
    #[must_use]
    pub fn switched_at(&self) -> Option<Instant> {
        self.switched_at
    }

    #[must_use]
    pub fn contains(&self, id: RegistrationId) -> bool {
        self.slots.iter().any(|s| s.id == id)
    }

    #[must_use]
    pub fn duration(&self, id: RegistrationId) -> Option<Duration> {
        self.slots.iter().find(|s| s.id == id).map(|s| s.duration)
    }

    /// Registrations in rotation order (pending changes excluded).
    pub fn ids(&self) -> impl Iterator<Item = RegistrationId> + '_ {
        self.slots.iter().map(|s| s.id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn pending_changes(&self) -> usize {
        self.pending.len()
    }

    fn active_id(&self) -> Option<RegistrationId> {
        self.active.map(|i| self.slots[i].id)
    }

    fn pending_add(&self, id: RegistrationId) -> bool {
        self.pending
            .iter()
            .any(|c| matches!(c, Change::Add(slot) if slot.id == id))
    }

    fn pending_remove(&self, id: RegistrationId) -> bool {
        self.pending
            .iter()
            .any(|c| matches!(c, Change::Remove(r) if *r == id))
    }

    fn activate_first(&mut self, now: Instant) -> Option<Transition> {
        let retired = self.apply_pending();
        let Some(first) = self.slots.first() else {
            return (!retired.is_empty()).then(|| Transition {
                retired,
                ..Transition::default()
            });
        };
        let id = first.id;
        self.active = Some(0);
        self.switched_at = Some(now);
        debug!(%id, "rotation started");
        Some(Transition {
            deactivate: None,
            activate: Some(id),
            retired,
        })
    }

    fn apply_pending(&mut self) -> Vec<RegistrationId> {
        let mut retired = Vec::new();
        for change in std::mem::take(&mut self.pending) {
            match change {
                Change::Add(slot) => self.slots.push(slot),
                Change::Remove(id) => {
                    self.slots.retain(|s| s.id != id);
                    retired.push(id);
                }
            }
        }
        retired
    }

    /// Index of the slot following `prev`, after pending changes.
    ///
    /// If `prev` itself was removed, the slot that moved into its old index
    /// comes next.
    fn index_after(&self, prev: RegistrationId, prev_index: usize) -> Option<usize> {
        let len = self.slots.len();
        if len == 0 {
            return None;
        }
        Some(match self.slots.iter().position(|s| s.id == prev) {
            Some(pos) => (pos + 1) % len,
            None => prev_index % len,
        })
    }

    /// Walks forward over every boundary already passed at `now`.
    fn skip_elapsed(&self, mut next: usize, mut anchor: Instant, now: Instant) -> (usize, Instant) {
        let mut rem = now.saturating_duration_since(anchor);

        let cycle: Duration = self.slots.iter().map(|s| s.duration).sum();
        if rem >= cycle {
            let cycles = rem.as_nanos() / cycle.as_nanos();
            let skip = cycle.as_nanos() * cycles;
            let skip = Duration::from_nanos(u64::try_from(skip).unwrap_or(u64::MAX));
            anchor += skip;
            rem = rem.saturating_sub(skip);
        }

        while rem >= self.slots[next].duration {
            let d = self.slots[next].duration;
            rem -= d;
            anchor += d;
            next = (next + 1) % self.slots.len();
        }
        (next, anchor)
    }

    fn transition(&self, prev: RegistrationId, retired: Vec<RegistrationId>) -> Option<Transition> {
        let next = self.active_id();
        if next == Some(prev) {
            return (!retired.is_empty()).then(|| Transition {
                retired,
                ..Transition::default()
            });
        }
        let deactivate = (!retired.contains(&prev)).then_some(prev);
        debug!(?deactivate, ?next, "rotation switched");
        Some(Transition {
            deactivate,
            activate: next,
            retired,
        })
    }
}
