// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Timberledger Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Concurrency and reconciliation plumbing.
//!
//! Two pieces live here:
//!
//! - [`DedupCache`] + [`PropagationQueue`]: coalesce repeated shipment
//!   re-sum requests within a short window. Correctness comes from the
//!   re-sum being idempotent; the cache only stops wasted work when many lot
//!   mutations land in quick succession.
//! - [`RetryPolicy`] + [`with_conflict_retry`]: re-run a mutating operation
//!   from scratch when it lost an optimistic-concurrency race, with
//!   exponential backoff. The operation must re-read current state on every
//!   attempt; replaying a delta against a fresh read cannot double-apply.

use crate::base::ShipmentId;
use crate::error::LedgerError;
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::{Duration, Instant};

/// What kind of entity a dedup key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Shipment,
    Lot,
    Client,
}

/// TTL map that admits a recomputation key at most once per window.
///
/// Explicit and injectable so tests can shrink the window to zero or call
/// [`DedupCache::reset`] between runs.
#[derive(Debug)]
pub struct DedupCache {
    window: Duration,
    seen: DashMap<(EntityKind, u64), Instant>,
}

impl DedupCache {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: DashMap::new(),
        }
    }

    /// Returns `true` when the key should run now, recording the admission.
    /// Returns `false` when the same key was admitted within the window.
    pub fn should_run(&self, kind: EntityKind, id: u64) -> bool {
        if self.window.is_zero() {
            return true;
        }
        let now = Instant::now();
        // Entry API keeps check-and-stamp atomic under concurrent requests
        match self.seen.entry((kind, id)) {
            Entry::Occupied(mut occupied) => {
                if now.duration_since(*occupied.get()) >= self.window {
                    occupied.insert(now);
                    true
                } else {
                    tracing::debug!(?kind, id, "recomputation coalesced");
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                true
            }
        }
    }

    /// Drops entries whose window has fully elapsed.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.seen
            .retain(|_, last| now.duration_since(*last) < self.window);
    }

    /// Clears all admissions.
    pub fn reset(&self) {
        self.seen.clear();
    }
}

/// Pending shipment re-sum requests, deduplicated on entry.
///
/// Producers push after a lot mutation; the engine drains the queue and
/// re-sums each shipment once. The queue never blocks a producer.
#[derive(Debug)]
pub struct PropagationQueue {
    pending: SegQueue<ShipmentId>,
    dedup: DedupCache,
}

impl PropagationQueue {
    pub fn new(window: Duration) -> Self {
        Self {
            pending: SegQueue::new(),
            dedup: DedupCache::new(window),
        }
    }

    /// Requests a re-sum for `shipment_id`; coalesced within the window.
    pub fn request(&self, shipment_id: ShipmentId) {
        if self
            .dedup
            .should_run(EntityKind::Shipment, u64::from(shipment_id.0))
        {
            self.pending.push(shipment_id);
        }
    }

    /// Drains everything currently queued.
    pub fn drain(&self) -> Vec<ShipmentId> {
        let mut drained = Vec::new();
        while let Some(id) = self.pending.pop() {
            drained.push(id);
        }
        drained
    }

    pub fn reset(&self) {
        self.dedup.reset();
        while self.pending.pop().is_some() {}
    }
}

/// Bounded retry with exponential backoff for write conflicts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(5),
        }
    }
}

impl RetryPolicy {
    /// Policy with no sleeping between attempts, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        // 5ms, 10ms, 20ms, ... capped by attempt count, not by time
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Runs `op`, re-invoking it from scratch on [`LedgerError::WriteConflict`].
///
/// Any other outcome, success or failure, passes straight through. When all
/// attempts conflict the caller gets [`LedgerError::ConcurrencyExhausted`]
/// and must resubmit.
pub fn with_conflict_retry<T>(
    policy: &RetryPolicy,
    mut op: impl FnMut() -> Result<T, LedgerError>,
) -> Result<T, LedgerError> {
    for attempt in 0..policy.max_attempts {
        match op() {
            Err(LedgerError::WriteConflict) => {
                let delay = policy.backoff(attempt);
                tracing::debug!(attempt, ?delay, "write conflict, retrying");
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }
            other => return other,
        }
    }
    tracing::warn!(
        attempts = policy.max_attempts,
        "write conflict retries exhausted"
    );
    Err(LedgerError::ConcurrencyExhausted)
}
