//!  Waypoint Flight Search
//!
//!  Copyright (C) 2026  Mamy Ratsimbazafy
//!
//!  This program is free software: you can redistribute it and/or modify
//!  it under the terms of the GNU Affero General Public License as published by
//!  the Free Software Foundation, either version 3 of the License, or
//!  (at your option) any later version.
//!
//!  This program is distributed in the hope that it will be useful,
//!  but WITHOUT ANY WARRANTY; without even the implied warranty of
//!  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//!  GNU Affero General Public License for more details.
//!
//!  You should have received a copy of the GNU Affero General Public License
//!  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! # Debounced values
//!
//! [`DebouncedValue`] is the side-effect free core: every raw update bumps a
//! generation counter, and a stabilization only lands if nothing newer
//! arrived in between. [`Debouncer`] drives it with tokio timers and
//! publishes committed values on a `watch` channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Quiescence used for airport search input.
pub const AIRPORT_INPUT_QUIESCENCE: Duration = Duration::from_secs(2);

/// Identifies one raw update. Only the latest ticket can commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

#[derive(Debug, Clone)]
pub struct DebouncedValue<T> {
    committed: T,
    pending: Option<T>,
    generation: u64,
    quiescence: Duration,
}

impl<T: Clone + PartialEq> DebouncedValue<T> {
    pub fn new(initial: T, quiescence: Duration) -> Self {
        Self {
            committed: initial,
            pending: None,
            generation: 0,
            quiescence,
        }
    }

    pub fn committed(&self) -> &T {
        &self.committed
    }

    pub fn quiescence(&self) -> Duration {
        self.quiescence
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Record a raw value, superseding any pending one.
    pub fn push(&mut self, raw: T) -> Ticket {
        self.generation += 1;
        self.pending = Some(raw);
        Ticket(self.generation)
    }

    /// Commit the pending value if `ticket` is still the latest.
    ///
    /// Returns the new committed value only when it differs from the
    /// previous one.
    pub fn settle(&mut self, ticket: Ticket) -> Option<&T> {
        if ticket.0 != self.generation {
            return None;
        }
        let pending = self.pending.take()?;
        if pending == self.committed {
            return None;
        }
        self.committed = pending;
        Some(&self.committed)
    }
}

struct Inner<T> {
    value: DebouncedValue<T>,
    timer: Option<JoinHandle<()>>,
}

/// Timer-driven debouncer. Must be used from within a tokio runtime.
pub struct Debouncer<T> {
    inner: Arc<Mutex<Inner<T>>>,
    tx: Arc<watch::Sender<T>>,
    emitted: Arc<AtomicU64>,
}

impl<T> Clone for Debouncer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            tx: Arc::clone(&self.tx),
            emitted: Arc::clone(&self.emitted),
        }
    }
}

impl<T> Debouncer<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(initial: T, quiescence: Duration) -> Self {
        let (tx, _rx) = watch::channel(initial.clone());
        Self {
            inner: Arc::new(Mutex::new(Inner {
                value: DebouncedValue::new(initial, quiescence),
                timer: None,
            })),
            tx: Arc::new(tx),
            emitted: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Last stabilized value.
    pub fn current(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Number of stabilized updates published so far.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::SeqCst)
    }

    /// Feed a raw value. The previous timer, if still running, is aborted.
    pub fn push(&self, raw: T) -> Ticket {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let ticket = inner.value.push(raw);
        let quiescence = inner.value.quiescence();

        if let Some(previous) = inner.timer.take() {
            previous.abort();
        }

        let state = Arc::clone(&self.inner);
        let tx = Arc::clone(&self.tx);
        let emitted = Arc::clone(&self.emitted);
        inner.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(quiescence).await;
            let mut inner = state.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(value) = inner.value.settle(ticket) {
                emitted.fetch_add(1, Ordering::SeqCst);
                tx.send_replace(value.clone());
            }
            if inner.value.generation() == ticket.0 {
                inner.timer = None;
            }
        }));

        ticket
    }
}
