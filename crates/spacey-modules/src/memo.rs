// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Run-once, broadcast-once memo for exported names.
//!
//! A module record is shared by every worker, but only an execution (or an
//! instantiation, for host modules) reveals which names it exports. The
//! first worker to get there computes the list; everyone else, including
//! callbacks registered before the list existed, sees that same list.

use parking_lot::Mutex;
use std::sync::Arc;

/// Receives the exported names of a module once they are known.
pub type ExportNamesCallback = Box<dyn FnOnce(&[String]) + Send>;

enum MemoState {
    Unknown,
    Computing,
    Known(Arc<[String]>),
}

struct Inner {
    state: MemoState,
    waiters: Vec<ExportNamesCallback>,
}

/// `Unknown -> Computing -> Known(names)` state machine.
pub struct ExportNamesMemo {
    inner: Mutex<Inner>,
}

impl ExportNamesMemo {
    /// Create an empty memo
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: MemoState::Unknown,
                waiters: Vec::new(),
            }),
        }
    }

    /// The names, if already computed.
    pub fn get(&self) -> Option<Arc<[String]>> {
        match &self.inner.lock().state {
            MemoState::Known(names) => Some(Arc::clone(names)),
            _ => None,
        }
    }

    /// Invokes `callback` right away when the names are known and returns
    /// true. Otherwise queues it for delivery and returns false.
    pub fn get_or_register(&self, callback: ExportNamesCallback) -> bool {
        let names = {
            let mut inner = self.inner.lock();
            match &inner.state {
                MemoState::Known(names) => Arc::clone(names),
                MemoState::Unknown | MemoState::Computing => {
                    inner.waiters.push(callback);
                    return false;
                }
            }
        };
        // Outside the lock so the callback may query the memo again
        callback(&names);
        true
    }

    /// Populates the memo with `compute` unless another caller already did
    /// or is doing so. Returns true when this call won.
    ///
    /// Waiters are drained in the same critical section that publishes the
    /// names, so each of them is called exactly once.
    pub fn populate_with<F>(&self, compute: F) -> bool
    where
        F: FnOnce() -> Vec<String>,
    {
        {
            let mut inner = self.inner.lock();
            match inner.state {
                MemoState::Unknown => inner.state = MemoState::Computing,
                MemoState::Computing | MemoState::Known(_) => return false,
            }
        }

        let names: Arc<[String]> = compute().into();
        let waiters = {
            let mut inner = self.inner.lock();
            inner.state = MemoState::Known(Arc::clone(&names));
            std::mem::take(&mut inner.waiters)
        };
        for waiter in waiters {
            waiter(&names);
        }
        true
    }
}

#[cfg(test)]
impl ExportNamesMemo {
    pub(crate) fn waiting(&self) -> usize {
        self.inner.lock().waiters.len()
    }
}

impl Default for ExportNamesMemo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_waiters_receive_names_once() {
        let memo = ExportNamesMemo::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let (c, s) = (Arc::clone(&calls), Arc::clone(&seen));
        assert!(!memo.get_or_register(Box::new(move |names: &[String]| {
            c.fetch_add(1, Ordering::SeqCst);
            s.lock().extend_from_slice(names);
        })));

        assert!(memo.populate_with(|| vec!["a".to_string(), "b".to_string()]));
        assert!(!memo.populate_with(|| vec!["other".to_string()]));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock(), vec!["a", "b"]);
        assert_eq!(memo.get().unwrap().to_vec(), vec!["a", "b"]);
    }

    #[test]
    fn test_known_names_delivered_synchronously() {
        let memo = ExportNamesMemo::new();
        memo.populate_with(Vec::new);
        let delivered = Arc::new(AtomicUsize::new(0));
        let d = Arc::clone(&delivered);
        assert!(memo.get_or_register(Box::new(move |names: &[String]| {
            assert!(names.is_empty());
            d.fetch_add(1, Ordering::SeqCst);
        })));
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_population_has_single_winner() {
        let memo = Arc::new(ExportNamesMemo::new());
        let winners = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let memo = Arc::clone(&memo);
                    scope.spawn(move || memo.populate_with(|| vec![format!("from-{i}")]))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count()
        });
        assert_eq!(winners, 1);
        assert_eq!(memo.get().unwrap().len(), 1);
    }
}
