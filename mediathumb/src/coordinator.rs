//! Single-flight request coordination.
//!
//! When several callers ask for the same derivative at once, only one of
//! them runs the generation. The others block until it finishes and then
//! observe its result.
//!
//! # Architecture
//!
//! ```text
//! caller A ─┐                             ┌──► Claimed ──► generate ──► complete(ok)
//!           │                             │                                 │
//! caller B ─┼──► RequestCoordinator::claim┤                                 │
//!           │                             │                                 ▼
//! caller C ─┘                             └──► wait on handle ◄──── notify_all
//!                                              (WaitSuccess / WaitFailed)
//! ```
//!
//! Each in-flight key owns a `WaitHandle` (mutex + condvar + flags) that is
//! shared by `Arc` with every waiter. `complete` removes the handle from the
//! map before waking waiters, so the next `claim` for the key starts a fresh
//! generation.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct HandleState {
    done: bool,
    success: bool,
}

#[derive(Debug, Default)]
struct WaitHandle {
    state: Mutex<HandleState>,
    cond: Condvar,
}

impl WaitHandle {
    fn finish(&self, success: bool) {
        let mut state = self.state.lock();
        state.done = true;
        state.success = success;
        self.cond.notify_all();
    }

    fn wait(&self) -> bool {
        let mut state = self.state.lock();
        while !state.done {
            self.cond.wait(&mut state);
        }
        state.success
    }

    fn wait_timeout(&self, timeout: Duration) -> Option<bool> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.done {
            if self.cond.wait_until(&mut state, deadline).timed_out() {
                return state.done.then_some(state.success);
            }
        }
        Some(state.success)
    }
}

/// Statistics for monitoring coalescing effectiveness.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Total claims received
    pub total_claims: u64,
    /// Claims that waited on an existing generation
    pub coalesced_claims: u64,
    /// Claims that started a new generation
    pub new_claims: u64,
}

impl CoordinatorStats {
    /// Returns the coalescing ratio (0.0 to 1.0)
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_claims == 0 {
            0.0
        } else {
            self.coalesced_claims as f64 / self.total_claims as f64
        }
    }
}

/// Result of [`RequestCoordinator::claim`].
#[must_use]
pub enum ClaimOutcome<'a, K>
where
    K: Eq + Hash + Clone + Debug,
{
    /// This caller owns the generation and must complete the guard.
    Claimed(ClaimGuard<'a, K>),
    /// Another caller finished the generation successfully.
    WaitSuccess,
    /// Another caller's generation failed.
    WaitFailed,
}

impl<K> Debug for ClaimOutcome<'_, K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClaimOutcome::Claimed(guard) => f.debug_tuple("Claimed").field(&guard.key).finish(),
            ClaimOutcome::WaitSuccess => f.write_str("WaitSuccess"),
            ClaimOutcome::WaitFailed => f.write_str("WaitFailed"),
        }
    }
}

/// Result of [`RequestCoordinator::try_wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// A generation was in flight and finished with this result
    Completed(bool),
    /// Nothing was in flight for the key
    NotInFlight,
    /// Still running when the timeout expired
    TimedOut,
}

/// Ownership of an in-flight generation.
///
/// Dropping the guard without calling [`ClaimGuard::complete`] completes
/// the key with failure, so waiters are never stranded.
pub struct ClaimGuard<'a, K>
where
    K: Eq + Hash + Clone + Debug,
{
    coordinator: &'a RequestCoordinator<K>,
    key: Option<K>,
}

impl<K> ClaimGuard<'_, K>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn key(&self) -> Option<&K> {
        self.key.as_ref()
    }

    /// Publish the result to every waiter.
    pub fn complete(mut self, success: bool) {
        if let Some(key) = self.key.take() {
            self.coordinator.complete(&key, success);
        }
    }
}

impl<K> Drop for ClaimGuard<'_, K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            debug!(key = ?key, "Claim dropped without completion");
            self.coordinator.complete(&key, false);
        }
    }
}

/// Deduplicates concurrent work per key.
pub struct RequestCoordinator<K>
where
    K: Eq + Hash + Clone + Debug,
{
    in_flight: RwLock<HashMap<K, Arc<WaitHandle>>>,
    total_claims: AtomicU64,
    coalesced_claims: AtomicU64,
    new_claims: AtomicU64,
}

impl<K> RequestCoordinator<K>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new() -> Self {
        Self {
            in_flight: RwLock::new(HashMap::new()),
            total_claims: AtomicU64::new(0),
            coalesced_claims: AtomicU64::new(0),
            new_claims: AtomicU64::new(0),
        }
    }

    /// Claim `key`, or block until the current claimant completes it.
    ///
    /// This never times out.
    pub fn claim(&self, key: K) -> ClaimOutcome<'_, K> {
        self.total_claims.fetch_add(1, Ordering::Relaxed);

        let existing = {
            let mut in_flight = self.in_flight.write();
            match in_flight.get(&key) {
                Some(handle) => Some(Arc::clone(handle)),
                None => {
                    in_flight.insert(key.clone(), Arc::new(WaitHandle::default()));
                    None
                }
            }
        };

        match existing {
            None => {
                self.new_claims.fetch_add(1, Ordering::Relaxed);
                debug!(key = ?key, "New claim - starting generation");
                ClaimOutcome::Claimed(ClaimGuard {
                    coordinator: self,
                    key: Some(key),
                })
            }
            Some(handle) => {
                self.coalesced_claims.fetch_add(1, Ordering::Relaxed);
                debug!(key = ?key, "Coalescing claim - waiting for in-flight generation");
                if handle.wait() {
                    ClaimOutcome::WaitSuccess
                } else {
                    ClaimOutcome::WaitFailed
                }
            }
        }
    }

    /// Claim `key` only if nothing holds it. Never blocks and never counts
    /// toward coalescing stats.
    pub fn try_claim(&self, key: K) -> Option<ClaimGuard<'_, K>> {
        {
            let mut in_flight = self.in_flight.write();
            if in_flight.contains_key(&key) {
                return None;
            }
            in_flight.insert(key.clone(), Arc::new(WaitHandle::default()));
        }
        Some(ClaimGuard {
            coordinator: self,
            key: Some(key),
        })
    }

    /// Wait at most `timeout` for an in-flight generation of `key`.
    pub fn try_wait(&self, key: &K, timeout: Duration) -> WaitResult {
        let handle = match self.in_flight.read().get(key) {
            Some(handle) => Arc::clone(handle),
            None => return WaitResult::NotInFlight,
        };
        match handle.wait_timeout(timeout) {
            Some(success) => WaitResult::Completed(success),
            None => WaitResult::TimedOut,
        }
    }

    /// Finish `key`: wake every waiter and forget the handle.
    pub fn complete(&self, key: &K, success: bool) {
        let handle = self.in_flight.write().remove(key);
        if let Some(handle) = handle {
            handle.finish(success);
            let waiters = Arc::strong_count(&handle) - 1;
            if waiters > 0 {
                debug!(key = ?key, waiters, success, "Woke coalesced waiters");
            }
        }
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.in_flight.read().contains_key(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.read().len()
    }

    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            total_claims: self.total_claims.load(Ordering::Relaxed),
            coalesced_claims: self.coalesced_claims.load(Ordering::Relaxed),
            new_claims: self.new_claims.load(Ordering::Relaxed),
        }
    }

    /// Logs current statistics.
    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            total_claims = stats.total_claims,
            coalesced = stats.coalesced_claims,
            new_claims = stats.new_claims,
            in_flight = self.in_flight_count(),
            coalescing_ratio = format!("{:.1}%", stats.coalescing_ratio() * 100.0),
            "Request coordination statistics"
        );
    }
}

impl<K> Default for RequestCoordinator<K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_first_claim_owns_key() {
        let coordinator = RequestCoordinator::<u32>::new();
        match coordinator.claim(1) {
            ClaimOutcome::Claimed(guard) => {
                assert!(coordinator.is_in_flight(&1));
                guard.complete(true);
            }
            other => panic!("expected claim, got {:?}", other),
        }
        assert!(!coordinator.is_in_flight(&1));
        assert_eq!(coordinator.in_flight_count(), 0);
    }

    #[test]
    fn test_concurrent_claims_run_once() {
        let coordinator = Arc::new(RequestCoordinator::<&'static str>::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                let runs = Arc::clone(&runs);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    match coordinator.claim("lcd") {
                        ClaimOutcome::Claimed(guard) => {
                            runs.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(50));
                            guard.complete(true);
                            true
                        }
                        ClaimOutcome::WaitSuccess => true,
                        ClaimOutcome::WaitFailed => false,
                    }
                })
            })
            .collect();

        let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.iter().all(|r| *r));
        // Late arrivals may start a second run after the first completed,
        // but never while one is in flight.
        assert!(runs.load(Ordering::SeqCst) >= 1);
        let stats = coordinator.stats();
        assert_eq!(stats.total_claims, 8);
        assert_eq!(stats.new_claims as usize, runs.load(Ordering::SeqCst));
    }

    #[test]
    fn test_waiters_observe_failure() {
        let coordinator = Arc::new(RequestCoordinator::<u32>::new());
        let guard = match coordinator.claim(5) {
            ClaimOutcome::Claimed(guard) => guard,
            other => panic!("expected claim, got {:?}", other),
        };

        let waiter = {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || matches!(coordinator.claim(5), ClaimOutcome::WaitFailed))
        };
        // Give the waiter time to block on the handle
        while coordinator.stats().coalesced_claims == 0 {
            thread::yield_now();
        }
        guard.complete(false);
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_dropped_guard_completes_with_failure() {
        let coordinator = RequestCoordinator::<u32>::new();
        {
            let _outcome = coordinator.claim(3);
        }
        assert!(!coordinator.is_in_flight(&3));
        assert_eq!(coordinator.try_wait(&3, Duration::from_millis(1)), WaitResult::NotInFlight);
    }

    #[test]
    fn test_try_wait_times_out_then_completes() {
        let coordinator = Arc::new(RequestCoordinator::<u32>::new());
        let guard = match coordinator.claim(9) {
            ClaimOutcome::Claimed(guard) => guard,
            other => panic!("expected claim, got {:?}", other),
        };
        assert_eq!(
            coordinator.try_wait(&9, Duration::from_millis(10)),
            WaitResult::TimedOut
        );

        let waiter = {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || coordinator.try_wait(&9, Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(50));
        guard.complete(true);
        assert_eq!(waiter.join().unwrap(), WaitResult::Completed(true));
    }

    #[test]
    fn test_try_claim_refused_while_held() {
        let coordinator = Arc::new(RequestCoordinator::<u32>::new());
        let held = coordinator.try_claim(4).unwrap();
        assert!(coordinator.try_claim(4).is_none());
        assert!(coordinator.try_claim(8).is_some());

        // A blocking claimant waits on the non-blocking holder
        let waiter = {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || matches!(coordinator.claim(4), ClaimOutcome::WaitFailed))
        };
        while coordinator.stats().coalesced_claims == 0 {
            thread::yield_now();
        }
        held.complete(false);
        assert!(waiter.join().unwrap());

        assert!(coordinator.try_claim(4).is_some());
        assert!(!coordinator.is_in_flight(&4));
    }

    #[test]
    fn test_coalescing_ratio() {
        let stats = CoordinatorStats {
            total_claims: 4,
            coalesced_claims: 3,
            new_claims: 1,
        };
        assert!((stats.coalescing_ratio() - 0.75).abs() < f64::EPSILON);
        assert_eq!(CoordinatorStats::default().coalescing_ratio(), 0.0);
    }
}
