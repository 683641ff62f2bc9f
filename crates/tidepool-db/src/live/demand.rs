//! Demand counter for the `request(n)` flow-control model.

use std::sync::atomic::{AtomicU64, Ordering};

/// Demand value that is never decremented.
pub const UNLIMITED: u64 = u64::MAX;

/// Outstanding demand of one subscription.
///
/// The consumer adds credit with [`request`](Self::request); the delivery
/// task spends one unit per emission with [`try_consume`](Self::try_consume).
/// Additions saturate, and a saturated counter means unlimited demand.
#[derive(Debug, Default)]
pub struct Demand {
    pending: AtomicU64,
}

impl Demand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `n` units and return the new total. `n == 0` changes nothing.
    pub fn request(&self, n: u64) -> u64 {
        if n == 0 {
            return self.pending();
        }
        let previous = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(n))
            })
            .unwrap_or_else(|current| current);
        previous.saturating_add(n)
    }

    pub fn request_unlimited(&self) {
        self.pending.store(UNLIMITED, Ordering::Release);
    }

    /// Spend one unit. Returns `false` when no demand is outstanding.
    pub fn try_consume(&self) -> bool {
        loop {
            let current = self.pending.load(Ordering::Acquire);
            if current == 0 {
                return false;
            }
            if current == UNLIMITED {
                return true;
            }
            if self
                .pending
                .compare_exchange_weak(current, current - 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::Acquire)
    }

    pub fn has_demand(&self) -> bool {
        self.pending() > 0
    }

    pub fn is_unlimited(&self) -> bool {
        self.pending() == UNLIMITED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_request_and_consume() {
        let demand = Demand::new();
        assert!(!demand.try_consume());

        assert_eq!(demand.request(2), 2);
        assert_eq!(demand.request(0), 2);
        assert!(demand.try_consume());
        assert!(demand.try_consume());
        assert!(!demand.try_consume());
        assert!(!demand.has_demand());
    }

    #[test]
    fn test_request_saturates_to_unlimited() {
        let demand = Demand::new();
        demand.request(UNLIMITED - 1);
        assert_eq!(demand.request(10), UNLIMITED);
        assert!(demand.is_unlimited());
        assert!(demand.try_consume());
        assert_eq!(demand.pending(), UNLIMITED);
    }

    #[test]
    fn test_unlimited_is_never_spent() {
        let demand = Demand::new();
        demand.request_unlimited();
        for _ in 0..1000 {
            assert!(demand.try_consume());
        }
        assert!(demand.is_unlimited());
    }

    #[test]
    fn test_concurrent_requests_are_additive() {
        let demand = Arc::new(Demand::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let demand = Arc::clone(&demand);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        demand.request(1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(demand.pending(), 800);
    }
}
