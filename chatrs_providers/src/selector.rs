//! Credential selection strategies.

use std::sync::atomic::{AtomicUsize, Ordering};

use chatrs_core::{Credential, CredentialPool, CredentialSelector};
use rand::seq::SliceRandom;

/// Uniform random choice on every call, no state carried between calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSelector;

impl CredentialSelector for RandomSelector {
    fn select<'a>(&self, pool: &'a CredentialPool) -> &'a Credential {
        pool.as_slice()
            .choose(&mut rand::thread_rng())
            .unwrap_or_else(|| pool.first())
    }
}

/// Deterministic rotation through the pool.
#[derive(Debug, Default)]
pub struct RoundRobinSelector {
    next: AtomicUsize,
}

impl RoundRobinSelector {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicUsize::new(0),
        }
    }
}

impl CredentialSelector for RoundRobinSelector {
    fn select<'a>(&self, pool: &'a CredentialPool) -> &'a Credential {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % pool.len();
        &pool.as_slice()[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn random_selector_reaches_every_credential() {
        let pool = CredentialPool::from_keys(["key-one", "key-two"]).unwrap();
        let selector = RandomSelector;

        let seen: HashSet<&str> = (0..200)
            .map(|_| selector.select(&pool).api_key())
            .collect();

        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn random_selector_with_single_credential() {
        let pool = CredentialPool::from_keys(["only"]).unwrap();
        for _ in 0..10 {
            assert_eq!(RandomSelector.select(&pool).api_key(), "only");
        }
    }

    #[test]
    fn round_robin_cycles_in_order() {
        let pool = CredentialPool::from_keys(["a", "b", "c"]).unwrap();
        let selector = RoundRobinSelector::new();

        let picked: Vec<&str> = (0..5).map(|_| selector.select(&pool).api_key()).collect();
        assert_eq!(picked, vec!["a", "b", "c", "a", "b"]);
    }
}
