//! Thread-safe handle on a [`Registry`]
//!
//! A single lock guards every pool, so operations spanning several pools can
//! never take locks in conflicting orders.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::EngineConfig;
use crate::registry::Registry;

#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<RwLock<Registry>>,
}

impl SharedRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self::from_registry(Registry::new(config))
    }

    pub fn from_registry(registry: Registry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    /// Run a read-only closure under the read lock
    pub fn view<T>(&self, f: impl FnOnce(&Registry) -> T) -> T {
        f(&self.inner.read())
    }

    /// Run a mutation under the write lock
    pub fn mutate<T>(&self, f: impl FnOnce(&mut Registry) -> T) -> T {
        f(&mut self.inner.write())
    }

    /// Copy of the current registry
    pub fn snapshot(&self) -> Registry {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::PremiumCurve;
    use athena_common::Ray;
    use std::thread;

    #[test]
    fn test_concurrent_deposits_all_land() {
        let shared = SharedRegistry::default();
        let pool = shared
            .mutate(|r| r.create_pool(PremiumCurve::default(), &[], 0))
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || shared.mutate(|r| r.deposit([pool], 100, 0)).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let available = shared.view(|r| r.pool_state(pool).map(|s| s.available_capital));
        assert_eq!(available, Ok(800));
        assert_eq!(shared.snapshot().liquidity().positions().count(), 8);
    }

    #[test]
    fn test_view_uses_previews() {
        let shared = SharedRegistry::default();
        let pool = shared
            .mutate(|r| r.create_pool(PremiumCurve::default(), &[], 0))
            .unwrap();
        let rate = shared.view(|r| r.premium_rate(pool, 86_400)).unwrap();
        assert_eq!(rate, Ray::from_int(1));
        assert_eq!(shared.view(|r| r.pool_state(pool).map(|s| s.tick)), Ok(0));
    }
}
