use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::events::Bus;

use super::{config::PoolConfig, core::ExecPool};

/// Registry of execution pools keyed by name.
///
/// Pools are created lazily on first use. A key with no explicit
/// configuration gets the fallback [`PoolConfig`].
pub struct PoolSet {
    configs: HashMap<String, PoolConfig>,
    fallback: PoolConfig,
    pools: Mutex<HashMap<Arc<str>, ExecPool>>,
    bus: Bus,
}

impl PoolSet {
    /// Creates an empty set.
    pub fn new(configs: HashMap<String, PoolConfig>, fallback: PoolConfig, bus: Bus) -> Self {
        Self {
            configs,
            fallback,
            pools: Mutex::new(HashMap::new()),
            bus,
        }
    }

    /// Returns the pool for `key`, creating it on first use.
    pub fn get(&self, key: &str) -> ExecPool {
        let mut pools = self.pools.lock();
        if let Some(pool) = pools.get(key) {
            return pool.clone();
        }
        let config = self.configs.get(key).copied().unwrap_or(self.fallback);
        let key: Arc<str> = Arc::from(key);
        let pool = ExecPool::new(Arc::clone(&key), config, self.bus.clone());
        pools.insert(key, pool.clone());
        pool
    }

    /// Number of pools created so far.
    pub fn len(&self) -> usize {
        self.pools.lock().len()
    }

    /// True if no pool was created yet.
    pub fn is_empty(&self) -> bool {
        self.pools.lock().is_empty()
    }
}
