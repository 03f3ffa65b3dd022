//! Event chain resolver.
//!
//! A cached facade over the graph store for the duration of one validation
//! run. The first lookup for an object issues one remote chain query and
//! stores the result; every later lookup for the same object is a pure
//! memory read. There is no invalidation: a run operates on a frozen view
//! of the store.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::model::ObjectId;
use crate::store::{ChainPosition, GraphStore, ObjectChain};

pub struct ChainResolver<'a> {
    store: &'a dyn GraphStore,
    cache: Mutex<HashMap<ObjectId, Arc<ObjectChain>>>,
}

impl<'a> ChainResolver<'a> {
    pub fn new(store: &'a dyn GraphStore) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The object's chain, fetched at most once per run.
    ///
    /// The store call happens outside the cache lock so that concurrent
    /// callers for other objects are not serialized behind it.
    pub async fn chain(&self, object: ObjectId) -> Result<Arc<ObjectChain>> {
        if let Some(chain) = self.cache.lock().await.get(&object) {
            return Ok(chain.clone());
        }

        debug!(object = object.0, "resolving hand-off chain");
        let chain = Arc::new(self.store.chain(object).await?);

        // A racing fetch for the same object may have populated the entry
        // meanwhile; both fetched the same frozen view, so either wins.
        let mut cache = self.cache.lock().await;
        let entry = cache.entry(object).or_insert_with(|| chain.clone());
        Ok(entry.clone())
    }

    /// First chain position of the object. Fails with `NoChainFound` for
    /// objects without recorded events.
    pub async fn first_position(&self, object: ObjectId) -> Result<ChainPosition> {
        Ok(self.chain(object).await?.first.clone())
    }

    /// Full successor map of the object's chain.
    pub async fn successor_map(&self, object: ObjectId) -> Result<Arc<ObjectChain>> {
        self.chain(object).await
    }

    /// Objects resolved so far in this run, in no particular order.
    pub async fn resolved_objects(&self) -> Vec<ObjectId> {
        self.cache.lock().await.keys().copied().collect()
    }
}
