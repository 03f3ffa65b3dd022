//! In-memory graph store.
//!
//! Backs local experimentation and test fixtures without a running SPARQL
//! endpoint. Chains and position data are declared up front with the
//! builder methods.

use std::collections::HashMap;

use async_trait::async_trait;

use super::{ChainPosition, GraphStore, ObjectChain, ObjectGraph, PositionData};
use crate::error::{Error, Result};
use crate::model::ObjectId;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    chains: HashMap<ObjectId, Vec<ChainPosition>>,
    data: HashMap<ObjectId, HashMap<ChainPosition, PositionData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an object's chain as an ordered list of position IRIs.
    pub fn with_chain<I, S>(mut self, object: ObjectId, positions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chains.insert(
            object,
            positions
                .into_iter()
                .map(|p| ChainPosition(p.into()))
                .collect(),
        );
        self
    }

    /// Declare the groups and activities recorded at one position.
    pub fn with_data<G, A>(
        mut self,
        object: ObjectId,
        position: &str,
        groups: G,
        activities: A,
    ) -> Self
    where
        G: IntoIterator<Item = &'static str>,
        A: IntoIterator<Item = &'static str>,
    {
        self.data.entry(object).or_default().insert(
            ChainPosition::from(position),
            PositionData {
                groups: groups.into_iter().map(String::from).collect(),
                activities: activities.into_iter().map(String::from).collect(),
            },
        );
        self
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn chain(&self, object: ObjectId) -> Result<ObjectChain> {
        let positions = self
            .chains
            .get(&object)
            .filter(|p| !p.is_empty())
            .ok_or(Error::NoChainFound(object.0))?;

        let successors = positions
            .windows(2)
            .map(|w| (w[0].clone(), w[1].clone()))
            .collect();

        Ok(ObjectChain {
            first: positions[0].clone(),
            successors,
        })
    }

    async fn object_graph(&self, object: ObjectId) -> Result<ObjectGraph> {
        if !self.chains.contains_key(&object) && !self.data.contains_key(&object) {
            return Err(Error::QueryFailed(format!(
                "no data found for object {}",
                object
            )));
        }

        let mut positions: HashMap<ChainPosition, PositionData> =
            self.data.get(&object).cloned().unwrap_or_default();

        // Chain positions with nothing recorded still appear, empty.
        if let Some(chain) = self.chains.get(&object) {
            for position in chain {
                positions.entry(position.clone()).or_default();
            }
        }

        Ok(ObjectGraph { object, positions })
    }
}
