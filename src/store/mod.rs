//! Graph store access.
//!
//! The recorded hand-off chains live in an external RDF graph store. The
//! engine only needs three read operations, expressed by the [`GraphStore`]
//! trait: the chain of an object (first position + successor map) and a
//! bounded per-object data graph export for constraint evaluation.
//!
//! The store is treated as read-only for the duration of a validation run;
//! no retry logic lives at this layer.

mod memory;
mod sparql;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::ObjectId;

pub use memory::MemoryStore;
pub use sparql::{SparqlStore, SparqlStoreConfig};

/// Opaque handle into an object's hand-off chain. Positions are IRIs
/// sourced from the graph store and never synthesized locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainPosition(pub String);

impl ChainPosition {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChainPosition {
    fn from(s: &str) -> Self {
        ChainPosition(s.to_string())
    }
}

/// One object's complete chain: the first position plus the full
/// position -> successor mapping (empty for a single-position chain).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectChain {
    pub first: ChainPosition,
    pub successors: HashMap<ChainPosition, ChainPosition>,
}

impl ObjectChain {
    /// Successor of a position, `None` at the end of the chain.
    pub fn next(&self, position: &ChainPosition) -> Option<&ChainPosition> {
        self.successors.get(position)
    }
}

/// Everything recorded at one chain position that constraint evaluation
/// cares about: the organizational groups involved in the hand-offs and
/// the characterization activities performed, by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionData {
    /// Organizational group tags ("A01", "B03", ...) attached to the
    /// position's hand-offs.
    pub groups: Vec<String>,

    /// Activity kinds, one entry per distinct recorded activity.
    pub activities: Vec<String>,
}

/// Bounded export of everything the store holds about one object's chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectGraph {
    pub object: ObjectId,
    /// Position -> recorded data. Positions with nothing recorded may be
    /// absent; lookups fall back to empty data.
    pub positions: HashMap<ChainPosition, PositionData>,
}

impl ObjectGraph {
    /// Data recorded at a position, empty if nothing is recorded there.
    pub fn at(&self, position: &ChainPosition) -> PositionData {
        self.positions.get(position).cloned().unwrap_or_default()
    }
}

/// Read access to the external graph store.
///
/// Failures propagate un-recovered: a validation run fails fast and the
/// invoking layer decides whether to retry the whole run.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// The object's full chain. Fails with `NoChainFound` if the object
    /// has never been the subject of a recorded event.
    async fn chain(&self, object: ObjectId) -> Result<ObjectChain>;

    /// Per-object data graph export for constraint evaluation.
    async fn object_graph(&self, object: ObjectId) -> Result<ObjectGraph>;
}
