//! SPARQL-backed graph store.
//!
//! Speaks the SPARQL 1.1 Protocol against an RDF store holding the
//! hand-off knowledge graph: queries are POSTed as
//! `application/sparql-query` and results parsed from
//! `application/sparql-results+json`. Works against Oxigraph, QLever and
//! Virtuoso endpoints; Virtuoso needs typed integer literals when matching
//! object ids, which is what `typed_integer_literals` toggles.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{ChainPosition, GraphStore, ObjectChain, ObjectGraph, PositionData};
use crate::activity;
use crate::error::{Error, Result};
use crate::model::ObjectId;

const PREFIXES: &str = "\
PREFIX crc: <https://crc1625.mdi.ruhr-uni-bochum.de/>
PREFIX project: <https://crc1625.mdi.ruhr-uni-bochum.de/project/>
PREFIX pmdco: <https://w3id.org/pmd/co/>
PREFIX prov: <http://www.w3.org/ns/prov#>
PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>
";

/// One row per hand-off group of the object. `?next` is unbound at the end
/// of the chain, `?prev` is unbound exactly for the first group.
const CHAIN_QUERY: &str = "\
SELECT ?group ?next ?prev
WHERE {
  ?group a crc:HandoverGroup ;
         crc:groupForObject ?object .
  ?object crc:objectId {object_id} .
  OPTIONAL { ?group pmdco:nextProcess ?next . }
  OPTIONAL { ?prev pmdco:nextProcess ?group . }
}
";

/// One row per (group, associated org group) and (group, activity) pair.
const OBJECT_GRAPH_QUERY: &str = "\
SELECT ?group ?org_group ?activity ?activity_type
WHERE {
  ?group a crc:HandoverGroup ;
         crc:groupForObject ?object .
  ?object crc:objectId {object_id} .
  OPTIONAL { ?group prov:wasAssociatedWith ?org_group . }
  OPTIONAL {
    ?group pmdco:subordinateProcess ?activity .
    ?activity a ?activity_type .
  }
}
";

/// Configuration for a [`SparqlStore`].
#[derive(Debug, Clone)]
pub struct SparqlStoreConfig {
    /// SPARQL query endpoint URL.
    pub endpoint: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Emit `"42"^^xsd:integer` instead of `42` when matching object ids.
    /// Virtuoso is finicky when matching plain ints.
    pub typed_integer_literals: bool,
}

impl Default for SparqlStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:7878/query".to_string(),
            request_timeout: Duration::from_secs(30),
            typed_integer_literals: false,
        }
    }
}

/// SPARQL 1.1 Protocol implementation of [`GraphStore`].
pub struct SparqlStore {
    config: SparqlStoreConfig,
    client: reqwest::Client,
}

impl SparqlStore {
    pub fn new(config: SparqlStoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(Error::Http)?;
        Ok(Self { config, client })
    }

    fn object_id_literal(&self, object: ObjectId) -> String {
        if self.config.typed_integer_literals {
            format!("\"{}\"^^xsd:integer", object.0)
        } else {
            object.0.to_string()
        }
    }

    async fn query(&self, template: &str, object: ObjectId) -> Result<Vec<Binding>> {
        let query = format!(
            "{}{}",
            PREFIXES,
            template.replace("{object_id}", &self.object_id_literal(object))
        );
        debug!(endpoint = %self.config.endpoint, object = object.0, "SPARQL query");

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/sparql-query")
            .header("Accept", "application/sparql-results+json")
            .body(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    Error::StoreUnavailable(format!("{}: {}", self.config.endpoint, e))
                } else {
                    Error::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::QueryFailed(format!(
                "endpoint returned {}: {}",
                status, body
            )));
        }

        let results: SparqlResults = response
            .json()
            .await
            .map_err(|e| Error::QueryFailed(format!("malformed results document: {}", e)))?;
        Ok(results.results.bindings)
    }
}

#[async_trait]
impl GraphStore for SparqlStore {
    async fn chain(&self, object: ObjectId) -> Result<ObjectChain> {
        let bindings = self.query(CHAIN_QUERY, object).await?;
        if bindings.is_empty() {
            return Err(Error::NoChainFound(object.0));
        }

        let mut first = None;
        let mut successors = HashMap::new();
        for row in &bindings {
            let group = row.iri("group").ok_or_else(|| {
                Error::QueryFailed("chain row without ?group binding".to_string())
            })?;
            if let Some(next) = row.iri("next") {
                successors.insert(ChainPosition(group.clone()), ChainPosition(next));
            }
            if row.iri("prev").is_none() {
                first = Some(ChainPosition(group));
            }
        }

        let first = first.ok_or_else(|| {
            Error::QueryFailed(format!(
                "no first hand-off group found for object {} (chain has no start)",
                object
            ))
        })?;

        Ok(ObjectChain { first, successors })
    }

    async fn object_graph(&self, object: ObjectId) -> Result<ObjectGraph> {
        let bindings = self.query(OBJECT_GRAPH_QUERY, object).await?;
        if bindings.is_empty() {
            return Err(Error::QueryFailed(format!(
                "no data found for object {}",
                object
            )));
        }

        let mut positions: HashMap<ChainPosition, PositionData> = HashMap::new();
        // Activities carry several rdf:type rows; track the kind per
        // activity individual and prefer a dedicated process class over
        // the "Others" fallback.
        let mut activity_kinds: HashMap<(ChainPosition, String), &'static str> = HashMap::new();

        for row in &bindings {
            let Some(group) = row.iri("group") else { continue };
            let position = ChainPosition(group);
            let data = positions.entry(position.clone()).or_default();

            if let Some(org_group) = row.iri("org_group") {
                // Group tags are the last path segment of the project IRI
                let tag = org_group.rsplit('/').next().unwrap_or(&org_group).to_string();
                if !data.groups.contains(&tag) {
                    data.groups.push(tag);
                }
            }

            if let (Some(activity), Some(activity_type)) =
                (row.iri("activity"), row.iri("activity_type"))
            {
                let kind = activity::kind_for_class_iri(&activity_type);
                activity_kinds
                    .entry((position.clone(), activity))
                    .and_modify(|k| {
                        if *k == "Others" {
                            *k = kind;
                        }
                    })
                    .or_insert(kind);
            }
        }

        for ((position, _activity), kind) in activity_kinds {
            positions
                .entry(position)
                .or_default()
                .activities
                .push(kind.to_string());
        }

        Ok(ObjectGraph { object, positions })
    }
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    results: SparqlBindings,
}

#[derive(Debug, Deserialize)]
struct SparqlBindings {
    bindings: Vec<Binding>,
}

/// One result row: variable name -> RDF term.
type Binding = HashMap<String, Term>;

#[derive(Debug, Deserialize)]
struct Term {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    term_type: String,
    value: String,
}

trait BindingExt {
    fn iri(&self, var: &str) -> Option<String>;
}

impl BindingExt for Binding {
    fn iri(&self, var: &str) -> Option<String> {
        self.get(var).map(|t| t.value.clone())
    }
}
