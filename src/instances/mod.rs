//! Storage boundary
//!
//! [`InstancesBackend`] is the seam between the generated client and the
//! service: one method per instances endpoint. [`HttpInstances`] talks to the
//! real service, [`MemoryInstances`] keeps everything in process.
//!
//! [`Instances`] wraps a backend with the behaviour every caller wants:
//! chunked writes, cursor-following lists, metrics and tracing.

pub mod auth;
pub mod http;
pub mod memory;
pub mod types;

use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::core::error::Result;
use crate::core::types::{InstanceType, NodeId};
use crate::filter::Filter;
use crate::system::metrics::Metrics;

pub use auth::TokenProvider;
pub use http::HttpInstances;
pub use memory::MemoryInstances;
pub use types::*;

/// Maximum number of items per apply, delete or retrieve call
pub const MAX_WRITE_ITEMS: usize = 1000;

/// Page size used when listing everything
pub const LIST_PAGE_SIZE: usize = 1000;

/// One call per instances endpoint
pub trait InstancesBackend: Send + Sync {
    /// Upsert nodes and edges
    fn apply(&self, request: &ApplyRequest) -> Result<ApplyResponse>;

    /// One page of instances matching a filter
    fn list(&self, request: &ListRequest) -> Result<ListResponse>;

    /// Instances by id; missing ids are left out
    fn retrieve(&self, request: &RetrieveRequest) -> Result<ListResponse>;

    /// Delete instances; missing ids are ignored
    fn delete(&self, request: &DeleteRequest) -> Result<DeleteResponse>;

    /// Run a multi-step graph query
    fn query(&self, request: &QueryRequest) -> Result<QueryResponse>;

    /// Compute aggregates over one view
    fn aggregate(&self, request: &AggregateRequest) -> Result<AggregateResponse>;

    /// Free-text search over one view
    fn search(&self, request: &SearchRequest) -> Result<ListResponse>;
}

/// Nodes and edges to write in one go
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcesWrite {
    /// Node upserts
    pub nodes: Vec<NodeApply>,
    /// Edge upserts
    pub edges: Vec<EdgeApply>,
}

/// Outcome of writing a [`ResourcesWrite`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcesWriteResult {
    /// Node results in request order
    pub nodes: Vec<InstanceResult>,
    /// Edge results in request order
    pub edges: Vec<InstanceResult>,
}

impl ResourcesWrite {
    /// Nothing to write
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Total number of instances
    pub fn len(&self) -> usize {
        self.nodes.len() + self.edges.len()
    }

    /// Append another batch
    pub fn extend(&mut self, other: ResourcesWrite) {
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges);
    }

    fn into_items(self) -> Vec<InstanceApply> {
        self.nodes
            .into_iter()
            .map(InstanceApply::Node)
            .chain(self.edges.into_iter().map(InstanceApply::Edge))
            .collect()
    }
}

/// Time a backend call and record it
fn instrument<T>(operation: &'static str, call: impl FnOnce() -> Result<T>) -> Result<T> {
    let started = Instant::now();
    let result = call();
    let elapsed = started.elapsed();
    if let Some(metrics) = Metrics::global() {
        metrics.observe(operation, elapsed, result.is_ok());
    }
    match &result {
        Ok(_) => debug!(operation, elapsed_ms = elapsed.as_millis() as u64, "request finished"),
        Err(e) => debug!(operation, error = %e, "request failed"),
    }
    result
}

/// Shared, instrumented access to a backend
#[derive(Clone)]
pub struct Instances {
    backend: Arc<dyn InstancesBackend>,
}

impl std::fmt::Debug for Instances {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instances").finish_non_exhaustive()
    }
}

impl Instances {
    /// Wrap a backend
    pub fn new(backend: Arc<dyn InstancesBackend>) -> Self {
        Self { backend }
    }

    /// The wrapped backend
    pub fn backend(&self) -> &Arc<dyn InstancesBackend> {
        &self.backend
    }

    /// Write nodes and edges, creating missing edge endpoints
    pub fn apply(&self, write: ResourcesWrite, replace: bool) -> Result<ResourcesWriteResult> {
        let mut result = ResourcesWriteResult::default();
        if write.is_empty() {
            return Ok(result);
        }

        let items = write.into_items();
        for chunk in items.chunks(MAX_WRITE_ITEMS) {
            let request = ApplyRequest {
                items: chunk.to_vec(),
                auto_create_start_nodes: true,
                auto_create_end_nodes: true,
                skip_on_version_conflict: false,
                replace,
            };
            let response = instrument("apply", || self.backend.apply(&request))?;
            for item in response.items {
                match item.instance_type {
                    InstanceType::Node => result.nodes.push(item),
                    InstanceType::Edge => result.edges.push(item),
                }
            }
        }

        if let Some(metrics) = Metrics::global() {
            metrics.record_writes(result.nodes.len(), result.edges.len());
        }
        debug!(nodes = result.nodes.len(), edges = result.edges.len(), "applied instances");
        Ok(result)
    }

    /// One page, exactly as the backend returns it
    pub fn list_page(&self, request: &ListRequest) -> Result<ListResponse> {
        instrument("list", || self.backend.list(request))
    }

    /// Up to `limit` instances (all when `None`), following cursors
    pub fn list(
        &self,
        instance_type: InstanceType,
        sources: Vec<SourceSelector>,
        filter: Option<Filter>,
        sort: Vec<Sort>,
        limit: Option<usize>,
    ) -> Result<Vec<Instance>> {
        let mut items = Vec::new();
        let mut cursor = None;
        loop {
            let remaining = limit.map(|limit| limit.saturating_sub(items.len()));
            if remaining == Some(0) {
                break;
            }
            let request = ListRequest {
                instance_type,
                sources: sources.clone(),
                filter: filter.clone(),
                sort: sort.clone(),
                limit: Some(remaining.map_or(LIST_PAGE_SIZE, |r| r.min(LIST_PAGE_SIZE))),
                cursor: cursor.take(),
            };
            let page = self.list_page(&request)?;
            items.extend(page.items);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(items)
    }

    /// Nodes by id, in the order found
    pub fn retrieve(&self, ids: &[NodeId], instance_type: InstanceType, sources: Vec<SourceSelector>) -> Result<Vec<Instance>> {
        let mut items = Vec::new();
        for chunk in ids.chunks(MAX_WRITE_ITEMS) {
            let request = RetrieveRequest {
                items: chunk
                    .iter()
                    .map(|id| match instance_type {
                        InstanceType::Node => InstanceRef::node(id),
                        InstanceType::Edge => InstanceRef::edge(id),
                    })
                    .collect(),
                sources: sources.clone(),
            };
            items.extend(instrument("retrieve", || self.backend.retrieve(&request))?.items);
        }
        Ok(items)
    }

    /// Delete instances, returning those that existed
    pub fn delete(&self, refs: Vec<InstanceRef>) -> Result<Vec<InstanceRef>> {
        let mut deleted = Vec::new();
        for chunk in refs.chunks(MAX_WRITE_ITEMS) {
            let request = DeleteRequest {
                items: chunk.to_vec(),
            };
            deleted.extend(instrument("delete", || self.backend.delete(&request))?.items);
        }
        debug!(deleted = deleted.len(), "deleted instances");
        Ok(deleted)
    }

    /// Run a graph query
    pub fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        instrument("query", || self.backend.query(request))
    }

    /// Compute aggregates
    pub fn aggregate(&self, request: &AggregateRequest) -> Result<AggregateResponse> {
        instrument("aggregate", || self.backend.aggregate(request))
    }

    /// Free-text search
    pub fn search(&self, request: &SearchRequest) -> Result<ListResponse> {
        instrument("search", || self.backend.search(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ViewId;
    use crate::filter::SourceRef;
    use serde_json::json;

    fn person(i: usize) -> NodeApply {
        let mut properties = PropertyMap::new();
        properties.insert("name".into(), json!(format!("Person {}", i)));
        NodeApply {
            space: "movies".into(),
            external_id: format!("person:{}", i),
            existing_version: None,
            node_type: None,
            sources: vec![NodeOrEdgeData {
                source: SourceRef::View(ViewId::new("movies", "Person", "2")),
                properties,
            }],
        }
    }

    fn instances() -> (Arc<MemoryInstances>, Instances) {
        let memory = Arc::new(MemoryInstances::new());
        let instances = Instances::new(memory.clone());
        (memory, instances)
    }

    #[test]
    fn test_apply_chunks_large_writes() {
        let (memory, instances) = instances();
        let write = ResourcesWrite {
            nodes: (0..MAX_WRITE_ITEMS + 5).map(person).collect(),
            edges: vec![],
        };
        let result = instances.apply(write, false).unwrap();
        assert_eq!(result.nodes.len(), MAX_WRITE_ITEMS + 5);
        assert_eq!(memory.node_count(), MAX_WRITE_ITEMS + 5);
    }

    #[test]
    fn test_list_follows_cursors_and_respects_limit() {
        let (_, instances) = instances();
        let write = ResourcesWrite {
            nodes: (0..LIST_PAGE_SIZE + 10).map(person).collect(),
            edges: vec![],
        };
        instances.apply(write, false).unwrap();

        let all = instances
            .list(InstanceType::Node, vec![], None, vec![], None)
            .unwrap();
        assert_eq!(all.len(), LIST_PAGE_SIZE + 10);

        let some = instances
            .list(InstanceType::Node, vec![], None, vec![], Some(7))
            .unwrap();
        assert_eq!(some.len(), 7);
    }

    #[test]
    fn test_retrieve_and_delete() {
        let (_, instances) = instances();
        instances
            .apply(ResourcesWrite { nodes: vec![person(1), person(2)], edges: vec![] }, false)
            .unwrap();
        let ids = vec![NodeId::new("movies", "person:1"), NodeId::new("movies", "person:9")];
        assert_eq!(instances.retrieve(&ids, InstanceType::Node, vec![]).unwrap().len(), 1);

        let deleted = instances
            .delete(ids.iter().map(InstanceRef::node).collect())
            .unwrap();
        assert_eq!(deleted.len(), 1);
    }
}
