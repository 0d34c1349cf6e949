//! In-memory instances backend
//!
//! A process-local stand-in for the data-modeling service, used by tests and
//! the emulator. It keeps nodes and edges in ordered maps so listing and
//! cursors are deterministic. Only the behaviour the client relies on is
//! modelled: versioned upserts, filtering, one-hop traversals, simple
//! search and aggregation.

mod aggregate;
pub mod eval;
mod query;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

use crate::core::error::{ApiError, Error, Result};
use crate::core::types::{InstanceType, NodeId, NodeMeta};
use crate::filter::{Filter, SourceRef};
use crate::instances::types::*;
use crate::instances::InstancesBackend;

/// Default page size when a list request has no limit
const DEFAULT_LIST_LIMIT: usize = 1000;

/// Default number of hits for search
const DEFAULT_SEARCH_LIMIT: usize = 1000;

/// Node and edge tables
#[derive(Debug, Default)]
pub(crate) struct Store {
    pub(crate) nodes: BTreeMap<NodeId, Node>,
    pub(crate) edges: BTreeMap<NodeId, Edge>,
}

/// Thread-safe in-memory implementation of [`InstancesBackend`]
#[derive(Debug, Default)]
pub struct MemoryInstances {
    store: RwLock<Store>,
}

impl MemoryInstances {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored nodes
    pub fn node_count(&self) -> usize {
        self.store.read().nodes.len()
    }

    /// Number of stored edges
    pub fn edge_count(&self) -> usize {
        self.store.read().edges.len()
    }

    /// Load an apply request, typically read from a seed file
    pub fn seed(&self, request: &ApplyRequest) -> Result<ApplyResponse> {
        let response = self.apply(request)?;
        debug!(items = response.items.len(), "seeded in-memory store");
        Ok(response)
    }

    /// Remove everything
    pub fn clear(&self) {
        let mut store = self.store.write();
        store.nodes.clear();
        store.edges.clear();
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn bad_request(message: impl Into<String>) -> Error {
    Error::Api(ApiError::new(400, message))
}

/// Offset-based cursors, opaque to callers
pub(crate) fn encode_cursor(offset: usize) -> String {
    STANDARD.encode(format!("offset:{}", offset))
}

pub(crate) fn decode_cursor(cursor: Option<&str>) -> Result<usize> {
    let Some(cursor) = cursor else {
        return Ok(0);
    };
    let decoded = STANDARD
        .decode(cursor)
        .map_err(|_| bad_request(format!("Invalid cursor: {}", cursor)))?;
    String::from_utf8_lossy(&decoded)
        .strip_prefix("offset:")
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| bad_request(format!("Invalid cursor: {}", cursor)))
}

/// Cut one page out of `items` starting at the cursor
pub(crate) fn paginate<T>(items: Vec<T>, cursor: Option<&str>, limit: usize) -> Result<(Vec<T>, Option<String>)> {
    let offset = decode_cursor(cursor)?;
    let total = items.len();
    let page: Vec<T> = items.into_iter().skip(offset).take(limit).collect();
    let end = offset + page.len();
    let next = (end < total).then(|| encode_cursor(end));
    Ok((page, next))
}

/// Keep only the properties of the selected views; no selection keeps none
pub(crate) fn project(properties: &Properties, sources: &[SourceRef]) -> Properties {
    let mut projected = Properties::new();
    for SourceRef::View(view) in sources {
        let key = view.property_key();
        if let Some(props) = properties.get(&view.space).and_then(|views| views.get(&key)) {
            projected
                .entry(view.space.clone())
                .or_default()
                .insert(key, props.clone());
        }
    }
    projected
}

fn project_instance(instance: Instance, sources: &[SourceRef]) -> Instance {
    match instance {
        Instance::Node(mut node) => {
            node.properties = project(&node.properties, sources);
            Instance::Node(node)
        }
        Instance::Edge(mut edge) => {
            edge.properties = project(&edge.properties, sources);
            Instance::Edge(edge)
        }
    }
}

fn selector_sources(selectors: &[SourceSelector]) -> Vec<SourceRef> {
    selectors.iter().map(|s| s.source.clone()).collect()
}

/// Merge or replace view properties; nulls remove a property. Returns whether anything changed.
fn write_properties(target: &mut Properties, sources: &[NodeOrEdgeData], replace: bool) -> bool {
    let mut modified = false;
    for data in sources {
        let SourceRef::View(view) = &data.source;
        let slot = target
            .entry(view.space.clone())
            .or_default()
            .entry(view.property_key())
            .or_insert_with(|| {
                modified = true;
                PropertyMap::new()
            });

        if replace {
            let replacement: PropertyMap = data
                .properties
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            if *slot != replacement {
                *slot = replacement;
                modified = true;
            }
            continue;
        }

        for (key, value) in &data.properties {
            if value.is_null() {
                modified |= slot.remove(key).is_some();
            } else if slot.get(key) != Some(value) {
                slot.insert(key.clone(), value.clone());
                modified = true;
            }
        }
    }
    modified
}

fn empty_node(id: &NodeId, now: i64) -> Node {
    Node {
        space: id.space.clone(),
        external_id: id.external_id.clone(),
        meta: NodeMeta {
            version: 1,
            created_time: now,
            last_updated_time: now,
            deleted_time: None,
        },
        node_type: None,
        properties: Properties::new(),
    }
}

fn result_of(instance_type: InstanceType, id: &NodeId, meta: &NodeMeta, was_modified: bool) -> InstanceResult {
    InstanceResult {
        instance_type,
        space: id.space.clone(),
        external_id: id.external_id.clone(),
        version: meta.version,
        was_modified,
        created_time: meta.created_time,
        last_updated_time: meta.last_updated_time,
    }
}

impl Store {
    fn current_version(&self, item: &InstanceApply) -> Option<i64> {
        let id = item.id();
        match item {
            InstanceApply::Node(_) => self.nodes.get(&id).map(|n| n.meta.version),
            InstanceApply::Edge(_) => self.edges.get(&id).map(|e| e.meta.version),
        }
    }

    fn upsert_node(&mut self, apply: &NodeApply, replace: bool, now: i64) -> InstanceResult {
        let id = NodeId::new(apply.space.clone(), apply.external_id.clone());
        if let Some(node) = self.nodes.get_mut(&id) {
            let mut modified = write_properties(&mut node.properties, &apply.sources, replace);
            if apply.node_type.is_some() && node.node_type != apply.node_type {
                node.node_type = apply.node_type.clone();
                modified = true;
            }
            if modified {
                node.meta.version += 1;
                node.meta.last_updated_time = now;
            }
            return result_of(InstanceType::Node, &id, &node.meta, modified);
        }

        let mut node = empty_node(&id, now);
        node.node_type = apply.node_type.clone();
        write_properties(&mut node.properties, &apply.sources, replace);
        let result = result_of(InstanceType::Node, &id, &node.meta, true);
        self.nodes.insert(id, node);
        result
    }

    fn upsert_edge(&mut self, apply: &EdgeApply, replace: bool, now: i64) -> InstanceResult {
        let id = NodeId::new(apply.space.clone(), apply.external_id.clone());
        if let Some(edge) = self.edges.get_mut(&id) {
            let mut modified = write_properties(&mut edge.properties, &apply.sources, replace);
            if edge.start_node != apply.start_node
                || edge.end_node != apply.end_node
                || edge.edge_type != apply.edge_type
            {
                edge.start_node = apply.start_node.clone();
                edge.end_node = apply.end_node.clone();
                edge.edge_type = apply.edge_type.clone();
                modified = true;
            }
            if modified {
                edge.meta.version += 1;
                edge.meta.last_updated_time = now;
            }
            return result_of(InstanceType::Edge, &id, &edge.meta, modified);
        }

        let mut properties = Properties::new();
        write_properties(&mut properties, &apply.sources, replace);
        let edge = Edge {
            space: id.space.clone(),
            external_id: id.external_id.clone(),
            meta: empty_node(&id, now).meta,
            edge_type: apply.edge_type.clone(),
            start_node: apply.start_node.clone(),
            end_node: apply.end_node.clone(),
            properties,
        };
        let result = result_of(InstanceType::Edge, &id, &edge.meta, true);
        self.edges.insert(id, edge);
        result
    }

    fn instances(&self, instance_type: InstanceType) -> Vec<Instance> {
        match instance_type {
            InstanceType::Node => self.nodes.values().cloned().map(Instance::Node).collect(),
            InstanceType::Edge => self.edges.values().cloned().map(Instance::Edge).collect(),
        }
    }

    fn get(&self, reference: &InstanceRef) -> Option<Instance> {
        let id = reference.id();
        match reference.instance_type {
            InstanceType::Node => self.nodes.get(&id).cloned().map(Instance::Node),
            InstanceType::Edge => self.edges.get(&id).cloned().map(Instance::Edge),
        }
    }
}

/// Case-insensitive substring search over text properties of one view
pub(crate) fn search_matches(instance: &Instance, view: &crate::core::types::ViewId, query: Option<&str>, properties: Option<&[String]>) -> bool {
    let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) else {
        return true;
    };
    let Some(props) = instance
        .properties()
        .get(&view.space)
        .and_then(|views| views.get(&view.property_key()))
    else {
        return false;
    };

    let haystack: String = props
        .iter()
        .filter(|(key, _)| properties.map_or(true, |wanted| wanted.iter().any(|w| w == *key)))
        .filter_map(|(_, value)| value.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    query
        .to_lowercase()
        .split_whitespace()
        .all(|token| haystack.contains(token))
}

impl InstancesBackend for MemoryInstances {
    fn apply(&self, request: &ApplyRequest) -> Result<ApplyResponse> {
        let mut store = self.store.write();

        let mut seen = HashSet::new();
        let mut duplicated = Vec::new();
        let mut conflicts = Vec::new();
        for item in &request.items {
            let id = item.id();
            if !id.is_valid() {
                return Err(bad_request("Instances require a space and an externalId"));
            }
            let kind = item.instance_type();
            if !seen.insert((kind, id.clone())) {
                duplicated.push(id.clone());
            }
            let existing = match item {
                InstanceApply::Node(node) => node.existing_version,
                InstanceApply::Edge(edge) => edge.existing_version,
            };
            if let Some(expected) = existing {
                let ok = match store.current_version(item) {
                    Some(current) => current == expected,
                    None => expected == 0,
                };
                if !ok {
                    conflicts.push((kind, id));
                }
            }
        }

        if !duplicated.is_empty() {
            return Err(Error::Api(ApiError {
                duplicated,
                ..ApiError::new(400, "Duplicate instances in request")
            }));
        }
        if !conflicts.is_empty() && !request.skip_on_version_conflict {
            return Err(Error::Api(ApiError {
                conflicts: conflicts.into_iter().map(|(_, id)| id).collect(),
                ..ApiError::new(409, "Version conflict")
            }));
        }
        let skipped: BTreeSet<(InstanceType, NodeId)> = conflicts.into_iter().collect();

        // Edge endpoints must exist or be allowed to be created.
        let written_nodes: BTreeSet<NodeId> = request
            .items
            .iter()
            .filter(|item| matches!(item, InstanceApply::Node(_)))
            .map(InstanceApply::id)
            .collect();
        let mut missing = Vec::new();
        for item in &request.items {
            if let InstanceApply::Edge(edge) = item {
                for (node, auto_create) in [
                    (&edge.start_node, request.auto_create_start_nodes),
                    (&edge.end_node, request.auto_create_end_nodes),
                ] {
                    let exists = store.nodes.contains_key(node) || written_nodes.contains(node);
                    if !exists && !auto_create && !missing.contains(node) {
                        missing.push(node.clone());
                    }
                }
            }
        }
        if !missing.is_empty() {
            return Err(Error::Api(ApiError {
                missing,
                ..ApiError::new(400, "Edge endpoints do not exist")
            }));
        }

        let now = now_millis();
        let mut items = Vec::with_capacity(request.items.len());
        for item in &request.items {
            if skipped.contains(&(item.instance_type(), item.id())) {
                continue;
            }
            match item {
                InstanceApply::Node(node) => items.push(store.upsert_node(node, request.replace, now)),
                InstanceApply::Edge(edge) => {
                    for endpoint in [&edge.start_node, &edge.end_node] {
                        if !store.nodes.contains_key(endpoint) {
                            store.nodes.insert(endpoint.clone(), empty_node(endpoint, now));
                        }
                    }
                    items.push(store.upsert_edge(edge, request.replace, now));
                }
            }
        }

        Ok(ApplyResponse { items })
    }

    fn list(&self, request: &ListRequest) -> Result<ListResponse> {
        let store = self.store.read();
        let sources = selector_sources(&request.sources);

        let mut matched: Vec<Instance> = store
            .instances(request.instance_type)
            .into_iter()
            .filter(|instance| eval::matches(instance, request.filter.as_ref()))
            .collect();
        eval::sort_instances(&mut matched, &request.sort);

        let limit = request.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        let (page, next_cursor) = paginate(matched, request.cursor.as_deref(), limit)?;
        Ok(ListResponse {
            items: page
                .into_iter()
                .map(|instance| project_instance(instance, &sources))
                .collect(),
            next_cursor,
        })
    }

    fn retrieve(&self, request: &RetrieveRequest) -> Result<ListResponse> {
        let store = self.store.read();
        let sources = selector_sources(&request.sources);
        let items = request
            .items
            .iter()
            .filter_map(|reference| store.get(reference))
            .map(|instance| project_instance(instance, &sources))
            .collect();
        Ok(ListResponse {
            items,
            next_cursor: None,
        })
    }

    fn delete(&self, request: &DeleteRequest) -> Result<DeleteResponse> {
        let mut store = self.store.write();
        let mut items = Vec::new();
        for reference in &request.items {
            let id = reference.id();
            let removed = match reference.instance_type {
                InstanceType::Node => {
                    let removed = store.nodes.remove(&id).is_some();
                    if removed {
                        store
                            .edges
                            .retain(|_, edge| edge.start_node != id && edge.end_node != id);
                    }
                    removed
                }
                InstanceType::Edge => store.edges.remove(&id).is_some(),
            };
            if removed {
                items.push(reference.clone());
            }
        }
        Ok(DeleteResponse { items })
    }

    fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let store = self.store.read();
        query::evaluate(&store, request)
    }

    fn aggregate(&self, request: &AggregateRequest) -> Result<AggregateResponse> {
        let store = self.store.read();
        let has_view = Filter::has_data(&request.view);
        let candidates: Vec<Instance> = store
            .instances(request.instance_type)
            .into_iter()
            .filter(|instance| eval::evaluate(instance, &has_view))
            .filter(|instance| eval::matches(instance, request.filter.as_ref()))
            .filter(|instance| {
                search_matches(
                    instance,
                    &request.view,
                    request.query.as_deref(),
                    request.properties.as_deref(),
                )
            })
            .collect();
        aggregate::compute(request, &candidates)
    }

    fn search(&self, request: &SearchRequest) -> Result<ListResponse> {
        let store = self.store.read();
        let has_view = Filter::has_data(&request.view);
        let sources = vec![SourceRef::View(request.view.clone())];
        let items = store
            .instances(request.instance_type)
            .into_iter()
            .filter(|instance| eval::evaluate(instance, &has_view))
            .filter(|instance| eval::matches(instance, request.filter.as_ref()))
            .filter(|instance| {
                search_matches(
                    instance,
                    &request.view,
                    request.query.as_deref(),
                    request.properties.as_deref(),
                )
            })
            .take(request.limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
            .map(|instance| project_instance(instance, &sources))
            .collect();
        Ok(ListResponse {
            items,
            next_cursor: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ViewId;
    use serde_json::json;

    fn view() -> ViewId {
        ViewId::new("movies", "Person", "2")
    }

    fn node_apply(external_id: &str, props: serde_json::Value, existing_version: Option<i64>) -> InstanceApply {
        let serde_json::Value::Object(properties) = props else { panic!("object expected") };
        InstanceApply::Node(NodeApply {
            space: "movies".into(),
            external_id: external_id.into(),
            existing_version,
            node_type: None,
            sources: vec![NodeOrEdgeData {
                source: SourceRef::View(view()),
                properties,
            }],
        })
    }

    fn request(items: Vec<InstanceApply>) -> ApplyRequest {
        ApplyRequest {
            items,
            auto_create_start_nodes: false,
            auto_create_end_nodes: false,
            skip_on_version_conflict: false,
            replace: false,
        }
    }

    #[test]
    fn test_upsert_bumps_version_only_on_change() {
        let store = MemoryInstances::new();
        let first = store.apply(&request(vec![node_apply("p1", json!({"name": "A"}), None)])).unwrap();
        assert_eq!(first.items[0].version, 1);

        let same = store.apply(&request(vec![node_apply("p1", json!({"name": "A"}), None)])).unwrap();
        assert!(!same.items[0].was_modified);
        assert_eq!(same.items[0].version, 1);

        let changed = store.apply(&request(vec![node_apply("p1", json!({"birthYear": 1963}), None)])).unwrap();
        assert!(changed.items[0].was_modified);
        assert_eq!(changed.items[0].version, 2);
    }

    #[test]
    fn test_version_conflict() {
        let store = MemoryInstances::new();
        store.apply(&request(vec![node_apply("p1", json!({"name": "A"}), None)])).unwrap();

        let err = store
            .apply(&request(vec![node_apply("p1", json!({"name": "B"}), Some(7))]))
            .unwrap_err();
        assert!(err.is_version_conflict());

        let mut skip = request(vec![node_apply("p1", json!({"name": "B"}), Some(7))]);
        skip.skip_on_version_conflict = true;
        assert!(store.apply(&skip).unwrap().items.is_empty());
    }

    #[test]
    fn test_conflicts_are_reported_and_skipped_per_kind() {
        let store = MemoryInstances::new();
        let shared = "p1:p2";
        let node = node_apply(shared, json!({"name": "Both"}), None);
        let edge = InstanceApply::Edge(EdgeApply {
            space: "movies".into(),
            external_id: shared.into(),
            existing_version: Some(3),
            edge_type: NodeId::new("movies", "Person.roles"),
            start_node: NodeId::new("movies", "p1"),
            end_node: NodeId::new("movies", "p2"),
            sources: vec![],
        });

        let mut strict = request(vec![node, edge]);
        strict.auto_create_start_nodes = true;
        strict.auto_create_end_nodes = true;
        let Error::Api(api) = store.apply(&strict).unwrap_err() else { panic!("api error expected") };
        assert_eq!(api.code, 409);
        assert_eq!(api.conflicts, vec![NodeId::new("movies", shared)]);
        assert!(api.duplicated.is_empty());

        let mut lenient = strict.clone();
        lenient.skip_on_version_conflict = true;
        let written = store.apply(&lenient).unwrap();
        assert_eq!(written.items.len(), 1);
        assert_eq!(written.items[0].instance_type, InstanceType::Node);
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn test_replace_drops_unlisted_properties() {
        let store = MemoryInstances::new();
        store
            .apply(&request(vec![node_apply("p1", json!({"name": "A", "birthYear": 1960}), None)]))
            .unwrap();
        let mut replace = request(vec![node_apply("p1", json!({"name": "A"}), None)]);
        replace.replace = true;
        store.apply(&replace).unwrap();

        let listed = store
            .list(&ListRequest {
                instance_type: InstanceType::Node,
                sources: vec![SourceSelector::view(&view())],
                filter: None,
                sort: vec![],
                limit: None,
                cursor: None,
            })
            .unwrap();
        let Instance::Node(node) = &listed.items[0] else { panic!("node expected") };
        assert!(node.view_properties(&view()).unwrap().get("birthYear").is_none());
    }

    #[test]
    fn test_edges_need_endpoints_unless_auto_created() {
        let store = MemoryInstances::new();
        let edge = InstanceApply::Edge(EdgeApply {
            space: "movies".into(),
            external_id: "a:b".into(),
            existing_version: None,
            edge_type: NodeId::new("movies", "Person.roles"),
            start_node: NodeId::new("movies", "a"),
            end_node: NodeId::new("movies", "b"),
            sources: vec![],
        });
        let err = store.apply(&request(vec![edge.clone()])).unwrap_err();
        assert_eq!(err.api_code(), Some(400));

        let mut auto = request(vec![edge]);
        auto.auto_create_start_nodes = true;
        auto.auto_create_end_nodes = true;
        store.apply(&auto).unwrap();
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.edge_count(), 1);
    }

    #[test]
    fn test_delete_cascades_and_ignores_missing() {
        let store = MemoryInstances::new();
        let mut req = request(vec![InstanceApply::Edge(EdgeApply {
            space: "movies".into(),
            external_id: "a:b".into(),
            existing_version: None,
            edge_type: NodeId::new("movies", "Person.roles"),
            start_node: NodeId::new("movies", "a"),
            end_node: NodeId::new("movies", "b"),
            sources: vec![],
        })]);
        req.auto_create_start_nodes = true;
        req.auto_create_end_nodes = true;
        store.apply(&req).unwrap();

        let deleted = store
            .delete(&DeleteRequest {
                items: vec![
                    InstanceRef::node(&NodeId::new("movies", "a")),
                    InstanceRef::node(&NodeId::new("movies", "missing")),
                ],
            })
            .unwrap();
        assert_eq!(deleted.items.len(), 1);
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn test_list_pagination() {
        let store = MemoryInstances::new();
        let items = (0..5)
            .map(|i| node_apply(&format!("p{}", i), json!({"name": format!("P{}", i)}), None))
            .collect();
        store.apply(&request(items)).unwrap();

        let mut cursor = None;
        let mut seen = Vec::new();
        loop {
            let page = store
                .list(&ListRequest {
                    instance_type: InstanceType::Node,
                    sources: vec![],
                    filter: Some(Filter::has_data(&view())),
                    sort: vec![],
                    limit: Some(2),
                    cursor: cursor.take(),
                })
                .unwrap();
            seen.extend(page.items.iter().map(Instance::id));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        assert_eq!(seen.len(), 5);
        assert!(decode_cursor(Some("garbage!")).is_err());
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let store = MemoryInstances::new();
        store
            .apply(&request(vec![
                node_apply("p1", json!({"name": "Quentin Tarantino"}), None),
                node_apply("p2", json!({"name": "Uma Thurman"}), None),
            ]))
            .unwrap();
        let hits = store
            .search(&SearchRequest {
                view: view(),
                query: Some("tarantino".into()),
                instance_type: InstanceType::Node,
                properties: None,
                filter: None,
                limit: None,
            })
            .unwrap();
        assert_eq!(hits.items.len(), 1);
        assert_eq!(hits.items[0].id().external_id, "p1");
    }
}
