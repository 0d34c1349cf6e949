//! Query evaluation for the in-memory backend
//!
//! Result sets are evaluated in dependency order. Each set is computed in
//! full, then cut to one page; dependent sets continue from that page.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde_json::Value;

use super::{eval, paginate, Store};
use crate::core::error::{ApiError, Error, Result};
use crate::core::types::{Direction, NodeId};
use crate::filter::SourceRef;
use crate::instances::types::*;

/// Page size for result sets without a limit
const DEFAULT_QUERY_LIMIT: usize = 100;

fn bad_request(message: impl Into<String>) -> Error {
    Error::Api(ApiError::new(400, message))
}

/// Order result sets so every set comes after the one it continues from
fn dependency_order(with: &BTreeMap<String, ResultSetExpression>) -> Result<Vec<&str>> {
    fn visit<'a>(
        name: &'a str,
        with: &'a BTreeMap<String, ResultSetExpression>,
        visiting: &mut HashSet<&'a str>,
        done: &mut Vec<&'a str>,
    ) -> Result<()> {
        if done.contains(&name) {
            return Ok(());
        }
        if !visiting.insert(name) {
            return Err(bad_request(format!("Cyclic result set reference at '{}'", name)));
        }
        let expression = with
            .get(name)
            .ok_or_else(|| bad_request(format!("Unknown result set '{}'", name)))?;
        let from = match &expression.kind {
            ExpressionKind::Nodes(nodes) => nodes.from.as_deref(),
            ExpressionKind::Edges(edges) => edges.from.as_deref(),
        };
        if let Some(parent) = from {
            let (parent, _) = with
                .get_key_value(parent)
                .ok_or_else(|| bad_request(format!("Unknown result set '{}'", parent)))?;
            visit(parent, with, visiting, done)?;
        }
        done.push(name);
        Ok(())
    }

    let mut visiting = HashSet::new();
    let mut done = Vec::new();
    for name in with.keys() {
        visit(name, with, &mut visiting, &mut done)?;
    }
    Ok(done)
}

/// Direct relation targets stored in a property: a single reference or a list
fn references(value: &Value) -> Vec<NodeId> {
    match value {
        Value::Array(items) => items.iter().flat_map(references).collect(),
        Value::Object(_) => serde_json::from_value::<NodeId>(value.clone())
            .into_iter()
            .collect(),
        _ => Vec::new(),
    }
}

fn relation_targets(node: &Node, through: &ViewPropertyId) -> Vec<NodeId> {
    let SourceRef::View(view) = &through.source;
    node.view_properties(view)
        .and_then(|props| props.get(&through.identifier))
        .map(references)
        .unwrap_or_default()
}

struct Evaluator<'s> {
    store: &'s Store,
    request: &'s QueryRequest,
    pages: BTreeMap<String, Vec<Instance>>,
}

impl<'s> Evaluator<'s> {
    fn parent(&self, name: &str) -> Result<&Vec<Instance>> {
        self.pages
            .get(name)
            .ok_or_else(|| bad_request(format!("Unknown result set '{}'", name)))
    }

    fn nodes(&self, id: impl IntoIterator<Item = NodeId>) -> Vec<Instance> {
        let mut seen = BTreeSet::new();
        id.into_iter()
            .filter(|id| seen.insert(id.clone()))
            .filter_map(|id| self.store.nodes.get(&id).cloned())
            .map(Instance::Node)
            .collect()
    }

    fn node_set(&self, expression: &NodeExpression) -> Result<Vec<Instance>> {
        let candidates = match (&expression.from, &expression.through) {
            (None, _) => self.store.nodes.values().cloned().map(Instance::Node).collect(),
            (Some(from), None) => {
                let parent = self.parent(from)?;
                let parent_direction = match self.request.with.get(from).map(|e| &e.kind) {
                    Some(ExpressionKind::Edges(edges)) => Some((edges.direction, edges.chain_to)),
                    _ => None,
                };
                match parent_direction {
                    Some((direction, parent_chain)) => {
                        let chain = expression.chain_to.or(parent_chain).unwrap_or_default();
                        self.nodes(parent.iter().filter_map(|instance| match instance {
                            Instance::Edge(edge) => Some(match chain {
                                ChainTo::Destination => edge.other_end(direction).clone(),
                                ChainTo::Source => edge.near_end(direction).clone(),
                            }),
                            Instance::Node(_) => None,
                        }))
                    }
                    None => parent.clone(),
                }
            }
            (Some(from), Some(through)) => {
                let parent = self.parent(from)?;
                match expression.direction.unwrap_or_default() {
                    Direction::Outwards => self.nodes(parent.iter().flat_map(|instance| match instance {
                        Instance::Node(node) => relation_targets(node, through),
                        Instance::Edge(_) => Vec::new(),
                    })),
                    Direction::Inwards => {
                        let sources: HashSet<NodeId> = parent.iter().map(Instance::id).collect();
                        self.store
                            .nodes
                            .values()
                            .filter(|node| {
                                relation_targets(node, through)
                                    .iter()
                                    .any(|target| sources.contains(target))
                            })
                            .cloned()
                            .map(Instance::Node)
                            .collect()
                    }
                }
            }
        };
        Ok(candidates
            .into_iter()
            .filter(|instance| eval::matches(instance, expression.filter.as_ref()))
            .collect())
    }

    fn edge_set(&self, expression: &EdgeExpression) -> Result<Vec<Instance>> {
        let direction = expression.direction;
        let edge_ok = |edge: &Edge| -> bool {
            let instance = Instance::Edge(edge.clone());
            if !eval::matches(&instance, expression.filter.as_ref()) {
                return false;
            }
            match &expression.node_filter {
                None => true,
                Some(filter) => self
                    .store
                    .nodes
                    .get(edge.other_end(direction))
                    .map_or(false, |node| eval::evaluate(&Instance::Node(node.clone()), filter)),
            }
        };

        let Some(from) = &expression.from else {
            return Ok(self
                .store
                .edges
                .values()
                .filter(|edge| edge_ok(*edge))
                .cloned()
                .map(Instance::Edge)
                .collect());
        };

        let mut frontier: HashSet<NodeId> = self.parent(from)?.iter().map(Instance::id).collect();
        let mut visited = frontier.clone();
        let mut found = BTreeSet::new();
        let mut result = Vec::new();
        for _ in 0..expression.max_distance.unwrap_or(1) {
            let mut next = HashSet::new();
            for edge in self.store.edges.values() {
                if !frontier.contains(edge.near_end(direction)) || !edge_ok(edge) {
                    continue;
                }
                if found.insert(edge.id()) {
                    result.push(Instance::Edge(edge.clone()));
                }
                let far = edge.other_end(direction);
                if visited.insert(far.clone()) {
                    next.insert(far.clone());
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        Ok(result)
    }

    fn select(&self, name: &str, instance: Instance) -> Instance {
        let selection = self.request.select.get(name);
        let project = |properties: &Properties| -> Properties {
            let mut projected = Properties::new();
            for selector in selection.map(|s| s.sources.as_slice()).unwrap_or_default() {
                let SourceRef::View(view) = &selector.source;
                let key = view.property_key();
                let Some(props) = properties.get(&view.space).and_then(|views| views.get(&key)) else {
                    continue;
                };
                let all = selector.properties.iter().any(|p| p == "*");
                let kept: PropertyMap = props
                    .iter()
                    .filter(|(k, _)| all || selector.properties.iter().any(|p| p == *k))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                projected.entry(view.space.clone()).or_default().insert(key, kept);
            }
            projected
        };
        match instance {
            Instance::Node(mut node) => {
                node.properties = project(&node.properties);
                Instance::Node(node)
            }
            Instance::Edge(mut edge) => {
                edge.properties = project(&edge.properties);
                Instance::Edge(edge)
            }
        }
    }
}

/// Evaluate a query against the store
pub(super) fn evaluate(store: &Store, request: &QueryRequest) -> Result<QueryResponse> {
    for name in request.select.keys() {
        if !request.with.contains_key(name) {
            return Err(bad_request(format!("Selected result set '{}' is not defined", name)));
        }
    }

    let mut evaluator = Evaluator {
        store,
        request,
        pages: BTreeMap::new(),
    };
    let mut response = QueryResponse::default();

    for name in dependency_order(&request.with)? {
        let Some(expression) = request.with.get(name) else {
            continue;
        };
        let all = match &expression.kind {
            ExpressionKind::Nodes(nodes) => evaluator.node_set(nodes)?,
            ExpressionKind::Edges(edges) => evaluator.edge_set(edges)?,
        };
        let limit = expression.limit.unwrap_or(DEFAULT_QUERY_LIMIT);
        let (page, next) = paginate(all, request.cursors.get(name).map(String::as_str), limit)?;
        if let Some(next) = next {
            response.next_cursor.insert(name.to_string(), next);
        }
        response.items.insert(
            name.to_string(),
            page.iter().cloned().map(|i| evaluator.select(name, i)).collect(),
        );
        evaluator.pages.insert(name.to_string(), page);
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{NodeMeta, ViewId};
    use crate::filter::{reference_value, Filter};
    use serde_json::json;

    fn person_view() -> ViewId {
        ViewId::new("movies", "Person", "2")
    }

    fn actor_view() -> ViewId {
        ViewId::new("movies", "Actor", "2")
    }

    fn node(view: &ViewId, external_id: &str, props: Value) -> Node {
        let Value::Object(props) = props else { panic!("object expected") };
        let mut properties = Properties::new();
        properties.entry(view.space.clone()).or_default().insert(view.property_key(), props);
        Node {
            space: "movies".into(),
            external_id: external_id.into(),
            meta: NodeMeta::default(),
            node_type: None,
            properties,
        }
    }

    fn store() -> Store {
        let mut store = Store::default();
        for n in [
            node(&person_view(), "person:quentin", json!({"name": "Quentin"})),
            node(&person_view(), "person:uma", json!({"name": "Uma"})),
            node(&actor_view(), "actor:quentin", json!({"person": reference_value(&NodeId::new("movies", "person:quentin"))})),
        ] {
            store.nodes.insert(n.id(), n);
        }
        let edge = Edge {
            space: "movies".into(),
            external_id: "person:quentin:actor:quentin".into(),
            meta: NodeMeta::default(),
            edge_type: NodeId::new("movies", "Person.roles"),
            start_node: NodeId::new("movies", "person:quentin"),
            end_node: NodeId::new("movies", "actor:quentin"),
            properties: Properties::new(),
        };
        store.edges.insert(edge.id(), edge);
        store
    }

    fn nodes(filter: Option<Filter>) -> ResultSetExpression {
        ResultSetExpression {
            kind: ExpressionKind::Nodes(NodeExpression { filter, ..Default::default() }),
            limit: None,
        }
    }

    #[test]
    fn test_edge_then_node_steps() {
        let mut request = QueryRequest::default();
        request.with.insert(
            "person_0".into(),
            nodes(Some(Filter::equals(person_view().property_ref("name"), "Quentin"))),
        );
        request.with.insert(
            "roles_1".into(),
            ResultSetExpression {
                kind: ExpressionKind::Edges(EdgeExpression {
                    from: Some("person_0".into()),
                    filter: Some(Filter::equals(
                        crate::filter::edge_attribute("type"),
                        reference_value(&NodeId::new("movies", "Person.roles")),
                    )),
                    max_distance: Some(1),
                    ..Default::default()
                }),
                limit: None,
            },
        );
        request.with.insert(
            "actor_2".into(),
            ResultSetExpression {
                kind: ExpressionKind::Nodes(NodeExpression {
                    from: Some("roles_1".into()),
                    filter: Some(Filter::has_data(&actor_view())),
                    ..Default::default()
                }),
                limit: None,
            },
        );
        request.select.insert("person_0".into(), Select::all_of(&person_view()));
        request.select.insert("actor_2".into(), Select::all_of(&actor_view()));

        let response = evaluate(&store(), &request).unwrap();
        assert_eq!(response.items["person_0"].len(), 1);
        assert_eq!(response.items["roles_1"].len(), 1);
        assert_eq!(response.items["actor_2"][0].id().external_id, "actor:quentin");
        assert!(response.items["roles_1"][0].properties().is_empty());
        assert!(!response.items["person_0"][0].properties().is_empty());
    }

    #[test]
    fn test_direct_relation_both_directions() {
        let through = ViewPropertyId {
            source: SourceRef::View(actor_view()),
            identifier: "person".into(),
        };
        let mut request = QueryRequest::default();
        request.with.insert("actor_0".into(), nodes(Some(Filter::has_data(&actor_view()))));
        request.with.insert(
            "person_1".into(),
            ResultSetExpression {
                kind: ExpressionKind::Nodes(NodeExpression {
                    from: Some("actor_0".into()),
                    through: Some(through.clone()),
                    direction: Some(Direction::Outwards),
                    ..Default::default()
                }),
                limit: None,
            },
        );
        request.with.insert(
            "actor_2".into(),
            ResultSetExpression {
                kind: ExpressionKind::Nodes(NodeExpression {
                    from: Some("person_1".into()),
                    through: Some(through),
                    direction: Some(Direction::Inwards),
                    ..Default::default()
                }),
                limit: None,
            },
        );
        let response = evaluate(&store(), &request).unwrap();
        assert_eq!(response.items["person_1"][0].id().external_id, "person:quentin");
        assert_eq!(response.items["actor_2"][0].id().external_id, "actor:quentin");
    }

    #[test]
    fn test_limit_and_cursor() {
        let mut request = QueryRequest::default();
        request.with.insert(
            "person_0".into(),
            ResultSetExpression {
                kind: ExpressionKind::Nodes(NodeExpression {
                    filter: Some(Filter::has_data(&person_view())),
                    ..Default::default()
                }),
                limit: Some(1),
            },
        );
        let first = evaluate(&store(), &request).unwrap();
        assert_eq!(first.items["person_0"].len(), 1);
        let cursor = first.next_cursor["person_0"].clone();

        request.cursors.insert("person_0".into(), cursor);
        let second = evaluate(&store(), &request).unwrap();
        assert_eq!(second.items["person_0"].len(), 1);
        assert!(second.next_cursor.is_empty());
        assert_ne!(first.items["person_0"][0].id(), second.items["person_0"][0].id());
    }

    #[test]
    fn test_unknown_parent_is_rejected() {
        let mut request = QueryRequest::default();
        request.with.insert(
            "child".into(),
            ResultSetExpression {
                kind: ExpressionKind::Nodes(NodeExpression {
                    from: Some("missing".into()),
                    ..Default::default()
                }),
                limit: None,
            },
        );
        assert_eq!(evaluate(&store(), &request).unwrap_err().api_code(), Some(400));
    }
}
