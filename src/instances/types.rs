//! Wire types of the instances endpoints
//!
//! These mirror the JSON bodies exchanged with the data-modeling service.
//! Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::core::types::{Direction, InstanceType, NodeId, NodeMeta, ViewId};
use crate::filter::{Filter, SourceRef};

/// Flat property map of one view
pub type PropertyMap = Map<String, Value>;

/// Properties grouped by view space, then by `"externalId/version"`
pub type Properties = BTreeMap<String, BTreeMap<String, PropertyMap>>;

/// A node as returned by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Space
    pub space: String,
    /// External id
    pub external_id: String,
    /// Server metadata
    #[serde(flatten)]
    pub meta: NodeMeta,
    /// Optional node type
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeId>,
    /// Properties per view
    #[serde(default)]
    pub properties: Properties,
}

/// An edge as returned by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Space
    pub space: String,
    /// External id
    pub external_id: String,
    /// Server metadata
    #[serde(flatten)]
    pub meta: NodeMeta,
    /// Edge type
    #[serde(rename = "type")]
    pub edge_type: NodeId,
    /// Start node
    pub start_node: NodeId,
    /// End node
    pub end_node: NodeId,
    /// Properties per view
    #[serde(default)]
    pub properties: Properties,
}

/// Either kind of instance, tagged by `instanceType`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "instanceType", rename_all = "lowercase")]
pub enum Instance {
    /// A node
    Node(Node),
    /// An edge
    Edge(Edge),
}

/// Property values written through one view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOrEdgeData {
    /// View the properties belong to
    pub source: SourceRef,
    /// Property values
    pub properties: PropertyMap,
}

/// Node upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeApply {
    /// Space
    pub space: String,
    /// External id
    pub external_id: String,
    /// Version the caller expects to overwrite
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_version: Option<i64>,
    /// Optional node type
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeId>,
    /// Property values per view
    #[serde(default)]
    pub sources: Vec<NodeOrEdgeData>,
}

/// Edge upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeApply {
    /// Space
    pub space: String,
    /// External id
    pub external_id: String,
    /// Version the caller expects to overwrite
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_version: Option<i64>,
    /// Edge type
    #[serde(rename = "type")]
    pub edge_type: NodeId,
    /// Start node
    pub start_node: NodeId,
    /// End node
    pub end_node: NodeId,
    /// Property values per view
    #[serde(default)]
    pub sources: Vec<NodeOrEdgeData>,
}

/// One item of an apply request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "instanceType", rename_all = "lowercase")]
pub enum InstanceApply {
    /// Node upsert
    Node(NodeApply),
    /// Edge upsert
    Edge(EdgeApply),
}

/// `POST /models/instances`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    /// Instances to upsert
    pub items: Vec<InstanceApply>,
    /// Create missing edge start nodes
    #[serde(default)]
    pub auto_create_start_nodes: bool,
    /// Create missing edge end nodes
    #[serde(default)]
    pub auto_create_end_nodes: bool,
    /// Skip instead of failing on version conflicts
    #[serde(default)]
    pub skip_on_version_conflict: bool,
    /// Replace all properties of the given views instead of merging
    #[serde(default)]
    pub replace: bool,
}

/// Outcome of one applied instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceResult {
    /// Node or edge
    pub instance_type: InstanceType,
    /// Space
    pub space: String,
    /// External id
    pub external_id: String,
    /// Version after the write
    pub version: i64,
    /// Whether anything changed
    pub was_modified: bool,
    /// Creation time
    pub created_time: i64,
    /// Last update time
    pub last_updated_time: i64,
}

/// Response of an apply request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyResponse {
    /// Results in request order
    pub items: Vec<InstanceResult>,
}

/// Reference to an instance by kind and id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRef {
    /// Node or edge
    pub instance_type: InstanceType,
    /// Space
    pub space: String,
    /// External id
    pub external_id: String,
}

/// `POST /models/instances/delete`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    /// Instances to delete
    pub items: Vec<InstanceRef>,
}

/// Response of a delete request: the instances that were actually deleted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// Deleted instances
    pub items: Vec<InstanceRef>,
}

/// Which view properties to return
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSelector {
    /// View to read through
    pub source: SourceRef,
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first
    #[default]
    Ascending,
    /// Largest first
    Descending,
}

/// Sort specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sort {
    /// Property path
    pub property: Vec<String>,
    /// Direction
    #[serde(default)]
    pub direction: SortDirection,
    /// Nulls before values
    #[serde(default)]
    pub nulls_first: bool,
}

/// `POST /models/instances/list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    /// Node or edge
    pub instance_type: InstanceType,
    /// Views to return properties from
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceSelector>,
    /// Filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    /// Sort order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<Sort>,
    /// Page size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Continuation token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Page of instances
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    /// Instances in this page
    pub items: Vec<Instance>,
    /// Token for the next page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// `POST /models/instances/byids`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrieveRequest {
    /// Instances to fetch
    pub items: Vec<InstanceRef>,
    /// Views to return properties from
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceSelector>,
}

/// `POST /models/instances/search`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// View to search in
    pub view: ViewId,
    /// Free-text query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Node or edge
    pub instance_type: InstanceType,
    /// Properties to search; all text properties when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<String>>,
    /// Filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    /// Maximum number of results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Aggregation to compute over a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Aggregation {
    /// Number of instances with the property set
    Count {
        /// Property name
        property: String,
    },
    /// Sum
    Sum {
        /// Property name
        property: String,
    },
    /// Mean
    Avg {
        /// Property name
        property: String,
    },
    /// Minimum
    Min {
        /// Property name
        property: String,
    },
    /// Maximum
    Max {
        /// Property name
        property: String,
    },
    /// Bucketed counts
    Histogram {
        /// Property name
        property: String,
        /// Bucket width
        interval: f64,
    },
}

/// `POST /models/instances/aggregate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRequest {
    /// View to aggregate over
    pub view: ViewId,
    /// Aggregations to compute
    pub aggregates: Vec<Aggregation>,
    /// Properties to group by
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,
    /// Free-text query narrowing the input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Properties the query applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<String>>,
    /// Node or edge
    pub instance_type: InstanceType,
    /// Filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    /// Maximum number of groups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// One histogram bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Inclusive bucket start
    pub start: f64,
    /// Number of values in the bucket
    pub count: i64,
}

/// Computed aggregate value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "aggregate", rename_all = "camelCase")]
pub enum AggregatedValue {
    /// Count result
    Count {
        /// Property name
        property: String,
        /// Count
        value: i64,
    },
    /// Sum result
    Sum {
        /// Property name
        property: String,
        /// Sum, absent when no values
        value: Option<f64>,
    },
    /// Mean result
    Avg {
        /// Property name
        property: String,
        /// Mean, absent when no values
        value: Option<f64>,
    },
    /// Minimum result
    Min {
        /// Property name
        property: String,
        /// Minimum, absent when no values
        value: Option<f64>,
    },
    /// Maximum result
    Max {
        /// Property name
        property: String,
        /// Maximum, absent when no values
        value: Option<f64>,
    },
    /// Histogram result
    Histogram {
        /// Property name
        property: String,
        /// Bucket width
        interval: f64,
        /// Buckets in ascending order
        buckets: Vec<HistogramBucket>,
    },
}

/// Aggregates of one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateGroup {
    /// Node or edge
    pub instance_type: InstanceType,
    /// Group-by values, absent when not grouping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<PropertyMap>,
    /// Computed aggregates in request order
    pub aggregates: Vec<AggregatedValue>,
}

/// Response of an aggregate request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateResponse {
    /// One entry per group
    pub items: Vec<AggregateGroup>,
}

/// Reference to a property of a view, used by `through`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewPropertyId {
    /// View declaring the property
    pub source: SourceRef,
    /// Property name
    pub identifier: String,
}

/// Which end of an edge set a node step continues from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainTo {
    /// The node the edge was reached from
    Source,
    /// The far end of the edge
    #[default]
    Destination,
}

/// Node result set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExpression {
    /// Result set to continue from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Node filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    /// Direct relation to follow from `from`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub through: Option<ViewPropertyId>,
    /// Direction `through` is followed in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    /// Which end of a `from` edge set to use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_to: Option<ChainTo>,
}

/// Edge result set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeExpression {
    /// Node result set the edges start from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Edge filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    /// Filter on the far node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_filter: Option<Filter>,
    /// Number of hops
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_distance: Option<u32>,
    /// Traversal direction
    #[serde(default)]
    pub direction: Direction,
    /// Which end subsequent steps continue from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_to: Option<ChainTo>,
}

/// Either result-set kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionKind {
    /// Node result set
    Nodes(NodeExpression),
    /// Edge result set
    Edges(EdgeExpression),
}

/// One named result set of a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSetExpression {
    /// Node or edge expression
    #[serde(flatten)]
    pub kind: ExpressionKind,
    /// Page size for this result set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Properties to return from one view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSelectorWithProperties {
    /// View
    pub source: SourceRef,
    /// Property names, `*` for all
    pub properties: Vec<String>,
}

/// What to return for a result set; empty means identifiers only
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Select {
    /// Views and properties
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceSelectorWithProperties>,
}

/// `POST /models/instances/query`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Named result sets
    pub with: BTreeMap<String, ResultSetExpression>,
    /// Selection per result set
    pub select: BTreeMap<String, Select>,
    /// Continuation tokens per result set
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cursors: BTreeMap<String, String>,
}

/// Response of a query request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// Instances per result set
    pub items: BTreeMap<String, Vec<Instance>>,
    /// Tokens for result sets with more data
    #[serde(default)]
    pub next_cursor: BTreeMap<String, String>,
}

impl Node {
    /// Identifier of this node
    pub fn id(&self) -> NodeId {
        NodeId::new(self.space.clone(), self.external_id.clone())
    }

    /// Properties stored through `view`
    pub fn view_properties(&self, view: &ViewId) -> Option<&PropertyMap> {
        self.properties
            .get(&view.space)
            .and_then(|views| views.get(&view.property_key()))
    }
}

impl Edge {
    /// Identifier of this edge
    pub fn id(&self) -> NodeId {
        NodeId::new(self.space.clone(), self.external_id.clone())
    }

    /// Properties stored through `view`
    pub fn view_properties(&self, view: &ViewId) -> Option<&PropertyMap> {
        self.properties
            .get(&view.space)
            .and_then(|views| views.get(&view.property_key()))
    }

    /// The node on the far side when followed in `direction`
    pub fn other_end(&self, direction: Direction) -> &NodeId {
        match direction {
            Direction::Outwards => &self.end_node,
            Direction::Inwards => &self.start_node,
        }
    }

    /// The node on the near side when followed in `direction`
    pub fn near_end(&self, direction: Direction) -> &NodeId {
        match direction {
            Direction::Outwards => &self.start_node,
            Direction::Inwards => &self.end_node,
        }
    }
}

impl Instance {
    /// Identifier of the wrapped node or edge
    pub fn id(&self) -> NodeId {
        match self {
            Instance::Node(node) => node.id(),
            Instance::Edge(edge) => edge.id(),
        }
    }

    /// Node or edge
    pub fn instance_type(&self) -> InstanceType {
        match self {
            Instance::Node(_) => InstanceType::Node,
            Instance::Edge(_) => InstanceType::Edge,
        }
    }

    /// Server metadata
    pub fn meta(&self) -> &NodeMeta {
        match self {
            Instance::Node(node) => &node.meta,
            Instance::Edge(edge) => &edge.meta,
        }
    }

    /// Properties per view
    pub fn properties(&self) -> &Properties {
        match self {
            Instance::Node(node) => &node.properties,
            Instance::Edge(edge) => &edge.properties,
        }
    }
}

impl InstanceApply {
    /// Identifier of the instance being written
    pub fn id(&self) -> NodeId {
        match self {
            InstanceApply::Node(node) => NodeId::new(node.space.clone(), node.external_id.clone()),
            InstanceApply::Edge(edge) => NodeId::new(edge.space.clone(), edge.external_id.clone()),
        }
    }

    /// Node or edge
    pub fn instance_type(&self) -> InstanceType {
        match self {
            InstanceApply::Node(_) => InstanceType::Node,
            InstanceApply::Edge(_) => InstanceType::Edge,
        }
    }
}

impl InstanceRef {
    /// Reference to a node
    pub fn node(id: &NodeId) -> Self {
        Self {
            instance_type: InstanceType::Node,
            space: id.space.clone(),
            external_id: id.external_id.clone(),
        }
    }

    /// Reference to an edge
    pub fn edge(id: &NodeId) -> Self {
        Self {
            instance_type: InstanceType::Edge,
            ..Self::node(id)
        }
    }

    /// Identifier without the kind
    pub fn id(&self) -> NodeId {
        NodeId::new(self.space.clone(), self.external_id.clone())
    }
}

impl SourceSelector {
    /// Select properties of `view`
    pub fn view(view: &ViewId) -> Self {
        Self {
            source: SourceRef::View(view.clone()),
        }
    }
}

impl Select {
    /// Select all properties of `view`
    pub fn all_of(view: &ViewId) -> Self {
        Self {
            sources: vec![SourceSelectorWithProperties {
                source: SourceRef::View(view.clone()),
                properties: vec!["*".to_string()],
            }],
        }
    }

    /// Identifiers only
    pub fn ids_only() -> Self {
        Self::default()
    }
}

impl Aggregation {
    /// Property the aggregation reads
    pub fn property(&self) -> &str {
        match self {
            Aggregation::Count { property }
            | Aggregation::Sum { property }
            | Aggregation::Avg { property }
            | Aggregation::Min { property }
            | Aggregation::Max { property }
            | Aggregation::Histogram { property, .. } => property,
        }
    }
}
