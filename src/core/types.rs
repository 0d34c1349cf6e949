//! Identifier and metadata types shared by every layer
//!
//! Nodes and edges are both addressed by a `(space, external_id)` pair. Views
//! add a version and are used to scope property references and filters.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a node or edge within a space
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeId {
    /// Tenant partition the instance lives in
    pub space: String,
    /// User-assigned identifier, unique within the space
    pub external_id: String,
}

/// Edges are addressed exactly like nodes
pub type EdgeId = NodeId;

/// Reference to a versioned view
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewId {
    /// Space the view is defined in
    pub space: String,
    /// Name of the view
    pub external_id: String,
    /// View version
    pub version: String,
}

/// The two instance kinds of the graph model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceType {
    /// A node
    Node,
    /// An edge
    Edge,
}

/// Direction an edge or direct relation is followed in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// From the declaring entity to the related one
    #[default]
    Outwards,
    /// From the related entity back to the declaring one
    Inwards,
}

/// Server-assigned metadata carried by every read instance
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMeta {
    /// Optimistic-concurrency token
    pub version: i64,
    /// Creation time in milliseconds since epoch
    pub created_time: i64,
    /// Last update time in milliseconds since epoch
    pub last_updated_time: i64,
    /// Soft-delete time, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_time: Option<i64>,
}

/// A criterion that is either a single value or a list of alternatives
#[derive(Clone, Debug, PartialEq)]
pub enum Match<T> {
    /// Exactly this value
    One(T),
    /// Any of these values
    Many(Vec<T>),
}

/// Textual criterion
pub type StrMatch = Match<String>;

impl NodeId {
    /// Create a new identifier
    pub fn new(space: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            space: space.into(),
            external_id: external_id.into(),
        }
    }

    /// Both parts are non-empty
    pub fn is_valid(&self) -> bool {
        !self.space.is_empty() && !self.external_id.is_empty()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.space, self.external_id)
    }
}

impl<S: Into<String>, X: Into<String>> From<(S, X)> for NodeId {
    fn from((space, external_id): (S, X)) -> Self {
        Self::new(space, external_id)
    }
}

impl ViewId {
    /// Create a new view reference
    pub fn new(
        space: impl Into<String>,
        external_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            space: space.into(),
            external_id: external_id.into(),
            version: version.into(),
        }
    }

    /// Key under which the view's properties are nested in a node's property map
    pub fn property_key(&self) -> String {
        format!("{}/{}", self.external_id, self.version)
    }

    /// Full property path `[space, "externalId/version", property]`
    pub fn property_ref(&self, property: &str) -> Vec<String> {
        vec![self.space.clone(), self.property_key(), property.to_string()]
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.space, self.external_id, self.version)
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceType::Node => f.write_str("node"),
            InstanceType::Edge => f.write_str("edge"),
        }
    }
}

impl NodeMeta {
    /// Creation time as a UTC timestamp
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.created_time).single()
    }

    /// Last update time as a UTC timestamp
    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.last_updated_time).single()
    }

    /// Whether the instance has been soft-deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted_time.is_some()
    }
}

impl<T> Match<T> {
    /// All values as a slice-like vector of references
    pub fn values(&self) -> Vec<&T> {
        match self {
            Match::One(value) => vec![value],
            Match::Many(values) => values.iter().collect(),
        }
    }
}

impl From<&str> for Match<String> {
    fn from(value: &str) -> Self {
        Match::One(value.to_string())
    }
}

impl From<String> for Match<String> {
    fn from(value: String) -> Self {
        Match::One(value)
    }
}

impl From<Vec<&str>> for Match<String> {
    fn from(values: Vec<&str>) -> Self {
        Match::Many(values.into_iter().map(str::to_string).collect())
    }
}

impl From<NodeId> for Match<NodeId> {
    fn from(value: NodeId) -> Self {
        Match::One(value)
    }
}

impl From<Vec<NodeId>> for Match<NodeId> {
    fn from(values: Vec<NodeId>) -> Self {
        Match::Many(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_wire_format() {
        let id = NodeId::new("movies", "person:quentin_tarantino");
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"space": "movies", "externalId": "person:quentin_tarantino"})
        );
        assert_eq!(id.to_string(), "movies/person:quentin_tarantino");
    }

    #[test]
    fn test_view_property_ref() {
        let view = ViewId::new("movies", "Person", "2");
        assert_eq!(view.property_key(), "Person/2");
        assert_eq!(view.property_ref("name"), vec!["movies", "Person/2", "name"]);
    }

    #[test]
    fn test_meta_timestamps() {
        let meta = NodeMeta {
            version: 1,
            created_time: 1_700_000_000_000,
            last_updated_time: 1_700_000_000_000,
            deleted_time: None,
        };
        assert_eq!(meta.created_at().unwrap().timestamp(), 1_700_000_000);
        assert!(!meta.is_deleted());
    }
}
