//! Filter expressions
//!
//! [`Filter`] mirrors the service's filter tree on the wire. Entity filter
//! structs turn their optional criteria into a tree with [`FilterBuilder`]:
//! every supplied criterion contributes one predicate and all predicates are
//! ANDed. No criteria means no filter at all.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::types::{Match, NodeId, StrMatch, ViewId};

/// Property path, e.g. `["node", "externalId"]` or `[space, "View/1", "name"]`
pub type PropertyPath = Vec<String>;

/// Filter expression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Filter {
    /// All sub-filters match
    And(Vec<Filter>),
    /// At least one sub-filter matches
    Or(Vec<Filter>),
    /// The sub-filter does not match
    Not(Box<Filter>),
    /// Property equals value
    Equals {
        /// Property path
        property: PropertyPath,
        /// Expected value
        value: Value,
    },
    /// Property equals one of the values
    In {
        /// Property path
        property: PropertyPath,
        /// Candidate values
        values: Vec<Value>,
    },
    /// String property starts with value
    Prefix {
        /// Property path
        property: PropertyPath,
        /// Prefix
        value: Value,
    },
    /// Property within bounds
    Range {
        /// Property path
        property: PropertyPath,
        /// Exclusive lower bound
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gt: Option<Value>,
        /// Inclusive lower bound
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gte: Option<Value>,
        /// Exclusive upper bound
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lt: Option<Value>,
        /// Inclusive upper bound
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lte: Option<Value>,
    },
    /// Property is set and not null
    Exists {
        /// Property path
        property: PropertyPath,
    },
    /// List property contains any of the values
    ContainsAny {
        /// Property path
        property: PropertyPath,
        /// Candidate values
        values: Vec<Value>,
    },
    /// List property contains all of the values
    ContainsAll {
        /// Property path
        property: PropertyPath,
        /// Required values
        values: Vec<Value>,
    },
    /// Instance has data in at least one of the views
    HasData(Vec<SourceRef>),
    /// Matches everything
    MatchAll {},
}

/// Reference to a property source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceRef {
    /// A view
    View(ViewId),
}

/// Path to an instance's space
pub fn node_space() -> PropertyPath {
    vec!["node".into(), "space".into()]
}

/// Path to an instance's external id
pub fn node_external_id() -> PropertyPath {
    vec!["node".into(), "externalId".into()]
}

/// Path to an edge attribute (`type`, `startNode`, `endNode`)
pub fn edge_attribute(name: &str) -> PropertyPath {
    vec!["edge".into(), name.into()]
}

/// Direct relation value as stored on the wire
pub fn reference_value(id: &NodeId) -> Value {
    serde_json::json!({ "space": id.space, "externalId": id.external_id })
}

impl Filter {
    /// `HasData` for one view
    pub fn has_data(view: &ViewId) -> Self {
        Filter::HasData(vec![SourceRef::View(view.clone())])
    }

    /// Equality on an arbitrary path
    pub fn equals(property: PropertyPath, value: impl Into<Value>) -> Self {
        Filter::Equals {
            property,
            value: value.into(),
        }
    }

    /// Membership on an arbitrary path
    pub fn one_of(property: PropertyPath, values: Vec<Value>) -> Self {
        Filter::In { property, values }
    }

    /// AND two filters, flattening nested `And`s and skipping absent ones
    pub fn and_opt(left: Option<Filter>, right: Option<Filter>) -> Option<Filter> {
        let mut parts = Vec::new();
        for filter in [left, right].into_iter().flatten() {
            match filter {
                Filter::And(inner) => parts.extend(inner),
                other => parts.push(other),
            }
        }
        combine(parts)
    }
}

impl From<ViewId> for SourceRef {
    fn from(view: ViewId) -> Self {
        SourceRef::View(view)
    }
}

fn combine(mut filters: Vec<Filter>) -> Option<Filter> {
    match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(Filter::And(filters)),
    }
}

/// Criteria shared by every entity filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommonFilter {
    /// External id starts with
    pub external_id_prefix: Option<String>,
    /// Instance space equals / is one of
    pub space: Option<StrMatch>,
    /// Extra filter ANDed in as-is
    pub filter: Option<Filter>,
}

/// Entity-specific criteria that can be turned into a filter tree
pub trait ViewFilter: Default + Clone + Send + Sync {
    /// Build the filter for `view`; `None` when no criterion is set
    fn build(&self, view: &ViewId) -> Option<Filter>;
}

/// Accumulates predicates against one view
#[derive(Debug, Clone)]
pub struct FilterBuilder<'v> {
    view: &'v ViewId,
    filters: Vec<Filter>,
}

impl<'v> FilterBuilder<'v> {
    /// Start an empty builder
    pub fn new(view: &'v ViewId) -> Self {
        Self {
            view,
            filters: Vec::new(),
        }
    }

    /// Number of predicates collected so far
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// No predicate collected
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// `Equals` for one value, `In` for many; an empty list adds nothing
    pub fn matches<T>(mut self, property: &str, criterion: Option<&Match<T>>) -> Self
    where
        T: Clone + Into<Value>,
    {
        let path = self.view.property_ref(property);
        match criterion {
            Some(Match::One(value)) => self.filters.push(Filter::equals(path, value.clone())),
            Some(Match::Many(values)) if !values.is_empty() => self
                .filters
                .push(Filter::one_of(path, values.iter().cloned().map(Into::into).collect())),
            _ => {}
        }
        self
    }

    /// `Equals` on a scalar value
    pub fn equals<T: Into<Value>>(mut self, property: &str, value: Option<T>) -> Self {
        if let Some(value) = value {
            self.filters
                .push(Filter::equals(self.view.property_ref(property), value));
        }
        self
    }

    /// `Prefix` on a string property
    pub fn prefix(mut self, property: &str, prefix: Option<&str>) -> Self {
        if let Some(prefix) = prefix {
            self.filters.push(Filter::Prefix {
                property: self.view.property_ref(property),
                value: Value::from(prefix),
            });
        }
        self
    }

    /// Inclusive `Range`, added when either bound is present
    pub fn range<T: Into<Value>>(mut self, property: &str, min: Option<T>, max: Option<T>) -> Self {
        if min.is_some() || max.is_some() {
            self.filters.push(Filter::Range {
                property: self.view.property_ref(property),
                gt: None,
                gte: min.map(Into::into),
                lt: None,
                lte: max.map(Into::into),
            });
        }
        self
    }

    /// Direct relation equals / is one of; an empty list adds nothing
    pub fn reference(mut self, property: &str, target: Option<&Match<NodeId>>) -> Self {
        let path = self.view.property_ref(property);
        match target {
            Some(Match::One(id)) => self.filters.push(Filter::equals(path, reference_value(id))),
            Some(Match::Many(ids)) if !ids.is_empty() => self
                .filters
                .push(Filter::one_of(path, ids.iter().map(reference_value).collect())),
            _ => {}
        }
        self
    }

    /// External id prefix, space and raw filter
    pub fn common(mut self, common: &CommonFilter) -> Self {
        if let Some(prefix) = &common.external_id_prefix {
            self.filters.push(Filter::Prefix {
                property: node_external_id(),
                value: Value::from(prefix.as_str()),
            });
        }
        match &common.space {
            Some(Match::One(space)) => {
                self.filters.push(Filter::equals(node_space(), space.as_str()));
            }
            Some(Match::Many(spaces)) if !spaces.is_empty() => {
                self.filters.push(Filter::one_of(
                    node_space(),
                    spaces.iter().map(|s| Value::from(s.as_str())).collect(),
                ));
            }
            _ => {}
        }
        if let Some(filter) = &common.filter {
            self.filters.push(filter.clone());
        }
        self
    }

    /// The combined filter, or `None` if nothing was added
    pub fn build(self) -> Option<Filter> {
        combine(self.filters)
    }
}
