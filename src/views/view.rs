//! Per-view API facade

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;

use super::query::QueryApi;
use crate::core::error::Result;
use crate::core::types::{Direction, InstanceType, NodeId, ViewId};
use crate::filter::{edge_attribute, reference_value, Filter, ViewFilter};
use crate::instances::types::{
    AggregateGroup, AggregateRequest, AggregatedValue, Aggregation, Edge, HistogramBucket,
    Instance, InstanceRef, SearchRequest, Sort, SortDirection, SourceSelector,
};
use crate::instances::{Instances, ResourcesWrite, ResourcesWriteResult, MAX_WRITE_ITEMS};
use crate::model::{decode_instance, ApplyOptions, Entity, EntityList, WriteCache, WriteEntity};

/// Default number of entities returned by `list`
pub const DEFAULT_LIMIT_READ: usize = 25;

/// Options for [`ViewApi::list_with`]
#[derive(Debug, Clone, PartialEq)]
pub struct ListOptions {
    /// Maximum number of entities; `None` lists everything
    pub limit: Option<usize>,
    /// Property to sort by
    pub sort_by: Option<String>,
    /// Sort direction
    pub direction: SortDirection,
    /// Fill edge fields after listing
    pub retrieve_edges: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            limit: Some(DEFAULT_LIMIT_READ),
            sort_by: None,
            direction: SortDirection::Ascending,
            retrieve_edges: true,
        }
    }
}

impl ListOptions {
    /// No limit
    pub fn all() -> Self {
        Self {
            limit: None,
            ..Self::default()
        }
    }

    /// Sort by a property
    pub fn sort_by(mut self, property: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_by = Some(property.into());
        self.direction = direction;
        self
    }
}

/// Typed access to one view
pub struct ViewApi<E: Entity> {
    instances: Instances,
    space: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for ViewApi<E> {
    fn clone(&self) -> Self {
        Self {
            instances: self.instances.clone(),
            space: self.space.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> fmt::Debug for ViewApi<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewApi")
            .field("view", &E::spec().view)
            .field("space", &self.space)
            .finish()
    }
}

impl<E: Entity> ViewApi<E> {
    /// Access `E` in the given instance space
    pub fn new(instances: Instances, space: impl Into<String>) -> Self {
        Self {
            instances,
            space: space.into(),
            _entity: PhantomData,
        }
    }

    /// Same view, another instance space
    pub fn in_space(&self, space: impl Into<String>) -> Self {
        Self::new(self.instances.clone(), space)
    }

    /// The view
    pub fn view(&self) -> &'static ViewId {
        &E::spec().view
    }

    /// Default instance space for external ids
    pub fn space(&self) -> &str {
        &self.space
    }

    fn node_id(&self, external_id: &str) -> NodeId {
        NodeId::new(self.space.clone(), external_id)
    }

    fn sources(&self) -> Vec<SourceSelector> {
        vec![SourceSelector::view(self.view())]
    }

    fn view_filter(&self, filter: &E::Filter) -> Option<Filter> {
        Filter::and_opt(Some(Filter::has_data(self.view())), filter.build(self.view()))
    }

    fn decode(&self, items: &[Instance]) -> Result<EntityList<E>> {
        items.iter().map(decode_instance::<E>).collect::<Result<Vec<_>>>().map(EntityList::new)
    }

    /// Entities matching `filter`; `None` lists everything
    pub fn list(&self, filter: &E::Filter, limit: Option<usize>) -> Result<EntityList<E>> {
        self.list_with(
            filter,
            ListOptions {
                limit,
                ..ListOptions::default()
            },
        )
    }

    /// Entities matching `filter`, with sorting and edge options
    pub fn list_with(&self, filter: &E::Filter, options: ListOptions) -> Result<EntityList<E>> {
        let sort = match &options.sort_by {
            Some(property) => {
                E::spec().check_property(property)?;
                vec![Sort {
                    property: self.view().property_ref(property),
                    direction: options.direction,
                    nulls_first: false,
                }]
            }
            None => Vec::new(),
        };

        let items = self.instances.list(
            InstanceType::Node,
            self.sources(),
            self.view_filter(filter),
            sort,
            options.limit,
        )?;
        let mut entities = self.decode(&items)?.into_vec();
        if options.retrieve_edges {
            self.attach_edges(&mut entities)?;
        }
        debug!(view = %self.view(), count = entities.len(), "listed");
        Ok(EntityList::new(entities))
    }

    /// One entity by external id in the default space
    pub fn retrieve(&self, external_id: &str) -> Result<Option<E>> {
        Ok(self
            .retrieve_ids(&[self.node_id(external_id)])?
            .into_iter()
            .next())
    }

    /// Entities by external id in the default space; unknown ids are skipped
    pub fn retrieve_many(&self, external_ids: &[&str]) -> Result<EntityList<E>> {
        let ids: Vec<NodeId> = external_ids.iter().map(|xid| self.node_id(xid)).collect();
        self.retrieve_ids(&ids)
    }

    /// Entities by full identifier; unknown ids and nodes without data in the view are skipped
    pub fn retrieve_ids(&self, ids: &[NodeId]) -> Result<EntityList<E>> {
        let items = self
            .instances
            .retrieve(ids, InstanceType::Node, self.sources())?;
        let view = self.view();
        let mut entities = Vec::with_capacity(items.len());
        for item in &items {
            if let Instance::Node(node) = item {
                if node.view_properties(view).is_none() {
                    continue;
                }
            }
            entities.push(decode_instance::<E>(item)?);
        }
        self.attach_edges(&mut entities)?;
        Ok(EntityList::new(entities))
    }

    /// Upsert one entity together with its nested entities and edges
    pub fn apply(&self, item: &E::Write, options: ApplyOptions) -> Result<ResourcesWriteResult> {
        self.apply_many(std::slice::from_ref(item), options)
    }

    /// Upsert several entities as one logical write
    pub fn apply_many(&self, items: &[E::Write], options: ApplyOptions) -> Result<ResourcesWriteResult> {
        let mut cache = WriteCache::new();
        let mut write = ResourcesWrite::default();
        for item in items {
            write.extend(item.to_instances_write(&mut cache, options.write_options())?);
        }
        debug!(view = %self.view(), nodes = write.nodes.len(), edges = write.edges.len(), "applying");
        self.instances.apply(write, options.replace)
    }

    /// Delete by external id in the default space; returns the deleted ids
    pub fn delete(&self, external_ids: &[&str]) -> Result<Vec<NodeId>> {
        let ids: Vec<NodeId> = external_ids.iter().map(|xid| self.node_id(xid)).collect();
        self.delete_ids(&ids)
    }

    /// Delete by full identifier; missing ids are ignored
    pub fn delete_ids(&self, ids: &[NodeId]) -> Result<Vec<NodeId>> {
        let deleted = self
            .instances
            .delete(ids.iter().map(InstanceRef::node).collect())?;
        Ok(deleted.iter().map(InstanceRef::id).collect())
    }

    /// Free-text search, optionally restricted to some properties
    pub fn search(
        &self,
        query: &str,
        properties: Option<&[&str]>,
        filter: &E::Filter,
        limit: Option<usize>,
    ) -> Result<EntityList<E>> {
        let properties = self.checked_properties(properties)?;
        let response = self.instances.search(&SearchRequest {
            view: self.view().clone(),
            query: Some(query.to_string()),
            instance_type: InstanceType::Node,
            properties,
            filter: filter.build(self.view()),
            limit: Some(limit.unwrap_or(DEFAULT_LIMIT_READ)),
        })?;
        self.decode(&response.items)
    }

    fn checked_properties(&self, properties: Option<&[&str]>) -> Result<Option<Vec<String>>> {
        properties
            .map(|names| {
                names
                    .iter()
                    .map(|name| E::spec().check_property(name).map(|f| f.name.to_string()))
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()
    }

    /// Aggregates over entities matching `filter`, optionally grouped
    pub fn aggregate(
        &self,
        aggregates: &[Aggregation],
        group_by: &[&str],
        filter: &E::Filter,
    ) -> Result<Vec<AggregateGroup>> {
        for aggregation in aggregates {
            E::spec().check_property(aggregation.property())?;
        }
        let group_by = self.checked_properties(Some(group_by))?.unwrap_or_default();
        let response = self.instances.aggregate(&AggregateRequest {
            view: self.view().clone(),
            aggregates: aggregates.to_vec(),
            group_by,
            query: None,
            properties: None,
            instance_type: InstanceType::Node,
            filter: filter.build(self.view()),
            limit: None,
        })?;
        Ok(response.items)
    }

    /// Histogram of a numeric property
    pub fn histogram(&self, property: &str, interval: f64, filter: &E::Filter) -> Result<Vec<HistogramBucket>> {
        let groups = self.aggregate(
            &[Aggregation::Histogram {
                property: property.to_string(),
                interval,
            }],
            &[],
            filter,
        )?;
        Ok(groups
            .into_iter()
            .flat_map(|group| group.aggregates)
            .find_map(|value| match value {
                AggregatedValue::Histogram { buckets, .. } => Some(buckets),
                _ => None,
            })
            .unwrap_or_default())
    }

    /// Start a graph query at entities matching `filter`
    pub fn query(&self, filter: &E::Filter, limit: Option<usize>) -> QueryApi<E> {
        QueryApi::new(
            self.instances.clone(),
            filter.build(self.view()),
            Some(limit.unwrap_or(DEFAULT_LIMIT_READ)),
        )
    }

    /// List the edges of every edge field and hand them to the entities
    fn attach_edges(&self, entities: &mut [E]) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }
        let spec = E::spec();
        for (field, edge_spec) in spec.edge_fields() {
            let near = match edge_spec.direction {
                Direction::Outwards => "startNode",
                Direction::Inwards => "endNode",
            };
            let sources = edge_spec
                .properties
                .iter()
                .map(SourceSelector::view)
                .collect::<Vec<_>>();

            let mut grouped: HashMap<NodeId, Vec<Edge>> = HashMap::new();
            for chunk in entities.chunks(MAX_WRITE_ITEMS) {
                let filter = Filter::And(vec![
                    Filter::equals(edge_attribute("type"), reference_value(&spec.edge_type(edge_spec))),
                    Filter::one_of(
                        edge_attribute(near),
                        chunk.iter().map(|e| reference_value(e.id())).collect(),
                    ),
                ]);
                let edges = self
                    .instances
                    .list(InstanceType::Edge, sources.clone(), Some(filter), Vec::new(), None)?;
                for instance in edges {
                    if let Instance::Edge(edge) = instance {
                        grouped
                            .entry(edge.near_end(edge_spec.direction).clone())
                            .or_default()
                            .push(edge);
                    }
                }
            }

            for entity in entities.iter_mut() {
                let edges = grouped.remove(entity.id()).unwrap_or_default();
                entity.attach_edges(field.name, &edges)?;
            }
        }
        Ok(())
    }
}
