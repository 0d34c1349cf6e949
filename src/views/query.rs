//! Graph traversal queries
//!
//! A [`QueryBuilder`] holds named result-set steps and only ever grows.
//! [`QueryApi`] is a typed cursor into a builder: every traversal appends
//! steps and returns an API scoped to the destination entity.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::marker::PhantomData;
use tracing::debug;

use crate::core::error::{Error, Result};
use crate::core::types::{Direction, NodeId};
use crate::filter::{edge_attribute, reference_value, Filter, SourceRef, ViewFilter};
use crate::instances::types::{
    ChainTo, Edge, EdgeExpression, ExpressionKind, Instance, NodeExpression, QueryRequest,
    ResultSetExpression, Select, ViewPropertyId,
};
use crate::instances::Instances;
use crate::model::{decode_instance, EdgeSpec, Entity, EntityList, FieldKind, FieldSpec};

/// Page size requested per step and round-trip
pub const QUERY_PAGE_SIZE: usize = 1000;

/// One named result set plus its runtime state
#[derive(Debug, Clone, PartialEq)]
pub struct QueryStep {
    /// Unique step name, `"{hint}_{index}"`
    pub name: String,
    /// What the step selects
    pub expression: ResultSetExpression,
    /// Which properties to return
    pub select: Select,
    /// Stop collecting after this many instances
    pub max_retrieve_limit: Option<usize>,
    /// Edge field this step materializes, for edge steps
    pub field: Option<&'static str>,
    /// Cursor that fetched the current page; `None` for the first page
    pub page_cursor: Option<String>,
    /// Page size the current page was fetched with
    pub page_limit: usize,
    /// Continuation after the current page
    pub cursor: Option<String>,
    /// Collected instances, unique by id
    pub results: Vec<Instance>,
}

impl QueryStep {
    fn is_full(&self) -> bool {
        self.max_retrieve_limit
            .map_or(false, |limit| self.results.len() >= limit)
    }

    fn has_more(&self) -> bool {
        self.cursor.is_some() && !self.is_full()
    }

    fn fresh_limit(&self) -> usize {
        self.max_retrieve_limit
            .map(|limit| limit.saturating_sub(self.results.len()))
            .map_or(QUERY_PAGE_SIZE, |remaining| remaining.clamp(1, QUERY_PAGE_SIZE))
    }

    /// Go back to the first page, as after the step it continues from moved on
    fn restart(&mut self) {
        self.page_cursor = None;
        self.cursor = None;
        self.page_limit = self.fresh_limit();
    }

    /// Move to the page after the current one
    fn advance(&mut self) {
        self.page_cursor = self.cursor.take();
        self.page_limit = self.fresh_limit();
    }

    fn from(&self) -> Option<&str> {
        match &self.expression.kind {
            ExpressionKind::Nodes(nodes) => nodes.from.as_deref(),
            ExpressionKind::Edges(edges) => edges.from.as_deref(),
        }
    }
}

/// Append-only list of query steps
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBuilder {
    steps: Vec<QueryStep>,
}

impl QueryBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// No steps yet
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps in order
    pub fn steps(&self) -> &[QueryStep] {
        &self.steps
    }

    /// Name for the next step
    pub fn next_name(&self, hint: &str) -> String {
        format!("{}_{}", hint, self.steps.len())
    }

    /// Append a step
    pub fn push(
        &mut self,
        name: String,
        kind: ExpressionKind,
        select: Select,
        max_retrieve_limit: Option<usize>,
        field: Option<&'static str>,
    ) {
        self.steps.push(QueryStep {
            name,
            expression: ResultSetExpression { kind, limit: None },
            select,
            max_retrieve_limit,
            field,
            page_cursor: None,
            page_limit: QUERY_PAGE_SIZE,
            cursor: None,
            results: Vec::new(),
        });
    }

    /// Every step at its current page
    fn build_request(&self) -> QueryRequest {
        let mut request = QueryRequest::default();
        for step in &self.steps {
            let mut expression = step.expression.clone();
            expression.limit = Some(step.page_limit);
            request.with.insert(step.name.clone(), expression);
            request.select.insert(step.name.clone(), step.select.clone());
            if let Some(cursor) = &step.page_cursor {
                request.cursors.insert(step.name.clone(), cursor.clone());
            }
        }
        request
    }

    /// Indices of the steps whose `from` chain leads to step `index`
    fn dependents(&self, index: usize) -> Vec<usize> {
        let mut below = vec![false; self.steps.len()];
        below[index] = true;
        let mut out = Vec::new();
        for later in index + 1..self.steps.len() {
            let parent = self.steps[later]
                .from()
                .and_then(|from| self.steps[..later].iter().position(|s| s.name == from));
            if parent.map_or(false, |parent| below[parent]) {
                below[later] = true;
                out.push(later);
            }
        }
        out
    }

    /// Run the steps, following cursors until every step is exhausted or full
    ///
    /// Steps only continue from earlier steps. The latest step with a
    /// continuation is advanced first; the steps depending on it start over
    /// against its new page while every other step repeats its current page.
    pub fn execute(&mut self, instances: &Instances) -> Result<QueryResult> {
        if self.steps.is_empty() {
            return Ok(QueryResult::default());
        }

        for step in &mut self.steps {
            step.results.clear();
            step.restart();
        }
        let mut seen: Vec<HashSet<NodeId>> = vec![HashSet::new(); self.steps.len()];
        let mut fetched: Vec<usize> = (0..self.steps.len()).collect();
        let mut rounds = 0usize;
        loop {
            let mut response = instances.query(&self.build_request())?;
            rounds += 1;

            for &index in &fetched {
                let step = &mut self.steps[index];
                for instance in response.items.remove(&step.name).unwrap_or_default() {
                    if step.is_full() {
                        break;
                    }
                    if seen[index].insert(instance.id()) {
                        step.results.push(instance);
                    }
                }
                let next = response.next_cursor.remove(&step.name);
                // A repeated cursor would loop forever.
                step.cursor = next.filter(|next| step.page_cursor.as_ref() != Some(next));
            }

            let Some(target) = (0..self.steps.len()).rev().find(|&i| self.steps[i].has_more()) else {
                break;
            };
            self.steps[target].advance();
            let dependents = self.dependents(target);
            for &index in &dependents {
                self.steps[index].restart();
            }
            fetched = std::iter::once(target).chain(dependents).collect();
        }

        debug!(
            steps = self.steps.len(),
            rounds,
            results = self.steps.iter().map(|s| s.results.len()).sum::<usize>(),
            "query finished"
        );
        Ok(QueryResult {
            steps: self
                .steps
                .iter()
                .map(|s| (s.name.clone(), s.results.clone()))
                .collect(),
        })
    }
}

/// Instances per step of an executed query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    steps: BTreeMap<String, Vec<Instance>>,
}

impl QueryResult {
    /// Instances of one step
    pub fn get(&self, step: &str) -> &[Instance] {
        self.steps.get(step).map(Vec::as_slice).unwrap_or_default()
    }

    /// Edges of one step
    pub fn edges(&self, step: &str) -> Vec<&Edge> {
        self.get(step)
            .iter()
            .filter_map(|i| match i {
                Instance::Edge(edge) => Some(edge),
                Instance::Node(_) => None,
            })
            .collect()
    }

    /// Step names
    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.keys().map(String::as_str)
    }

    /// Total number of instances
    pub fn len(&self) -> usize {
        self.steps.values().map(Vec::len).sum()
    }

    /// No instances at all
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Typed position in a query
pub struct QueryApi<E: Entity> {
    instances: Instances,
    builder: QueryBuilder,
    current: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> std::fmt::Debug for QueryApi<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryApi")
            .field("view", &E::spec().view)
            .field("current", &self.current)
            .field("steps", &self.builder.len())
            .finish()
    }
}

fn hint(view_external_id: &str) -> String {
    view_external_id.to_lowercase()
}

impl<E: Entity> QueryApi<E> {
    /// Query starting at nodes of `E` matching `filter`
    pub fn new(instances: Instances, filter: Option<Filter>, limit: Option<usize>) -> Self {
        let view = &E::spec().view;
        let mut builder = QueryBuilder::new();
        let name = builder.next_name(&hint(&view.external_id));
        builder.push(
            name.clone(),
            ExpressionKind::Nodes(NodeExpression {
                filter: Filter::and_opt(Some(Filter::has_data(view)), filter),
                ..NodeExpression::default()
            }),
            Select::all_of(view),
            limit,
            None,
        );
        Self {
            instances,
            builder,
            current: name,
            _entity: PhantomData,
        }
    }

    /// Number of steps so far
    pub fn step_count(&self) -> usize {
        self.builder.len()
    }

    /// Name of the step holding `E` nodes
    pub fn current_step(&self) -> &str {
        &self.current
    }

    /// The accumulated steps
    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    /// Append a step with the edges of one of `E`'s edge fields, starting at the current step
    fn push_edge_step(&mut self, field: &'static FieldSpec, edge_spec: &'static EdgeSpec) -> String {
        let name = self.builder.next_name(field.name);
        let select = edge_spec
            .properties
            .as_ref()
            .map(Select::all_of)
            .unwrap_or_else(Select::ids_only);
        self.builder.push(
            name.clone(),
            ExpressionKind::Edges(EdgeExpression {
                from: Some(self.current.clone()),
                filter: Some(Filter::equals(
                    edge_attribute("type"),
                    reference_value(&E::spec().edge_type(edge_spec)),
                )),
                node_filter: None,
                max_distance: Some(1),
                direction: edge_spec.direction,
                chain_to: Some(ChainTo::Destination),
            }),
            select,
            None,
            Some(field.name),
        );
        name
    }

    /// Follow a relation field to entities of type `T`
    pub fn traverse<T: Entity>(
        mut self,
        property: &str,
        filter: &T::Filter,
        limit: Option<usize>,
    ) -> Result<QueryApi<T>> {
        let spec = E::spec();
        let field = spec.field(property).ok_or_else(|| {
            Error::validation(format!("{} has no field '{}'", spec.view, property))
        })?;
        let target = &T::spec().view;
        let scalar = || {
            Error::type_mismatch(
                format!("relation field on {}", spec.view),
                format!("scalar '{}'", property),
            )
        };
        if let FieldKind::Scalar = field.kind {
            return Err(scalar());
        }
        if !field.targets().contains(target) {
            let expected: Vec<String> = field.targets().iter().map(ToString::to_string).collect();
            return Err(Error::type_mismatch(expected.join(" | "), target.to_string()));
        }

        let node_filter = Filter::and_opt(Some(Filter::has_data(target)), filter.build(target));
        let node_from = match &field.kind {
            FieldKind::Edge(edge_spec) => {
                let edge_name = self.push_edge_step(field, edge_spec);
                NodeExpression {
                    from: Some(edge_name),
                    filter: node_filter,
                    chain_to: Some(ChainTo::Destination),
                    ..NodeExpression::default()
                }
            }
            FieldKind::Direct { .. } => NodeExpression {
                from: Some(self.current.clone()),
                filter: node_filter,
                through: Some(ViewPropertyId {
                    source: SourceRef::View(spec.view.clone()),
                    identifier: field.name.to_string(),
                }),
                direction: Some(Direction::Outwards),
                ..NodeExpression::default()
            },
            FieldKind::Scalar => return Err(scalar()),
        };

        let name = self.builder.next_name(&hint(&target.external_id));
        self.builder.push(
            name.clone(),
            ExpressionKind::Nodes(node_from),
            Select::all_of(target),
            limit,
            None,
        );
        Ok(QueryApi {
            instances: self.instances,
            builder: self.builder,
            current: name,
            _entity: PhantomData,
        })
    }

    /// Run every step
    pub fn execute(mut self) -> Result<QueryResult> {
        self.builder.execute(&self.instances)
    }

    /// Run every step and decode the current one, filling edge fields
    /// from edge steps that start at it
    pub fn list(mut self) -> Result<EntityList<E>> {
        for (field, edge_spec) in E::spec().edge_fields() {
            self.push_edge_step(field, edge_spec);
        }
        let result = self.builder.execute(&self.instances)?;
        let mut entities = result
            .get(&self.current)
            .iter()
            .map(decode_instance::<E>)
            .collect::<Result<Vec<_>>>()?;

        for step in self.builder.steps() {
            let (Some(field), Some(from)) = (step.field, step.from()) else {
                continue;
            };
            if from != self.current {
                continue;
            }
            let direction = match &step.expression.kind {
                ExpressionKind::Edges(edges) => edges.direction,
                ExpressionKind::Nodes(_) => continue,
            };
            let mut grouped: HashMap<NodeId, Vec<Edge>> = HashMap::new();
            for edge in result.edges(&step.name) {
                grouped
                    .entry(edge.near_end(direction).clone())
                    .or_default()
                    .push(edge.clone());
            }
            for entity in &mut entities {
                let edges = grouped.remove(entity.id()).unwrap_or_default();
                entity.attach_edges(field, &edges)?;
            }
        }

        Ok(EntityList::new(entities))
    }
}
