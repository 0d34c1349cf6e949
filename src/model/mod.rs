//! Schema-parameterized entity model
//!
//! Every domain type is a thin declaration over this module:
//!
//! - a static [`ViewSpec`] naming the view, its properties and its edges,
//! - a serde read struct implementing [`Entity`],
//! - a write struct implementing [`WriteEntity`],
//! - a filter struct implementing [`ViewFilter`](crate::filter::ViewFilter).
//!
//! Writes expand recursively into flat node and edge batches with
//! [`write_graph`], guarded by a caller-owned [`WriteCache`].

pub mod list;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::core::error::{Error, Result};
use crate::core::types::{Direction, NodeId, NodeMeta, ViewId};
use crate::filter::{reference_value, SourceRef, ViewFilter};
use crate::instances::types::{Edge, EdgeApply, Instance, Node, NodeApply, NodeOrEdgeData, PropertyMap};
use crate::instances::ResourcesWrite;

pub use list::{EntityList, WriteList};

/// Edge relation declared by a view
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSpec {
    /// External id of the edge type, in the declaring view's space
    pub edge_type: &'static str,
    /// Direction from the declaring entity
    pub direction: Direction,
    /// Views the far end may have data in
    pub targets: Vec<ViewId>,
    /// View holding the edge's own properties
    pub properties: Option<ViewId>,
}

/// Kind of a declared field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Plain value stored on the node
    Scalar,
    /// Reference to another node stored on this one
    Direct {
        /// Views the referenced node may have data in
        targets: Vec<ViewId>,
    },
    /// Edges to other nodes
    Edge(EdgeSpec),
}

/// One declared field of a view
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Property name on the wire
    pub name: &'static str,
    /// Scalar, direct relation or edge
    pub kind: FieldKind,
    /// Must be present on every node
    pub required: bool,
}

/// Schema of one view
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSpec {
    /// The view
    pub view: ViewId,
    /// Declared fields
    pub fields: Vec<FieldSpec>,
}

impl FieldSpec {
    /// Optional scalar
    pub fn scalar(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Scalar,
            required: false,
        }
    }

    /// Required scalar
    pub fn required(name: &'static str) -> Self {
        Self {
            required: true,
            ..Self::scalar(name)
        }
    }

    /// Direct relation
    pub fn direct(name: &'static str, targets: Vec<ViewId>) -> Self {
        Self {
            name,
            kind: FieldKind::Direct { targets },
            required: false,
        }
    }

    /// Edge relation without edge properties
    pub fn edge(name: &'static str, edge_type: &'static str, direction: Direction, targets: Vec<ViewId>) -> Self {
        Self {
            name,
            kind: FieldKind::Edge(EdgeSpec {
                edge_type,
                direction,
                targets,
                properties: None,
            }),
            required: false,
        }
    }

    /// Attach a view for the edge's own properties
    pub fn with_edge_properties(mut self, view: ViewId) -> Self {
        if let FieldKind::Edge(edge) = &mut self.kind {
            edge.properties = Some(view);
        }
        self
    }

    /// Whether the field is stored on the node itself
    pub fn is_property(&self) -> bool {
        !matches!(self.kind, FieldKind::Edge(_))
    }

    /// Views a relation field may point to
    pub fn targets(&self) -> &[ViewId] {
        match &self.kind {
            FieldKind::Scalar => &[],
            FieldKind::Direct { targets } => targets,
            FieldKind::Edge(edge) => &edge.targets,
        }
    }
}

impl ViewSpec {
    /// Declare a view
    pub fn new(view: ViewId, fields: Vec<FieldSpec>) -> Self {
        Self { view, fields }
    }

    /// Field by name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Edge fields with their edge declarations
    pub fn edge_fields(&self) -> impl Iterator<Item = (&FieldSpec, &EdgeSpec)> {
        self.fields.iter().filter_map(|field| match &field.kind {
            FieldKind::Edge(edge) => Some((field, edge)),
            _ => None,
        })
    }

    /// Edge type identifier of an edge field
    pub fn edge_type(&self, edge: &EdgeSpec) -> NodeId {
        NodeId::new(self.view.space.clone(), edge.edge_type)
    }

    /// Fail unless `name` is a property stored on the node
    pub fn check_property(&self, name: &str) -> Result<&FieldSpec> {
        match self.field(name) {
            Some(field) if field.is_property() => Ok(field),
            Some(_) => Err(Error::validation(format!(
                "'{}' of {} is an edge, not a property",
                name, self.view
            ))),
            None => Err(Error::validation(format!(
                "{} has no property '{}'",
                self.view, name
            ))),
        }
    }
}

/// Options for expanding write entities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Send unset optional fields as `null`, clearing them
    pub write_none: bool,
    /// Drop `existing_version` so the write never conflicts
    pub allow_version_increase: bool,
}

/// Options for `apply`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Replace the view's properties instead of merging
    pub replace: bool,
    /// Send unset optional fields as `null`
    pub write_none: bool,
    /// Drop `existing_version`
    pub allow_version_increase: bool,
}

impl ApplyOptions {
    /// The expansion part of the options
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            write_none: self.write_none,
            allow_version_increase: self.allow_version_increase,
        }
    }
}

/// Identifiers already written in one batch; only ever grows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteCache(HashSet<NodeId>);

impl WriteCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an id; `false` if it was already there
    pub fn insert(&mut self, id: NodeId) -> bool {
        self.0.insert(id)
    }

    /// Whether an id was recorded
    pub fn contains(&self, id: &NodeId) -> bool {
        self.0.contains(id)
    }

    /// Number of recorded ids
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Nothing recorded yet
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A relation value on a write entity: an existing node or one to create
#[derive(Debug, Clone, PartialEq)]
pub enum Relation<W> {
    /// Reference to a node that already exists
    Id(NodeId),
    /// Nested entity written together with the parent
    Entity(Box<W>),
}

/// Borrowed, type-erased [`Relation`]
#[derive(Clone, Copy)]
pub enum RelationRef<'a> {
    /// Existing node
    Id(&'a NodeId),
    /// Nested entity
    Entity(&'a dyn WriteEntity),
}

impl<W: WriteEntity> Relation<W> {
    /// Identifier of the referenced node
    pub fn id(&self) -> &NodeId {
        match self {
            Relation::Id(id) => id,
            Relation::Entity(entity) => entity.id(),
        }
    }

    /// Borrow without the concrete type
    pub fn as_ref(&self) -> RelationRef<'_> {
        match self {
            Relation::Id(id) => RelationRef::Id(id),
            Relation::Entity(entity) => RelationRef::Entity(&**entity),
        }
    }

    /// The nested entity, if any
    pub fn entity(&self) -> Option<&W> {
        match self {
            Relation::Id(_) => None,
            Relation::Entity(entity) => Some(&**entity),
        }
    }
}

impl<W> From<NodeId> for Relation<W> {
    fn from(id: NodeId) -> Self {
        Relation::Id(id)
    }
}

impl RelationRef<'_> {
    /// Identifier of the referenced node
    pub fn id(&self) -> &NodeId {
        match self {
            RelationRef::Id(id) => id,
            RelationRef::Entity(entity) => entity.id(),
        }
    }
}

/// One outgoing edge of a write entity
pub struct EdgeRef<'a> {
    /// Name of the declaring edge field
    pub field: &'static str,
    /// The other end
    pub end: RelationRef<'a>,
    /// Explicit edge external id; `"{start}:{end}"` when absent
    pub external_id: Option<&'a str>,
    /// Edge properties, written through the field's edge view
    pub properties: PropertyMap,
}

impl<'a> EdgeRef<'a> {
    /// Edge without properties or explicit id
    pub fn to<W: WriteEntity>(field: &'static str, end: &'a Relation<W>) -> Self {
        Self {
            field,
            end: end.as_ref(),
            external_id: None,
            properties: PropertyMap::new(),
        }
    }
}

/// Collects node properties for a write
#[derive(Debug)]
pub struct PropertyWriter {
    properties: PropertyMap,
    write_none: bool,
    error: Option<Error>,
}

impl PropertyWriter {
    /// Empty writer
    pub fn new(write_none: bool) -> Self {
        Self {
            properties: PropertyMap::new(),
            write_none,
            error: None,
        }
    }

    fn put<T: Serialize>(&mut self, name: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.properties.insert(name.to_string(), value);
            }
            Err(e) => {
                self.error.get_or_insert(Error::Serialization(e));
            }
        }
    }

    fn none(&mut self, name: &str) {
        if self.write_none {
            self.properties.insert(name.to_string(), Value::Null);
        }
    }

    /// Always-present value
    pub fn required<T: Serialize>(&mut self, name: &str, value: &T) -> &mut Self {
        self.put(name, value);
        self
    }

    /// Value written when set, or as `null` with `write_none`
    pub fn optional<T: Serialize>(&mut self, name: &str, value: &Option<T>) -> &mut Self {
        match value {
            Some(value) => self.put(name, value),
            None => self.none(name),
        }
        self
    }

    /// Direct relation, stored as `{space, externalId}`
    pub fn relation<W: WriteEntity>(&mut self, name: &str, value: &Option<Relation<W>>) -> &mut Self {
        match value {
            Some(relation) => {
                self.properties
                    .insert(name.to_string(), reference_value(relation.id()));
            }
            None => self.none(name),
        }
        self
    }

    /// The collected properties, or the first serialization error
    pub fn finish(self) -> Result<PropertyMap> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.properties),
        }
    }
}

/// Write shape of an entity
///
/// Object safe so nested entities of different types can be expanded
/// through [`RelationRef`].
pub trait WriteEntity: Send + Sync {
    /// Schema of the entity's view
    fn view_spec(&self) -> &'static ViewSpec;

    /// Identifier
    fn id(&self) -> &NodeId;

    /// Version the write expects to overwrite
    fn existing_version(&self) -> Option<i64> {
        None
    }

    /// Node properties (scalars and direct relation ids)
    fn write_properties(&self, writer: &mut PropertyWriter);

    /// Direct relations, so nested entities get written too
    fn relations(&self) -> Vec<RelationRef<'_>> {
        Vec::new()
    }

    /// Outgoing edges
    fn edges(&self) -> Vec<EdgeRef<'_>> {
        Vec::new()
    }

    /// Expand into node and edge writes, skipping everything in `cache`
    fn to_instances_write(&self, cache: &mut WriteCache, options: WriteOptions) -> Result<ResourcesWrite>
    where
        Self: Sized,
    {
        let mut out = ResourcesWrite::default();
        write_graph(self, cache, options, &mut out)?;
        Ok(out)
    }
}

/// Read shape of an entity
pub trait Entity: DeserializeOwned + Clone + Send + Sync + 'static {
    /// Matching write shape
    type Write: WriteEntity + Clone;
    /// Criteria for listing
    type Filter: ViewFilter;

    /// Schema of the entity's view
    fn spec() -> &'static ViewSpec;

    /// Identifier
    fn id(&self) -> &NodeId;

    /// Server metadata
    fn meta(&self) -> &NodeMeta;

    /// Write shape; the version becomes `existing_version`
    fn as_write(&self) -> Self::Write;

    /// Read shape of a write entity; metadata is zeroed
    fn from_write(write: &Self::Write) -> Self;

    /// Decode a node returned by the service
    fn from_node(node: &Node) -> Result<Self> {
        decode_node(Self::spec(), node)
    }

    /// Fill an edge field from edges grouped by this entity's end
    fn attach_edges(&mut self, _field: &str, _edges: &[Edge]) -> Result<()> {
        Ok(())
    }

    /// Ids referenced through a relation field
    fn related_ids(&self, _field: &str) -> Vec<NodeId> {
        Vec::new()
    }
}

/// Decode a node through a view into a serde read struct
///
/// The struct sees one flat object: `space`, `externalId`, the metadata
/// fields and the view's properties.
pub fn decode_node<T: DeserializeOwned>(spec: &ViewSpec, node: &Node) -> Result<T> {
    let props = node.view_properties(&spec.view).ok_or_else(|| {
        Error::validation(format!("{} has no data in view {}", node.id(), spec.view))
    })?;

    let mut object: Map<String, Value> = props.clone();
    object.insert("space".into(), Value::from(node.space.as_str()));
    object.insert("externalId".into(), Value::from(node.external_id.as_str()));
    object.insert("version".into(), Value::from(node.meta.version));
    object.insert("createdTime".into(), Value::from(node.meta.created_time));
    object.insert("lastUpdatedTime".into(), Value::from(node.meta.last_updated_time));
    if let Some(deleted) = node.meta.deleted_time {
        object.insert("deletedTime".into(), Value::from(deleted));
    }

    serde_json::from_value(Value::Object(object))
        .map_err(|e| Error::validation(format!("{} in view {}: {}", node.id(), spec.view, e)))
}

/// Decode any instance that must be a node
pub fn decode_instance<E: Entity>(instance: &Instance) -> Result<E> {
    match instance {
        Instance::Node(node) => E::from_node(node),
        Instance::Edge(_) => Err(Error::type_mismatch("node", "edge")),
    }
}

/// Far ends of edges followed in `direction`
pub fn far_ends(edges: &[Edge], direction: Direction) -> Vec<NodeId> {
    edges
        .iter()
        .map(|edge| edge.other_end(direction).clone())
        .collect()
}

/// Metadata for an entity built from a write shape
pub fn write_meta(existing_version: Option<i64>) -> NodeMeta {
    NodeMeta {
        version: existing_version.unwrap_or(0),
        ..NodeMeta::default()
    }
}

/// Recursively expand `entity` into `out`
///
/// Ids already in `cache` are skipped without descending into them, so
/// repeated and cyclic references are emitted once.
pub fn write_graph(
    entity: &dyn WriteEntity,
    cache: &mut WriteCache,
    options: WriteOptions,
    out: &mut ResourcesWrite,
) -> Result<()> {
    let id = entity.id();
    if !id.is_valid() {
        return Err(Error::validation(format!(
            "instance id '{}' needs a space and an external id",
            id
        )));
    }
    if !cache.insert(id.clone()) {
        return Ok(());
    }

    let spec = entity.view_spec();
    let mut writer = PropertyWriter::new(options.write_none);
    entity.write_properties(&mut writer);
    let properties = writer.finish()?;
    if !properties.is_empty() {
        out.nodes.push(NodeApply {
            space: id.space.clone(),
            external_id: id.external_id.clone(),
            existing_version: if options.allow_version_increase {
                None
            } else {
                entity.existing_version()
            },
            node_type: None,
            sources: vec![NodeOrEdgeData {
                source: SourceRef::View(spec.view.clone()),
                properties,
            }],
        });
    }

    for relation in entity.relations() {
        if let RelationRef::Entity(nested) = relation {
            write_graph(nested, cache, options, out)?;
        }
    }

    for edge in entity.edges() {
        let edge_spec = match spec.field(edge.field).map(|f| &f.kind) {
            Some(FieldKind::Edge(edge_spec)) => edge_spec,
            _ => {
                return Err(Error::validation(format!(
                    "{} has no edge field '{}'",
                    spec.view, edge.field
                )))
            }
        };

        let end_id = edge.end.id();
        let (start, end) = match edge_spec.direction {
            Direction::Outwards => (id, end_id),
            Direction::Inwards => (end_id, id),
        };
        let edge_id = NodeId::new(
            id.space.clone(),
            edge.external_id
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}:{}", start.external_id, end.external_id)),
        );

        if cache.insert(edge_id.clone()) {
            let sources = match (&edge_spec.properties, edge.properties.is_empty()) {
                (Some(view), false) => vec![NodeOrEdgeData {
                    source: SourceRef::View(view.clone()),
                    properties: edge.properties.clone(),
                }],
                _ => Vec::new(),
            };
            out.edges.push(EdgeApply {
                space: edge_id.space,
                external_id: edge_id.external_id,
                existing_version: None,
                edge_type: spec.edge_type(edge_spec),
                start_node: start.clone(),
                end_node: end.clone(),
                sources,
            });
        }

        if let RelationRef::Entity(nested) = edge.end {
            write_graph(nested, cache, options, out)?;
        }
    }

    Ok(())
}
