use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{view, BladeWrite, MetmastWrite, NacelleWrite};
use crate::core::error::Result;
use crate::core::types::{Direction, Match, NodeId, NodeMeta, StrMatch, ViewId};
use crate::filter::{CommonFilter, Filter, FilterBuilder, ViewFilter};
use crate::instances::types::{Edge, PropertyMap};
use crate::model::{
    far_ends, write_meta, EdgeRef, Entity, EntityList, FieldSpec, PropertyWriter, Relation,
    RelationRef, ViewSpec, WriteEntity,
};

static DISTANCE: Lazy<ViewId> = Lazy::new(|| view("Distance"));

static WIND_TURBINE: Lazy<ViewSpec> = Lazy::new(|| {
    ViewSpec::new(
        view("WindTurbine"),
        vec![
            FieldSpec::required("name"),
            FieldSpec::scalar("capacity"),
            FieldSpec::direct("nacelle", vec![view("Nacelle")]),
            FieldSpec::edge(
                "blades",
                "WindTurbine.blades",
                Direction::Outwards,
                vec![view("Blade")],
            ),
            FieldSpec::edge(
                "metmast",
                "WindTurbine.metmast",
                Direction::Outwards,
                vec![view("Metmast")],
            )
            .with_edge_properties(DISTANCE.clone()),
        ],
    )
});

/// Edge from a turbine to a met mast, with its distance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetmastDistance {
    /// Identifier of the edge
    pub edge: NodeId,
    /// The met mast
    pub metmast: NodeId,
    /// Distance in metres
    #[serde(default)]
    pub distance: Option<f64>,
}

/// Edge to a met mast, to be written
#[derive(Debug, Clone, PartialEq)]
pub struct MetmastDistanceWrite {
    /// The met mast, existing or created with the turbine
    pub metmast: Relation<MetmastWrite>,
    /// Distance in metres
    pub distance: Option<f64>,
    /// Edge external id; `"{turbine}:{metmast}"` when unset
    pub external_id: Option<String>,
}

impl MetmastDistanceWrite {
    /// Edge to `metmast` at `distance`
    pub fn new(metmast: impl Into<Relation<MetmastWrite>>, distance: Option<f64>) -> Self {
        Self {
            metmast: metmast.into(),
            distance,
            external_id: None,
        }
    }

    fn properties(&self) -> PropertyMap {
        let mut properties = PropertyMap::new();
        if let Some(distance) = self.distance {
            properties.insert("distance".into(), Value::from(distance));
        }
        properties
    }
}

impl From<MetmastWrite> for Relation<MetmastWrite> {
    fn from(metmast: MetmastWrite) -> Self {
        Relation::Entity(Box::new(metmast))
    }
}

impl MetmastDistance {
    fn from_edge(edge: &Edge) -> Self {
        Self {
            edge: edge.id(),
            metmast: edge.other_end(Direction::Outwards).clone(),
            distance: edge
                .view_properties(&DISTANCE)
                .and_then(|props| props.get("distance"))
                .and_then(Value::as_f64),
        }
    }
}

/// A wind turbine, as read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindTurbine {
    /// Identifier
    #[serde(flatten)]
    pub id: NodeId,
    /// Server metadata
    #[serde(flatten)]
    pub meta: NodeMeta,
    /// Turbine name
    pub name: String,
    /// Rated capacity in MW
    #[serde(default)]
    pub capacity: Option<f64>,
    /// Housing
    #[serde(default)]
    pub nacelle: Option<NodeId>,
    /// Rotor blades
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blades: Vec<NodeId>,
    /// Nearby met masts with distances
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metmast: Vec<MetmastDistance>,
}

/// A wind turbine, to be written
#[derive(Debug, Clone, PartialEq)]
pub struct WindTurbineWrite {
    /// Identifier
    pub id: NodeId,
    /// Expected current version
    pub existing_version: Option<i64>,
    /// Turbine name
    pub name: String,
    /// Rated capacity in MW
    pub capacity: Option<f64>,
    /// Housing
    pub nacelle: Option<Relation<NacelleWrite>>,
    /// Rotor blades
    pub blades: Vec<Relation<BladeWrite>>,
    /// Nearby met masts with distances
    pub metmast: Vec<MetmastDistanceWrite>,
}

impl WindTurbineWrite {
    /// Turbine with only the name set
    pub fn new(space: &str, external_id: &str, name: &str) -> Self {
        Self {
            id: NodeId::new(space, external_id),
            existing_version: None,
            name: name.to_string(),
            capacity: None,
            nacelle: None,
            blades: Vec::new(),
            metmast: Vec::new(),
        }
    }
}

/// Criteria for listing wind turbines
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindTurbineFilter {
    /// Name equals / is one of
    pub name: Option<StrMatch>,
    /// Name starts with
    pub name_prefix: Option<String>,
    /// Capacity at least
    pub min_capacity: Option<f64>,
    /// Capacity at most
    pub max_capacity: Option<f64>,
    /// Nacelle equals / is one of
    pub nacelle: Option<Match<NodeId>>,
    /// Id prefix, space and raw filter
    pub common: CommonFilter,
}

impl ViewFilter for WindTurbineFilter {
    fn build(&self, view: &ViewId) -> Option<Filter> {
        FilterBuilder::new(view)
            .matches("name", self.name.as_ref())
            .prefix("name", self.name_prefix.as_deref())
            .range("capacity", self.min_capacity, self.max_capacity)
            .reference("nacelle", self.nacelle.as_ref())
            .common(&self.common)
            .build()
    }
}

impl WriteEntity for WindTurbineWrite {
    fn view_spec(&self) -> &'static ViewSpec {
        &WIND_TURBINE
    }

    fn id(&self) -> &NodeId {
        &self.id
    }

    fn existing_version(&self) -> Option<i64> {
        self.existing_version
    }

    fn write_properties(&self, writer: &mut PropertyWriter) {
        writer
            .required("name", &self.name)
            .optional("capacity", &self.capacity)
            .relation("nacelle", &self.nacelle);
    }

    fn relations(&self) -> Vec<RelationRef<'_>> {
        self.nacelle.iter().map(Relation::as_ref).collect()
    }

    fn edges(&self) -> Vec<EdgeRef<'_>> {
        let blades = self.blades.iter().map(|blade| EdgeRef::to("blades", blade));
        let masts = self.metmast.iter().map(|mast| EdgeRef {
            external_id: mast.external_id.as_deref(),
            properties: mast.properties(),
            ..EdgeRef::to("metmast", &mast.metmast)
        });
        blades.chain(masts).collect()
    }
}

impl Entity for WindTurbine {
    type Write = WindTurbineWrite;
    type Filter = WindTurbineFilter;

    fn spec() -> &'static ViewSpec {
        &WIND_TURBINE
    }

    fn id(&self) -> &NodeId {
        &self.id
    }

    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn as_write(&self) -> WindTurbineWrite {
        WindTurbineWrite {
            id: self.id.clone(),
            existing_version: Some(self.meta.version),
            name: self.name.clone(),
            capacity: self.capacity,
            nacelle: self.nacelle.clone().map(Relation::Id),
            blades: self.blades.iter().cloned().map(Relation::Id).collect(),
            metmast: self
                .metmast
                .iter()
                .map(|m| MetmastDistanceWrite {
                    metmast: Relation::Id(m.metmast.clone()),
                    distance: m.distance,
                    external_id: Some(m.edge.external_id.clone()),
                })
                .collect(),
        }
    }

    fn from_write(write: &WindTurbineWrite) -> Self {
        Self {
            id: write.id.clone(),
            meta: write_meta(write.existing_version),
            name: write.name.clone(),
            capacity: write.capacity,
            nacelle: write.nacelle.as_ref().map(|n| n.id().clone()),
            blades: write.blades.iter().map(|b| b.id().clone()).collect(),
            metmast: write
                .metmast
                .iter()
                .map(|m| {
                    let mast = m.metmast.id();
                    let external_id = m
                        .external_id
                        .clone()
                        .unwrap_or_else(|| format!("{}:{}", write.id.external_id, mast.external_id));
                    MetmastDistance {
                        edge: NodeId::new(write.id.space.clone(), external_id),
                        metmast: mast.clone(),
                        distance: m.distance,
                    }
                })
                .collect(),
        }
    }

    fn attach_edges(&mut self, field: &str, edges: &[Edge]) -> Result<()> {
        match field {
            "blades" => self.blades = far_ends(edges, Direction::Outwards),
            "metmast" => self.metmast = edges.iter().map(MetmastDistance::from_edge).collect(),
            _ => {}
        }
        Ok(())
    }

    fn related_ids(&self, field: &str) -> Vec<NodeId> {
        match field {
            "nacelle" => self.nacelle.iter().cloned().collect(),
            "blades" => self.blades.clone(),
            "metmast" => self.metmast.iter().map(|m| m.metmast.clone()).collect(),
            _ => Vec::new(),
        }
    }
}

impl EntityList<WindTurbine> {
    /// Every blade on any of the listed turbines
    pub fn blade_ids(&self) -> Vec<NodeId> {
        self.related_ids("blades")
    }

    /// Every met mast near any of the listed turbines
    pub fn metmast_ids(&self) -> Vec<NodeId> {
        self.related_ids("metmast")
    }

    /// Nacelles of the listed turbines
    pub fn nacelle_ids(&self) -> Vec<NodeId> {
        self.related_ids("nacelle")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::windmill::DEFAULT_INSTANCE_SPACE as SPACE;
    use crate::filter::SourceRef;
    use crate::model::{WriteCache, WriteOptions};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn turbine() -> WindTurbineWrite {
        let mut turbine = WindTurbineWrite::new(SPACE, "hornsea_1", "Hornsea 1");
        turbine.capacity = Some(7.0);
        let mut nacelle = NacelleWrite::new(SPACE, "nacelle_1");
        nacelle.yaw_direction = Some(270.0);
        turbine.nacelle = Some(Relation::Entity(Box::new(nacelle)));
        turbine.blades = vec![
            Relation::Entity(Box::new(BladeWrite::new(SPACE, "blade_a", "A"))),
            Relation::Id(NodeId::new(SPACE, "blade_b")),
        ];
        turbine.metmast = vec![MetmastDistanceWrite::new(
            MetmastWrite::new(SPACE, "mast_1", Some(3.0)),
            Some(1200.0),
        )];
        turbine
    }

    #[test]
    fn test_metmast_edge_carries_distance() {
        let out = turbine()
            .to_instances_write(&mut WriteCache::new(), WriteOptions::default())
            .unwrap();

        let ids: Vec<&str> = out.nodes.iter().map(|n| n.external_id.as_str()).collect();
        assert_eq!(ids, vec!["hornsea_1", "nacelle_1", "blade_a", "mast_1"]);

        assert_eq!(out.edges.len(), 3);
        let mast_edge = &out.edges[2];
        assert_eq!(mast_edge.external_id, "hornsea_1:mast_1");
        assert_eq!(mast_edge.edge_type, NodeId::new("power-models", "WindTurbine.metmast"));
        assert_eq!(mast_edge.sources.len(), 1);
        assert_eq!(mast_edge.sources[0].source, SourceRef::View(DISTANCE.clone()));
        assert_eq!(mast_edge.sources[0].properties["distance"], json!(1200.0));

        // Blade edges have no edge view.
        assert!(out.edges[0].sources.is_empty());
    }

    #[test]
    fn test_attach_metmast_edges_reads_distance() {
        let mut read = WindTurbine::from_write(&turbine());
        let mut view_props = BTreeMap::new();
        view_props.insert(
            DISTANCE.property_key(),
            json!({"distance": 850.5}).as_object().cloned().unwrap(),
        );
        let mut properties = BTreeMap::new();
        properties.insert("power-models".to_string(), view_props);
        let edge = Edge {
            space: SPACE.into(),
            external_id: "custom_edge".into(),
            meta: NodeMeta::default(),
            edge_type: NodeId::new("power-models", "WindTurbine.metmast"),
            start_node: NodeId::new(SPACE, "hornsea_1"),
            end_node: NodeId::new(SPACE, "mast_2"),
            properties,
        };

        read.attach_edges("metmast", &[edge]).unwrap();
        assert_eq!(
            read.metmast,
            vec![MetmastDistance {
                edge: NodeId::new(SPACE, "custom_edge"),
                metmast: NodeId::new(SPACE, "mast_2"),
                distance: Some(850.5),
            }]
        );

        let write = read.as_write();
        assert_eq!(write.metmast[0].external_id.as_deref(), Some("custom_edge"));
    }

    #[test]
    fn test_from_write_uses_default_edge_ids() {
        let read = WindTurbine::from_write(&turbine());
        assert_eq!(read.meta.version, 0);
        assert_eq!(read.nacelle, Some(NodeId::new(SPACE, "nacelle_1")));
        assert_eq!(read.metmast[0].edge, NodeId::new(SPACE, "hornsea_1:mast_1"));

        let list = EntityList::new(vec![read]);
        assert_eq!(list.blade_ids().len(), 2);
        assert_eq!(list.metmast_ids(), vec![NodeId::new(SPACE, "mast_1")]);
    }
}
