//! The windmill model against the in-memory backend: direct relations,
//! plain edges and edges carrying their own properties

use viewbind::domains::windmill::{
    Blade, BladeFilter, BladeWrite, Metmast, MetmastDistanceWrite, MetmastFilter, MetmastWrite,
    NacelleWrite, WindTurbine, WindTurbineFilter, WindTurbineWrite, DEFAULT_INSTANCE_SPACE as SPACE,
};
use viewbind::core::StrMatch;
use viewbind::{ApplyOptions, DataModelClient, Entity, NodeId, Relation};

fn id(external_id: &str) -> NodeId {
    NodeId::new(SPACE, external_id)
}

fn turbine(
    xid: &str,
    name: &str,
    capacity: f64,
    masts: Vec<MetmastDistanceWrite>,
) -> WindTurbineWrite {
    let mut turbine = WindTurbineWrite::new(SPACE, xid, name);
    turbine.capacity = Some(capacity);
    let mut nacelle = NacelleWrite::new(SPACE, &format!("nacelle:{}", xid));
    nacelle.yaw_direction = Some(180.0);
    turbine.nacelle = Some(Relation::Entity(Box::new(nacelle)));
    turbine.blades = ["a", "b", "c"]
        .iter()
        .map(|blade| {
            let xid = format!("blade:{}:{}", xid, blade);
            Relation::Entity(Box::new(BladeWrite::new(SPACE, &xid, blade)))
        })
        .collect();
    turbine.metmast = masts;
    turbine
}

fn client() -> DataModelClient {
    let client = DataModelClient::in_memory();
    let west = MetmastWrite::new(SPACE, "metmast:west", Some(1.0));
    let east = MetmastWrite::new(SPACE, "metmast:east", Some(2.0));
    client
        .windmill()
        .wind_turbine
        .apply_many(
            &[
                turbine(
                    "turbine:hornsea_1",
                    "Hornsea 1",
                    7.0,
                    vec![
                        MetmastDistanceWrite::new(west, Some(1200.0)),
                        MetmastDistanceWrite::new(east, Some(3400.0)),
                    ],
                ),
                turbine(
                    "turbine:hornsea_2",
                    "Hornsea 2",
                    8.0,
                    vec![MetmastDistanceWrite::new(id("metmast:west"), Some(800.0))],
                ),
            ],
            ApplyOptions::default(),
        )
        .unwrap();
    client
}

#[test]
fn test_retrieve_reads_edge_properties() {
    let windmill = client().windmill();
    let hornsea = windmill
        .wind_turbine
        .retrieve("turbine:hornsea_1")
        .unwrap()
        .expect("applied turbine");

    assert_eq!(hornsea.capacity, Some(7.0));
    assert_eq!(hornsea.nacelle, Some(id("nacelle:turbine:hornsea_1")));
    assert_eq!(hornsea.blades.len(), 3);

    let mut distances: Vec<(String, Option<f64>)> = hornsea
        .metmast
        .iter()
        .map(|m| (m.metmast.external_id.clone(), m.distance))
        .collect();
    distances.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        distances,
        vec![
            ("metmast:east".to_string(), Some(3400.0)),
            ("metmast:west".to_string(), Some(1200.0)),
        ]
    );
    let west = hornsea
        .metmast
        .iter()
        .find(|m| m.metmast == id("metmast:west"))
        .unwrap();
    assert_eq!(west.edge, id("turbine:hornsea_1:metmast:west"));
}

#[test]
fn test_list_and_related_ids() {
    let windmill = client().windmill();
    let turbines = windmill
        .wind_turbine
        .list(&WindTurbineFilter::default(), None)
        .unwrap();
    assert_eq!(turbines.len(), 2);
    assert_eq!(turbines.blade_ids().len(), 6);
    assert_eq!(turbines.metmast_ids().len(), 2);
    assert_eq!(turbines.nacelle_ids().len(), 2);

    let big = windmill
        .wind_turbine
        .list(
            &WindTurbineFilter {
                min_capacity: Some(7.5),
                ..Default::default()
            },
            None,
        )
        .unwrap();
    assert_eq!(big.ids(), vec![id("turbine:hornsea_2")]);

    let blades = windmill.blade.list(&BladeFilter::default(), None).unwrap();
    assert_eq!(blades.len(), 6);
    let hornsea_blades = turbines.related("blades", &blades);
    assert_eq!(hornsea_blades.len(), 6);
}

#[test]
fn test_read_write_round_trip_keeps_distance() {
    let windmill = client().windmill();
    let turbines = &windmill.wind_turbine;
    let mut write = turbines
        .retrieve("turbine:hornsea_2")
        .unwrap()
        .unwrap()
        .as_write();
    assert_eq!(write.metmast.len(), 1);
    assert_eq!(write.metmast[0].distance, Some(800.0));

    write.metmast[0].distance = Some(750.0);
    turbines.apply(&write, ApplyOptions::default()).unwrap();

    let again = turbines.retrieve("turbine:hornsea_2").unwrap().unwrap();
    assert_eq!(again.metmast.len(), 1);
    assert_eq!(again.metmast[0].distance, Some(750.0));
    assert_eq!(again.metmast[0].edge, id("turbine:hornsea_2:metmast:west"));
}

#[test]
fn test_query_list_fills_edges_with_properties() {
    let windmill = client().windmill();
    let turbines = windmill
        .wind_turbine
        .query(
            &WindTurbineFilter {
                name: Some(StrMatch::from("Hornsea 1")),
                ..Default::default()
            },
            None,
        )
        .list()
        .unwrap();
    assert_eq!(turbines.len(), 1);
    let hornsea = turbines.iter().next().unwrap();
    assert_eq!(hornsea.blades.len(), 3);
    let mut distances: Vec<f64> = hornsea.metmast.iter().filter_map(|m| m.distance).collect();
    distances.sort_by(f64::total_cmp);
    assert_eq!(distances, vec![1200.0, 3400.0]);

    let retrieved = windmill
        .wind_turbine
        .retrieve("turbine:hornsea_1")
        .unwrap()
        .unwrap();
    assert_eq!(hornsea.nacelle, retrieved.nacelle);
}

#[test]
fn test_query_traverses_plain_and_property_edges() {
    let windmill = client().windmill();
    let masts = windmill
        .wind_turbine
        .query(&WindTurbineFilter::default(), None)
        .traverse::<Metmast>("metmast", &MetmastFilter::default(), None)
        .unwrap()
        .list()
        .unwrap();
    let mut positions: Vec<f64> = masts.iter().filter_map(|m| m.position).collect();
    positions.sort_by(f64::total_cmp);
    assert_eq!(positions, vec![1.0, 2.0]);

    let blades = windmill
        .wind_turbine
        .query(
            &WindTurbineFilter {
                name_prefix: Some("Hornsea 2".into()),
                ..Default::default()
            },
            None,
        )
        .traverse::<Blade>("blades", &BladeFilter::default(), None)
        .unwrap()
        .list()
        .unwrap();
    assert_eq!(blades.len(), 3);
    assert!(blades
        .iter()
        .all(|b| b.id.external_id.starts_with("blade:turbine:hornsea_2:")));
}

#[test]
fn test_as_read_of_write_matches_defaults() {
    let write = turbine(
        "turbine:draft",
        "Draft",
        5.0,
        vec![MetmastDistanceWrite::new(id("metmast:west"), Some(10.0))],
    );
    let read = WindTurbine::from_write(&write);
    assert_eq!(read.meta.version, 0);
    assert_eq!(read.blades.len(), 3);
    assert_eq!(read.metmast[0].edge, id("turbine:draft:metmast:west"));
}
