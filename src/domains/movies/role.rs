//! Actor and director roles
//!
//! Both views have the same shape, so they are declared by one macro.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::{view, MovieWrite, NominationWrite, PersonWrite};
use crate::core::error::Result;
use crate::core::types::{Direction, Match, NodeId, NodeMeta, ViewId};
use crate::filter::{CommonFilter, Filter, FilterBuilder, ViewFilter};
use crate::instances::types::Edge;
use crate::model::{
    far_ends, write_meta, EdgeRef, Entity, EntityList, FieldSpec, PropertyWriter, Relation,
    RelationRef, ViewSpec, WriteEntity,
};

fn role_spec(name: &str) -> ViewSpec {
    ViewSpec::new(
        view(name),
        vec![
            FieldSpec::direct("person", vec![view("Person")]),
            FieldSpec::edge("movies", "Role.movies", Direction::Outwards, vec![view("Movie")]),
            FieldSpec::edge(
                "nomination",
                "Role.nomination",
                Direction::Outwards,
                vec![view("Nomination")],
            ),
            FieldSpec::scalar("wonOscar"),
        ],
    )
}

macro_rules! role_entity {
    ($read:ident, $write:ident, $filter:ident, $spec:ident, $view:literal) => {
        static $spec: Lazy<ViewSpec> = Lazy::new(|| role_spec($view));

        #[doc = concat!("A ", $view, " role, as read")]
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $read {
            /// Identifier
            #[serde(flatten)]
            pub id: NodeId,
            /// Server metadata
            #[serde(flatten)]
            pub meta: NodeMeta,
            /// The person holding the role
            #[serde(default)]
            pub person: Option<NodeId>,
            /// Movies the role appears in
            #[serde(default, skip_serializing_if = "Vec::is_empty")]
            pub movies: Vec<NodeId>,
            /// Award nominations
            #[serde(default, skip_serializing_if = "Vec::is_empty")]
            pub nomination: Vec<NodeId>,
            /// Whether the role won an Oscar
            #[serde(default)]
            pub won_oscar: Option<bool>,
        }

        #[doc = concat!("A ", $view, " role, to be written")]
        #[derive(Debug, Clone, PartialEq)]
        pub struct $write {
            /// Identifier
            pub id: NodeId,
            /// Expected current version
            pub existing_version: Option<i64>,
            /// The person holding the role
            pub person: Option<Relation<PersonWrite>>,
            /// Movies the role appears in
            pub movies: Vec<Relation<MovieWrite>>,
            /// Award nominations
            pub nomination: Vec<Relation<NominationWrite>>,
            /// Whether the role won an Oscar
            pub won_oscar: Option<bool>,
        }

        impl $write {
            /// Role with no fields set
            pub fn new(space: &str, external_id: &str) -> Self {
                Self {
                    id: NodeId::new(space, external_id),
                    existing_version: None,
                    person: None,
                    movies: Vec::new(),
                    nomination: Vec::new(),
                    won_oscar: None,
                }
            }
        }

        #[doc = concat!("Criteria for listing ", $view, " roles")]
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $filter {
            /// Person equals / is one of
            pub person: Option<Match<NodeId>>,
            /// Oscar winner or not
            pub won_oscar: Option<bool>,
            /// Id prefix, space and raw filter
            pub common: CommonFilter,
        }

        impl ViewFilter for $filter {
            fn build(&self, view: &ViewId) -> Option<Filter> {
                FilterBuilder::new(view)
                    .reference("person", self.person.as_ref())
                    .equals("wonOscar", self.won_oscar)
                    .common(&self.common)
                    .build()
            }
        }

        impl WriteEntity for $write {
            fn view_spec(&self) -> &'static ViewSpec {
                &$spec
            }

            fn id(&self) -> &NodeId {
                &self.id
            }

            fn existing_version(&self) -> Option<i64> {
                self.existing_version
            }

            fn write_properties(&self, writer: &mut PropertyWriter) {
                writer
                    .relation("person", &self.person)
                    .optional("wonOscar", &self.won_oscar);
            }

            fn relations(&self) -> Vec<RelationRef<'_>> {
                self.person.iter().map(Relation::as_ref).collect()
            }

            fn edges(&self) -> Vec<EdgeRef<'_>> {
                self.movies
                    .iter()
                    .map(|movie| EdgeRef::to("movies", movie))
                    .chain(self.nomination.iter().map(|n| EdgeRef::to("nomination", n)))
                    .collect()
            }
        }

        impl Entity for $read {
            type Write = $write;
            type Filter = $filter;

            fn spec() -> &'static ViewSpec {
                &$spec
            }

            fn id(&self) -> &NodeId {
                &self.id
            }

            fn meta(&self) -> &NodeMeta {
                &self.meta
            }

            fn as_write(&self) -> $write {
                $write {
                    id: self.id.clone(),
                    existing_version: Some(self.meta.version),
                    person: self.person.clone().map(Relation::Id),
                    movies: self.movies.iter().cloned().map(Relation::Id).collect(),
                    nomination: self.nomination.iter().cloned().map(Relation::Id).collect(),
                    won_oscar: self.won_oscar,
                }
            }

            fn from_write(write: &$write) -> Self {
                Self {
                    id: write.id.clone(),
                    meta: write_meta(write.existing_version),
                    person: write.person.as_ref().map(|p| p.id().clone()),
                    movies: write.movies.iter().map(|m| m.id().clone()).collect(),
                    nomination: write.nomination.iter().map(|n| n.id().clone()).collect(),
                    won_oscar: write.won_oscar,
                }
            }

            fn attach_edges(&mut self, field: &str, edges: &[Edge]) -> Result<()> {
                match field {
                    "movies" => self.movies = far_ends(edges, Direction::Outwards),
                    "nomination" => self.nomination = far_ends(edges, Direction::Outwards),
                    _ => {}
                }
                Ok(())
            }

            fn related_ids(&self, field: &str) -> Vec<NodeId> {
                match field {
                    "person" => self.person.iter().cloned().collect(),
                    "movies" => self.movies.clone(),
                    "nomination" => self.nomination.clone(),
                    _ => Vec::new(),
                }
            }
        }

        impl EntityList<$read> {
            /// Every movie referenced by the listed roles
            pub fn movie_ids(&self) -> Vec<NodeId> {
                self.related_ids("movies")
            }

            /// Every person holding one of the listed roles
            pub fn person_ids(&self) -> Vec<NodeId> {
                self.related_ids("person")
            }
        }
    };
}

role_entity!(Actor, ActorWrite, ActorFilter, ACTOR, "Actor");
role_entity!(Director, DirectorWrite, DirectorFilter, DIRECTOR, "Director");

/// A role of either kind, as the target of `Person.roles`
#[derive(Debug, Clone, PartialEq)]
pub enum RoleWrite {
    /// Acting role
    Actor(ActorWrite),
    /// Directing role
    Director(DirectorWrite),
}

impl RoleWrite {
    fn inner(&self) -> &dyn WriteEntity {
        match self {
            RoleWrite::Actor(actor) => actor,
            RoleWrite::Director(director) => director,
        }
    }
}

impl WriteEntity for RoleWrite {
    fn view_spec(&self) -> &'static ViewSpec {
        self.inner().view_spec()
    }

    fn id(&self) -> &NodeId {
        self.inner().id()
    }

    fn existing_version(&self) -> Option<i64> {
        self.inner().existing_version()
    }

    fn write_properties(&self, writer: &mut PropertyWriter) {
        self.inner().write_properties(writer)
    }

    fn relations(&self) -> Vec<RelationRef<'_>> {
        self.inner().relations()
    }

    fn edges(&self) -> Vec<EdgeRef<'_>> {
        self.inner().edges()
    }
}

impl From<ActorWrite> for RoleWrite {
    fn from(actor: ActorWrite) -> Self {
        RoleWrite::Actor(actor)
    }
}

impl From<DirectorWrite> for RoleWrite {
    fn from(director: DirectorWrite) -> Self {
        RoleWrite::Director(director)
    }
}
