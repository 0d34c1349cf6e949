use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{view, ActorWrite, DirectorWrite, RatingWrite};
use crate::core::error::Result;
use crate::core::types::{Direction, Match, NodeId, NodeMeta, StrMatch, ViewId};
use crate::filter::{CommonFilter, Filter, FilterBuilder, ViewFilter};
use crate::instances::types::Edge;
use crate::model::{
    far_ends, write_meta, EdgeRef, Entity, EntityList, FieldSpec, PropertyWriter, Relation,
    RelationRef, ViewSpec, WriteEntity,
};

static MOVIE: Lazy<ViewSpec> = Lazy::new(|| {
    ViewSpec::new(
        view("Movie"),
        vec![
            FieldSpec::required("title"),
            FieldSpec::scalar("releaseYear"),
            FieldSpec::scalar("runTimeMinutes"),
            FieldSpec::scalar("meta"),
            FieldSpec::edge("actors", "Movie.actors", Direction::Outwards, vec![view("Actor")]),
            FieldSpec::edge(
                "directors",
                "Movie.directors",
                Direction::Outwards,
                vec![view("Director")],
            ),
            FieldSpec::direct("rating", vec![view("Rating")]),
        ],
    )
});

/// A movie, as read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    /// Identifier
    #[serde(flatten)]
    pub id: NodeId,
    /// Server metadata
    #[serde(flatten)]
    pub meta: NodeMeta,
    /// Title
    pub title: String,
    /// Year of release
    #[serde(default)]
    pub release_year: Option<i64>,
    /// Running time
    #[serde(default)]
    pub run_time_minutes: Option<f64>,
    /// Free-form JSON stored with the movie
    #[serde(default, rename = "meta", skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
    /// Acting roles
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actors: Vec<NodeId>,
    /// Directing roles
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub directors: Vec<NodeId>,
    /// Rating node
    #[serde(default)]
    pub rating: Option<NodeId>,
}

/// A movie, to be written
#[derive(Debug, Clone, PartialEq)]
pub struct MovieWrite {
    /// Identifier
    pub id: NodeId,
    /// Expected current version
    pub existing_version: Option<i64>,
    /// Title
    pub title: String,
    /// Year of release
    pub release_year: Option<i64>,
    /// Running time
    pub run_time_minutes: Option<f64>,
    /// Free-form JSON stored under `meta`
    pub extra: Option<Value>,
    /// Acting roles
    pub actors: Vec<Relation<ActorWrite>>,
    /// Directing roles
    pub directors: Vec<Relation<DirectorWrite>>,
    /// Rating node
    pub rating: Option<Relation<RatingWrite>>,
}

impl MovieWrite {
    /// Movie with only the title set
    pub fn new(space: &str, external_id: &str, title: &str) -> Self {
        Self {
            id: NodeId::new(space, external_id),
            existing_version: None,
            title: title.to_string(),
            release_year: None,
            run_time_minutes: None,
            extra: None,
            actors: Vec::new(),
            directors: Vec::new(),
            rating: None,
        }
    }
}

/// Criteria for listing movies
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovieFilter {
    /// Title equals / is one of
    pub title: Option<StrMatch>,
    /// Title starts with
    pub title_prefix: Option<String>,
    /// Released in or after
    pub min_release_year: Option<i64>,
    /// Released in or before
    pub max_release_year: Option<i64>,
    /// At least this long
    pub min_run_time_minutes: Option<f64>,
    /// At most this long
    pub max_run_time_minutes: Option<f64>,
    /// Rating equals / is one of
    pub rating: Option<Match<NodeId>>,
    /// Id prefix, space and raw filter
    pub common: CommonFilter,
}

impl ViewFilter for MovieFilter {
    fn build(&self, view: &ViewId) -> Option<Filter> {
        FilterBuilder::new(view)
            .matches("title", self.title.as_ref())
            .prefix("title", self.title_prefix.as_deref())
            .range("releaseYear", self.min_release_year, self.max_release_year)
            .range(
                "runTimeMinutes",
                self.min_run_time_minutes,
                self.max_run_time_minutes,
            )
            .reference("rating", self.rating.as_ref())
            .common(&self.common)
            .build()
    }
}

impl WriteEntity for MovieWrite {
    fn view_spec(&self) -> &'static ViewSpec {
        &MOVIE
    }

    fn id(&self) -> &NodeId {
        &self.id
    }

    fn existing_version(&self) -> Option<i64> {
        self.existing_version
    }

    fn write_properties(&self, writer: &mut PropertyWriter) {
        writer
            .required("title", &self.title)
            .optional("releaseYear", &self.release_year)
            .optional("runTimeMinutes", &self.run_time_minutes)
            .optional("meta", &self.extra)
            .relation("rating", &self.rating);
    }

    fn relations(&self) -> Vec<RelationRef<'_>> {
        self.rating.iter().map(Relation::as_ref).collect()
    }

    fn edges(&self) -> Vec<EdgeRef<'_>> {
        self.actors
            .iter()
            .map(|actor| EdgeRef::to("actors", actor))
            .chain(self.directors.iter().map(|d| EdgeRef::to("directors", d)))
            .collect()
    }
}

impl Entity for Movie {
    type Write = MovieWrite;
    type Filter = MovieFilter;

    fn spec() -> &'static ViewSpec {
        &MOVIE
    }

    fn id(&self) -> &NodeId {
        &self.id
    }

    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn as_write(&self) -> MovieWrite {
        MovieWrite {
            id: self.id.clone(),
            existing_version: Some(self.meta.version),
            title: self.title.clone(),
            release_year: self.release_year,
            run_time_minutes: self.run_time_minutes,
            extra: self.extra.clone(),
            actors: self.actors.iter().cloned().map(Relation::Id).collect(),
            directors: self.directors.iter().cloned().map(Relation::Id).collect(),
            rating: self.rating.clone().map(Relation::Id),
        }
    }

    fn from_write(write: &MovieWrite) -> Self {
        Self {
            id: write.id.clone(),
            meta: write_meta(write.existing_version),
            title: write.title.clone(),
            release_year: write.release_year,
            run_time_minutes: write.run_time_minutes,
            extra: write.extra.clone(),
            actors: write.actors.iter().map(|a| a.id().clone()).collect(),
            directors: write.directors.iter().map(|d| d.id().clone()).collect(),
            rating: write.rating.as_ref().map(|r| r.id().clone()),
        }
    }

    fn attach_edges(&mut self, field: &str, edges: &[Edge]) -> Result<()> {
        match field {
            "actors" => self.actors = far_ends(edges, Direction::Outwards),
            "directors" => self.directors = far_ends(edges, Direction::Outwards),
            _ => {}
        }
        Ok(())
    }

    fn related_ids(&self, field: &str) -> Vec<NodeId> {
        match field {
            "actors" => self.actors.clone(),
            "directors" => self.directors.clone(),
            "rating" => self.rating.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

impl EntityList<Movie> {
    /// Every actor in any of the listed movies
    pub fn actor_ids(&self) -> Vec<NodeId> {
        self.related_ids("actors")
    }

    /// Every director of any of the listed movies
    pub fn director_ids(&self) -> Vec<NodeId> {
        self.related_ids("directors")
    }

    /// Ratings of the listed movies
    pub fn rating_ids(&self) -> Vec<NodeId> {
        self.related_ids("rating")
    }
}
