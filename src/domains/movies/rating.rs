use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::view;
use crate::core::types::{NodeId, NodeMeta, ViewId};
use crate::filter::{CommonFilter, Filter, FilterBuilder, ViewFilter};
use crate::model::{write_meta, Entity, FieldSpec, PropertyWriter, ViewSpec, WriteEntity};

static RATING: Lazy<ViewSpec> = Lazy::new(|| {
    ViewSpec::new(
        view("Rating"),
        vec![FieldSpec::scalar("score"), FieldSpec::scalar("votes")],
    )
});

/// Audience rating of a movie, as read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    /// Identifier
    #[serde(flatten)]
    pub id: NodeId,
    /// Server metadata
    #[serde(flatten)]
    pub meta: NodeMeta,
    /// Average score
    #[serde(default)]
    pub score: Option<f64>,
    /// Number of votes
    #[serde(default)]
    pub votes: Option<i64>,
}

/// Audience rating, to be written
#[derive(Debug, Clone, PartialEq)]
pub struct RatingWrite {
    /// Identifier
    pub id: NodeId,
    /// Expected current version
    pub existing_version: Option<i64>,
    /// Average score
    pub score: Option<f64>,
    /// Number of votes
    pub votes: Option<i64>,
}

impl RatingWrite {
    /// Rating with a score and vote count
    pub fn new(space: &str, external_id: &str, score: f64, votes: i64) -> Self {
        Self {
            id: NodeId::new(space, external_id),
            existing_version: None,
            score: Some(score),
            votes: Some(votes),
        }
    }
}

/// Criteria for listing ratings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatingFilter {
    /// Score at least
    pub min_score: Option<f64>,
    /// Score at most
    pub max_score: Option<f64>,
    /// Votes at least
    pub min_votes: Option<i64>,
    /// Votes at most
    pub max_votes: Option<i64>,
    /// Id prefix, space and raw filter
    pub common: CommonFilter,
}

impl ViewFilter for RatingFilter {
    fn build(&self, view: &ViewId) -> Option<Filter> {
        FilterBuilder::new(view)
            .range("score", self.min_score, self.max_score)
            .range("votes", self.min_votes, self.max_votes)
            .common(&self.common)
            .build()
    }
}

impl WriteEntity for RatingWrite {
    fn view_spec(&self) -> &'static ViewSpec {
        &RATING
    }

    fn id(&self) -> &NodeId {
        &self.id
    }

    fn existing_version(&self) -> Option<i64> {
        self.existing_version
    }

    fn write_properties(&self, writer: &mut PropertyWriter) {
        writer
            .optional("score", &self.score)
            .optional("votes", &self.votes);
    }
}

impl Entity for Rating {
    type Write = RatingWrite;
    type Filter = RatingFilter;

    fn spec() -> &'static ViewSpec {
        &RATING
    }

    fn id(&self) -> &NodeId {
        &self.id
    }

    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn as_write(&self) -> RatingWrite {
        RatingWrite {
            id: self.id.clone(),
            existing_version: Some(self.meta.version),
            score: self.score,
            votes: self.votes,
        }
    }

    fn from_write(write: &RatingWrite) -> Self {
        Self {
            id: write.id.clone(),
            meta: write_meta(write.existing_version),
            score: write.score,
            votes: write.votes,
        }
    }
}
