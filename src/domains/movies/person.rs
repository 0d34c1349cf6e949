use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::{view, RoleWrite};
use crate::core::error::Result;
use crate::core::types::{Direction, NodeId, NodeMeta, StrMatch, ViewId};
use crate::filter::{CommonFilter, Filter, FilterBuilder, ViewFilter};
use crate::instances::types::Edge;
use crate::model::{
    far_ends, write_meta, EdgeRef, Entity, EntityList, FieldSpec, PropertyWriter, Relation,
    ViewSpec, WriteEntity,
};

static PERSON: Lazy<ViewSpec> = Lazy::new(|| {
    ViewSpec::new(
        view("Person"),
        vec![
            FieldSpec::required("name"),
            FieldSpec::scalar("birthYear"),
            FieldSpec::edge(
                "roles",
                "Person.roles",
                Direction::Outwards,
                vec![view("Actor"), view("Director")],
            ),
        ],
    )
});

/// A person, as read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    /// Identifier
    #[serde(flatten)]
    pub id: NodeId,
    /// Server metadata
    #[serde(flatten)]
    pub meta: NodeMeta,
    /// Full name
    pub name: String,
    /// Year of birth
    #[serde(default)]
    pub birth_year: Option<i64>,
    /// Actor and director roles
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<NodeId>,
}

/// A person, to be written
#[derive(Debug, Clone, PartialEq)]
pub struct PersonWrite {
    /// Identifier
    pub id: NodeId,
    /// Expected current version
    pub existing_version: Option<i64>,
    /// Full name
    pub name: String,
    /// Year of birth
    pub birth_year: Option<i64>,
    /// Roles, existing or created along with the person
    pub roles: Vec<Relation<RoleWrite>>,
}

impl PersonWrite {
    /// Person with only the required fields set
    pub fn new(space: &str, external_id: &str, name: &str) -> Self {
        Self {
            id: NodeId::new(space, external_id),
            existing_version: None,
            name: name.to_string(),
            birth_year: None,
            roles: Vec::new(),
        }
    }
}

/// Criteria for listing people
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonFilter {
    /// Name equals / is one of
    pub name: Option<StrMatch>,
    /// Name starts with
    pub name_prefix: Option<String>,
    /// Born in or after
    pub min_birth_year: Option<i64>,
    /// Born in or before
    pub max_birth_year: Option<i64>,
    /// Id prefix, space and raw filter
    pub common: CommonFilter,
}

impl ViewFilter for PersonFilter {
    fn build(&self, view: &ViewId) -> Option<Filter> {
        FilterBuilder::new(view)
            .matches("name", self.name.as_ref())
            .prefix("name", self.name_prefix.as_deref())
            .range("birthYear", self.min_birth_year, self.max_birth_year)
            .common(&self.common)
            .build()
    }
}

impl WriteEntity for PersonWrite {
    fn view_spec(&self) -> &'static ViewSpec {
        &PERSON
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
            .optional("birthYear", &self.birth_year);
    }

    fn edges(&self) -> Vec<EdgeRef<'_>> {
        self.roles.iter().map(|role| EdgeRef::to("roles", role)).collect()
    }
}

impl Entity for Person {
    type Write = PersonWrite;
    type Filter = PersonFilter;

    fn spec() -> &'static ViewSpec {
        &PERSON
    }

    fn id(&self) -> &NodeId {
        &self.id
    }

    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn as_write(&self) -> PersonWrite {
        PersonWrite {
            id: self.id.clone(),
            existing_version: Some(self.meta.version),
            name: self.name.clone(),
            birth_year: self.birth_year,
            roles: self.roles.iter().cloned().map(Relation::Id).collect(),
        }
    }

    fn from_write(write: &PersonWrite) -> Self {
        Self {
            id: write.id.clone(),
            meta: write_meta(write.existing_version),
            name: write.name.clone(),
            birth_year: write.birth_year,
            roles: write.roles.iter().map(|r| r.id().clone()).collect(),
        }
    }

    fn attach_edges(&mut self, field: &str, edges: &[Edge]) -> Result<()> {
        if field == "roles" {
            self.roles = far_ends(edges, Direction::Outwards);
        }
        Ok(())
    }

    fn related_ids(&self, field: &str) -> Vec<NodeId> {
        match field {
            "roles" => self.roles.clone(),
            _ => Vec::new(),
        }
    }
}

impl EntityList<Person> {
    /// Every role referenced by the listed people
    pub fn role_ids(&self) -> Vec<NodeId> {
        self.related_ids("roles")
    }
}
