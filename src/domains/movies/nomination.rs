use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::view;
use crate::core::types::{NodeId, NodeMeta, StrMatch, ViewId};
use crate::filter::{CommonFilter, Filter, FilterBuilder, ViewFilter};
use crate::model::{write_meta, Entity, FieldSpec, PropertyWriter, ViewSpec, WriteEntity};

static NOMINATION: Lazy<ViewSpec> = Lazy::new(|| {
    ViewSpec::new(
        view("Nomination"),
        vec![FieldSpec::required("name"), FieldSpec::scalar("year")],
    )
});

/// An award nomination, as read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nomination {
    /// Identifier
    #[serde(flatten)]
    pub id: NodeId,
    /// Server metadata
    #[serde(flatten)]
    pub meta: NodeMeta,
    /// Award category
    pub name: String,
    /// Award year
    #[serde(default)]
    pub year: Option<i64>,
}

/// An award nomination, to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NominationWrite {
    /// Identifier
    pub id: NodeId,
    /// Expected current version
    pub existing_version: Option<i64>,
    /// Award category
    pub name: String,
    /// Award year
    pub year: Option<i64>,
}

impl NominationWrite {
    /// Nomination for `name` in `year`
    pub fn new(space: &str, external_id: &str, name: &str, year: Option<i64>) -> Self {
        Self {
            id: NodeId::new(space, external_id),
            existing_version: None,
            name: name.to_string(),
            year,
        }
    }
}

/// Criteria for listing nominations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NominationFilter {
    /// Name equals / is one of
    pub name: Option<StrMatch>,
    /// Name starts with
    pub name_prefix: Option<String>,
    /// In or after
    pub min_year: Option<i64>,
    /// In or before
    pub max_year: Option<i64>,
    /// Id prefix, space and raw filter
    pub common: CommonFilter,
}

impl ViewFilter for NominationFilter {
    fn build(&self, view: &ViewId) -> Option<Filter> {
        FilterBuilder::new(view)
            .matches("name", self.name.as_ref())
            .prefix("name", self.name_prefix.as_deref())
            .range("year", self.min_year, self.max_year)
            .common(&self.common)
            .build()
    }
}

impl WriteEntity for NominationWrite {
    fn view_spec(&self) -> &'static ViewSpec {
        &NOMINATION
    }

    fn id(&self) -> &NodeId {
        &self.id
    }

    fn existing_version(&self) -> Option<i64> {
        self.existing_version
    }

    fn write_properties(&self, writer: &mut PropertyWriter) {
        writer.required("name", &self.name).optional("year", &self.year);
    }
}

impl Entity for Nomination {
    type Write = NominationWrite;
    type Filter = NominationFilter;

    fn spec() -> &'static ViewSpec {
        &NOMINATION
    }

    fn id(&self) -> &NodeId {
        &self.id
    }

    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn as_write(&self) -> NominationWrite {
        NominationWrite {
            id: self.id.clone(),
            existing_version: Some(self.meta.version),
            name: self.name.clone(),
            year: self.year,
        }
    }

    fn from_write(write: &NominationWrite) -> Self {
        Self {
            id: write.id.clone(),
            meta: write_meta(write.existing_version),
            name: write.name.clone(),
            year: write.year,
        }
    }
}
