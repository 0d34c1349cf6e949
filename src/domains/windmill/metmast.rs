use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::view;
use crate::core::types::{NodeId, NodeMeta, ViewId};
use crate::filter::{CommonFilter, Filter, FilterBuilder, ViewFilter};
use crate::model::{write_meta, Entity, FieldSpec, PropertyWriter, ViewSpec, WriteEntity};

static METMAST: Lazy<ViewSpec> =
    Lazy::new(|| ViewSpec::new(view("Metmast"), vec![FieldSpec::scalar("position")]));

/// Meteorological mast, as read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metmast {
    /// Identifier
    #[serde(flatten)]
    pub id: NodeId,
    /// Server metadata
    #[serde(flatten)]
    pub meta: NodeMeta,
    /// Position along the park layout
    #[serde(default)]
    pub position: Option<f64>,
}

/// Meteorological mast, to be written
#[derive(Debug, Clone, PartialEq)]
pub struct MetmastWrite {
    /// Identifier
    pub id: NodeId,
    /// Expected current version
    pub existing_version: Option<i64>,
    /// Position along the park layout
    pub position: Option<f64>,
}

impl MetmastWrite {
    /// Mast at `position`
    pub fn new(space: &str, external_id: &str, position: Option<f64>) -> Self {
        Self {
            id: NodeId::new(space, external_id),
            existing_version: None,
            position,
        }
    }
}

/// Criteria for listing met masts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetmastFilter {
    /// Position at least
    pub min_position: Option<f64>,
    /// Position at most
    pub max_position: Option<f64>,
    /// Id prefix, space and raw filter
    pub common: CommonFilter,
}

impl ViewFilter for MetmastFilter {
    fn build(&self, view: &ViewId) -> Option<Filter> {
        FilterBuilder::new(view)
            .range("position", self.min_position, self.max_position)
            .common(&self.common)
            .build()
    }
}

impl WriteEntity for MetmastWrite {
    fn view_spec(&self) -> &'static ViewSpec {
        &METMAST
    }

    fn id(&self) -> &NodeId {
        &self.id
    }

    fn existing_version(&self) -> Option<i64> {
        self.existing_version
    }

    fn write_properties(&self, writer: &mut PropertyWriter) {
        writer.optional("position", &self.position);
    }
}

impl Entity for Metmast {
    type Write = MetmastWrite;
    type Filter = MetmastFilter;

    fn spec() -> &'static ViewSpec {
        &METMAST
    }

    fn id(&self) -> &NodeId {
        &self.id
    }

    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn as_write(&self) -> MetmastWrite {
        MetmastWrite {
            id: self.id.clone(),
            existing_version: Some(self.meta.version),
            position: self.position,
        }
    }

    fn from_write(write: &MetmastWrite) -> Self {
        Self {
            id: write.id.clone(),
            meta: write_meta(write.existing_version),
            position: write.position,
        }
    }
}
