use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::view;
use crate::core::types::{NodeId, NodeMeta, ViewId};
use crate::filter::{CommonFilter, Filter, FilterBuilder, ViewFilter};
use crate::model::{write_meta, Entity, FieldSpec, PropertyWriter, ViewSpec, WriteEntity};

static NACELLE: Lazy<ViewSpec> = Lazy::new(|| {
    ViewSpec::new(
        view("Nacelle"),
        vec![
            FieldSpec::scalar("accFromBackSideX"),
            FieldSpec::scalar("yawDirection"),
        ],
    )
});

/// Turbine housing, as read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nacelle {
    /// Identifier
    #[serde(flatten)]
    pub id: NodeId,
    /// Server metadata
    #[serde(flatten)]
    pub meta: NodeMeta,
    /// Acceleration measured from the back side, x axis
    #[serde(default, rename = "accFromBackSideX")]
    pub acc_from_back_side_x: Option<f64>,
    /// Yaw direction in degrees
    #[serde(default)]
    pub yaw_direction: Option<f64>,
}

/// Turbine housing, to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NacelleWrite {
    /// Identifier
    pub id: NodeId,
    /// Expected current version
    pub existing_version: Option<i64>,
    /// Acceleration measured from the back side, x axis
    pub acc_from_back_side_x: Option<f64>,
    /// Yaw direction in degrees
    pub yaw_direction: Option<f64>,
}

impl NacelleWrite {
    /// Nacelle with no readings
    pub fn new(space: &str, external_id: &str) -> Self {
        Self {
            id: NodeId::new(space, external_id),
            existing_version: None,
            acc_from_back_side_x: None,
            yaw_direction: None,
        }
    }
}

/// Criteria for listing nacelles
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NacelleFilter {
    /// Yaw at least
    pub min_yaw_direction: Option<f64>,
    /// Yaw at most
    pub max_yaw_direction: Option<f64>,
    /// Id prefix, space and raw filter
    pub common: CommonFilter,
}

impl ViewFilter for NacelleFilter {
    fn build(&self, view: &ViewId) -> Option<Filter> {
        FilterBuilder::new(view)
            .range("yawDirection", self.min_yaw_direction, self.max_yaw_direction)
            .common(&self.common)
            .build()
    }
}

impl WriteEntity for NacelleWrite {
    fn view_spec(&self) -> &'static ViewSpec {
        &NACELLE
    }

    fn id(&self) -> &NodeId {
        &self.id
    }

    fn existing_version(&self) -> Option<i64> {
        self.existing_version
    }

    fn write_properties(&self, writer: &mut PropertyWriter) {
        writer
            .optional("accFromBackSideX", &self.acc_from_back_side_x)
            .optional("yawDirection", &self.yaw_direction);
    }
}

impl Entity for Nacelle {
    type Write = NacelleWrite;
    type Filter = NacelleFilter;

    fn spec() -> &'static ViewSpec {
        &NACELLE
    }

    fn id(&self) -> &NodeId {
        &self.id
    }

    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn as_write(&self) -> NacelleWrite {
        NacelleWrite {
            id: self.id.clone(),
            existing_version: Some(self.meta.version),
            acc_from_back_side_x: self.acc_from_back_side_x,
            yaw_direction: self.yaw_direction,
        }
    }

    fn from_write(write: &NacelleWrite) -> Self {
        Self {
            id: write.id.clone(),
            meta: write_meta(write.existing_version),
            acc_from_back_side_x: write.acc_from_back_side_x,
            yaw_direction: write.yaw_direction,
        }
    }
}
