use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::view;
use crate::core::types::{NodeId, NodeMeta, StrMatch, ViewId};
use crate::filter::{CommonFilter, Filter, FilterBuilder, ViewFilter};
use crate::model::{write_meta, Entity, FieldSpec, PropertyWriter, ViewSpec, WriteEntity};

static BLADE: Lazy<ViewSpec> = Lazy::new(|| {
    ViewSpec::new(
        view("Blade"),
        vec![FieldSpec::scalar("name"), FieldSpec::scalar("isDamaged")],
    )
});

/// A rotor blade, as read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blade {
    /// Identifier
    #[serde(flatten)]
    pub id: NodeId,
    /// Server metadata
    #[serde(flatten)]
    pub meta: NodeMeta,
    /// Blade label
    #[serde(default)]
    pub name: Option<String>,
    /// Flagged for repair
    #[serde(default)]
    pub is_damaged: Option<bool>,
}

/// A rotor blade, to be written
#[derive(Debug, Clone, PartialEq)]
pub struct BladeWrite {
    /// Identifier
    pub id: NodeId,
    /// Expected current version
    pub existing_version: Option<i64>,
    /// Blade label
    pub name: Option<String>,
    /// Flagged for repair
    pub is_damaged: Option<bool>,
}

impl BladeWrite {
    /// Blade with a label
    pub fn new(space: &str, external_id: &str, name: &str) -> Self {
        Self {
            id: NodeId::new(space, external_id),
            existing_version: None,
            name: Some(name.to_string()),
            is_damaged: None,
        }
    }
}

/// Criteria for listing blades
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BladeFilter {
    /// Name equals / is one of
    pub name: Option<StrMatch>,
    /// Name starts with
    pub name_prefix: Option<String>,
    /// Damaged or not
    pub is_damaged: Option<bool>,
    /// Id prefix, space and raw filter
    pub common: CommonFilter,
}

impl ViewFilter for BladeFilter {
    fn build(&self, view: &ViewId) -> Option<Filter> {
        FilterBuilder::new(view)
            .matches("name", self.name.as_ref())
            .prefix("name", self.name_prefix.as_deref())
            .equals("isDamaged", self.is_damaged)
            .common(&self.common)
            .build()
    }
}

impl WriteEntity for BladeWrite {
    fn view_spec(&self) -> &'static ViewSpec {
        &BLADE
    }

    fn id(&self) -> &NodeId {
        &self.id
    }

    fn existing_version(&self) -> Option<i64> {
        self.existing_version
    }

    fn write_properties(&self, writer: &mut PropertyWriter) {
        writer
            .optional("name", &self.name)
            .optional("isDamaged", &self.is_damaged);
    }
}

impl Entity for Blade {
    type Write = BladeWrite;
    type Filter = BladeFilter;

    fn spec() -> &'static ViewSpec {
        &BLADE
    }

    fn id(&self) -> &NodeId {
        &self.id
    }

    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn as_write(&self) -> BladeWrite {
        BladeWrite {
            id: self.id.clone(),
            existing_version: Some(self.meta.version),
            name: self.name.clone(),
            is_damaged: self.is_damaged,
        }
    }

    fn from_write(write: &BladeWrite) -> Self {
        Self {
            id: write.id.clone(),
            meta: write_meta(write.existing_version),
            name: write.name.clone(),
            is_damaged: write.is_damaged,
        }
    }
}
