//! Windmill data model
//!
//! A wind turbine has one nacelle (direct relation), any number of blades
//! (edges) and distances to nearby met masts (edges carrying a `distance`
//! property through the `Distance` edge view).

mod blade;
mod metmast;
mod nacelle;
mod wind_turbine;

pub use blade::{Blade, BladeFilter, BladeWrite};
pub use metmast::{Metmast, MetmastFilter, MetmastWrite};
pub use nacelle::{Nacelle, NacelleFilter, NacelleWrite};
pub use wind_turbine::{
    MetmastDistance, MetmastDistanceWrite, WindTurbine, WindTurbineFilter, WindTurbineWrite,
};

use crate::core::types::ViewId;

/// Space the views are defined in
pub const SPACE: &str = "power-models";

/// Version of every view in the model
pub const VERSION: &str = "1";

/// Instance space used when none is given
pub const DEFAULT_INSTANCE_SPACE: &str = "windmill-instances";

/// A view of the windmill model
pub fn view(external_id: &str) -> ViewId {
    ViewId::new(SPACE, external_id, VERSION)
}
