//! Movies data model
//!
//! People hold roles (actor or director); roles point at the movies they
//! played in and any nominations; movies point back at their actors and
//! directors and at a rating.

mod movie;
mod nomination;
mod person;
mod rating;
mod role;

pub use movie::{Movie, MovieFilter, MovieWrite};
pub use nomination::{Nomination, NominationFilter, NominationWrite};
pub use person::{Person, PersonFilter, PersonWrite};
pub use rating::{Rating, RatingFilter, RatingWrite};
pub use role::{Actor, ActorFilter, ActorWrite, Director, DirectorFilter, DirectorWrite, RoleWrite};

use crate::core::types::ViewId;

/// Space the views are defined in
pub const SPACE: &str = "movies";

/// Version of every view in the model
pub const VERSION: &str = "2";

/// Instance space used when none is given
pub const DEFAULT_INSTANCE_SPACE: &str = "movies";

/// A view of the movies model
pub fn view(external_id: &str) -> ViewId {
    ViewId::new(SPACE, external_id, VERSION)
}
