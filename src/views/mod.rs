//! Typed facades over the instances API

pub mod query;
pub mod view;

pub use query::{QueryApi, QueryBuilder, QueryResult, QueryStep};
pub use view::{ListOptions, ViewApi, DEFAULT_LIMIT_READ};
