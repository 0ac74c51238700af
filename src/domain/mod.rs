//! Domain types shared between the data layer and the API.

mod role;

pub use role::{Role, UnknownRole};
