//! Loading and validation of engine config, boards and upgrade loadouts.

pub mod load;
pub mod schema;

pub use load::*;
pub use schema::*;
