//! Type definitions for keeper storage.

mod data;
mod ids;
mod metadata;
mod objects;
mod users;

pub use data::*;
pub use ids::*;
pub use metadata::*;
pub use objects::*;
pub use users::*;
