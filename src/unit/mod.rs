//! Business unit nodes and their declarative descriptions

mod data;
pub mod loader;

pub use data::Unit;
pub use loader::UnitSpec;
