//! Relation population
//!
//! A raw `populate` parameter is parsed into a [`PopulateSpec`], resolved
//! against the schema into [`PopulationStep`]s (nested parameters already
//! normalized), and finally loaded in batches by the loader.

pub(crate) mod loader;
mod resolver;
mod spec;

pub use resolver::{PopulationStep, PopulationTarget};
pub(crate) use resolver::resolve;
pub use spec::{NestedPopulate, PopulateSpec};
