//! The macro call-site dependency graph used by `pod-expander`'s
//! discovery, dependency-probing, and ordering phases.

mod error;
mod graph;

pub use error::GraphError;
pub use graph::{Graph, MacroSite};
