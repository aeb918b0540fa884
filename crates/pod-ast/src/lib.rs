//! Dynamic value representation and AST-factory plumbing shared between
//! the macro expander and the macro host runtime.

pub mod arena;
pub mod factory;
pub mod handle;
pub mod parsing;
pub mod value;

pub use arena::{NodeArena, NodeId};
pub use handle::NodeHandle;
pub use parsing::{ParsedSource, parse_script_fragment, parse_source, print_module, strip_typescript};
pub use value::Value;
