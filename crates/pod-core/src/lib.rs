//! The core façade gluing the macro-expansion stack (`pod-graph` /
//! `pod-host` / `pod-ast` / `pod-expander`) and the deploy stack
//! (`pod-deploy`) into the two entry points `pod-cli` actually needs real
//! logic for: compiling a project's macros and running a deploy target.

mod config;
mod compile;
mod deploy;

pub use compile::{FileResult, expand_one, expand_project};
pub use config::ProjectConfig;
pub use deploy::run_deploy;
