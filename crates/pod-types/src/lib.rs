//! Domain types shared across the `pod` workspace: macro-site identity,
//! the deploy manifest and lock file, and the named error kinds used by
//! the expander and the deploy orchestrator.

pub mod deploy;
pub mod error;
pub mod macros;

pub use deploy::{
    ActionKind, EnsureKind, LockEnsureEntry, LockFile, Manifest, Operation, Target, Transport,
    VerifyKind, When,
};
pub use error::{DeployError, ExpanderError};
pub use macros::{FileDirective, SiteKey};
