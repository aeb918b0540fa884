//! Named error kinds for the expander and the deploy orchestrator.
//!
//! These are the conceptual kinds, not a one-to-one mirror of every call
//! site's `anyhow::Error` — most of `pod`'s functions still return
//! `anyhow::Result` and attach `.context(...)`. These enums exist so the
//! handful of places that must
//! distinguish fatal-vs-recoverable (the expander's inline-call handling)
//! or that the test suite asserts on (cycle detection, package-import
//! rejection) have a stable, matchable shape.

use crate::macros::SiteKey;

#[derive(Debug, thiserror::Error)]
pub enum ExpanderError {
    #[error("failed to parse {file} as a TypeScript-family source file")]
    Parse {
        file: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("cannot resolve `{name}` in {file}: not a const binding or an importable value")]
    Resolution { name: String, file: String },

    #[error("`{name}` in {file} is a `let`/`var` binding; macro arguments must be const")]
    NonConstBinding { name: String, file: String },

    #[error(
        "`{name}` in {file} is imported from the package specifier `{specifier}`; \
         macro arguments must be compile-time-knowable, not runtime values from foreign modules"
    )]
    PackageImport {
        name: String,
        file: String,
        specifier: String,
    },

    #[error("cycle detected among macro sites: {}", render_cycle(.0))]
    CycleDetected(Vec<SiteKey>),

    #[error("macro `{macro_name}` did not return an AST node")]
    MacroReturn { macro_name: String },

    #[error("failed to load macro module `{specifier}`")]
    MacroLoad {
        specifier: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("macro `{macro_name}` threw during execution")]
    MacroExecution {
        macro_name: String,
        #[source]
        source: anyhow::Error,
    },
}

fn render_cycle(path: &[SiteKey]) -> String {
    path.iter()
        .map(SiteKey::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("operation `{operation}` failed")]
    Operation {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("transport failure")]
    Transport(#[source] anyhow::Error),

    #[error("verification failed for operation `{operation}`")]
    VerificationFailed { operation: String },
}

impl DeployError {
    /// Wraps any deploy-time error into the `Operation` variant: transport
    /// and verification failures are always reported as the failure of
    /// the enclosing operation.
    pub fn into_operation(self, operation: impl Into<String>) -> DeployError {
        match self {
            DeployError::Operation { .. } => self,
            DeployError::Transport(source) => DeployError::Operation {
                operation: operation.into(),
                source,
            },
            DeployError::VerificationFailed { operation } => DeployError::Operation {
                operation,
                source: anyhow::anyhow!("verification returned a non-success result"),
            },
        }
    }
}
