#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("failed to load macro module `{specifier}`")]
    Load {
        specifier: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("macro `{export}` threw during execution")]
    Execution {
        export: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("macro `{export}` did not return an AST node handle")]
    NotANode { export: String },

    #[error("macro `{export}` exceeded its execution budget and was interrupted")]
    Interrupted { export: String },

    #[error("macro `{export}` reported a fatal error: {message}")]
    ExplicitError { export: String, message: String },
}
