use thiserror::Error;

/// Failure modes of the engine. None of these ever reach the host as a
/// panic; public operations log them and degrade to a no-op.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FlowError {
    #[error("{0} called before init")]
    NotInitialized(&'static str),

    #[error("extra field `{key}` on flow `{flow_key}` collides with a reserved field")]
    ReservedField { flow_key: String, key: String },

    #[error("no open flow named `{0}`")]
    UnknownFlow(String),

    #[error("sampling ratio {0} is outside [0, 1]")]
    InvalidRatio(f64),
}

pub type Result<T> = std::result::Result<T, FlowError>;
