use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("unknown variant: {0}")]
    UnknownVariant(String),

    #[error("unknown entity kind: {0}")]
    UnknownEntityKind(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}
