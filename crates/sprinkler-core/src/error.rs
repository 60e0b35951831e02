use thiserror::Error;

#[derive(Debug, Error)]
pub enum SprinklerError {
    #[error("malformed state document: {0}")]
    StateFormat(String),

    #[error("log store {op} failed for '{key}': {message}")]
    Store {
        op: &'static str,
        key: String,
        message: String,
    },

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SprinklerError>;
