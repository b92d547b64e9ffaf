use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("Unknown engine: {0}")]
    UnknownEngine(String),

    #[error("Unknown {kind} '{name}' for engine '{engine}'")]
    UnknownComponent {
        kind: &'static str,
        name: String,
        engine: String,
    },

    #[error("Invalid component path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Component path not found: {0}")]
    PathNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Formula error: {0}")]
    Formula(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Recursion limit of {0} exceeded")]
    RecursionLimit(u32),

    #[error("Scenario error: {0}")]
    Scenario(String),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AiError>;
