use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Malformed credential input: {0}")]
    MalformedInput(&'static str),

    #[error("Settings transport failure: {0}")]
    Transport(String),

    #[error("Hash backend unavailable: {0}")]
    Configuration(String),

    #[error("New credential matches recent history")]
    ReusedCredential,

    #[error("Credential quality below device policy requirement")]
    InsufficientQuality,

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}
