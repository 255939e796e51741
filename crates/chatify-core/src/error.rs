use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),
}

#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("No response within {0}s")]
    Timeout(u64),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Missing API key for provider: {0}")]
    MissingApiKey(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Error, Debug, Clone)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid message role: {0}")]
    InvalidRole(String),

    #[error("Conversation title must not be empty")]
    InvalidTitle,

    #[error("Partial write: {written} of {expected} rows stored")]
    PartialWrite { expected: usize, written: usize },

    #[error("Stored rows do not match the sent messages: {0}")]
    Mismatch(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file error: {0}")]
    File(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}
