use thiserror::Error;

/// Problems with a site config file or embedded config blob.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Contact recipient is not a valid email address: {0}")]
    InvalidRecipient(String),

    #[error("Field rule '{field}' has min {min} greater than max {max}")]
    InvertedBounds { field: String, min: usize, max: usize },

    #[error("Field rule '{0}' is defined more than once")]
    DuplicateField(String),
}

/// Why the experience list could not be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("Request failed: {0}")]
    Network(String),

    #[error("Server returned status {0}")]
    Status(u16),

    #[error("Malformed experience document: {0}")]
    Malformed(String),
}
