use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Fetch failed for '{target}': {message}")]
    Fetch { target: String, message: String },

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Score error: previous value is zero")]
    DivideByZero,

    #[error("Store write failed for listing {listing_id}: {message}")]
    StoreWrite { listing_id: String, message: String },

    #[error("Notify error: {0}")]
    Notify(String),

    #[error("Another run holds the lock file: {0}")]
    RunLocked(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
