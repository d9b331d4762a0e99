use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not decode {file} as any supported encoding")]
    Decode { file: String },

    #[error("Geocoding failed: {0}")]
    Geocode(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("No CSV files found in {0}")]
    NoInput(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;
