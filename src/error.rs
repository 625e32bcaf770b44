use thiserror::Error;

#[derive(Error, Debug)]
pub enum VolmanError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid path: {0}")]
    Path(String),

    #[error("Device filter construction failed: {0}")]
    FilterConstruction(String),

    #[error("Invalid device filter pattern '{pattern}': {source}")]
    FilterPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Device cache error: {0}")]
    DeviceCache(String),

    #[error("Persistent filter cache load failed: {0}")]
    CacheLoad(String),

    #[error("Format module load failed: {0}")]
    FormatLoad(String),

    #[error("Default format '{0}' matches no registered format handler")]
    FormatSelection(String),

    #[error("Invalid units specification: {0}")]
    InvalidUnits(String),

    #[error("Memory arena allocation failed: {0}")]
    Allocation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VolmanError>;
