use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("missing precursor artifact: {path}")]
    MissingInput { path: String },

    #[error("Malformed record in {path} at line {line}: {source}")]
    MalformedRecord {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Customer '{customer_id}' has an unparsable membership date '{value}'")]
    InvalidMemberDate { customer_id: String, value: String },

    #[error("Offer '{offer_id}' has unknown offer_type '{value}'")]
    UnknownOfferType { offer_id: String, value: String },

    #[error("Stage '{stage}' requires {artifact}, which no earlier stage produced")]
    MissingPrecursor { stage: &'static str, artifact: &'static str },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not enough data for {what}: need {needed}, got {actual}")]
    InsufficientData {
        what: &'static str,
        needed: usize,
        actual: usize,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
