use thiserror::Error;

#[derive(Error, Debug)]
pub enum InventaireError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown record kind: {0}")]
    UnknownKind(String),

    #[error("Missing column for {kind}: expected one of {expected}")]
    MissingColumn { kind: String, expected: String },

    #[error("Unknown field `{field}` for {entity} (editable: {allowed})")]
    UnknownField { entity: String, field: String, allowed: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, InventaireError>;
