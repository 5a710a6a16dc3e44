use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("entity not found: {0}")]
    NotFound(String),
    #[error("entity already exists: {0}")]
    Conflict(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("database error: {0}")]
    Db(String),
}

impl ModelError {
    pub fn not_found(table: &str, partition_key: &str, row_key: &str) -> Self {
        Self::NotFound(format!("{table}({partition_key}, {row_key})"))
    }

    pub fn conflict(table: &str, partition_key: &str, row_key: &str) -> Self {
        Self::Conflict(format!("{table}({partition_key}, {row_key})"))
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(e: serde_json::Error) -> Self { Self::Serialization(e.to_string()) }
}

impl From<sea_orm::DbErr> for ModelError {
    fn from(e: sea_orm::DbErr) -> Self { Self::Db(e.to_string()) }
}
