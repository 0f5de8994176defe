use thiserror::Error;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

pub type InventoryResult<T> = Result<T, InventoryError>;

impl From<mongodb::error::Error> for InventoryError {
    fn from(err: mongodb::error::Error) -> Self {
        InventoryError::Database(err.to_string())
    }
}
