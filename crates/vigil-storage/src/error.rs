use vigil_common::expression::ExpressionError;

/// Errors that can occur within the storage layer.
///
/// Every store method maps engine failures into one of these variants at its
/// own boundary, so callers never need to inspect raw SQL errors.
///
/// # Examples
///
/// ```rust
/// use vigil_storage::error::StorageError;
///
/// let err = StorageError::NotFound {
///     entity: "alarm_definition",
///     id: "123".to_string(),
/// };
/// assert!(err.to_string().contains("alarm_definition"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required record was not found for the tenant.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// A row with the same `(tenant_id, name)` already exists.
    #[error("Storage: {entity} named '{name}' already exists")]
    AlreadyExists { entity: &'static str, name: String },

    /// An action list references a notification method the tenant does not own.
    #[error("Storage: notification method '{id}' does not exist")]
    InvalidActionReference { id: String },

    /// The stored or supplied expression failed to parse.
    #[error("Storage: invalid expression: {0}")]
    Expression(#[from] ExpressionError),

    /// A column held a value that cannot be mapped back to a domain type.
    #[error("Storage: unexpected value '{value}' in column '{column}'")]
    UnexpectedColumnValue { column: &'static str, value: String },

    /// JSON serialization or deserialization failure (e.g. the match_by column).
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An underlying database error.
    #[error("Storage: database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl StorageError {
    /// Maps a unique-constraint violation on `(tenant_id, name)` to
    /// [`StorageError::AlreadyExists`]; any other error is kept as-is.
    pub(crate) fn from_insert(err: sea_orm::DbErr, entity: &'static str, name: &str) -> Self {
        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => StorageError::AlreadyExists {
                entity,
                name: name.to_string(),
            },
            _ => StorageError::Database(err),
        }
    }
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
