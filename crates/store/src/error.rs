use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record was not found.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// An optimistic-concurrency write lost the race.
    /// The expected version did not match the stored version.
    #[error("Version conflict on {entity} {key}: expected version {expected}")]
    VersionConflict {
        entity: &'static str,
        key: String,
        expected: i64,
    },

    /// A uniqueness constraint was violated (e.g. duplicate order number).
    #[error("Duplicate {entity}: {key}")]
    Duplicate { entity: &'static str, key: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted value failed to decode into its domain type.
    #[error("Decode error: {0}")]
    Decode(#[from] domain::DomainError),
}
