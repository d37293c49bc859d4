use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures of the persistence gateway. All of them are fatal to the
/// operation that raised them; nothing is retried.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to load configuration for database connection: {0}")]
    ConnectionConfigError(String),

    #[error("Failed to connect to the database: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Failed to insert a batch of {batch_size} trades: {source}")]
    Insert {
        batch_size: usize,
        #[source]
        source: BoxError,
    },

    #[error("Failed to truncate the trades table: {0}")]
    Truncate(#[source] sqlx::Error),

    #[error("Refusing to persist an invalid trade: {0}")]
    InvalidRecord(#[from] core_types::CoreError),

    #[error("Invalid dashboard link: {0}")]
    InvalidLink(String),

    #[error("The requested data was not found in the database.")]
    NotFound,

    #[error("Arithmetic overflow while aggregating {0}")]
    Overflow(String),
}

/// The name the rest of the system uses for gateway failures.
pub type PersistenceError = DbError;
