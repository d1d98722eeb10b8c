use thiserror::Error;

/// Errors raised anywhere in the collection pipeline.
///
/// `Connection` and `Auth` are fatal to the operation that raised them; a streaming loop
/// stops on them. `Transform`, and `Schema` raised for a single record, only affect the
/// record at hand. `Unavailable` is a broker hiccup the client recovers from on its own.
#[derive(Debug, Error)]
pub enum Error {
    /// The store or the broker could not be reached, or dropped the connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// The broker is briefly unreachable; its client reconnects by itself.
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    /// Credentials were rejected, or could not be resolved.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Records do not fit the destination table (or each other).
    #[error("schema error: {0}")]
    Schema(String),

    /// A raw event could not be turned into a record.
    #[error("transform error: {0}")]
    Transform(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[source] tokio_postgres::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("archive error: {0}")]
    Archive(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether a long running loop should give up after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Auth(_) | Error::Config(_))
    }
}

impl From<tokio_postgres::Error> for Error {
    fn from(err: tokio_postgres::Error) -> Self {
        use tokio_postgres::error::SqlState;

        let Some(code) = err.code() else {
            // no SQLSTATE: the failure happened below the protocol (io, closed socket, tls)
            return Error::Connection(err.to_string());
        };

        if code.code().starts_with("28") {
            return Error::Auth(err.to_string());
        }
        if code.code().starts_with("08") {
            return Error::Connection(err.to_string());
        }

        let schema_codes = [
            SqlState::UNDEFINED_TABLE,
            SqlState::UNDEFINED_COLUMN,
            SqlState::DATATYPE_MISMATCH,
            SqlState::INVALID_COLUMN_REFERENCE,
            SqlState::DUPLICATE_COLUMN,
            SqlState::NOT_NULL_VIOLATION,
            SqlState::FOREIGN_KEY_VIOLATION,
            SqlState::NUMERIC_VALUE_OUT_OF_RANGE,
        ];
        if schema_codes.contains(code) {
            let detail = err
                .as_db_error()
                .map(|db| db.message().to_string())
                .unwrap_or_else(|| err.to_string());
            return Error::Schema(detail);
        }

        Error::Database(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Transform(err.to_string())
    }
}
