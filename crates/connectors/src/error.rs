use thiserror::Error;

/// Errors raised while establishing or authenticating a destination
/// connection. Mapped onto `model::error::ReplicationError` at the driver
/// boundary via `ReplicationError::from_provider_message`.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("invalid destination URL or DSN: {0}")]
    InvalidUrl(String),

    #[error("TLS configuration error: {0}")]
    TlsConfig(#[from] native_tls::Error),

    #[error("Postgres connection error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("MySQL connection error: {0}")]
    MySql(#[from] mysql_async::Error),

    #[error("sqlite/libsql connection error: {0}")]
    Sqlite(#[from] libsql::Error),

    #[error("HTTP connector error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider connection error: {0}")]
    Provider(String),
}

/// Errors raised while executing a write (or schema introspection) against
/// an already-established destination connection.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("MySQL error: {0}")]
    MySql(#[from] mysql_async::Error),

    #[error("sqlite/libsql error: {0}")]
    Sqlite(#[from] libsql::Error),

    #[error("query build error: {0}")]
    QueryBuild(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("provider error: {0}")]
    Provider(String),
}

/// Top-level error returned by a connector's public operations, aggregating
/// the connect-time and execute-time variants plus a few adapter-layer
/// concerns (unsupported capability, malformed config).
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("connector error: {0}")]
    Connector(#[from] ConnectorError),

    #[error("database error: {0}")]
    Database(#[from] DbError),

    #[error("unsupported capability for this destination: {0}")]
    UnsupportedCapability(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
