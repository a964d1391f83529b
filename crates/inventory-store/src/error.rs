use inventory_schema::SchemaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("store answered HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("cannot decode store response: {0}")]
    Decode(String),
    #[error("mutation rejected: {0}")]
    Rejected(String),
    #[error("blank node `{0}` was not assigned a uid")]
    UnknownBlank(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("transaction is read-only")]
    ReadOnly,
    #[error("transaction already committed")]
    Finished,
    #[error("client is closed")]
    Closed,
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}
