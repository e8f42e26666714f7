use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommonError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive error: {0}")]
    Archive(String),
    #[error("malformed desc record at line {line}: {message}")]
    MalformedDesc { line: usize, message: String },
    #[error("desc record is missing %{field}%")]
    MissingField { field: String },
}
