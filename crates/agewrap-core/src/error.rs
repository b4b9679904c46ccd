use thiserror::Error;

pub type AgewrapResult<T> = Result<T, AgewrapError>;

#[derive(Debug, Error)]
pub enum AgewrapError {
    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
