use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("unexpected character '{0}' at offset {1}")]
    UnexpectedChar(char, usize),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unexpected end of expression")]
    UnexpectedEof,

    #[error("expected {expected}, found '{found}'")]
    UnexpectedToken { expected: String, found: String },

    #[error("unknown function '{0}'")]
    UnknownFunction(String),
}

pub type Result<T> = std::result::Result<T, Error>;
