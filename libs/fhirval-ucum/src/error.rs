use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("unknown UCUM unit symbol '{0}'")]
    UnknownUnit(String),

    #[error("malformed unit expression '{0}'")]
    Malformed(String),

    #[error("incompatible units: '{from}' is not convertible to '{to}'")]
    Incompatible { from: String, to: String },
}
