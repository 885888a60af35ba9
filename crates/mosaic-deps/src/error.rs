use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("invalid version `{0}`")]
    InvalidVersion(String),

    #[error("invalid constraint `{text}`: {reason}")]
    InvalidConstraint { text: String, reason: String },

    #[error("no package name in `{0}`")]
    MissingName(String),
}

pub type Result<T> = std::result::Result<T, VersionError>;
