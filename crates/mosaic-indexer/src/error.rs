use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid seed pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("closure exceeds the component file bound ({count} > {max})")]
    TooManyFiles { count: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, ExtractError>;
