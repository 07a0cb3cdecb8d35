use snaplink_core::shortcode::MAX_LENGTH;
use thiserror::Error;

/// Errors returned when constructing a generator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("invalid code length {length}; expected 1 to {MAX_LENGTH}")]
    InvalidLength { length: usize },
}
