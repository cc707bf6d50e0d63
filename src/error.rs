use thiserror::Error;

/// Process-level failures. Field validation errors are not errors in this
/// sense; they live in the form's `ErrorMap` and never abort anything.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("config error: {0}")]
    Config(String),

    #[error("oracle error: {0}")]
    Oracle(String),

    #[error("unexpected error: {0}")]
    Other(String),
}

pub type FormResult<T> = Result<T, FormError>;
