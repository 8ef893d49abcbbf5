use thiserror::Error;

/// Fusion core error types
#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Non-finite {what} input")]
    NonFiniteInput { what: &'static str },

    #[error("Gravity estimate cannot be normalized")]
    DegenerateGravity,

    #[error("Sample at t={t} is older than last accepted t={last}")]
    OutOfOrder { t: i64, last: i64 },

    #[error("Malformed payload: {0}")]
    Payload(String),

    #[error("Timestamp {0} is outside the representable date range")]
    TimestampRange(i64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FusionError>;

/// Fail with `InvalidConfig` unless `value` is finite and satisfies `ok`.
pub(crate) fn check_param(name: &str, value: f64, ok: bool, expected: &str) -> Result<()> {
    if value.is_finite() && ok {
        Ok(())
    } else {
        Err(FusionError::InvalidConfig(format!(
            "{} must be {}, got {}",
            name, expected, value
        )))
    }
}
