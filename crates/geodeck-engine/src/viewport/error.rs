/// Configuration errors raised by viewport construction and geometry helpers.
///
/// These are hard failures: the caller passed a camera or delta that cannot be
/// projected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ViewportError {
    #[error("viewport parameter `{name}` must be finite, got {value}")]
    NonFinite { name: &'static str, value: f64 },

    #[error("viewport projection is not invertible")]
    Singular,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Returns `value` or a `NonFinite` error naming the parameter.
#[inline]
pub(crate) fn finite(name: &'static str, value: f64) -> Result<f64, ViewportError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ViewportError::NonFinite { name, value })
    }
}
