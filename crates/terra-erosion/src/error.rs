use thiserror::Error;

use crate::grid::Rect;

/// Errors surfaced by `Eroder::erode` before any kernel is dispatched.
///
/// Numerical blow-up is not an error: unstable settings within the accepted
/// ranges diverge visibly instead of being rejected.
#[derive(Debug, Error, PartialEq)]
pub enum ErosionError {
    #[error("required input field \"{0}\" was not supplied")]
    MissingInput(&'static str),

    #[error("domain {domain:?} is empty or lies outside the {width}×{height} input")]
    DomainOutOfBounds { domain: Rect, width: usize, height: usize },

    #[error("solver produced no \"{0}\" output")]
    MissingOutput(&'static str),

    #[error("input \"{name}\" is {got:?}, expected {expected:?} to match \"Height\"")]
    InputSizeMismatch {
        name: String,
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("setting `{name}` = {value} is invalid: {reason}")]
    InvalidSetting {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("terrain dimensions and texel size must be positive and finite, got {0:?}")]
    InvalidScale(Vec<f64>),
}

pub type Result<T> = std::result::Result<T, ErosionError>;
