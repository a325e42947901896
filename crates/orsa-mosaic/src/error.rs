//! Error taxonomy for registration.

use thiserror::Error;

/// Malformed caller input: degenerate images or mismatched buffers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// Image side below the minimum supported size.
    #[error("image {index} is too small: {width}x{height} (minimum side {min_side})")]
    TooSmall {
        /// 1 or 2.
        index: u8,
        width: usize,
        height: usize,
        min_side: usize,
    },
    /// Channel count other than 1 or 3.
    #[error("image {index} has {channels} channels (expected 1 or 3)")]
    Channels { index: u8, channels: usize },
    /// Sample buffer length does not match `width * height * channels`.
    #[error("image {index} holds {got} samples, expected {expected}")]
    DataLength {
        index: u8,
        expected: usize,
        got: usize,
    },
    /// Caller-allocated output buffer does not match the canvas layout.
    #[error("output buffer '{name}' holds {got} samples, expected {expected}")]
    OutputLength {
        name: &'static str,
        expected: usize,
        got: usize,
    },
}

/// The data does not support a meaningful homography.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimationFailure {
    /// Not enough correspondences survived matching.
    #[error("too few correspondences: need {needed}, got {got}")]
    TooFewMatches { needed: usize, got: usize },
    /// No sampled model reached a negative log-NFA.
    #[error("no meaningful homography (best log10 NFA = {log_nfa:.3})")]
    NotMeaningful { log_nfa: f64 },
    /// The estimated homography does not make the images overlap.
    #[error("estimated homography leaves no overlap between the images")]
    NoOverlap,
}

/// Ill-conditioned linear algebra.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NumericFailure {
    #[error("too few points: need {needed}, got {got}")]
    TooFewPoints { needed: usize, got: usize },
    #[error("point sets differ in length ({src} vs {dst})")]
    LengthMismatch { src: usize, dst: usize },
    #[error("singular matrix: {0}")]
    Singular(&'static str),
    #[error("non-finite homography coefficients")]
    NonFinite,
}

/// Configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level error returned by every registration entry point.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("invalid input: {0}")]
    Input(#[from] InputError),
    #[error("estimation failed: {0}")]
    Estimation(#[from] EstimationFailure),
    #[error("numeric failure: {0}")]
    Numeric(#[from] NumericFailure),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_buffer() {
        let err = RegistrationError::from(InputError::OutputLength {
            name: "mosaic",
            expected: 12,
            got: 9,
        });
        let msg = err.to_string();
        assert!(msg.contains("mosaic"), "{msg}");
        assert!(msg.contains("12"), "{msg}");
    }

    #[test]
    fn estimation_failure_converts_into_top_level_error() {
        let err: RegistrationError = EstimationFailure::NoOverlap.into();
        assert!(matches!(
            err,
            RegistrationError::Estimation(EstimationFailure::NoOverlap)
        ));
    }
}
