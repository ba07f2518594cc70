use thiserror::Error;

/// The error type for instance metric evaluation.
///
/// Every variant describes a precondition or configuration problem. Matching
/// itself is deterministic, so none of these are transient.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    /// Two grids that must be pixel-aligned have different shapes.
    #[error("Shape mismatch for {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Which pair of maps was compared.
        context: String,
        /// The `(height, width)` of the reference map.
        expected: (usize, usize),
        /// The `(height, width)` of the offending map.
        actual: (usize, usize),
    },

    /// The evaluation configuration is logically inconsistent.
    #[error("Invalid evaluation configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// The IoU threshold used for PQ pairing is negative or not a number.
    #[error("Invalid match IoU threshold: {value} (must be >= 0)")]
    InvalidThreshold {
        /// The rejected threshold.
        value: f64,
    },

    /// A semantic map holds a label outside `[0, num_classes)`.
    #[error("Semantic label {value} out of range for {num_classes} classes")]
    ClassOutOfRange {
        /// The offending label.
        value: u32,
        /// The configured number of classes.
        num_classes: usize,
    },

    /// An image holds more instances than the configured cap allows.
    #[error("Too many instances in {side}: {count} exceeds the cap of {cap}")]
    TooManyInstances {
        /// `"prediction"` or `"ground truth"`.
        side: &'static str,
        /// Number of instances found after relabeling.
        count: usize,
        /// The configured cap.
        cap: usize,
    },

    /// A tensor could not be converted into a label map.
    #[error("Tensor conversion failed: {reason}")]
    TensorConversion {
        /// The reason for the failure.
        reason: String,
    },

    /// The optimal assignment solver could not be set up.
    #[error("Assignment failed: {reason}")]
    Assignment {
        /// The reason for the failure.
        reason: String,
    },

    /// Accumulated pre-eval results cannot be reduced together.
    #[error("Pre-eval results mismatch: {reason}")]
    PartialMismatch {
        /// The reason for the mismatch.
        reason: String,
    },
}

/// A specialized `Result` type for metric evaluation.
pub type MetricResult<T> = Result<T, MetricError>;
