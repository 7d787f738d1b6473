//! Error types for padding kernels and the autograd layer.

use briny::prelude::ValidationError;
use thiserror::Error;

use crate::backend::DispatchKey;

/// Failures raised by the padding kernels while validating their arguments.
///
/// The autograd layer never creates these itself; it passes them through
/// unchanged inside [`PadError::Kernel`].
#[derive(Debug, Error)]
pub enum KernelError {
    /// A pad amount was negative.
    #[error("pad amount `{name}` must be non-negative, got {value}")]
    NegativePad { name: &'static str, value: i64 },

    /// The interpolation string is not one of the supported modes.
    #[error("unknown interpolation mode `{0}` (expected `nearest` or `bilinear`)")]
    UnknownInterpolation(String),

    /// Spherical padding needs at least a 2-D tensor.
    #[error("spherical padding needs a tensor of rank >= 2, got rank {0}")]
    RankTooSmall(usize),

    /// The padded axis is shorter than the padding requested on it.
    #[error("cannot pad {pad} on an axis of size {size} (`{name}`)")]
    ShapeTooSmall {
        name: &'static str,
        pad: usize,
        size: usize,
    },

    /// A tensor did not have the shape the kernel expected.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A tensor buffer does not agree with its shape.
    #[error("tensor failed validation: {0}")]
    Validation(#[from] ValidationError),
}

/// Errors produced by the public operator surface and the autograd engine.
#[derive(Debug, Error)]
pub enum PadError {
    /// Kernel-validation failure, passed through from a kernel.
    #[error(transparent)]
    Kernel(#[from] KernelError),

    /// A gradient of a gradient was requested past the supported depth.
    #[error("double backwards on {op} not supported")]
    UnsupportedDifferentiation { op: &'static str },

    /// No implementation is registered for the operator and dispatch key.
    #[error("operator `{name}` has no kernel registered for {key:?}")]
    UnknownOperator { name: String, key: DispatchKey },

    /// An operator was called with the wrong number of tensor arguments.
    #[error("operator `{name}` expects {expected} tensor arguments, got {actual}")]
    WrongInputCount {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// A reverse procedure returned a gradient vector of the wrong length.
    #[error("{op} returned {actual} gradient slots, expected {expected}")]
    ArityMismatch {
        op: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A saved value was missing or had the wrong type.
    #[error("saved value `{0}` is missing or has the wrong type")]
    MissingSavedValue(&'static str),

    /// Backward was requested from a value that takes no part in the graph.
    #[error("element {0} of the outputs does not require grad and has no grad_fn")]
    NotDifferentiable(usize),

    /// The number of seed gradients does not match the number of outputs.
    #[error("expected {expected} seed gradients, got {actual}")]
    SeedCountMismatch { expected: usize, actual: usize },

    /// A seed gradient is not shaped like the output it seeds, or no seed was
    /// given for an output with more than one element.
    #[error("seed gradient has shape {actual:?}, expected {expected:?}")]
    SeedShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// An input passed to `grad` received no gradient from the outputs.
    #[error("input {0} was not used in the graph of the outputs")]
    UnusedInput(usize),
}

impl PadError {
    /// Whether this is a kernel-validation failure.
    pub fn is_kernel_validation(&self) -> bool {
        matches!(self, Self::Kernel(_))
    }

    /// Whether this is the deliberate refusal to differentiate further.
    pub fn is_unsupported_differentiation(&self) -> bool {
        matches!(self, Self::UnsupportedDifferentiation { .. })
    }
}

/// Shorthand used across the crate.
pub type Result<T, E = PadError> = std::result::Result<T, E>;
