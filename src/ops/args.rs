//! Non-tensor arguments shared by both padding operators.

use core::fmt;
use core::str::FromStr;

use crate::error::KernelError;

/// How a half-turn longitude shift is resampled when it falls between columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Take the column to the left of the shifted position.
    #[default]
    Nearest,
    /// Average the two columns around the shifted position.
    Bilinear,
}

impl Interpolation {
    /// The string form accepted by the operators.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
        }
    }
}

impl FromStr for Interpolation {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nearest" => Ok(Self::Nearest),
            "bilinear" => Ok(Self::Bilinear),
            other => Err(KernelError::UnknownInterpolation(other.to_string())),
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pad amounts and interpolation mode, exactly as the caller passed them.
///
/// Nothing here is checked: the kernels own validation, so negative pads and
/// unknown modes travel through the autograd layer untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PadArgs {
    /// Columns added on the left.
    pub pad_l: i64,
    /// Columns added on the right.
    pub pad_r: i64,
    /// Rows added on top.
    pub pad_u: i64,
    /// Rows added at the bottom.
    pub pad_d: i64,
    /// Interpolation mode name.
    pub interpolation: String,
}

impl PadArgs {
    /// Bundles the five non-tensor arguments.
    pub fn new(pad_l: i64, pad_r: i64, pad_u: i64, pad_d: i64, interpolation: impl Into<String>) -> Self {
        Self {
            pad_l,
            pad_r,
            pad_u,
            pad_d,
            interpolation: interpolation.into(),
        }
    }

    /// Every side padded by the same amount.
    pub fn uniform(pad: i64, interpolation: impl Into<String>) -> Self {
        Self::new(pad, pad, pad, pad, interpolation)
    }
}
