//! Differentiable operations.
//!
//! The public call surface. Each function goes through the operator registry,
//! so it records a graph node when an argument requires a gradient and
//! recording is on, and runs the plain kernel otherwise.
//!
//! ## Usage Guidelines
//!
//! - The trailing two axes are padded; any leading axes are batch/channel planes.
//! - Pad amounts and the interpolation mode are never differentiated.
//! - A gradient of [`spherical_pad2d_backward`] cannot be requested: the reverse
//!   pass of that operator always fails.

use crate::autograd::Variable;
use crate::error::Result;
use crate::ops::args::PadArgs;
use crate::ops::dispatch::{self, SPHERICAL_PAD2D, SPHERICAL_PAD2D_BACKWARD};

pub use crate::ops::arith::add;

/// Pads the trailing two axes of `input` on a sphere.
///
/// Left/right padding wraps around longitude; top/bottom padding crosses the
/// pole and turns longitude by half a revolution. `interpolation` is
/// `"nearest"` or `"bilinear"` and only matters for odd widths.
///
/// # Errors
/// Kernel-validation failures: negative pads, padding longer than the axis,
/// rank below 2, or an unknown mode.
///
/// # Example
/// ```rust
/// use sphere_pad::autograd::Variable;
/// use sphere_pad::backprop::spherical_pad2d;
/// use sphere_pad::tensor;
///
/// let x = Variable::leaf(tensor!([[1.0, 2.0], [3.0, 4.0]]));
/// let y = spherical_pad2d(&x, 1, 1, 1, 1, "nearest").unwrap();
/// assert_eq!(y.shape(), vec![4, 4]);
/// assert_eq!(y.grad_fn_name(), Some("spherical_pad2d"));
/// ```
pub fn spherical_pad2d(
    input: &Variable,
    pad_l: i64,
    pad_r: i64,
    pad_u: i64,
    pad_d: i64,
    interpolation: &str,
) -> Result<Variable> {
    let args = PadArgs::new(pad_l, pad_r, pad_u, pad_d, interpolation);
    dispatch::call(SPHERICAL_PAD2D, &[input], &args)
}

/// Gradient of [`spherical_pad2d`] with respect to `input`, for the incoming
/// gradient `grad_output`.
///
/// The result is shaped like `input` and is itself tracked, but asking for its
/// gradient fails with the unsupported-differentiation error.
///
/// # Errors
/// Kernel-validation failures, including a `grad_output` that is not shaped
/// like the padded output.
pub fn spherical_pad2d_backward(
    grad_output: &Variable,
    input: &Variable,
    pad_l: i64,
    pad_r: i64,
    pad_u: i64,
    pad_d: i64,
    interpolation: &str,
) -> Result<Variable> {
    let args = PadArgs::new(pad_l, pad_r, pad_u, pad_d, interpolation);
    dispatch::call(SPHERICAL_PAD2D_BACKWARD, &[grad_output, input], &args)
}
