//! Differentiable element-wise arithmetic.
//!
//! Only what the engine needs to sum gradients arriving along several paths
//! without breaking a graph recorded for a second backward pass.

use crate::autograd::node::{record_output, Operator};
use crate::autograd::{GradientVector, Variable};
use crate::error::Result;

pub(crate) const ADD_NAME: &str = "add";

/// Element-wise `a + b`.
///
/// # Errors
/// Returns a shape mismatch error if `a` and `b` differ in shape.
///
/// # Example
/// ```rust
/// use sphere_pad::autograd::Variable;
/// use sphere_pad::backprop::add;
/// use sphere_pad::tensor;
///
/// let a = Variable::leaf(tensor!([1.0, 2.0]));
/// let b = Variable::constant(tensor!([0.5, 0.5]));
/// let c = add(&a, &b).unwrap();
/// assert_eq!(c.data().data(), &[1.5, 2.5]);
/// assert_eq!(c.grad_fn_name(), Some("add"));
/// ```
pub fn add(a: &Variable, b: &Variable) -> Result<Variable> {
    let out = a.data().add(&b.data())?;
    Ok(record_output(&[Some(a), Some(b)], out, || Operator::Add))
}

/// Both arguments receive the incoming gradient unchanged.
pub(crate) fn add_backward(grad_output: &Variable) -> GradientVector {
    vec![Some(grad_output.clone()), Some(grad_output.clone())]
}
