//! Autograd wrappers for spherical padding.
//!
//! Two differentiable operators:
//!
//! - [`SphericalPad2dFunction`] pads its input. Its reverse procedure calls
//!   the gradient operator through the registry rather than the raw gradient
//!   kernel, so with recording on the gradient it returns can itself sit in a
//!   graph, and any replacement registered for that operator is honoured.
//! - [`SphericalPad2dBackwardFunction`] computes that gradient. Its reverse
//!   procedure refuses: a gradient of the gradient is not supported.
//!
//! Both call their kernel through the `Cpu` entry of the operator registry with
//! recording switched off, so the kernel call never shows up as a node.

use crate::autograd::node::{record_output, Operator};
use crate::autograd::record::{InvocationRecord, RecordBuilder};
use crate::autograd::{no_grad, GradientVector, Variable};
use crate::backend::DispatchKey;
use crate::error::{PadError, Result};
use crate::ops::args::PadArgs;
use crate::ops::dispatch::{self, SPHERICAL_PAD2D, SPHERICAL_PAD2D_BACKWARD};
use crate::tensors::Ten64;

const PAD_L: &str = "pad_l";
const PAD_R: &str = "pad_r";
const PAD_U: &str = "pad_u";
const PAD_D: &str = "pad_d";
const INTERPOLATION: &str = "interpolation";

fn save_args(builder: RecordBuilder, args: &PadArgs) -> RecordBuilder {
    builder
        .save_int(PAD_L, args.pad_l)
        .save_int(PAD_R, args.pad_r)
        .save_int(PAD_U, args.pad_u)
        .save_int(PAD_D, args.pad_d)
        .save_str(INTERPOLATION, args.interpolation.as_str())
}

fn saved_args(record: &InvocationRecord) -> Result<PadArgs> {
    Ok(PadArgs::new(
        record.int(PAD_L)?,
        record.int(PAD_R)?,
        record.int(PAD_U)?,
        record.int(PAD_D)?,
        record.string(INTERPOLATION)?,
    ))
}

/// Calls the raw kernel registered for `name` in untracked mode.
fn raw_kernel(name: &'static str, inputs: &[&Variable], args: &PadArgs) -> Result<Ten64> {
    let _guard = no_grad();
    Ok(dispatch::redispatch(name, DispatchKey::Cpu, inputs, args)?.data())
}

/// Differentiable spherical padding.
#[derive(Debug, Clone, Copy)]
pub struct SphericalPad2dFunction;

impl SphericalPad2dFunction {
    /// Operator name.
    pub const NAME: &'static str = "spherical_pad2d";

    /// `input` plus four pads and the mode.
    pub const ARITY: usize = 6;

    /// Forward procedure: pads `input` and records a node producing the output.
    ///
    /// Saves `input` (not its shape) and the five non-tensor arguments.
    ///
    /// # Errors
    /// Kernel errors, unchanged.
    pub fn apply(input: &Variable, args: &PadArgs) -> Result<Variable> {
        let output = raw_kernel(SPHERICAL_PAD2D, &[input], args)?;

        Ok(record_output(
            &[Some(input), None, None, None, None, None],
            output,
            || {
                let builder = InvocationRecord::builder(Self::ARITY).save_tensor(input);
                Operator::SphericalPad2d(save_args(builder, args).build())
            },
        ))
    }

    /// Reverse procedure: gradient of the padding with respect to `input`.
    ///
    /// Slot 0 holds the input gradient; the slots of the four pads and the
    /// mode are always empty.
    ///
    /// # Errors
    /// Kernel errors from the gradient operator, or a missing saved value.
    pub fn backward(record: &InvocationRecord, grad_output: &Variable) -> Result<GradientVector> {
        let input = record.saved_tensor(0)?.unpack();
        let args = saved_args(record)?;

        let grad_input = dispatch::call(SPHERICAL_PAD2D_BACKWARD, &[grad_output, &input], &args)?;
        Ok(vec![Some(grad_input), None, None, None, None, None])
    }
}

/// Differentiable gradient of spherical padding, one level deep.
#[derive(Debug, Clone, Copy)]
pub struct SphericalPad2dBackwardFunction;

impl SphericalPad2dBackwardFunction {
    /// Operator name.
    pub const NAME: &'static str = "spherical_pad2d_backward";

    /// `grad_output`, `input`, four pads and the mode.
    pub const ARITY: usize = 7;

    /// Forward procedure: the input gradient for `grad_output`.
    ///
    /// Saves `input` and the parameters; `grad_output` is not saved.
    ///
    /// # Errors
    /// Kernel errors, unchanged.
    pub fn apply(grad_output: &Variable, input: &Variable, args: &PadArgs) -> Result<Variable> {
        let grad_input = raw_kernel(SPHERICAL_PAD2D_BACKWARD, &[grad_output, input], args)?;

        Ok(record_output(
            &[Some(grad_output), Some(input), None, None, None, None, None],
            grad_input,
            || {
                let builder = InvocationRecord::builder(Self::ARITY).save_tensor(input);
                Operator::SphericalPad2dBackward(save_args(builder, args).build())
            },
        ))
    }

    /// Reverse procedure: always fails.
    ///
    /// # Errors
    /// Always [`PadError::UnsupportedDifferentiation`].
    pub fn backward(_record: &InvocationRecord, _grad_output: &Variable) -> Result<GradientVector> {
        Err(PadError::UnsupportedDifferentiation {
            op: SphericalPad2dFunction::NAME,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor;

    #[test]
    fn forward_saves_input_and_parameters() {
        let x = Variable::leaf(tensor!([[1.0, 2.0], [3.0, 4.0]]));
        let args = PadArgs::new(1, 2, 1, 0, "bilinear");
        let y = SphericalPad2dFunction::apply(&x, &args).unwrap();

        let node = y.grad_fn().unwrap();
        let record = node.record().unwrap();
        assert_eq!(record.arity(), 6);
        assert_eq!(record.saved_tensors().len(), 1);
        assert_eq!(record.saved_tensors()[0].data(), &x.data());
        assert_eq!(saved_args(record).unwrap(), args);
        assert_eq!(record.saved_scalars().len(), 5);
    }

    #[test]
    fn backward_op_does_not_save_grad_output() {
        let x = Variable::leaf(tensor!([[1.0, 2.0]]));
        let g = Variable::leaf(tensor!([[1.0, 1.0, 1.0]]));
        let args = PadArgs::new(1, 0, 0, 0, "nearest");
        let gi = SphericalPad2dBackwardFunction::apply(&g, &x, &args).unwrap();

        let node = gi.grad_fn().unwrap();
        let record = node.record().unwrap();
        assert_eq!(record.arity(), 7);
        assert_eq!(record.saved_tensors().len(), 1);
        assert_eq!(record.saved_tensors()[0].data(), &x.data());
    }

    #[test]
    fn untracked_inputs_record_nothing() {
        let x = Variable::constant(tensor!([[1.0, 2.0]]));
        let y = SphericalPad2dFunction::apply(&x, &PadArgs::uniform(0, "nearest")).unwrap();
        assert!(y.grad_fn().is_none());
        assert_eq!(y.data(), x.data());
    }
}
