//! Dispatch key selection.
//!
//! Every operator call is routed by a [`DispatchKey`]:
//!
//! - `Cpu`: the raw kernel. Tensors in, tensors out, nothing recorded.
//! - `Autograd`: the differentiable wrapper, which records a graph node and
//!   calls the `Cpu` kernel itself in untracked mode.
//!
//! The key is picked per call from the thread's gradient-recording mode and the
//! tensor arguments, see [`dispatch_key_for`].

use crate::autograd::{is_grad_enabled, Variable};

/// Enumeration of implementation categories an operator can be registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum DispatchKey {
    /// Plain kernel with no gradient tracking (default).
    #[default]
    Cpu = 0,
    /// Gradient-recording implementation.
    Autograd,
}

/// Returns the key a call with these tensor arguments should be routed to.
///
/// `Autograd` is chosen only while recording is enabled on this thread and at
/// least one argument takes part in a graph.
///
/// # Example
///
/// ```
/// use sphere_pad::autograd::{no_grad, Variable};
/// use sphere_pad::backend::{dispatch_key_for, DispatchKey};
/// use sphere_pad::tensor;
///
/// let x = Variable::leaf(tensor!([[1.0]]));
/// assert_eq!(dispatch_key_for(&[&x]), DispatchKey::Autograd);
///
/// let _guard = no_grad();
/// assert_eq!(dispatch_key_for(&[&x]), DispatchKey::Cpu);
/// ```
pub fn dispatch_key_for(inputs: &[&Variable]) -> DispatchKey {
    if is_grad_enabled() && inputs.iter().any(|v| v.requires_grad()) {
        DispatchKey::Autograd
    } else {
        DispatchKey::Cpu
    }
}
