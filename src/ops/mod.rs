//! # Operator Layer
//!
//! Kernels, their autograd wrappers, and the table that routes calls between
//! them.
//!
//! ## Submodules
//!
//! - [`args`]: the non-tensor arguments of the padding operators
//! - [`cpu`]: raw padding kernels, parallel over planes
//! - [`spherical_pad`]: differentiable wrappers around those kernels
//! - [`arith`]: differentiable element-wise addition
//! - [`dispatch`]: the `(operator, DispatchKey)` registry
//!
//! ## Extending
//!
//! To add an operator:
//!
//! 1. Implement the raw kernel (e.g. `cpu::my_op`)
//! 2. Wrap it in a differentiable function and add an `Operator` variant
//! 3. Register both under their keys in `dispatch`

pub mod args;
pub mod arith;
pub mod cpu;
pub mod dispatch;
pub mod spherical_pad;
