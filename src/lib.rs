//! sphere_pad: differentiable spherical padding for image tensors.
//!
//! Pads the trailing two axes of a tensor as if they were a longitude/latitude
//! grid on a sphere, and wires both the padding and its gradient into a small
//! reverse-mode autograd engine.
//!
//! # Features
//!
//! - Copy-on-write tensors, so saved forward state is immune to later in-place edits.
//! - Record-and-replay graph nodes with one gradient slot per forward argument.
//! - The gradient operator is itself differentiable once; the next level fails
//!   with an explicit error.
//! - A process-wide operator registry routing calls to the raw or tracked variant.
//!
//! # Modules
//!
//! - [`tensors`]: Core tensor data structures.
//! - [`backprop`]: The public differentiable operators.
//! - [`autograd`]: Variables, graph nodes, invocation records and the engine.
//! - [`ops`]: Kernels, autograd wrappers and the operator registry.
//! - [`backend`]: Dispatch key selection.
//! - [`error`]: Error types.
//! - [`approx`]: Graded float comparison for gradient checks.
//!
//! # Example
//!
//! ```rust
//! use sphere_pad::autograd::Variable;
//! use sphere_pad::backprop::spherical_pad2d;
//! use sphere_pad::tensors::Tensor;
//! use sphere_pad::tensor;
//!
//! let x = Variable::leaf(tensor!([[1.0, 2.0], [3.0, 4.0]]));
//! let y = spherical_pad2d(&x, 1, 1, 1, 1, "bilinear")?;
//! y.backward(Some(Tensor::full(y.shape(), 1.0)))?;
//! assert_eq!(x.grad().unwrap().shape(), &[2, 2]);
//! # Ok::<(), sphere_pad::error::PadError>(())
//! ```

pub mod approx;
pub mod autograd;
pub mod backend;
pub mod backprop;
pub mod error;
pub mod ops;
pub mod tensors;

pub use error::{KernelError, PadError};
