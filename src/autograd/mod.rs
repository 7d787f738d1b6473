//! Record-and-replay reverse-mode automatic differentiation.
//!
//! # Architecture
//!
//! ```text
//! Variable ──grad_fn──► Node ──next_edges──► Node / leaf grad slot
//!                        │
//!                        ▼
//!                    Operator ──► InvocationRecord
//!                                  (saved tensors, saved scalars, arity)
//! ```
//!
//! An operator call that involves a variable requiring a gradient records one
//! [`Node`]. The node owns an immutable [`InvocationRecord`] and, per forward
//! argument, an optional edge to where that argument's gradient has to go.
//! [`backward`] and [`grad`] replay the nodes in reverse.
//!
//! Recording can be switched off per thread with [`no_grad`]; kernels always
//! run that way.
//!
//! # Key Types
//!
//! - [`Variable`]: tensor plus autograd metadata
//! - [`Node`] / [`Operator`]: a recorded call and its reverse dispatch
//! - [`InvocationRecord`] / [`SavedTensor`]: state captured at forward time
//! - [`GradientVector`]: one gradient slot per forward argument

mod engine;
mod grad_mode;
pub mod node;
pub mod record;
mod variable;

pub use engine::{backward, grad};
pub use grad_mode::{is_grad_enabled, no_grad, set_grad_enabled, GradModeGuard};
pub use node::{Node, NodeId, Operator};
pub use record::{GradientVector, InvocationRecord, RecordBuilder, SavedTensor, SavedValue};
pub use variable::Variable;
