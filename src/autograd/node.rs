//! Graph nodes.
//!
//! A [`Node`] is created for every recorded operator call. It owns the call's
//! [`Operator`] (which carries the invocation record) and one optional [`Edge`]
//! per argument, pointing at wherever that argument's gradient must go.
//!
//! Reverse procedures are dispatched by a single `match` on [`Operator`]; there
//! is no trait object per operator.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{PadError, Result};
use crate::ops::{arith, spherical_pad};
use crate::tensors::Ten64;

use super::grad_mode::is_grad_enabled;
use super::record::{GradientVector, InvocationRecord};
use super::variable::{GradSlot, Variable};

static NEXT_NODE_ID: AtomicUsize = AtomicUsize::new(0);

/// Unique identifier of a graph node within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the internal index.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// The recorded operator kinds.
#[derive(Debug)]
pub enum Operator {
    /// Spherical padding; reverse procedure calls the gradient operator.
    SphericalPad2d(InvocationRecord),
    /// Gradient of spherical padding; reverse procedure always refuses.
    SphericalPad2dBackward(InvocationRecord),
    /// Element-wise sum of two tensors.
    Add,
}

impl Operator {
    /// Operator name, as used in error messages and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SphericalPad2d(_) => spherical_pad::SphericalPad2dFunction::NAME,
            Self::SphericalPad2dBackward(_) => spherical_pad::SphericalPad2dBackwardFunction::NAME,
            Self::Add => arith::ADD_NAME,
        }
    }

    /// Number of arguments of the forward call.
    pub fn arity(&self) -> usize {
        match self {
            Self::SphericalPad2d(record) | Self::SphericalPad2dBackward(record) => record.arity(),
            Self::Add => 2,
        }
    }

    /// The saved state, for operators that save any.
    pub fn record(&self) -> Option<&InvocationRecord> {
        match self {
            Self::SphericalPad2d(record) | Self::SphericalPad2dBackward(record) => Some(record),
            Self::Add => None,
        }
    }
}

/// Destination of a gradient.
#[derive(Clone)]
pub(crate) enum Edge {
    /// Continue into the node that produced the argument.
    Node(Arc<Node>),
    /// Accumulate into a leaf's gradient slot.
    Leaf(Arc<GradSlot>),
}

impl Edge {
    /// Identity of the destination, stable for the lifetime of the graph.
    pub(crate) fn key(&self) -> usize {
        match self {
            Self::Node(node) => Arc::as_ptr(node) as *const () as usize,
            Self::Leaf(slot) => Arc::as_ptr(slot) as *const () as usize,
        }
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(node) => write!(f, "Edge::Node({}#{})", node.name(), node.id.index()),
            Self::Leaf(_) => f.write_str("Edge::Leaf"),
        }
    }
}

/// A recorded operator call.
pub struct Node {
    id: NodeId,
    op: Operator,
    next_edges: Vec<Option<Edge>>,
}

impl Node {
    /// Node identifier.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Operator name.
    pub fn name(&self) -> &'static str {
        self.op.name()
    }

    /// Saved state of the call, if the operator saves any.
    pub fn record(&self) -> Option<&InvocationRecord> {
        self.op.record()
    }

    /// Number of arguments of the recorded call.
    pub fn arity(&self) -> usize {
        self.op.arity()
    }

    /// Whether argument `slot` has somewhere to send a gradient.
    pub fn routes_gradient(&self, slot: usize) -> bool {
        self.next_edges.get(slot).is_some_and(Option::is_some)
    }

    pub(crate) fn next_edges(&self) -> &[Option<Edge>] {
        &self.next_edges
    }

    /// Runs the reverse procedure for `grad_output`.
    ///
    /// The result always has exactly [`Node::arity`] slots.
    ///
    /// # Errors
    /// Whatever the reverse procedure raises (kernel errors, the refusal to
    /// differentiate a gradient), or [`PadError::ArityMismatch`].
    pub fn apply(&self, grad_output: &Variable) -> Result<GradientVector> {
        log::trace!("reverse {}#{}", self.name(), self.id.index());
        let grads = match &self.op {
            Operator::SphericalPad2d(record) => {
                spherical_pad::SphericalPad2dFunction::backward(record, grad_output)?
            }
            Operator::SphericalPad2dBackward(record) => {
                spherical_pad::SphericalPad2dBackwardFunction::backward(record, grad_output)?
            }
            Operator::Add => arith::add_backward(grad_output),
        };
        check_arity(&self.op, grads)
    }
}

/// Rejects a gradient vector without one slot per argument of `op`.
fn check_arity(op: &Operator, grads: GradientVector) -> Result<GradientVector> {
    if grads.len() != op.arity() {
        return Err(PadError::ArityMismatch {
            op: op.name(),
            expected: op.arity(),
            actual: grads.len(),
        });
    }
    Ok(grads)
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("op", &self.name())
            .field("next_edges", &self.next_edges)
            .finish()
    }
}

/// Wraps a raw `output` as the result of an operator call.
///
/// A node is recorded only when recording is on for this thread and one of the
/// tensor arguments takes part in a graph; `op` is not even built otherwise.
/// `inputs` has one entry per forward argument, `None` for non-tensor ones.
pub(crate) fn record_output(
    inputs: &[Option<&Variable>],
    output: Ten64,
    op: impl FnOnce() -> Operator,
) -> Variable {
    let tracked = is_grad_enabled() && inputs.iter().flatten().any(|v| v.requires_grad());
    if !tracked {
        return Variable::constant(output);
    }

    let op = op();
    debug_assert_eq!(inputs.len(), op.arity(), "one edge per argument");
    let next_edges = inputs
        .iter()
        .map(|input| input.and_then(Variable::gradient_edge))
        .collect();
    let node = Arc::new(Node {
        id: NodeId::next(),
        op,
        next_edges,
    });
    log::debug!("recorded {}#{}", node.name(), node.id.index());
    Variable::from_node(output, node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::no_grad;
    use crate::tensor;

    #[test]
    fn records_only_when_tracking() {
        let x = Variable::leaf(tensor!([1.0]));
        let c = Variable::constant(tensor!([1.0]));

        let y = record_output(&[Some(&x), Some(&c)], tensor!([2.0]), || Operator::Add);
        let node = y.grad_fn().unwrap();
        assert_eq!(node.arity(), 2);
        assert!(node.routes_gradient(0));
        assert!(!node.routes_gradient(1));

        let z = record_output(&[Some(&c), Some(&c)], tensor!([2.0]), || unreachable!());
        assert!(z.grad_fn().is_none());

        let _guard = no_grad();
        let w = record_output(&[Some(&x), Some(&x)], tensor!([2.0]), || unreachable!());
        assert!(w.grad_fn().is_none() && !w.requires_grad());
    }

    #[test]
    fn node_ids_increase() {
        let x = Variable::leaf(tensor!([1.0]));
        let a = record_output(&[Some(&x), Some(&x)], tensor!([2.0]), || Operator::Add);
        let b = record_output(&[Some(&a), Some(&x)], tensor!([3.0]), || Operator::Add);
        assert!(a.grad_fn().unwrap().id() < b.grad_fn().unwrap().id());
    }

    #[test]
    fn wrong_slot_count_is_rejected() {
        let g = Variable::constant(tensor!([1.0]));
        assert_eq!(check_arity(&Operator::Add, vec![Some(g.clone()), None]).unwrap().len(), 2);
        assert!(matches!(
            check_arity(&Operator::Add, vec![Some(g)]),
            Err(PadError::ArityMismatch { op: "add", expected: 2, actual: 1 })
        ));
    }
}
