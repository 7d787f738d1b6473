//! Tensors with autograd metadata.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::error::{PadError, Result};
use crate::tensors::Ten64;

use super::engine;
use super::node::{Edge, Node};

/// Where a leaf's gradient accumulates.
pub(crate) type GradSlot = Mutex<Option<Ten64>>;

/// A tensor that can take part in a computation graph.
///
/// Cloning is cheap and every clone refers to the same value, gradient slot and
/// producer node.
#[derive(Clone)]
pub struct Variable {
    inner: Arc<VariableInner>,
}

struct VariableInner {
    data: RwLock<Ten64>,
    requires_grad: bool,
    grad_fn: Option<Arc<Node>>,
    grad: Arc<GradSlot>,
}

impl Variable {
    fn build(data: Ten64, requires_grad: bool, grad_fn: Option<Arc<Node>>, grad: Arc<GradSlot>) -> Self {
        Self {
            inner: Arc::new(VariableInner {
                data: RwLock::new(data),
                requires_grad,
                grad_fn,
                grad,
            }),
        }
    }

    /// A leaf that accumulates a gradient during backward.
    pub fn leaf(data: Ten64) -> Self {
        Self::build(data, true, None, Arc::default())
    }

    /// A value that never receives a gradient.
    pub fn constant(data: Ten64) -> Self {
        Self::build(data, false, None, Arc::default())
    }

    /// Output of a recorded operator.
    pub(crate) fn from_node(data: Ten64, node: Arc<Node>) -> Self {
        Self::build(data, true, Some(node), Arc::default())
    }

    /// Rebuilds a variable that routes gradients along `edge`.
    pub(crate) fn from_edge(data: Ten64, edge: Option<Edge>) -> Self {
        match edge {
            Some(Edge::Node(node)) => Self::from_node(data, node),
            Some(Edge::Leaf(slot)) => Self::build(data, true, None, slot),
            None => Self::constant(data),
        }
    }

    /// The current value. Shares the buffer, no copy is made.
    pub fn data(&self) -> Ten64 {
        self.inner.data.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Shape of the current value.
    pub fn shape(&self) -> Vec<usize> {
        self.inner
            .data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .shape()
            .to_vec()
    }

    /// Replaces the value in place, without touching the graph.
    pub fn set_data(&self, data: Ten64) {
        *self.inner.data.write().unwrap_or_else(PoisonError::into_inner) = data;
    }

    /// Mutates the value in place. Buffers captured by earlier operators are
    /// copied away first, so recorded snapshots keep their old contents.
    pub fn update_data<R>(&self, f: impl FnOnce(&mut Ten64) -> R) -> R {
        f(&mut self.inner.data.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// Whether gradients flow into this variable.
    pub fn requires_grad(&self) -> bool {
        self.inner.requires_grad
    }

    /// True for user-created variables (no producer node).
    pub fn is_leaf(&self) -> bool {
        self.inner.grad_fn.is_none()
    }

    /// The node that produced this variable, if it was recorded.
    pub fn grad_fn(&self) -> Option<Arc<Node>> {
        self.inner.grad_fn.clone()
    }

    /// Name of the producing operator.
    pub fn grad_fn_name(&self) -> Option<&'static str> {
        self.inner.grad_fn.as_ref().map(|node| node.name())
    }

    /// Accumulated gradient of a leaf, set by [`Variable::backward`].
    pub fn grad(&self) -> Option<Ten64> {
        self.inner.grad.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Clears the accumulated gradient.
    pub fn zero_grad(&self) {
        *self.inner.grad.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// The same value, cut off from the graph.
    pub fn detach(&self) -> Self {
        Self::constant(self.data())
    }

    /// Where a gradient for this variable has to be sent.
    pub(crate) fn gradient_edge(&self) -> Option<Edge> {
        match &self.inner.grad_fn {
            Some(node) => Some(Edge::Node(Arc::clone(node))),
            None if self.inner.requires_grad => Some(Edge::Leaf(Arc::clone(&self.inner.grad))),
            None => None,
        }
    }

    pub(crate) fn grad_slot(&self) -> &Arc<GradSlot> {
        &self.inner.grad
    }

    /// Back-propagates `gradient` (or ones for a single-element value) and
    /// accumulates into every reachable leaf.
    ///
    /// # Errors
    /// [`PadError::NotDifferentiable`] when this variable is not part of a graph,
    /// [`PadError::SeedShapeMismatch`] for a wrongly shaped or missing seed, or
    /// any error raised by a reverse procedure along the way.
    pub fn backward(&self, gradient: Option<Ten64>) -> Result<()> {
        let seed = match gradient {
            Some(g) => g,
            None if self.data().numel() == 1 => Ten64::full(self.shape(), 1.0),
            None => {
                return Err(PadError::SeedShapeMismatch {
                    expected: self.shape(),
                    actual: vec![1],
                });
            }
        };
        engine::backward(&[self.clone()], &[seed])
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("shape", &self.shape())
            .field("requires_grad", &self.inner.requires_grad)
            .field("grad_fn", &self.grad_fn_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor;

    #[test]
    fn leaf_and_constant_edges() {
        let x = Variable::leaf(tensor!([1.0, 2.0]));
        let c = Variable::constant(tensor!([1.0, 2.0]));
        assert!(matches!(x.gradient_edge(), Some(Edge::Leaf(_))));
        assert!(c.gradient_edge().is_none());
        assert!(x.is_leaf() && c.is_leaf());
    }

    #[test]
    fn clones_share_the_gradient_slot() {
        let x = Variable::leaf(tensor!([1.0]));
        let y = x.clone();
        *y.grad_slot().lock().unwrap() = Some(tensor!([3.0]));
        assert_eq!(x.grad(), Some(tensor!([3.0])));
        x.zero_grad();
        assert!(y.grad().is_none());
    }

    #[test]
    fn update_data_detaches_shared_buffers() {
        let t = tensor!([1.0, 2.0]);
        let x = Variable::leaf(t.clone());
        x.update_data(|d| d.data_mut()[0] = 5.0);
        assert_eq!(t.data(), &[1.0, 2.0]);
        assert_eq!(x.data().data(), &[5.0, 2.0]);
    }

    #[test]
    fn backward_needs_a_graph() {
        let c = Variable::constant(tensor!([1.0]));
        assert!(matches!(c.backward(None), Err(PadError::NotDifferentiable(0))));
    }

    #[test]
    fn missing_seed_on_a_vector_is_an_engine_error() {
        let x = Variable::leaf(tensor!([1.0, 2.0]));
        let y = crate::ops::arith::add(&x, &x).unwrap();
        let err = y.backward(None).unwrap_err();
        assert!(matches!(err, PadError::SeedShapeMismatch { .. }));
        assert!(!err.is_kernel_validation());
    }
}
