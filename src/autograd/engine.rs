//! Backward pass execution for reverse-mode automatic differentiation.
//!
//! The engine walks the graph from the seeded outputs towards the leaves. A
//! node runs once every node that can send it a gradient has run, so the
//! gradient it receives is complete. Gradients reaching the same node along
//! several paths are summed with the differentiable `add` operator.
//!
//! Two entry points:
//!
//! - [`backward`] accumulates into the `grad` slot of every reachable leaf.
//! - [`grad`] returns gradients for chosen variables and leaves every `grad`
//!   slot untouched. With `create_graph` the reverse procedures record nodes, so
//!   the returned gradients can be differentiated again.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError};

use crate::error::{PadError, Result};
use crate::ops::arith;
use crate::tensors::Ten64;

use super::grad_mode::set_grad_enabled;
use super::node::{Edge, Node};
use super::variable::Variable;

/// What to do with gradients that reach a leaf.
enum Sink {
    /// Accumulate into the leaf's `grad` slot.
    Accumulate,
    /// Collect gradients for these destinations, keyed by [`Edge::key`].
    Capture(HashSet<usize>),
}

/// Computes gradients of `outputs` and accumulates them into every reachable
/// leaf, seeding output `i` with `grad_outputs[i]`.
///
/// # Errors
/// Seed count or shape errors, [`PadError::NotDifferentiable`] for an output
/// that is not part of a graph, and any error raised by a reverse procedure.
///
/// # Example
///
/// ```
/// use sphere_pad::autograd::{backward, Variable};
/// use sphere_pad::backprop::spherical_pad2d;
/// use sphere_pad::tensors::Tensor;
/// use sphere_pad::tensor;
///
/// let x = Variable::leaf(tensor!([[1.0, 2.0]]));
/// let y = spherical_pad2d(&x, 1, 1, 0, 0, "nearest").unwrap();
/// backward(&[y], &[Tensor::full(vec![1, 4], 1.0)]).unwrap();
/// assert_eq!(x.grad().unwrap().data(), &[2.0, 2.0]);
/// ```
pub fn backward(outputs: &[Variable], grad_outputs: &[Ten64]) -> Result<()> {
    let seeds: Vec<Variable> = grad_outputs.iter().cloned().map(Variable::constant).collect();
    let _guard = set_grad_enabled(false);
    run(outputs, &seeds, Sink::Accumulate).map(|_| ())
}

/// Computes the gradients of `outputs` with respect to `inputs`.
///
/// Entry `i` of the result is `None` when `inputs[i]` takes no part in any
/// graph (it does not require a gradient). Leaf `grad` slots are not modified.
///
/// With `create_graph` set, the reverse procedures run with recording enabled
/// and the returned gradients carry their own graph.
///
/// # Errors
/// As for [`backward`], plus [`PadError::UnusedInput`] for an input that
/// requires a gradient but is not reached from `outputs`. Differentiating a
/// gradient of spherical padding fails with
/// [`PadError::UnsupportedDifferentiation`].
pub fn grad(
    outputs: &[Variable],
    grad_outputs: &[Variable],
    inputs: &[Variable],
    create_graph: bool,
) -> Result<Vec<Option<Variable>>> {
    let keys: Vec<Option<usize>> = inputs
        .iter()
        .map(|v| v.gradient_edge().map(|e| e.key()))
        .collect();
    let wanted = keys.iter().flatten().copied().collect();

    let _guard = set_grad_enabled(create_graph);
    let captured = run(outputs, grad_outputs, Sink::Capture(wanted))?;

    keys.into_iter()
        .enumerate()
        .map(|(i, key)| match key {
            Some(k) => captured.get(&k).cloned().map(Some).ok_or(PadError::UnusedInput(i)),
            None => Ok(None),
        })
        .collect()
}

fn run(outputs: &[Variable], seeds: &[Variable], sink: Sink) -> Result<HashMap<usize, Variable>> {
    if outputs.len() != seeds.len() {
        return Err(PadError::SeedCountMismatch {
            expected: outputs.len(),
            actual: seeds.len(),
        });
    }

    let mut roots = Vec::with_capacity(outputs.len());
    for (i, (output, seed)) in outputs.iter().zip(seeds).enumerate() {
        let edge = output.gradient_edge().ok_or(PadError::NotDifferentiable(i))?;
        if seed.shape() != output.shape() {
            return Err(PadError::SeedShapeMismatch {
                expected: output.shape(),
                actual: seed.shape(),
            });
        }
        roots.push((edge, seed.clone()));
    }

    let graph = GraphTask::discover(&roots, &sink);
    log::debug!(
        "backward over {} node(s) from {} root(s)",
        graph.nodes.len(),
        roots.len()
    );
    graph.execute(roots, sink)
}

/// Reachable part of the graph, with dependency counts.
struct GraphTask {
    nodes: HashMap<usize, Arc<Node>>,
    dependencies: HashMap<usize, usize>,
    /// Nodes whose reverse procedure has to run. `None` means all of them.
    needed: Option<HashSet<usize>>,
}

impl GraphTask {
    fn discover(roots: &[(Edge, Variable)], sink: &Sink) -> Self {
        let mut nodes = HashMap::new();
        let mut dependencies: HashMap<usize, usize> = HashMap::new();
        let mut stack: Vec<Arc<Node>> = Vec::new();

        for (edge, _) in roots {
            if let Edge::Node(node) = edge {
                if nodes.insert(edge.key(), Arc::clone(node)).is_none() {
                    stack.push(Arc::clone(node));
                }
            }
        }

        while let Some(node) = stack.pop() {
            for edge in node.next_edges().iter().flatten() {
                if let Edge::Node(next) = edge {
                    let key = edge.key();
                    *dependencies.entry(key).or_default() += 1;
                    if nodes.insert(key, Arc::clone(next)).is_none() {
                        stack.push(Arc::clone(next));
                    }
                }
            }
        }

        let needed = match sink {
            Sink::Accumulate => None,
            Sink::Capture(wanted) => Some(needed_nodes(&nodes, wanted)),
        };

        Self {
            nodes,
            dependencies,
            needed,
        }
    }

    fn is_needed(&self, key: usize) -> bool {
        self.needed.as_ref().is_none_or(|set| set.contains(&key))
    }

    fn execute(mut self, roots: Vec<(Edge, Variable)>, sink: Sink) -> Result<HashMap<usize, Variable>> {
        let mut buffers: HashMap<usize, Variable> = HashMap::new();
        let mut captured: HashMap<usize, Variable> = HashMap::new();

        for (edge, seed) in roots {
            deliver(&edge, seed, &sink, &mut buffers, &mut captured)?;
        }

        let mut ready: Vec<Arc<Node>> = self
            .nodes
            .iter()
            .filter(|(key, _)| !self.dependencies.contains_key(*key))
            .map(|(_, node)| Arc::clone(node))
            .collect();

        while let Some(node) = ready.pop() {
            let key = node_key(&node);
            let incoming = buffers.remove(&key);

            if let (Some(grad_output), Sink::Capture(wanted)) = (&incoming, &sink) {
                if wanted.contains(&key) {
                    captured.insert(key, grad_output.clone());
                }
            }

            if let Some(grad_output) = incoming.filter(|_| self.is_needed(key)) {
                let grads = node.apply(&grad_output)?;
                for (edge, grad) in node.next_edges().iter().zip(grads) {
                    if let (Some(edge), Some(grad)) = (edge, grad) {
                        deliver(edge, grad, &sink, &mut buffers, &mut captured)?;
                    }
                }
            }

            for edge in node.next_edges().iter().flatten() {
                if let Edge::Node(next) = edge {
                    let remaining = self.dependencies.entry(edge.key()).or_default();
                    *remaining = remaining.saturating_sub(1);
                    if *remaining == 0 {
                        self.dependencies.remove(&edge.key());
                        ready.push(Arc::clone(next));
                    }
                }
            }
        }

        log::debug!("backward finished, {} gradient(s) captured", captured.len());
        Ok(captured)
    }
}

fn node_key(node: &Arc<Node>) -> usize {
    Arc::as_ptr(node) as *const () as usize
}

/// Nodes from which a wanted destination can be reached.
fn needed_nodes(nodes: &HashMap<usize, Arc<Node>>, wanted: &HashSet<usize>) -> HashSet<usize> {
    fn visit(
        key: usize,
        nodes: &HashMap<usize, Arc<Node>>,
        wanted: &HashSet<usize>,
        memo: &mut HashMap<usize, bool>,
    ) -> bool {
        if let Some(&known) = memo.get(&key) {
            return known;
        }
        memo.insert(key, false);
        let mut reaches = false;
        if let Some(node) = nodes.get(&key) {
            for edge in node.next_edges().iter().flatten() {
                let next = edge.key();
                let hit = wanted.contains(&next) || (matches!(edge, Edge::Node(_)) && visit(next, nodes, wanted, memo));
                reaches |= hit;
            }
        }
        memo.insert(key, reaches);
        reaches
    }

    let mut memo = HashMap::new();
    nodes
        .keys()
        .copied()
        .filter(|&key| visit(key, nodes, wanted, &mut memo))
        .collect()
}

fn deliver(
    edge: &Edge,
    grad: Variable,
    sink: &Sink,
    buffers: &mut HashMap<usize, Variable>,
    captured: &mut HashMap<usize, Variable>,
) -> Result<()> {
    let key = edge.key();
    match (edge, sink) {
        (Edge::Node(_), _) => sum_into(buffers, key, grad),
        (Edge::Leaf(_), Sink::Capture(wanted)) => {
            if wanted.contains(&key) {
                sum_into(captured, key, grad)?;
            }
            Ok(())
        }
        (Edge::Leaf(slot), Sink::Accumulate) => {
            let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
            let sum = match slot.take() {
                Some(existing) => existing.add(&grad.data())?,
                None => grad.data(),
            };
            *slot = Some(sum);
            Ok(())
        }
    }
}

fn sum_into(map: &mut HashMap<usize, Variable>, key: usize, grad: Variable) -> Result<()> {
    let total = match map.remove(&key) {
        Some(existing) => arith::add(&existing, &grad)?,
        None => grad,
    };
    map.insert(key, total);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::arith::add;
    use crate::tensor;

    #[test]
    fn fan_in_is_summed() {
        let x = Variable::leaf(tensor!([1.0, 2.0]));
        let y = add(&x, &x).unwrap();
        let z = add(&y, &x).unwrap();
        backward(&[z], &[tensor!([1.0, 1.0])]).unwrap();
        assert_eq!(x.grad().unwrap().data(), &[3.0, 3.0]);
    }

    #[test]
    fn backward_accumulates_across_calls() {
        let x = Variable::leaf(tensor!([1.0]));
        let y = add(&x, &x).unwrap();
        y.backward(None).unwrap();
        y.backward(None).unwrap();
        assert_eq!(x.grad().unwrap().data(), &[4.0]);
    }

    #[test]
    fn grad_leaves_slots_alone() {
        let x = Variable::leaf(tensor!([1.0]));
        let c = Variable::constant(tensor!([5.0]));
        let y = add(&x, &c).unwrap();
        let grads = grad(&[y], &[Variable::constant(tensor!([2.0]))], &[x.clone(), c], false).unwrap();
        assert_eq!(grads[0].as_ref().unwrap().data().data(), &[2.0]);
        assert!(grads[1].is_none());
        assert!(x.grad().is_none());
    }

    #[test]
    fn grad_wrt_intermediate() {
        let x = Variable::leaf(tensor!([1.0]));
        let y = add(&x, &x).unwrap();
        let z = add(&y, &y).unwrap();
        let grads = grad(&[z], &[Variable::constant(tensor!([1.0]))], &[y], false).unwrap();
        assert_eq!(grads[0].as_ref().unwrap().data().data(), &[2.0]);
    }

    #[test]
    fn unreached_input_is_rejected() {
        let x = Variable::leaf(tensor!([1.0]));
        let z = Variable::leaf(tensor!([1.0]));
        let y = add(&x, &x).unwrap();
        let seed = Variable::constant(tensor!([1.0]));

        let err = grad(&[y.clone()], &[seed.clone()], &[x.clone(), z], false).unwrap_err();
        assert!(matches!(err, PadError::UnusedInput(1)));

        let grads = grad(&[y], &[seed], &[x.clone(), x], false).unwrap();
        assert_eq!(grads[0].as_ref().unwrap().data(), grads[1].as_ref().unwrap().data());
    }

    #[test]
    fn seed_errors() {
        let x = Variable::leaf(tensor!([1.0, 2.0]));
        let y = add(&x, &x).unwrap();
        assert!(matches!(
            backward(&[y.clone()], &[]),
            Err(PadError::SeedCountMismatch { expected: 1, actual: 0 })
        ));
        let err = backward(&[y], &[tensor!([1.0])]).unwrap_err();
        assert!(matches!(err, PadError::SeedShapeMismatch { .. }));
        assert!(!err.is_kernel_validation());
    }
}
