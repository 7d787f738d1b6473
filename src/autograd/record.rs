//! Invocation records: the state an operator saves for its reverse procedure.
//!
//! A record is assembled once, at forward time, through [`RecordBuilder`] and is
//! read-only from then on. It holds
//!
//! - `saved_tensors`: snapshots of tensor arguments ([`SavedTensor`]),
//! - `saved_scalars`: named non-tensor arguments ([`SavedValue`]),
//! - `arity`: how many arguments the forward call had, which is also the length
//!   every [`GradientVector`] produced from this record must have.

use std::collections::BTreeMap;

use crate::error::{PadError, Result};
use crate::tensors::Ten64;

use super::node::Edge;
use super::variable::Variable;

/// One gradient slot per forward argument; `None` for arguments that have no
/// gradient (integers, strings, constants).
pub type GradientVector = Vec<Option<Variable>>;

/// A tensor argument captured at forward time.
///
/// The data is a copy-on-write clone of the argument, so later in-place edits of
/// the argument never reach the snapshot. The gradient edge is kept alongside so
/// an unpacked snapshot still sends its gradient to where the argument would have.
#[derive(Debug, Clone)]
pub struct SavedTensor {
    data: Ten64,
    edge: Option<Edge>,
}

impl SavedTensor {
    /// Snapshots `variable`.
    pub fn save(variable: &Variable) -> Self {
        Self {
            data: variable.data(),
            edge: variable.gradient_edge(),
        }
    }

    /// The saved value.
    pub fn data(&self) -> &Ten64 {
        &self.data
    }

    /// Whether the original argument took part in a graph.
    pub fn requires_grad(&self) -> bool {
        self.edge.is_some()
    }

    /// A variable holding the saved value and routing gradients to the original.
    pub fn unpack(&self) -> Variable {
        Variable::from_edge(self.data.clone(), self.edge.clone())
    }
}

/// A saved non-tensor argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SavedValue {
    /// Integer argument.
    Int(i64),
    /// String argument.
    Str(String),
}

/// Immutable state of one operator invocation.
#[derive(Debug)]
pub struct InvocationRecord {
    saved_tensors: Vec<SavedTensor>,
    saved_scalars: BTreeMap<&'static str, SavedValue>,
    arity: usize,
}

impl InvocationRecord {
    /// Starts a record for a call with `arity` arguments.
    pub fn builder(arity: usize) -> RecordBuilder {
        RecordBuilder {
            record: Self {
                saved_tensors: Vec::new(),
                saved_scalars: BTreeMap::new(),
                arity,
            },
        }
    }

    /// Saved tensors, in the order they were saved.
    pub fn saved_tensors(&self) -> &[SavedTensor] {
        &self.saved_tensors
    }

    /// The `index`-th saved tensor.
    ///
    /// # Errors
    /// [`PadError::MissingSavedValue`] when nothing was saved at `index`.
    pub fn saved_tensor(&self, index: usize) -> Result<&SavedTensor> {
        self.saved_tensors
            .get(index)
            .ok_or(PadError::MissingSavedValue("saved_tensors"))
    }

    /// Saved scalars by name.
    pub fn saved_scalars(&self) -> &BTreeMap<&'static str, SavedValue> {
        &self.saved_scalars
    }

    /// A saved integer.
    ///
    /// # Errors
    /// [`PadError::MissingSavedValue`] when absent or not an integer.
    pub fn int(&self, name: &'static str) -> Result<i64> {
        match self.saved_scalars.get(name) {
            Some(SavedValue::Int(v)) => Ok(*v),
            _ => Err(PadError::MissingSavedValue(name)),
        }
    }

    /// A saved string.
    ///
    /// # Errors
    /// [`PadError::MissingSavedValue`] when absent or not a string.
    pub fn string(&self, name: &'static str) -> Result<&str> {
        match self.saved_scalars.get(name) {
            Some(SavedValue::Str(v)) => Ok(v),
            _ => Err(PadError::MissingSavedValue(name)),
        }
    }

    /// Number of arguments of the recorded call.
    pub fn arity(&self) -> usize {
        self.arity
    }
}

/// Write side of an [`InvocationRecord`]; consumed by [`RecordBuilder::build`].
#[derive(Debug)]
pub struct RecordBuilder {
    record: InvocationRecord,
}

impl RecordBuilder {
    /// Saves a tensor argument.
    pub fn save_tensor(mut self, variable: &Variable) -> Self {
        self.record.saved_tensors.push(SavedTensor::save(variable));
        self
    }

    /// Saves an integer argument.
    pub fn save_int(mut self, name: &'static str, value: i64) -> Self {
        self.record.saved_scalars.insert(name, SavedValue::Int(value));
        self
    }

    /// Saves a string argument.
    pub fn save_str(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.record.saved_scalars.insert(name, SavedValue::Str(value.into()));
        self
    }

    /// Freezes the record.
    pub fn build(self) -> InvocationRecord {
        self.record
    }
}
