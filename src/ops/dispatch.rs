//! Operator Dispatch Layer
//!
//! A process-wide table maps `(operator name, DispatchKey)` to an implementation.
//! Every public operator call looks its implementation up here:
//!
//! 1. [`dispatch_key_for`] picks `Autograd` or `Cpu` for the call.
//! 2. The entry for that key runs. `Autograd` entries record a graph node and
//!    [`redispatch`] to the `Cpu` entry for the actual numbers.
//!
//! # Design Highlights
//! - **Pluggable**: any entry can be replaced with [`register_kernel`]
//! - **Populated once**: built-in entries are installed the first time the table
//!   is touched
//! - **Plain function pointers**: no state lives outside the table itself

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::autograd::Variable;
use crate::backend::{dispatch_key_for, DispatchKey};
use crate::error::{PadError, Result};
use crate::ops::args::PadArgs;
use crate::ops::cpu;
use crate::ops::spherical_pad::{SphericalPad2dBackwardFunction, SphericalPad2dFunction};

/// Registry name of the padding operator.
pub const SPHERICAL_PAD2D: &str = "sphere_pad::spherical_pad2d";

/// Registry name of the padding-gradient operator.
pub const SPHERICAL_PAD2D_BACKWARD: &str = "sphere_pad::_spherical_pad2d_backward";

/// Signature shared by every registered implementation: tensor arguments in
/// call order, then the non-tensor arguments.
pub type OpFn = fn(&[&Variable], &PadArgs) -> Result<Variable>;

type Table = HashMap<(&'static str, DispatchKey), OpFn>;

lazy_static::lazy_static! {
    static ref REGISTRY: RwLock<Table> = RwLock::new(builtin_table());
}

fn builtin_table() -> Table {
    let mut table = Table::new();
    table.insert((SPHERICAL_PAD2D, DispatchKey::Cpu), cpu_spherical_pad2d as OpFn);
    table.insert((SPHERICAL_PAD2D, DispatchKey::Autograd), autograd_spherical_pad2d);
    table.insert((SPHERICAL_PAD2D_BACKWARD, DispatchKey::Cpu), cpu_spherical_pad2d_backward);
    table.insert(
        (SPHERICAL_PAD2D_BACKWARD, DispatchKey::Autograd),
        autograd_spherical_pad2d_backward,
    );
    log::debug!("operator registry initialised with {} entries", table.len());
    table
}

fn expect_inputs<'a, const N: usize>(
    name: &'static str,
    inputs: &[&'a Variable],
) -> Result<[&'a Variable; N]> {
    inputs.try_into().map_err(|_| PadError::WrongInputCount {
        name: name.to_string(),
        expected: N,
        actual: inputs.len(),
    })
}

fn cpu_spherical_pad2d(inputs: &[&Variable], args: &PadArgs) -> Result<Variable> {
    let [input] = expect_inputs(SPHERICAL_PAD2D, inputs)?;
    Ok(Variable::constant(cpu::spherical_pad2d(&input.data(), args)?))
}

fn cpu_spherical_pad2d_backward(inputs: &[&Variable], args: &PadArgs) -> Result<Variable> {
    let [grad_output, input] = expect_inputs(SPHERICAL_PAD2D_BACKWARD, inputs)?;
    Ok(Variable::constant(cpu::spherical_pad2d_backward(
        &grad_output.data(),
        &input.data(),
        args,
    )?))
}

fn autograd_spherical_pad2d(inputs: &[&Variable], args: &PadArgs) -> Result<Variable> {
    let [input] = expect_inputs(SPHERICAL_PAD2D, inputs)?;
    SphericalPad2dFunction::apply(input, args)
}

fn autograd_spherical_pad2d_backward(inputs: &[&Variable], args: &PadArgs) -> Result<Variable> {
    let [grad_output, input] = expect_inputs(SPHERICAL_PAD2D_BACKWARD, inputs)?;
    SphericalPad2dBackwardFunction::apply(grad_output, input, args)
}

/// Installs `f` as the implementation of `name` under `key`.
///
/// Returns the implementation it replaced, if any.
pub fn register_kernel(name: &'static str, key: DispatchKey, f: OpFn) -> Option<OpFn> {
    log::debug!("registering {name} for {key:?}");
    REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert((name, key), f)
}

/// Whether an implementation of `name` exists under `key`.
pub fn is_registered(name: &'static str, key: DispatchKey) -> bool {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains_key(&(name, key))
}

/// The implementation of `name` under `key`.
///
/// # Errors
/// [`PadError::UnknownOperator`] when nothing is registered.
pub fn lookup(name: &'static str, key: DispatchKey) -> Result<OpFn> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&(name, key))
        .copied()
        .ok_or_else(|| PadError::UnknownOperator {
            name: name.to_string(),
            key,
        })
}

/// Runs the implementation of `name` under an explicit `key`.
///
/// # Errors
/// Lookup failures, or whatever the implementation returns.
pub fn redispatch(
    name: &'static str,
    key: DispatchKey,
    inputs: &[&Variable],
    args: &PadArgs,
) -> Result<Variable> {
    let f = lookup(name, key)?;
    log::trace!("dispatch {name} -> {key:?}");
    f(inputs, args)
}

/// Runs `name`, choosing the key from the arguments and the recording mode.
///
/// # Errors
/// Lookup failures, or whatever the implementation returns.
pub fn call(name: &'static str, inputs: &[&Variable], args: &PadArgs) -> Result<Variable> {
    redispatch(name, dispatch_key_for(inputs), inputs, args)
}
