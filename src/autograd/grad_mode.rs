//! Thread-local gradient-recording switch.

use std::cell::Cell;

thread_local! {
    static GRAD_ENABLED: Cell<bool> = const { Cell::new(true) };
}

/// Whether operators called on this thread record graph nodes.
pub fn is_grad_enabled() -> bool {
    GRAD_ENABLED.with(Cell::get)
}

/// Switches recording on or off until the returned guard is dropped.
///
/// # Example
///
/// ```
/// use sphere_pad::autograd::{is_grad_enabled, set_grad_enabled};
///
/// {
///     let _guard = set_grad_enabled(false);
///     assert!(!is_grad_enabled());
/// }
/// assert!(is_grad_enabled());
/// ```
pub fn set_grad_enabled(enabled: bool) -> GradModeGuard {
    let prev = GRAD_ENABLED.with(|flag| flag.replace(enabled));
    GradModeGuard { prev }
}

/// Runs the enclosed block in raw tensor mode: nothing is recorded.
pub fn no_grad() -> GradModeGuard {
    set_grad_enabled(false)
}

/// Restores the previous recording mode on drop.
#[must_use = "recording mode reverts as soon as the guard is dropped"]
#[derive(Debug)]
pub struct GradModeGuard {
    prev: bool,
}

impl Drop for GradModeGuard {
    fn drop(&mut self) {
        GRAD_ENABLED.with(|flag| flag.set(self.prev));
    }
}
