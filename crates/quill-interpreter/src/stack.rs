//! Native stack headroom for recursive evaluation.
//!
//! Each Quill call nests several interpreter frames. Growing the stack on
//! demand lets the call depth limit be reached on any thread instead of
//! overflowing first.

/// Default limit on nested function calls within one source unit.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1000;

/// Run `f` with at least a red zone of stack left, growing it if needed.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    const RED_ZONE: usize = 128 * 1024;
    const STACK_PER_SEGMENT: usize = 1024 * 1024;

    stacker::maybe_grow(RED_ZONE, STACK_PER_SEGMENT, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
