//! Stack safety utilities for deep recursion.
//!
//! Type trees, ancestor graphs, and constraint bounds are all user-shaped:
//! the checker recurses as deep as the program nests. Instead of trusting the
//! OS thread stack, recursion sites wrap themselves in
//! [`ensure_sufficient_stack`], which grows the stack on demand.
//!
//! # Platform Support
//!
//! - **Native targets**: Uses the `stacker` crate to grow the stack on demand.
//! - **WASM targets**: No-op passthrough (WASM has its own stack management).
//!
//! # Configuration
//!
//! - **Red zone**: 128KB - If less than this remains, we grow the stack
//! - **Growth size**: 2MB - Each growth allocates this much additional space
//!
//! The red zone is sized for the largest single stack frame in the subtyping
//! lattice; the growth size keeps the number of allocations low even for
//! pathologically nested unions.

/// Minimum stack space to keep available (128KB red zone).
const RED_ZONE: usize = 128 * 1024;

/// Stack space to allocate when growing (2MB).
const STACK_PER_RECURSION: usize = 2 * 1024 * 1024;

/// Ensure sufficient stack space is available before executing `f`.
///
/// If the remaining stack is below the red zone threshold, this allocates
/// additional stack space before calling `f`.
///
/// ```text
/// fn walk(&self, t: &TypePtr) -> TypePtr {
///     ensure_sufficient_stack(|| {
///         // ... recurse into t's children ...
///     })
/// }
/// ```
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// WASM version - just call directly (WASM has its own stack management).
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shallow_recursion() {
        fn triangle(n: u64) -> u64 {
            ensure_sufficient_stack(|| if n == 0 { 0 } else { n + triangle(n - 1) })
        }

        assert_eq!(triangle(100), 5050);
    }

    #[test]
    fn deep_recursion() {
        // Would overflow a typical 8MB stack without growth.
        fn depth(n: u64) -> u64 {
            ensure_sufficient_stack(|| if n == 0 { 0 } else { depth(n - 1) + 1 })
        }

        assert_eq!(depth(200_000), 200_000);
    }

    #[test]
    fn returns_closure_result() {
        let result: Result<i32, &str> = ensure_sufficient_stack(|| Ok(7));
        assert_eq!(result, Ok(7));
    }
}
