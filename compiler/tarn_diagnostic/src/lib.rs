//! Diagnostic types for the Tarn type checker.
//!
//! The semantic core never phrases user errors itself: degraded outcomes
//! (a truncated alias chain, an exhausted ancestor search) are returned as
//! [`Diagnostic`] values, and the layers above decide how to render them.
//! This crate only defines the shared vocabulary - severity, error code,
//! labeled locations, notes - not any rendering.

mod diagnostic;
mod error_code;

pub use diagnostic::{Diagnostic, Label, Severity};
pub use error_code::ErrorCode;
