use std::fmt;

/// Error codes for diagnostics emitted by the semantic core.
///
/// Format: E#### where the first digit indicates the area:
/// - E5xxx: name/symbol resolution degradations
/// - E9xxx: internal consistency errors
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    /// Alias chain exceeded the expansion bound; result truncated.
    E5001,
    /// No exact member; fuzzy search produced these candidates.
    E5002,
    /// Ancestor search exceeded the recursion depth guard.
    E9001,
    /// In-memory model failed an internal invariant check.
    E9002,
}

impl ErrorCode {
    /// Short description for code indexes and test output.
    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::E5001 => "type alias expansion truncated",
            ErrorCode::E5002 => "no such member; similar names exist",
            ErrorCode::E9001 => "ancestor search hit the depth guard",
            ErrorCode::E9002 => "internal invariant violation",
        }
    }

    /// Whether this code reports a corrupted in-memory model.
    pub fn is_internal(self) -> bool {
        matches!(self, ErrorCode::E9001 | ErrorCode::E9002)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
