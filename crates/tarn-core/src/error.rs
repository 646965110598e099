/// Errors surfaced by the tarn runtime.
///
/// Operations validate their inputs before touching any reference count,
/// so an `Err` always leaves the context in a consistent state. Nothing
/// is retried or recovered internally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TarnError {
    /// A value tagged as a handle does not name a live heap cell.
    #[error("invalid memory handle")]
    InvalidHandle,

    #[error("index {index} out of bounds for cell of length {len}")]
    OutOfBounds { index: i64, len: usize },

    #[error("allocation size must be non-negative, got {0}")]
    BadSize(i64),

    #[error("cannot pop from an empty cell")]
    EmptyPop,

    /// The named variable or function is not defined.
    #[error("undefined identifier {0}")]
    Undefined(i64),

    #[error("type mismatch in `{op}`: expected {expected}, got {got}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        got: String,
    },

    #[error("division by zero")]
    DivisionByZero,
}

impl TarnError {
    pub fn out_of_bounds(index: i64, len: usize) -> Self {
        TarnError::OutOfBounds { index, len }
    }

    pub fn type_mismatch(op: &'static str, got: impl Into<String>) -> Self {
        TarnError::TypeMismatch {
            op,
            expected: "int",
            got: got.into(),
        }
    }
}
