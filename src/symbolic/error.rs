use thiserror::Error;

use super::arg::Handle;

/// Contract violations raised by the symbolic core.
///
/// Every variant reflects a programming error in the caller (a malformed
/// tree, a missing bind pass, an unsupported layout), never a transient
/// condition, so nothing here is retried.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SymbolicError {
    #[error("unbound argument: kernel argument used before bind")]
    Unbound,
    #[error("invalid alignment {0} (expected 1, 2, 4, 8 or 16)")]
    InvalidAlignment(u32),
    #[error("invalid work-group size {0} (expected a power of two no larger than 1024)")]
    InvalidLocalSize(u32),
    #[error("unset access name for '{name}' in kernel {pass}")]
    UnsetAccessName { name: String, pass: usize },
    #[error("type mismatch: cannot apply '{op}' to {lhs} and {rhs}")]
    TypeMismatch {
        op: String,
        lhs: String,
        rhs: String,
    },
    #[error("buffer {handle} is bound as {existing} but used as {requested}")]
    LayoutConflict {
        handle: Handle,
        existing: String,
        requested: String,
    },
}

pub type Result<T> = std::result::Result<T, SymbolicError>;
