//! Scanline store error types.

pub type Result<T> = std::result::Result<T, CleanError>;

/// Fatal conditions for a single cleaning job
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CleanError {
    /// A line index (the axis lines are indexed by) fell outside the grid
    #[error("row index {index} out of bounds for a grid of {size} lines")]
    OutOfBoundsRow { index: i64, size: usize },
    /// An interpolated position along a line fell outside the grid
    #[error("column position {position} out of bounds for a grid of {size} positions")]
    OutOfBoundsColumn { position: i64, size: usize },
    #[error("invalid bounding box: ({hor1}, {ver1}) .. ({hor2}, {ver2})")]
    InvalidBounds {
        hor1: i32,
        hor2: i32,
        ver1: i32,
        ver2: i32,
    },
    /// The extent needs more lines than the grid may hold
    #[error("extent needs {lines} lines per grid, limit is {limit}")]
    ExtentTooLarge { lines: u64, limit: usize },
    #[error("could not allocate a grid of {lines} lines")]
    AllocationFailed { lines: usize },
}
