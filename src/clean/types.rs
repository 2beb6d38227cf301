//! Scanline data types
//!
//! Edge crossings, spans, orientation and the rule set a cleaning job runs
//! against. Positions stored in a grid are internal indices; everything
//! handed back to callers is in layout coordinates.

use serde::{Deserialize, Serialize};

/// Which side of a crossing the polygon interior lies on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Interior lies towards increasing coordinates (type 0)
    Enter,
    /// Interior lies towards decreasing coordinates (type 1)
    Exit,
}

impl EdgeKind {
    /// Numeric type code used by the flat line format
    pub fn code(self) -> i32 {
        match self {
            EdgeKind::Enter => 0,
            EdgeKind::Exit => 1,
        }
    }

    /// Exits sort before enters at equal position so abutting shapes fuse
    fn sort_rank(self) -> u8 {
        match self {
            EdgeKind::Exit => 0,
            EdgeKind::Enter => 1,
        }
    }
}

/// One boundary crossing on a scanline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeCoord {
    pub pos: i32,
    pub kind: EdgeKind,
    /// Set by the cleaning passes, purged at the end of each line
    pub marked: bool,
}

impl EdgeCoord {
    pub fn new(pos: i32, kind: EdgeKind) -> Self {
        Self { pos, kind, marked: false }
    }

    pub fn enter(pos: i32) -> Self {
        Self::new(pos, EdgeKind::Enter)
    }

    pub fn exit(pos: i32) -> Self {
        Self::new(pos, EdgeKind::Exit)
    }

    /// Ordering key: ascending position, exit before enter
    pub fn sort_key(&self) -> (i32, u8) {
        (self.pos, self.kind.sort_rank())
    }
}

/// A pair of crossings bounding one run of material on a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub enter: i32,
    pub exit: i32,
}

impl Span {
    pub fn new(enter: i32, exit: i32) -> Self {
        Self { enter, exit }
    }

    /// Overlap test where sharing a single coordinate counts as overlap
    pub fn touches(&self, other: &Span) -> bool {
        self.enter <= other.exit && other.enter <= self.exit
    }
}

/// Which grid is currently authoritative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    /// One line per layout row (y), positions along x
    #[default]
    Row,
    /// One line per layout column (x), positions along y
    Column,
}

impl Orientation {
    pub fn flipped(self) -> Self {
        match self {
            Orientation::Row => Orientation::Column,
            Orientation::Column => Orientation::Row,
        }
    }
}

/// Minimum feature width and spacing, fixed for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationParameters {
    pub min_width: i32,
    pub min_space: i32,
}

impl ViolationParameters {
    pub fn new(min_width: i32, min_space: i32) -> Self {
        Self { min_width, min_space }
    }

    /// Unit (or smaller) rules cannot be violated on an integer grid
    pub fn is_enforced(&self) -> bool {
        self.min_width > 1 && self.min_space > 1
    }
}

/// Layout extent a store is allocated for, inclusive on both axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub hor1: i32,
    pub hor2: i32,
    pub ver1: i32,
    pub ver2: i32,
}

impl Bounds {
    pub fn new(hor1: i32, hor2: i32, ver1: i32, ver2: i32) -> Self {
        Self { hor1, hor2, ver1, ver2 }
    }

    /// Horizontal extent, negative when the corners are swapped
    pub fn width(&self) -> i64 {
        i64::from(self.hor2) - i64::from(self.hor1)
    }

    pub fn height(&self) -> i64 {
        i64::from(self.ver2) - i64::from(self.ver1)
    }
}

/// A 2D layout point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Closed rectilinear ring, last point connects back to the first
pub type Ring = Vec<Point>;
