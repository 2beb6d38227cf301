//! Scanline violation repair for Manhattan layouts
//!
//! Geometry is rasterised into per-row crossing lists, width and space
//! violations are repaired on rows and columns in turn, and the result is
//! read back as flat lines or closed polygons.
//!
//! # Module Structure
//! - `types` - Crossings, spans, orientation and rule parameters
//! - `error` - Fatal conditions of a cleaning job
//! - `scanline` - Row/column grids, edge insertion and canonicalisation
//! - `switch` - Row to column conversion
//! - `repair` - Width and space passes and the phase driver
//! - `polygons` - Ring reconstruction from cleaned rows

pub mod error;
pub mod polygons;
pub mod repair;
pub mod scanline;
pub mod switch;
pub mod types;

pub use error::{CleanError, Result};
pub use polygons::{PolygonReconstructor, SplitPolygon};
pub use repair::{CleanReport, PhaseReport, Rule, DEFAULT_MAX_TRIES};
pub use scanline::{Lines, ScanlineGrid, ScanlineStore, DEFAULT_MAX_GRID_LINES};
pub use switch::{listdif, switch_dimensions};
pub use types::{Bounds, EdgeCoord, EdgeKind, Orientation, Point, Ring, Span, ViolationParameters};
