//! Scanline grids and the store that owns them
//!
//! A grid holds one sorted crossing list per line. The store keeps a row grid
//! and a column grid; exactly one is active and the other is rebuilt from it
//! whenever the orientation switches.
//!
//! Crossings are stored one unit outside the true boundary (enters at
//! `x - 1`, exits at `x + 1`) and decoded back on readout. Two shapes that
//! abut therefore overlap by a unit inside the grid and are fused by
//! [`ScanlineStore::sortlist`] instead of leaving a zero-width gap.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{CleanError, Result};
use super::types::{Bounds, EdgeCoord, EdgeKind, Orientation, Point, Span, ViolationParameters};

/// Empty lines kept on each side of the declared extent
pub const GRID_PADDING: i32 = 2;

/// Largest line count either grid may be allocated with unless configured otherwise
pub const DEFAULT_MAX_GRID_LINES: usize = 1 << 24;

/// One orientation's worth of scanlines
#[derive(Debug, Clone, Default)]
pub struct ScanlineGrid {
    lines: Vec<Vec<EdgeCoord>>,
    /// Layout coordinate of line 0
    origin: i32,
    /// Layout coordinate of position 0 along a line
    secondary_origin: i32,
}

impl ScanlineGrid {
    pub fn new(len: usize, origin: i32, secondary_origin: i32) -> Result<Self> {
        let mut lines = Vec::new();
        lines
            .try_reserve_exact(len)
            .map_err(|_| CleanError::AllocationFailed { lines: len })?;
        lines.resize_with(len, Vec::new);
        Ok(Self {
            lines,
            origin,
            secondary_origin,
        })
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn origin(&self) -> i32 {
        self.origin
    }

    pub fn secondary_origin(&self) -> i32 {
        self.secondary_origin
    }

    pub fn lines(&self) -> &[Vec<EdgeCoord>] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> Option<&[EdgeCoord]> {
        self.lines.get(index).map(Vec::as_slice)
    }

    pub(crate) fn lines_mut(&mut self) -> &mut [Vec<EdgeCoord>] {
        &mut self.lines
    }

    /// Append a crossing; returns false if `index` is outside the grid
    pub(crate) fn push(&mut self, index: i32, coord: EdgeCoord) -> bool {
        match usize::try_from(index).ok().and_then(|i| self.lines.get_mut(i)) {
            Some(line) => {
                line.push(coord);
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
    }

    /// Layout coordinate of a line index
    pub fn coordinate_of(&self, index: usize) -> i32 {
        index as i32 + self.origin
    }

    /// Line index of a layout coordinate (may be out of range)
    pub fn index_of(&self, coordinate: i32) -> i64 {
        i64::from(coordinate) - i64::from(self.origin)
    }

    /// Layout coordinate of a stored crossing, undoing the unit offset
    pub fn decode(&self, coord: &EdgeCoord) -> i32 {
        match coord.kind {
            EdgeKind::Enter => coord.pos + 1 + self.secondary_origin,
            EdgeKind::Exit => coord.pos - 1 + self.secondary_origin,
        }
    }

    /// Spans of a line in layout coordinates
    pub fn decoded_spans(&self, index: usize) -> impl Iterator<Item = Span> + '_ {
        self.line(index)
            .unwrap_or(&[])
            .chunks_exact(2)
            .map(move |pair| Span::new(self.decode(&pair[0]), self.decode(&pair[1])))
    }
}

/// Pair up an alternating enter/exit list
pub(crate) fn spans_of(line: &[EdgeCoord]) -> impl Iterator<Item = Span> + '_ {
    line.chunks_exact(2)
        .map(|pair| Span::new(pair[0].pos, pair[1].pos))
}

/// Drop every crossing a pass marked for removal
pub(crate) fn purge_marked(line: &mut Vec<EdgeCoord>) {
    line.retain(|c| !c.marked);
}

fn line_count(lines: i64, max_lines: usize) -> Result<usize> {
    match usize::try_from(lines) {
        Ok(count) if count <= max_lines => Ok(count),
        _ => Err(CleanError::ExtentTooLarge { lines: lines as u64, limit: max_lines }),
    }
}

/// Per-line boundary coordinates in layout units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lines {
    pub orientation: Orientation,
    /// Layout coordinate of `lines[0]`
    pub first: i32,
    /// Alternating enter/exit coordinates for each line
    pub lines: Vec<Vec<i32>>,
}

impl Lines {
    /// Coordinates of the line at a layout coordinate
    pub fn at(&self, coordinate: i32) -> Option<&[i32]> {
        let index = usize::try_from(i64::from(coordinate) - i64::from(self.first)).ok()?;
        self.lines.get(index).map(Vec::as_slice)
    }

    /// Number of material runs over all lines
    pub fn span_count(&self) -> usize {
        self.lines.iter().map(|l| l.len() / 2).sum()
    }
}

/// Row and column grids for one layer plus the rules being enforced
#[derive(Debug, Clone)]
pub struct ScanlineStore {
    rows: ScanlineGrid,
    columns: ScanlineGrid,
    orientation: Orientation,
    params: ViolationParameters,
}

impl ScanlineStore {
    /// Allocate grids for a layout extent, row oriented
    pub fn new(bounds: Bounds, params: ViolationParameters) -> Result<Self> {
        Self::with_line_limit(bounds, params, DEFAULT_MAX_GRID_LINES)
    }

    /// Allocate grids, refusing extents that need more than `max_lines` lines on either axis
    pub fn with_line_limit(bounds: Bounds, params: ViolationParameters, max_lines: usize) -> Result<Self> {
        let padded = [bounds.hor1, bounds.ver1]
            .iter()
            .all(|c| c.checked_sub(GRID_PADDING + 1).is_some())
            && [bounds.hor2, bounds.ver2]
                .iter()
                .all(|c| c.checked_add(GRID_PADDING + 1).is_some());
        if bounds.width() < 0 || bounds.height() < 0 || !padded {
            return Err(CleanError::InvalidBounds {
                hor1: bounds.hor1,
                hor2: bounds.hor2,
                ver1: bounds.ver1,
                ver2: bounds.ver2,
            });
        }

        let pad = i64::from(2 * GRID_PADDING + 1);
        let row_count = line_count(bounds.height() + pad, max_lines)?;
        let column_count = line_count(bounds.width() + pad, max_lines)?;
        let row_origin = bounds.ver1 - GRID_PADDING;
        let column_origin = bounds.hor1 - GRID_PADDING;

        Ok(Self {
            rows: ScanlineGrid::new(row_count, row_origin, column_origin)?,
            columns: ScanlineGrid::new(column_count, column_origin, row_origin)?,
            orientation: Orientation::Row,
            params,
        })
    }

    /// Construct from the argument order used by the job record
    pub fn from_extent(
        hor1: i32,
        hor2: i32,
        ver1: i32,
        ver2: i32,
        min_space: i32,
        min_width: i32,
    ) -> Result<Self> {
        Self::new(
            Bounds::new(hor1, hor2, ver1, ver2),
            ViolationParameters::new(min_width, min_space),
        )
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn params(&self) -> ViolationParameters {
        self.params
    }

    /// Number of lines in the active grid
    pub fn size(&self) -> usize {
        self.active().len()
    }

    pub fn active(&self) -> &ScanlineGrid {
        match self.orientation {
            Orientation::Row => &self.rows,
            Orientation::Column => &self.columns,
        }
    }

    pub(crate) fn active_mut(&mut self) -> &mut ScanlineGrid {
        match self.orientation {
            Orientation::Row => &mut self.rows,
            Orientation::Column => &mut self.columns,
        }
    }

    /// Active grid and the grid to rebuild from it
    pub(crate) fn grids_mut(&mut self) -> (&ScanlineGrid, &mut ScanlineGrid) {
        match self.orientation {
            Orientation::Row => (&self.rows, &mut self.columns),
            Orientation::Column => (&self.columns, &mut self.rows),
        }
    }

    pub(crate) fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    /// Insert one edge from `(x1, y1)` to `(x2, y2)`.
    ///
    /// Upward edges become enters, downward edges exits. A slanted edge is
    /// manhattanized by interpolating its position line by line, rounding
    /// outward. Horizontal edges cross no line and are ignored.
    pub fn add_data(&mut self, x1: i32, x2: i32, y1: i32, y2: i32) -> Result<()> {
        if y1 == y2 {
            return Ok(());
        }

        let (kind, low, high, start, end) = if y2 > y1 {
            (EdgeKind::Enter, y1, y2, x1 - 1, x2 - 1)
        } else {
            (EdgeKind::Exit, y2, y1, x2 + 1, x1 + 1)
        };

        let (grid, orthogonal) = self.grids_mut();
        let position_limit = orthogonal.len();
        let secondary = i64::from(grid.secondary_origin());

        for position in [start, end] {
            let internal = i64::from(position) - secondary;
            if internal < 0 || internal >= position_limit as i64 {
                return Err(CleanError::OutOfBoundsColumn {
                    position: internal,
                    size: position_limit,
                });
            }
        }
        let first_line = grid.index_of(low);
        let last_line = grid.index_of(high);
        if first_line < 0 {
            return Err(CleanError::OutOfBoundsRow { index: first_line, size: grid.len() });
        }
        if last_line > grid.len() as i64 {
            return Err(CleanError::OutOfBoundsRow { index: last_line, size: grid.len() });
        }

        let start = start - grid.secondary_origin();
        let end = end - grid.secondary_origin();
        let (first_line, last_line) = (first_line as usize, last_line as usize);
        let dx = f64::from(end - start) / f64::from(high - low);

        let round = |x: f64| match kind {
            EdgeKind::Enter => x.trunc() as i32,
            EdgeKind::Exit => x.ceil() as i32,
        };
        // Take the position at the lower row boundary when that lies outward
        let leading = match kind {
            EdgeKind::Enter => dx > 0.0,
            EdgeKind::Exit => dx < 0.0,
        };

        let lines = self.active_mut().lines_mut();
        let mut x = f64::from(start);
        if leading {
            let mut pos = start;
            for line in &mut lines[first_line..last_line] {
                line.push(EdgeCoord::new(pos, kind));
                x += dx;
                pos = round(x);
            }
        } else {
            for line in &mut lines[first_line..last_line - 1] {
                x += dx;
                line.push(EdgeCoord::new(round(x), kind));
            }
            lines[last_line - 1].push(EdgeCoord::new(end, kind));
        }

        Ok(())
    }

    /// Insert an axis-aligned box given two opposite corners
    pub fn add_box(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) -> Result<()> {
        let (left, right) = (x1.min(x2), x1.max(x2));
        let (bottom, top) = (y1.min(y2), y1.max(y2));
        self.add_data(left, left, bottom, top)?;
        self.add_data(right, right, top, bottom)
    }

    /// Insert every edge of a closed clockwise ring
    pub fn add_polygon(&mut self, points: &[Point]) -> Result<()> {
        for (i, p) in points.iter().enumerate() {
            let q = points[(i + 1) % points.len()];
            self.add_data(p.x, q.x, p.y, q.y)?;
        }
        Ok(())
    }

    /// Sort every line and drop crossings of overlapping material.
    ///
    /// Lines come out alternating enter/exit; nested or unmatched crossings
    /// are removed, which unions overlapping shapes on the line.
    pub fn sortlist(&mut self) {
        for line in self.active_mut().lines_mut() {
            if line.is_empty() {
                continue;
            }
            line.sort_by_key(EdgeCoord::sort_key);
            mark_overlaps(line);
            purge_marked(line);
        }
    }

    /// Boundary coordinates of every active line, in layout units
    pub fn get_lines(&self) -> Lines {
        let grid = self.active();
        Lines {
            orientation: self.orientation,
            first: grid.origin(),
            lines: grid
                .lines()
                .iter()
                .map(|line| line.iter().map(|c| grid.decode(c)).collect())
                .collect(),
        }
    }

    /// Boundary coordinates of the line at a layout coordinate
    pub fn get_vect(&self, coordinate: i32) -> Result<Vec<i32>> {
        let grid = self.active();
        let line = self.line_at(coordinate)?;
        Ok(line.iter().map(|c| grid.decode(c)).collect())
    }

    /// Crossing kinds of the line at a layout coordinate
    pub fn get_types(&self, coordinate: i32) -> Result<Vec<EdgeKind>> {
        Ok(self.line_at(coordinate)?.iter().map(|c| c.kind).collect())
    }

    fn line_at(&self, coordinate: i32) -> Result<&[EdgeCoord]> {
        let grid = self.active();
        let index = grid.index_of(coordinate);
        usize::try_from(index)
            .ok()
            .and_then(|i| grid.line(i))
            .ok_or(CleanError::OutOfBoundsRow { index, size: grid.len() })
    }
}

/// Mark crossings that nest inside material already open on the line
fn mark_overlaps(line: &mut [EdgeCoord]) {
    let mut depth = 0i32;
    let mut open = None;
    for (i, coord) in line.iter_mut().enumerate() {
        match coord.kind {
            EdgeKind::Enter => {
                depth += 1;
                if depth == 1 {
                    open = Some(i);
                } else {
                    coord.marked = true;
                }
            }
            EdgeKind::Exit => {
                if depth == 1 {
                    open = None;
                } else {
                    coord.marked = true;
                }
                depth = (depth - 1).max(0);
            }
        }
    }
    // Material still open at the end of the line has no exit to pair with
    if let Some(i) = open {
        line[i].marked = true;
    }
}

impl fmt::Display for ScanlineStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let grid = self.active();
        writeln!(f, "{:?} oriented, {} lines from {}", self.orientation, grid.len(), grid.origin())?;
        for (i, line) in grid.lines().iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            write!(f, "{}: [", grid.coordinate_of(i))?;
            for coord in line {
                write!(f, "({},{})", grid.decode(coord), coord.kind.code())?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    }
}
