//! Polygon reconstruction
//!
//! Rows are swept bottom to top. Runs that continue one-to-one from the row
//! below are stacked into the same [`SplitPolygon`]; wherever runs split or
//! coalesce a fresh block is started for each new run and linked to the
//! blocks it touches below. Once the sweep is done each connected group of
//! blocks is walked counter-clockwise into a single ring.
//!
//! Holes are not emitted as separate rings. The walk never re-enters a block
//! it has already visited, which cuts every cycle in the block graph and
//! leaves the hole attached to the outer boundary through a zero-width slit.

use tracing::debug;

use super::scanline::{ScanlineGrid, ScanlineStore};
use super::switch::switch_dimensions;
use super::types::{Orientation, Point, Ring, Span};

/// A stack of runs that continue one-to-one from row to row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPolygon {
    /// Left boundary, bottom to top
    left: Vec<Point>,
    /// Right boundary, bottom to top
    right: Vec<Point>,
    /// Last row appended
    current_row: i32,
    /// Already emitted as part of some ring
    merged: bool,
    /// Blocks directly below that this block grew out of, ascending x
    merge_targets: Vec<usize>,
    /// Blocks directly above that grew out of this one, ascending x
    branches: Vec<usize>,
}

impl SplitPolygon {
    pub fn new(x1: i32, x2: i32, y: i32) -> Self {
        Self {
            left: vec![Point::new(x1, y), Point::new(x1, y + 1)],
            right: vec![Point::new(x2, y), Point::new(x2, y + 1)],
            current_row: y,
            merged: false,
            merge_targets: Vec::new(),
            branches: Vec::new(),
        }
    }

    /// Extend by the run `[x1, x2]` on row `y`
    pub fn append(&mut self, x1: i32, x2: i32, y: i32) {
        extend_side(&mut self.left, x1, y);
        extend_side(&mut self.right, x2, y);
        self.current_row = y;
    }

    pub fn current_row(&self) -> i32 {
        self.current_row
    }

    /// No other block touches this one
    pub fn is_isolated(&self) -> bool {
        self.merge_targets.is_empty() && self.branches.is_empty()
    }

    /// Counter-clockwise ring of this block alone: right side up, left side down
    pub fn right_merge(&self) -> Ring {
        self.right
            .iter()
            .chain(self.left.iter().rev())
            .copied()
            .collect()
    }

    /// Cyclic walk order around the block, counter-clockwise
    fn steps(&self) -> Vec<Step> {
        let mut steps = Vec::with_capacity(2 + self.branches.len() + self.merge_targets.len());
        steps.push(Step::Right);
        steps.extend(self.branches.iter().rev().map(|&b| Step::Neighbor(b)));
        steps.push(Step::Left);
        steps.extend(self.merge_targets.iter().map(|&b| Step::Neighbor(b)));
        steps
    }
}

fn extend_side(side: &mut Vec<Point>, x: i32, y: i32) {
    match side.last_mut() {
        Some(last) if last.x == x => last.y = y + 1,
        _ => {
            side.push(Point::new(x, y));
            side.push(Point::new(x, y + 1));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Right,
    Left,
    Neighbor(usize),
}

struct Frame {
    block: usize,
    steps: Vec<Step>,
    cursor: usize,
    remaining: usize,
}

/// Row-by-row sweep building split polygons
#[derive(Debug, Default)]
pub struct PolygonReconstructor {
    blocks: Vec<SplitPolygon>,
    /// Runs of the previous row with the block each one extends
    open: Vec<(Span, usize)>,
    last_row: Option<i32>,
}

impl PolygonReconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconstruct every ring of a row-oriented grid
    pub fn from_grid(grid: &ScanlineGrid) -> Vec<Ring> {
        let mut reconstructor = Self::new();
        for index in 0..grid.len() {
            let spans: Vec<Span> = grid.decoded_spans(index).collect();
            reconstructor.push_row(grid.coordinate_of(index), &spans);
        }
        reconstructor.finish()
    }

    pub fn blocks(&self) -> &[SplitPolygon] {
        &self.blocks
    }

    /// Feed the sorted, disjoint runs of row `y`.
    ///
    /// Rows must arrive in ascending order; a skipped row closes everything.
    pub fn push_row(&mut self, y: i32, spans: &[Span]) {
        if self.last_row.is_some_and(|last| y != last + 1) {
            self.open.clear();
        }
        self.last_row = Some(y);

        let prev = std::mem::take(&mut self.open);
        let mut next = Vec::with_capacity(spans.len());
        let (mut i, mut j) = (0, 0);

        while i < prev.len() || j < spans.len() {
            let (mut pi, mut cj) = (i, j);
            if j >= spans.len() || (i < prev.len() && prev[i].0.enter <= spans[j].enter) {
                pi += 1;
            } else {
                cj += 1;
            }
            // Grow the component while the next run on either side touches it
            loop {
                if pi < prev.len() && cj > j && prev[pi].0.touches(&spans[cj - 1]) {
                    pi += 1;
                } else if cj < spans.len() && pi > i && spans[cj].touches(&prev[pi - 1].0) {
                    cj += 1;
                } else {
                    break;
                }
            }

            self.join(&prev[i..pi], &spans[j..cj], y, &mut next);
            i = pi;
            j = cj;
        }

        self.open = next;
    }

    fn join(&mut self, below: &[(Span, usize)], runs: &[Span], y: i32, next: &mut Vec<(Span, usize)>) {
        match (below, runs) {
            (_, []) => {}
            ([(_, block)], [run]) => {
                self.blocks[*block].append(run.enter, run.exit, y);
                next.push((*run, *block));
            }
            _ => {
                for run in runs {
                    let id = self.blocks.len();
                    let mut polygon = SplitPolygon::new(run.enter, run.exit, y);
                    for (_, block) in below.iter().filter(|(s, _)| s.touches(run)) {
                        self.blocks[*block].branches.push(id);
                        polygon.merge_targets.push(*block);
                    }
                    self.blocks.push(polygon);
                    next.push((*run, id));
                }
            }
        }
    }

    /// Walk every connected group of blocks into one ring
    pub fn finish(mut self) -> Vec<Ring> {
        let mut rings = Vec::new();

        for root in (0..self.blocks.len()).rev() {
            if self.blocks[root].merged {
                continue;
            }
            let ring = if self.blocks[root].is_isolated() {
                self.blocks[root].merged = true;
                self.blocks[root].right_merge()
            } else {
                self.trace(root)
            };
            let ring = simplify(ring);
            if ring.len() >= 4 {
                rings.push(ring);
            } else {
                debug!(root, "dropping degenerate ring");
            }
        }

        debug!(blocks = self.blocks.len(), rings = rings.len(), "reconstructed polygons");
        rings
    }

    fn trace(&mut self, root: usize) -> Ring {
        let mut ring = Vec::new();
        let steps = self.blocks[root].steps();
        self.blocks[root].merged = true;
        let mut stack = vec![Frame {
            block: root,
            remaining: steps.len(),
            steps,
            cursor: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            if frame.remaining == 0 {
                stack.pop();
                continue;
            }
            let step = frame.steps[frame.cursor % frame.steps.len()];
            frame.cursor += 1;
            frame.remaining -= 1;
            let from = frame.block;

            match step {
                Step::Right => ring.extend_from_slice(&self.blocks[from].right),
                Step::Left => ring.extend(self.blocks[from].left.iter().rev().copied()),
                Step::Neighbor(block) => {
                    if self.blocks[block].merged {
                        continue;
                    }
                    self.blocks[block].merged = true;
                    let steps = self.blocks[block].steps();
                    let entry = steps
                        .iter()
                        .position(|s| *s == Step::Neighbor(from))
                        .unwrap_or(0);
                    stack.push(Frame {
                        block,
                        cursor: entry + 1,
                        remaining: steps.len() - 1,
                        steps,
                    });
                }
            }
        }

        ring
    }
}

/// Drop repeated and collinear points, including across the wrap
pub fn simplify(points: Vec<Point>) -> Ring {
    let mut out: Ring = Vec::with_capacity(points.len());
    for p in points {
        if out.last() == Some(&p) {
            continue;
        }
        while out.len() >= 2 && collinear(out[out.len() - 2], out[out.len() - 1], p) {
            out.pop();
        }
        if out.last() != Some(&p) {
            out.push(p);
        }
    }

    while out.len() >= 3 {
        let n = out.len();
        if out[n - 1] == out[0] || collinear(out[n - 2], out[n - 1], out[0]) {
            out.pop();
        } else if collinear(out[n - 1], out[0], out[1]) {
            out.remove(0);
        } else {
            break;
        }
    }

    out
}

fn collinear(a: Point, b: Point, c: Point) -> bool {
    (a.x == b.x && b.x == c.x) || (a.y == b.y && b.y == c.y)
}

impl ScanlineStore {
    /// Closed counter-clockwise rings for the current contents.
    ///
    /// Switches back to row orientation first if needed.
    pub fn get_polygons(&mut self) -> Vec<Ring> {
        if self.orientation() == Orientation::Column {
            switch_dimensions(self);
        }
        PolygonReconstructor::from_grid(self.active())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn store() -> ScanlineStore {
        ScanlineStore::from_extent(0, 100, 0, 100, 10, 10).unwrap()
    }

    fn polygons(boxes: &[(i32, i32, i32, i32)]) -> Vec<Ring> {
        let mut sl = store();
        for &(x1, y1, x2, y2) in boxes {
            sl.add_box(x1, y1, x2, y2).unwrap();
        }
        sl.sortlist();
        sl.get_polygons()
    }

    fn doubled_area(ring: &[Point]) -> i64 {
        (0..ring.len())
            .map(|i| {
                let (a, b) = (ring[i], ring[(i + 1) % ring.len()]);
                i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y)
            })
            .sum()
    }

    fn assert_rectilinear(ring: &[Point]) {
        assert!(ring.len() >= 4 && ring.len() % 2 == 0, "{ring:?}");
        for i in 0..ring.len() {
            let (a, b, c) = (ring[i], ring[(i + 1) % ring.len()], ring[(i + 2) % ring.len()]);
            assert!(a != b, "{ring:?}");
            assert!(a.x == b.x || a.y == b.y, "{ring:?}");
            assert!(!collinear(a, b, c), "{ring:?}");
        }
    }

    fn points(pairs: &[(i32, i32)]) -> HashSet<Point> {
        pairs.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn test_single_box() {
        let rings = polygons(&[(0, 0, 100, 100)]);
        assert_eq!(rings.len(), 1);
        assert_rectilinear(&rings[0]);
        assert_eq!(
            rings[0].iter().copied().collect::<HashSet<_>>(),
            points(&[(0, 0), (100, 0), (100, 100), (0, 100)])
        );
        assert_eq!(doubled_area(&rings[0]), 2 * 100 * 100);
    }

    #[test]
    fn test_separate_boxes_give_separate_rings() {
        let rings = polygons(&[(0, 0, 10, 10), (50, 50, 70, 60)]);
        assert_eq!(rings.len(), 2);
        let mut areas: Vec<i64> = rings.iter().map(|r| doubled_area(r)).collect();
        areas.sort();
        assert_eq!(areas, vec![200, 400]);
    }

    #[test]
    fn test_empty_row_closes_polygon() {
        let rings = polygons(&[(0, 0, 10, 10), (0, 11, 10, 20)]);
        assert_eq!(rings.len(), 2);
    }

    #[test]
    fn test_staircase_stays_one_block() {
        let rings = polygons(&[(0, 0, 40, 10), (0, 10, 10, 30)]);
        assert_eq!(rings.len(), 1);
        assert_rectilinear(&rings[0]);
        assert_eq!(rings[0].len(), 6);
        assert_eq!(doubled_area(&rings[0]), 2 * (400 + 200));
    }

    #[test]
    fn test_split_into_two_prongs() {
        let rings = polygons(&[(0, 0, 30, 5), (0, 5, 5, 30), (25, 5, 30, 30)]);
        assert_eq!(rings.len(), 1);
        assert_rectilinear(&rings[0]);
        assert_eq!(
            rings[0].iter().copied().collect::<HashSet<_>>(),
            points(&[(0, 0), (30, 0), (30, 30), (25, 30), (25, 5), (5, 5), (5, 30), (0, 30)])
        );
        assert_eq!(doubled_area(&rings[0]), 800);
    }

    #[test]
    fn test_two_legs_merge() {
        let rings = polygons(&[(0, 0, 5, 25), (25, 0, 30, 25), (0, 25, 30, 30)]);
        assert_eq!(rings.len(), 1);
        assert_rectilinear(&rings[0]);
        assert_eq!(rings[0].len(), 8);
        assert_eq!(doubled_area(&rings[0]), 800);
    }

    #[test]
    fn test_three_prongs_rise_from_one_base() {
        let rings = polygons(&[(0, 0, 50, 5), (0, 5, 5, 30), (20, 5, 25, 30), (45, 5, 50, 30)]);
        assert_eq!(rings.len(), 1);
        assert_rectilinear(&rings[0]);
        assert_eq!(rings[0].len(), 12);
        assert_eq!(
            rings[0].iter().copied().collect::<HashSet<_>>(),
            points(&[
                (0, 0), (50, 0), (50, 30), (45, 30), (45, 5), (25, 5),
                (25, 30), (20, 30), (20, 5), (5, 5), (5, 30), (0, 30),
            ])
        );
        assert_eq!(doubled_area(&rings[0]), 2 * (250 + 3 * 125));
    }

    #[test]
    fn test_three_legs_merge_into_one_bar() {
        let rings = polygons(&[(0, 0, 5, 25), (20, 0, 25, 25), (45, 0, 50, 25), (0, 25, 50, 30)]);
        assert_eq!(rings.len(), 1);
        assert_rectilinear(&rings[0]);
        assert_eq!(rings[0].len(), 12);
        assert_eq!(
            rings[0].iter().copied().collect::<HashSet<_>>(),
            points(&[
                (0, 0), (5, 0), (5, 25), (20, 25), (20, 0), (25, 0),
                (25, 25), (45, 25), (45, 0), (50, 0), (50, 30), (0, 30),
            ])
        );
        assert_eq!(doubled_area(&rings[0]), 2 * (250 + 3 * 125));
    }

    #[test]
    fn test_four_way_split_links_every_branch() {
        let mut reconstructor = PolygonReconstructor::new();
        reconstructor.push_row(0, &[Span::new(0, 70)]);
        reconstructor.push_row(
            1,
            &[Span::new(0, 5), Span::new(20, 25), Span::new(40, 45), Span::new(65, 70)],
        );
        reconstructor.push_row(2, &[Span::new(0, 70)]);

        let blocks = reconstructor.blocks();
        assert_eq!(blocks.len(), 6);
        assert_eq!(blocks[0].branches, vec![1, 2, 3, 4]);
        assert_eq!(blocks[5].merge_targets, vec![1, 2, 3, 4]);

        let rings = reconstructor.finish();
        assert_eq!(rings.len(), 1);
        // Three holes, each opened into the outline by a slit
        assert_eq!(doubled_area(&rings[0]), 2 * (70 + 4 * 5 + 70));
    }

    #[test]
    fn test_hole_becomes_keyhole() {
        let rings = polygons(&[
            (0, 0, 30, 5),
            (0, 5, 5, 25),
            (25, 5, 30, 25),
            (0, 25, 30, 30),
        ]);
        assert_eq!(rings.len(), 1);
        let ring = &rings[0];
        assert_eq!(ring.len(), 10);
        for i in 0..ring.len() {
            let (a, b) = (ring[i], ring[(i + 1) % ring.len()]);
            assert!(a.x == b.x || a.y == b.y);
        }
        assert_eq!(doubled_area(ring), 2 * (900 - 400));
        let set: HashSet<Point> = ring.iter().copied().collect();
        for p in points(&[(0, 0), (30, 0), (30, 30), (0, 30), (5, 5), (25, 5), (25, 25), (5, 25)]) {
            assert!(set.contains(&p), "missing {p:?}");
        }
    }

    #[test]
    fn test_corner_touch_counts_as_connected() {
        let mut reconstructor = PolygonReconstructor::new();
        reconstructor.push_row(0, &[Span::new(0, 10)]);
        reconstructor.push_row(1, &[Span::new(10, 20)]);
        assert_eq!(reconstructor.blocks().len(), 1);
        let rings = reconstructor.finish();
        assert_eq!(rings.len(), 1);
        assert_eq!(doubled_area(&rings[0]), 40);
    }

    #[test]
    fn test_component_grouping() {
        let mut reconstructor = PolygonReconstructor::new();
        reconstructor.push_row(0, &[Span::new(0, 10), Span::new(20, 30), Span::new(50, 60)]);
        reconstructor.push_row(1, &[Span::new(8, 22), Span::new(55, 58)]);
        // One fresh block for the bridge, the right run keeps its block
        assert_eq!(reconstructor.blocks().len(), 4);
        assert_eq!(reconstructor.blocks()[3].merge_targets, vec![0, 1]);
        assert_eq!(reconstructor.blocks()[2].current_row(), 1);
        assert_eq!(reconstructor.finish().len(), 2);
    }

    #[test]
    fn test_skipped_row_closes_open_runs() {
        let mut reconstructor = PolygonReconstructor::new();
        reconstructor.push_row(0, &[Span::new(0, 10)]);
        reconstructor.push_row(5, &[Span::new(0, 10)]);
        assert_eq!(reconstructor.blocks().len(), 2);
    }

    #[test]
    fn test_simplify_drops_duplicates_and_collinear_points() {
        let raw = vec![
            Point::new(10, 0),
            Point::new(10, 5),
            Point::new(10, 10),
            Point::new(0, 10),
            Point::new(0, 10),
            Point::new(0, 0),
            Point::new(5, 0),
            Point::new(10, 0),
        ];
        let ring = simplify(raw);
        assert_eq!(
            ring,
            vec![Point::new(10, 0), Point::new(10, 10), Point::new(0, 10), Point::new(0, 0)]
        );
    }
}
