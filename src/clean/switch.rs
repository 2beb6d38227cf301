//! Orientation switching
//!
//! The orthogonal grid is rebuilt from line-to-line differences: material
//! present on line `i - 1` but not on line `i` ends at `i`, material present
//! on line `i + 1` but not on line `i` starts at `i`. Every cell of such a
//! difference receives one crossing on its orthogonal line.

use super::scanline::{spans_of, ScanlineStore};
use super::types::{EdgeCoord, Span};

/// Cells of `l1` not covered by `l2`.
///
/// Both lists hold sorted, disjoint, inclusive cell ranges.
pub fn listdif(l1: &[Span], l2: &[Span]) -> Vec<Span> {
    let mut out = Vec::new();
    let mut j = 0;

    for span in l1 {
        let (mut b, e) = (span.enter, span.exit);
        let mut keep = true;

        while let Some(cover) = l2.get(j) {
            if cover.exit < b {
                j += 1;
                continue;
            }
            if cover.enter > e {
                break;
            }
            if cover.enter > b {
                out.push(Span::new(b, cover.enter - 1));
            }
            if cover.exit >= e {
                // `cover` may reach into the next span too
                keep = false;
                break;
            }
            b = cover.exit + 1;
            j += 1;
        }

        if keep && b <= e {
            out.push(Span::new(b, e));
        }
    }

    out
}

/// Rebuild the inactive grid from the active one and make it active
pub fn switch_dimensions(store: &mut ScanlineStore) {
    let (source, target) = store.grids_mut();
    target.clear();

    let cells: Vec<Vec<Span>> = source
        .lines()
        .iter()
        .map(|line| {
            spans_of(line)
                .map(|s| Span::new(s.enter + 1, s.exit - 1))
                .collect()
        })
        .collect();

    // One step past each end so material on the outermost lines is closed
    for cur in -1..=cells.len() as i64 {
        let here = cells_at(&cells, cur);
        let pos = cur as i32;
        for cell in listdif(cells_at(&cells, cur - 1), here) {
            for b in cell.enter..=cell.exit {
                let pushed = target.push(b, EdgeCoord::exit(pos));
                debug_assert!(pushed, "crossing at line {b} outside the target grid");
            }
        }
        for cell in listdif(cells_at(&cells, cur + 1), here) {
            for b in cell.enter..=cell.exit {
                let pushed = target.push(b, EdgeCoord::enter(pos));
                debug_assert!(pushed, "crossing at line {b} outside the target grid");
            }
        }
    }

    let flipped = store.orientation().flipped();
    store.set_orientation(flipped);
}

/// Cell ranges of a line, empty past either end of the grid
fn cells_at(cells: &[Vec<Span>], index: i64) -> &[Span] {
    usize::try_from(index)
        .ok()
        .and_then(|i| cells.get(i))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clean::types::Orientation;

    fn spans(pairs: &[(i32, i32)]) -> Vec<Span> {
        pairs.iter().map(|&(a, b)| Span::new(a, b)).collect()
    }

    #[test]
    fn test_listdif_partial_cover() {
        let out = listdif(
            &spans(&[(1, 5), (7, 10), (18, 20)]),
            &spans(&[(4, 11), (15, 16)]),
        );
        assert_eq!(out, spans(&[(1, 3), (18, 20)]));
    }

    #[test]
    fn test_listdif_hole_in_middle() {
        let out = listdif(&spans(&[(0, 20)]), &spans(&[(5, 8), (12, 14)]));
        assert_eq!(out, spans(&[(0, 4), (9, 11), (15, 20)]));
    }

    #[test]
    fn test_listdif_against_empty() {
        let l1 = spans(&[(3, 4), (9, 9)]);
        assert_eq!(listdif(&l1, &[]), l1);
        assert!(listdif(&[], &l1).is_empty());
    }

    #[test]
    fn test_box_in_column_view() {
        let mut sl = ScanlineStore::from_extent(0, 100, 0, 100, 10, 10).unwrap();
        sl.add_box(10, 20, 30, 40).unwrap();
        sl.sortlist();
        switch_dimensions(&mut sl);
        assert_eq!(sl.orientation(), Orientation::Column);
        assert_eq!(sl.get_vect(10).unwrap(), vec![20, 39]);
        assert_eq!(sl.get_vect(30).unwrap(), vec![20, 39]);
        assert!(sl.get_vect(9).unwrap().is_empty());
        assert!(sl.get_vect(31).unwrap().is_empty());
    }

    #[test]
    fn test_round_trip_is_exact() {
        let mut sl = ScanlineStore::from_extent(0, 100, 0, 100, 10, 10).unwrap();
        sl.add_box(10, 20, 30, 40).unwrap();
        sl.add_box(25, 35, 80, 70).unwrap();
        sl.add_box(50, 0, 60, 15).unwrap();
        sl.add_box(0, 90, 100, 100).unwrap();
        sl.sortlist();
        let before = sl.get_lines();

        switch_dimensions(&mut sl);
        switch_dimensions(&mut sl);

        assert_eq!(sl.orientation(), Orientation::Row);
        assert_eq!(sl.get_lines(), before);
    }

    #[test]
    fn test_switch_keeps_lines_alternating() {
        let mut sl = ScanlineStore::from_extent(0, 50, 0, 50, 4, 4).unwrap();
        // U shape: two prongs joined at the bottom
        sl.add_box(0, 0, 30, 5).unwrap();
        sl.add_box(0, 5, 5, 30).unwrap();
        sl.add_box(25, 5, 30, 30).unwrap();
        sl.sortlist();
        switch_dimensions(&mut sl);
        for line in sl.active().lines() {
            assert_eq!(line.len() % 2, 0);
            for pair in line.chunks_exact(2) {
                assert!(pair[0].pos < pair[1].pos);
            }
        }
        assert_eq!(sl.get_vect(2).unwrap(), vec![0, 29]);
    }
}
