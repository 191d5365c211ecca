//! Joins per-cell segments into polylines.

use std::collections::{HashMap, VecDeque};

/// Identity of a crossing point on the doubled lattice.
///
/// Cell edges are addressed at half-pixel resolution, so two adjacent cells
/// produce the same key for the edge they share.
pub(super) type EdgeKey = (i32, i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Closed,
    Merged,
}

#[derive(Debug)]
struct Fragment {
    points: VecDeque<[f64; 2]>,
    start: EdgeKey,
    end: EdgeKey,
    state: State,
}

/// Fragment arena for a single contour level.
#[derive(Debug, Default)]
pub(super) struct Stitcher {
    fragments: Vec<Fragment>,
    by_start: HashMap<EdgeKey, usize>,
    by_end: HashMap<EdgeKey, usize>,
    closed: Vec<usize>,
}

impl Stitcher {
    /// Adds a directed segment `from → to`.
    pub(super) fn add_segment(&mut self, from: (EdgeKey, [f64; 2]), to: (EdgeKey, [f64; 2])) {
        let (from_key, from_point) = from;
        let (to_key, to_point) = to;

        let before = self.by_end.remove(&from_key);
        let after = self.by_start.remove(&to_key);

        match (before, after) {
            (Some(f), Some(g)) if f == g => {
                let frag = &mut self.fragments[f];
                frag.points.push_back(to_point);
                frag.state = State::Closed;
                self.closed.push(f);
            }
            (Some(f), Some(g)) => {
                let tail = std::mem::take(&mut self.fragments[g].points);
                let tail_end = self.fragments[g].end;
                self.fragments[g].state = State::Merged;

                let frag = &mut self.fragments[f];
                frag.points.extend(tail);
                frag.end = tail_end;
                self.by_end.insert(tail_end, f);
            }
            (Some(f), None) => {
                let frag = &mut self.fragments[f];
                frag.points.push_back(to_point);
                frag.end = to_key;
                self.by_end.insert(to_key, f);
            }
            (None, Some(g)) => {
                let frag = &mut self.fragments[g];
                frag.points.push_front(from_point);
                frag.start = from_key;
                self.by_start.insert(from_key, g);
            }
            (None, None) => {
                let index = self.fragments.len();
                self.fragments.push(Fragment {
                    points: VecDeque::from([from_point, to_point]),
                    start: from_key,
                    end: to_key,
                    state: State::Open,
                });
                self.by_start.insert(from_key, index);
                self.by_end.insert(to_key, index);
            }
        }
    }

    /// Closed rings in closing order, then open polylines in creation order.
    pub(super) fn finish(self) -> Vec<Vec<f64>> {
        let Stitcher {
            fragments, closed, ..
        } = self;
        let flatten = |frag: &Fragment| -> Vec<f64> {
            frag.points.iter().flat_map(|p| [p[0], p[1]]).collect()
        };

        let mut lines: Vec<Vec<f64>> = closed.iter().map(|&i| flatten(&fragments[i])).collect();
        lines.extend(
            fragments
                .iter()
                .filter(|frag| frag.state == State::Open)
                .map(flatten),
        );
        lines
    }
}
