//! k-d tree over unit vectors on the celestial sphere.
//!
//! Nodes live in a flat array; leaves index a contiguous range of the
//! reordered point list. Distances are squared chords, which order points
//! the same way as great-circle separation.

use crate::sphere::chord_sq;

const LEAF_SIZE: usize = 16;

/// A point found by a search: its caller-supplied index and squared chord
/// distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour {
    pub index: usize,
    pub chord_sq: f64,
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        axis: usize,
        value: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        start: usize,
        end: usize,
    },
}

#[derive(Debug, Clone)]
pub struct SkyTree {
    nodes: Vec<Node>,
    points: Vec<[f64; 3]>,
    indices: Vec<usize>,
}

impl SkyTree {
    /// Build from `(index, unit_vector)` pairs. Indices are reported back by
    /// searches and need not be contiguous.
    pub fn build(entries: Vec<(usize, [f64; 3])>) -> Self {
        let mut order = entries;
        let mut nodes = Vec::new();
        if !order.is_empty() {
            let n = order.len();
            build_node(&mut nodes, &mut order, 0, n);
        }
        let (indices, points) = order.into_iter().unzip();
        Self {
            nodes,
            points,
            indices,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Nearest point to `query`. Among points at exactly the same distance
    /// the lowest index is returned.
    pub fn nearest(&self, query: &[f64; 3]) -> Option<Neighbour> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut best = Neighbour {
            index: usize::MAX,
            chord_sq: f64::INFINITY,
        };
        self.nearest_from(0, query, &mut best);
        (best.index != usize::MAX).then_some(best)
    }

    fn nearest_from(&self, node: usize, query: &[f64; 3], best: &mut Neighbour) {
        match self.nodes[node] {
            Node::Leaf { start, end } => {
                for i in start..end {
                    let d = chord_sq(query, &self.points[i]);
                    let index = self.indices[i];
                    if d < best.chord_sq || (d == best.chord_sq && index < best.index) {
                        *best = Neighbour { index, chord_sq: d };
                    }
                }
            }
            Node::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = query[axis] - value;
                let (near, far) = if diff <= 0.0 {
                    (left, right)
                } else {
                    (right, left)
                };
                self.nearest_from(near, query, best);
                // Equality still descends: an equidistant point with a lower
                // index may sit on the far side.
                if diff * diff <= best.chord_sq {
                    self.nearest_from(far, query, best);
                }
            }
        }
    }

    /// Every point within squared chord `radius_sq` of `query`, in no
    /// particular order.
    pub fn within(&self, query: &[f64; 3], radius_sq: f64) -> Vec<Neighbour> {
        let mut found = Vec::new();
        if !self.nodes.is_empty() {
            self.within_from(0, query, radius_sq, &mut found);
        }
        found
    }

    fn within_from(&self, node: usize, query: &[f64; 3], radius_sq: f64, found: &mut Vec<Neighbour>) {
        match self.nodes[node] {
            Node::Leaf { start, end } => {
                for i in start..end {
                    let d = chord_sq(query, &self.points[i]);
                    if d <= radius_sq {
                        found.push(Neighbour {
                            index: self.indices[i],
                            chord_sq: d,
                        });
                    }
                }
            }
            Node::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = query[axis] - value;
                let (near, far) = if diff <= 0.0 {
                    (left, right)
                } else {
                    (right, left)
                };
                self.within_from(near, query, radius_sq, found);
                if diff * diff <= radius_sq {
                    self.within_from(far, query, radius_sq, found);
                }
            }
        }
    }
}

fn build_node(
    nodes: &mut Vec<Node>,
    order: &mut [(usize, [f64; 3])],
    start: usize,
    end: usize,
) -> usize {
    if end - start <= LEAF_SIZE {
        nodes.push(Node::Leaf { start, end });
        return nodes.len() - 1;
    }

    let axis = widest_axis(&order[start..end]);
    let mid = (end - start) / 2;
    order[start..end].select_nth_unstable_by(mid, |a, b| a.1[axis].total_cmp(&b.1[axis]));
    let value = order[start + mid].1[axis];

    let slot = nodes.len();
    nodes.push(Node::Leaf { start: 0, end: 0 });
    let left = build_node(nodes, order, start, start + mid);
    let right = build_node(nodes, order, start + mid, end);
    nodes[slot] = Node::Split {
        axis,
        value,
        left,
        right,
    };
    slot
}

fn widest_axis(points: &[(usize, [f64; 3])]) -> usize {
    let mut lo = [f64::INFINITY; 3];
    let mut hi = [f64::NEG_INFINITY; 3];
    for (_, p) in points {
        for axis in 0..3 {
            lo[axis] = lo[axis].min(p[axis]);
            hi[axis] = hi[axis].max(p[axis]);
        }
    }
    (0..3)
        .max_by(|&a, &b| (hi[a] - lo[a]).total_cmp(&(hi[b] - lo[b])))
        .unwrap_or(0)
}
