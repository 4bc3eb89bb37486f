//! Contour tracing and polygon utilities
//!
//! [`trace_contours`] follows every outer border and hole border of a mask
//! (Suzuki-Abe border following) and records the full nesting tree: each
//! contour knows its parent, so holes and islands-in-holes survive. Runs of
//! points moving in the same chain direction are collapsed to their end
//! points.

use super::Mask;

/// Integer pixel coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Which side of a region a border belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContourKind {
    /// Boundary between a region and the background around it
    Outer,
    /// Boundary of a background hole inside a region
    Hole,
}

/// A traced border
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<Point>,
    pub kind: ContourKind,
    /// Index of the enclosing contour in the traced sequence
    pub parent: Option<usize>,
}

impl Contour {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Chain-code directions, clockwise starting east (y grows downward)
const DIRECTIONS: [(isize, isize); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];
const EAST: usize = 0;
const WEST: usize = 4;

fn direction_between(from: (usize, usize), to: (usize, usize)) -> usize {
    let dx = to.0 as isize - from.0 as isize;
    let dy = to.1 as isize - from.1 as isize;
    DIRECTIONS
        .iter()
        .position(|&d| d == (dx, dy))
        .unwrap_or(EAST)
}

#[inline]
fn step(pos: (usize, usize), dir: usize) -> (usize, usize) {
    let (dx, dy) = DIRECTIONS[dir];
    (
        (pos.0 as isize + dx) as usize,
        (pos.1 as isize + dy) as usize,
    )
}

/// Labelled working copy of the mask with a one-pixel background frame
struct LabelImage {
    stride: usize,
    labels: Vec<i32>,
}

impl LabelImage {
    fn from_mask(mask: &Mask) -> Self {
        let (width, height) = mask.dimensions();
        let stride = width + 2;
        let mut labels = vec![0i32; stride * (height + 2)];
        for (x, y, v) in mask.iter_coords() {
            if v {
                labels[(y + 1) * stride + x + 1] = 1;
            }
        }
        Self { stride, labels }
    }

    #[inline]
    fn at(&self, pos: (usize, usize)) -> i32 {
        self.labels[pos.1 * self.stride + pos.0]
    }

    #[inline]
    fn put(&mut self, pos: (usize, usize), value: i32) {
        self.labels[pos.1 * self.stride + pos.0] = value;
    }

    /// Follow one border starting at `start`, labelling it with `nbd`
    fn follow(&mut self, start: (usize, usize), from_dir: usize, nbd: i32) -> Vec<Point> {
        let first = (0..8)
            .map(|k| (from_dir + k) % 8)
            .find(|&d| self.at(step(start, d)) != 0);
        let Some(first_dir) = first else {
            self.put(start, -nbd);
            return vec![unpadded(start)];
        };

        let p1 = step(start, first_dir);
        let mut p2 = p1;
        let mut p3 = start;
        let mut points = Vec::new();

        loop {
            points.push(unpadded(p3));

            let back = direction_between(p3, p2);
            let mut east_is_zero = false;
            let mut p4 = p2;
            for k in 1..=8 {
                let d = (back + 8 - k) % 8;
                let q = step(p3, d);
                if self.at(q) != 0 {
                    p4 = q;
                    break;
                }
                if d == EAST {
                    east_is_zero = true;
                }
            }

            if east_is_zero {
                self.put(p3, -nbd);
            } else if self.at(p3) == 1 {
                self.put(p3, nbd);
            }

            if p4 == start && p3 == p1 {
                break;
            }
            p2 = p3;
            p3 = p4;
        }
        points
    }
}

#[inline]
fn unpadded(pos: (usize, usize)) -> Point {
    Point::new(pos.0 as i32 - 1, pos.1 as i32 - 1)
}

/// Trace every outer and hole border of `mask`, with parent links
///
/// Contours come out in raster-scan order of their starting pixel. Samples
/// outside the mask are treated as background.
pub fn trace_contours(mask: &Mask) -> Vec<Contour> {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let mut image = LabelImage::from_mask(mask);

    // Border 1 is the image frame, treated as a hole with no parent.
    let mut kinds = vec![ContourKind::Hole];
    let mut parents: Vec<Option<usize>> = vec![None];
    let mut contours = Vec::new();
    let mut nbd: i32 = 1;

    for y in 1..=height {
        let mut lnbd: i32 = 1;
        for x in 1..=width {
            let pos = (x, y);
            let value = image.at(pos);
            if value == 0 {
                continue;
            }

            let start = if value == 1 && image.at((x - 1, y)) == 0 {
                Some((ContourKind::Outer, WEST))
            } else if value >= 1 && image.at((x + 1, y)) == 0 {
                if value > 1 {
                    lnbd = value;
                }
                Some((ContourKind::Hole, EAST))
            } else {
                None
            };

            if let Some((kind, from_dir)) = start {
                nbd += 1;
                let previous = (lnbd - 1) as usize;
                let parent = if kinds[previous] == kind {
                    parents[previous]
                } else {
                    Some(lnbd as usize)
                };
                kinds.push(kind);
                parents.push(parent);

                let points = image.follow(pos, from_dir, nbd);
                contours.push(Contour {
                    points: compress_chain(points),
                    kind,
                    parent: parent.and_then(|id| id.checked_sub(2)),
                });
            }

            let value = image.at(pos);
            if value != 1 {
                lnbd = value.abs();
            }
        }
    }
    contours
}

/// Keep only points where the chain direction changes
fn compress_chain(points: Vec<Point>) -> Vec<Point> {
    let n = points.len();
    if n < 3 {
        return points;
    }
    let delta = |a: Point, b: Point| (b.x - a.x, b.y - a.y);
    let kept: Vec<Point> = (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            delta(prev, points[i]) != delta(points[i], next)
        })
        .map(|i| points[i])
        .collect();
    if kept.is_empty() {
        points
    } else {
        kept
    }
}

/// Enclosed area magnitude of a closed polygon (shoelace formula)
pub fn contour_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let n = points.len();
    let twice: i64 = (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
        })
        .sum();
    (twice as f64 / 2.0).abs()
}

/// Total length of a polyline, including the closing edge when `closed`
pub fn arc_length(points: &[Point], closed: bool) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let dist = |a: Point, b: Point| {
        let dx = (b.x - a.x) as f64;
        let dy = (b.y - a.y) as f64;
        (dx * dx + dy * dy).sqrt()
    };
    let open: f64 = points.windows(2).map(|w| dist(w[0], w[1])).sum();
    if closed {
        open + dist(points[points.len() - 1], points[0])
    } else {
        open
    }
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let (px, py) = (p.x as f64, p.y as f64);
    let (ax, ay) = (a.x as f64, a.y as f64);
    let (bx, by) = (b.x as f64, b.y as f64);
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return ((px - ax).powi(2) + (py - ay).powi(2)).sqrt();
    }
    ((px - ax) * dy - (py - ay) * dx).abs() / len_sq.sqrt()
}

/// Douglas-Peucker simplification of a closed contour
///
/// The tolerance is `epsilon_factor` times the closed perimeter. The ring is
/// split at the start point and the vertex farthest from it, and each half
/// is simplified independently.
pub fn simplify_polygon(contour: &Contour, epsilon_factor: f64) -> Contour {
    let points = &contour.points;
    let n = points.len();
    if n < 3 {
        return contour.clone();
    }
    let epsilon = epsilon_factor * arc_length(points, true);

    let far = (1..n)
        .max_by(|&i, &j| {
            let di = squared_distance(points[0], points[i]);
            let dj = squared_distance(points[0], points[j]);
            di.cmp(&dj)
        })
        .unwrap_or(n / 2);

    // Ring view: index n is the start point again.
    let ring = |i: usize| points[i % n];
    let mut keep = vec![false; n + 1];
    keep[0] = true;
    keep[far] = true;
    keep[n] = true;

    let mut stack = vec![(0usize, far), (far, n)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }
        let (a, b) = (ring(start), ring(end));
        let (index, max_dist) = (start + 1..end)
            .map(|i| (i, distance_to_segment(ring(i), a, b)))
            .fold((start, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });
        if max_dist > epsilon {
            keep[index] = true;
            stack.push((start, index));
            stack.push((index, end));
        }
    }

    Contour {
        points: (0..n).filter(|&i| keep[i]).map(|i| points[i]).collect(),
        kind: contour.kind,
        parent: contour.parent,
    }
}

fn squared_distance(a: Point, b: Point) -> i64 {
    let dx = (b.x - a.x) as i64;
    let dy = (b.y - a.y) as i64;
    dx * dx + dy * dy
}
