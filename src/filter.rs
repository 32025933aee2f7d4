//! # Region Filter
//!
//! Compiles image-coordinate shapes into a tree of containment tests and
//! rasterizes it into a [`Mask`].

use log::{debug, warn};
use std::ops::{BitAnd, BitOr, Not};

use crate::shape::{MaskRole, Shape, ShapeKind};

/// Primitive containment tests, all axis-aligned about their centre.
/// Rotation is applied by [`RegionFilter::Rotated`].
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Circle { xc: f64, yc: f64, r: f64 },
    /// Semi-axes `a` along x and `b` along y.
    Ellipse { xc: f64, yc: f64, a: f64, b: f64 },
    /// Full widths.
    Box { xc: f64, yc: f64, width: f64, height: f64 },
    /// Even-odd rule.
    Polygon { vertices: Vec<(f64, f64)> },
    /// Counter-clockwise from +x, `start` to `stop` degrees.
    AngleRange { xc: f64, yc: f64, start: f64, stop: f64 },
    /// Angle range measured after scaling the offset by `1/a`, `1/b`, so the
    /// angles follow an ellipse or box of that aspect.
    ScaledAngleRange { xc: f64, yc: f64, start: f64, stop: f64, a: f64, b: f64 },
}

fn angle_in_range(theta: f64, start: f64, stop: f64) -> bool {
    if stop - start >= 360.0 {
        return true;
    }
    let span = (stop - start).rem_euclid(360.0);
    (theta - start).rem_euclid(360.0) <= span
}

fn polygon_contains(vertices: &[(f64, f64)], x: f64, y: f64) -> bool {
    let mut inside = false;
    let mut j = vertices.len().wrapping_sub(1);
    for (i, &(xi, yi)) in vertices.iter().enumerate() {
        let (xj, yj) = vertices[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

impl Geometry {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self {
            Geometry::Circle { xc, yc, r } => {
                let (dx, dy) = (x - xc, y - yc);
                dx * dx + dy * dy <= r * r
            }
            Geometry::Ellipse { xc, yc, a, b } => {
                let (u, v) = ((x - xc) / a, (y - yc) / b);
                u * u + v * v <= 1.0
            }
            Geometry::Box { xc, yc, width, height } => {
                (x - xc).abs() <= width / 2.0 && (y - yc).abs() <= height / 2.0
            }
            Geometry::Polygon { vertices } => polygon_contains(vertices, x, y),
            Geometry::AngleRange { xc, yc, start, stop } => {
                let theta = (y - yc).atan2(x - xc).to_degrees();
                angle_in_range(theta, *start, *stop)
            }
            Geometry::ScaledAngleRange { xc, yc, start, stop, a, b } => {
                let theta = ((y - yc) / b).atan2((x - xc) / a).to_degrees();
                angle_in_range(theta, *start, *stop)
            }
        }
    }
}

/// Boolean combination of containment tests.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionFilter {
    Leaf(Geometry),
    /// `filter` rotated counter-clockwise by `angle` degrees about `(xc, yc)`.
    Rotated { filter: Box<RegionFilter>, angle: f64, xc: f64, yc: f64 },
    And(Box<RegionFilter>, Box<RegionFilter>),
    /// Empty `Or` contains nothing.
    Or(Vec<RegionFilter>),
    Not(Box<RegionFilter>),
}

impl RegionFilter {
    pub fn empty() -> Self {
        RegionFilter::Or(Vec::new())
    }

    pub fn rotated(self, angle: f64, xc: f64, yc: f64) -> Self {
        if angle == 0.0 {
            return self;
        }
        RegionFilter::Rotated {
            filter: Box::new(self),
            angle,
            xc,
            yc,
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self {
            RegionFilter::Leaf(geometry) => geometry.contains(x, y),
            RegionFilter::Rotated { filter, angle, xc, yc } => {
                let (sin_a, cos_a) = angle.to_radians().sin_cos();
                let (dx, dy) = (x - xc, y - yc);
                let u = dx * cos_a + dy * sin_a;
                let v = -dx * sin_a + dy * cos_a;
                filter.contains(xc + u, yc + v)
            }
            RegionFilter::And(lhs, rhs) => lhs.contains(x, y) && rhs.contains(x, y),
            RegionFilter::Or(filters) => filters.iter().any(|f| f.contains(x, y)),
            RegionFilter::Not(filter) => !filter.contains(x, y),
        }
    }

    /// Rasterizes over a `(ny, nx)` grid; pixel `(j, i)` is tested at `(i, j)`.
    pub fn mask(&self, shape: (usize, usize)) -> Mask {
        let (ny, nx) = shape;
        let mut data = Vec::with_capacity(ny * nx);
        for j in 0..ny {
            for i in 0..nx {
                data.push(self.contains(i as f64, j as f64));
            }
        }
        Mask { ny, nx, data }
    }
}

impl From<Geometry> for RegionFilter {
    fn from(geometry: Geometry) -> Self {
        RegionFilter::Leaf(geometry)
    }
}

impl BitAnd for RegionFilter {
    type Output = RegionFilter;

    fn bitand(self, rhs: RegionFilter) -> RegionFilter {
        RegionFilter::And(Box::new(self), Box::new(rhs))
    }
}

impl BitOr for RegionFilter {
    type Output = RegionFilter;

    fn bitor(self, rhs: RegionFilter) -> RegionFilter {
        match (self, rhs) {
            (RegionFilter::Or(mut lhs), RegionFilter::Or(rhs)) => {
                lhs.extend(rhs);
                RegionFilter::Or(lhs)
            }
            (RegionFilter::Or(mut lhs), rhs) => {
                lhs.push(rhs);
                RegionFilter::Or(lhs)
            }
            (lhs, rhs) => RegionFilter::Or(vec![lhs, rhs]),
        }
    }
}

impl Not for RegionFilter {
    type Output = RegionFilter;

    fn not(self) -> RegionFilter {
        RegionFilter::Not(Box::new(self))
    }
}

/// Row-major boolean grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    ny: usize,
    nx: usize,
    data: Vec<bool>,
}

impl Mask {
    pub fn new(ny: usize, nx: usize) -> Self {
        Mask {
            ny,
            nx,
            data: vec![false; ny * nx],
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.ny, self.nx)
    }

    pub fn get(&self, j: usize, i: usize) -> Option<bool> {
        if j < self.ny && i < self.nx {
            Some(self.data[j * self.nx + i])
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.data
    }

    /// `ny` rows of `nx` pixels each; rows are empty when `nx` is zero.
    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        (0..self.ny).map(move |j| &self.data[j * self.nx..(j + 1) * self.nx])
    }

    /// Number of `true` pixels.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    fn zip_with(&self, other: &Mask, op: impl Fn(bool, bool) -> bool) -> Mask {
        assert_eq!(self.shape(), other.shape(), "mask shapes differ");
        Mask {
            ny: self.ny,
            nx: self.nx,
            data: self.data.iter().zip(&other.data).map(|(&a, &b)| op(a, b)).collect(),
        }
    }
}

/// # Panics
///
/// Panics if the two masks differ in shape.
impl BitAnd for &Mask {
    type Output = Mask;

    fn bitand(self, rhs: &Mask) -> Mask {
        self.zip_with(rhs, |a, b| a && b)
    }
}

/// # Panics
///
/// Panics if the two masks differ in shape.
impl BitOr for &Mask {
    type Output = Mask;

    fn bitor(self, rhs: &Mask) -> Mask {
        self.zip_with(rhs, |a, b| a || b)
    }
}

impl Not for &Mask {
    type Output = Mask;

    fn not(self) -> Mask {
        Mask {
            ny: self.ny,
            nx: self.nx,
            data: self.data.iter().map(|v| !v).collect(),
        }
    }
}

// --- Shape compilation ---

/// `outer AND NOT inner`; a zero inner bound excludes nothing.
fn ring(outer: Geometry, inner: Geometry, inner_bound: f64) -> RegionFilter {
    if inner_bound <= 0.0 {
        RegionFilter::Leaf(outer)
    } else {
        RegionFilter::Leaf(outer) & !RegionFilter::Leaf(inner)
    }
}

/// Consecutive size steps, e.g. annulus radii, as OR-ed rings.
fn rings<T: Copy>(steps: &[T], make: impl Fn(T) -> Geometry, bound: impl Fn(T) -> f64) -> RegionFilter {
    if steps.len() == 1 {
        return RegionFilter::Leaf(make(steps[0]));
    }
    let mut sorted = steps.to_vec();
    sorted.sort_by(|a, b| bound(*a).total_cmp(&bound(*b)));
    sorted
        .windows(2)
        .map(|pair| ring(make(pair[1]), make(pair[0]), bound(pair[0])))
        .fold(RegionFilter::empty(), |acc, f| acc | f)
}

fn pairs(values: &[f64]) -> Vec<(f64, f64)> {
    values.chunks_exact(2).map(|c| (c[0], c[1])).collect()
}

/// Containment test of one image-coordinate shape, or `None` for shapes
/// without area.
pub fn shape_to_filter(shape: &Shape, origin: f64) -> Option<RegionFilter> {
    let c = shape.coord_list();
    let roles_fit = shape.roles().is_some();
    if !roles_fit {
        warn!("{} has {} coordinates; skipped", shape.name(), c.len());
        return None;
    }
    match shape.kind().mask_role() {
        MaskRole::Grouping => {
            debug!("{} contributes no pixels", shape.name());
            return None;
        }
        MaskRole::ZeroArea => {
            warn!("{} has no area and does not contribute to the mask", shape.name());
            return None;
        }
        MaskRole::Area => {}
    }

    let n = c.len();
    let (xc, yc) = (c[0] - origin, c[1] - origin);
    let filter = match shape.kind() {
        ShapeKind::Circle => RegionFilter::Leaf(Geometry::Circle { xc, yc, r: c[2] }),
        ShapeKind::Annulus => rings(&c[2..], |r| Geometry::Circle { xc, yc, r }, |r| r),
        ShapeKind::Ellipse => rings(
            &pairs(&c[2..n - 1]),
            |(a, b)| Geometry::Ellipse { xc, yc, a, b },
            |(a, _)| a,
        )
        .rotated(c[n - 1], xc, yc),
        ShapeKind::Box | ShapeKind::RotBox => rings(
            &pairs(&c[2..n - 1]),
            |(width, height)| Geometry::Box { xc, yc, width, height },
            |(width, _)| width,
        )
        .rotated(c[n - 1], xc, yc),
        ShapeKind::Polygon => {
            let vertices = pairs(c).into_iter().map(|(x, y)| (x - origin, y - origin)).collect();
            RegionFilter::Leaf(Geometry::Polygon { vertices })
        }
        ShapeKind::Pie => {
            ring(Geometry::Circle { xc, yc, r: c[3] }, Geometry::Circle { xc, yc, r: c[2] }, c[2])
                & RegionFilter::Leaf(Geometry::AngleRange { xc, yc, start: c[4], stop: c[5] })
        }
        ShapeKind::Panda => {
            ring(Geometry::Circle { xc, yc, r: c[6] }, Geometry::Circle { xc, yc, r: c[5] }, c[5])
                & RegionFilter::Leaf(Geometry::AngleRange { xc, yc, start: c[2], stop: c[3] })
        }
        ShapeKind::Epanda | ShapeKind::Bpanda => {
            let (ia, ib, oa, ob) = (c[5], c[6], c[7], c[8]);
            let (outer, inner) = if shape.kind() == ShapeKind::Epanda {
                (Geometry::Ellipse { xc, yc, a: oa, b: ob }, Geometry::Ellipse { xc, yc, a: ia, b: ib })
            } else {
                (
                    Geometry::Box { xc, yc, width: oa, height: ob },
                    Geometry::Box { xc, yc, width: ia, height: ib },
                )
            };
            let wedge = Geometry::ScaledAngleRange { xc, yc, start: c[2], stop: c[3], a: oa, b: ob };
            (ring(outer, inner, ia) & RegionFilter::Leaf(wedge)).rotated(c[10], xc, yc)
        }
        _ => return None,
    };
    Some(filter)
}

/// Combines shapes in order: included shapes are OR-ed on, an excluded
/// shape turns the result so far into `result AND NOT shape`.
pub fn compile(shapes: &[Shape], origin: f64) -> RegionFilter {
    let mut filter = RegionFilter::empty();
    for shape in shapes {
        let Some(f) = shape_to_filter(shape, origin) else {
            continue;
        };
        filter = if shape.exclude() { filter & !f } else { filter | f };
    }
    filter
}
