//! Shape vocabulary of the region language and the parsed [`Shape`] value.
//!
//! Every [`ShapeKind`] owns a static [`ShapeSignature`]: the semantic role of
//! each argument, with an optional repeating unit for variable-arity shapes.
//! The grammar, the coordinate converter, the filter compiler and the
//! serializer all read argument roles from this one table.

use std::fmt::{self, Write as _};

use crate::attr_parser::ShapeAttributes;
use crate::frames::CoordFrame;
use crate::semantic_parsers::NumericLiteral;

// --- Semantic Type Definitions ---

/// Role of one shape argument.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SemanticCoordType {
    /// Longitude-like position (x, RA, l).
    CoordOdd,
    /// Latitude-like position (y, Dec, b).
    CoordEven,
    Distance,
    Angle,
    /// Passed through every conversion unchanged (panda subdivision counts).
    Integer,
}

/// How a shape takes part in mask rasterization.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MaskRole {
    Area,
    ZeroArea,
    /// Groups other shapes; contributes nothing by itself.
    Grouping,
}

/// Argument layout: `fixed_head`, then `repeat_unit` between `min_repeats`
/// and `max_repeats` times, then `fixed_tail`.
#[derive(Debug, Clone)]
pub struct ShapeSignature {
    pub name: &'static str,
    pub fixed_head: &'static [SemanticCoordType],
    pub repeat_unit: Option<&'static [SemanticCoordType]>,
    pub min_repeats: usize,
    pub max_repeats: Option<usize>,
    pub fixed_tail: &'static [SemanticCoordType],
    /// Accepted as a statement on a region line.
    pub in_region_line: bool,
    /// Accepted as a shape embedded in a comment (`# text(...)`).
    pub in_comment: bool,
    pub mask_role: MaskRole,
}

impl ShapeSignature {
    /// The argument roles for a shape with `n` arguments, or `None` when `n`
    /// does not fit the layout.
    pub fn expand_roles(&self, n: usize) -> Option<Vec<SemanticCoordType>> {
        let fixed = self.fixed_head.len() + self.fixed_tail.len();
        let middle = n.checked_sub(fixed)?;
        let repeats = match self.repeat_unit {
            None if middle == 0 => 0,
            None => return None,
            Some(unit) => {
                if unit.is_empty() || middle % unit.len() != 0 {
                    return None;
                }
                let repeats = middle / unit.len();
                if repeats < self.min_repeats || self.max_repeats.map_or(false, |max| repeats > max) {
                    return None;
                }
                repeats
            }
        };
        let mut roles = Vec::with_capacity(n);
        roles.extend_from_slice(self.fixed_head);
        if let Some(unit) = self.repeat_unit {
            for _ in 0..repeats {
                roles.extend_from_slice(unit);
            }
        }
        roles.extend_from_slice(self.fixed_tail);
        Some(roles)
    }

    /// The half-open index range `[n1, n2)` of the repeating unit in the
    /// unexpanded argument list.
    pub fn repeat_range(&self) -> Option<(usize, usize)> {
        self.repeat_unit.map(|unit| {
            let start = self.fixed_head.len();
            (start, start + unit.len())
        })
    }
}

// --- Shape Definition Logic ---
macro_rules! sct_slice { ($($x:expr),* $(,)?) => { &[$($x),*] } }
use SemanticCoordType::*;

macro_rules! signature {
    ($name:expr, head: $head:expr, region: $region:expr, comment: $comment:expr, role: $role:expr) => {
        ShapeSignature { name: $name, fixed_head: $head, repeat_unit: None, min_repeats: 0, max_repeats: None, fixed_tail: sct_slice![], in_region_line: $region, in_comment: $comment, mask_role: $role }
    };
    ($name:expr, head: $head:expr, repeat: $unit:expr, min: $min:expr, tail: $tail:expr, region: $region:expr, comment: $comment:expr, role: $role:expr) => {
        ShapeSignature { name: $name, fixed_head: $head, repeat_unit: Some($unit), min_repeats: $min, max_repeats: None, fixed_tail: $tail, in_region_line: $region, in_comment: $comment, mask_role: $role }
    };
}

static CIRCLE_SIG: ShapeSignature = signature!("circle", head: sct_slice![CoordOdd, CoordEven, Distance], region: true, comment: false, role: MaskRole::Area);
static BOX_SIG: ShapeSignature = signature!("box", head: sct_slice![CoordOdd, CoordEven], repeat: sct_slice![Distance, Distance], min: 1, tail: sct_slice![Angle], region: true, comment: false, role: MaskRole::Area);
static ROTBOX_SIG: ShapeSignature = signature!("rotbox", head: sct_slice![CoordOdd, CoordEven], repeat: sct_slice![Distance, Distance], min: 1, tail: sct_slice![Angle], region: true, comment: false, role: MaskRole::Area);
static POLYGON_SIG: ShapeSignature = signature!("polygon", head: sct_slice![], repeat: sct_slice![CoordOdd, CoordEven], min: 3, tail: sct_slice![], region: true, comment: false, role: MaskRole::Area);
static ELLIPSE_SIG: ShapeSignature = signature!("ellipse", head: sct_slice![CoordOdd, CoordEven], repeat: sct_slice![Distance, Distance], min: 1, tail: sct_slice![Angle], region: true, comment: false, role: MaskRole::Area);
static ANNULUS_SIG: ShapeSignature = signature!("annulus", head: sct_slice![CoordOdd, CoordEven], repeat: sct_slice![Distance], min: 2, tail: sct_slice![], region: true, comment: false, role: MaskRole::Area);
static PANDA_SIG: ShapeSignature = signature!("panda", head: sct_slice![CoordOdd, CoordEven, Angle, Angle, Integer, Distance, Distance, Integer], region: true, comment: false, role: MaskRole::Area);
static PIE_SIG: ShapeSignature = signature!("pie", head: sct_slice![CoordOdd, CoordEven, Distance, Distance, Angle, Angle], region: true, comment: false, role: MaskRole::Area);
static EPANDA_SIG: ShapeSignature = signature!("epanda", head: sct_slice![CoordOdd, CoordEven, Angle, Angle, Integer, Distance, Distance, Distance, Distance, Integer, Angle], region: true, comment: false, role: MaskRole::Area);
static BPANDA_SIG: ShapeSignature = signature!("bpanda", head: sct_slice![CoordOdd, CoordEven, Angle, Angle, Integer, Distance, Distance, Distance, Distance, Integer, Angle], region: true, comment: false, role: MaskRole::Area);
static POINT_SIG: ShapeSignature = signature!("point", head: sct_slice![CoordOdd, CoordEven], region: true, comment: false, role: MaskRole::ZeroArea);
static LINE_SIG: ShapeSignature = signature!("line", head: sct_slice![CoordOdd, CoordEven, CoordOdd, CoordEven], region: true, comment: false, role: MaskRole::ZeroArea);
static VECTOR_SIG: ShapeSignature = signature!("vector", head: sct_slice![CoordOdd, CoordEven, Distance, Angle], region: true, comment: true, role: MaskRole::ZeroArea);
static TEXT_SIG: ShapeSignature = signature!("text", head: sct_slice![CoordOdd, CoordEven], region: true, comment: true, role: MaskRole::ZeroArea);
static SEGMENT_SIG: ShapeSignature = signature!("segment", head: sct_slice![], repeat: sct_slice![CoordOdd, CoordEven], min: 1, tail: sct_slice![], region: false, comment: true, role: MaskRole::ZeroArea);
static COMPOSITE_SIG: ShapeSignature = signature!("composite", head: sct_slice![CoordOdd, CoordEven, Angle], region: false, comment: true, role: MaskRole::Grouping);
static RULER_SIG: ShapeSignature = signature!("ruler", head: sct_slice![CoordOdd, CoordEven, CoordOdd, CoordEven], region: false, comment: true, role: MaskRole::ZeroArea);
static COMPASS_SIG: ShapeSignature = signature!("compass", head: sct_slice![CoordOdd, CoordEven, Distance], region: false, comment: true, role: MaskRole::ZeroArea);
static PROJECTION_SIG: ShapeSignature = signature!("projection", head: sct_slice![CoordOdd, CoordEven, CoordOdd, CoordEven, Distance], region: false, comment: true, role: MaskRole::ZeroArea);

/// Closed set of shapes the region language knows.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ShapeKind {
    Circle,
    Box,
    RotBox,
    Polygon,
    Ellipse,
    Annulus,
    Panda,
    Pie,
    Epanda,
    Bpanda,
    Point,
    Line,
    Vector,
    Text,
    Segment,
    Composite,
    Ruler,
    Compass,
    Projection,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 19] = [
        ShapeKind::Circle,
        ShapeKind::Box,
        ShapeKind::RotBox,
        ShapeKind::Polygon,
        ShapeKind::Ellipse,
        ShapeKind::Annulus,
        ShapeKind::Panda,
        ShapeKind::Pie,
        ShapeKind::Epanda,
        ShapeKind::Bpanda,
        ShapeKind::Point,
        ShapeKind::Line,
        ShapeKind::Vector,
        ShapeKind::Text,
        ShapeKind::Segment,
        ShapeKind::Composite,
        ShapeKind::Ruler,
        ShapeKind::Compass,
        ShapeKind::Projection,
    ];

    /// Looks a shape up by name, case-insensitively.
    pub fn from_name(name: &str) -> Option<ShapeKind> {
        ShapeKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }

    pub fn signature(&self) -> &'static ShapeSignature {
        match self {
            ShapeKind::Circle => &CIRCLE_SIG,
            ShapeKind::Box => &BOX_SIG,
            ShapeKind::RotBox => &ROTBOX_SIG,
            ShapeKind::Polygon => &POLYGON_SIG,
            ShapeKind::Ellipse => &ELLIPSE_SIG,
            ShapeKind::Annulus => &ANNULUS_SIG,
            ShapeKind::Panda => &PANDA_SIG,
            ShapeKind::Pie => &PIE_SIG,
            ShapeKind::Epanda => &EPANDA_SIG,
            ShapeKind::Bpanda => &BPANDA_SIG,
            ShapeKind::Point => &POINT_SIG,
            ShapeKind::Line => &LINE_SIG,
            ShapeKind::Vector => &VECTOR_SIG,
            ShapeKind::Text => &TEXT_SIG,
            ShapeKind::Segment => &SEGMENT_SIG,
            ShapeKind::Composite => &COMPOSITE_SIG,
            ShapeKind::Ruler => &RULER_SIG,
            ShapeKind::Compass => &COMPASS_SIG,
            ShapeKind::Projection => &PROJECTION_SIG,
        }
    }

    pub fn name(&self) -> &'static str {
        self.signature().name
    }

    pub fn mask_role(&self) -> MaskRole {
        self.signature().mask_role
    }

    /// Shapes that can only appear embedded in a comment.
    pub fn is_comment_only(&self) -> bool {
        let signature = self.signature();
        signature.in_comment && !signature.in_region_line
    }

    pub fn expand_roles(&self, n: usize) -> Option<Vec<SemanticCoordType>> {
        self.signature().expand_roles(n)
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// --- Shape ---

/// One parsed region.
///
/// `params` keeps the literals as written. `coord_list` holds the numeric
/// values in `coord_format`; conversions replace both through
/// [`Shape::with_coordinates`] and never touch `params`.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    kind: ShapeKind,
    params: Vec<NumericLiteral>,
    coord_list: Vec<f64>,
    coord_format: CoordFrame,
    attr: ShapeAttributes,
    exclude: bool,
    comment: Option<String>,
    continued: bool,
}

impl Shape {
    /// A shape whose coordinates are the literal values, in image coordinates
    /// until classified.
    pub fn new(kind: ShapeKind, params: Vec<NumericLiteral>) -> Self {
        let coord_list = params.iter().map(NumericLiteral::degrees).collect();
        Shape {
            kind,
            params,
            coord_list,
            coord_format: CoordFrame::Image,
            attr: ShapeAttributes::default(),
            exclude: false,
            comment: None,
            continued: false,
        }
    }

    /// A shape built directly from numbers, e.g. by a caller that already
    /// holds image coordinates.
    pub fn from_coordinates(kind: ShapeKind, coord_list: Vec<f64>, coord_format: CoordFrame) -> Self {
        let params = coord_list
            .iter()
            .map(|&value| NumericLiteral::SimpleNumber {
                text: value.to_string(),
                value,
            })
            .collect();
        Shape {
            kind,
            params,
            coord_list,
            coord_format,
            attr: ShapeAttributes::default(),
            exclude: false,
            comment: None,
            continued: false,
        }
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn params(&self) -> &[NumericLiteral] {
        &self.params
    }

    pub fn coord_list(&self) -> &[f64] {
        &self.coord_list
    }

    pub fn coord_format(&self) -> CoordFrame {
        self.coord_format
    }

    pub fn attr(&self) -> &ShapeAttributes {
        &self.attr
    }

    pub fn exclude(&self) -> bool {
        self.exclude
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn continued(&self) -> bool {
        self.continued
    }

    /// Argument roles matching the current coordinate list.
    pub fn roles(&self) -> Option<Vec<SemanticCoordType>> {
        self.kind.expand_roles(self.coord_list.len())
    }

    pub fn with_coordinates(&self, coord_list: Vec<f64>, coord_format: CoordFrame) -> Shape {
        Shape {
            coord_list,
            coord_format,
            ..self.clone()
        }
    }

    pub fn with_attributes(self, attr: ShapeAttributes) -> Shape {
        Shape { attr, ..self }
    }

    pub fn with_exclude(self, exclude: bool) -> Shape {
        Shape { exclude, ..self }
    }

    pub fn with_comment(self, comment: Option<String>) -> Shape {
        Shape { comment, ..self }
    }

    pub fn with_continued(self, continued: bool) -> Shape {
        Shape { continued, ..self }
    }

    /// Writes `name(c1,c2,...)` with the shortest text that reads back to
    /// the same value; integer arguments are rounded.
    pub(crate) fn write_call(&self, f: &mut impl fmt::Write) -> fmt::Result {
        let roles = self.roles();
        write!(f, "{}(", self.name())?;
        for (i, value) in self.coord_list.iter().enumerate() {
            if i > 0 {
                f.write_char(',')?;
            }
            let is_integer = roles.as_ref().and_then(|r| r.get(i)) == Some(&SemanticCoordType::Integer);
            if is_integer {
                write!(f, "{}", value.round() as i64)?;
            } else {
                write!(f, "{}", value)?;
            }
        }
        f.write_char(')')
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exclude {
            f.write_char('-')?;
        }
        self.write_call(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_is_case_insensitive() {
        assert_eq!(ShapeKind::from_name("CIRCLE"), Some(ShapeKind::Circle));
        assert_eq!(ShapeKind::from_name("RotBox"), Some(ShapeKind::RotBox));
        assert_eq!(ShapeKind::from_name("global"), None);
    }

    #[test]
    fn test_expand_roles_fixed() {
        assert_eq!(ShapeKind::Circle.expand_roles(3), Some(vec![CoordOdd, CoordEven, Distance]));
        assert_eq!(ShapeKind::Circle.expand_roles(4), None);
        assert_eq!(ShapeKind::Panda.expand_roles(8).map(|r| r[4]), Some(Integer));
    }

    #[test]
    fn test_expand_roles_repeating() {
        assert_eq!(
            ShapeKind::Ellipse.expand_roles(7),
            Some(vec![CoordOdd, CoordEven, Distance, Distance, Distance, Distance, Angle])
        );
        assert_eq!(ShapeKind::Ellipse.expand_roles(6), None);
        assert_eq!(ShapeKind::Polygon.expand_roles(4), None);
        assert_eq!(ShapeKind::Polygon.expand_roles(8).map(|r| r.len()), Some(8));
        assert_eq!(ShapeKind::Annulus.expand_roles(3), None);
        assert_eq!(ShapeKind::Annulus.expand_roles(5).map(|r| r.len()), Some(5));
    }

    #[test]
    fn test_repeat_range() {
        assert_eq!(ShapeKind::Box.signature().repeat_range(), Some((2, 4)));
        assert_eq!(ShapeKind::Annulus.signature().repeat_range(), Some((2, 3)));
        assert_eq!(ShapeKind::Polygon.signature().repeat_range(), Some((0, 2)));
        assert_eq!(ShapeKind::Circle.signature().repeat_range(), None);
    }

    #[test]
    fn test_comment_only_kinds() {
        assert!(ShapeKind::Composite.is_comment_only());
        assert!(ShapeKind::Segment.is_comment_only());
        assert!(!ShapeKind::Text.is_comment_only());
        assert!(!ShapeKind::Circle.is_comment_only());
    }

    #[test]
    fn test_with_coordinates_keeps_params() {
        let shape = Shape::new(
            ShapeKind::Circle,
            vec![
                NumericLiteral::Hms { text: "1h".to_string(), hours: 1.0 },
                NumericLiteral::Dms { text: "2d".to_string(), degrees: 2.0 },
                NumericLiteral::AngularDistance { text: "3'".to_string(), degrees: 0.05 },
            ],
        );
        assert_eq!(shape.coord_list(), &[15.0, 2.0, 0.05]);
        let converted = shape.with_coordinates(vec![10.0, 20.0, 3.0], CoordFrame::Image);
        assert_eq!(converted.params(), shape.params());
        assert_eq!(converted.coord_list(), &[10.0, 20.0, 3.0]);
    }

    #[test]
    fn test_display_keeps_small_distances() {
        let radius = 0.1 / 3600.0;
        let shape = Shape::from_coordinates(ShapeKind::Circle, vec![150.25, -2.5, radius], CoordFrame::Fk5);
        let text = shape.to_string();
        assert_eq!(text, format!("circle(150.25,-2.5,{})", radius));
        let written: f64 = text.trim_end_matches(')').rsplit(',').next().unwrap().parse().unwrap();
        assert_eq!(written, radius);
    }

    #[test]
    fn test_display() {
        let shape = Shape::from_coordinates(ShapeKind::Panda, vec![1.0, 2.0, 0.0, 360.0, 4.0, 0.0, 5.0, 2.0], CoordFrame::Image)
            .with_exclude(true);
        assert_eq!(
            shape.to_string(),
            "-panda(1,2,0,360,4,0,5,2)"
        );
    }
}
