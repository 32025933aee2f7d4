//! Ordered shapes of one region text, with conversion, masking and serialization.

use log::warn;
use std::fmt;
use std::io;
use std::ops::Range;

use crate::config::FilterOptions;
use crate::converter::convert_to_image;
use crate::error::{RegionError, Result};
use crate::filter::{compile, Mask, RegionFilter};
use crate::frames::CoordFrame;
use crate::shape::Shape;
use crate::wcs::Wcs;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeList {
    shapes: Vec<Shape>,
    comments: Option<Vec<Option<String>>>,
}

impl ShapeList {
    /// Fails when `comments` is given but does not pair up with `shapes`.
    pub fn new(shapes: Vec<Shape>, comments: Option<Vec<Option<String>>>) -> Result<Self> {
        if let Some(comments) = &comments {
            if comments.len() != shapes.len() {
                return Err(RegionError::CommentCountMismatch {
                    comments: comments.len(),
                    shapes: shapes.len(),
                });
            }
        }
        Ok(ShapeList { shapes, comments })
    }

    pub(crate) fn with_shape_comments(shapes: Vec<Shape>) -> Self {
        let comments = shapes.iter().map(|s| s.comment().map(str::to_string)).collect();
        ShapeList {
            shapes,
            comments: Some(comments),
        }
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Shape> {
        self.shapes.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Shape> {
        self.shapes.get(index)
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Sub-list with the matching comments, or `None` if `range` is out of bounds.
    pub fn slice(&self, range: Range<usize>) -> Option<ShapeList> {
        let shapes = self.shapes.get(range.clone())?.to_vec();
        let comments = match &self.comments {
            Some(comments) => Some(comments.get(range)?.to_vec()),
            None => None,
        };
        Some(ShapeList { shapes, comments })
    }

    pub fn comments(&self) -> Option<&[Option<String>]> {
        self.comments.as_deref()
    }

    /// True when every shape is already in image coordinates.
    pub fn check_imagecoord(&self) -> bool {
        self.shapes.iter().all(|s| s.coord_format() == CoordFrame::Image)
    }

    pub fn as_image_coordinates(&self, wcs: &dyn Wcs) -> Result<ShapeList> {
        let shapes = self
            .shapes
            .iter()
            .map(|shape| convert_to_image(shape, wcs))
            .collect::<Result<Vec<_>>>()?;
        Ok(ShapeList {
            shapes,
            comments: self.comments.clone(),
        })
    }

    /// Builds the containment filter; a WCS is needed unless all shapes are in image coordinates.
    pub fn get_filter(&self, wcs: Option<&dyn Wcs>, origin: f64) -> Result<RegionFilter> {
        if self.check_imagecoord() {
            return Ok(compile(&self.shapes, origin));
        }
        match wcs {
            Some(wcs) => Ok(compile(&self.as_image_coordinates(wcs)?.shapes, origin)),
            None => Err(RegionError::HeaderRequired),
        }
    }

    /// Rasterizes onto a `(ny, nx)` grid using the default pixel origin.
    pub fn get_mask(&self, wcs: Option<&dyn Wcs>, shape: (usize, usize)) -> Result<Mask> {
        self.get_mask_with_options(wcs, shape, &FilterOptions::default())
    }

    pub fn get_mask_with_options(
        &self,
        wcs: Option<&dyn Wcs>,
        shape: (usize, usize),
        options: &FilterOptions,
    ) -> Result<Mask> {
        Ok(self.get_filter(wcs, options.origin)?.mask(shape))
    }

    pub fn to_region_string(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_region(&mut out);
        out
    }

    pub fn write(&self, mut writer: impl io::Write) -> Result<()> {
        writer.write_all(self.to_region_string().as_bytes())?;
        Ok(())
    }

    fn write_region(&self, out: &mut impl fmt::Write) -> fmt::Result {
        let Some(first) = self.shapes.first() else {
            warn!("the region list is empty; nothing to write");
            return Ok(());
        };

        out.write_str("global")?;
        let attr = first.attr();
        for flag in attr.flags() {
            write!(out, " {}", flag)?;
        }
        for (key, value) in attr.values() {
            if key != "text" {
                write!(out, " {}={}", key, value)?;
            }
        }
        for tag in attr.tags() {
            write!(out, " tag={{{}}}", tag)?;
        }
        out.write_char('\n')?;

        let mut frame = first.coord_format();
        writeln!(out, "{}", frame)?;

        for shape in &self.shapes {
            let comment_only = shape.kind().is_comment_only();
            if shape.coord_format() != frame {
                frame = shape.coord_format();
                if comment_only {
                    writeln!(out, "{}", frame)?;
                } else {
                    write!(out, "{}; ", frame)?;
                }
            }
            if comment_only {
                out.write_str("# ")?;
            }
            write!(out, "{}", shape)?;
            if shape.continued() {
                out.write_str(" ||")?;
            }
            if let Some(comment) = shape.comment() {
                if comment_only {
                    write!(out, " {}", comment)?;
                } else {
                    write!(out, " # {}", comment)?;
                }
            }
            out.write_char('\n')?;
        }
        Ok(())
    }
}

impl From<Vec<Shape>> for ShapeList {
    fn from(shapes: Vec<Shape>) -> Self {
        ShapeList { shapes, comments: None }
    }
}

impl<'a> IntoIterator for &'a ShapeList {
    type Item = &'a Shape;
    type IntoIter = std::slice::Iter<'a, Shape>;

    fn into_iter(self) -> Self::IntoIter {
        self.shapes.iter()
    }
}

impl fmt::Display for ShapeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_region(f)
    }
}
