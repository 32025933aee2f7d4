//! # Rusty Region Filter
//!
//! Reads DS9 region files into shapes, converts them to image coordinates
//! through a WCS, and rasterizes them into boolean masks.
//! Parsing is written with nom 7.1. Python bindings via PyO3 are available
//! with the `python` feature.

use nom::error::VerboseError;
use nom::IResult;
use std::io::Read;

pub mod attr_parser;
pub mod classifier;
pub mod config;
pub mod converter;
pub mod error;
pub mod filter;
pub mod frames;
pub mod grammar;
pub mod resolver;
pub mod semantic_parsers;
pub mod shape;
pub mod shape_list;
pub mod wcs;

#[cfg(feature = "python")]
mod python;

pub use attr_parser::{AttrValue, ShapeAttributes};
pub use config::{FilterOptions, ParseOptions, RegionConfig};
pub use error::{RegionError, Result};
pub use filter::{Geometry, Mask, RegionFilter};
pub use frames::{CoordFrame, SkyFrame};
pub use semantic_parsers::NumericLiteral;
pub use shape::{Shape, ShapeKind};
pub use shape_list::ShapeList;
pub use crate::wcs::{Header, HeaderValue, HeaderWcs, PhysicalCoordinate, Wcs};

// --- Parser Types ---
pub(crate) type Input<'a> = &'a str;
pub(crate) type ParserResult<'a, O> = IResult<Input<'a>, O, VerboseError<Input<'a>>>;

use classifier::FrameClassifier;
use grammar::{parse_statements, Statement};
use resolver::AttributeResolver;

fn parse_shapes(text: &str, options: &ParseOptions) -> Vec<Shape> {
    let mut resolver = AttributeResolver::new();
    let mut classifier = FrameClassifier::new(options.default_frame);
    let mut shapes = Vec::new();
    for statement in parse_statements(text) {
        match resolver.resolve(statement) {
            Some(Statement::Frame(frame)) => classifier.set_frame(frame),
            Some(Statement::Shape(shape)) => shapes.push(classifier.classify(shape)),
            _ => {}
        }
    }
    shapes
}

/// Parses region text; each shape's trailing comment is kept in the list's comments.
pub fn parse(text: &str) -> ShapeList {
    parse_with_options(text, &ParseOptions::default())
}

pub fn parse_with_options(text: &str, options: &ParseOptions) -> ShapeList {
    ShapeList::with_shape_comments(parse_shapes(text, options))
}

/// Parses region text without collecting comments.
pub fn read_region(text: &str) -> ShapeList {
    read_region_with_options(text, &ParseOptions::default())
}

pub fn read_region_with_options(text: &str, options: &ParseOptions) -> ShapeList {
    ShapeList::from(parse_shapes(text, options))
}

pub fn read_region_as_imagecoord(text: &str, wcs: &dyn Wcs) -> Result<ShapeList> {
    read_region(text).as_image_coordinates(wcs)
}

/// Reads and parses region text from `reader`.
pub fn open(mut reader: impl Read) -> Result<ShapeList> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    Ok(parse(&text))
}

/// Mask of a region already in image coordinates.
pub fn get_mask(shape_list: &ShapeList, shape: (usize, usize), origin: f64) -> Result<Mask> {
    Ok(shape_list.get_filter(None, origin)?.mask(shape))
}
