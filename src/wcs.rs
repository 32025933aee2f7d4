//! The world coordinate system boundary.
//!
//! Conversion code only talks to the [`Wcs`] trait. [`HeaderWcs`] builds
//! one from FITS header keywords on top of the `wcs` crate; callers with
//! their own WCS library implement the trait on their own type.

use nalgebra::Matrix2;
use std::collections::BTreeMap;
use ::wcs::{ImgXY, LonLat, WCSParams, WCS};

use crate::converter::wrap_longitude;
use crate::error::{RegionError, Result};
use crate::frames::SkyFrame;

/// Value of a header keyword.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Number(f64),
    Text(String),
}

/// Materialized FITS header keywords. Keys are stored upper-case.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: BTreeMap<String, HeaderValue>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: HeaderValue) {
        self.cards.insert(key.to_ascii_uppercase(), value);
    }

    pub fn with_number(mut self, key: &str, value: f64) -> Self {
        self.set(key, HeaderValue::Number(value));
        self
    }

    pub fn with_text(mut self, key: &str, value: &str) -> Self {
        self.set(key, HeaderValue::Text(value.to_string()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.cards.get(&key.to_ascii_uppercase())
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            HeaderValue::Number(n) => Some(*n),
            HeaderValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            HeaderValue::Text(s) => Some(s.trim()),
            HeaderValue::Number(_) => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Exact affine map between physical and image pixels
/// (`CRVALnP`, `CRPIXnP`, `CDELTnP`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalCoordinate {
    crval: [f64; 2],
    crpix: [f64; 2],
    cdelt: [f64; 2],
}

impl PhysicalCoordinate {
    pub fn new(crval: [f64; 2], crpix: [f64; 2], cdelt: [f64; 2]) -> Self {
        PhysicalCoordinate { crval, crpix, cdelt }
    }

    /// `None` unless all six keywords are present.
    pub fn from_header(header: &Header) -> Option<Self> {
        let mut crval = [0.0; 2];
        let mut crpix = [0.0; 2];
        let mut cdelt = [0.0; 2];
        for axis in 0..2 {
            crval[axis] = header.number(&format!("CRVAL{}P", axis + 1))?;
            crpix[axis] = header.number(&format!("CRPIX{}P", axis + 1))?;
            cdelt[axis] = header.number(&format!("CDELT{}P", axis + 1))?;
        }
        Some(PhysicalCoordinate { crval, crpix, cdelt })
    }

    pub fn to_image(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.crpix[0] + (x - self.crval[0]) / self.cdelt[0],
            self.crpix[1] + (y - self.crval[1]) / self.cdelt[1],
        )
    }

    pub fn to_physical(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.crval[0] + (x - self.crpix[0]) * self.cdelt[0],
            self.crval[1] + (y - self.crpix[1]) * self.cdelt[1],
        )
    }

    pub fn to_image_distance(&self, d: f64) -> f64 {
        d / (self.cdelt[0] * self.cdelt[1]).abs().sqrt()
    }
}

/// Pixel <-> world service for one image.
///
/// World coordinates are `(longitude, latitude)` degrees in the frame given
/// by [`Wcs::sky_frame`]; pixel coordinates use the given origin
/// (1.0 for the FITS convention).
pub trait Wcs {
    fn naxis(&self) -> usize;

    /// Axis type, 1-based (`CTYPE1`, `CTYPE2`).
    fn ctype(&self, axis: usize) -> Option<&str>;

    fn equinox(&self) -> Option<f64>;

    fn radesys(&self) -> Option<&str>;

    /// Local pixel-to-world matrix in degrees per pixel at the reference pixel.
    fn pixel_scale_matrix(&self) -> Result<Matrix2<f64>>;

    fn to_pixel(&self, world: (f64, f64), origin: f64) -> Result<(f64, f64)>;

    fn to_world(&self, pixel: (f64, f64), origin: f64) -> Result<(f64, f64)>;

    fn physical(&self) -> Option<&PhysicalCoordinate>;

    /// Frame the image axes are labelled in.
    fn native_frame(&self) -> Result<SkyFrame> {
        SkyFrame::from_ctype(
            self.ctype(1).unwrap_or(""),
            self.ctype(2).unwrap_or(""),
            self.equinox(),
            self.radesys(),
        )
    }

    /// Celestial frame of the world coordinates.
    fn sky_frame(&self) -> Result<SkyFrame> {
        self.native_frame()
    }
}

/// A WCS read from header keywords. Projections are delegated to the
/// `wcs` crate, whose world coordinates are ICRS.
#[derive(Debug)]
pub struct HeaderWcs {
    naxis: usize,
    ctype: [String; 2],
    equinox: Option<f64>,
    radesys: Option<String>,
    crpix: [f64; 2],
    projection: Option<WCS>,
    physical: Option<PhysicalCoordinate>,
}

const CELESTIAL_PREFIXES: [&str; 6] = ["RA--", "DEC-", "GLON", "GLAT", "ELON", "ELAT"];

fn is_celestial_axis(ctype: &str) -> bool {
    CELESTIAL_PREFIXES.iter().any(|prefix| ctype.starts_with(prefix))
}

/// Keyword cards as `WCSParams`, whose fields are the lower-cased keyword names.
fn wcs_params(header: &Header) -> Result<WCSParams> {
    let mut table: toml::Table = header
        .cards
        .iter()
        .map(|(key, value)| {
            let value = match value {
                HeaderValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => toml::Value::Integer(*n as i64),
                HeaderValue::Number(n) => toml::Value::Float(*n),
                HeaderValue::Text(s) => toml::Value::String(s.trim().to_string()),
            };
            (key.to_ascii_lowercase().replace('-', "_"), value)
        })
        .collect();
    table.entry("naxis").or_insert(toml::Value::Integer(2));
    toml::Value::Table(table)
        .try_into::<WCSParams>()
        .map_err(|e| RegionError::Projection(format!("invalid WCS keywords: {}", e)))
}

impl HeaderWcs {
    pub fn from_header(header: &Header) -> Result<Self> {
        let naxis = header.number("NAXIS").map_or(2, |n| n as usize);
        let ctype = [
            header.text("CTYPE1").unwrap_or("").to_ascii_uppercase(),
            header.text("CTYPE2").unwrap_or("").to_ascii_uppercase(),
        ];
        let equinox = header.number("EQUINOX").or_else(|| header.number("EPOCH"));
        let radesys = header
            .text("RADESYS")
            .or_else(|| header.text("RADECSYS"))
            .map(str::to_string);

        let projection = if is_celestial_axis(&ctype[0]) && is_celestial_axis(&ctype[1]) {
            Some(WCS::new(&wcs_params(header)?)?)
        } else {
            None
        };

        Ok(HeaderWcs {
            naxis,
            ctype,
            equinox,
            radesys,
            crpix: [
                header.number("CRPIX1").unwrap_or(0.0),
                header.number("CRPIX2").unwrap_or(0.0),
            ],
            projection,
            physical: PhysicalCoordinate::from_header(header),
        })
    }

    pub fn with_physical(mut self, physical: PhysicalCoordinate) -> Self {
        self.physical = Some(physical);
        self
    }

    fn projection(&self) -> Result<&WCS> {
        self.projection.as_ref().ok_or_else(|| RegionError::UnresolvableFrame {
            ctype1: self.ctype[0].clone(),
            ctype2: self.ctype[1].clone(),
            equinox: self.equinox,
        })
    }
}

impl Wcs for HeaderWcs {
    fn naxis(&self) -> usize {
        self.naxis
    }

    fn ctype(&self, axis: usize) -> Option<&str> {
        axis.checked_sub(1)
            .and_then(|index| self.ctype.get(index))
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    fn equinox(&self) -> Option<f64> {
        self.equinox
    }

    fn radesys(&self) -> Option<&str> {
        self.radesys.as_deref()
    }

    /// Columns are the world offsets of one-pixel steps along x and y,
    /// with the longitude offset scaled by the cosine of the latitude.
    fn pixel_scale_matrix(&self) -> Result<Matrix2<f64>> {
        let (x0, y0) = (self.crpix[0], self.crpix[1]);
        let (lon0, lat0) = self.to_world((x0, y0), 1.0)?;
        let cos_lat = lat0.to_radians().cos();
        let step = |pixel: (f64, f64)| -> Result<(f64, f64)> {
            let (lon, lat) = self.to_world(pixel, 1.0)?;
            Ok((wrap_longitude(lon - lon0) * cos_lat, lat - lat0))
        };
        let (a11, a21) = step((x0 + 1.0, y0))?;
        let (a12, a22) = step((x0, y0 + 1.0))?;
        Ok(Matrix2::new(a11, a12, a21, a22))
    }

    fn to_pixel(&self, world: (f64, f64), origin: f64) -> Result<(f64, f64)> {
        let lonlat = LonLat::new(world.0.to_radians(), world.1.to_radians());
        let pixel = self.projection()?.proj(&lonlat).ok_or_else(|| {
            RegionError::Projection(format!("({}, {}) has no position in the image plane", world.0, world.1))
        })?;
        Ok((pixel.x() - 1.0 + origin, pixel.y() - 1.0 + origin))
    }

    fn to_world(&self, pixel: (f64, f64), origin: f64) -> Result<(f64, f64)> {
        let xy = ImgXY::new(pixel.0 + 1.0 - origin, pixel.1 + 1.0 - origin);
        let lonlat = self.projection()?.unproj(&xy).ok_or_else(|| {
            RegionError::Projection(format!("pixel ({}, {}) is outside the projection", pixel.0, pixel.1))
        })?;
        Ok((lonlat.lon().to_degrees().rem_euclid(360.0), lonlat.lat().to_degrees()))
    }

    fn physical(&self) -> Option<&PhysicalCoordinate> {
        self.physical.as_ref()
    }

    fn sky_frame(&self) -> Result<SkyFrame> {
        self.projection()?;
        Ok(SkyFrame::Icrs)
    }
}
