//! Coordinate frames: the frame names a region file can declare, and the
//! celestial frames shapes can be converted between.
//!
//! Celestial conversions go through an FK5 J2000 hub with fixed 3x3
//! rotations. ICRS is taken to coincide with FK5 J2000, and the FK4
//! rotation ignores E-terms and proper motion; both approximations are far
//! below a pixel for region work.

use log::debug;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RegionError, Result};

/// Frame in which a shape's literal coordinates are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordFrame {
    Image,
    Physical,
    Logical,
    Detector,
    Amplifier,
    Linear,
    Fk4,
    Fk5,
    Icrs,
    Galactic,
    Ecliptic,
    /// Sky coordinates in whatever celestial frame the target WCS uses.
    #[serde(rename = "wcs")]
    UnknownWcs,
}

impl CoordFrame {
    /// Recognizes a frame command keyword (case-insensitive).
    pub fn from_command(keyword: &str) -> Option<CoordFrame> {
        let keyword = keyword.to_ascii_lowercase();
        let frame = match keyword.as_str() {
            "image" => CoordFrame::Image,
            "physical" => CoordFrame::Physical,
            "logical" => CoordFrame::Logical,
            "detector" => CoordFrame::Detector,
            "amplifier" => CoordFrame::Amplifier,
            "linear" => CoordFrame::Linear,
            "fk4" | "b1950" => CoordFrame::Fk4,
            "fk5" | "j2000" => CoordFrame::Fk5,
            "icrs" => CoordFrame::Icrs,
            "galactic" => CoordFrame::Galactic,
            "ecliptic" => CoordFrame::Ecliptic,
            other => {
                let suffix = other.strip_prefix("wcs")?;
                if !suffix.chars().all(|c| c.is_ascii_alphabetic()) {
                    return None;
                }
                if !suffix.is_empty() {
                    debug!("alternate WCS '{}' is treated as the primary WCS", other);
                }
                CoordFrame::UnknownWcs
            }
        };
        Some(frame)
    }

    pub fn name(&self) -> &'static str {
        match self {
            CoordFrame::Image => "image",
            CoordFrame::Physical => "physical",
            CoordFrame::Logical => "logical",
            CoordFrame::Detector => "detector",
            CoordFrame::Amplifier => "amplifier",
            CoordFrame::Linear => "linear",
            CoordFrame::Fk4 => "fk4",
            CoordFrame::Fk5 => "fk5",
            CoordFrame::Icrs => "icrs",
            CoordFrame::Galactic => "galactic",
            CoordFrame::Ecliptic => "ecliptic",
            CoordFrame::UnknownWcs => "wcs",
        }
    }

    /// Frames whose plain numbers are pixel-like rather than degrees.
    pub fn is_image_like(&self) -> bool {
        matches!(
            self,
            CoordFrame::Image
                | CoordFrame::Physical
                | CoordFrame::Logical
                | CoordFrame::Detector
                | CoordFrame::Amplifier
                | CoordFrame::Linear
        )
    }

    /// The celestial frame, for explicitly celestial frames only.
    pub fn sky_frame(&self) -> Option<SkyFrame> {
        match self {
            CoordFrame::Fk4 => Some(SkyFrame::Fk4),
            CoordFrame::Fk5 => Some(SkyFrame::Fk5),
            CoordFrame::Icrs => Some(SkyFrame::Icrs),
            CoordFrame::Galactic => Some(SkyFrame::Galactic),
            CoordFrame::Ecliptic => Some(SkyFrame::Ecliptic),
            _ => None,
        }
    }
}

impl fmt::Display for CoordFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mean obliquity of the ecliptic at J2000, degrees.
const OBLIQUITY_J2000: f64 = 23.439_291_111_1;

/// Celestial frame of a sky position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkyFrame {
    Fk4,
    Fk5,
    Icrs,
    Galactic,
    Ecliptic,
}

impl SkyFrame {
    /// Rotation taking a unit vector in this frame to FK5 J2000.
    fn to_fk5(&self) -> Matrix3<f64> {
        match self {
            SkyFrame::Fk5 | SkyFrame::Icrs => Matrix3::identity(),
            SkyFrame::Fk4 => Matrix3::new(
                0.999_925_678_2, -0.011_182_061_1, -0.004_857_947_7,
                0.011_182_061_0, 0.999_937_478_4, -0.000_027_176_5,
                0.004_857_947_9, -0.000_027_147_4, 0.999_988_199_7,
            ),
            SkyFrame::Galactic => Matrix3::new(
                -0.054_875_560_416_215_4, -0.873_437_090_234_885_0, -0.483_835_015_548_713_2,
                0.494_109_427_875_583_7, -0.444_829_629_960_011_2, 0.746_982_244_497_218_9,
                -0.867_666_149_019_004_7, -0.198_076_373_431_201_5, 0.455_983_776_175_066_9,
            )
            .transpose(),
            SkyFrame::Ecliptic => {
                let (s, c) = OBLIQUITY_J2000.to_radians().sin_cos();
                Matrix3::new(1.0, 0.0, 0.0, 0.0, c, s, 0.0, -s, c).transpose()
            }
        }
    }

    /// Converts `(lon, lat)` in degrees from this frame into `target`.
    pub fn convert(&self, target: SkyFrame, lon: f64, lat: f64) -> (f64, f64) {
        if self.to_fk5() == target.to_fk5() {
            return (lon, lat);
        }
        let (sin_lon, cos_lon) = lon.to_radians().sin_cos();
        let (sin_lat, cos_lat) = lat.to_radians().sin_cos();
        let v = Vector3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat);
        let w = target.to_fk5().transpose() * (self.to_fk5() * v);
        let lon = w.y.atan2(w.x).to_degrees().rem_euclid(360.0);
        let lat = w.z.clamp(-1.0, 1.0).asin().to_degrees();
        (lon, lat)
    }

    /// Infers the frame of a WCS from its axis types and reference system.
    pub fn from_ctype(ctype1: &str, ctype2: &str, equinox: Option<f64>, radesys: Option<&str>) -> Result<SkyFrame> {
        let axis1 = ctype1.trim().to_ascii_uppercase();
        let axis2 = ctype2.trim().to_ascii_uppercase();
        let unresolvable = || RegionError::UnresolvableFrame {
            ctype1: ctype1.to_string(),
            ctype2: ctype2.to_string(),
            equinox,
        };

        if axis1.starts_with("RA--") && axis2.starts_with("DEC-") {
            match radesys.map(|s| s.trim().to_ascii_uppercase()) {
                Some(system) => match system.as_str() {
                    "FK4" | "FK4-NO-E" => Ok(SkyFrame::Fk4),
                    "FK5" => Ok(SkyFrame::Fk5),
                    "ICRS" => Ok(SkyFrame::Icrs),
                    _ => Err(unresolvable()),
                },
                None => match equinox {
                    Some(e) if e < 1984.0 => Ok(SkyFrame::Fk4),
                    Some(_) => Ok(SkyFrame::Fk5),
                    None => Ok(SkyFrame::Icrs),
                },
            }
        } else if axis1.starts_with("GLON") && axis2.starts_with("GLAT") {
            Ok(SkyFrame::Galactic)
        } else if axis1.starts_with("ELON") && axis2.starts_with("ELAT") {
            Ok(SkyFrame::Ecliptic)
        } else {
            Err(unresolvable())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_frame_commands() {
        assert_eq!(CoordFrame::from_command("FK5"), Some(CoordFrame::Fk5));
        assert_eq!(CoordFrame::from_command("j2000"), Some(CoordFrame::Fk5));
        assert_eq!(CoordFrame::from_command("B1950"), Some(CoordFrame::Fk4));
        assert_eq!(CoordFrame::from_command("wcs"), Some(CoordFrame::UnknownWcs));
        assert_eq!(CoordFrame::from_command("wcsa"), Some(CoordFrame::UnknownWcs));
        assert_eq!(CoordFrame::from_command("wcs1"), None);
        assert_eq!(CoordFrame::from_command("circle"), None);
    }

    #[test]
    fn test_galactic_center_in_fk5() {
        let (ra, dec) = SkyFrame::Galactic.convert(SkyFrame::Fk5, 0.0, 0.0);
        assert_abs_diff_eq!(ra, 266.404_988, epsilon = 1e-4);
        assert_abs_diff_eq!(dec, -28.936_178, epsilon = 1e-4);
    }

    #[test]
    fn test_galactic_pole_in_fk5() {
        let (ra, dec) = SkyFrame::Galactic.convert(SkyFrame::Fk5, 0.0, 90.0);
        assert_abs_diff_eq!(ra, 192.859_48, epsilon = 1e-4);
        assert_abs_diff_eq!(dec, 27.128_25, epsilon = 1e-4);
    }

    #[test]
    fn test_round_trip_through_frames() {
        for frame in [SkyFrame::Fk4, SkyFrame::Galactic, SkyFrame::Ecliptic] {
            let (lon, lat) = SkyFrame::Fk5.convert(frame, 290.96388, 14.019167);
            let (ra, dec) = frame.convert(SkyFrame::Fk5, lon, lat);
            assert_abs_diff_eq!(ra, 290.96388, epsilon = 1e-9);
            assert_abs_diff_eq!(dec, 14.019167, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_ecliptic_pole() {
        let (ra, dec) = SkyFrame::Ecliptic.convert(SkyFrame::Fk5, 0.0, 90.0);
        assert_abs_diff_eq!(ra, 270.0, epsilon = 1e-9);
        assert_abs_diff_eq!(dec, 90.0 - OBLIQUITY_J2000, epsilon = 1e-9);
    }

    #[test]
    fn test_from_ctype() {
        assert_eq!(SkyFrame::from_ctype("RA---TAN", "DEC--TAN", Some(2000.0), None).unwrap(), SkyFrame::Fk5);
        assert_eq!(SkyFrame::from_ctype("RA---TAN", "DEC--TAN", Some(1950.0), None).unwrap(), SkyFrame::Fk4);
        assert_eq!(SkyFrame::from_ctype("RA---TAN", "DEC--TAN", None, None).unwrap(), SkyFrame::Icrs);
        assert_eq!(SkyFrame::from_ctype("RA---TAN", "DEC--TAN", Some(2000.0), Some("ICRS")).unwrap(), SkyFrame::Icrs);
        assert_eq!(SkyFrame::from_ctype("GLON-TAN", "GLAT-TAN", None, None).unwrap(), SkyFrame::Galactic);
        assert!(matches!(
            SkyFrame::from_ctype("LINEAR", "LINEAR", None, None),
            Err(RegionError::UnresolvableFrame { .. })
        ));
    }
}
