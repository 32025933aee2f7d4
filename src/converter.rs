//! Converts shape coordinates into image pixels.
//!
//! Positions go through the WCS directly. Sizes and angles have no closed
//! form under a general projection, so they are converted with the local
//! pixel scale and north direction estimated by finite differences at the
//! shape's current point.

use log::debug;

use crate::error::{RegionError, Result};
use crate::frames::{CoordFrame, SkyFrame};
use crate::shape::{SemanticCoordType, Shape};
use crate::wcs::{PhysicalCoordinate, Wcs};

/// Latitudes closer than this to +/-90 degrees count as the pole.
const POLE_TOLERANCE: f64 = 1e-9;

pub(crate) fn wrap_longitude(delta: f64) -> f64 {
    let wrapped = (delta + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 {
        180.0
    } else {
        wrapped
    }
}

/// Degrees per pixel at image position `(x0, y0)` (origin 1): the geometric
/// mean of the angular steps of one pixel along each axis.
pub fn estimate_pixel_scale(wcs: &dyn Wcs, x0: f64, y0: f64) -> Result<f64> {
    let (lon0, lat0) = wcs.to_world((x0, y0), 1.0)?;
    if (lat0.abs() - 90.0).abs() < POLE_TOLERANCE {
        return Err(RegionError::PoleSingularity { latitude: lat0 });
    }
    let cos_lat = lat0.to_radians().cos();
    let step = |pixel: (f64, f64)| -> Result<f64> {
        let (lon, lat) = wcs.to_world(pixel, 1.0)?;
        Ok((wrap_longitude(lon - lon0) * cos_lat).hypot(lat - lat0))
    };
    let dx = step((x0 + 1.0, y0))?;
    let dy = step((x0, y0 + 1.0))?;
    Ok((dx * dy).sqrt())
}

/// Angle, in degrees, between the image +y axis and north of `source` at
/// `(x0, y0)`. Adding it to a position angle measured in `source` gives the
/// angle in the image.
pub fn estimate_rotation(wcs: &dyn Wcs, source: SkyFrame, x0: f64, y0: f64) -> Result<f64> {
    let native = wcs.sky_frame()?;
    let cdelt = estimate_pixel_scale(wcs, x0, y0)?;
    let (lon, lat) = wcs.to_world((x0, y0), 1.0)?;
    let (src_lon, src_lat) = native.convert(source, lon, lat);

    let (north_lat, flip) = if src_lat + cdelt > 90.0 {
        (src_lat - cdelt, 180.0)
    } else {
        (src_lat + cdelt, 0.0)
    };
    let (lon1, lat1) = source.convert(native, src_lon, north_lat);
    let (x1, y1) = wcs.to_pixel((lon1, lat1), 1.0)?;
    Ok((y1 - y0).atan2(x1 - x0).to_degrees() - 90.0 + flip)
}

fn argument_count_error(shape: &Shape) -> RegionError {
    RegionError::ArgumentCount {
        shape: shape.name().to_string(),
        count: shape.coord_list().len(),
    }
}

fn convert_sky(shape: &Shape, wcs: &dyn Wcs) -> Result<Vec<f64>> {
    let native = wcs.sky_frame()?;
    let source = match shape.coord_format().sky_frame() {
        Some(frame) => frame,
        None => wcs.native_frame()?,
    };
    let roles = shape.roles().ok_or_else(|| argument_count_error(shape))?;
    let coords = shape.coord_list();

    let mut converted = Vec::with_capacity(coords.len());
    let mut current: Option<(f64, f64)> = None;
    let mut i = 0;
    while i < coords.len() {
        match roles[i] {
            SemanticCoordType::CoordOdd => {
                let lat = *coords.get(i + 1).ok_or_else(|| argument_count_error(shape))?;
                let world = source.convert(native, coords[i], lat);
                let (x, y) = wcs.to_pixel(world, 1.0)?;
                converted.extend([x, y]);
                current = Some((x, y));
                i += 2;
                continue;
            }
            SemanticCoordType::CoordEven => return Err(argument_count_error(shape)),
            SemanticCoordType::Distance => {
                let (x0, y0) = current.ok_or_else(|| argument_count_error(shape))?;
                converted.push(coords[i] / estimate_pixel_scale(wcs, x0, y0)?);
            }
            SemanticCoordType::Angle => {
                let (x0, y0) = current.ok_or_else(|| argument_count_error(shape))?;
                let rotation = estimate_rotation(wcs, source, x0, y0)?;
                converted.push((coords[i] + rotation).rem_euclid(360.0));
            }
            SemanticCoordType::Integer => converted.push(coords[i]),
        }
        i += 1;
    }
    Ok(converted)
}

fn convert_physical(shape: &Shape, physical: &PhysicalCoordinate) -> Result<Vec<f64>> {
    let roles = shape.roles().ok_or_else(|| argument_count_error(shape))?;
    let coords = shape.coord_list();
    let mut converted = Vec::with_capacity(coords.len());
    let mut i = 0;
    while i < coords.len() {
        match roles[i] {
            SemanticCoordType::CoordOdd => {
                let y = *coords.get(i + 1).ok_or_else(|| argument_count_error(shape))?;
                let (x, y) = physical.to_image(coords[i], y);
                converted.extend([x, y]);
                i += 2;
                continue;
            }
            SemanticCoordType::CoordEven => return Err(argument_count_error(shape)),
            SemanticCoordType::Distance => converted.push(physical.to_image_distance(coords[i])),
            SemanticCoordType::Angle | SemanticCoordType::Integer => converted.push(coords[i]),
        }
        i += 1;
    }
    Ok(converted)
}

/// Returns a copy of `shape` in image coordinates.
pub fn convert_to_image(shape: &Shape, wcs: &dyn Wcs) -> Result<Shape> {
    let coords = match shape.coord_format() {
        CoordFrame::Image => return Ok(shape.clone()),
        CoordFrame::Logical => {
            debug!("{} in logical coordinates is treated as image coordinates", shape.name());
            shape.coord_list().to_vec()
        }
        CoordFrame::Physical => {
            let physical = wcs.physical().ok_or(RegionError::PhysicalCoordinateMissing)?;
            convert_physical(shape, physical)?
        }
        frame @ (CoordFrame::Detector | CoordFrame::Amplifier | CoordFrame::Linear) => {
            return Err(RegionError::UnsupportedFrame(frame.name().to_string()))
        }
        CoordFrame::Fk4
        | CoordFrame::Fk5
        | CoordFrame::Icrs
        | CoordFrame::Galactic
        | CoordFrame::Ecliptic
        | CoordFrame::UnknownWcs => convert_sky(shape, wcs)?,
    };
    Ok(shape.with_coordinates(coords, CoordFrame::Image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::ShapeKind;
    use crate::wcs::tests::tan_header;
    use crate::wcs::{Header, HeaderWcs};
    use approx::assert_abs_diff_eq;

    fn wcs_at(ra: f64, dec: f64) -> HeaderWcs {
        HeaderWcs::from_header(&tan_header(ra, dec)).unwrap()
    }

    #[test]
    fn test_pixel_scale_matches_cdelt() {
        let wcs = wcs_at(150.0, 30.0);
        let scale = estimate_pixel_scale(&wcs, 50.0, 50.0).unwrap();
        assert_abs_diff_eq!(scale, 1.0 / 3600.0, epsilon = 1e-10);
    }

    #[test]
    fn test_pixel_scale_at_pole() {
        let wcs = wcs_at(0.0, 90.0);
        assert!(matches!(
            estimate_pixel_scale(&wcs, 50.0, 50.0),
            Err(RegionError::PoleSingularity { .. })
        ));
        assert!(estimate_pixel_scale(&wcs, 60.0, 50.0).is_ok());
    }

    #[test]
    fn test_rotation_of_north_up_image() {
        let wcs = wcs_at(150.0, 30.0);
        let rotation = estimate_rotation(&wcs, SkyFrame::Fk5, 50.0, 50.0).unwrap();
        assert_abs_diff_eq!(rotation, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rotation_of_rotated_image() {
        let header = tan_header(150.0, 30.0).with_number("CROTA2", 30.0);
        let wcs = HeaderWcs::from_header(&header).unwrap();
        let rotation = estimate_rotation(&wcs, SkyFrame::Fk5, 50.0, 50.0).unwrap();
        assert_abs_diff_eq!(rotation.rem_euclid(360.0), 30.0, epsilon = 1e-4);
    }

    #[test]
    fn test_sky_circle_to_image() {
        let wcs = wcs_at(150.0, 30.0);
        let shape = Shape::from_coordinates(ShapeKind::Circle, vec![150.0, 30.0, 10.0 / 3600.0], CoordFrame::Fk5);
        let converted = convert_to_image(&shape, &wcs).unwrap();
        assert_eq!(converted.coord_format(), CoordFrame::Image);
        let c = converted.coord_list();
        assert_abs_diff_eq!(c[0], 50.0, epsilon = 1e-9);
        assert_abs_diff_eq!(c[1], 50.0, epsilon = 1e-9);
        assert_abs_diff_eq!(c[2], 10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_box_angle_and_galactic_source() {
        let wcs = wcs_at(150.0, 30.0);
        let (l, b) = SkyFrame::Fk5.convert(SkyFrame::Galactic, 150.0, 30.0);
        let shape = Shape::from_coordinates(
            ShapeKind::Box,
            vec![l, b, 4.0 / 3600.0, 2.0 / 3600.0, 45.0],
            CoordFrame::Galactic,
        );
        let converted = convert_to_image(&shape, &wcs).unwrap();
        let c = converted.coord_list();
        assert_abs_diff_eq!(c[0], 50.0, epsilon = 1e-6);
        assert_abs_diff_eq!(c[1], 50.0, epsilon = 1e-6);
        assert_abs_diff_eq!(c[2], 4.0, epsilon = 1e-5);
        let expected = (45.0 + estimate_rotation(&wcs, SkyFrame::Galactic, c[0], c[1]).unwrap()).rem_euclid(360.0);
        assert_abs_diff_eq!(c[4], expected, epsilon = 1e-9);
        assert!((c[4] - 45.0).abs() > 1.0);
    }

    #[test]
    fn test_unknown_wcs_uses_native_frame() {
        let wcs = wcs_at(150.0, 30.0);
        let shape = Shape::from_coordinates(ShapeKind::Point, vec![150.0, 30.0], CoordFrame::UnknownWcs);
        let converted = convert_to_image(&shape, &wcs).unwrap();
        assert_abs_diff_eq!(converted.coord_list()[0], 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_unknown_wcs_in_galactic_image() {
        let header = tan_header(120.0, -10.0)
            .with_text("CTYPE1", "GLON-TAN")
            .with_text("CTYPE2", "GLAT-TAN");
        let wcs = HeaderWcs::from_header(&header).unwrap();
        let shape = Shape::from_coordinates(ShapeKind::Point, vec![120.0, -10.0], CoordFrame::UnknownWcs);
        let c = convert_to_image(&shape, &wcs).unwrap().coord_list().to_vec();
        assert_abs_diff_eq!(c[0], 50.0, epsilon = 1e-3);
        assert_abs_diff_eq!(c[1], 50.0, epsilon = 1e-3);
    }

    #[test]
    fn test_shape_at_pole_fails_conversion() {
        let wcs = wcs_at(0.0, 90.0);
        let shape = Shape::from_coordinates(ShapeKind::Circle, vec![0.0, 90.0, 10.0 / 3600.0], CoordFrame::Fk5);
        assert!(matches!(
            convert_to_image(&shape, &wcs),
            Err(RegionError::PoleSingularity { .. })
        ));

        let south = wcs_at(0.0, -90.0);
        let shape = Shape::from_coordinates(ShapeKind::Circle, vec![0.0, -90.0, 10.0 / 3600.0], CoordFrame::Fk5);
        assert!(matches!(
            convert_to_image(&shape, &south),
            Err(RegionError::PoleSingularity { .. })
        ));
    }

    #[test]
    fn test_panda_integers_pass_through() {
        let wcs = wcs_at(150.0, 30.0);
        let shape = Shape::from_coordinates(
            ShapeKind::Panda,
            vec![150.0, 30.0, 0.0, 360.0, 4.0, 0.0, 5.0 / 3600.0, 2.0],
            CoordFrame::Fk5,
        );
        let c = convert_to_image(&shape, &wcs).unwrap().coord_list().to_vec();
        assert_eq!(c[4], 4.0);
        assert_eq!(c[7], 2.0);
        assert_abs_diff_eq!(c[6], 5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_physical_conversion() {
        let header = Header::new()
            .with_number("CRVAL1P", 1000.0)
            .with_number("CRVAL2P", 1000.0)
            .with_number("CRPIX1P", 0.5)
            .with_number("CRPIX2P", 0.5)
            .with_number("CDELT1P", 4.0)
            .with_number("CDELT2P", 4.0);
        let wcs = HeaderWcs::from_header(&header).unwrap();
        let shape = Shape::from_coordinates(ShapeKind::Ellipse, vec![1040.0, 1080.0, 8.0, 4.0, 30.0], CoordFrame::Physical);
        let converted = convert_to_image(&shape, &wcs).unwrap();
        assert_eq!(converted.coord_list(), &[10.5, 20.5, 2.0, 1.0, 30.0]);
    }

    #[test]
    fn test_physical_keywords_required() {
        let wcs = wcs_at(150.0, 30.0);
        let shape = Shape::from_coordinates(ShapeKind::Circle, vec![1.0, 2.0, 3.0], CoordFrame::Physical);
        assert!(matches!(
            convert_to_image(&shape, &wcs),
            Err(RegionError::PhysicalCoordinateMissing)
        ));
    }

    #[test]
    fn test_frame_dispatch() {
        let wcs = wcs_at(150.0, 30.0);
        let image = Shape::from_coordinates(ShapeKind::Circle, vec![1.0, 2.0, 3.0], CoordFrame::Image);
        assert_eq!(convert_to_image(&image, &wcs).unwrap(), image);

        let logical = Shape::from_coordinates(ShapeKind::Circle, vec![1.0, 2.0, 3.0], CoordFrame::Logical);
        assert_eq!(convert_to_image(&logical, &wcs).unwrap().coord_format(), CoordFrame::Image);

        let detector = Shape::from_coordinates(ShapeKind::Circle, vec![1.0, 2.0, 3.0], CoordFrame::Detector);
        assert!(matches!(
            convert_to_image(&detector, &wcs),
            Err(RegionError::UnsupportedFrame(name)) if name == "detector"
        ));
    }

    #[test]
    fn test_argument_count_mismatch() {
        let wcs = wcs_at(150.0, 30.0);
        let shape = Shape::from_coordinates(ShapeKind::Circle, vec![150.0, 30.0], CoordFrame::Fk5);
        assert!(matches!(
            convert_to_image(&shape, &wcs),
            Err(RegionError::ArgumentCount { count: 2, .. })
        ));
    }
}
