//! Assigns each shape the frame its coordinates are written in.

use crate::frames::CoordFrame;
use crate::shape::Shape;

/// Tracks the frame declared by the most recent frame command.
#[derive(Debug, Clone)]
pub struct FrameClassifier {
    current: CoordFrame,
}

impl FrameClassifier {
    pub fn new(default_frame: CoordFrame) -> Self {
        FrameClassifier { current: default_frame }
    }

    pub fn current(&self) -> CoordFrame {
        self.current
    }

    pub fn set_frame(&mut self, frame: CoordFrame) {
        self.current = frame;
    }

    /// Resolves the shape's literals into numbers and picks its frame.
    ///
    /// Galactic coordinates are always degrees, so sexagesimal text there is
    /// read as degrees too. Elsewhere any sexagesimal or unit-carrying
    /// literal makes the shape a sky shape; under an image-like frame that
    /// means "whatever sky frame the target WCS uses".
    pub fn classify(&self, shape: Shape) -> Shape {
        if self.current == CoordFrame::Galactic {
            let coords = shape.params().iter().map(|p| p.value()).collect();
            return shape.with_coordinates(coords, CoordFrame::Galactic);
        }

        let coords = shape.params().iter().map(|p| p.degrees()).collect();
        let is_sky = shape.params().iter().any(|p| p.is_angular());
        let frame = if is_sky && self.current.is_image_like() {
            CoordFrame::UnknownWcs
        } else {
            self.current
        };
        shape.with_coordinates(coords, frame)
    }
}
