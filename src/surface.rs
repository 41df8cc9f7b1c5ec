#![warn(missing_docs)]
//! Optical surfaces
//!
//! A [`Surface`] combines a local coordinate system, a [`Shape`], an [`Aperture`] and a reference to the material
//! on its image side. Materials are referenced by name so that several surfaces can share one material instance of
//! the owning [`OpticalSystem`](crate::optical_system::OpticalSystem).
use serde::{Deserialize, Serialize};

use crate::{aperture::Aperture, coordinates::CoordId, shape::Shape};

/// A single optical surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Surface {
    name: String,
    coordinate_system: CoordId,
    shape: Shape,
    aperture: Aperture,
    material: String,
    is_stop: bool,
}
impl Surface {
    /// Create a new [`Surface`] without aperture.
    ///
    /// `material` is the name of the material behind the surface.
    #[must_use]
    pub fn new(name: &str, coordinate_system: CoordId, shape: Shape, material: &str) -> Self {
        Self {
            name: name.to_owned(),
            coordinate_system,
            shape,
            aperture: Aperture::default(),
            material: material.to_owned(),
            is_stop: false,
        }
    }
    /// Set the aperture of this surface.
    #[must_use]
    pub fn with_aperture(mut self, aperture: Aperture) -> Self {
        self.aperture = aperture;
        self
    }
    /// Declare this surface as aperture stop.
    #[must_use]
    pub fn with_stop(mut self, is_stop: bool) -> Self {
        self.is_stop = is_stop;
        self
    }
    /// Returns the name of this surface.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Returns the coordinate system of this surface.
    #[must_use]
    pub const fn coordinate_system(&self) -> CoordId {
        self.coordinate_system
    }
    /// Returns the shape of this surface.
    #[must_use]
    pub const fn shape(&self) -> &Shape {
        &self.shape
    }
    /// Returns a mutable reference to the shape of this surface.
    pub fn shape_mut(&mut self) -> &mut Shape {
        &mut self.shape
    }
    /// Replace the shape of this surface.
    pub fn set_shape(&mut self, shape: Shape) {
        self.shape = shape;
    }
    /// Returns the aperture of this surface.
    #[must_use]
    pub const fn aperture(&self) -> &Aperture {
        &self.aperture
    }
    /// Returns a mutable reference to the aperture of this surface.
    pub fn aperture_mut(&mut self) -> &mut Aperture {
        &mut self.aperture
    }
    /// Replace the aperture of this surface.
    pub fn set_aperture(&mut self, aperture: Aperture) {
        self.aperture = aperture;
    }
    /// Returns the name of the material behind this surface.
    #[must_use]
    pub fn material(&self) -> &str {
        &self.material
    }
    /// Set the name of the material behind this surface.
    pub fn set_material(&mut self, material: &str) {
        material.clone_into(&mut self.material);
    }
    /// Returns `true` if this surface is the aperture stop.
    #[must_use]
    pub const fn is_stop(&self) -> bool {
        self.is_stop
    }
    /// Declare (or undeclare) this surface as aperture stop.
    pub fn set_stop(&mut self, is_stop: bool) {
        self.is_stop = is_stop;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{millimeter, shape::SurfaceShape};
    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;
    #[test]
    fn new() {
        let s = Surface::new("front", CoordId::ROOT, Shape::flat(), "glass");
        assert_eq!(s.name(), "front");
        assert_eq!(s.coordinate_system(), CoordId::ROOT);
        assert_eq!(s.material(), "glass");
        assert!(!s.is_stop());
        assert_matches!(s.aperture(), Aperture::None);
    }
    #[test]
    fn setters() {
        let mut s = Surface::new("front", CoordId::ROOT, Shape::flat(), "glass")
            .with_aperture(Aperture::circular(millimeter!(9.0)).unwrap())
            .with_stop(true);
        assert!(s.is_stop());
        assert!(s.aperture().contains_meter(0.008, 0.0));
        assert!(!s.aperture().contains_meter(0.0, 0.01));
        s.set_material("air");
        assert_eq!(s.material(), "air");
        s.set_stop(false);
        assert!(!s.is_stop());
        s.set_aperture(Aperture::None);
        assert!(s.aperture().contains_meter(1.0, 1.0));
        s.set_shape(Shape::sphere(millimeter!(100.0)).unwrap());
        assert_abs_diff_eq!(s.shape().central_curvature(), 10.0, epsilon = 1e-12);
    }
    #[test]
    fn serialize() {
        let s = Surface::new("front", CoordId::ROOT, Shape::flat(), "glass").with_stop(true);
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"name\":\"front\""));
        let s: Surface = serde_json::from_str(&json).unwrap();
        assert_eq!(s.name(), "front");
        assert_eq!(s.material(), "glass");
        assert!(s.is_stop());
    }
}
