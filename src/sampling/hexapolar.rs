//! Circular, hexapolar distribution
use crate::{
    error::{OpmResult, RaytraceError},
    millimeter,
};

use super::PositionDistribution;
use nalgebra::{point, Point3};
use num::Zero;
use serde::{Deserialize, Serialize};
use uom::si::f64::Length;

/// Circular, hexapolar distribution
///
/// A central point plus `nr_of_rings` equidistant rings, ring `i` (starting at 1) carrying `6 i` points.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Copy)]
pub struct Hexapolar {
    nr_of_rings: u8,
    radius: Length,
}
impl Hexapolar {
    /// Create a new [`Hexapolar`] distribution generator.
    ///
    /// If the given radius is zero and / or `nr_of_rings` is zero only the central point at (0,0) is generated.
    ///
    /// # Errors
    ///
    /// This function will return an error if the given `radius` is negative or not finite.
    pub fn new(radius: Length, nr_of_rings: u8) -> OpmResult<Self> {
        if radius.is_sign_negative() || !radius.is_finite() {
            return Err(RaytraceError::Trace(
                "radius must be positive and finite".into(),
            ));
        }
        Ok(Self {
            nr_of_rings,
            radius,
        })
    }
    /// Returns the outer radius.
    #[must_use]
    pub const fn radius(&self) -> Length {
        self.radius
    }
    /// Returns the number of rings.
    #[must_use]
    pub const fn nr_of_rings(&self) -> u8 {
        self.nr_of_rings
    }
}

impl Default for Hexapolar {
    fn default() -> Self {
        Self {
            nr_of_rings: 7,
            radius: millimeter!(5.),
        }
    }
}

impl PositionDistribution for Hexapolar {
    fn generate(&self) -> Vec<Point3<Length>> {
        let mut points: Vec<Point3<Length>> = vec![Point3::origin()];
        if !self.radius.is_zero() {
            let radius_step = self.radius / f64::from(self.nr_of_rings);
            for ring in 0..self.nr_of_rings {
                let radius = f64::from(ring + 1) * radius_step;
                let points_per_ring = 6 * u16::from(ring + 1);
                let angle_step = 2.0 * std::f64::consts::PI / f64::from(points_per_ring);
                for point_nr in 0..points_per_ring {
                    let (sin, cos) = (f64::from(point_nr) * angle_step).sin_cos();
                    points.push(point![radius * cos, radius * sin, Length::zero()]);
                }
            }
        }
        points
    }
}
impl From<Hexapolar> for super::PosDistType {
    fn from(dist: Hexapolar) -> Self {
        Self::Hexapolar(dist)
    }
}
