#![warn(missing_docs)]
//! Pupil and field sampling
//!
//! Position distributions generate the start points of a [`RayBundle`](crate::ray_bundle::RayBundle). The order of
//! the generated points is stable, so that traced rays can be correlated with their sampling coordinates by index.
//!
//! ## Example
//!
//! ```rust
//! use seqtrace::{millimeter, sampling::{MeridionalFan, PositionDistribution}};
//!
//! let fan = MeridionalFan::new(millimeter!(9.0), 11).unwrap();
//! let points = fan.generate();
//! assert_eq!(points.len(), 11);
//! assert_eq!(points[0].y, millimeter!(-9.0));
//! ```
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use uom::si::f64::Length;

mod fan;
mod grid;
mod hexapolar;

pub use fan::{MeridionalFan, SagittalFan};
pub use grid::Grid;
pub use hexapolar::Hexapolar;

/// Trait for the generation of point distributions
pub trait PositionDistribution {
    /// Generate the point distribution.
    ///
    /// This function generates a vector of 3D points (of dimension [`Length`]) in the plane `z = 0`.
    fn generate(&self) -> Vec<Point3<Length>>;
}

/// All available position distributions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum PosDistType {
    /// rectangular grid
    Grid(Grid),
    /// hexapolar rings
    Hexapolar(Hexapolar),
    /// line along y
    MeridionalFan(MeridionalFan),
    /// line along x
    SagittalFan(SagittalFan),
}
impl PosDistType {
    /// Returns a reference to the underlying generator.
    #[must_use]
    pub fn generator(&self) -> &dyn PositionDistribution {
        match self {
            Self::Grid(dist) => dist,
            Self::Hexapolar(dist) => dist,
            Self::MeridionalFan(dist) => dist,
            Self::SagittalFan(dist) => dist,
        }
    }
}
impl Default for PosDistType {
    fn default() -> Self {
        Self::Hexapolar(Hexapolar::default())
    }
}
impl PositionDistribution for PosDistType {
    fn generate(&self) -> Vec<Point3<Length>> {
        self.generator().generate()
    }
}
#[cfg(test)]
mod test {
    use super::*;
    use crate::millimeter;
    #[test]
    fn dispatch() {
        let dist: PosDistType = Hexapolar::new(millimeter!(1.0), 1).unwrap().into();
        assert_eq!(dist.generate().len(), 7);
        let dist: PosDistType = SagittalFan::new(millimeter!(1.0), 3).unwrap().into();
        assert_eq!(dist.generate()[2], millimeter!(1.0, 0.0, 0.0));
    }
}
