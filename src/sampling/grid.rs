//! Rectangular, evenly-spaced grid
use super::PositionDistribution;
use crate::{
    error::{OpmResult, RaytraceError},
    millimeter,
    utils::usize_to_f64,
};
use nalgebra::Point3;
use num::Zero;
use serde::{Deserialize, Serialize};
use uom::si::f64::Length;

/// Rectangular, evenly-spaced grid centered at the origin
///
/// Points are generated column by column, i.e. the y index runs fastest.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Copy)]
pub struct Grid {
    nr_of_points: (usize, usize),
    side_length: (Length, Length),
}

impl Grid {
    /// Create a new [`Grid`] distribution generator.
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///  - both side lengths are zero.
    ///  - one `side_length` component is negative or not finite.
    ///  - one `nr_of_points` component is zero.
    pub fn new(side_length: (Length, Length), nr_of_points: (usize, usize)) -> OpmResult<Self> {
        if side_length.0.is_zero() && side_length.1.is_zero() {
            return Err(RaytraceError::Trace(
                "at least one side length must be > zero".into(),
            ));
        }
        if side_length.0.is_sign_negative()
            || !side_length.0.is_finite()
            || side_length.1.is_sign_negative()
            || !side_length.1.is_finite()
        {
            return Err(RaytraceError::Trace(
                "side lengths must be >= zero and finite".into(),
            ));
        }
        if nr_of_points.0.is_zero() || nr_of_points.1.is_zero() {
            return Err(RaytraceError::Trace(
                "both components of nr_of_points must be > 0".into(),
            ));
        }
        Ok(Self {
            nr_of_points,
            side_length,
        })
    }
    /// Returns the number of points along the x and y axes.
    #[must_use]
    pub const fn nr_of_points(&self) -> (usize, usize) {
        self.nr_of_points
    }
    /// Returns the side lengths along the x and y axes.
    #[must_use]
    pub const fn side_length(&self) -> (Length, Length) {
        self.side_length
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            nr_of_points: (11, 11),
            side_length: (millimeter!(5.), millimeter!(5.)),
        }
    }
}

fn spacing(side_length: Length, nr_of_points: usize) -> (Length, Length) {
    if nr_of_points > 1 {
        (
            side_length / usize_to_f64(nr_of_points - 1),
            side_length / 2.0,
        )
    } else {
        (Length::zero(), Length::zero())
    }
}

impl PositionDistribution for Grid {
    fn generate(&self) -> Vec<Point3<Length>> {
        let (distance_x, offset_x) = spacing(self.side_length.0, self.nr_of_points.0);
        let (distance_y, offset_y) = spacing(self.side_length.1, self.nr_of_points.1);
        let mut points: Vec<Point3<Length>> =
            Vec::with_capacity(self.nr_of_points.0 * self.nr_of_points.1);
        for i_x in 0..self.nr_of_points.0 {
            for i_y in 0..self.nr_of_points.1 {
                points.push(Point3::new(
                    usize_to_f64(i_x) * distance_x - offset_x,
                    usize_to_f64(i_y) * distance_y - offset_y,
                    Length::zero(),
                ));
            }
        }
        points
    }
}

impl From<Grid> for super::PosDistType {
    fn from(grid: Grid) -> Self {
        Self::Grid(grid)
    }
}
