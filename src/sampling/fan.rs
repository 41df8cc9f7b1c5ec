//! Ray fans along the y (meridional) and x (sagittal) axis
use super::PositionDistribution;
use crate::{
    error::{OpmResult, RaytraceError},
    utils::usize_to_f64,
};
use nalgebra::Point3;
use num::Zero;
use serde::{Deserialize, Serialize};
use uom::si::f64::Length;

fn check_fan(radius: Length, nr_of_points: usize) -> OpmResult<()> {
    if radius.is_sign_negative() || !radius.is_finite() {
        return Err(RaytraceError::Trace(
            "radius must be positive and finite".into(),
        ));
    }
    if nr_of_points == 0 {
        return Err(RaytraceError::Trace("nr_of_points must be > 0".into()));
    }
    Ok(())
}

/// Equidistant coordinates from `-radius` to `radius` (end points exact). A single point lies at the center.
fn fan_coordinates(radius: Length, nr_of_points: usize) -> impl Iterator<Item = Length> {
    let intervals = usize_to_f64(nr_of_points.saturating_sub(1));
    (0..nr_of_points).map(move |i| {
        if nr_of_points > 1 {
            radius * (2.0 * usize_to_f64(i) / intervals - 1.0)
        } else {
            Length::zero()
        }
    })
}

/// Points evenly distributed on the y axis (meridional plane)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeridionalFan {
    radius: Length,
    nr_of_points: usize,
}
impl MeridionalFan {
    /// Create a new [`MeridionalFan`] from `-radius` to `+radius`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the radius is negative or not finite or `nr_of_points` is zero.
    pub fn new(radius: Length, nr_of_points: usize) -> OpmResult<Self> {
        check_fan(radius, nr_of_points)?;
        Ok(Self {
            radius,
            nr_of_points,
        })
    }
}
impl PositionDistribution for MeridionalFan {
    fn generate(&self) -> Vec<Point3<Length>> {
        fan_coordinates(self.radius, self.nr_of_points)
            .map(|y| Point3::new(Length::zero(), y, Length::zero()))
            .collect()
    }
}
impl From<MeridionalFan> for super::PosDistType {
    fn from(dist: MeridionalFan) -> Self {
        Self::MeridionalFan(dist)
    }
}

/// Points evenly distributed on the x axis (sagittal plane)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SagittalFan {
    radius: Length,
    nr_of_points: usize,
}
impl SagittalFan {
    /// Create a new [`SagittalFan`] from `-radius` to `+radius`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the radius is negative or not finite or `nr_of_points` is zero.
    pub fn new(radius: Length, nr_of_points: usize) -> OpmResult<Self> {
        check_fan(radius, nr_of_points)?;
        Ok(Self {
            radius,
            nr_of_points,
        })
    }
}
impl PositionDistribution for SagittalFan {
    fn generate(&self) -> Vec<Point3<Length>> {
        fan_coordinates(self.radius, self.nr_of_points)
            .map(|x| Point3::new(x, Length::zero(), Length::zero()))
            .collect()
    }
}
impl From<SagittalFan> for super::PosDistType {
    fn from(dist: SagittalFan) -> Self {
        Self::SagittalFan(dist)
    }
}
#[cfg(test)]
mod test {
    use super::*;
    use crate::millimeter;
    use approx::assert_abs_diff_eq;
    #[test]
    fn new_wrong() {
        assert!(MeridionalFan::new(millimeter!(-1.0), 3).is_err());
        assert!(MeridionalFan::new(millimeter!(1.0), 0).is_err());
        assert!(SagittalFan::new(millimeter!(f64::NAN), 3).is_err());
    }
    #[test]
    fn meridional() {
        let points = MeridionalFan::new(millimeter!(9.0), 11).unwrap().generate();
        assert_eq!(points.len(), 11);
        assert_abs_diff_eq!(points[0].y.value, -0.009);
        assert_abs_diff_eq!(points[5].y.value, 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(points[10].y.value, 0.009, epsilon = 1e-15);
        assert!(points.iter().all(|p| p.x.is_zero()));
    }
    #[test]
    fn single_point() {
        let points = SagittalFan::new(millimeter!(9.0), 1).unwrap().generate();
        assert_eq!(points, vec![millimeter!(0.0, 0.0, 0.0)]);
    }
}
