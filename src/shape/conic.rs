//! Conic sections: rotationally symmetric conics and conic cylinders.
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use super::SurfaceShape;
use crate::{
    error::{OpmResult, RaytraceError},
    parameters::{check_finite, unknown_parameter, Optimizable},
};

fn check_conic_parameters(curvature: f64, conic: f64) -> OpmResult<()> {
    if !curvature.is_finite() || !conic.is_finite() {
        return Err(RaytraceError::Shape(
            "curvature and conic constant must be finite".into(),
        ));
    }
    Ok(())
}

/// Sag of a conic section for a squared radial coordinate.
///
/// `NaN` outside the domain of the conic.
pub(crate) fn conic_sag(curvature: f64, conic: f64, r2: f64) -> f64 {
    let sqrt_term = ((1.0 + conic) * curvature * curvature).mul_add(-r2, 1.0);
    if sqrt_term < 0.0 {
        return f64::NAN;
    }
    curvature * r2 / (1.0 + sqrt_term.sqrt())
}

/// Square root term `sqrt(1 - (1+k) c² r²)` of the conic sag.
pub(crate) fn conic_sqrt(curvature: f64, conic: f64, r2: f64) -> f64 {
    ((1.0 + conic) * curvature * curvature).mul_add(-r2, 1.0).sqrt()
}

/// Closed form intersection of a line with the conic `c (x² + y² + (1+k) z²) - 2 z = 0`.
///
/// `use_x` switches the x terms off for cylinders. The root on the vertex branch of the conic is selected, i.e. the
/// one that turns into the plane intersection for vanishing curvature.
pub(crate) fn conic_line_parameter(
    curvature: f64,
    conic: f64,
    use_x: bool,
    origin: &Point3<f64>,
    direction: &Vector3<f64>,
) -> Option<f64> {
    let wx = if use_x { 1.0 } else { 0.0 };
    let (o, d) = (origin, direction);
    let f = curvature.mul_add(
        -(wx * d.x).mul_add(o.x, d.y * o.y) - (1.0 + conic) * d.z * o.z,
        d.z,
    );
    let g = curvature * (wx * o.x).mul_add(o.x, o.y * o.y) + curvature * (1.0 + conic) * o.z * o.z
        - 2.0 * o.z;
    let h = -curvature * ((1.0 + conic) * d.z).mul_add(d.z, (wx * d.x).mul_add(d.x, d.y * d.y));
    let square = f.mul_add(f, h * g);
    if square < 0.0 {
        return None;
    }
    let t = g / f.signum().mul_add(square.sqrt(), f);
    t.is_finite().then_some(t)
}

/// A rotationally symmetric conic section.
///
/// The sag is `z = c r² / (1 + sqrt(1 - (1+k) c² r²))` with curvature `c` and conic constant `k`:
///
///  - `k < -1`: hyperboloid
///  - `k = -1`: paraboloid
///  - `-1 < k < 0`: prolate ellipsoid
///  - `k = 0`: sphere
///  - `k > 0`: oblate ellipsoid
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConicShape {
    curvature: f64,
    conic: f64,
}

impl ConicShape {
    /// Create a new [`ConicShape`].
    ///
    /// # Errors
    /// This function returns an error if curvature or conic constant are not finite.
    pub fn new(curvature: f64, conic: f64) -> OpmResult<Self> {
        check_conic_parameters(curvature, conic)?;
        Ok(Self { curvature, conic })
    }
    /// Returns the curvature (1/m).
    #[must_use]
    pub const fn curvature(&self) -> f64 {
        self.curvature
    }
    /// Returns the conic constant.
    #[must_use]
    pub const fn conic(&self) -> f64 {
        self.conic
    }
    pub(crate) fn closed_form_intersection(
        &self,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
    ) -> Option<f64> {
        conic_line_parameter(self.curvature, self.conic, true, origin, direction)
    }
}

impl SurfaceShape for ConicShape {
    fn sag(&self, x: f64, y: f64) -> f64 {
        conic_sag(self.curvature, self.conic, x.mul_add(x, y * y))
    }
    fn gradient(&self, x: f64, y: f64) -> Vector3<f64> {
        let sq = conic_sqrt(self.curvature, self.conic, x.mul_add(x, y * y));
        Vector3::new(-self.curvature * x / sq, -self.curvature * y / sq, 1.0)
    }
    fn central_curvature(&self) -> f64 {
        self.curvature
    }
    fn kind(&self) -> &'static str {
        "conic"
    }
}

impl Optimizable for ConicShape {
    fn parameter_names(&self) -> Vec<String> {
        vec!["curvature".into(), "conic".into()]
    }
    fn get_parameter(&self, name: &str) -> OpmResult<f64> {
        match name {
            "curvature" => Ok(self.curvature),
            "conic" => Ok(self.conic),
            _ => Err(unknown_parameter(name)),
        }
    }
    fn set_parameter(&mut self, name: &str, value: f64) -> OpmResult<()> {
        check_finite(name, value)?;
        match name {
            "curvature" => self.curvature = value,
            "conic" => self.conic = value,
            _ => return Err(unknown_parameter(name)),
        }
        Ok(())
    }
}

/// A cylindrical surface with a conic cross section in the y-z plane. The surface is straight along x.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CylinderShape {
    curvature: f64,
    conic: f64,
}

impl CylinderShape {
    /// Create a new [`CylinderShape`].
    ///
    /// # Errors
    /// This function returns an error if curvature or conic constant are not finite.
    pub fn new(curvature: f64, conic: f64) -> OpmResult<Self> {
        check_conic_parameters(curvature, conic)?;
        Ok(Self { curvature, conic })
    }
    pub(crate) fn closed_form_intersection(
        &self,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
    ) -> Option<f64> {
        conic_line_parameter(self.curvature, self.conic, false, origin, direction)
    }
}

impl SurfaceShape for CylinderShape {
    fn sag(&self, _x: f64, y: f64) -> f64 {
        conic_sag(self.curvature, self.conic, y * y)
    }
    fn gradient(&self, _x: f64, y: f64) -> Vector3<f64> {
        let sq = conic_sqrt(self.curvature, self.conic, y * y);
        Vector3::new(0.0, -self.curvature * y / sq, 1.0)
    }
    fn central_curvature(&self) -> f64 {
        self.curvature
    }
    fn kind(&self) -> &'static str {
        "cylinder"
    }
}

impl Optimizable for CylinderShape {
    fn parameter_names(&self) -> Vec<String> {
        vec!["curvature".into(), "conic".into()]
    }
    fn get_parameter(&self, name: &str) -> OpmResult<f64> {
        match name {
            "curvature" => Ok(self.curvature),
            "conic" => Ok(self.conic),
            _ => Err(unknown_parameter(name)),
        }
    }
    fn set_parameter(&mut self, name: &str, value: f64) -> OpmResult<()> {
        check_finite(name, value)?;
        match name {
            "curvature" => self.curvature = value,
            "conic" => self.conic = value,
            _ => return Err(unknown_parameter(name)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    #[test]
    fn new() {
        assert!(ConicShape::new(f64::NAN, 0.0).is_err());
        assert!(ConicShape::new(1.0, f64::INFINITY).is_err());
        assert!(CylinderShape::new(f64::NAN, 0.0).is_err());
        let c = ConicShape::new(2.0, -1.0).unwrap();
        assert_eq!(c.curvature(), 2.0);
        assert_eq!(c.conic(), -1.0);
    }
    #[test]
    fn parabola_sag() {
        // k = -1: z = c r² / 2
        let c = ConicShape::new(2.0, -1.0).unwrap();
        assert_abs_diff_eq!(c.sag(0.3, 0.4), 0.25, epsilon = 1e-15);
    }
    #[test]
    fn sphere_sag_outside_domain() {
        let c = ConicShape::new(10.0, 0.0).unwrap();
        assert!(c.sag(0.2, 0.0).is_nan());
        assert_abs_diff_eq!(c.sag(0.06, 0.0), 0.02, epsilon = 1e-15);
    }
    #[test]
    fn closed_form_matches_sag() {
        let c = ConicShape::new(8.0, -0.3).unwrap();
        let o = Point3::new(0.01, -0.02, -0.1);
        let d = Vector3::new(0.1, 0.05, 1.0).normalize();
        let t = c.closed_form_intersection(&o, &d).unwrap();
        let p = o + t * d;
        assert_abs_diff_eq!(p.z, c.sag(p.x, p.y), epsilon = 1e-15);
    }
    #[test]
    fn cylinder() {
        let c = CylinderShape::new(10.0, 0.0).unwrap();
        assert_abs_diff_eq!(c.sag(0.05, 0.0), 0.0);
        assert!(c.sag(0.0, 0.01) > 0.0);
        assert_abs_diff_eq!(c.gradient(0.05, 0.0), Vector3::z());
        let o = Point3::new(0.03, 0.01, -0.1);
        let d = Vector3::z();
        let t = c.closed_form_intersection(&o, &d).unwrap();
        let p = o + t * d;
        assert_abs_diff_eq!(p.z, c.sag(p.x, p.y), epsilon = 1e-15);
        assert_eq!(c.kind(), "cylinder");
    }
    #[test]
    fn parameters() {
        let mut c = CylinderShape::default();
        c.set_parameter("conic", -1.0).unwrap();
        assert_eq!(c.get_parameter("conic").unwrap(), -1.0);
        assert!(c.set_parameter("conic", f64::NAN).is_err());
        assert!(c.set_parameter("A2", 1.0).is_err());
    }
}
