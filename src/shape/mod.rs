#![warn(missing_docs)]
//! Surface shapes
//!
//! A shape describes the geometry of a surface in the local frame of its coordinate system as an explicit sag
//! function `z = f(x, y)` with its vertex at the origin. Besides the sag, every shape provides the gradient of the
//! implicit function `F(x, y, z) = z - f(x, y)`, i.e. `(-∂f/∂x, -∂f/∂y, 1)`, from which the surface normal is derived.
//!
//! All lengths are plain `f64` values in meters, curvatures in 1/m.
mod conic;
mod freeform;
mod polynomial;

pub use conic::{ConicShape, CylinderShape};
pub use freeform::{FreeformShape, GradientFn, SagFn};
pub use polynomial::{AsphereShape, BiconicShape, XyPolynomialShape, XyTerm};

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use uom::si::f64::Length;

use crate::{error::OpmResult, error::RaytraceError, parameters::Optimizable};

/// Step width (in meters) for numerically derived gradients and curvatures.
const FD_STEP: f64 = 1e-7;

/// Smallest fraction of a Newton step tried when the full step leaves the domain of a shape.
const MIN_DAMPING: f64 = 1e-6;

/// Common interface of all surface shapes.
pub trait SurfaceShape {
    /// Sag `z = f(x, y)` of the surface.
    ///
    /// Returns `NaN` if the surface is not defined at the given position (e.g. outside a sphere).
    fn sag(&self, x: f64, y: f64) -> f64;
    /// Gradient of `F(x, y, z) = z - f(x, y)` at the surface point above `(x, y)`.
    fn gradient(&self, x: f64, y: f64) -> Vector3<f64>;
    /// Unit surface normal pointing towards `+z`.
    fn normal(&self, x: f64, y: f64) -> Vector3<f64> {
        self.gradient(x, y).normalize()
    }
    /// Curvature at the vertex.
    fn central_curvature(&self) -> f64;
    /// Name of the shape type.
    fn kind(&self) -> &'static str;
}

/// Central difference approximation of the gradient of `z - f(x, y)`.
pub(crate) fn numerical_gradient(sag: impl Fn(f64, f64) -> f64, x: f64, y: f64) -> Vector3<f64> {
    let fx = (sag(x + FD_STEP, y) - sag(x - FD_STEP, y)) / (2.0 * FD_STEP);
    let fy = (sag(x, y + FD_STEP) - sag(x, y - FD_STEP)) / (2.0 * FD_STEP);
    Vector3::new(-fx, -fy, 1.0)
}

/// Mean of the second derivatives of the sag at the vertex.
pub(crate) fn numerical_central_curvature(sag: impl Fn(f64, f64) -> f64) -> f64 {
    let f0 = sag(0.0, 0.0);
    let fxx = (sag(FD_STEP, 0.0) - 2.0 * f0 + sag(-FD_STEP, 0.0)) / (FD_STEP * FD_STEP);
    let fyy = (sag(0.0, FD_STEP) - 2.0 * f0 + sag(0.0, -FD_STEP)) / (FD_STEP * FD_STEP);
    0.5 * (fxx + fyy)
}

/// The geometry of a surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Shape {
    /// rotationally symmetric conic section (flat, sphere, parabola, ...)
    Conic(ConicShape),
    /// conic with additional even polynomial terms
    Asphere(AsphereShape),
    /// conic section in the y direction only
    Cylinder(CylinderShape),
    /// different conic sections in x and y direction
    Biconic(BiconicShape),
    /// polynomial in x and y
    XyPolynomial(XyPolynomialShape),
    /// sag given by an external function
    #[serde(skip)]
    Freeform(FreeformShape),
}

impl Default for Shape {
    fn default() -> Self {
        Self::flat()
    }
}

impl Shape {
    /// A flat surface.
    #[must_use]
    pub fn flat() -> Self {
        Self::Conic(ConicShape::default())
    }
    /// A spherical surface with the given radius of curvature.
    ///
    /// An infinite radius yields a flat surface. A positive radius denotes a surface whose center of curvature lies
    /// on the `+z` side of the vertex.
    ///
    /// # Errors
    /// This function returns an error if the radius is zero or `NaN`.
    pub fn sphere(radius: Length) -> OpmResult<Self> {
        Self::conic(radius, 0.0)
    }
    /// A conic surface with the given radius of curvature and conic constant.
    ///
    /// # Errors
    /// This function returns an error if the radius is zero or `NaN` or the conic constant is not finite.
    pub fn conic(radius: Length, conic_constant: f64) -> OpmResult<Self> {
        Ok(Self::Conic(ConicShape::new(
            curvature_from_radius(radius)?,
            conic_constant,
        )?))
    }
    fn as_surface_shape(&self) -> &dyn SurfaceShape {
        match self {
            Self::Conic(s) => s,
            Self::Asphere(s) => s,
            Self::Cylinder(s) => s,
            Self::Biconic(s) => s,
            Self::XyPolynomial(s) => s,
            Self::Freeform(s) => s,
        }
    }
    fn as_optimizable_mut(&mut self) -> &mut dyn Optimizable {
        match self {
            Self::Conic(s) => s,
            Self::Asphere(s) => s,
            Self::Cylinder(s) => s,
            Self::Biconic(s) => s,
            Self::XyPolynomial(s) => s,
            Self::Freeform(s) => s,
        }
    }
    fn as_optimizable(&self) -> &dyn Optimizable {
        match self {
            Self::Conic(s) => s,
            Self::Asphere(s) => s,
            Self::Cylinder(s) => s,
            Self::Biconic(s) => s,
            Self::XyPolynomial(s) => s,
            Self::Freeform(s) => s,
        }
    }
    /// Intersect a straight line with this shape.
    ///
    /// See [`intersect_line`].
    ///
    /// # Errors
    /// This function returns an [`IntersectionFailure`] if no intersection is found.
    pub fn intersect_line(
        &self,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        tolerance: f64,
        max_iterations: usize,
    ) -> Result<LineHit, IntersectionFailure> {
        intersect_line(self, origin, direction, tolerance, max_iterations)
    }
}

impl SurfaceShape for Shape {
    fn sag(&self, x: f64, y: f64) -> f64 {
        self.as_surface_shape().sag(x, y)
    }
    fn gradient(&self, x: f64, y: f64) -> Vector3<f64> {
        self.as_surface_shape().gradient(x, y)
    }
    fn normal(&self, x: f64, y: f64) -> Vector3<f64> {
        self.as_surface_shape().normal(x, y)
    }
    fn central_curvature(&self) -> f64 {
        self.as_surface_shape().central_curvature()
    }
    fn kind(&self) -> &'static str {
        self.as_surface_shape().kind()
    }
}

impl Optimizable for Shape {
    fn parameter_names(&self) -> Vec<String> {
        self.as_optimizable().parameter_names()
    }
    fn get_parameter(&self, name: &str) -> OpmResult<f64> {
        self.as_optimizable().get_parameter(name)
    }
    fn set_parameter(&mut self, name: &str, value: f64) -> OpmResult<()> {
        self.as_optimizable_mut().set_parameter(name, value)
    }
}

/// Convert a radius of curvature into a curvature (1/m). An infinite radius denotes a flat surface.
///
/// # Errors
/// This function returns an error if the radius is zero or `NaN`.
pub fn curvature_from_radius(radius: Length) -> OpmResult<f64> {
    if radius.value.is_nan() || radius.value == 0.0 {
        return Err(RaytraceError::Shape(
            "radius of curvature must be != 0.0 and not NaN".into(),
        ));
    }
    if radius.value.is_infinite() {
        Ok(0.0)
    } else {
        Ok(1.0 / radius.value)
    }
}

/// Result of a successful line / surface intersection (local frame, meters).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineHit {
    /// line parameter of the intersection (`point = origin + t * direction`)
    pub t: f64,
    /// intersection point
    pub point: Point3<f64>,
    /// unit surface normal at the intersection point (pointing towards `+z`)
    pub normal: Vector3<f64>,
}

/// Reasons for a failed line / surface intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntersectionFailure {
    /// the line misses the surface (e.g. passes beside a strongly curved sphere)
    NoIntersection,
    /// the root finder did not reach the tolerance within the maximum number of iterations
    NonConvergent,
}

/// Intersect the line `origin + t * direction` with a shape.
///
/// The intersection is found by Newton iteration on `g(t) = z(t) - f(x(t), y(t))`. Conics and cylinders are seeded
/// with the closed-form root of the quadratic line / conic equation, aspheres with the root on their base conic and
/// biconics with the root on the biconic without polynomial terms, so that the iteration mostly polishes the
/// result. Other shapes (or seeds outside the domain of the shape) start at the intersection with the vertex plane
/// `z = 0`. A Newton step leaving the domain of the shape is halved until the sag is defined again.
///
/// # Errors
/// This function returns an [`IntersectionFailure`] if the line does not hit the surface or the iteration does not
/// reach `|g(t)| <= tolerance` within `max_iterations` steps.
pub fn intersect_line(
    shape: &Shape,
    origin: &Point3<f64>,
    direction: &Vector3<f64>,
    tolerance: f64,
    max_iterations: usize,
) -> Result<LineHit, IntersectionFailure> {
    let plane = if direction.z.abs() > f64::EPSILON {
        -origin.z / direction.z
    } else {
        0.0
    };
    let seed = match shape {
        Shape::Conic(c) => c.closed_form_intersection(origin, direction),
        Shape::Cylinder(c) => c.closed_form_intersection(origin, direction),
        Shape::Asphere(a) => a.base_intersection(origin, direction),
        Shape::Biconic(b) => b.base_intersection(origin, direction, plane),
        Shape::XyPolynomial(_) | Shape::Freeform(_) => None,
    };
    let residual = |t: f64| {
        let p = origin + t * direction;
        p.z - shape.sag(p.x, p.y)
    };
    let Some(mut t) = seed
        .into_iter()
        .chain(std::iter::once(plane))
        .find(|t| residual(*t).is_finite())
    else {
        return Err(IntersectionFailure::NoIntersection);
    };
    let mut g = residual(t);
    let mut iterations = 0;
    while g.abs() > tolerance {
        if iterations >= max_iterations {
            return Err(IntersectionFailure::NonConvergent);
        }
        let p = origin + t * direction;
        let derivative = shape.gradient(p.x, p.y).dot(direction);
        if !derivative.is_normal() {
            return Err(IntersectionFailure::NonConvergent);
        }
        let step = g / derivative;
        let mut damping = 1.0;
        let mut next = residual(t - step);
        while !next.is_finite() && damping > MIN_DAMPING {
            damping *= 0.5;
            next = residual(damping.mul_add(-step, t));
        }
        if !next.is_finite() {
            return Err(IntersectionFailure::NoIntersection);
        }
        t = damping.mul_add(-step, t);
        g = next;
        iterations += 1;
    }
    let point = origin + t * direction;
    let normal = shape.normal(point.x, point.y);
    if normal.iter().any(|c| !c.is_finite()) {
        return Err(IntersectionFailure::NoIntersection);
    }
    Ok(LineHit { t, point, normal })
}
