#![warn(missing_docs)]
//! Optical media and their propagation laws
//!
//! A [`Material`] describes the medium behind a surface. It knows how a ray travelling inside it reaches the next
//! surface ([`Material::intersect`]) and how the wave vector changes when a ray enters it ([`Material::propagate`]).
//!
//! Wave vectors are given in units of the vacuum wave number `k0 = 2π/λ`, i.e. `|k| = n` in isotropic media.
//! All vectors and points handed to the propagation laws are expressed in the root frame (meters).
mod anisotropic;
mod grin;
mod isotropic;

pub use anisotropic::{AnisotropicMaterial, WaveBranch};
pub use grin::{
    FnGrin, GrinConfig, GrinIndex, GrinMaterial, GrinProfile, IndexFn, IndexGradientFn,
    ParabolicGrin,
};
pub use isotropic::IsotropicMaterial;

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use uom::si::f64::Length;

use crate::{
    error::OpmResult,
    parameters::Optimizable,
    propagator::TraceConfig,
    ray_bundle::{Interaction, RayStatus},
    refractive_index::RefractiveIndexType,
    shape::{IntersectionFailure, Shape},
    utils::geom_transformation::Isometry,
};

/// State of a single ray in the root frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayState {
    /// position (meters)
    pub position: Point3<f64>,
    /// unit direction of energy propagation
    pub direction: Vector3<f64>,
    /// wave vector in units of the vacuum wave number
    pub wave_vector: Vector3<f64>,
    /// vacuum wavelength
    pub wavelength: Length,
}

/// A ray that reached a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// ray state at the intersection point (root frame)
    pub ray: RayState,
    /// intersection point in the local frame of the surface (meters)
    pub local_point: Point3<f64>,
    /// unit surface normal in the root frame, pointing to the `+z` side of the surface
    pub normal: Vector3<f64>,
    /// optical path length (meters) accumulated between the start point and the intersection
    pub optical_path: f64,
}

/// New wave of a ray after a surface interaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deflection {
    /// wave vector in units of the vacuum wave number
    pub wave_vector: Vector3<f64>,
    /// unit direction of energy propagation
    pub direction: Vector3<f64>,
    /// kind of interaction
    pub interaction: Interaction,
}

/// Behaviour of a surface.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropagationMode {
    /// refraction into the material behind the surface (total internal reflection if impossible)
    #[default]
    Refract,
    /// reflection back into the current medium
    Mirror,
}

/// Vector form of Snell's law.
///
/// `normal` must be a unit vector pointing against the direction of propagation. Returns the wave vector in the
/// medium with index `n2` or `None` in case of total internal reflection.
pub(crate) fn refract_isotropic(
    wave_vector: &Vector3<f64>,
    normal: &Vector3<f64>,
    n2: f64,
) -> Option<Vector3<f64>> {
    // s2 = mu * [ n x ( -n x s1) ] - n * sqrt(1 - mu^2 * (n x s1) dot (n x s1)),  mu = n1 / n2
    let n1 = wave_vector.norm();
    let mu = n1 / n2;
    let s1 = wave_vector / n1;
    let n = normal;
    let dis = (mu * mu).mul_add(-n.cross(&s1).dot(&n.cross(&s1)), 1.0);
    if dis.is_sign_negative() {
        return None;
    }
    let s2 = mu * (n.cross(&(-1.0 * n.cross(&s1)))) - n * dis.sqrt();
    Some(n2 * s2)
}

/// Mirror reflection of a vector about a plane with the given unit normal.
pub(crate) fn reflect(v: &Vector3<f64>, normal: &Vector3<f64>) -> Vector3<f64> {
    v - 2.0 * v.dot(normal) * normal
}

impl From<IntersectionFailure> for RayStatus {
    fn from(failure: IntersectionFailure) -> Self {
        match failure {
            IntersectionFailure::NoIntersection => Self::NoIntersection,
            IntersectionFailure::NonConvergent => Self::NonConvergent,
        }
    }
}

/// Intersection of a straight ray segment with a surface.
pub(crate) fn straight_intersect(
    ray: &RayState,
    shape: &Shape,
    frame: &Isometry,
    config: &TraceConfig,
) -> Result<Hit, RayStatus> {
    let origin = frame.inverse_transform_point_f64(&ray.position);
    let direction = frame.inverse_transform_vector_f64(&ray.direction);
    let hit = shape
        .intersect_line(
            &origin,
            &direction,
            config.tolerance().value,
            config.max_iterations(),
        )
        .map_err(RayStatus::from)?;
    Ok(Hit {
        ray: RayState {
            position: frame.transform_point_f64(&hit.point),
            ..*ray
        },
        local_point: hit.point,
        normal: frame.transform_vector_f64(&hit.normal),
        optical_path: hit.t * ray.wave_vector.dot(&ray.direction),
    })
}

/// Optical medium.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Material {
    /// homogeneous isotropic medium
    Isotropic(IsotropicMaterial),
    /// homogeneous anisotropic (birefringent) medium
    Anisotropic(AnisotropicMaterial),
    /// inhomogeneous isotropic medium (graded index)
    Grin(GrinMaterial),
}

impl Default for Material {
    fn default() -> Self {
        Self::Isotropic(IsotropicMaterial::default())
    }
}

impl From<IsotropicMaterial> for Material {
    fn from(material: IsotropicMaterial) -> Self {
        Self::Isotropic(material)
    }
}
impl From<AnisotropicMaterial> for Material {
    fn from(material: AnisotropicMaterial) -> Self {
        Self::Anisotropic(material)
    }
}
impl From<GrinMaterial> for Material {
    fn from(material: GrinMaterial) -> Self {
        Self::Grin(material)
    }
}
impl From<RefractiveIndexType> for Material {
    fn from(index: RefractiveIndexType) -> Self {
        Self::Isotropic(IsotropicMaterial::new(index))
    }
}

impl Material {
    /// Vacuum (`n = 1`).
    #[must_use]
    pub fn vacuum() -> Self {
        Self::default()
    }
    /// Homogeneous isotropic medium with a wavelength independent index.
    ///
    /// # Errors
    /// This function returns an error if the index is < 1.0 or not finite.
    pub fn constant(refractive_index: f64) -> OpmResult<Self> {
        Ok(Self::Isotropic(IsotropicMaterial::constant(
            refractive_index,
        )?))
    }
    /// Name of the material kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Isotropic(_) => "isotropic",
            Self::Anisotropic(_) => "anisotropic",
            Self::Grin(_) => "grin",
        }
    }
    /// Scalar refractive index at the given wavelength and position (root frame, meters).
    ///
    /// For anisotropic media the mean index `sqrt(tr(ε) / 3)` is returned.
    ///
    /// # Errors
    /// This function returns an error if the index model cannot be evaluated for the given wavelength.
    pub fn index_at(&self, wavelength: Length, position: &Point3<f64>) -> OpmResult<f64> {
        match self {
            Self::Isotropic(m) => m.index(wavelength),
            Self::Anisotropic(m) => Ok(m.mean_index()),
            Self::Grin(m) => m.index_at(position),
        }
    }
    /// Check that this material can be evaluated at the given wavelength.
    ///
    /// # Errors
    /// This function returns an error if the index model cannot be evaluated for the given wavelength.
    pub fn check_wavelength(&self, wavelength: Length) -> OpmResult<()> {
        match self {
            Self::Isotropic(m) => m.index(wavelength).map(|_| ()),
            Self::Anisotropic(_) | Self::Grin(_) => Ok(()),
        }
    }
    /// Wave vector and energy direction of a ray launched inside this medium with the given wave normal.
    ///
    /// # Errors
    /// This function returns a [`RayStatus`] if no wave with the given wave normal can propagate.
    pub fn launch(
        &self,
        wave_normal: &Vector3<f64>,
        wavelength: Length,
        position: &Point3<f64>,
    ) -> Result<(Vector3<f64>, Vector3<f64>), RayStatus> {
        let u = wave_normal.normalize();
        match self {
            Self::Anisotropic(m) => m.wave_along(&u).ok_or(RayStatus::NoAdmissibleWave),
            _ => {
                let n = self
                    .index_at(wavelength, position)
                    .map_err(|_| RayStatus::NoAdmissibleWave)?;
                Ok((n * u, u))
            }
        }
    }
    /// Move a ray travelling inside this medium onto the given surface.
    ///
    /// `frame` maps the local frame of the surface into the root frame. Homogeneous media propagate along a straight
    /// line. Graded-index media integrate the ray equation.
    ///
    /// # Errors
    /// This function returns a [`RayStatus`] describing why the ray does not reach the surface.
    pub fn intersect(
        &self,
        ray: &RayState,
        shape: &Shape,
        frame: &Isometry,
        config: &TraceConfig,
    ) -> Result<Hit, RayStatus> {
        match self {
            Self::Isotropic(_) | Self::Anisotropic(_) => {
                straight_intersect(ray, shape, frame, config)
            }
            Self::Grin(m) => m.intersect(ray, shape, frame, config),
        }
    }
    /// Compute the new wave of a ray at a surface.
    ///
    /// `self` is the medium behind the surface, `current` the medium the ray is travelling in. In
    /// [`PropagationMode::Refract`] the ray enters `self`. If no refracted wave exists, the ray is totally reflected
    /// back into `current`. In [`PropagationMode::Mirror`] the ray is always reflected into `current`.
    ///
    /// # Errors
    /// This function returns a [`RayStatus`] if neither a refracted nor a reflected wave exists.
    pub fn propagate(
        &self,
        current: &Self,
        ray: &RayState,
        normal: &Vector3<f64>,
        mode: PropagationMode,
    ) -> Result<Deflection, RayStatus> {
        let facing = if normal.dot(&ray.direction) > 0.0 {
            -normal
        } else {
            *normal
        };
        if mode == PropagationMode::Mirror {
            let (wave_vector, direction) = current.reflect_inside(ray, &facing)?;
            return Ok(Deflection {
                wave_vector,
                direction,
                interaction: Interaction::Reflection,
            });
        }
        if let Some((wave_vector, direction)) = self.refract_into(ray, &facing)? {
            return Ok(Deflection {
                wave_vector,
                direction,
                interaction: Interaction::Refraction,
            });
        }
        let (wave_vector, direction) = current.reflect_inside(ray, &facing)?;
        Ok(Deflection {
            wave_vector,
            direction,
            interaction: Interaction::TotalInternalReflection,
        })
    }
    fn refract_into(
        &self,
        ray: &RayState,
        facing: &Vector3<f64>,
    ) -> Result<Option<(Vector3<f64>, Vector3<f64>)>, RayStatus> {
        if let Self::Anisotropic(m) = self {
            return Ok(m.refract(&ray.wave_vector, facing));
        }
        let n2 = self
            .index_at(ray.wavelength, &ray.position)
            .map_err(|_| RayStatus::NoAdmissibleWave)?;
        Ok(refract_isotropic(&ray.wave_vector, facing, n2).map(|k| (k, k.normalize())))
    }
    fn reflect_inside(
        &self,
        ray: &RayState,
        facing: &Vector3<f64>,
    ) -> Result<(Vector3<f64>, Vector3<f64>), RayStatus> {
        match self {
            Self::Anisotropic(m) => m
                .reflect(&ray.wave_vector, facing)
                .ok_or(RayStatus::NoAdmissibleWave),
            _ => Ok((
                reflect(&ray.wave_vector, facing),
                reflect(&ray.direction, facing),
            )),
        }
    }
    fn as_optimizable(&self) -> &dyn Optimizable {
        match self {
            Self::Isotropic(m) => m,
            Self::Anisotropic(m) => m,
            Self::Grin(m) => m,
        }
    }
    fn as_optimizable_mut(&mut self) -> &mut dyn Optimizable {
        match self {
            Self::Isotropic(m) => m,
            Self::Anisotropic(m) => m,
            Self::Grin(m) => m,
        }
    }
}

impl Optimizable for Material {
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

#[cfg(test)]
mod test {
    use super::*;
    use crate::nanometer;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use assert_matches::assert_matches;

    fn ray(direction: Vector3<f64>, n: f64) -> RayState {
        let direction = direction.normalize();
        RayState {
            position: Point3::origin(),
            direction,
            wave_vector: n * direction,
            wavelength: nanometer!(587.6),
        }
    }
    fn sin_to_normal(v: &Vector3<f64>) -> f64 {
        v.normalize().cross(&Vector3::z()).norm()
    }
    #[test]
    fn snell() {
        let glass = Material::constant(1.5).unwrap();
        let air = Material::vacuum();
        let incoming = ray(Vector3::new(0.0, 0.5, 1.0), 1.0);
        let d = glass
            .propagate(&air, &incoming, &Vector3::z(), PropagationMode::Refract)
            .unwrap();
        assert_eq!(d.interaction, Interaction::Refraction);
        assert_relative_eq!(
            sin_to_normal(&incoming.direction),
            1.5 * sin_to_normal(&d.direction),
            max_relative = 1e-14
        );
        assert_relative_eq!(d.wave_vector.norm(), 1.5, max_relative = 1e-14);
        // coplanar with incoming direction and normal
        assert_abs_diff_eq!(
            d.direction.dot(&incoming.direction.cross(&Vector3::z())),
            0.0,
            epsilon = 1e-15
        );
        assert!(d.direction.z > 0.0);
    }
    #[test]
    fn same_index_is_no_op() {
        let glass = Material::constant(1.5).unwrap();
        let incoming = ray(Vector3::new(0.1, -0.3, 1.0), 1.5);
        let d = glass
            .propagate(
                &glass,
                &incoming,
                &Vector3::new(0.2, 0.1, 1.0).normalize(),
                PropagationMode::Refract,
            )
            .unwrap();
        assert_abs_diff_eq!(d.direction, incoming.direction, epsilon = 1e-15);
    }
    #[test]
    fn normal_orientation_does_not_matter() {
        let glass = Material::constant(1.5).unwrap();
        let air = Material::vacuum();
        let incoming = ray(Vector3::new(0.3, 0.0, 1.0), 1.0);
        let a = glass
            .propagate(&air, &incoming, &Vector3::z(), PropagationMode::Refract)
            .unwrap();
        let b = glass
            .propagate(&air, &incoming, &-Vector3::z(), PropagationMode::Refract)
            .unwrap();
        assert_abs_diff_eq!(a.wave_vector, b.wave_vector, epsilon = 1e-15);
    }
    #[test]
    fn total_internal_reflection() {
        let glass = Material::constant(1.5).unwrap();
        let air = Material::vacuum();
        // 60° > critical angle of 41.8°
        let incoming = ray(Vector3::new(0.0, 3f64.sqrt(), 1.0), 1.5);
        let d = air
            .propagate(&glass, &incoming, &Vector3::z(), PropagationMode::Refract)
            .unwrap();
        assert_eq!(d.interaction, Interaction::TotalInternalReflection);
        let expected = Vector3::new(
            incoming.direction.x,
            incoming.direction.y,
            -incoming.direction.z,
        );
        assert_abs_diff_eq!(d.direction, expected, epsilon = 1e-15);
        assert_relative_eq!(d.wave_vector.norm(), 1.5, max_relative = 1e-14);
    }
    #[test]
    fn mirror() {
        let glass = Material::constant(1.5).unwrap();
        let air = Material::vacuum();
        let incoming = ray(Vector3::new(0.0, 1.0, 1.0), 1.0);
        let d = glass
            .propagate(&air, &incoming, &Vector3::z(), PropagationMode::Mirror)
            .unwrap();
        assert_eq!(d.interaction, Interaction::Reflection);
        assert_abs_diff_eq!(
            d.direction,
            Vector3::new(0.0, 1.0, -1.0).normalize(),
            epsilon = 1e-15
        );
        // reflection stays in the current medium
        assert_relative_eq!(d.wave_vector.norm(), 1.0, max_relative = 1e-14);
    }
    #[test]
    fn launch() {
        let glass = Material::constant(1.5).unwrap();
        let (k, s) = glass
            .launch(&Vector3::new(0.0, 0.0, 2.0), nanometer!(633.0), &Point3::origin())
            .unwrap();
        assert_abs_diff_eq!(k, Vector3::new(0.0, 0.0, 1.5));
        assert_abs_diff_eq!(s, Vector3::z());
    }
    #[test]
    fn straight_intersection_optical_path() {
        let glass = Material::constant(1.5).unwrap();
        let frame = Isometry::new_along_z(crate::millimeter!(10.0)).unwrap();
        let incoming = ray(Vector3::z(), 1.5);
        let hit = glass
            .intersect(&incoming, &Shape::flat(), &frame, &TraceConfig::default())
            .unwrap();
        assert_abs_diff_eq!(hit.ray.position, Point3::new(0.0, 0.0, 0.01), epsilon = 1e-15);
        assert_relative_eq!(hit.optical_path, 0.015, max_relative = 1e-14);
        assert_abs_diff_eq!(hit.normal, Vector3::z());
    }
    #[test]
    fn miss() {
        let glass = Material::constant(1.5).unwrap();
        let frame = Isometry::new_along_z(crate::millimeter!(10.0)).unwrap();
        let shape = Shape::sphere(crate::millimeter!(1.0)).unwrap();
        let incoming = RayState {
            position: Point3::new(0.0, 0.005, 0.0),
            ..ray(Vector3::z(), 1.5)
        };
        assert_matches!(
            glass.intersect(&incoming, &shape, &frame, &TraceConfig::default()),
            Err(RayStatus::NoIntersection)
        );
    }
    #[test]
    fn kind_and_parameters() {
        let mut glass = Material::constant(1.5).unwrap();
        assert_eq!(glass.kind(), "isotropic");
        assert_eq!(glass.parameter_names(), vec!["n"]);
        glass.set_parameter("n", 1.6).unwrap();
        assert_relative_eq!(
            glass
                .index_at(nanometer!(500.0), &Point3::origin())
                .unwrap(),
            1.6
        );
    }
}
