//! Rigid body transformations (rotation + translation) used for placing local coordinate systems.
#![warn(missing_docs)]
use nalgebra::{Isometry3, Matrix3, Point3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use uom::si::f64::{Angle, Length};

use crate::{
    error::{OpmResult, RaytraceError},
    meter, radian,
};

/// A rigid transformation consisting of a rotation followed by a translation.
///
/// Internally, the translation is stored in meters. The rotation is given by three tilt angles about the
/// x, y and z axis (in this order, i.e. the resulting rotation is `Rz * Ry * Rx`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Isometry {
    transform: Isometry3<f64>,
}

impl Default for Isometry {
    fn default() -> Self {
        Self::identity()
    }
}

impl Isometry {
    /// Create a new [`Isometry`] from a translation and a rotation (tilts about the x, y and z axis).
    ///
    /// # Errors
    /// This function returns an error if any component of the translation or the rotation is not finite.
    pub fn new(translation: Point3<Length>, rotation: Point3<Angle>) -> OpmResult<Self> {
        if translation.iter().any(|x| !x.is_finite()) {
            return Err(RaytraceError::Other(
                "translation vector must contain finite values".into(),
            ));
        }
        if rotation.iter().any(|x| !x.is_finite()) {
            return Err(RaytraceError::Other(
                "rotation vector must contain finite values".into(),
            ));
        }
        let trans = Translation3::new(translation.x.value, translation.y.value, translation.z.value);
        let rot = UnitQuaternion::from_euler_angles(rotation.x.value, rotation.y.value, rotation.z.value);
        Ok(Self {
            transform: Isometry3::from_parts(trans, rot),
        })
    }
    /// Create a pure translation.
    ///
    /// # Errors
    /// This function returns an error if the translation is not finite.
    pub fn new_translation(translation: Point3<Length>) -> OpmResult<Self> {
        Self::new(translation, radian!(0., 0., 0.))
    }
    /// Create a translation along the z axis.
    ///
    /// # Errors
    /// This function returns an error if the given distance is not finite.
    pub fn new_along_z(length: Length) -> OpmResult<Self> {
        Self::new(
            Point3::new(Length::default(), Length::default(), length),
            radian!(0., 0., 0.),
        )
    }
    /// The identity transformation.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            transform: Isometry3::identity(),
        }
    }
    /// Return the translation part of this [`Isometry`].
    #[must_use]
    pub fn translation(&self) -> Point3<Length> {
        let t = self.transform.translation.vector;
        meter!(t.x, t.y, t.z)
    }
    /// Return the rotation matrix of this [`Isometry`].
    #[must_use]
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.transform.rotation.to_rotation_matrix().into_inner()
    }
    /// Compose two transformations: the returned [`Isometry`] first applies `other` and then `self`.
    ///
    /// This is used for chaining local coordinate systems: `parent.append(&local)` maps local coordinates to the
    /// parent's reference frame.
    #[must_use]
    pub fn append(&self, other: &Self) -> Self {
        Self {
            transform: self.transform * other.transform,
        }
    }
    /// Return the inverse transformation.
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self {
            transform: self.transform.inverse(),
        }
    }
    /// Transform a point.
    #[must_use]
    pub fn transform_point(&self, p: &Point3<Length>) -> Point3<Length> {
        let p = self.transform_point_f64(&Point3::new(p.x.value, p.y.value, p.z.value));
        meter!(p.x, p.y, p.z)
    }
    /// Inverse-transform a point.
    #[must_use]
    pub fn inverse_transform_point(&self, p: &Point3<Length>) -> Point3<Length> {
        let p = self.inverse_transform_point_f64(&Point3::new(p.x.value, p.y.value, p.z.value));
        meter!(p.x, p.y, p.z)
    }
    /// Transform a point given in meters.
    #[must_use]
    pub fn transform_point_f64(&self, p: &Point3<f64>) -> Point3<f64> {
        self.transform.transform_point(p)
    }
    /// Inverse-transform a point given in meters.
    #[must_use]
    pub fn inverse_transform_point_f64(&self, p: &Point3<f64>) -> Point3<f64> {
        self.transform.inverse_transform_point(p)
    }
    /// Transform a (dimensionless) vector. Only the rotation is applied.
    #[must_use]
    pub fn transform_vector_f64(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.transform.transform_vector(v)
    }
    /// Inverse-transform a (dimensionless) vector. Only the rotation is applied.
    #[must_use]
    pub fn inverse_transform_vector_f64(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.transform.inverse_transform_vector(v)
    }
}
