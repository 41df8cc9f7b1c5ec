#![warn(missing_docs)]
//! Bundles of rays
//!
//! A [`RayBundle`] stores its rays as parallel, index-aligned arrays. Rays are never removed from a bundle. A ray
//! that fails at some surface keeps its index and is only flagged by its [`RayStatus`], so that traced rays can
//! always be correlated with the sampling coordinates they were launched from.
use nalgebra::{Point3, Vector3};
use num::Zero;
use serde::{Deserialize, Serialize};
use strum::Display;
use uom::si::f64::Length;

use crate::{
    coordinates::{CoordId, CoordinateTree},
    error::{OpmResult, RaytraceError},
    meter,
    sampling::PositionDistribution,
    utils::{geom_transformation::Isometry, usize_to_f64},
};

/// Validity state of a single ray.
///
/// Every state except [`RayStatus::Valid`] is final within one trace.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum RayStatus {
    /// ray is still propagating
    #[default]
    Valid,
    /// ray hit a surface outside its aperture
    Vignetted,
    /// ray misses the surface shape
    NoIntersection,
    /// the intersection root finder did not converge
    NonConvergent,
    /// ray was totally reflected at a refracting surface
    TotalInternalReflection,
    /// no admissible refracted or reflected wave exists (anisotropic media)
    NoAdmissibleWave,
    /// the ray path through a graded-index medium could not be integrated up to the next surface
    IntegrationFailure,
}

impl RayStatus {
    /// Returns `true` if the ray is still propagating.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Last interaction of a ray with a surface.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Interaction {
    /// no surface interaction yet
    #[default]
    None,
    /// ray was refracted
    Refraction,
    /// ray was reflected at a mirror
    Reflection,
    /// ray was totally reflected at a refracting surface
    TotalInternalReflection,
}

/// A set of rays sharing a coordinate frame.
///
/// Positions are stored as lengths, directions (energy propagation, unit length) and wave vectors (in units of the
/// vacuum wave number, `|k| = n` in isotropic media) are dimensionless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RayBundle {
    positions: Vec<Point3<Length>>,
    directions: Vec<Vector3<f64>>,
    wave_vectors: Vec<Vector3<f64>>,
    wavelengths: Vec<Length>,
    status: Vec<RayStatus>,
    interactions: Vec<Interaction>,
    optical_path_lengths: Vec<Length>,
    frame: CoordId,
}

impl RayBundle {
    /// Create a new [`RayBundle`] in the root frame.
    ///
    /// The directions are normalized. The wave vectors are initialized parallel to the directions. They are
    /// replaced by the wave vectors of the start medium when the bundle is traced.
    ///
    /// # Errors
    ///
    /// This function returns an error if
    ///  - the number of positions and directions differ.
    ///  - a position is not finite.
    ///  - a direction is zero or not finite.
    ///  - the wavelength is not positive and finite.
    pub fn new(
        positions: Vec<Point3<Length>>,
        directions: Vec<Vector3<f64>>,
        wavelength: Length,
    ) -> OpmResult<Self> {
        if positions.len() != directions.len() {
            return Err(RaytraceError::Trace(
                "number of positions and directions must be equal".into(),
            ));
        }
        if positions
            .iter()
            .any(|p| p.iter().any(|c| !c.value.is_finite()))
        {
            return Err(RaytraceError::Trace("positions must be finite".into()));
        }
        check_wavelength(wavelength)?;
        let directions = directions
            .iter()
            .map(|d| {
                let norm = d.norm();
                if norm.is_normal() && d.iter().all(|c| c.is_finite()) {
                    Ok(d / norm)
                } else {
                    Err(RaytraceError::Trace(
                        "directions must be finite and non-zero".into(),
                    ))
                }
            })
            .collect::<OpmResult<Vec<_>>>()?;
        let nr_of_rays = positions.len();
        Ok(Self {
            positions,
            wave_vectors: directions.clone(),
            directions,
            wavelengths: vec![wavelength; nr_of_rays],
            status: vec![RayStatus::Valid; nr_of_rays],
            interactions: vec![Interaction::None; nr_of_rays],
            optical_path_lengths: vec![Length::zero(); nr_of_rays],
            frame: CoordId::ROOT,
        })
    }
    /// Create a collimated bundle propagating along `+z`, starting at the points of the given distribution
    /// shifted to the plane `z`.
    ///
    /// # Errors
    ///
    /// This function returns an error if `z` is not finite or the wavelength is not positive and finite.
    pub fn new_collimated(
        distribution: &dyn PositionDistribution,
        z: Length,
        wavelength: Length,
    ) -> OpmResult<Self> {
        let positions: Vec<Point3<Length>> = distribution
            .generate()
            .into_iter()
            .map(|p| Point3::new(p.x, p.y, p.z + z))
            .collect();
        let directions = vec![Vector3::z(); positions.len()];
        Self::new(positions, directions, wavelength)
    }
    /// Create a bundle of rays starting at a common point.
    ///
    /// # Errors
    ///
    /// This function returns an error if the origin is not finite, a direction is zero or not finite or the
    /// wavelength is not positive and finite.
    pub fn new_divergent(
        origin: Point3<Length>,
        directions: Vec<Vector3<f64>>,
        wavelength: Length,
    ) -> OpmResult<Self> {
        Self::new(vec![origin; directions.len()], directions, wavelength)
    }
    /// Assign individual wavelengths to the rays.
    ///
    /// # Errors
    ///
    /// This function returns an error if the number of wavelengths does not match the number of rays or a
    /// wavelength is not positive and finite.
    pub fn with_wavelengths(mut self, wavelengths: Vec<Length>) -> OpmResult<Self> {
        if wavelengths.len() != self.len() {
            return Err(RaytraceError::Trace(
                "number of wavelengths must match the number of rays".into(),
            ));
        }
        for wavelength in &wavelengths {
            check_wavelength(*wavelength)?;
        }
        self.wavelengths = wavelengths;
        Ok(self)
    }
    /// Declare the coordinate system in which positions and directions of this bundle are given.
    #[must_use]
    pub fn with_frame(mut self, frame: CoordId) -> Self {
        self.frame = frame;
        self
    }
    /// Returns the number of rays.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }
    /// Returns `true` if the bundle contains no rays.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
    /// Returns the coordinate system of this bundle.
    #[must_use]
    pub const fn frame(&self) -> CoordId {
        self.frame
    }
    /// Returns the ray positions.
    #[must_use]
    pub fn positions(&self) -> &[Point3<Length>] {
        &self.positions
    }
    /// Returns the (unit) energy propagation directions.
    #[must_use]
    pub fn directions(&self) -> &[Vector3<f64>] {
        &self.directions
    }
    /// Returns the wave vectors in units of the vacuum wave number.
    #[must_use]
    pub fn wave_vectors(&self) -> &[Vector3<f64>] {
        &self.wave_vectors
    }
    /// Returns the wavelengths (in vacuum).
    #[must_use]
    pub fn wavelengths(&self) -> &[Length] {
        &self.wavelengths
    }
    /// Returns the status of all rays.
    #[must_use]
    pub fn status(&self) -> &[RayStatus] {
        &self.status
    }
    /// Returns the last surface interaction of all rays.
    #[must_use]
    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }
    /// Returns the accumulated optical path lengths.
    #[must_use]
    pub fn optical_path_lengths(&self) -> &[Length] {
        &self.optical_path_lengths
    }
    /// Returns the number of valid rays.
    #[must_use]
    pub fn nr_of_valid_rays(&self) -> usize {
        self.status.iter().filter(|s| s.is_valid()).count()
    }
    /// Flag a ray as invalid.
    ///
    /// The first failure of a ray wins: an already invalid ray keeps its status and valid status can never be
    /// restored.
    pub fn invalidate(&mut self, index: usize, status: RayStatus) {
        if let Some(current) = self.status.get_mut(index) {
            if current.is_valid() {
                *current = status;
            }
        }
    }
    pub(crate) fn set_wave(&mut self, index: usize, wave_vector: Vector3<f64>, direction: Vector3<f64>) {
        self.wave_vectors[index] = wave_vector;
        self.directions[index] = direction;
    }
    /// Overwrite the state of a ray after a surface interaction (positions in meters, frame of this bundle).
    pub(crate) fn update_ray(&mut self, index: usize, update: &RayUpdate) {
        self.positions[index] = meter!(update.position.x, update.position.y, update.position.z);
        self.set_wave(index, update.wave_vector, update.direction);
        self.optical_path_lengths[index] += meter!(update.optical_path);
        self.interactions[index] = update.interaction;
        if let Some(status) = update.status {
            self.invalidate(index, status);
        }
    }
    /// Returns a copy of this bundle transformed by the given isometry.
    ///
    /// `isometry` maps coordinates of the current frame into the coordinates of `frame`.
    #[must_use]
    pub fn transformed(&self, isometry: &Isometry, frame: CoordId) -> Self {
        Self {
            positions: self
                .positions
                .iter()
                .map(|p| isometry.transform_point(p))
                .collect(),
            directions: self
                .directions
                .iter()
                .map(|d| isometry.transform_vector_f64(d))
                .collect(),
            wave_vectors: self
                .wave_vectors
                .iter()
                .map(|k| isometry.transform_vector_f64(k))
                .collect(),
            wavelengths: self.wavelengths.clone(),
            status: self.status.clone(),
            interactions: self.interactions.clone(),
            optical_path_lengths: self.optical_path_lengths.clone(),
            frame,
        }
    }
    /// Returns a copy of this bundle expressed in the root frame of the given tree.
    ///
    /// # Errors
    ///
    /// This function returns an error if the frame of this bundle is not part of the tree or not connected to its
    /// root.
    pub fn to_global(&self, tree: &CoordinateTree) -> OpmResult<Self> {
        let isometry = tree.transform_to_root(self.frame)?;
        Ok(self.transformed(&isometry, tree.root()))
    }
    /// Returns the centroid of all valid rays (`None` if there are no valid rays).
    #[must_use]
    pub fn centroid(&self) -> Option<Point3<Length>> {
        let valid: Vec<Point3<f64>> = self.valid_positions_in_m().collect();
        if valid.is_empty() {
            return None;
        }
        let sum = valid
            .iter()
            .fold(Vector3::zeros(), |acc: Vector3<f64>, p| acc + p.coords);
        let c = sum / usize_to_f64(valid.len());
        Some(meter!(c.x, c.y, c.z))
    }
    /// Returns the transverse (x-y) rms radius of the valid rays around their centroid (`None` if there are no
    /// valid rays).
    #[must_use]
    pub fn rms_spot_radius(&self) -> Option<Length> {
        let c = self.centroid()?.map(|c| c.value);
        let valid: Vec<Point3<f64>> = self.valid_positions_in_m().collect();
        let sum_sq: f64 = valid
            .iter()
            .map(|p| (p.x - c.x).mul_add(p.x - c.x, (p.y - c.y) * (p.y - c.y)))
            .sum();
        Some(meter!((sum_sq / usize_to_f64(valid.len())).sqrt()))
    }
    fn valid_positions_in_m(&self) -> impl Iterator<Item = Point3<f64>> + '_ {
        self.positions
            .iter()
            .zip(self.status.iter())
            .filter(|(_, s)| s.is_valid())
            .map(|(p, _)| p.map(|c| c.value))
    }
}

fn check_wavelength(wavelength: Length) -> OpmResult<()> {
    if !wavelength.is_finite() || wavelength.value <= 0.0 {
        return Err(RaytraceError::Trace(
            "wavelength must be positive and finite".into(),
        ));
    }
    Ok(())
}

/// Result of a surface interaction of a single ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RayUpdate {
    pub position: Point3<f64>,
    pub direction: Vector3<f64>,
    pub wave_vector: Vector3<f64>,
    pub optical_path: f64,
    pub interaction: Interaction,
    pub status: Option<RayStatus>,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        coordinates::LocalTransform, degree, millimeter, nanometer, sampling::MeridionalFan,
    };
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use assert_matches::assert_matches;
    #[test]
    fn new_wrong() {
        let wvl = nanometer!(633.0);
        assert!(RayBundle::new(vec![millimeter!(0., 0., 0.)], vec![], wvl).is_err());
        assert!(
            RayBundle::new(vec![millimeter!(0., 0., 0.)], vec![Vector3::zeros()], wvl).is_err()
        );
        assert!(RayBundle::new(
            vec![millimeter!(0., f64::NAN, 0.)],
            vec![Vector3::z()],
            wvl
        )
        .is_err());
        assert!(RayBundle::new(
            vec![millimeter!(0., 0., 0.)],
            vec![Vector3::z()],
            nanometer!(0.0)
        )
        .is_err());
    }
    #[test]
    fn new_normalizes() {
        let b = RayBundle::new(
            vec![millimeter!(0., 0., 0.)],
            vec![Vector3::new(0.0, 3.0, 4.0)],
            nanometer!(633.0),
        )
        .unwrap();
        assert_abs_diff_eq!(b.directions()[0], Vector3::new(0.0, 0.6, 0.8));
        assert_eq!(b.len(), 1);
        assert_eq!(b.nr_of_valid_rays(), 1);
        assert_eq!(b.frame(), CoordId::ROOT);
        assert_eq!(b.interactions()[0], Interaction::None);
    }
    #[test]
    fn collimated() {
        let fan = MeridionalFan::new(millimeter!(9.0), 11).unwrap();
        let b = RayBundle::new_collimated(&fan, millimeter!(-10.0), nanometer!(587.6)).unwrap();
        assert_eq!(b.len(), 11);
        assert!(b.positions().iter().all(|p| p.z == millimeter!(-10.0)));
        assert!(b.directions().iter().all(|d| *d == Vector3::z()));
    }
    #[test]
    fn invalidate_is_monotonic() {
        let mut b = RayBundle::new_divergent(
            millimeter!(0., 0., 0.),
            vec![Vector3::z(), Vector3::x()],
            nanometer!(633.0),
        )
        .unwrap();
        b.invalidate(0, RayStatus::Vignetted);
        b.invalidate(0, RayStatus::NonConvergent);
        b.invalidate(0, RayStatus::Valid);
        assert_eq!(b.status()[0], RayStatus::Vignetted);
        assert_eq!(b.nr_of_valid_rays(), 1);
        assert!(!b.status()[0].is_valid());
    }
    #[test]
    fn display() {
        assert_eq!(format!("{}", RayStatus::TotalInternalReflection), "TotalInternalReflection");
        assert_eq!(format!("{}", Interaction::Refraction), "Refraction");
    }
    #[test]
    fn with_wavelengths() {
        let b = RayBundle::new_divergent(
            millimeter!(0., 0., 0.),
            vec![Vector3::z(), Vector3::z()],
            nanometer!(633.0),
        )
        .unwrap();
        assert!(b.clone().with_wavelengths(vec![nanometer!(500.0)]).is_err());
        let b = b
            .with_wavelengths(vec![nanometer!(500.0), nanometer!(600.0)])
            .unwrap();
        assert_eq!(b.wavelengths()[1], nanometer!(600.0));
    }
    #[test]
    fn to_global() {
        let mut tree = CoordinateTree::default();
        let id = tree
            .add_child(
                tree.root(),
                "tilted",
                LocalTransform::new(
                    millimeter!(0., 0., 10.),
                    degree!(90., 0., 0.),
                    crate::coordinates::TransformOrder::DecenterThenTilt,
                )
                .unwrap(),
            )
            .unwrap();
        let b = RayBundle::new(
            vec![millimeter!(0., 1., 0.)],
            vec![Vector3::z()],
            nanometer!(633.0),
        )
        .unwrap()
        .with_frame(id);
        let g = b.to_global(&tree).unwrap();
        assert_eq!(g.frame(), tree.root());
        // local y axis is mapped onto the global z axis
        assert_abs_diff_eq!(g.positions()[0].y.value, 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(g.positions()[0].z.value, 0.011, epsilon = 1e-15);
        assert_abs_diff_eq!(g.directions()[0].y.abs(), 1.0, epsilon = 1e-15);
        assert_matches!(
            b.with_frame(CoordId::ROOT).to_global(&tree),
            Ok(_)
        );
    }
    #[test]
    fn centroid_and_rms() {
        let mut b = RayBundle::new(
            vec![
                millimeter!(1., 0., 0.),
                millimeter!(-1., 0., 0.),
                millimeter!(0., 100., 0.),
            ],
            vec![Vector3::z(); 3],
            nanometer!(633.0),
        )
        .unwrap();
        b.invalidate(2, RayStatus::Vignetted);
        let c = b.centroid().unwrap();
        assert_abs_diff_eq!(c.x.value, 0.0);
        assert_relative_eq!(b.rms_spot_radius().unwrap().value, 0.001);
        b.invalidate(0, RayStatus::Vignetted);
        b.invalidate(1, RayStatus::Vignetted);
        assert!(b.centroid().is_none());
        assert!(b.rms_spot_radius().is_none());
    }
}
