#![warn(missing_docs)]
//! Sequential ray tracing
//!
//! The [`Propagator`] traces a [`RayBundle`] through the surfaces of a [`Sequence`]. For every step it
//!
//!  1. moves each valid ray through the current medium onto the surface,
//!  2. checks the intersection point against the aperture of the surface,
//!  3. refracts (or reflects) the ray according to the material behind the surface,
//!  4. emits a copy of the bundle in the local frame of the surface.
//!
//! Rays are processed in parallel within one surface while the surfaces are processed strictly in order. Rays that
//! fail at a surface are never removed. They keep their state and are only flagged (see [`RayStatus`]).
use itertools::Itertools;
use log::{debug, info, warn};
use nalgebra::Vector3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use uom::si::f64::Length;

use crate::{
    error::{OpmResult, RaytraceError},
    material::{Material, PropagationMode, RayState},
    meter,
    optical_system::{OpticalSystem, Sequence},
    ray_bundle::{Interaction, RayBundle, RayStatus, RayUpdate},
    surface::Surface,
    utils::geom_transformation::Isometry,
};

/// Numerical parameters of a ray trace.
///
/// The config contains the following info
///   - convergence tolerance of the ray / surface intersection
///   - maximum number of Newton iterations of the ray / surface intersection
///   - integration step inside graded-index media (overrides the step of the material if set)
///   - parallel processing of the rays of a bundle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceConfig {
    tolerance: Length,
    max_iterations: usize,
    grin_step: Option<Length>,
    parallel: bool,
}
impl Default for TraceConfig {
    /// Create a default config with the following parameters:
    ///   - tolerance: `1e-11 m`
    ///   - maximum number of iterations: `50`
    ///   - GRIN integration step: defined by the material
    ///   - parallel: `true`
    fn default() -> Self {
        Self {
            tolerance: meter!(1e-11),
            max_iterations: 50,
            grin_step: None,
            parallel: true,
        }
    }
}
impl TraceConfig {
    /// Returns the convergence tolerance of the ray / surface intersection.
    #[must_use]
    pub const fn tolerance(&self) -> Length {
        self.tolerance
    }
    /// Sets the convergence tolerance of the ray / surface intersection.
    ///
    /// # Errors
    ///
    /// This function will return an error if the tolerance is not positive and finite.
    pub fn set_tolerance(&mut self, tolerance: Length) -> OpmResult<()> {
        if !tolerance.is_finite() || tolerance.value <= 0.0 {
            return Err(RaytraceError::Trace(
                "tolerance must be > 0.0 and finite".into(),
            ));
        }
        self.tolerance = tolerance;
        Ok(())
    }
    /// Returns the maximum number of iterations of the ray / surface intersection.
    #[must_use]
    pub const fn max_iterations(&self) -> usize {
        self.max_iterations
    }
    /// Sets the maximum number of iterations of the ray / surface intersection.
    ///
    /// # Errors
    ///
    /// This function will return an error if the number is zero.
    pub fn set_max_iterations(&mut self, max_iterations: usize) -> OpmResult<()> {
        if max_iterations == 0 {
            return Err(RaytraceError::Trace(
                "maximum number of iterations must be > 0".into(),
            ));
        }
        self.max_iterations = max_iterations;
        Ok(())
    }
    /// Returns the integration step inside graded-index media (`None` if defined by the material).
    #[must_use]
    pub const fn grin_step(&self) -> Option<Length> {
        self.grin_step
    }
    /// Sets the integration step inside graded-index media (`None` to use the step of the material).
    ///
    /// # Errors
    ///
    /// This function will return an error if the step is not positive and finite.
    pub fn set_grin_step(&mut self, grin_step: Option<Length>) -> OpmResult<()> {
        if let Some(step) = grin_step {
            if !step.is_finite() || step.value <= 0.0 {
                return Err(RaytraceError::Trace(
                    "GRIN integration step must be > 0.0 and finite".into(),
                ));
            }
        }
        self.grin_step = grin_step;
        Ok(())
    }
    /// Returns `true` if the rays of a bundle are processed in parallel.
    #[must_use]
    pub const fn parallel(&self) -> bool {
        self.parallel
    }
    /// Switch parallel processing of the rays of a bundle on or off.
    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
    }
}

/// Sequential ray tracer.
#[derive(Debug, Default, Clone)]
pub struct Propagator {
    config: TraceConfig,
}
impl Propagator {
    /// Creates a new [`Propagator`].
    #[must_use]
    pub const fn new(config: TraceConfig) -> Self {
        Self { config }
    }
    /// Returns the config of this [`Propagator`].
    #[must_use]
    pub const fn config(&self) -> &TraceConfig {
        &self.config
    }
    /// Trace a ray bundle through the given sequence of surfaces.
    ///
    /// Returns one bundle per sequence step, each expressed in the local frame of the respective surface and index
    /// aligned with the input bundle. The medium in front of the first surface is the background material of the
    /// system. Refracting steps switch the current medium to the material of the surface, mirror steps keep it.
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///   - the sequence is not valid for the system (see [`OpticalSystem::validate`])
    ///   - the bundle is empty or its frame is not connected to the root of the system
    ///   - a material of the sequence cannot be evaluated at a wavelength of the bundle
    pub fn trace(
        &self,
        system: &OpticalSystem,
        sequence: &Sequence,
        bundle: RayBundle,
    ) -> OpmResult<Vec<RayBundle>> {
        system.validate(sequence)?;
        if bundle.is_empty() {
            return Err(RaytraceError::Trace("ray bundle is empty".into()));
        }
        let background = system.background_material()?;
        check_wavelengths(system, sequence, &bundle)?;
        info!(
            "Tracing {} rays through {} surfaces.",
            bundle.len(),
            sequence.len()
        );
        let mut rays = bundle.to_global(system.coordinates())?;
        launch(&mut rays, background);
        let mut current = background;
        let mut result = Vec::with_capacity(sequence.len());
        for entry in sequence.entries() {
            let surface = system.surface(entry.surface())?;
            let frame = system
                .coordinates()
                .transform_to_root(surface.coordinate_system())?;
            let next = system.material(surface.material())?;
            let mode = if entry.is_mirror() {
                PropagationMode::Mirror
            } else {
                PropagationMode::Refract
            };
            let step = SurfaceStep {
                surface,
                frame: &frame,
                current,
                next,
                mode,
                config: &self.config,
            };
            step.apply(&mut rays);
            result.push(rays.transformed(&frame.inverse(), surface.coordinate_system()));
            if mode == PropagationMode::Refract {
                current = next;
            }
        }
        info!(
            "Tracing finished: {} of {} rays valid.",
            rays.nr_of_valid_rays(),
            rays.len()
        );
        Ok(result)
    }
}

/// Trace a ray bundle through the given sequence of surfaces using the given config.
///
/// See [`Propagator::trace`].
///
/// # Errors
///
/// This function will return an error if the system, the sequence or the bundle are invalid.
pub fn trace(
    system: &OpticalSystem,
    sequence: &Sequence,
    bundle: RayBundle,
    config: &TraceConfig,
) -> OpmResult<Vec<RayBundle>> {
    Propagator::new(*config).trace(system, sequence, bundle)
}

fn check_wavelengths(
    system: &OpticalSystem,
    sequence: &Sequence,
    bundle: &RayBundle,
) -> OpmResult<()> {
    let wavelengths = bundle
        .wavelengths()
        .iter()
        .unique_by(|w| w.value.to_bits())
        .collect_vec();
    let materials = std::iter::once(system.background())
        .chain(
            sequence
                .entries()
                .iter()
                .filter_map(|e| system.surface(e.surface()).ok())
                .map(Surface::material),
        )
        .unique()
        .collect_vec();
    for name in materials {
        let material = system.material(name)?;
        for wavelength in &wavelengths {
            material.check_wavelength(**wavelength).map_err(|e| {
                RaytraceError::Configuration(format!("material '{name}' not usable: {e}"))
            })?;
        }
    }
    Ok(())
}

/// Determine wave vectors and energy directions of the start rays inside the background medium.
///
/// The given ray directions are interpreted as wave normals.
fn launch(rays: &mut RayBundle, medium: &Material) {
    for i in 0..rays.len() {
        if !rays.status()[i].is_valid() {
            continue;
        }
        let position = rays.positions()[i].map(|c| c.value);
        match medium.launch(&rays.wave_vectors()[i], rays.wavelengths()[i], &position) {
            Ok((wave_vector, direction)) => rays.set_wave(i, wave_vector, direction),
            Err(status) => rays.invalidate(i, status),
        }
    }
}

/// Everything needed to process one step of a sequence.
struct SurfaceStep<'a> {
    surface: &'a Surface,
    frame: &'a Isometry,
    current: &'a Material,
    next: &'a Material,
    mode: PropagationMode,
    config: &'a TraceConfig,
}
impl SurfaceStep<'_> {
    fn apply(&self, rays: &mut RayBundle) {
        let valid_before = rays.nr_of_valid_rays();
        let snapshot: &RayBundle = rays;
        let process = |i: usize| -> Option<Result<RayUpdate, RayStatus>> {
            if !snapshot.status()[i].is_valid() {
                return None;
            }
            let ray = RayState {
                position: snapshot.positions()[i].map(|c| c.value),
                direction: snapshot.directions()[i],
                wave_vector: snapshot.wave_vectors()[i],
                wavelength: snapshot.wavelengths()[i],
            };
            Some(self.trace_ray(&ray))
        };
        let updates: Vec<Option<Result<RayUpdate, RayStatus>>> = if self.config.parallel() {
            (0..snapshot.len()).into_par_iter().map(process).collect()
        } else {
            (0..snapshot.len()).map(process).collect()
        };
        let mut failures: Vec<RayStatus> = Vec::new();
        for (i, update) in updates.into_iter().enumerate() {
            match update {
                Some(Ok(update)) => {
                    rays.update_ray(i, &update);
                    if let Some(status) = update.status {
                        failures.push(status);
                    }
                }
                Some(Err(status)) => {
                    rays.invalidate(i, status);
                    failures.push(status);
                }
                None => {}
            }
        }
        let name = self.surface.name();
        let counts = failures.into_iter().counts();
        if let Some(nr) = counts.get(&RayStatus::NonConvergent) {
            warn!("surface '{name}': intersection did not converge for {nr} rays");
        }
        if let Some(nr) = counts.get(&RayStatus::IntegrationFailure) {
            warn!("surface '{name}': GRIN integration failed for {nr} rays");
        }
        if valid_before > 0 && counts.get(&RayStatus::Vignetted) == Some(&valid_before) {
            warn!("surface '{name}': aperture blocks all rays");
        }
        debug!(
            "surface '{name}': {} of {} rays valid ({})",
            rays.nr_of_valid_rays(),
            rays.len(),
            counts
                .iter()
                .sorted_by_key(|(status, _)| status.to_string())
                .map(|(status, nr)| format!("{status}: {nr}"))
                .join(", ")
        );
    }
    /// Move a single ray onto the surface and deflect it.
    ///
    /// `Err` means that the ray did not reach the surface and keeps its previous state.
    fn trace_ray(&self, ray: &RayState) -> Result<RayUpdate, RayStatus> {
        let hit = self
            .current
            .intersect(ray, self.surface.shape(), self.frame, self.config)?;
        let arrived = |wave_vector: Vector3<f64>,
                       direction: Vector3<f64>,
                       interaction: Interaction,
                       status: Option<RayStatus>| RayUpdate {
            position: hit.ray.position,
            direction,
            wave_vector,
            optical_path: hit.optical_path,
            interaction,
            status,
        };
        if !self
            .surface
            .aperture()
            .contains_meter(hit.local_point.x, hit.local_point.y)
        {
            return Ok(arrived(
                hit.ray.wave_vector,
                hit.ray.direction,
                Interaction::None,
                Some(RayStatus::Vignetted),
            ));
        }
        Ok(
            match self
                .next
                .propagate(self.current, &hit.ray, &hit.normal, self.mode)
            {
                Ok(deflection) => arrived(
                    deflection.wave_vector,
                    deflection.direction,
                    deflection.interaction,
                    (deflection.interaction == Interaction::TotalInternalReflection)
                        .then_some(RayStatus::TotalInternalReflection),
                ),
                Err(status) => arrived(
                    hit.ray.wave_vector,
                    hit.ray.direction,
                    Interaction::None,
                    Some(status),
                ),
            },
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        aperture::Aperture,
        builder::{build_simple_optical_system, SurfaceDescriptor, SystemBuilder},
        coordinates::{LocalTransform, TransformOrder},
        degree, millimeter, nanometer,
        refractive_index::{RefrIndexConrady, RefractiveIndexType},
        sampling::MeridionalFan,
        utils::test_helper::test_helper::check_warning_contains,
    };
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use assert_matches::assert_matches;
    use nalgebra::Vector3;

    fn single_ray(direction: Vector3<f64>) -> RayBundle {
        RayBundle::new(
            vec![millimeter!(0.0, 0.0, 0.0)],
            vec![direction],
            nanometer!(587.6),
        )
        .unwrap()
    }
    #[test]
    fn config_default() {
        let c = TraceConfig::default();
        assert_eq!(c.tolerance(), meter!(1e-11));
        assert_eq!(c.max_iterations(), 50);
        assert_eq!(c.grin_step(), None);
        assert!(c.parallel());
    }
    #[test]
    fn config_setters() {
        let mut c = TraceConfig::default();
        assert!(c.set_tolerance(meter!(0.0)).is_err());
        assert!(c.set_tolerance(meter!(f64::NAN)).is_err());
        assert!(c.set_tolerance(meter!(f64::INFINITY)).is_err());
        c.set_tolerance(meter!(1e-9)).unwrap();
        assert_eq!(c.tolerance(), meter!(1e-9));
        assert!(c.set_max_iterations(0).is_err());
        c.set_max_iterations(10).unwrap();
        assert_eq!(c.max_iterations(), 10);
        assert!(c.set_grin_step(Some(millimeter!(-1.0))).is_err());
        c.set_grin_step(Some(millimeter!(0.01))).unwrap();
        assert_eq!(c.grin_step(), Some(millimeter!(0.01)));
        c.set_grin_step(None).unwrap();
        c.set_parallel(false);
        assert!(!c.parallel());
    }
    #[test]
    fn trace_wrong_input() {
        let (system, sequence) = build_simple_optical_system(&[SurfaceDescriptor::new(
            "image",
            None,
            millimeter!(10.0),
        )])
        .unwrap();
        let propagator = Propagator::default();
        assert_matches!(
            propagator.trace(&system, &Sequence::new().refract("nowhere"), single_ray(Vector3::z())),
            Err(RaytraceError::Configuration(_))
        );
        assert_matches!(
            propagator.trace(&system, &Sequence::new(), single_ray(Vector3::z())),
            Err(RaytraceError::Configuration(_))
        );
        let empty = RayBundle::new(vec![], vec![], nanometer!(587.6)).unwrap();
        assert_matches!(
            propagator.trace(&system, &sequence, empty),
            Err(RaytraceError::Trace(_))
        );
    }
    #[test]
    fn trace_wavelength_outside_model() {
        let (system, sequence) = SystemBuilder::new()
            .with_material("silica", Material::from(RefractiveIndexType::Conrady(RefrIndexConrady::default())))
            .surface(SurfaceDescriptor::new("front", None, millimeter!(10.0)).with_material("silica"))
            .build()
            .unwrap();
        assert_matches!(
            trace(
                &system,
                &sequence,
                RayBundle::new(vec![millimeter!(0.0, 0.0, 0.0)], vec![Vector3::z()], nanometer!(20_000.0)).unwrap(),
                &TraceConfig::default()
            ),
            Err(RaytraceError::Configuration(_))
        );
    }
    #[test]
    fn flat_surface_same_index() {
        let (system, sequence) = SystemBuilder::new()
            .with_background(Material::constant(1.5).unwrap())
            .surface(SurfaceDescriptor::new("a", None, millimeter!(10.0)).with_index(1.5))
            .build()
            .unwrap();
        let direction = Vector3::new(0.1, -0.2, 1.0).normalize();
        let bundles = Propagator::default()
            .trace(&system, &sequence, single_ray(direction))
            .unwrap();
        assert_eq!(bundles.len(), 1);
        let out = &bundles[0];
        assert_eq!(out.frame(), system.surface("a").unwrap().coordinate_system());
        assert_eq!(out.status()[0], RayStatus::Valid);
        assert_eq!(out.interactions()[0], Interaction::Refraction);
        assert_abs_diff_eq!(out.directions()[0], direction, epsilon = 1e-14);
        assert_abs_diff_eq!(out.positions()[0].z.value, 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(out.positions()[0].x.value, 0.001, epsilon = 1e-15);
        // optical path length n * geometric length
        assert_relative_eq!(
            out.optical_path_lengths()[0].value,
            1.5 * 0.01 / direction.z,
            max_relative = 1e-12
        );
    }
    #[test]
    fn snell_at_tilted_plane() {
        let mut system = OpticalSystem::default();
        system
            .add_material("glass", Material::constant(1.5).unwrap())
            .unwrap();
        let root = system.coordinates().root();
        let cs = system
            .coordinates_mut()
            .add_child(
                root,
                "tilted",
                LocalTransform::new(
                    millimeter!(0.0, 0.0, 10.0),
                    degree!(20.0, 0.0, 0.0),
                    TransformOrder::DecenterThenTilt,
                )
                .unwrap(),
            )
            .unwrap();
        system
            .add_surface(crate::surface::Surface::new("tilted", cs, crate::shape::Shape::flat(), "glass"))
            .unwrap();
        let sequence = system.sequence().clone();
        let bundles = Propagator::default()
            .trace(&system, &sequence, single_ray(Vector3::z()))
            .unwrap();
        // in the local frame the surface normal is the z axis
        let d = bundles[0].directions()[0];
        let incoming = system
            .coordinates()
            .global_to_local_direction(cs, &Vector3::z())
            .unwrap();
        let sin_in = incoming.cross(&Vector3::z()).norm();
        let sin_out = d.cross(&Vector3::z()).norm();
        assert_relative_eq!(sin_in, 20.0_f64.to_radians().sin(), max_relative = 1e-12);
        assert_relative_eq!(sin_in, 1.5 * sin_out, max_relative = 1e-12);
        assert_abs_diff_eq!(d.dot(&incoming.cross(&Vector3::z())), 0.0, epsilon = 1e-15);
    }
    #[test]
    fn total_internal_reflection() {
        let (system, sequence) = SystemBuilder::new()
            .with_background(Material::constant(1.5).unwrap())
            .surface(SurfaceDescriptor::new("exit", None, millimeter!(10.0)).with_index(1.0))
            .surface(SurfaceDescriptor::new("image", None, millimeter!(10.0)))
            .build()
            .unwrap();
        let direction = Vector3::new(0.0, 60.0_f64.to_radians().sin(), 60.0_f64.to_radians().cos());
        let bundles = Propagator::default()
            .trace(&system, &sequence, single_ray(direction))
            .unwrap();
        let out = &bundles[0];
        assert_eq!(out.status()[0], RayStatus::TotalInternalReflection);
        assert_eq!(out.interactions()[0], Interaction::TotalInternalReflection);
        assert_abs_diff_eq!(
            out.directions()[0],
            Vector3::new(0.0, direction.y, -direction.z),
            epsilon = 1e-15
        );
        // frozen afterwards
        assert_eq!(bundles[1].status()[0], RayStatus::TotalInternalReflection);
        let first = out.to_global(system.coordinates()).unwrap();
        let second = bundles[1].to_global(system.coordinates()).unwrap();
        assert_abs_diff_eq!(
            first.positions()[0].map(|c| c.value),
            second.positions()[0].map(|c| c.value),
            epsilon = 1e-15
        );
    }
    #[test]
    fn vignetting_is_persistent() {
        let (system, sequence) = build_simple_optical_system(&[
            SurfaceDescriptor::new("stop", None, millimeter!(10.0))
                .with_aperture(Aperture::circular(millimeter!(9.0)).unwrap())
                .stop(),
            SurfaceDescriptor::new("image", None, millimeter!(10.0)),
        ])
        .unwrap();
        let bundle = RayBundle::new(
            vec![millimeter!(0.0, 0.0, 0.0), millimeter!(0.0, 10.0, 0.0)],
            vec![Vector3::z(), Vector3::z()],
            nanometer!(587.6),
        )
        .unwrap();
        let mut config = TraceConfig::default();
        config.set_parallel(false);
        let bundles = Propagator::new(config)
            .trace(&system, &sequence, bundle)
            .unwrap();
        assert_eq!(bundles.len(), 2);
        for b in &bundles {
            assert_eq!(b.len(), 2);
            assert_eq!(b.status()[0], RayStatus::Valid);
            assert_eq!(b.status()[1], RayStatus::Vignetted);
        }
        assert_abs_diff_eq!(bundles[1].positions()[1].z.value, -0.01, epsilon = 1e-15);
        assert_abs_diff_eq!(bundles[1].positions()[0].z.value, 0.0, epsilon = 1e-15);
    }
    #[test]
    fn aperture_blocks_all_rays() {
        testing_logger::setup();
        let (system, sequence) = build_simple_optical_system(&[SurfaceDescriptor::new(
            "stop",
            None,
            millimeter!(10.0),
        )
        .with_aperture(Aperture::circular(millimeter!(1.0)).unwrap())])
        .unwrap();
        let fan = MeridionalFan::new(millimeter!(5.0), 2).unwrap();
        let bundle = RayBundle::new_collimated(&fan, millimeter!(0.0), nanometer!(587.6)).unwrap();
        let bundles = trace(&system, &sequence, bundle, &TraceConfig::default()).unwrap();
        assert_eq!(bundles[0].nr_of_valid_rays(), 0);
        check_warning_contains("aperture blocks all rays");
    }
    #[test]
    fn missed_surface() {
        let (system, sequence) = build_simple_optical_system(&[
            SurfaceDescriptor::new("ball", Some(millimeter!(1.0)), millimeter!(10.0)),
            SurfaceDescriptor::new("image", None, millimeter!(10.0)),
        ])
        .unwrap();
        let bundle = RayBundle::new(
            vec![millimeter!(0.0, 5.0, 0.0)],
            vec![Vector3::z()],
            nanometer!(587.6),
        )
        .unwrap();
        let bundles = trace(&system, &sequence, bundle, &TraceConfig::default()).unwrap();
        assert_eq!(bundles[0].status()[0], RayStatus::NoIntersection);
        assert_eq!(bundles[1].status()[0], RayStatus::NoIntersection);
        // not moved
        let global = bundles[1].to_global(system.coordinates()).unwrap();
        assert_abs_diff_eq!(global.positions()[0].z.value, 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(global.positions()[0].y.value, 0.005, epsilon = 1e-15);
    }
    #[test]
    fn folding_mirror() {
        let (system, _) = build_simple_optical_system(&[
            SurfaceDescriptor::new("mirror", None, millimeter!(10.0)).mirror(),
            SurfaceDescriptor::new("image", None, millimeter!(-10.0)),
        ])
        .unwrap();
        // mirror is traversed, then the image plane 10 mm behind the start plane
        let sequence = Sequence::new().reflect("mirror").refract("image");
        let bundles = Propagator::default()
            .trace(&system, &sequence, single_ray(Vector3::new(0.0, 0.1, 1.0)))
            .unwrap();
        assert_eq!(bundles[0].interactions()[0], Interaction::Reflection);
        assert!(bundles[0].directions()[0].z < 0.0);
        assert_eq!(bundles[1].status()[0], RayStatus::Valid);
        let global = bundles[1].to_global(system.coordinates()).unwrap();
        assert_abs_diff_eq!(global.positions()[0].z.value, 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(global.positions()[0].y.value, 0.002, epsilon = 1e-12);
        assert_relative_eq!(
            global.optical_path_lengths()[0].value,
            2.0 * (0.01_f64.powi(2) + 0.001_f64.powi(2)).sqrt(),
            max_relative = 1e-12
        );
    }
    #[test]
    fn parallel_and_sequential_agree() {
        let (system, sequence) = build_simple_optical_system(&[
            SurfaceDescriptor::new("front", Some(millimeter!(50.0)), millimeter!(10.0)).with_index(1.6),
            SurfaceDescriptor::new("back", Some(millimeter!(-50.0)), millimeter!(4.0)).with_index(1.0),
            SurfaceDescriptor::new("image", None, millimeter!(40.0)),
        ])
        .unwrap();
        let fan = MeridionalFan::new(millimeter!(8.0), 21).unwrap();
        let bundle = RayBundle::new_collimated(&fan, millimeter!(0.0), nanometer!(587.6)).unwrap();
        let mut config = TraceConfig::default();
        let parallel = trace(&system, &sequence, bundle.clone(), &config).unwrap();
        config.set_parallel(false);
        let sequential = trace(&system, &sequence, bundle, &config).unwrap();
        assert_eq!(parallel, sequential);
    }
}
