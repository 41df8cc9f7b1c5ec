//! Inhomogeneous isotropic (graded-index) media
//!
//! Inside a GRIN medium the ray path `r(s)` (arc length `s`) follows the ray equation `d/ds (n dr/ds) = ∇n`.
//! With the ray vector `T = n dr/ds` this is integrated as the first order system
//!
//! ```text
//! dr/ds   = T / n(r)
//! dT/ds   = ∇n(r)
//! dOPL/ds = n(r)
//! ```
//!
//! using a fixed-step fourth order Runge-Kutta scheme. The crossing with the next surface is bracketed by the sign
//! change of `z - sag(x, y)` (local frame of the surface), narrowed down by bisection of the last step and finally
//! polished by a straight-line intersection.
use std::{fmt::Debug, sync::Arc};

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use uom::si::f64::Length;

use super::{Hit, RayState};
use crate::{
    error::{OpmResult, RaytraceError},
    millimeter,
    parameters::{check_finite, unknown_parameter, Optimizable},
    propagator::TraceConfig,
    ray_bundle::RayStatus,
    shape::{Shape, SurfaceShape},
    utils::geom_transformation::Isometry,
};

/// Step width (meters) of the central differences used for index fields without analytic gradient.
const GRADIENT_STEP: f64 = 1e-7;

/// Number of consecutive steps a ray may move away from the next surface before it counts as missing it.
const RECEDING_STEPS: usize = 100;

/// A spatially varying refractive index.
///
/// Positions are given in the root frame (meters).
pub trait GrinProfile {
    /// Refractive index at the given position.
    fn index(&self, position: &Point3<f64>) -> f64;
    /// Gradient of the refractive index at the given position.
    fn gradient(&self, position: &Point3<f64>) -> Vector3<f64>;
}

/// Index field `n = n0 + nr2 (x² + y²) + nz z`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParabolicGrin {
    n0: f64,
    nr2: f64,
    nz: f64,
}
impl ParabolicGrin {
    /// Create a new [`ParabolicGrin`] profile.
    ///
    /// # Errors
    /// This function returns an error if a coefficient is not finite or `n0` is not positive.
    pub fn new(n0: f64, nr2: f64, nz: f64) -> OpmResult<Self> {
        if !(n0.is_finite() && nr2.is_finite() && nz.is_finite()) || n0 <= 0.0 {
            return Err(RaytraceError::Material(
                "coefficients must be finite and n0 must be positive".into(),
            ));
        }
        Ok(Self { n0, nr2, nz })
    }
}
impl GrinProfile for ParabolicGrin {
    fn index(&self, position: &Point3<f64>) -> f64 {
        let r2 = position.x.mul_add(position.x, position.y * position.y);
        self.nz.mul_add(position.z, self.nr2.mul_add(r2, self.n0))
    }
    fn gradient(&self, position: &Point3<f64>) -> Vector3<f64> {
        Vector3::new(
            2.0 * self.nr2 * position.x,
            2.0 * self.nr2 * position.y,
            self.nz,
        )
    }
}

/// Index function `n(r)`.
pub type IndexFn = Arc<dyn Fn(&Point3<f64>) -> f64 + Send + Sync>;
/// Gradient function `∇n(r)`.
pub type IndexGradientFn = Arc<dyn Fn(&Point3<f64>) -> Vector3<f64> + Send + Sync>;

/// Index field given by injected functions, e.g. from a material database.
///
/// Without a gradient function the gradient is approximated by central differences.
#[derive(Clone)]
pub struct FnGrin {
    index: IndexFn,
    gradient: Option<IndexGradientFn>,
}
impl FnGrin {
    /// Create a new [`FnGrin`] profile.
    #[must_use]
    pub fn new(index: IndexFn, gradient: Option<IndexGradientFn>) -> Self {
        Self { index, gradient }
    }
}
impl Debug for FnGrin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnGrin")
            .field("analytic_gradient", &self.gradient.is_some())
            .finish()
    }
}
impl GrinProfile for FnGrin {
    fn index(&self, position: &Point3<f64>) -> f64 {
        (self.index)(position)
    }
    fn gradient(&self, position: &Point3<f64>) -> Vector3<f64> {
        if let Some(gradient) = &self.gradient {
            return gradient(position);
        }
        let h = GRADIENT_STEP;
        Vector3::from_fn(|i, _| {
            let mut delta = Vector3::zeros();
            delta[i] = h;
            ((self.index)(&(position + delta)) - (self.index)(&(position - delta))) / (2.0 * h)
        })
    }
}

/// Available index fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GrinIndex {
    /// parabolic profile
    Parabolic(ParabolicGrin),
    /// injected functions
    #[serde(skip)]
    Function(FnGrin),
}
impl GrinProfile for GrinIndex {
    fn index(&self, position: &Point3<f64>) -> f64 {
        match self {
            Self::Parabolic(p) => p.index(position),
            Self::Function(p) => p.index(position),
        }
    }
    fn gradient(&self, position: &Point3<f64>) -> Vector3<f64> {
        match self {
            Self::Parabolic(p) => p.gradient(position),
            Self::Function(p) => p.gradient(position),
        }
    }
}

/// Numerical parameters of the ray path integration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrinConfig {
    step: Length,
    tolerance: Length,
    max_steps: usize,
    max_bisections: usize,
}
impl Default for GrinConfig {
    /// Create a default config with the following parameters:
    ///   - integration step: `0.1 mm`
    ///   - crossing tolerance: `1e-11 m`
    ///   - maximum number of integration steps: `100_000`
    ///   - maximum number of bisections of the crossing step: `60`
    fn default() -> Self {
        Self {
            step: millimeter!(0.1),
            tolerance: millimeter!(1e-8),
            max_steps: 100_000,
            max_bisections: 60,
        }
    }
}
fn check_positive_length(value: Length, what: &str) -> OpmResult<()> {
    if !value.is_finite() || value.value <= 0.0 {
        return Err(RaytraceError::Material(format!(
            "{what} must be positive and finite"
        )));
    }
    Ok(())
}
impl GrinConfig {
    /// Returns the integration step.
    #[must_use]
    pub const fn step(&self) -> Length {
        self.step
    }
    /// Sets the integration step.
    ///
    /// # Errors
    /// This function returns an error if the step is not positive and finite.
    pub fn set_step(&mut self, step: Length) -> OpmResult<()> {
        check_positive_length(step, "integration step")?;
        self.step = step;
        Ok(())
    }
    /// Returns the tolerance of the surface crossing.
    #[must_use]
    pub const fn tolerance(&self) -> Length {
        self.tolerance
    }
    /// Sets the tolerance of the surface crossing.
    ///
    /// # Errors
    /// This function returns an error if the tolerance is not positive and finite.
    pub fn set_tolerance(&mut self, tolerance: Length) -> OpmResult<()> {
        check_positive_length(tolerance, "crossing tolerance")?;
        self.tolerance = tolerance;
        Ok(())
    }
    /// Returns the maximum number of integration steps.
    #[must_use]
    pub const fn max_steps(&self) -> usize {
        self.max_steps
    }
    /// Sets the maximum number of integration steps.
    ///
    /// # Errors
    /// This function returns an error if the number is zero.
    pub fn set_max_steps(&mut self, max_steps: usize) -> OpmResult<()> {
        if max_steps == 0 {
            return Err(RaytraceError::Material(
                "maximum number of steps must be > 0".into(),
            ));
        }
        self.max_steps = max_steps;
        Ok(())
    }
    /// Returns the maximum number of bisections of the crossing step.
    #[must_use]
    pub const fn max_bisections(&self) -> usize {
        self.max_bisections
    }
    /// Sets the maximum number of bisections of the crossing step.
    pub fn set_max_bisections(&mut self, max_bisections: usize) {
        self.max_bisections = max_bisections;
    }
}

/// Integration state: position, ray vector `n dr/ds` and optical path length.
#[derive(Debug, Clone, Copy)]
struct PathState {
    r: Point3<f64>,
    t: Vector3<f64>,
    opl: f64,
}
impl PathState {
    fn advanced(&self, d: &Derivative, h: f64) -> Self {
        Self {
            r: self.r + h * d.dr,
            t: self.t + h * d.dt,
            opl: h.mul_add(d.dopl, self.opl),
        }
    }
}
struct Derivative {
    dr: Vector3<f64>,
    dt: Vector3<f64>,
    dopl: f64,
}

/// A medium with a spatially varying refractive index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrinMaterial {
    profile: GrinIndex,
    config: GrinConfig,
}
impl GrinMaterial {
    /// Create a new [`GrinMaterial`] with default integration parameters.
    #[must_use]
    pub fn new(profile: GrinIndex) -> Self {
        Self {
            profile,
            config: GrinConfig::default(),
        }
    }
    /// Replace the integration parameters.
    #[must_use]
    pub const fn with_config(mut self, config: GrinConfig) -> Self {
        self.config = config;
        self
    }
    /// Returns the index field.
    #[must_use]
    pub const fn profile(&self) -> &GrinIndex {
        &self.profile
    }
    /// Returns the integration parameters.
    #[must_use]
    pub const fn config(&self) -> &GrinConfig {
        &self.config
    }
    /// Refractive index at the given position.
    ///
    /// # Errors
    /// This function returns an error if the index field yields a non-positive or non-finite value.
    pub fn index_at(&self, position: &Point3<f64>) -> OpmResult<f64> {
        let n = self.profile.index(position);
        if !n.is_finite() || n <= 0.0 {
            return Err(RaytraceError::Material(format!(
                "index field yields invalid index {n} at {position}"
            )));
        }
        Ok(n)
    }
    fn derivative(&self, state: &PathState) -> Option<Derivative> {
        let n = self.profile.index(&state.r);
        if !n.is_finite() || n <= 0.0 {
            return None;
        }
        Some(Derivative {
            dr: state.t / n,
            dt: self.profile.gradient(&state.r),
            dopl: n,
        })
    }
    fn rk4_step(&self, state: &PathState, h: f64) -> Option<PathState> {
        let k1 = self.derivative(state)?;
        let k2 = self.derivative(&state.advanced(&k1, 0.5 * h))?;
        let k3 = self.derivative(&state.advanced(&k2, 0.5 * h))?;
        let k4 = self.derivative(&state.advanced(&k3, h))?;
        let next = PathState {
            r: state.r + (h / 6.0) * (k1.dr + 2.0 * k2.dr + 2.0 * k3.dr + k4.dr),
            t: state.t + (h / 6.0) * (k1.dt + 2.0 * k2.dt + 2.0 * k3.dt + k4.dt),
            opl: state.opl + (h / 6.0) * (k1.dopl + 2.0 * k2.dopl + 2.0 * k3.dopl + k4.dopl),
        };
        (next.r.iter().all(|c| c.is_finite()) && next.t.iter().all(|c| c.is_finite()))
            .then_some(next)
    }
    /// Integrate a ray from its current position up to the given surface.
    ///
    /// A ray starting or ending up outside the domain of the surface, or moving away from it for
    /// `RECEDING_STEPS` steps beyond twice its start distance, misses the surface.
    pub(crate) fn intersect(
        &self,
        ray: &RayState,
        shape: &Shape,
        frame: &Isometry,
        config: &TraceConfig,
    ) -> Result<Hit, RayStatus> {
        let step = config.grin_step().unwrap_or(self.config.step).value;
        let tolerance = self.config.tolerance.value;
        let crossing = |r: &Point3<f64>| {
            let local = frame.inverse_transform_point_f64(r);
            local.z - shape.sag(local.x, local.y)
        };
        let n_start = self
            .index_at(&ray.position)
            .map_err(|_| RayStatus::IntegrationFailure)?;
        let mut state = PathState {
            r: ray.position,
            t: n_start * ray.wave_vector.normalize(),
            opl: 0.0,
        };
        let g_start = crossing(&state.r);
        if !g_start.is_finite() {
            return Err(RayStatus::NoIntersection);
        }
        let side = g_start.signum();
        if g_start.abs() > tolerance {
            let mut distance = g_start.abs();
            let mut receding = 0;
            let mut steps = 0;
            loop {
                if steps >= self.config.max_steps {
                    return Err(RayStatus::IntegrationFailure);
                }
                let next = self
                    .rk4_step(&state, step)
                    .ok_or(RayStatus::IntegrationFailure)?;
                let g = crossing(&next.r);
                if !g.is_finite() {
                    // left the domain of the surface without crossing it
                    return Err(RayStatus::NoIntersection);
                }
                if g * side <= 0.0 {
                    state = self.bisect_crossing(&state, step, side, &crossing)?;
                    break;
                }
                if g.abs() > distance {
                    receding += 1;
                } else {
                    receding = 0;
                }
                if receding >= RECEDING_STEPS && g.abs() > 2.0 * g_start.abs() {
                    return Err(RayStatus::NoIntersection);
                }
                distance = g.abs();
                state = next;
                steps += 1;
            }
        }
        self.polish(&state, ray.wavelength, shape, frame, config)
    }
    /// Narrow down the step `[0, h]` from `start` that contains the surface crossing.
    fn bisect_crossing(
        &self,
        start: &PathState,
        h: f64,
        side: f64,
        crossing: &impl Fn(&Point3<f64>) -> f64,
    ) -> Result<PathState, RayStatus> {
        let tolerance = self.config.tolerance.value;
        let (mut lower, mut upper) = (0.0, h);
        let mut state = *start;
        for _ in 0..self.config.max_bisections {
            let mid = 0.5 * (lower + upper);
            state = self
                .rk4_step(start, mid)
                .ok_or(RayStatus::IntegrationFailure)?;
            let g = crossing(&state.r);
            if !g.is_finite() {
                return Err(RayStatus::NoIntersection);
            }
            if g.abs() <= tolerance {
                break;
            }
            if g * side > 0.0 {
                lower = mid;
            } else {
                upper = mid;
            }
        }
        Ok(state)
    }
    /// Land exactly on the surface by a straight-line intersection from the bisected point.
    fn polish(
        &self,
        state: &PathState,
        wavelength: Length,
        shape: &Shape,
        frame: &Isometry,
        config: &TraceConfig,
    ) -> Result<Hit, RayStatus> {
        let direction = state.t.normalize();
        let origin = frame.inverse_transform_point_f64(&state.r);
        let local_direction = frame.inverse_transform_vector_f64(&direction);
        let hit = shape
            .intersect_line(
                &origin,
                &local_direction,
                config.tolerance().value,
                config.max_iterations(),
            )
            .map_err(RayStatus::from)?;
        let n = self.profile.index(&state.r);
        let position = frame.transform_point_f64(&hit.point);
        let n_exit = self
            .index_at(&position)
            .map_err(|_| RayStatus::IntegrationFailure)?;
        Ok(Hit {
            ray: RayState {
                position,
                direction,
                wave_vector: n_exit * direction,
                wavelength,
            },
            local_point: hit.point,
            normal: frame.transform_vector_f64(&hit.normal),
            optical_path: hit.t.mul_add(n, state.opl),
        })
    }
}
impl Optimizable for GrinMaterial {
    fn parameter_names(&self) -> Vec<String> {
        match self.profile {
            GrinIndex::Parabolic(_) => vec!["n0".into(), "nr2".into(), "nz".into()],
            GrinIndex::Function(_) => Vec::new(),
        }
    }
    fn get_parameter(&self, name: &str) -> OpmResult<f64> {
        match (&self.profile, name) {
            (GrinIndex::Parabolic(p), "n0") => Ok(p.n0),
            (GrinIndex::Parabolic(p), "nr2") => Ok(p.nr2),
            (GrinIndex::Parabolic(p), "nz") => Ok(p.nz),
            _ => Err(unknown_parameter(name)),
        }
    }
    fn set_parameter(&mut self, name: &str, value: f64) -> OpmResult<()> {
        check_finite(name, value)?;
        let GrinIndex::Parabolic(p) = &mut self.profile else {
            return Err(unknown_parameter(name));
        };
        match name {
            "n0" if value > 0.0 => p.n0 = value,
            "n0" => {
                return Err(RaytraceError::Parameter(
                    "n0 must be positive".into(),
                ))
            }
            "nr2" => p.nr2 = value,
            "nz" => p.nz = value,
            _ => return Err(unknown_parameter(name)),
        }
        Ok(())
    }
}
