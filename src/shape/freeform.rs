//! Freeform surfaces given by injected functions.
use std::{fmt::Debug, sync::Arc};

use nalgebra::Vector3;

use super::{numerical_central_curvature, numerical_gradient, SurfaceShape};
use crate::{
    error::OpmResult,
    parameters::{unknown_parameter, Optimizable},
};

/// Sag function `(x, y) -> z` (meters).
pub type SagFn = Arc<dyn Fn(f64, f64) -> f64 + Send + Sync>;
/// Gradient function `(x, y) -> (∂f/∂x, ∂f/∂y)`.
pub type GradientFn = Arc<dyn Fn(f64, f64) -> (f64, f64) + Send + Sync>;

/// A surface whose sag is given by an arbitrary function.
///
/// If no gradient function is given, the gradient is approximated by central differences.
#[derive(Clone)]
pub struct FreeformShape {
    sag: SagFn,
    gradient: Option<GradientFn>,
}

impl FreeformShape {
    /// Create a new [`FreeformShape`].
    #[must_use]
    pub fn new(sag: SagFn, gradient: Option<GradientFn>) -> Self {
        Self { sag, gradient }
    }
}

impl Debug for FreeformShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreeformShape")
            .field("analytic_gradient", &self.gradient.is_some())
            .finish()
    }
}

impl SurfaceShape for FreeformShape {
    fn sag(&self, x: f64, y: f64) -> f64 {
        (self.sag)(x, y)
    }
    fn gradient(&self, x: f64, y: f64) -> Vector3<f64> {
        self.gradient.as_ref().map_or_else(
            || numerical_gradient(|x, y| (self.sag)(x, y), x, y),
            |g| {
                let (fx, fy) = g(x, y);
                Vector3::new(-fx, -fy, 1.0)
            },
        )
    }
    fn central_curvature(&self) -> f64 {
        numerical_central_curvature(|x, y| (self.sag)(x, y))
    }
    fn kind(&self) -> &'static str {
        "freeform"
    }
}

impl Optimizable for FreeformShape {
    fn parameter_names(&self) -> Vec<String> {
        Vec::new()
    }
    fn get_parameter(&self, name: &str) -> OpmResult<f64> {
        Err(unknown_parameter(name))
    }
    fn set_parameter(&mut self, name: &str, _value: f64) -> OpmResult<()> {
        Err(unknown_parameter(name))
    }
}
