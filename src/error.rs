#![warn(missing_docs)]
//! Raytracer specific error structures
//!
//! Only configuration problems and invalid inputs are reported as [`RaytraceError`]. Numerical failures of
//! individual rays (non-convergent intersections, total internal reflection, vignetting) are never errors. They
//! are stored as [`RayStatus`](crate::ray_bundle::RayStatus) values in the traced bundles.
use std::{error::Error, fmt::Display};

/// Raytracer specific Result type
pub type OpmResult<T> = std::result::Result<T, RaytraceError>;

/// Errors that can be returned by various raytracer functions.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum RaytraceError {
    /// malformed optical system (unknown surface in a sequence, unreachable coordinate system, duplicate names, ...)
    Configuration(String),
    /// errors while manipulating the tree of local coordinate systems
    CoordinateSystem(String),
    /// invalid parameters of a surface shape
    Shape(String),
    /// invalid parameters of an aperture
    Aperture(String),
    /// invalid material definitions or refractive index models
    Material(String),
    /// errors while reading or writing optimizable parameters
    Parameter(String),
    /// invalid inputs of a ray trace (bundles, trace configuration)
    Trace(String),
    /// errors not falling in one of the categories above
    Other(String),
}

impl Display for RaytraceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(m) => write!(f, "Configuration:{m}"),
            Self::CoordinateSystem(m) => write!(f, "CoordinateSystem:{m}"),
            Self::Shape(m) => write!(f, "Shape:{m}"),
            Self::Aperture(m) => write!(f, "Aperture:{m}"),
            Self::Material(m) => write!(f, "Material:{m}"),
            Self::Parameter(m) => write!(f, "Parameter:{m}"),
            Self::Trace(m) => write!(f, "Trace:{m}"),
            Self::Other(m) => write!(f, "Raytrace Error:Other:{m}"),
        }
    }
}
impl Error for RaytraceError {}

impl std::convert::From<String> for RaytraceError {
    fn from(msg: String) -> Self {
        Self::Other(msg)
    }
}
