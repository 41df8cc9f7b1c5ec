#![warn(missing_docs)]
//! Uniform get/set access to all tunable scalars of an optical system.
//!
//! Every numeric parameter that an external optimizer may vary is reachable by a stable, path-like identifier:
//!
//! | path                                         | value                               |
//! |----------------------------------------------|-------------------------------------|
//! | `coordinates/<name>/decx` (`decy`, `decz`)   | decenter in meters                  |
//! | `coordinates/<name>/tilta` (`tiltb`,`tiltc`) | tilt in radians                     |
//! | `surfaces/<name>/shape/<param>`              | shape coefficient (e.g. `curvature`)|
//! | `surfaces/<name>/aperture/<param>`           | aperture size in meters             |
//! | `materials/<name>/<param>`                   | dispersion coefficient              |
//!
//! After writing coordinate parameters, [`OpticalSystem::update`](crate::optical_system::OpticalSystem::update)
//! should be called before the next trace.
use crate::error::{OpmResult, RaytraceError};

/// Access to the named scalar parameters of an entity.
pub trait Optimizable {
    /// Names of all parameters of this entity.
    fn parameter_names(&self) -> Vec<String>;
    /// Read a parameter.
    ///
    /// # Errors
    /// This function returns an error if the parameter does not exist.
    fn get_parameter(&self, name: &str) -> OpmResult<f64>;
    /// Write a parameter.
    ///
    /// # Errors
    /// This function returns an error if the parameter does not exist or the value is invalid for it.
    fn set_parameter(&mut self, name: &str, value: f64) -> OpmResult<()>;
}

pub(crate) fn unknown_parameter(name: &str) -> RaytraceError {
    RaytraceError::Parameter(format!("unknown parameter '{name}'"))
}

pub(crate) fn check_finite(name: &str, value: f64) -> OpmResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(RaytraceError::Parameter(format!(
            "value of parameter '{name}' must be finite"
        )))
    }
}

/// A parsed parameter path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterPath<'a> {
    /// `coordinates/<name>/<param>`
    Coordinates {
        /// name of the coordinate system
        name: &'a str,
        /// parameter name
        param: &'a str,
    },
    /// `surfaces/<name>/shape/<param>`
    Shape {
        /// surface name
        surface: &'a str,
        /// parameter name
        param: &'a str,
    },
    /// `surfaces/<name>/aperture/<param>`
    Aperture {
        /// surface name
        surface: &'a str,
        /// parameter name
        param: &'a str,
    },
    /// `materials/<name>/<param>`
    Material {
        /// material name
        name: &'a str,
        /// parameter name
        param: &'a str,
    },
}

impl<'a> ParameterPath<'a> {
    /// Parse a path string.
    ///
    /// # Errors
    /// This function returns an error if the path is malformed.
    pub fn parse(path: &'a str) -> OpmResult<Self> {
        let parts: Vec<&str> = path.split('/').collect();
        match *parts.as_slice() {
            ["coordinates", name, param] => Ok(Self::Coordinates { name, param }),
            ["surfaces", surface, "shape", param] => Ok(Self::Shape { surface, param }),
            ["surfaces", surface, "aperture", param] => Ok(Self::Aperture { surface, param }),
            ["materials", name, param] => Ok(Self::Material { name, param }),
            _ => Err(RaytraceError::Parameter(format!(
                "malformed parameter path '{path}'"
            ))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    #[test]
    fn parse_paths() {
        assert_eq!(
            ParameterPath::parse("coordinates/lens1/tilta").unwrap(),
            ParameterPath::Coordinates {
                name: "lens1",
                param: "tilta"
            }
        );
        assert_eq!(
            ParameterPath::parse("surfaces/front/shape/curvature").unwrap(),
            ParameterPath::Shape {
                surface: "front",
                param: "curvature"
            }
        );
        assert_eq!(
            ParameterPath::parse("surfaces/front/aperture/radius").unwrap(),
            ParameterPath::Aperture {
                surface: "front",
                param: "radius"
            }
        );
        assert_eq!(
            ParameterPath::parse("materials/glass/n").unwrap(),
            ParameterPath::Material {
                name: "glass",
                param: "n"
            }
        );
    }
    #[test]
    fn parse_malformed() {
        assert_matches!(
            ParameterPath::parse("surfaces/front/curvature"),
            Err(RaytraceError::Parameter(_))
        );
        assert!(ParameterPath::parse("").is_err());
        assert!(ParameterPath::parse("materials/glass/n/extra").is_err());
    }
    #[test]
    fn finite_check() {
        assert!(check_finite("x", 1.0).is_ok());
        assert!(check_finite("x", f64::NAN).is_err());
    }
}
