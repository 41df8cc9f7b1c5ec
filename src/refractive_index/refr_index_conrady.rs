//! Conrady model
use std::ops::Range;

use num::pow::Pow;
use serde::{Deserialize, Serialize};
use uom::si::{f64::Length, length::micrometer};

use super::{RefractiveIndex, RefractiveIndexType};
use crate::{
    error::{OpmResult, RaytraceError},
    nanometer,
};

/// Refractive index model following the Conrady formula `n = n0 + a / λ + b / λ^3.5` (`λ` in micrometers).
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct RefrIndexConrady {
    n0: f64,
    a: f64,
    b: f64,
    wvl_range: Range<Length>,
}

impl Default for RefrIndexConrady {
    //SiO2
    fn default() -> Self {
        Self {
            n0: 1.427,
            a: 11.1,
            b: 5.13e6,
            wvl_range: nanometer!(1000.)..nanometer!(1100.),
        }
    }
}
impl RefrIndexConrady {
    /// Create a new refractive index model following the Conrady formula.
    ///
    /// This formula is useful if only a few index / wavelength pairs are known and need to be fit to a smooth curve.
    ///
    /// # Errors
    ///
    /// This function will return an error if the given coefficients are not finite or the wavelength range is
    /// invalid.
    pub fn new(n0: f64, a: f64, b: f64, wavelength_range: Range<Length>) -> OpmResult<Self> {
        if !n0.is_finite() || !a.is_finite() || !b.is_finite() {
            return Err(RaytraceError::Material(
                "all coefficients must be finite".into(),
            ));
        }
        if wavelength_range.start.is_sign_negative() || !wavelength_range.start.is_finite() {
            return Err(RaytraceError::Material(
                "lower wavelength limit is invalid".into(),
            ));
        }
        if wavelength_range.end.is_sign_negative() || !wavelength_range.end.is_finite() {
            return Err(RaytraceError::Material(
                "upper wavelength limit is invalid".into(),
            ));
        }
        if wavelength_range.is_empty() {
            return Err(RaytraceError::Material(
                "wavelength range is empty".into(),
            ));
        }
        Ok(Self {
            n0,
            a,
            b,
            wvl_range: wavelength_range,
        })
    }
    /// Returns the wavelength range over which the Conrady equation is valid.
    #[must_use]
    pub const fn wavelength_range(&self) -> &Range<Length> {
        &self.wvl_range
    }
    pub(crate) fn coefficient_mut(&mut self, name: &str) -> Option<&mut f64> {
        match name {
            "n0" => Some(&mut self.n0),
            "a" => Some(&mut self.a),
            "b" => Some(&mut self.b),
            _ => None,
        }
    }
    pub(crate) fn coefficients(&self) -> [(&'static str, f64); 3] {
        [("n0", self.n0), ("a", self.a), ("b", self.b)]
    }
}
impl RefractiveIndex for RefrIndexConrady {
    fn get_refractive_index(&self, wavelength: Length) -> OpmResult<f64> {
        if !self.wvl_range.contains(&wavelength) {
            return Err(RaytraceError::Material(
                "wavelength outside valid range".into(),
            ));
        }
        let lambda = wavelength.get::<micrometer>();
        Ok(self.n0 + (self.a / lambda) + (self.b / lambda.pow(3.5)))
    }
    fn to_enum(&self) -> RefractiveIndexType {
        RefractiveIndexType::Conrady(self.clone())
    }
}
impl From<RefrIndexConrady> for RefractiveIndexType {
    fn from(refr: RefrIndexConrady) -> Self {
        Self::Conrady(refr)
    }
}
#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::{
        material::Material,
        parameters::Optimizable,
        refractive_index::{ExternalIndex, IndexProvider},
    };
    use approx::assert_relative_eq;
    use assert_matches::assert_matches;
    use nalgebra::Point3;

    fn fused_silica() -> Material {
        Material::from(RefractiveIndexType::from(RefrIndexConrady::default()))
    }
    #[test]
    fn new_wrong() {
        let range = || nanometer!(500.0)..nanometer!(2000.0);
        assert!(RefrIndexConrady::new(1.0, 1.0, f64::NAN, range()).is_err());
        assert!(RefrIndexConrady::new(1.0, f64::INFINITY, 1.0, range()).is_err());
        assert!(RefrIndexConrady::new(1.0, 1.0, 1.0, nanometer!(-1.0)..nanometer!(2000.0)).is_err());
        assert!(RefrIndexConrady::new(1.0, 1.0, 1.0, nanometer!(1000.0)..nanometer!(f64::NAN)).is_err());
        assert!(RefrIndexConrady::new(1.0, 1.0, 1.0, nanometer!(2000.0)..nanometer!(500.0)).is_err());
    }
    #[test]
    fn material_wavelength_range() {
        let silica = fused_silica();
        assert!(silica.check_wavelength(nanometer!(1064.0)).is_ok());
        assert_matches!(
            silica.check_wavelength(nanometer!(587.6)),
            Err(RaytraceError::Material(_))
        );
        assert_matches!(
            silica.index_at(nanometer!(1100.0), &Point3::origin()),
            Err(RaytraceError::Material(_))
        );
    }
    #[test]
    fn matches_external_provider() {
        let provider: IndexProvider = Arc::new(|wavelength: Length| {
            let lambda = wavelength.get::<micrometer>();
            Some(1.427 + 11.1 / lambda + 5.13e6 / lambda.powf(3.5))
        });
        let external = Material::from(RefractiveIndexType::External(ExternalIndex::new(
            "silica",
            provider,
        )));
        let silica = fused_silica();
        for wavelength in [nanometer!(1000.0), nanometer!(1030.0), nanometer!(1064.0)] {
            assert_relative_eq!(
                silica.index_at(wavelength, &Point3::origin()).unwrap(),
                external.index_at(wavelength, &Point3::origin()).unwrap(),
                max_relative = 1e-14
            );
        }
    }
    #[test]
    fn optimizer_coefficients() {
        let mut silica = fused_silica();
        assert_eq!(silica.parameter_names(), vec!["n0", "a", "b"]);
        let before = silica.index_at(nanometer!(1064.0), &Point3::origin()).unwrap();
        silica.set_parameter("n0", 1.527).unwrap();
        assert_relative_eq!(silica.get_parameter("n0").unwrap(), 1.527);
        assert_relative_eq!(
            silica.index_at(nanometer!(1064.0), &Point3::origin()).unwrap(),
            before + 0.1,
            max_relative = 1e-14
        );
        silica.set_parameter("b", 0.0).unwrap();
        silica.set_parameter("a", 0.0).unwrap();
        assert_relative_eq!(
            silica.index_at(nanometer!(1050.0), &Point3::origin()).unwrap(),
            1.527
        );
        assert!(silica.set_parameter("c", 1.0).is_err());
        assert!(silica.set_parameter("a", f64::NAN).is_err());
    }
}
