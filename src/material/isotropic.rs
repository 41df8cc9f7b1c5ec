//! Homogeneous isotropic media
use serde::{Deserialize, Serialize};
use uom::si::f64::Length;

use crate::{
    error::OpmResult,
    parameters::Optimizable,
    refractive_index::{refr_index_vaccuum, RefrIndexConst, RefractiveIndexType},
};

/// A homogeneous isotropic medium described by a dispersion model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsotropicMaterial {
    refractive_index: RefractiveIndexType,
}
impl Default for IsotropicMaterial {
    fn default() -> Self {
        Self::new(RefractiveIndexType::Const(refr_index_vaccuum()))
    }
}
impl IsotropicMaterial {
    /// Create a new [`IsotropicMaterial`] from a refractive index model.
    #[must_use]
    pub const fn new(refractive_index: RefractiveIndexType) -> Self {
        Self { refractive_index }
    }
    /// Create a new [`IsotropicMaterial`] with a wavelength independent index.
    ///
    /// # Errors
    /// This function returns an error if the index is < 1.0 or not finite.
    pub fn constant(refractive_index: f64) -> OpmResult<Self> {
        Ok(Self::new(RefractiveIndexType::Const(RefrIndexConst::new(
            refractive_index,
        )?)))
    }
    /// Returns the refractive index model.
    #[must_use]
    pub const fn refractive_index(&self) -> &RefractiveIndexType {
        &self.refractive_index
    }
    /// Refractive index at the given wavelength.
    ///
    /// # Errors
    /// This function returns an error if the model cannot be evaluated at the given wavelength.
    pub fn index(&self, wavelength: Length) -> OpmResult<f64> {
        self.refractive_index.get_refractive_index(wavelength)
    }
}
impl Optimizable for IsotropicMaterial {
    fn parameter_names(&self) -> Vec<String> {
        self.refractive_index.parameter_names()
    }
    fn get_parameter(&self, name: &str) -> OpmResult<f64> {
        self.refractive_index.get_parameter(name)
    }
    fn set_parameter(&mut self, name: &str, value: f64) -> OpmResult<()> {
        self.refractive_index.set_parameter(name, value)
    }
}
#[cfg(test)]
mod test {
    use super::*;
    use crate::{nanometer, refractive_index::RefrIndexSellmeier1};
    use approx::assert_relative_eq;
    #[test]
    fn default_is_vacuum() {
        let m = IsotropicMaterial::default();
        assert_eq!(m.index(nanometer!(1000.0)).unwrap(), 1.0);
    }
    #[test]
    fn dispersion() {
        let m = IsotropicMaterial::new(RefrIndexSellmeier1::default().into());
        assert!(m.index(nanometer!(400.0)).unwrap() > m.index(nanometer!(800.0)).unwrap());
        assert_relative_eq!(
            m.index(nanometer!(587.56)).unwrap(),
            1.5168,
            max_relative = 1e-4
        );
        assert!(IsotropicMaterial::constant(0.5).is_err());
    }
}
