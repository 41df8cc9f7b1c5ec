//! Sellmeier model
use serde::{Deserialize, Serialize};
use uom::si::{f64::Length, length::micrometer};

use super::{RefractiveIndex, RefractiveIndexType};
use crate::error::{OpmResult, RaytraceError};

/// Refractive index model following the Sellmeier equation
///
/// `n² = 1 + Σ kᵢ λ² / (λ² - lᵢ)` with `λ` in micrometers.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct RefrIndexSellmeier1 {
    k1: f64,
    k2: f64,
    k3: f64,
    l1: f64,
    l2: f64,
    l3: f64,
}
impl Default for RefrIndexSellmeier1 {
    // N-BK7
    fn default() -> Self {
        Self {
            k1: 1.039_612_12,
            k2: 0.231_792_344,
            k3: 1.010_469_45,
            l1: 0.006_000_698_67,
            l2: 0.020_017_914_4,
            l3: 103.560_653,
        }
    }
}
impl RefrIndexSellmeier1 {
    /// Create a new refractive index model following the Sellmeier equation.
    ///
    /// # Errors
    ///
    /// This function will return an error if the given coefficients are not finite.
    pub fn new(k1: f64, k2: f64, k3: f64, l1: f64, l2: f64, l3: f64) -> OpmResult<Self> {
        if [k1, k2, k3, l1, l2, l3].iter().any(|c| !c.is_finite()) {
            return Err(RaytraceError::Material(
                "all coefficients must be finite".into(),
            ));
        }
        Ok(Self {
            k1,
            k2,
            k3,
            l1,
            l2,
            l3,
        })
    }
    pub(crate) fn coefficient_mut(&mut self, name: &str) -> Option<&mut f64> {
        match name {
            "k1" => Some(&mut self.k1),
            "k2" => Some(&mut self.k2),
            "k3" => Some(&mut self.k3),
            "l1" => Some(&mut self.l1),
            "l2" => Some(&mut self.l2),
            "l3" => Some(&mut self.l3),
            _ => None,
        }
    }
    pub(crate) fn coefficients(&self) -> [(&'static str, f64); 6] {
        [
            ("k1", self.k1),
            ("k2", self.k2),
            ("k3", self.k3),
            ("l1", self.l1),
            ("l2", self.l2),
            ("l3", self.l3),
        ]
    }
}
impl RefractiveIndex for RefrIndexSellmeier1 {
    fn get_refractive_index(&self, wavelength: Length) -> OpmResult<f64> {
        let lambda = wavelength.get::<micrometer>();
        let l_sq = lambda * lambda;
        Ok(f64::sqrt(
            1.0 + self.k1 * l_sq / (l_sq - self.l1)
                + self.k2 * l_sq / (l_sq - self.l2)
                + self.k3 * l_sq / (l_sq - self.l3),
        ))
    }
    fn to_enum(&self) -> RefractiveIndexType {
        RefractiveIndexType::Sellmeier1(self.clone())
    }
}
impl From<RefrIndexSellmeier1> for RefractiveIndexType {
    fn from(refr: RefrIndexSellmeier1) -> Self {
        Self::Sellmeier1(refr)
    }
}
#[cfg(test)]
mod test {
    use super::*;
    use crate::nanometer;
    use approx::assert_relative_eq;
    #[test]
    fn new() {
        assert!(RefrIndexSellmeier1::new(1.0, 1.0, 1.0, 1.0, 1.0, f64::NAN).is_err());
        assert!(RefrIndexSellmeier1::new(f64::INFINITY, 1.0, 1.0, 1.0, 1.0, 1.0).is_err());
        assert!(RefrIndexSellmeier1::new(1.0, 1.0, 1.0, 1.0, 1.0, 1.0).is_ok());
    }
    #[test]
    fn nbk7() {
        let i = RefrIndexSellmeier1::default();
        assert_relative_eq!(
            i.get_refractive_index(nanometer!(587.56)).unwrap(),
            1.5168,
            max_relative = 1e-4
        );
        assert_relative_eq!(
            i.get_refractive_index(nanometer!(1064.0)).unwrap(),
            1.5066,
            max_relative = 1e-4
        );
    }
    #[test]
    fn coefficients() {
        let mut i = RefrIndexSellmeier1::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0).unwrap();
        assert_eq!(i.coefficients()[4], ("l2", 5.0));
        *i.coefficient_mut("k3").unwrap() = 7.0;
        assert_eq!(i.coefficients()[2], ("k3", 7.0));
        assert!(i.coefficient_mut("k4").is_none());
    }
}
