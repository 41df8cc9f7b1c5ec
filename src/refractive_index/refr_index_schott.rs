//! Schott model
use serde::{Deserialize, Serialize};
use uom::si::{f64::Length, length::micrometer};

use super::{RefractiveIndex, RefractiveIndexType};
use crate::error::{OpmResult, RaytraceError};

/// Refractive index model following the Schott (Laurent series) formula
///
/// `n² = a0 + a1 λ² + a2 λ⁻² + a3 λ⁻⁴ + a4 λ⁻⁶ + a5 λ⁻⁸` with `λ` in micrometers.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct RefrIndexSchott {
    a0: f64,
    a1: f64,
    a2: f64,
    a3: f64,
    a4: f64,
    a5: f64,
}
impl RefrIndexSchott {
    /// Create a new refractive index model following the Schott equation.
    ///
    /// # Errors
    ///
    /// This function will return an error if the given coefficients are not finite.
    pub fn new(a0: f64, a1: f64, a2: f64, a3: f64, a4: f64, a5: f64) -> OpmResult<Self> {
        if [a0, a1, a2, a3, a4, a5].iter().any(|c| !c.is_finite()) {
            return Err(RaytraceError::Material(
                "all coefficients must be finite".into(),
            ));
        }
        Ok(Self {
            a0,
            a1,
            a2,
            a3,
            a4,
            a5,
        })
    }
    pub(crate) fn coefficient_mut(&mut self, name: &str) -> Option<&mut f64> {
        match name {
            "a0" => Some(&mut self.a0),
            "a1" => Some(&mut self.a1),
            "a2" => Some(&mut self.a2),
            "a3" => Some(&mut self.a3),
            "a4" => Some(&mut self.a4),
            "a5" => Some(&mut self.a5),
            _ => None,
        }
    }
    pub(crate) fn coefficients(&self) -> [(&'static str, f64); 6] {
        [
            ("a0", self.a0),
            ("a1", self.a1),
            ("a2", self.a2),
            ("a3", self.a3),
            ("a4", self.a4),
            ("a5", self.a5),
        ]
    }
}
impl RefractiveIndex for RefrIndexSchott {
    fn get_refractive_index(&self, wavelength: Length) -> OpmResult<f64> {
        let lambda = wavelength.get::<micrometer>();
        Ok(f64::sqrt(
            self.a5.mul_add(
                lambda.powi(-8),
                self.a4.mul_add(
                    lambda.powi(-6),
                    self.a3.mul_add(
                        lambda.powi(-4),
                        self.a2
                            .mul_add(lambda.powi(-2), self.a1.mul_add(lambda.powi(2), self.a0)),
                    ),
                ),
            ),
        ))
    }
    fn to_enum(&self) -> RefractiveIndexType {
        RefractiveIndexType::Schott(self.clone())
    }
}
impl From<RefrIndexSchott> for RefractiveIndexType {
    fn from(refr: RefrIndexSchott) -> Self {
        Self::Schott(refr)
    }
}
#[cfg(test)]
mod test {
    use super::*;
    use crate::micrometer;
    use approx::assert_relative_eq;
    #[test]
    fn new() {
        assert!(RefrIndexSchott::new(1.0, 1.0, 1.0, 1.0, 1.0, f64::NAN).is_err());
        assert!(RefrIndexSchott::new(1.0, 1.0, 1.0, 1.0, f64::INFINITY, 1.0).is_err());
        assert!(RefrIndexSchott::new(f64::NAN, 1.0, 1.0, 1.0, 1.0, 1.0).is_err());
    }
    #[test]
    fn get_refractive_index() {
        let i = RefrIndexSchott::new(2.25, 0.0, 0.0, 0.0, 0.0, 0.0).unwrap();
        assert_relative_eq!(i.get_refractive_index(micrometer!(1.0)).unwrap(), 1.5);
        // at 1 µm all powers of lambda are 1
        let i = RefrIndexSchott::new(1.0, 0.25, 0.25, 0.25, 0.25, 0.25).unwrap();
        assert_relative_eq!(
            i.get_refractive_index(micrometer!(1.0)).unwrap(),
            f64::sqrt(2.25)
        );
        assert!(matches!(i.to_enum(), RefractiveIndexType::Schott(_)));
    }
}
