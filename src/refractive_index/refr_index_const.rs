//! Wavelength independent refractive index
use serde::{Deserialize, Serialize};
use uom::si::f64::Length;

use super::{RefractiveIndex, RefractiveIndexType};
use crate::error::{OpmResult, RaytraceError};

/// Refractive index model returning the same value for all wavelengths.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct RefrIndexConst {
    refractive_index: f64,
}
impl RefrIndexConst {
    /// Create a new constant refractive index model.
    ///
    /// # Errors
    ///
    /// This function will return an error if the given index is < 1.0 or not finite.
    pub fn new(refractive_index: f64) -> OpmResult<Self> {
        if refractive_index < 1.0 || !refractive_index.is_finite() {
            return Err(RaytraceError::Material(
                "refractive index must be >=1.0 and finite".into(),
            ));
        }
        Ok(Self { refractive_index })
    }
    /// Returns the refractive index of this model.
    #[must_use]
    pub const fn refractive_index(&self) -> f64 {
        self.refractive_index
    }
    pub(crate) fn set_refractive_index(&mut self, refractive_index: f64) -> OpmResult<()> {
        *self = Self::new(refractive_index)?;
        Ok(())
    }
}
impl Default for RefrIndexConst {
    fn default() -> Self {
        refr_index_vaccuum()
    }
}

/// Returns the refractive index model of vacuum (n = 1.0).
#[must_use]
pub const fn refr_index_vaccuum() -> RefrIndexConst {
    RefrIndexConst {
        refractive_index: 1.0,
    }
}

impl RefractiveIndex for RefrIndexConst {
    fn get_refractive_index(&self, _wavelength: Length) -> OpmResult<f64> {
        Ok(self.refractive_index)
    }
    fn to_enum(&self) -> RefractiveIndexType {
        RefractiveIndexType::Const(self.clone())
    }
}
impl From<RefrIndexConst> for RefractiveIndexType {
    fn from(refr: RefrIndexConst) -> Self {
        Self::Const(refr)
    }
}
#[cfg(test)]
mod test {
    use super::*;
    use crate::nanometer;
    #[test]
    fn new() {
        assert!(RefrIndexConst::new(0.99).is_err());
        assert!(RefrIndexConst::new(f64::NAN).is_err());
        assert!(RefrIndexConst::new(f64::INFINITY).is_err());
        let i = RefrIndexConst::new(1.5).unwrap();
        assert_eq!(i.refractive_index(), 1.5);
        assert_eq!(i.get_refractive_index(nanometer!(1054.0)).unwrap(), 1.5);
    }
    #[test]
    fn vacuum() {
        assert_eq!(RefrIndexConst::default().refractive_index(), 1.0);
    }
    #[test]
    fn set_refractive_index() {
        let mut i = refr_index_vaccuum();
        assert!(i.set_refractive_index(0.5).is_err());
        assert_eq!(i.refractive_index(), 1.0);
        i.set_refractive_index(2.0).unwrap();
        assert_eq!(i.refractive_index(), 2.0);
    }
}
