//! Module for handling the refractive index of an optical material.
#![warn(missing_docs)]
use std::{
    collections::HashMap,
    fmt::{Debug, Display},
    sync::{Arc, Mutex},
};

use serde::{Deserialize, Serialize};
use uom::si::f64::Length;

pub mod refr_index_conrady;
pub mod refr_index_const;
pub mod refr_index_schott;
pub mod refr_index_sellmeier1;

pub use refr_index_conrady::RefrIndexConrady;
pub use refr_index_const::{refr_index_vaccuum, RefrIndexConst};
pub use refr_index_schott::RefrIndexSchott;
pub use refr_index_sellmeier1::RefrIndexSellmeier1;

use crate::{
    error::{OpmResult, RaytraceError},
    parameters::{check_finite, unknown_parameter, Optimizable},
};

/// Index provider function of an external material database: wavelength → refractive index.
pub type IndexProvider = Arc<dyn Fn(Length) -> Option<f64> + Send + Sync>;

/// Refractive index delivered by an external material database.
///
/// The provider is treated as a pure function of the wavelength. Its results are cached per wavelength. Clones
/// share provider and cache.
#[derive(Clone)]
pub struct ExternalIndex {
    name: String,
    provider: IndexProvider,
    cache: Arc<Mutex<HashMap<u64, f64>>>,
}
impl ExternalIndex {
    /// Create a new [`ExternalIndex`] for the given (catalog) name and provider function.
    #[must_use]
    pub fn new(name: &str, provider: IndexProvider) -> Self {
        Self {
            name: name.to_owned(),
            provider,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }
    /// Returns the catalog name of this index.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Number of cached wavelengths.
    #[must_use]
    pub fn nr_of_cached_values(&self) -> usize {
        self.cache.lock().map_or(0, |c| c.len())
    }
}
impl Debug for ExternalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalIndex")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
impl PartialEq for ExternalIndex {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.provider, &other.provider)
    }
}
impl RefractiveIndex for ExternalIndex {
    fn get_refractive_index(&self, wavelength: Length) -> OpmResult<f64> {
        let key = wavelength.value.to_bits();
        if let Some(n) = self.cache.lock().ok().and_then(|c| c.get(&key).copied()) {
            return Ok(n);
        }
        let n = (self.provider)(wavelength).ok_or_else(|| {
            RaytraceError::Material(format!(
                "material '{}' does not provide an index at {} m",
                self.name, wavelength.value
            ))
        })?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, n);
        }
        Ok(n)
    }
    fn to_enum(&self) -> RefractiveIndexType {
        RefractiveIndexType::External(self.clone())
    }
}

/// Available models for the calculation of refractive index
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum RefractiveIndexType {
    /// Trivial model returning a wavelength-independant constant
    Const(RefrIndexConst),
    /// Sellmeier 1 model
    Sellmeier1(RefrIndexSellmeier1),
    /// Schott model
    Schott(RefrIndexSchott),
    /// Conrady model
    Conrady(RefrIndexConrady),
    /// Index delivered by an external material database
    #[serde(skip)]
    External(ExternalIndex),
}

impl Default for RefractiveIndexType {
    fn default() -> Self {
        Self::Sellmeier1(RefrIndexSellmeier1::default())
    }
}

impl RefractiveIndexType {
    /// Get the refractive index value of the [`RefractiveIndexType`] for the given wavelength.
    ///
    /// # Errors
    ///
    /// This function returns an error if the the refractive index could not be calculated e.g.:
    ///   - the given wavelength is outside defined limits.
    ///   - the model would calculate a value below 1.0, NaN or infinity (an external index may be any positive value)
    pub fn get_refractive_index(&self, wavelength: Length) -> OpmResult<f64> {
        let (refr_index, lower_limit_ok) = match self {
            Self::Const(r) => (r.get_refractive_index(wavelength)?, None),
            Self::Sellmeier1(r) => (r.get_refractive_index(wavelength)?, None),
            Self::Schott(r) => (r.get_refractive_index(wavelength)?, None),
            Self::Conrady(r) => (r.get_refractive_index(wavelength)?, None),
            Self::External(r) => {
                let n = r.get_refractive_index(wavelength)?;
                (n, Some(n > 0.0))
            }
        };
        if !refr_index.is_finite() || !lower_limit_ok.unwrap_or(refr_index >= 1.0) {
            return Err(RaytraceError::Material(
                "refractive index calculated by model is <1.0 or not finite".into(),
            ));
        }
        Ok(refr_index)
    }
    fn coefficients(&self) -> Vec<(&'static str, f64)> {
        match self {
            Self::Const(r) => vec![("n", r.refractive_index())],
            Self::Sellmeier1(r) => r.coefficients().to_vec(),
            Self::Schott(r) => r.coefficients().to_vec(),
            Self::Conrady(r) => r.coefficients().to_vec(),
            Self::External(_) => Vec::new(),
        }
    }
}

impl Display for RefractiveIndexType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Const(_) => write!(f, "Constant"),
            Self::Sellmeier1(_) => write!(f, "Sellmeier equation"),
            Self::Schott(_) => write!(f, "Schott equation"),
            Self::Conrady(_) => write!(f, "Conrady equation"),
            Self::External(e) => write!(f, "External ({})", e.name()),
        }
    }
}

impl Optimizable for RefractiveIndexType {
    fn parameter_names(&self) -> Vec<String> {
        self.coefficients()
            .into_iter()
            .map(|(name, _)| name.to_owned())
            .collect()
    }
    fn get_parameter(&self, name: &str) -> OpmResult<f64> {
        self.coefficients()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, value)| value)
            .ok_or_else(|| unknown_parameter(name))
    }
    fn set_parameter(&mut self, name: &str, value: f64) -> OpmResult<()> {
        check_finite(name, value)?;
        let coefficient = match self {
            Self::Const(r) if name == "n" => return r.set_refractive_index(value),
            Self::Sellmeier1(r) => r.coefficient_mut(name),
            Self::Schott(r) => r.coefficient_mut(name),
            Self::Conrady(r) => r.coefficient_mut(name),
            Self::Const(_) | Self::External(_) => None,
        };
        *coefficient.ok_or_else(|| unknown_parameter(name))? = value;
        Ok(())
    }
}

/// All refractive index models must implement this trait.
pub trait RefractiveIndex {
    /// Get the refractive index value of the current model for the given wavelength.
    ///
    /// # Errors
    ///
    /// This function returns an error if the the refractive index could not be calculated e.g.:
    ///   - the given wavelength is outside defined limits.
    ///   - the model would calculate a value below 1.0, NaN or infinity
    fn get_refractive_index(&self, wavelength: Length) -> OpmResult<f64>;
    /// Create a corresponding [`RefractiveIndexType`] value.
    fn to_enum(&self) -> RefractiveIndexType;
}
