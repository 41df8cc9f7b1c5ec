#![warn(missing_docs)]
//! Module for handling (2D) surface apertures
//!
//! An [`Aperture`] defines which part of a surface transmits rays. It is evaluated on the lateral coordinates of the
//! intersection point in the local frame of the surface and acts as a pure validity filter: rays hitting the surface
//! outside its aperture are vignetted.
//!
//! Apertures are defined by their respective configuration struct.
//! ```rust
//! use seqtrace::{aperture::{Aperture, CircleConfig}, millimeter};
//!
//! let c = CircleConfig::new(millimeter!(1.0), millimeter!(1.0, 1.0)).unwrap();
//! let ap = Aperture::Circular(c);
//! assert!(ap.contains(millimeter!(1.0), millimeter!(1.5)));
//! assert!(!ap.contains(millimeter!(0.0), millimeter!(0.0)));
//! ```
//! Furthermore, each simple aperture can act as a "hole" or as an "obstruction". By default,
//! all configurations are created as "holes".
//! ```rust
//! use seqtrace::{aperture::{Aperture, ApertureShape, ApertureType, CircleConfig}, millimeter};
//!
//! let mut c = CircleConfig::new(millimeter!(1.0), millimeter!(0.0, 0.0)).unwrap();
//! c.set_aperture_type(ApertureType::Obstruction);
//! let ap = Aperture::Circular(c);
//! assert!(!ap.contains(millimeter!(0.0), millimeter!(0.0)));
//! assert!(ap.contains(millimeter!(2.0), millimeter!(0.0)));
//! ```
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use uom::si::f64::Length;

use crate::{
    error::{OpmResult, RaytraceError},
    meter,
    parameters::{check_finite, unknown_parameter, Optimizable},
};

/// The type of a simple [`Aperture`].
///
/// Each aperture can act as a "hole" or "obstruction"
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApertureType {
    /// the [`Aperture`] shape acts as a hole. The inner part of the shape is transparent.
    #[default]
    Hole,
    /// the [`Aperture`] shape represents an obstruction. The inner part of the shape is opaque.
    Obstruction,
}

impl ApertureType {
    const fn apply(self, inside: bool) -> bool {
        match self {
            Self::Hole => inside,
            Self::Obstruction => !inside,
        }
    }
}

/// Different aperture types
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Aperture {
    /// completely transparent aperture. This is the default.
    #[default]
    None,
    /// circular aperture defined by a radius and center point
    Circular(CircleConfig),
    /// rectangular aperture defined by its half widths and center point
    Rectangular(RectangleConfig),
    /// a stack of apertures. A point is transmitted if all apertures of the stack transmit it (boolean AND).
    Stack(Vec<Aperture>),
    /// a union of apertures. A point is transmitted if any aperture of the union transmits it (boolean OR).
    Union(Vec<Aperture>),
}

impl Aperture {
    /// Returns `true` if the given point (local lateral coordinates) is transmitted by this [`Aperture`].
    #[must_use]
    pub fn contains(&self, x: Length, y: Length) -> bool {
        self.contains_meter(x.value, y.value)
    }
    /// Same as [`Aperture::contains`] with coordinates given in meters.
    #[must_use]
    pub fn contains_meter(&self, x: f64, y: f64) -> bool {
        match self {
            Self::None => true,
            Self::Circular(c) => c.contains_meter(x, y),
            Self::Rectangular(r) => r.contains_meter(x, y),
            Self::Stack(s) => s.iter().all(|a| a.contains_meter(x, y)),
            Self::Union(u) => u.iter().any(|a| a.contains_meter(x, y)),
        }
    }
    /// Convenience constructor for a centered circular hole.
    ///
    /// # Errors
    /// This function returns an error if the radius is not positive and finite.
    pub fn circular(radius: Length) -> OpmResult<Self> {
        Ok(Self::Circular(CircleConfig::new(
            radius,
            meter!(0.0, 0.0),
        )?))
    }
    fn children(&self) -> Option<&[Self]> {
        match self {
            Self::Stack(a) | Self::Union(a) => Some(a),
            _ => None,
        }
    }
    fn children_mut(&mut self) -> Option<&mut [Self]> {
        match self {
            Self::Stack(a) | Self::Union(a) => Some(a),
            _ => None,
        }
    }
}

/// Parameter names of combined apertures are prefixed with the index of the sub-aperture, e.g. `1.radius`.
fn split_indexed(name: &str) -> Option<(usize, &str)> {
    let (index, rest) = name.split_once('.')?;
    Some((index.parse().ok()?, rest))
}

impl Optimizable for Aperture {
    fn parameter_names(&self) -> Vec<String> {
        match self {
            Self::None => Vec::new(),
            Self::Circular(_) => vec!["radius".into()],
            Self::Rectangular(_) => vec!["halfwidthx".into(), "halfwidthy".into()],
            Self::Stack(a) | Self::Union(a) => a
                .iter()
                .enumerate()
                .flat_map(|(i, a)| {
                    a.parameter_names()
                        .into_iter()
                        .map(move |n| format!("{i}.{n}"))
                })
                .collect(),
        }
    }
    fn get_parameter(&self, name: &str) -> OpmResult<f64> {
        match self {
            Self::Circular(c) if name == "radius" => Ok(c.radius.value),
            Self::Rectangular(r) if name == "halfwidthx" => Ok(r.half_width_x.value),
            Self::Rectangular(r) if name == "halfwidthy" => Ok(r.half_width_y.value),
            _ => {
                let (i, rest) = split_indexed(name).ok_or_else(|| unknown_parameter(name))?;
                self.children()
                    .and_then(|c| c.get(i))
                    .ok_or_else(|| unknown_parameter(name))?
                    .get_parameter(rest)
            }
        }
    }
    fn set_parameter(&mut self, name: &str, value: f64) -> OpmResult<()> {
        check_finite(name, value)?;
        let positive = || {
            if value > 0.0 {
                Ok(meter!(value))
            } else {
                Err(RaytraceError::Parameter(format!(
                    "aperture parameter '{name}' must be positive"
                )))
            }
        };
        match self {
            Self::Circular(c) if name == "radius" => c.radius = positive()?,
            Self::Rectangular(r) if name == "halfwidthx" => r.half_width_x = positive()?,
            Self::Rectangular(r) if name == "halfwidthy" => r.half_width_y = positive()?,
            _ => {
                let (i, rest) = split_indexed(name).ok_or_else(|| unknown_parameter(name))?;
                self.children_mut()
                    .and_then(|c| c.get_mut(i))
                    .ok_or_else(|| unknown_parameter(name))?
                    .set_parameter(rest, value)?;
            }
        }
        Ok(())
    }
}

/// A trait for simple (non-combined) aperture shapes.
pub trait ApertureShape {
    /// Set the aperture type (hole / obstruction).
    fn set_aperture_type(&mut self, aperture_type: ApertureType);
    /// Returns `true` if the given point (in meters) is transmitted.
    fn contains_meter(&self, x: f64, y: f64) -> bool;
}

/// Configuration data for a circular aperture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircleConfig {
    radius: Length,
    center: Point2<Length>,
    aperture_type: ApertureType,
}

impl CircleConfig {
    /// Create a new [`CircleConfig`] from a given radius and a center point.
    ///
    /// By default the aperture has the aperture type [`ApertureType::Hole`].
    ///
    /// # Errors
    ///
    /// This function will return an error if the given radius is negative, NaN or Infinity or the center is not
    /// finite.
    pub fn new(radius: Length, center: Point2<Length>) -> OpmResult<Self> {
        if radius.is_normal()
            && radius.is_sign_positive()
            && center.x.is_finite()
            && center.y.is_finite()
        {
            Ok(Self {
                radius,
                center,
                aperture_type: ApertureType::default(),
            })
        } else {
            Err(RaytraceError::Aperture("radius must be positive".into()))
        }
    }
    /// Returns the radius of this [`CircleConfig`].
    #[must_use]
    pub const fn radius(&self) -> Length {
        self.radius
    }
}

impl ApertureShape for CircleConfig {
    fn set_aperture_type(&mut self, aperture_type: ApertureType) {
        self.aperture_type = aperture_type;
    }
    fn contains_meter(&self, x: f64, y: f64) -> bool {
        let dx = x - self.center.x.value;
        let dy = y - self.center.y.value;
        let r = self.radius.value;
        self.aperture_type.apply(dx.mul_add(dx, dy * dy) <= r * r)
    }
}

/// Configuration data for a rectangular aperture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectangleConfig {
    half_width_x: Length,
    half_width_y: Length,
    center: Point2<Length>,
    aperture_type: ApertureType,
}

impl RectangleConfig {
    /// Create a new rectangular aperture configuration by given half widths and the center point.
    ///
    /// By default the aperture has the aperture type [`ApertureType::Hole`].
    /// # Errors
    ///
    /// This function will return an error if the half widths are negative, NaN or Infinity or the center is not
    /// finite.
    pub fn new(
        half_width_x: Length,
        half_width_y: Length,
        center: Point2<Length>,
    ) -> OpmResult<Self> {
        if half_width_x.is_normal()
            && half_width_x.is_sign_positive()
            && half_width_y.is_normal()
            && half_width_y.is_sign_positive()
            && center.x.is_finite()
            && center.y.is_finite()
        {
            Ok(Self {
                half_width_x,
                half_width_y,
                center,
                aperture_type: ApertureType::default(),
            })
        } else {
            Err(RaytraceError::Aperture(
                "half widths must be positive".into(),
            ))
        }
    }
}

impl ApertureShape for RectangleConfig {
    fn set_aperture_type(&mut self, aperture_type: ApertureType) {
        self.aperture_type = aperture_type;
    }
    fn contains_meter(&self, x: f64, y: f64) -> bool {
        let inside = (x - self.center.x.value).abs() <= self.half_width_x.value
            && (y - self.center.y.value).abs() <= self.half_width_y.value;
        self.aperture_type.apply(inside)
    }
}
