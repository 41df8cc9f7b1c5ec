#![warn(missing_docs)]
//! Construction of rotationally symmetric systems from a list of surface descriptors
//!
//! Every [`SurfaceDescriptor`] creates a coordinate system shifted by its `thickness` along the `z` axis of the
//! previous one, a conic surface in it and (optionally) a new material behind it.
//!
//! ```rust
//! use seqtrace::{
//!     builder::{build_simple_optical_system, SurfaceDescriptor},
//!     millimeter,
//! };
//!
//! let (system, sequence) = build_simple_optical_system(&[
//!     SurfaceDescriptor::new("front", Some(millimeter!(100.0)), millimeter!(20.0)).with_index(1.5),
//!     SurfaceDescriptor::new("back", Some(millimeter!(-100.0)), millimeter!(5.0)).with_index(1.0),
//!     SurfaceDescriptor::new("image", None, millimeter!(100.0)),
//! ])
//! .unwrap();
//! assert_eq!(sequence.len(), 3);
//! assert_eq!(system.surface("back").unwrap().material(), "n=1");
//! ```
use log::debug;
use serde::{Deserialize, Serialize};
use uom::si::f64::Length;

use crate::{
    aperture::Aperture,
    coordinates::LocalTransform,
    error::{OpmResult, RaytraceError},
    material::Material,
    meter,
    optical_system::{OpticalSystem, Sequence, SequenceEntry},
    shape::Shape,
    surface::Surface,
};

/// Reference to the material behind a surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MaterialRef {
    /// homogeneous medium with a constant refractive index
    Index(f64),
    /// material registered on the [`SystemBuilder`]
    Named(String),
}

/// Additional properties of a surface.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceOptions {
    /// surface is the aperture stop
    pub is_stop: bool,
    /// surface reflects (the medium behind the surface is ignored)
    pub is_mirror: bool,
    /// aperture of the surface
    pub aperture: Aperture,
}

/// Description of a single surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceDescriptor {
    /// radius of curvature (`None` for a flat surface)
    pub radius: Option<Length>,
    /// conic constant
    pub conic: f64,
    /// distance to the previous surface along its `z` axis
    pub thickness: Length,
    /// material behind the surface (`None`: same as in front of the surface)
    pub material: Option<MaterialRef>,
    /// name of the surface (and its coordinate system)
    pub name: String,
    /// further options
    pub options: SurfaceOptions,
}
impl SurfaceDescriptor {
    /// Create a new spherical (or flat) [`SurfaceDescriptor`] without material change.
    #[must_use]
    pub fn new(name: &str, radius: Option<Length>, thickness: Length) -> Self {
        Self {
            radius,
            conic: 0.0,
            thickness,
            material: None,
            name: name.to_owned(),
            options: SurfaceOptions::default(),
        }
    }
    /// Set the conic constant.
    #[must_use]
    pub const fn with_conic(mut self, conic: f64) -> Self {
        self.conic = conic;
        self
    }
    /// Place a homogeneous medium with the given index behind the surface.
    #[must_use]
    pub fn with_index(mut self, refractive_index: f64) -> Self {
        self.material = Some(MaterialRef::Index(refractive_index));
        self
    }
    /// Place a registered material behind the surface.
    #[must_use]
    pub fn with_material(mut self, name: &str) -> Self {
        self.material = Some(MaterialRef::Named(name.to_owned()));
        self
    }
    /// Set the aperture of the surface.
    #[must_use]
    pub fn with_aperture(mut self, aperture: Aperture) -> Self {
        self.options.aperture = aperture;
        self
    }
    /// Declare the surface as aperture stop.
    #[must_use]
    pub const fn stop(mut self) -> Self {
        self.options.is_stop = true;
        self
    }
    /// Declare the surface as mirror.
    #[must_use]
    pub const fn mirror(mut self) -> Self {
        self.options.is_mirror = true;
        self
    }
}

/// Builder for an [`OpticalSystem`] together with its [`Sequence`].
#[derive(Debug, Default, Clone)]
pub struct SystemBuilder {
    materials: Vec<(String, Material)>,
    background: Option<Material>,
    surfaces: Vec<SurfaceDescriptor>,
}
impl SystemBuilder {
    /// Create an empty [`SystemBuilder`] (vacuum background).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Register a material that can be referenced by [`MaterialRef::Named`].
    #[must_use]
    pub fn with_material(mut self, name: &str, material: Material) -> Self {
        self.materials.push((name.to_owned(), material));
        self
    }
    /// Set the medium in front of the first surface.
    #[must_use]
    pub fn with_background(mut self, material: Material) -> Self {
        self.background = Some(material);
        self
    }
    /// Append a surface.
    #[must_use]
    pub fn surface(mut self, descriptor: SurfaceDescriptor) -> Self {
        self.surfaces.push(descriptor);
        self
    }
    /// Build the system and the sequence of all surfaces.
    ///
    /// # Errors
    /// This function returns an error if
    ///   - a material name is used twice or a named material is not registered
    ///   - a refractive index, radius, conic constant or thickness is invalid
    ///   - a surface name is used twice or collides with the name of the root coordinate system
    pub fn build(self) -> OpmResult<(OpticalSystem, Sequence)> {
        let mut system = OpticalSystem::default();
        for (name, material) in self.materials {
            system.add_material(&name, material)?;
        }
        if let Some(background) = self.background {
            system.add_material("background", background)?;
            system.set_background("background")?;
        }
        let mut parent = system.coordinates().root();
        let mut current = system.background().to_owned();
        let mut sequence = Sequence::new();
        for descriptor in self.surfaces {
            if system.coordinates().find(&descriptor.name).is_some() {
                return Err(RaytraceError::Configuration(format!(
                    "coordinate system '{}' already exists",
                    descriptor.name
                )));
            }
            let coordinate_system = system.coordinates_mut().add_child(
                parent,
                &descriptor.name,
                LocalTransform::along_z(descriptor.thickness)?,
            )?;
            parent = coordinate_system;
            let shape = Shape::conic(
                descriptor.radius.unwrap_or_else(|| meter!(f64::INFINITY)),
                descriptor.conic,
            )?;
            if !descriptor.options.is_mirror {
                current = material_behind(&mut system, descriptor.material.as_ref(), current)?;
            }
            debug!(
                "surface '{}': decz = {:?}, material '{current}'",
                descriptor.name, descriptor.thickness
            );
            system.add_surface(
                Surface::new(&descriptor.name, coordinate_system, shape, &current)
                    .with_aperture(descriptor.options.aperture)
                    .with_stop(descriptor.options.is_stop),
            )?;
            sequence.push(SequenceEntry::new(
                &descriptor.name,
                descriptor.options.is_mirror,
            ));
        }
        system.set_sequence(sequence.clone())?;
        Ok((system, sequence))
    }
}

fn material_behind(
    system: &mut OpticalSystem,
    material: Option<&MaterialRef>,
    current: String,
) -> OpmResult<String> {
    match material {
        None => Ok(current),
        Some(MaterialRef::Index(n)) => {
            let name = format!("n={n}");
            if system.material(&name).is_err() {
                system.add_material(&name, Material::constant(*n)?)?;
            }
            Ok(name)
        }
        Some(MaterialRef::Named(name)) => {
            if system.material(name).is_err() {
                return Err(RaytraceError::Configuration(format!(
                    "material '{name}' is not registered"
                )));
            }
            Ok(name.clone())
        }
    }
}

/// Build an [`OpticalSystem`] and its [`Sequence`] from a list of surface descriptors (vacuum background).
///
/// # Errors
/// This function returns an error if a descriptor is invalid (see [`SystemBuilder::build`]).
pub fn build_simple_optical_system(
    descriptors: &[SurfaceDescriptor],
) -> OpmResult<(OpticalSystem, Sequence)> {
    descriptors
        .iter()
        .cloned()
        .fold(SystemBuilder::new(), SystemBuilder::surface)
        .build()
}
