#![warn(missing_docs)]
//! Optical systems and surface sequences
//!
//! An [`OpticalSystem`] owns the tree of coordinate systems, all surfaces and all materials. Surfaces and materials
//! are addressed by unique names. A [`Sequence`] lists the surfaces a ray bundle has to traverse. Surfaces may
//! appear more than once in a sequence (e.g. in folded systems).
use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    coordinates::{CoordId, CoordinateTree},
    error::{OpmResult, RaytraceError},
    material::Material,
    parameters::{Optimizable, ParameterPath},
    surface::Surface,
};

/// Name of the background material every [`OpticalSystem`] is created with.
pub const VACUUM: &str = "vacuum";

/// A single step of a [`Sequence`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceEntry {
    surface: String,
    is_mirror: bool,
}
impl SequenceEntry {
    /// Create a new [`SequenceEntry`].
    #[must_use]
    pub fn new(surface: &str, is_mirror: bool) -> Self {
        Self {
            surface: surface.to_owned(),
            is_mirror,
        }
    }
    /// Returns the name of the surface.
    #[must_use]
    pub fn surface(&self) -> &str {
        &self.surface
    }
    /// Returns `true` if the surface acts as a mirror in this step.
    #[must_use]
    pub const fn is_mirror(&self) -> bool {
        self.is_mirror
    }
}

/// Ordered list of surfaces to be traversed by a ray bundle.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    entries: Vec<SequenceEntry>,
}
impl Sequence {
    /// Create an empty [`Sequence`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
    /// Append a refracting step.
    #[must_use]
    pub fn refract(mut self, surface: &str) -> Self {
        self.push(SequenceEntry::new(surface, false));
        self
    }
    /// Append a reflecting step.
    #[must_use]
    pub fn reflect(mut self, surface: &str) -> Self {
        self.push(SequenceEntry::new(surface, true));
        self
    }
    /// Append a step.
    pub fn push(&mut self, entry: SequenceEntry) {
        self.entries.push(entry);
    }
    /// Returns all steps in order.
    #[must_use]
    pub fn entries(&self) -> &[SequenceEntry] {
        &self.entries
    }
    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    /// Returns `true` if the sequence has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    fn remove_surface(&mut self, surface: &str) {
        self.entries.retain(|e| e.surface != surface);
    }
}

/// Surfaces, materials and coordinate systems of an optical setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpticalSystem {
    coordinates: CoordinateTree,
    surfaces: BTreeMap<String, Surface>,
    materials: BTreeMap<String, Material>,
    background: String,
    sequence: Sequence,
}
impl Default for OpticalSystem {
    /// Create an empty system surrounded by vacuum.
    fn default() -> Self {
        let mut materials = BTreeMap::new();
        materials.insert(VACUUM.to_owned(), Material::vacuum());
        Self {
            coordinates: CoordinateTree::default(),
            surfaces: BTreeMap::new(),
            materials,
            background: VACUUM.to_owned(),
            sequence: Sequence::new(),
        }
    }
}
impl OpticalSystem {
    /// Returns the tree of coordinate systems.
    #[must_use]
    pub const fn coordinates(&self) -> &CoordinateTree {
        &self.coordinates
    }
    /// Returns the tree of coordinate systems for modification.
    ///
    /// After changing coordinate parameters, [`OpticalSystem::update`] should be called before the next trace.
    pub fn coordinates_mut(&mut self) -> &mut CoordinateTree {
        &mut self.coordinates
    }
    /// Register a material under the given name.
    ///
    /// # Errors
    /// This function returns an error if the name is empty or already used.
    pub fn add_material(&mut self, name: &str, material: Material) -> OpmResult<()> {
        if name.is_empty() {
            return Err(RaytraceError::Configuration(
                "material name must not be empty".into(),
            ));
        }
        if self.materials.contains_key(name) {
            return Err(RaytraceError::Configuration(format!(
                "material '{name}' already exists"
            )));
        }
        debug!("adding {} material '{name}'", material.kind());
        self.materials.insert(name.to_owned(), material);
        Ok(())
    }
    /// Returns the material with the given name.
    ///
    /// # Errors
    /// This function returns an error if no such material exists.
    pub fn material(&self, name: &str) -> OpmResult<&Material> {
        self.materials.get(name).ok_or_else(|| {
            RaytraceError::Configuration(format!("unknown material '{name}'"))
        })
    }
    /// Returns the material with the given name for modification.
    ///
    /// # Errors
    /// This function returns an error if no such material exists.
    pub fn material_mut(&mut self, name: &str) -> OpmResult<&mut Material> {
        self.materials.get_mut(name).ok_or_else(|| {
            RaytraceError::Configuration(format!("unknown material '{name}'"))
        })
    }
    /// Returns the names of all materials.
    pub fn material_names(&self) -> impl Iterator<Item = &str> {
        self.materials.keys().map(String::as_str)
    }
    /// Returns the name of the material surrounding the first surface.
    #[must_use]
    pub fn background(&self) -> &str {
        &self.background
    }
    /// Returns the material surrounding the first surface.
    ///
    /// # Errors
    /// This function returns an error if the background material does not exist.
    pub fn background_material(&self) -> OpmResult<&Material> {
        self.material(&self.background)
    }
    /// Declare a registered material as background material.
    ///
    /// # Errors
    /// This function returns an error if no such material exists.
    pub fn set_background(&mut self, name: &str) -> OpmResult<()> {
        self.material(name)?;
        name.clone_into(&mut self.background);
        Ok(())
    }
    /// Add a surface to this system and append it (as refracting step) to the default sequence.
    ///
    /// # Errors
    /// This function returns an error if
    ///   - a surface with the same name already exists
    ///   - the coordinate system of the surface is not connected to the root
    ///   - the material of the surface is not registered
    pub fn add_surface(&mut self, surface: Surface) -> OpmResult<()> {
        let name = surface.name().to_owned();
        if self.surfaces.contains_key(&name) {
            return Err(RaytraceError::Configuration(format!(
                "surface '{name}' already exists"
            )));
        }
        self.check_surface(&surface)?;
        debug!(
            "adding surface '{name}' in coordinate system '{}'",
            self.coordinates.name(surface.coordinate_system())?
        );
        self.surfaces.insert(name.clone(), surface);
        self.sequence.push(SequenceEntry::new(&name, false));
        Ok(())
    }
    fn check_surface(&self, surface: &Surface) -> OpmResult<()> {
        if !self
            .coordinates
            .is_connected_to_root(surface.coordinate_system())
        {
            return Err(RaytraceError::Configuration(format!(
                "coordinate system of surface '{}' is not connected to the root",
                surface.name()
            )));
        }
        if !self.materials.contains_key(surface.material()) {
            return Err(RaytraceError::Configuration(format!(
                "surface '{}' refers to unknown material '{}'",
                surface.name(),
                surface.material()
            )));
        }
        Ok(())
    }
    /// Remove a surface together with its coordinate system (and all coordinate systems below it).
    ///
    /// The surface is also removed from the default sequence.
    ///
    /// # Errors
    /// This function returns an error if the surface does not exist or another surface is placed in the coordinate
    /// subtree that would be removed.
    pub fn remove_surface(&mut self, name: &str) -> OpmResult<Surface> {
        let id = self.surface(name)?.coordinate_system();
        if let Some(other) = self
            .surfaces
            .values()
            .find(|s| s.name() != name && self.is_below(s.coordinate_system(), id))
        {
            return Err(RaytraceError::Configuration(format!(
                "cannot remove surface '{name}': surface '{}' depends on its coordinate system",
                other.name()
            )));
        }
        let Some(surface) = self.surfaces.remove(name) else {
            return Err(unknown_surface(name));
        };
        if id != self.coordinates.root() {
            self.coordinates.remove(id)?;
        }
        self.sequence.remove_surface(name);
        debug!("removed surface '{name}'");
        Ok(surface)
    }
    /// Returns `true` if `id` lies in the subtree of `ancestor`.
    fn is_below(&self, id: CoordId, ancestor: CoordId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.coordinates.parent(c).ok().flatten();
        }
        false
    }
    /// Returns the surface with the given name.
    ///
    /// # Errors
    /// This function returns an error if no such surface exists.
    pub fn surface(&self, name: &str) -> OpmResult<&Surface> {
        self.surfaces.get(name).ok_or_else(|| unknown_surface(name))
    }
    /// Returns the surface with the given name for modification.
    ///
    /// # Errors
    /// This function returns an error if no such surface exists.
    pub fn surface_mut(&mut self, name: &str) -> OpmResult<&mut Surface> {
        self.surfaces
            .get_mut(name)
            .ok_or_else(|| unknown_surface(name))
    }
    /// Returns all surfaces ordered by name.
    pub fn surfaces(&self) -> impl Iterator<Item = &Surface> {
        self.surfaces.values()
    }
    /// Returns the aperture stop (the first surface flagged as stop in the order of the default sequence).
    #[must_use]
    pub fn stop_surface(&self) -> Option<&Surface> {
        self.sequence
            .entries()
            .iter()
            .filter_map(|e| self.surfaces.get(e.surface()))
            .find(|s| s.is_stop())
    }
    /// Returns the default sequence (all surfaces in the order they were added).
    #[must_use]
    pub const fn sequence(&self) -> &Sequence {
        &self.sequence
    }
    /// Replace the default sequence.
    ///
    /// # Errors
    /// This function returns an error if the sequence is not valid for this system.
    pub fn set_sequence(&mut self, sequence: Sequence) -> OpmResult<()> {
        self.validate(&sequence)?;
        self.sequence = sequence;
        Ok(())
    }
    /// Check that a sequence can be traced through this system.
    ///
    /// # Errors
    /// This function returns an error if
    ///   - the sequence is empty
    ///   - the background material does not exist
    ///   - a surface of the sequence does not exist, is not connected to the root or refers to an unknown material
    pub fn validate(&self, sequence: &Sequence) -> OpmResult<()> {
        if sequence.is_empty() {
            return Err(RaytraceError::Configuration("sequence is empty".into()));
        }
        self.background_material()?;
        for entry in sequence.entries() {
            let surface = self.surface(entry.surface())?;
            self.check_surface(surface)?;
        }
        Ok(())
    }
    /// Recompute all cached coordinate transforms.
    ///
    /// # Errors
    /// This function returns an error if a coordinate transform cannot be computed.
    pub fn update(&mut self) -> OpmResult<()> {
        self.coordinates.update()
    }
    /// Read a parameter addressed by its path (see [`crate::parameters`]).
    ///
    /// # Errors
    /// This function returns an error if the path is malformed or does not address an existing parameter.
    pub fn get_value(&self, path: &str) -> OpmResult<f64> {
        match ParameterPath::parse(path)? {
            ParameterPath::Coordinates { name, param } => {
                self.coordinates.parameter(self.coordinate_id(name)?, param)
            }
            ParameterPath::Shape { surface, param } => {
                self.surface(surface)?.shape().get_parameter(param)
            }
            ParameterPath::Aperture { surface, param } => {
                self.surface(surface)?.aperture().get_parameter(param)
            }
            ParameterPath::Material { name, param } => self.material(name)?.get_parameter(param),
        }
    }
    /// Write a parameter addressed by its path (see [`crate::parameters`]).
    ///
    /// Coordinate parameters invalidate the cached transforms of the affected subtree.
    ///
    /// # Errors
    /// This function returns an error if the path is malformed, does not address an existing parameter or the value
    /// is invalid for the parameter.
    pub fn set_value(&mut self, path: &str, value: f64) -> OpmResult<()> {
        match ParameterPath::parse(path)? {
            ParameterPath::Coordinates { name, param } => {
                let id = self.coordinate_id(name)?;
                self.coordinates.set_parameter(id, param, value)
            }
            ParameterPath::Shape { surface, param } => self
                .surface_mut(surface)?
                .shape_mut()
                .set_parameter(param, value),
            ParameterPath::Aperture { surface, param } => self
                .surface_mut(surface)?
                .aperture_mut()
                .set_parameter(param, value),
            ParameterPath::Material { name, param } => {
                self.material_mut(name)?.set_parameter(param, value)
            }
        }
    }
    /// Returns the paths of all parameters of this system.
    #[must_use]
    pub fn parameter_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for id in self.coordinates.ids().filter(|id| *id != self.coordinates.root()) {
            if let Ok(cs) = self.coordinates.get(id) {
                paths.extend(
                    cs.parameter_names()
                        .iter()
                        .map(|p| format!("coordinates/{}/{p}", cs.name())),
                );
            }
        }
        for (name, surface) in &self.surfaces {
            paths.extend(
                surface
                    .shape()
                    .parameter_names()
                    .iter()
                    .map(|p| format!("surfaces/{name}/shape/{p}")),
            );
            paths.extend(
                surface
                    .aperture()
                    .parameter_names()
                    .iter()
                    .map(|p| format!("surfaces/{name}/aperture/{p}")),
            );
        }
        for (name, material) in &self.materials {
            paths.extend(
                material
                    .parameter_names()
                    .iter()
                    .map(|p| format!("materials/{name}/{p}")),
            );
        }
        paths
    }
    fn coordinate_id(&self, name: &str) -> OpmResult<CoordId> {
        self.coordinates.find(name).ok_or_else(|| {
            RaytraceError::Parameter(format!("unknown coordinate system '{name}'"))
        })
    }
}

fn unknown_surface(name: &str) -> RaytraceError {
    RaytraceError::Configuration(format!("unknown surface '{name}'"))
}
