#![warn(missing_docs)]
//! Tree of local coordinate systems.
//!
//! All coordinate systems of an optical system are owned by a [`CoordinateTree`] and addressed by [`CoordId`]
//! handles. Every node stores its placement (decenter + tilt) relative to its parent. The composite transform to
//! the root is computed lazily and cached. Changing a decenter or tilt parameter invalidates the cached transforms
//! of the node and its whole subtree. [`CoordinateTree::update`] recomputes all caches eagerly.
use std::sync::OnceLock;

use log::{debug, warn};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use uom::si::f64::{Angle, Length};
use uuid::Uuid;

use crate::{
    error::{OpmResult, RaytraceError},
    meter,
    parameters::{check_finite, unknown_parameter, Optimizable},
    radian,
    utils::geom_transformation::Isometry,
};

/// Handle of a [`CoordinateSystem`] inside a [`CoordinateTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CoordId(usize);

impl CoordId {
    /// Handle of the root coordinate system of every tree.
    pub const ROOT: Self = Self(0);
}

/// Rotation axis of a tilt parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TiltAxis {
    /// rotation about the local x axis (`tilta`)
    X,
    /// rotation about the local y axis (`tiltb`)
    Y,
    /// rotation about the local z axis (`tiltc`)
    Z,
}

/// Order in which decenter and tilt are applied relative to the parent frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformOrder {
    /// translate first, then rotate about the translated origin
    #[default]
    DecenterThenTilt,
    /// rotate first, then translate along the rotated axes
    TiltThenDecenter,
}

/// Placement of a coordinate system relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalTransform {
    decenter: Point3<Length>,
    tilt: Point3<Angle>,
    order: TransformOrder,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self {
            decenter: meter!(0., 0., 0.),
            tilt: radian!(0., 0., 0.),
            order: TransformOrder::default(),
        }
    }
}

impl LocalTransform {
    /// Create a new [`LocalTransform`].
    ///
    /// # Errors
    /// This function returns an error if any of the given values is not finite.
    pub fn new(
        decenter: Point3<Length>,
        tilt: Point3<Angle>,
        order: TransformOrder,
    ) -> OpmResult<Self> {
        if decenter.iter().any(|d| !d.is_finite()) || tilt.iter().any(|t| !t.is_finite()) {
            return Err(RaytraceError::CoordinateSystem(
                "decenter and tilt must be finite".into(),
            ));
        }
        Ok(Self {
            decenter,
            tilt,
            order,
        })
    }
    /// Pure translation along the z axis (the usual "thickness" placement of sequential systems).
    ///
    /// # Errors
    /// This function returns an error if the given thickness is not finite.
    pub fn along_z(thickness: Length) -> OpmResult<Self> {
        Self::new(
            Point3::new(Length::default(), Length::default(), thickness),
            radian!(0., 0., 0.),
            TransformOrder::default(),
        )
    }
    /// Returns the decenter of this [`LocalTransform`].
    #[must_use]
    pub const fn decenter(&self) -> Point3<Length> {
        self.decenter
    }
    /// Returns the tilt angles about the x, y and z axis.
    #[must_use]
    pub const fn tilt(&self) -> Point3<Angle> {
        self.tilt
    }
    /// Returns the [`TransformOrder`].
    #[must_use]
    pub const fn order(&self) -> TransformOrder {
        self.order
    }
    fn isometry(&self) -> OpmResult<Isometry> {
        let translation = Isometry::new_translation(self.decenter)?;
        let rotation = Isometry::new(meter!(0., 0., 0.), self.tilt)?;
        Ok(match self.order {
            TransformOrder::DecenterThenTilt => translation.append(&rotation),
            TransformOrder::TiltThenDecenter => rotation.append(&translation),
        })
    }
}

/// A node of the [`CoordinateTree`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinateSystem {
    name: String,
    uuid: Uuid,
    parent: Option<CoordId>,
    children: Vec<CoordId>,
    local: LocalTransform,
    #[serde(skip)]
    to_root: OnceLock<Isometry>,
}

impl CoordinateSystem {
    fn new(name: &str, local: LocalTransform) -> Self {
        Self {
            name: name.to_owned(),
            uuid: Uuid::new_v4(),
            parent: None,
            children: Vec::new(),
            local,
            to_root: OnceLock::new(),
        }
    }
    /// Returns the name of this [`CoordinateSystem`].
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Returns the unique id of this [`CoordinateSystem`].
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }
    /// Returns the parent of this [`CoordinateSystem`] (`None` for the root and detached nodes).
    #[must_use]
    pub const fn parent(&self) -> Option<CoordId> {
        self.parent
    }
    /// Returns the children of this [`CoordinateSystem`] in insertion order.
    #[must_use]
    pub fn children(&self) -> &[CoordId] {
        &self.children
    }
    /// Returns the placement relative to the parent.
    #[must_use]
    pub const fn local_transform(&self) -> &LocalTransform {
        &self.local
    }
    /// Returns the cached transform to the root, if it is currently valid.
    #[must_use]
    pub fn cached_transform(&self) -> Option<&Isometry> {
        self.to_root.get()
    }
}

impl Optimizable for CoordinateSystem {
    fn parameter_names(&self) -> Vec<String> {
        ["decx", "decy", "decz", "tilta", "tiltb", "tiltc"]
            .iter()
            .map(|s| (*s).to_string())
            .collect()
    }
    fn get_parameter(&self, name: &str) -> OpmResult<f64> {
        let dec = self.local.decenter;
        let tilt = self.local.tilt;
        match name {
            "decx" => Ok(dec.x.value),
            "decy" => Ok(dec.y.value),
            "decz" => Ok(dec.z.value),
            "tilta" => Ok(tilt.x.value),
            "tiltb" => Ok(tilt.y.value),
            "tiltc" => Ok(tilt.z.value),
            _ => Err(unknown_parameter(name)),
        }
    }
    fn set_parameter(&mut self, name: &str, value: f64) -> OpmResult<()> {
        check_finite(name, value)?;
        let dec = &mut self.local.decenter;
        let tilt = &mut self.local.tilt;
        match name {
            "decx" => dec.x = meter!(value),
            "decy" => dec.y = meter!(value),
            "decz" => dec.z = meter!(value),
            "tilta" => tilt.x = radian!(value),
            "tiltb" => tilt.y = radian!(value),
            "tiltc" => tilt.z = radian!(value),
            _ => return Err(unknown_parameter(name)),
        }
        self.to_root = OnceLock::new();
        Ok(())
    }
}

/// Arena owning all [`CoordinateSystem`]s of an optical system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinateTree {
    nodes: Vec<Option<CoordinateSystem>>,
}

impl Default for CoordinateTree {
    fn default() -> Self {
        Self::new("global")
    }
}

impl CoordinateTree {
    /// Create a new tree consisting of a root node with the given name.
    #[must_use]
    pub fn new(root_name: &str) -> Self {
        Self {
            nodes: vec![Some(CoordinateSystem::new(
                root_name,
                LocalTransform::default(),
            ))],
        }
    }
    /// Returns the handle of the root node.
    #[must_use]
    pub const fn root(&self) -> CoordId {
        CoordId::ROOT
    }
    /// Returns the number of (existing) coordinate systems in this tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.iter().flatten().count()
    }
    /// Returns `true` if the tree only consists of its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
    /// Returns the node with the given handle.
    ///
    /// # Errors
    /// This function returns an error if no such node exists.
    pub fn get(&self, id: CoordId) -> OpmResult<&CoordinateSystem> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                RaytraceError::CoordinateSystem(format!("unknown coordinate system id {}", id.0))
            })
    }
    fn get_mut(&mut self, id: CoordId) -> OpmResult<&mut CoordinateSystem> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| {
                RaytraceError::CoordinateSystem(format!("unknown coordinate system id {}", id.0))
            })
    }
    /// Returns the name of the given node.
    ///
    /// # Errors
    /// This function returns an error if no such node exists.
    pub fn name(&self, id: CoordId) -> OpmResult<&str> {
        Ok(self.get(id)?.name())
    }
    /// Returns the parent of the given node.
    ///
    /// # Errors
    /// This function returns an error if no such node exists.
    pub fn parent(&self, id: CoordId) -> OpmResult<Option<CoordId>> {
        Ok(self.get(id)?.parent)
    }
    /// Returns the children of the given node.
    ///
    /// # Errors
    /// This function returns an error if no such node exists.
    pub fn children(&self, id: CoordId) -> OpmResult<&[CoordId]> {
        Ok(self.get(id)?.children())
    }
    /// Find a node by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<CoordId> {
        self.nodes
            .iter()
            .position(|n| n.as_ref().is_some_and(|n| n.name == name))
            .map(CoordId)
    }
    /// Iterate over the handles of all existing nodes.
    pub fn ids(&self) -> impl Iterator<Item = CoordId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| CoordId(i))
    }
    fn unique_name(&self, name: &str) -> String {
        if self.find(name).is_none() {
            return name.to_owned();
        }
        let mut counter = 1;
        loop {
            let candidate = format!("{name}_{counter}");
            if self.find(&candidate).is_none() {
                return candidate;
            }
            counter += 1;
        }
    }
    fn insert(&mut self, name: &str, local: LocalTransform) -> CoordId {
        let unique = self.unique_name(name);
        if unique != name {
            warn!("coordinate system name '{name}' already in use, renamed to '{unique}'");
        }
        self.nodes.push(Some(CoordinateSystem::new(&unique, local)));
        CoordId(self.nodes.len() - 1)
    }
    /// Add a new coordinate system as child of `parent`.
    ///
    /// If the name is already used in this tree, the new node is renamed by appending a numeric suffix.
    ///
    /// # Errors
    /// This function returns an error if the parent does not exist.
    pub fn add_child(
        &mut self,
        parent: CoordId,
        name: &str,
        local: LocalTransform,
    ) -> OpmResult<CoordId> {
        self.get(parent)?;
        let id = self.insert(name, local);
        self.get_mut(id)?.parent = Some(parent);
        self.get_mut(parent)?.children.push(id);
        Ok(id)
    }
    /// Add a new coordinate system that is not (yet) connected to any parent.
    pub fn add_detached(&mut self, name: &str, local: LocalTransform) -> CoordId {
        self.insert(name, local)
    }
    /// Returns `true` if the given node is a descendant of `ancestor` (or `ancestor` itself).
    fn is_in_subtree(&self, id: CoordId, ancestor: CoordId) -> bool {
        let mut current = Some(id);
        let mut steps = 0;
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.nodes.len() {
                return false;
            }
            current = self.get(c).ok().and_then(|n| n.parent);
        }
        false
    }
    /// Returns `true` if there is a parent chain from the given node to the root.
    #[must_use]
    pub fn is_connected_to_root(&self, id: CoordId) -> bool {
        self.get(id).is_ok() && self.is_in_subtree(id, CoordId::ROOT)
    }
    /// Attach a detached node (together with its subtree) below `parent`.
    ///
    /// # Errors
    /// This function returns an error if
    ///   - one of the nodes does not exist
    ///   - the node is the root or still attached to another parent
    ///   - `parent` lies inside the subtree of the node (this would create a cycle)
    pub fn attach(&mut self, id: CoordId, parent: CoordId) -> OpmResult<()> {
        self.get(parent)?;
        if id == CoordId::ROOT {
            return Err(RaytraceError::CoordinateSystem(
                "the root coordinate system cannot be attached".into(),
            ));
        }
        if self.get(id)?.parent.is_some() {
            return Err(RaytraceError::CoordinateSystem(format!(
                "coordinate system '{}' already has a parent",
                self.get(id)?.name
            )));
        }
        if self.is_in_subtree(parent, id) {
            return Err(RaytraceError::CoordinateSystem(format!(
                "attaching '{}' below '{}' would create a cycle",
                self.get(id)?.name,
                self.get(parent)?.name
            )));
        }
        self.get_mut(id)?.parent = Some(parent);
        self.get_mut(parent)?.children.push(id);
        self.invalidate(id);
        Ok(())
    }
    /// Detach a node (together with its subtree) from its parent.
    ///
    /// # Errors
    /// This function returns an error if the node does not exist or is the root.
    pub fn detach(&mut self, id: CoordId) -> OpmResult<()> {
        if id == CoordId::ROOT {
            return Err(RaytraceError::CoordinateSystem(
                "the root coordinate system cannot be detached".into(),
            ));
        }
        if let Some(parent) = self.get(id)?.parent {
            self.get_mut(parent)?.children.retain(|c| *c != id);
        }
        self.get_mut(id)?.parent = None;
        self.invalidate(id);
        Ok(())
    }
    /// Remove a node together with its whole subtree.
    ///
    /// # Errors
    /// This function returns an error if the node does not exist or is the root.
    pub fn remove(&mut self, id: CoordId) -> OpmResult<()> {
        self.detach(id)?;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(current.0).and_then(Option::take) {
                stack.extend(node.children);
            }
        }
        Ok(())
    }
    /// Clear the cached transforms of a node and all its descendants.
    fn invalidate(&mut self, id: CoordId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(current.0).and_then(Option::as_mut) {
                node.to_root = OnceLock::new();
                stack.extend(node.children.iter().copied());
            }
        }
    }
    fn check_attached(&self, id: CoordId) -> OpmResult<()> {
        if self.is_connected_to_root(id) {
            Ok(())
        } else {
            Err(RaytraceError::CoordinateSystem(format!(
                "coordinate system '{}' is not connected to the root",
                self.get(id)?.name
            )))
        }
    }
    /// Set the tilt about one axis.
    ///
    /// # Errors
    /// This function returns an error if the node does not exist, is not connected to the root or the angle is
    /// not finite.
    pub fn set_tilt(&mut self, id: CoordId, axis: TiltAxis, angle: Angle) -> OpmResult<()> {
        let name = match axis {
            TiltAxis::X => "tilta",
            TiltAxis::Y => "tiltb",
            TiltAxis::Z => "tiltc",
        };
        self.set_parameter(id, name, angle.value)
    }
    /// Set the decenter of a node.
    ///
    /// # Errors
    /// This function returns an error if the node does not exist, is not connected to the root or any value
    /// is not finite.
    pub fn set_decenter(
        &mut self,
        id: CoordId,
        dx: Length,
        dy: Length,
        dz: Length,
    ) -> OpmResult<()> {
        self.check_attached(id)?;
        if !(dx.is_finite() && dy.is_finite() && dz.is_finite()) {
            return Err(RaytraceError::CoordinateSystem(
                "decenter must be finite".into(),
            ));
        }
        self.get_mut(id)?.local.decenter = Point3::new(dx, dy, dz);
        self.invalidate(id);
        Ok(())
    }
    /// Set the order in which decenter and tilt of a node are applied.
    ///
    /// # Errors
    /// This function returns an error if the node does not exist or is not connected to the root.
    pub fn set_transform_order(&mut self, id: CoordId, order: TransformOrder) -> OpmResult<()> {
        self.check_attached(id)?;
        self.get_mut(id)?.local.order = order;
        self.invalidate(id);
        Ok(())
    }
    /// Read a named parameter (`decx`, ..., `tiltc`) of a node.
    ///
    /// # Errors
    /// This function returns an error if the node or the parameter does not exist.
    pub fn parameter(&self, id: CoordId, name: &str) -> OpmResult<f64> {
        self.get(id)?.get_parameter(name)
    }
    /// Write a named parameter (`decx`, ..., `tiltc`) of a node and invalidate the affected caches.
    ///
    /// # Errors
    /// This function returns an error if the node or the parameter does not exist, the node is detached or the
    /// value is not finite.
    pub fn set_parameter(&mut self, id: CoordId, name: &str, value: f64) -> OpmResult<()> {
        self.check_attached(id)?;
        self.get_mut(id)?.set_parameter(name, value)?;
        self.invalidate(id);
        Ok(())
    }
    /// Returns the transform mapping local coordinates of the given node to root coordinates.
    ///
    /// The result is cached until a parameter of the node or one of its ancestors changes.
    ///
    /// # Errors
    /// This function returns an error if the node does not exist or is not connected to the root.
    pub fn transform_to_root(&self, id: CoordId) -> OpmResult<Isometry> {
        if let Some(iso) = self.get(id)?.to_root.get() {
            return Ok(*iso);
        }
        self.check_attached(id)?;
        // walk up to the first node with a valid cache (or the root) and fill the caches downwards
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.get(current)?.parent {
            if self.get(parent)?.to_root.get().is_some() {
                break;
            }
            path.push(parent);
            current = parent;
        }
        let mut iso = Isometry::identity();
        for node_id in path.iter().rev() {
            let node = self.get(*node_id)?;
            let parent_iso = match node.parent {
                Some(p) => self.get(p)?.to_root.get().copied().unwrap_or(iso),
                None => Isometry::identity(),
            };
            iso = parent_iso.append(&node.local.isometry()?);
            // another thread may have filled the cache in the meantime, which yields the same value
            iso = *node.to_root.get_or_init(|| iso);
        }
        Ok(iso)
    }
    /// Returns the transform mapping coordinates of `from` into coordinates of `to`.
    ///
    /// # Errors
    /// This function returns an error if one of the nodes does not exist or is not connected to the root.
    pub fn transform_between(&self, from: CoordId, to: CoordId) -> OpmResult<Isometry> {
        let from_iso = self.transform_to_root(from)?;
        let to_iso = self.transform_to_root(to)?;
        Ok(to_iso.inverse().append(&from_iso))
    }
    /// Transform a point given in the local frame of `id` into root coordinates.
    ///
    /// # Errors
    /// This function returns an error if the node does not exist or is not connected to the root.
    pub fn local_to_global(&self, id: CoordId, point: &Point3<Length>) -> OpmResult<Point3<Length>> {
        Ok(self.transform_to_root(id)?.transform_point(point))
    }
    /// Transform a point given in root coordinates into the local frame of `id`.
    ///
    /// # Errors
    /// This function returns an error if the node does not exist or is not connected to the root.
    pub fn global_to_local(&self, id: CoordId, point: &Point3<Length>) -> OpmResult<Point3<Length>> {
        Ok(self.transform_to_root(id)?.inverse_transform_point(point))
    }
    /// Transform a direction given in the local frame of `id` into root coordinates.
    ///
    /// # Errors
    /// This function returns an error if the node does not exist or is not connected to the root.
    pub fn local_to_global_direction(
        &self,
        id: CoordId,
        direction: &Vector3<f64>,
    ) -> OpmResult<Vector3<f64>> {
        Ok(self.transform_to_root(id)?.transform_vector_f64(direction))
    }
    /// Transform a direction given in root coordinates into the local frame of `id`.
    ///
    /// # Errors
    /// This function returns an error if the node does not exist or is not connected to the root.
    pub fn global_to_local_direction(
        &self,
        id: CoordId,
        direction: &Vector3<f64>,
    ) -> OpmResult<Vector3<f64>> {
        Ok(self.transform_to_root(id)?.inverse_transform_vector_f64(direction))
    }
    /// Recompute the cached transforms of all nodes connected to the root.
    ///
    /// # Errors
    /// This function returns an error if a local transform cannot be computed.
    pub fn update(&mut self) -> OpmResult<()> {
        for node in self.nodes.iter_mut().flatten() {
            node.to_root = OnceLock::new();
        }
        let mut updated = 0;
        let mut stack = vec![CoordId::ROOT];
        while let Some(id) = stack.pop() {
            self.transform_to_root(id)?;
            updated += 1;
            stack.extend(self.get(id)?.children.iter().copied());
        }
        debug!("coordinate tree updated ({updated} coordinate systems)");
        Ok(())
    }
}
