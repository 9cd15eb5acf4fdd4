// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Mutable access to one node's transform.

use super::{HierarchyError, NodeId, SceneGraph, Transform, WorldSpace};
use leap_core::math::{radians_to_degrees, AngleUnit, Quaternion, Vec3};

/// A mutable borrow of one node's transform inside its [`SceneGraph`].
///
/// Every setter invalidates the world-space cache of the node and of all its
/// descendants. Local setters chain; world-space setters that must divide by
/// the parent's world scale return [`HierarchyError::DegenerateParentScale`]
/// instead of producing infinities.
///
/// ```
/// use leap_core::math::Vec3;
/// use leap_data::SceneGraph;
///
/// let mut scene = SceneGraph::new();
/// let root = scene.spawn("root")?;
/// scene
///     .transform_mut(root)?
///     .set_local_position(Vec3::new(1.0, 2.0, 3.0))
///     .scale_uniform(2.0);
/// assert_eq!(scene.world_position(root)?, Vec3::new(1.0, 2.0, 3.0));
/// # Ok::<(), leap_data::HierarchyError>(())
/// ```
#[derive(Debug)]
pub struct TransformMut<'g> {
    graph: &'g mut SceneGraph,
    index: usize,
}

impl<'g> TransformMut<'g> {
    pub(crate) fn new(graph: &'g mut SceneGraph, index: usize) -> Self {
        Self { graph, index }
    }

    /// The node being edited.
    pub fn id(&self) -> NodeId {
        self.transform().owner()
    }

    /// Read access to the local values and cache state.
    pub fn transform(&self) -> &Transform {
        &self.graph.live(self.index).transform
    }

    /// Position relative to the parent.
    pub fn local_position(&self) -> Vec3 {
        self.transform().local_position()
    }

    /// Rotation relative to the parent.
    pub fn local_rotation(&self) -> Quaternion {
        self.transform().local_rotation()
    }

    /// Euler angles of the local rotation, in radians.
    pub fn local_euler(&self) -> Vec3 {
        self.transform().local_euler()
    }

    /// Scale relative to the parent.
    pub fn local_scale(&self) -> Vec3 {
        self.transform().local_scale()
    }

    /// World-space pose, recomputed if stale.
    pub fn world(&self) -> WorldSpace {
        self.graph.resolve_world(self.index)
    }

    /// World-space position, recomputed if stale.
    pub fn world_position(&self) -> Vec3 {
        self.world().position
    }

    /// World-space rotation, recomputed if stale.
    pub fn world_rotation(&self) -> Quaternion {
        self.world().rotation
    }

    /// Euler angles of the world rotation, in radians.
    pub fn world_euler(&self) -> Vec3 {
        self.world().euler
    }

    /// Euler angles of the world rotation, in degrees.
    pub fn world_euler_degrees(&self) -> Vec3 {
        let e = self.world().euler;
        Vec3::new(
            radians_to_degrees(e.x),
            radians_to_degrees(e.y),
            radians_to_degrees(e.z),
        )
    }

    /// World-space scale, recomputed if stale.
    pub fn world_scale(&self) -> Vec3 {
        self.world().scale
    }

    // --- Local setters ---

    /// Replaces the position relative to the parent.
    pub fn set_local_position(&mut self, position: Vec3) -> &mut Self {
        self.graph.set_local_position_at(self.index, position);
        self
    }

    /// Replaces the rotation relative to the parent.
    pub fn set_local_rotation(&mut self, rotation: Quaternion) -> &mut Self {
        self.graph.set_local_rotation_at(self.index, rotation);
        self
    }

    /// Replaces the rotation relative to the parent from Euler angles.
    pub fn set_local_rotation_euler(&mut self, angles: Vec3, unit: AngleUnit) -> &mut Self {
        self.set_local_rotation(Quaternion::from_euler(unit.to_radians(angles)))
    }

    /// Replaces the scale relative to the parent.
    pub fn set_local_scale(&mut self, scale: Vec3) -> &mut Self {
        self.graph.set_local_scale_at(self.index, scale);
        self
    }

    /// Sets the same scale on all three local axes.
    pub fn set_local_scale_uniform(&mut self, scale: f32) -> &mut Self {
        self.set_local_scale(Vec3::splat(scale))
    }

    /// Offsets the local position.
    pub fn translate(&mut self, delta: Vec3) -> &mut Self {
        let position = self.local_position() + delta;
        self.set_local_position(position)
    }

    /// Applies `delta` after the current local rotation (`local = local * delta`).
    ///
    /// Quaternion products do not commute, so the order of successive calls matters.
    pub fn rotate(&mut self, delta: Quaternion) -> &mut Self {
        let rotation = self.local_rotation() * delta;
        self.set_local_rotation(rotation)
    }

    /// Same as [`rotate`](Self::rotate), with the delta given as Euler angles.
    pub fn rotate_euler(&mut self, angles: Vec3, unit: AngleUnit) -> &mut Self {
        self.rotate(Quaternion::from_euler(unit.to_radians(angles)))
    }

    /// Multiplies the local scale component-wise.
    pub fn scale_by(&mut self, factors: Vec3) -> &mut Self {
        let scale = self.local_scale() * factors;
        self.set_local_scale(scale)
    }

    /// Multiplies all three local scale axes by `factor`.
    pub fn scale_uniform(&mut self, factor: f32) -> &mut Self {
        self.scale_by(Vec3::splat(factor))
    }

    // --- World-space setters ---

    /// Solves the local position that places the node at `position` in world space.
    pub fn set_world_position(&mut self, position: Vec3) -> Result<&mut Self, HierarchyError> {
        self.graph.set_world_position_at(self.index, position)?;
        Ok(self)
    }

    /// Solves the local rotation that yields `rotation` in world space.
    pub fn set_world_rotation(&mut self, rotation: Quaternion) -> &mut Self {
        self.graph.set_world_rotation_at(self.index, rotation);
        self
    }

    /// Same as [`set_world_rotation`](Self::set_world_rotation), from Euler angles.
    pub fn set_world_rotation_euler(&mut self, angles: Vec3, unit: AngleUnit) -> &mut Self {
        self.set_world_rotation(Quaternion::from_euler(unit.to_radians(angles)))
    }

    /// Solves the local scale that yields `scale` in world space.
    pub fn set_world_scale(&mut self, scale: Vec3) -> Result<&mut Self, HierarchyError> {
        self.graph.set_world_scale_at(self.index, scale)?;
        Ok(self)
    }

    /// Solves a local scale that yields `scale` on all three world axes.
    pub fn set_world_scale_uniform(&mut self, scale: f32) -> Result<&mut Self, HierarchyError> {
        self.set_world_scale(Vec3::splat(scale))
    }
}
