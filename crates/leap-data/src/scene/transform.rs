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

use super::NodeId;
use leap_core::math::{radians_to_degrees, Quaternion, Vec3};
use std::cell::Cell;

/// The composed world-space pose of a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldSpace {
    /// Position relative to the hierarchy root.
    pub position: Vec3,
    /// Rotation relative to the hierarchy root.
    pub rotation: Quaternion,
    /// Euler angles (radians) derived from `rotation`.
    pub euler: Vec3,
    /// Per-axis scale relative to the hierarchy root.
    pub scale: Vec3,
}

impl WorldSpace {
    /// The pose of the hierarchy root's implicit parent.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quaternion::IDENTITY,
        euler: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    /// Composes a child's local pose under this (parent) pose.
    ///
    /// Scale and rotation of the parent apply to the local offset before the
    /// parent position is added. World scale is the per-axis product, which
    /// ignores the shear a rotated child of a non-uniformly scaled parent
    /// would really have.
    pub fn compose(&self, local: &Transform) -> Self {
        let rotation = self.rotation * local.local_rotation;
        Self {
            position: self.position + self.rotation * (self.scale * local.local_position),
            rotation,
            euler: rotation.to_euler(),
            scale: self.scale * local.local_scale,
        }
    }
}

impl Default for WorldSpace {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// The spatial state of one scene node.
///
/// The local values are the source of truth. The world-space values are a
/// cache guarded by a dirty flag: a freshly created transform starts dirty,
/// any setter marks it dirty again, and the owning [`SceneGraph`](super::SceneGraph)
/// refreshes the cache on the next world-space read.
///
/// The rotation is stored as a quaternion; the Euler angles are re-derived from
/// it after every change and never accumulated.
#[derive(Debug)]
pub struct Transform {
    /// The node this transform belongs to. Non-owning.
    owner: NodeId,

    pub(crate) local_position: Vec3,
    pub(crate) local_rotation: Quaternion,
    local_euler: Vec3,
    pub(crate) local_scale: Vec3,

    world: Cell<WorldSpace>,
    dirty: Cell<bool>,
    recomputations: Cell<u64>,
}

impl Transform {
    pub(crate) fn new(owner: NodeId) -> Self {
        Self {
            owner,
            local_position: Vec3::ZERO,
            local_rotation: Quaternion::IDENTITY,
            local_euler: Vec3::ZERO,
            local_scale: Vec3::ONE,
            world: Cell::new(WorldSpace::IDENTITY),
            dirty: Cell::new(true),
            recomputations: Cell::new(0),
        }
    }

    /// The node that owns this transform.
    #[inline]
    pub fn owner(&self) -> NodeId {
        self.owner
    }

    /// Position relative to the parent.
    #[inline]
    pub fn local_position(&self) -> Vec3 {
        self.local_position
    }

    /// Rotation relative to the parent.
    #[inline]
    pub fn local_rotation(&self) -> Quaternion {
        self.local_rotation
    }

    /// Euler angles of the local rotation, in radians.
    #[inline]
    pub fn local_euler(&self) -> Vec3 {
        self.local_euler
    }

    /// Euler angles of the local rotation, in degrees.
    pub fn local_euler_degrees(&self) -> Vec3 {
        let e = self.local_euler;
        Vec3::new(
            radians_to_degrees(e.x),
            radians_to_degrees(e.y),
            radians_to_degrees(e.z),
        )
    }

    /// Scale relative to the parent.
    #[inline]
    pub fn local_scale(&self) -> Vec3 {
        self.local_scale
    }

    /// Returns `true` if the cached world-space values are stale.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// How many times the world-space cache has been recomputed.
    #[inline]
    pub fn recompute_count(&self) -> u64 {
        self.recomputations.get()
    }

    // --- Crate-internal mutation, driven by the owning graph ---

    pub(crate) fn set_local_rotation(&mut self, rotation: Quaternion) {
        self.local_rotation = rotation;
        self.local_euler = rotation.to_euler();
    }

    #[inline]
    pub(crate) fn cached_world(&self) -> Option<WorldSpace> {
        (!self.dirty.get()).then(|| self.world.get())
    }

    pub(crate) fn store_world(&self, world: WorldSpace) {
        self.world.set(world);
        self.dirty.set(false);
        self.recomputations.set(self.recomputations.get() + 1);
    }

    /// Marks the cache stale. Returns `false` if it already was.
    #[inline]
    pub(crate) fn mark_dirty(&self) -> bool {
        !self.dirty.replace(true)
    }
}
