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

//! The node table that owns every transform of a scene.

use super::node::SceneNode;
use super::{HierarchyError, NodeId, Transform, TransformMut, WorldSpace};
use leap_core::math::{Quaternion, Vec3, EPSILON};

/// A tree of named nodes, each owning one [`Transform`].
///
/// Nodes live in a dense slot table recycled through a free list, and are
/// addressed by generational [`NodeId`] handles. Parents record their children,
/// children record their parent; a transform finds its parent's transform
/// through this table and never holds a reference to it.
///
/// World-space reads take `&self`: the caches inside each transform are
/// refreshed on demand through interior mutability. The graph is therefore
/// `Send` but not `Sync`, and is meant to be driven from a single thread.
#[derive(Debug, Default)]
pub struct SceneGraph {
    /// One entry per slot ever created. `Some` only while the node is alive.
    slots: Vec<(NodeId, Option<SceneNode>)>,
    /// Slot indices available for reuse.
    free_slots: Vec<u32>,
    live: usize,
}

impl SceneGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if the graph holds no node.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Returns `true` if `id` refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.index_of(id).is_ok()
    }

    /// Creates a root node with an identity transform.
    ///
    /// Fails only once every `u32` slot index is in use.
    pub fn spawn(&mut self, name: impl Into<String>) -> Result<NodeId, HierarchyError> {
        self.insert(name.into(), None)
    }

    /// Creates a node under `parent` with an identity local transform.
    pub fn spawn_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
    ) -> Result<NodeId, HierarchyError> {
        let parent_index = self.index_of(parent)?;
        let id = self.insert(name.into(), Some(parent))?;
        self.live_mut(parent_index).children.push(id);
        Ok(id)
    }

    fn insert(&mut self, name: String, parent: Option<NodeId>) -> Result<NodeId, HierarchyError> {
        let id = if let Some(index) = self.free_slots.pop() {
            let (id_slot, node_slot) = &mut self.slots[index as usize];
            id_slot.generation = next_generation(id_slot.generation);
            *node_slot = Some(SceneNode::new(*id_slot, name, parent));
            *id_slot
        } else {
            let index = u32::try_from(self.slots.len())
                .map_err(|_| HierarchyError::CapacityExhausted)?;
            let id = NodeId {
                index,
                generation: 0,
            };
            self.slots.push((id, Some(SceneNode::new(id, name, parent))));
            id
        };
        self.live += 1;
        Ok(id)
    }

    /// Removes `id` and its whole subtree. Returns the number of nodes removed.
    pub fn despawn(&mut self, id: NodeId) -> Result<usize, HierarchyError> {
        let index = self.index_of(id)?;
        if let Some(parent) = self.live(index).parent {
            self.live_mut(parent.index as usize)
                .children
                .retain(|&child| child != id);
        }

        let mut removed = 0;
        let mut stack = vec![index];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.slots[current].1.take() {
                stack.extend(node.children.iter().map(|child| child.index as usize));
                self.free_slots.push(current as u32);
                removed += 1;
            }
        }
        self.live -= removed;
        log::debug!("Despawned {removed} node(s) rooted at {id:?}");
        Ok(removed)
    }

    /// The name given to the node at spawn time.
    pub fn name(&self, id: NodeId) -> Result<&str, HierarchyError> {
        Ok(&self.live(self.index_of(id)?).name)
    }

    /// The node's parent, or `None` for a root.
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, HierarchyError> {
        Ok(self.live(self.index_of(id)?).parent)
    }

    /// The node's direct children, in attachment order.
    pub fn children(&self, id: NodeId) -> Result<&[NodeId], HierarchyError> {
        Ok(&self.live(self.index_of(id)?).children)
    }

    /// Iterates over the live nodes that have no parent.
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots.iter().filter_map(|(id, node)| match node {
            Some(node) if node.parent.is_none() => Some(*id),
            _ => None,
        })
    }

    /// Read access to a node's transform (local values and cache state).
    pub fn transform(&self, id: NodeId) -> Result<&Transform, HierarchyError> {
        Ok(&self.live(self.index_of(id)?).transform)
    }

    /// A mutating handle to a node's transform.
    pub fn transform_mut(&mut self, id: NodeId) -> Result<TransformMut<'_>, HierarchyError> {
        let index = self.index_of(id)?;
        Ok(TransformMut::new(self, index))
    }

    /// The node's world-space pose, recomputed if stale.
    pub fn world(&self, id: NodeId) -> Result<WorldSpace, HierarchyError> {
        Ok(self.resolve_world(self.index_of(id)?))
    }

    /// The node's world-space position, recomputed if stale.
    pub fn world_position(&self, id: NodeId) -> Result<Vec3, HierarchyError> {
        self.world(id).map(|world| world.position)
    }

    /// The node's world-space rotation, recomputed if stale.
    pub fn world_rotation(&self, id: NodeId) -> Result<Quaternion, HierarchyError> {
        self.world(id).map(|world| world.rotation)
    }

    /// The node's world-space scale, recomputed if stale.
    pub fn world_scale(&self, id: NodeId) -> Result<Vec3, HierarchyError> {
        self.world(id).map(|world| world.scale)
    }

    /// Moves `child` under `parent` (or to the root level with `None`).
    ///
    /// With `keep_world`, the child's local values are re-solved so its world
    /// pose is unchanged; otherwise the local values are kept and the world pose
    /// follows the new parent.
    pub fn set_parent(
        &mut self,
        child: NodeId,
        parent: Option<NodeId>,
        keep_world: bool,
    ) -> Result<(), HierarchyError> {
        let child_index = self.index_of(child)?;
        if let Some(parent) = parent {
            self.index_of(parent)?;
            let mut cursor = Some(parent);
            while let Some(ancestor) = cursor {
                if ancestor == child {
                    return Err(HierarchyError::CycleDetected {
                        node: child,
                        parent,
                    });
                }
                cursor = self.live(ancestor.index as usize).parent;
            }
        }

        let old_parent = self.live(child_index).parent;
        if old_parent == parent {
            return Ok(());
        }

        let world = keep_world.then(|| self.resolve_world(child_index));
        if keep_world {
            if let Some(parent) = parent {
                let scale = self.resolve_world(parent.index as usize).scale;
                if scale.min_abs_component() < EPSILON {
                    return Err(HierarchyError::DegenerateParentScale { node: child, scale });
                }
            }
        }

        if let Some(old) = old_parent {
            self.live_mut(old.index as usize)
                .children
                .retain(|&c| c != child);
        }
        if let Some(parent) = parent {
            self.live_mut(parent.index as usize).children.push(child);
        }
        self.live_mut(child_index).parent = parent;
        self.mark_subtree_dirty(child_index);

        if let Some(world) = world {
            self.set_world_rotation_at(child_index, world.rotation);
            self.set_world_scale_at(child_index, world.scale)?;
            self.set_world_position_at(child_index, world.position)?;
        }

        log::debug!("Reparented {child:?} from {old_parent:?} to {parent:?}");
        Ok(())
    }

    /// Recomputes every stale world-space cache.
    ///
    /// Intended to run once per frame after gameplay mutations, so later readers
    /// hit warm caches. Returns the number of nodes recomputed.
    pub fn refresh_world_transforms(&self) -> u64 {
        let total = |graph: &Self| -> u64 {
            graph
                .slots
                .iter()
                .filter_map(|(_, node)| node.as_ref())
                .map(|node| node.transform.recompute_count())
                .sum()
        };
        let before = total(self);
        for (index, (_, node)) in self.slots.iter().enumerate() {
            if node.as_ref().is_some_and(|node| node.transform.is_dirty()) {
                self.resolve_world(index);
            }
        }
        total(self) - before
    }

    // --- Slot access ---

    fn index_of(&self, id: NodeId) -> Result<usize, HierarchyError> {
        match self.slots.get(id.index as usize) {
            Some((slot_id, Some(_))) if *slot_id == id => Ok(id.index as usize),
            _ => Err(HierarchyError::StaleNode(id)),
        }
    }

    /// Access to a slot known to be alive: a validated index, or a parent or
    /// child link of a live node (a subtree is always removed as a whole).
    pub(crate) fn live(&self, index: usize) -> &SceneNode {
        match &self.slots[index].1 {
            Some(node) => node,
            None => unreachable!("scene slot {index} is vacant but still referenced"),
        }
    }

    pub(crate) fn live_mut(&mut self, index: usize) -> &mut SceneNode {
        match &mut self.slots[index].1 {
            Some(node) => node,
            None => unreachable!("scene slot {index} is vacant but still referenced"),
        }
    }

    // --- Lazy world-space evaluation ---

    /// Returns the world pose of the node in slot `index`, refreshing every
    /// stale cache between it and its nearest clean ancestor.
    pub(crate) fn resolve_world(&self, index: usize) -> WorldSpace {
        let node = self.live(index);
        if let Some(world) = node.transform.cached_world() {
            return world;
        }

        let mut chain = vec![index];
        let mut base = WorldSpace::IDENTITY;
        let mut cursor = node.parent;
        while let Some(parent) = cursor {
            let parent_node = self.live(parent.index as usize);
            if let Some(world) = parent_node.transform.cached_world() {
                base = world;
                break;
            }
            chain.push(parent.index as usize);
            cursor = parent_node.parent;
        }

        // Parents before children.
        for &current in chain.iter().rev() {
            let transform = &self.live(current).transform;
            base = base.compose(transform);
            transform.store_world(base);
        }
        base
    }

    /// Marks the node and all of its descendants dirty.
    ///
    /// A dirty node's descendants are always dirty, so the walk stops at any
    /// node that already was.
    pub(crate) fn mark_subtree_dirty(&self, index: usize) {
        let mut stack = vec![index];
        while let Some(current) = stack.pop() {
            let node = self.live(current);
            if node.transform.mark_dirty() {
                stack.extend(node.children.iter().map(|child| child.index as usize));
            }
        }
    }

    /// The parent's world pose and the inverse of its world scale.
    fn parent_frame(&self, index: usize) -> Result<(WorldSpace, Vec3), HierarchyError> {
        let node = self.live(index);
        let Some(parent) = node.parent else {
            return Ok((WorldSpace::IDENTITY, Vec3::ONE));
        };
        let frame = self.resolve_world(parent.index as usize);
        if frame.scale.min_abs_component() < EPSILON {
            return Err(HierarchyError::DegenerateParentScale {
                node: node.transform.owner(),
                scale: frame.scale,
            });
        }
        Ok((frame, frame.scale.recip()))
    }

    // --- Mutation by slot index, shared with `TransformMut` ---

    pub(crate) fn set_local_position_at(&mut self, index: usize, position: Vec3) {
        self.live_mut(index).transform.local_position = position;
        self.mark_subtree_dirty(index);
    }

    pub(crate) fn set_local_rotation_at(&mut self, index: usize, rotation: Quaternion) {
        self.live_mut(index).transform.set_local_rotation(rotation);
        self.mark_subtree_dirty(index);
    }

    pub(crate) fn set_local_scale_at(&mut self, index: usize, scale: Vec3) {
        self.live_mut(index).transform.local_scale = scale;
        self.mark_subtree_dirty(index);
    }

    /// Solves the local position that places the node at `position` in world space.
    ///
    /// Inverts the parent's rotation and applies the per-axis inverse of its
    /// world scale. This matches the forward composition exactly, but the
    /// parent's world scale itself is only a per-axis approximation once
    /// non-uniform scale and rotation are mixed higher up the chain.
    pub(crate) fn set_world_position_at(
        &mut self,
        index: usize,
        position: Vec3,
    ) -> Result<(), HierarchyError> {
        let (parent, inv_scale) = self.parent_frame(index)?;
        let offset = parent.rotation.conjugate() * (position - parent.position);
        self.set_local_position_at(index, inv_scale * offset);
        Ok(())
    }

    pub(crate) fn set_world_rotation_at(&mut self, index: usize, rotation: Quaternion) {
        let parent_rotation = match self.live(index).parent {
            Some(parent) => self.resolve_world(parent.index as usize).rotation,
            None => Quaternion::IDENTITY,
        };
        self.set_local_rotation_at(index, parent_rotation.inverse() * rotation);
    }

    pub(crate) fn set_world_scale_at(
        &mut self,
        index: usize,
        scale: Vec3,
    ) -> Result<(), HierarchyError> {
        let (_, inv_scale) = self.parent_frame(index)?;
        self.set_local_scale_at(index, scale * inv_scale);
        Ok(())
    }
}

/// Generation given to a recycled slot. Wraps after `u32::MAX` reuses.
#[inline]
pub(crate) fn next_generation(generation: u32) -> u32 {
    generation.wrapping_add(1)
}
