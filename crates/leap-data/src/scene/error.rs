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

//! Errors raised by the scene hierarchy.

use super::NodeId;
use leap_core::math::Vec3;

/// An error raised by a [`SceneGraph`](super::SceneGraph) operation.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum HierarchyError {
    /// The handle refers to a node that has been despawned.
    #[error("node {0:?} is no longer alive")]
    StaleNode(NodeId),
    /// Attaching `node` under `parent` would make a node its own ancestor.
    #[error("cannot parent {node:?} under {parent:?}: it would create a cycle")]
    CycleDetected {
        /// The node being reparented.
        node: NodeId,
        /// The requested parent.
        parent: NodeId,
    },
    /// Every `u32` slot index is in use.
    #[error("the scene graph has no free node slot left")]
    CapacityExhausted,
    /// A world-space setter would divide by a (near) zero parent scale component.
    #[error("cannot solve world-space value for {node:?}: parent world scale {scale:?} has a zero component")]
    DegenerateParentScale {
        /// The node whose world-space value was being set.
        node: NodeId,
        /// The parent's world scale.
        scale: Vec3,
    },
}
