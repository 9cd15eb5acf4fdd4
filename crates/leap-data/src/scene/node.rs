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

//! Node handles and storage.

use super::Transform;

/// A handle to a node of a [`SceneGraph`](super::SceneGraph).
///
/// It combines a slot index with a generation count. When a node is despawned
/// its slot can be recycled, but the generation is incremented, so stale
/// handles to the old node are rejected instead of aliasing the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    /// The index of the node's slot in the graph.
    pub index: u32,
    /// A generation counter incremented each time the slot is recycled.
    pub generation: u32,
}

/// The data stored for one live node.
#[derive(Debug)]
pub(crate) struct SceneNode {
    pub(crate) name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) transform: Transform,
}

impl SceneNode {
    pub(crate) fn new(id: NodeId, name: String, parent: Option<NodeId>) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            transform: Transform::new(id),
        }
    }
}
