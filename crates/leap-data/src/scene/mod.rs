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

//! The scene hierarchy and its transforms.
//!
//! A [`SceneGraph`] owns every node of a scene. Each node owns exactly one
//! [`Transform`] holding its local position, rotation, and scale relative to
//! its parent. World-space values are derived lazily: mutating a transform
//! marks it and its descendants dirty, and the next world-space read walks up
//! to the nearest clean ancestor, composes parent-before-child, and caches the
//! result.
//!
//! Transforms are mutated through a [`TransformMut`] handle obtained from
//! [`SceneGraph::transform_mut`], because marking descendants dirty and solving
//! world-space setters both need the surrounding hierarchy.

mod error;
mod graph;
mod handle;
mod node;
mod transform;

pub use error::HierarchyError;
pub use graph::SceneGraph;
pub use handle::TransformMut;
pub use node::NodeId;
pub use transform::{Transform, WorldSpace};
