//! Scene graph for the viewer.
//!
//! A [`SceneGraph`] is a tree of [`SceneNode`]s, each carrying a local
//! transform and optionally a shared [`Mesh`](crate::mesh::Mesh). Transforms
//! compose from the root down: a node's effective transform is its parent's
//! effective transform times its own local transform. The view matrix of the
//! camera is passed in as the root's parent transform, so a draw item's
//! transform is the model-view matrix the shader consumes.
//!
//! # Example
//!
//! ```ignore
//! use meshview::*;
//!
//! let mut scene = SceneGraph::new();
//! let planet = scene.create_mesh_node(sphere.clone());
//! let moon = scene.create_mesh_node(sphere);
//! scene.add_child(scene.root(), planet)?;
//! scene.add_child(planet, moon)?;
//!
//! scene.translate(moon, Vec3::new(4.0, 0.0, 0.0));
//! scene.scale(moon, Vec3::splat(0.25));
//!
//! // Spinning the planet carries the moon with it.
//! scene.rotate(planet, 1.0, Vec3::Y);
//! ```

mod graph;

pub use graph::{DrawItem, NodeId, SceneGraph, SceneNode};
