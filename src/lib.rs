//! # meshview
//!
//! A small mesh viewer on wgpu and winit.
//!
//! A loaded model lives in a [`SceneGraph`] under a cube-map [`Skybox`]. Each
//! frame the scene is drawn into an [`OffscreenTarget`], then a full-screen
//! [`PostProcessStage`] writes it to the window through an effect shader
//! (grayscale by default). Left-drag orbits the camera, WASD/QE move it and
//! `P` toggles post-processing.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::rc::Rc;
//! use meshview::*;
//!
//! fn main() -> Result<()> {
//!     init_logging(LoggingConfig::default());
//!
//!     run(ViewConfig::new().title("Teapot"), |gpu, view| {
//!         let mut colors = ColorGenerator::default();
//!         let mesh = Mesh::load(gpu, "teapot.obj", ImportPolicy::default(), &mut colors)?;
//!
//!         let node = view.scene_mut().create_mesh_node(Rc::new(mesh));
//!         let root = view.scene().root();
//!         view.scene_mut().add_child(root, node)?;
//!
//!         view.on_update(move |scene, dt| scene.rotate(node, 45.0 * dt, Vec3::Y));
//!         Ok(())
//!     })
//! }
//! ```

mod app;
mod camera;
mod config;
mod error;
mod geometry;
mod gpu;
mod input;
mod logging;
mod mesh;
mod orbit_camera;
pub mod pipeline;
pub mod scene;
mod shader;
mod texture;
mod view;

pub use app::run;
pub use camera::Camera;
pub use config::ViewConfig;
pub use error::{Error, Result, SceneError};
pub use geometry::{ImportPolicy, ImportedMesh, import_file, import_obj, import_stl};
pub use gpu::GpuContext;
pub use input::{Input, InputEvent};
pub use logging::{LoggingConfig, init_logging};
pub use mesh::{ColorGenerator, MAX_VERTICES, Mesh, MeshData, StreamKind, VertexStream};
pub use orbit_camera::{DragState, OrbitController};
pub use pipeline::{
    FramePlan, OffscreenTarget, PostEffect, PostProcessStage, ScenePass, Skybox,
};
pub use scene::{DrawItem, NodeId, SceneGraph, SceneNode};
pub use shader::ShaderSources;
pub use texture::{CUBE_FACES, CubeTexture, Texture, TextureId, TextureLibrary};
pub use view::{PostProcessToggle, UpdateFn, View};

// Re-export glam math types for convenience
pub use glam::{Mat4, Vec2, Vec3, Vec4};

// Re-export commonly used winit types for convenience
pub use winit::keyboard::KeyCode;
