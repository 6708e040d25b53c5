//! Error types shared by every stage of the viewer.
//!
//! Nothing in the pipeline retries. Each variant is either fatal for the
//! caller (shader, framebuffer and malformed geometry errors) or reports an
//! asset that could not be loaded.

use std::path::PathBuf;

use crate::scene::NodeId;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Structural violations of the scene tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    #[error("node {0:?} does not belong to this scene graph")]
    UnknownNode(NodeId),
    #[error("node {child:?} already has parent {parent:?}")]
    AlreadyParented { child: NodeId, parent: NodeId },
    #[error("the root node cannot become a child")]
    RootAsChild,
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("shader source `{label}` is empty")]
    EmptyShaderSource { label: String },

    #[error("shader `{label}` failed to compile:\n{diagnostic}")]
    ShaderCompile { label: String, diagnostic: String },

    #[error("pipeline `{label}` failed to link:\n{diagnostic}")]
    PipelineLink { label: String, diagnostic: String },

    #[error("offscreen framebuffer is not complete: {reason}")]
    FramebufferIncomplete { reason: String },

    #[error("face {face} has {arity} indices, only triangles are supported")]
    MalformedFace { face: usize, arity: usize },

    #[error("index {index} is out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },

    #[error("mesh has {count} vertices, 16-bit indices address at most 65536")]
    TooManyVertices { count: usize },

    #[error("attribute stream has {stream} entries for {vertices} vertices")]
    StreamLength { stream: usize, vertices: usize },

    #[error("model `{}` contains no meshes", path.display())]
    EmptyModel { path: PathBuf },

    #[error("unknown model format `{0}`")]
    UnknownFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OBJ parse error: {0}")]
    Obj(#[from] tobj::LoadError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("cube map face `{}` is missing", path.display())]
    MissingCubeFace { path: PathBuf },

    #[error("cube map face {face} is {width}x{height}, expected {expected}x{expected}")]
    CubeFaceSize {
        face: &'static str,
        width: u32,
        height: u32,
        expected: u32,
    },

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error("no suitable GPU adapter: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("this context has no window surface to present to")]
    NoSurface,

    #[error("window creation failed: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}
