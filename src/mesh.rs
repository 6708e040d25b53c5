//! Mesh data and GPU-resident meshes.
//!
//! - [`MeshData`] is validated CPU geometry: positions, one attribute stream
//!   (vertex colors or texture coordinates, never both) and 16-bit triangle
//!   indices.
//! - [`Mesh`] is the same geometry uploaded to GPU buffers. It is immutable
//!   after upload and is shared between scene nodes through `Rc<Mesh>`.
//!
//! # Vertex Layout
//!
//! Positions and attributes live in separate vertex buffers:
//!
//! | Buffer    | Attribute | Format    | Shader Location |
//! |-----------|-----------|-----------|-----------------|
//! | 0         | position  | Float32x3 | 0               |
//! | 1         | color     | Float32x3 | 1               |
//! | 1         | uv        | Float32x2 | 1               |

use std::path::Path;

use wgpu::util::DeviceExt;

use crate::error::{Error, Result};
use crate::geometry::{ImportPolicy, ImportedMesh, import_file};
use crate::gpu::GpuContext;

/// Highest vertex count addressable by 16-bit indices.
pub const MAX_VERTICES: usize = u16::MAX as usize + 1;

/// Deterministic pseudo-random vertex colors.
///
/// Meshes without texture coordinates get one color per vertex from this
/// generator. The same seed always yields the same sequence.
#[derive(Clone, Debug)]
pub struct ColorGenerator {
    seed: u32,
    counter: u32,
}

impl ColorGenerator {
    pub fn new(seed: u32) -> Self {
        Self { seed, counter: 0 }
    }

    /// Next RGB triple, each channel in [0, 1].
    pub fn next_color(&mut self) -> [f32; 3] {
        let n = self.counter;
        self.counter = self.counter.wrapping_add(1);
        [0, 1, 2].map(|channel| {
            let h = hash(n, channel, self.seed);
            (h >> 8) as f32 / 0x00ff_ffff as f32
        })
    }

    pub fn colors(&mut self, count: usize) -> Vec<[f32; 3]> {
        (0..count).map(|_| self.next_color()).collect()
    }
}

impl Default for ColorGenerator {
    fn default() -> Self {
        Self::new(0x5eed)
    }
}

fn hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_add(x.wrapping_mul(374761393));
    h = h.wrapping_add(y.wrapping_mul(668265263));
    h ^= h >> 13;
    h = h.wrapping_mul(1274126177);
    h ^= h >> 16;
    h
}

/// Which attribute a mesh carries next to its positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    Colors,
    TexCoords,
}

/// The per-vertex attribute stream. A mesh has colors or UVs, not both.
#[derive(Clone, Debug, PartialEq)]
pub enum VertexStream {
    Colors(Vec<[f32; 3]>),
    TexCoords(Vec<[f32; 2]>),
}

impl VertexStream {
    pub fn kind(&self) -> StreamKind {
        match self {
            VertexStream::Colors(_) => StreamKind::Colors,
            VertexStream::TexCoords(_) => StreamKind::TexCoords,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            VertexStream::Colors(c) => c.len(),
            VertexStream::TexCoords(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bytes(&self) -> &[u8] {
        match self {
            VertexStream::Colors(c) => bytemuck::cast_slice(c),
            VertexStream::TexCoords(t) => bytemuck::cast_slice(t),
        }
    }
}

/// Validated CPU-side triangle mesh.
#[derive(Clone, Debug)]
pub struct MeshData {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub stream: VertexStream,
    /// Three indices per triangle, each below `positions.len()`.
    pub indices: Vec<u16>,
}

impl MeshData {
    /// Build mesh data from an import, checking every invariant.
    ///
    /// Anything but triangles is rejected; the caller gets
    /// [`Error::MalformedFace`] and should not try to render the model.
    /// Imports without texture coordinates get colors from `colors`.
    pub fn from_import(imported: ImportedMesh, colors: &mut ColorGenerator) -> Result<Self> {
        let vertex_count = imported.positions.len();
        if vertex_count > MAX_VERTICES {
            return Err(Error::TooManyVertices {
                count: vertex_count,
            });
        }

        let stream = match imported.tex_coords {
            Some(uvs) => VertexStream::TexCoords(uvs),
            None => VertexStream::Colors(colors.colors(vertex_count)),
        };

        let mut indices = Vec::with_capacity(imported.faces.len() * 3);
        for (face, corners) in imported.faces.iter().enumerate() {
            if corners.len() != 3 {
                return Err(Error::MalformedFace {
                    face,
                    arity: corners.len(),
                });
            }
            indices.extend(corners.iter().map(|&i| i as u16));
            // Range check the u32 before narrowing so wrapped values never pass.
            if let Some(&index) = corners.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(Error::IndexOutOfRange {
                    index,
                    vertex_count,
                });
            }
        }

        Self::new(imported.name, imported.positions, stream, indices)
    }

    /// Assemble mesh data from parts, validating lengths and index ranges.
    pub fn new(
        name: impl Into<String>,
        positions: Vec<[f32; 3]>,
        stream: VertexStream,
        indices: Vec<u16>,
    ) -> Result<Self> {
        let vertex_count = positions.len();
        if vertex_count > MAX_VERTICES {
            return Err(Error::TooManyVertices {
                count: vertex_count,
            });
        }
        if stream.len() != vertex_count {
            return Err(Error::StreamLength {
                stream: stream.len(),
                vertices: vertex_count,
            });
        }
        if indices.len() % 3 != 0 {
            return Err(Error::MalformedFace {
                face: indices.len() / 3,
                arity: indices.len() % 3,
            });
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(Error::IndexOutOfRange {
                index: index as u32,
                vertex_count,
            });
        }

        Ok(Self {
            name: name.into(),
            positions,
            stream,
            indices,
        })
    }

    /// A colored cube spanning -1 to 1 on every axis.
    ///
    /// 8 shared vertices and 12 counter-clockwise triangles.
    pub fn cube(name: impl Into<String>, colors: &mut ColorGenerator) -> Self {
        let positions: Vec<[f32; 3]> = (0..8)
            .map(|i| {
                [
                    if i & 1 == 0 { -1.0 } else { 1.0 },
                    if i & 2 == 0 { -1.0 } else { 1.0 },
                    if i & 4 == 0 { -1.0 } else { 1.0 },
                ]
            })
            .collect();

        #[rustfmt::skip]
        let indices = vec![
            0, 2, 3,  0, 3, 1, // -z
            4, 5, 7,  4, 7, 6, // +z
            0, 1, 5,  0, 5, 4, // -y
            2, 6, 7,  2, 7, 3, // +y
            0, 4, 6,  0, 6, 2, // -x
            1, 3, 7,  1, 7, 5, // +x
        ];

        Self {
            name: name.into(),
            stream: VertexStream::Colors(colors.colors(positions.len())),
            positions,
            indices,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// A triangle mesh uploaded to the GPU.
///
/// Buffers are released when the last `Rc<Mesh>` referencing it drops.
#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    position_buffer: wgpu::Buffer,
    attribute_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    vertex_count: u32,
    kind: StreamKind,
}

impl Mesh {
    pub const POSITION_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 3]>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        }],
    };

    pub const COLOR_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 3]>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x3,
        }],
    };

    pub const TEX_COORD_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 2]>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x2,
        }],
    };

    /// Vertex buffer layouts for a mesh with the given stream kind.
    pub fn layouts(kind: StreamKind) -> [wgpu::VertexBufferLayout<'static>; 2] {
        match kind {
            StreamKind::Colors => [Self::POSITION_LAYOUT, Self::COLOR_LAYOUT],
            StreamKind::TexCoords => [Self::POSITION_LAYOUT, Self::TEX_COORD_LAYOUT],
        }
    }

    /// Upload validated mesh data into position, attribute and index buffers.
    pub fn upload(gpu: &GpuContext, data: &MeshData) -> Self {
        let position_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Position Buffer"),
                contents: bytemuck::cast_slice(&data.positions),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let attribute_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Attribute Buffer"),
                contents: data.stream.bytes(),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let index_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Index Buffer"),
                contents: bytemuck::cast_slice(&data.indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        log::info!(
            "uploaded mesh `{}`: {} vertices, {} triangles, {:?}",
            data.name,
            data.vertex_count(),
            data.triangle_count(),
            data.stream.kind()
        );

        Self {
            name: data.name.clone(),
            position_buffer,
            attribute_buffer,
            index_buffer,
            index_count: data.indices.len() as u32,
            vertex_count: data.vertex_count() as u32,
            kind: data.stream.kind(),
        }
    }

    /// Import, validate and upload a model file.
    pub fn load(
        gpu: &GpuContext,
        path: impl AsRef<Path>,
        policy: ImportPolicy,
        colors: &mut ColorGenerator,
    ) -> Result<Self> {
        let imported = import_file(path, policy)?;
        let data = MeshData::from_import(imported, colors)?;
        Ok(Self::upload(gpu, &data))
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Bind the vertex and index buffers and draw every triangle once.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        if self.index_count == 0 {
            return;
        }
        pass.set_vertex_buffer(0, self.position_buffer.slice(..));
        pass.set_vertex_buffer(1, self.attribute_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }

    /// Draw with `texture` bound at `group`, then put `restore` back.
    pub fn draw_with_texture(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        group: u32,
        texture: &wgpu::BindGroup,
        restore: &wgpu::BindGroup,
    ) {
        pass.set_bind_group(group, texture, &[]);
        self.draw(pass);
        pass.set_bind_group(group, restore, &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::tests::CUBE_OBJ;
    use crate::geometry::import_obj;

    fn triangle(faces: Vec<Vec<u32>>, vertices: usize) -> ImportedMesh {
        ImportedMesh {
            name: "test".into(),
            positions: vec![[0.0; 3]; vertices],
            tex_coords: None,
            faces,
        }
    }

    #[test]
    fn colors_are_deterministic_and_in_range() {
        let a = ColorGenerator::new(7).colors(256);
        let b = ColorGenerator::new(7).colors(256);
        assert_eq!(a, b);
        assert!(a.iter().flatten().all(|c| (0.0..=1.0).contains(c)));
        assert_ne!(a, ColorGenerator::new(8).colors(256));
    }

    #[test]
    fn imported_cube_gets_one_color_per_vertex() {
        let imported =
            import_obj(&mut std::io::Cursor::new(CUBE_OBJ), ImportPolicy::default()).unwrap();
        let data = MeshData::from_import(imported, &mut ColorGenerator::default()).unwrap();
        assert_eq!(data.indices.len(), 36);
        assert!(data.indices.iter().all(|&i| i < 8));
        assert_eq!(data.stream.kind(), StreamKind::Colors);
        assert_eq!(data.stream.len(), data.vertex_count());
    }

    #[test]
    fn quads_are_malformed() {
        let err = MeshData::from_import(
            triangle(vec![vec![0, 1, 2], vec![0, 1, 2, 3]], 4),
            &mut ColorGenerator::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedFace { face: 1, arity: 4 }));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let err = MeshData::from_import(
            triangle(vec![vec![0, 1, 3]], 3),
            &mut ColorGenerator::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::IndexOutOfRange {
                index: 3,
                vertex_count: 3
            }
        ));
    }

    #[test]
    fn index_that_would_wrap_to_zero_is_rejected() {
        let err = MeshData::from_import(
            triangle(vec![vec![0, 1, 65536]], 3),
            &mut ColorGenerator::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { index: 65536, .. }));
    }

    #[test]
    fn vertex_limit_matches_u16_indices() {
        let at_limit = MeshData::from_import(
            triangle(vec![vec![0, 1, 65535]], MAX_VERTICES),
            &mut ColorGenerator::default(),
        )
        .unwrap();
        assert_eq!(at_limit.indices, vec![0, 1, u16::MAX]);

        let err = MeshData::from_import(
            triangle(vec![vec![0, 1, 2]], MAX_VERTICES + 1),
            &mut ColorGenerator::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::TooManyVertices { count } if count == MAX_VERTICES + 1));
    }

    #[test]
    fn mismatched_stream_length_is_rejected() {
        let err = MeshData::new(
            "uv",
            vec![[0.0; 3]; 3],
            VertexStream::TexCoords(vec![[0.0; 2]; 2]),
            vec![0, 1, 2],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::StreamLength {
                stream: 2,
                vertices: 3
            }
        ));
    }

    #[test]
    fn builtin_cube_is_valid() {
        let cube = MeshData::cube("cube", &mut ColorGenerator::default());
        let rebuilt = MeshData::new(cube.name, cube.positions, cube.stream, cube.indices).unwrap();
        assert_eq!(rebuilt.vertex_count(), 8);
        assert_eq!(rebuilt.triangle_count(), 12);
    }
}
