//! Model import for STL and Wavefront OBJ files.
//!
//! Importing produces an [`ImportedMesh`]: raw positions, optional texture
//! coordinates and polygon faces exactly as the file describes them. Nothing
//! here validates that faces are triangles or that indices are in range; that
//! is [`MeshData::from_import`](crate::mesh::MeshData::from_import)'s job.
//!
//! # Supported Formats
//!
//! | Format | Extensions | Notes |
//! |--------|------------|-------|
//! | STL    | `.stl`     | Binary and ASCII, no UV coordinates |
//! | OBJ    | `.obj`     | First object only, materials ignored |
//!
//! # Example
//!
//! ```no_run
//! use meshview::{ImportPolicy, import_file};
//!
//! let imported = import_file("teapot.obj", ImportPolicy::default())?;
//! println!("{} vertices, {} faces", imported.vertex_count(), imported.faces.len());
//! # Ok::<(), meshview::Error>(())
//! ```

use std::io::{BufRead, Read, Seek};
use std::path::Path;

use glam::Vec3;

use crate::error::{Error, Result};

/// Post-processing applied while importing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImportPolicy {
    /// Split polygons into triangles. With this off, quads and larger faces
    /// are passed through and rejected later as malformed.
    pub triangulate: bool,
    /// Share vertices between faces that reference the same position and
    /// texture coordinate. With this off every face corner becomes its own
    /// vertex.
    pub join_identical_vertices: bool,
    /// Drop point and line primitives so only polygons remain.
    pub sort_by_primitive_type: bool,
}

impl Default for ImportPolicy {
    fn default() -> Self {
        Self {
            triangulate: true,
            join_identical_vertices: true,
            sort_by_primitive_type: true,
        }
    }
}

impl ImportPolicy {
    fn obj_options(&self) -> tobj::LoadOptions {
        tobj::LoadOptions {
            triangulate: self.triangulate,
            single_index: true,
            ignore_points: self.sort_by_primitive_type,
            ignore_lines: self.sort_by_primitive_type,
            ..Default::default()
        }
    }
}

/// Geometry as read from a model file, before validation.
#[derive(Clone, Debug, Default)]
pub struct ImportedMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    /// Per-vertex texture coordinates with the origin at the top-left.
    pub tex_coords: Option<Vec<[f32; 2]>>,
    /// Polygon faces as vertex indices, in file order.
    pub faces: Vec<Vec<u32>>,
}

impl ImportedMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Computes the axis-aligned bounding box.
    ///
    /// Returns `(min, max)` corners of the bounding box.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);

        for &p in &self.positions {
            let p = Vec3::from(p);
            min = min.min(p);
            max = max.max(p);
        }

        (min, max)
    }

    /// Give every face corner its own vertex.
    fn unweld(self) -> Self {
        let corners: usize = self.faces.iter().map(Vec::len).sum();
        let mut positions = Vec::with_capacity(corners);
        let mut tex_coords = self.tex_coords.as_ref().map(|_| Vec::with_capacity(corners));
        let mut faces = Vec::with_capacity(self.faces.len());

        for face in &self.faces {
            let mut unwelded = Vec::with_capacity(face.len());
            for &index in face {
                let i = index as usize;
                // Out-of-range indices are kept out of range for validation.
                let Some(&position) = self.positions.get(i) else {
                    unwelded.push(u32::MAX);
                    continue;
                };
                unwelded.push(positions.len() as u32);
                positions.push(position);
                if let (Some(out), Some(uvs)) = (tex_coords.as_mut(), self.tex_coords.as_ref()) {
                    out.push(uvs.get(i).copied().unwrap_or_default());
                }
            }
            faces.push(unwelded);
        }

        Self {
            name: self.name,
            positions,
            tex_coords,
            faces,
        }
    }
}

/// Import a model file, detecting the format from its extension.
pub fn import_file(path: impl AsRef<Path>, policy: ImportPolicy) -> Result<ImportedMesh> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    let mut mesh = match ext.as_str() {
        "stl" => {
            let file = std::fs::File::open(path)?;
            import_stl(&mut std::io::BufReader::new(file), policy)?
        }
        "obj" => {
            let file = std::fs::File::open(path)?;
            import_obj(&mut std::io::BufReader::new(file), policy)?
        }
        _ => return Err(Error::UnknownFormat(ext)),
    };

    if mesh.positions.is_empty() {
        return Err(Error::EmptyModel {
            path: path.to_path_buf(),
        });
    }
    if mesh.name.is_empty() {
        mesh.name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
    }

    log::info!(
        "imported `{}`: {} vertices, {} faces",
        mesh.name,
        mesh.vertex_count(),
        mesh.faces.len()
    );
    Ok(mesh)
}

/// Parse an STL stream. STL carries triangles only and no UVs.
pub fn import_stl<R: Read + Seek>(reader: &mut R, policy: ImportPolicy) -> Result<ImportedMesh> {
    let stl = stl_io::read_stl(reader)?;

    let positions = stl.vertices.iter().map(|&v| v.into()).collect();
    let faces = stl
        .faces
        .iter()
        .map(|face| face.vertices.iter().map(|&i| i as u32).collect())
        .collect();

    let mesh = ImportedMesh {
        name: String::new(),
        positions,
        tex_coords: None,
        faces,
    };

    Ok(if policy.join_identical_vertices {
        mesh
    } else {
        mesh.unweld()
    })
}

/// Parse an OBJ stream. Only the first object is used; materials are ignored.
pub fn import_obj<R: BufRead>(reader: &mut R, policy: ImportPolicy) -> Result<ImportedMesh> {
    let (models, _materials) =
        tobj::load_obj_buf(reader, &policy.obj_options(), |_| Ok(Default::default()))?;

    let mut models = models.into_iter();
    let Some(model) = models.next() else {
        return Ok(ImportedMesh::default());
    };
    let ignored = models.len();
    if ignored > 0 {
        log::warn!(
            "model has {} extra objects, only `{}` is used",
            ignored,
            model.name
        );
    }

    let mesh = model.mesh;
    let positions = mesh
        .positions
        .chunks_exact(3)
        .map(|p| [p[0], p[1], p[2]])
        .collect();
    let tex_coords = (!mesh.texcoords.is_empty()).then(|| {
        mesh.texcoords
            .chunks_exact(2)
            .map(|t| [t[0], 1.0 - t[1]])
            .collect()
    });

    let faces = if mesh.face_arities.is_empty() {
        mesh.indices.chunks(3).map(<[u32]>::to_vec).collect()
    } else {
        let mut faces = Vec::with_capacity(mesh.face_arities.len());
        let mut start = 0;
        for &arity in &mesh.face_arities {
            let end = (start + arity as usize).min(mesh.indices.len());
            faces.push(mesh.indices[start..end].to_vec());
            start = end;
        }
        faces
    };

    let imported = ImportedMesh {
        name: model.name,
        positions,
        tex_coords,
        faces,
    };

    Ok(if policy.join_identical_vertices {
        imported
    } else {
        imported.unweld()
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    pub(crate) const CUBE_OBJ: &str = "\
o cube
v -1 -1 -1
v 1 -1 -1
v 1 1 -1
v -1 1 -1
v -1 -1 1
v 1 -1 1
v 1 1 1
v -1 1 1
f 1 2 3 4
f 5 8 7 6
f 1 5 6 2
f 2 6 7 3
f 3 7 8 4
f 5 1 4 8
";

    fn cube_triangles() -> Vec<stl_io::Triangle> {
        let corner = |i: usize| {
            stl_io::Vertex::new([
                if i & 1 == 0 { -1.0 } else { 1.0 },
                if i & 2 == 0 { -1.0 } else { 1.0 },
                if i & 4 == 0 { -1.0 } else { 1.0 },
            ])
        };
        let quads = [
            [0, 1, 3, 2],
            [4, 6, 7, 5],
            [0, 4, 5, 1],
            [2, 3, 7, 6],
            [0, 2, 6, 4],
            [1, 5, 7, 3],
        ];
        quads
            .iter()
            .flat_map(|q| [[q[0], q[1], q[2]], [q[0], q[2], q[3]]])
            .map(|tri| stl_io::Triangle {
                normal: stl_io::Normal::new([0.0, 0.0, 0.0]),
                vertices: tri.map(corner),
            })
            .collect()
    }

    #[test]
    fn obj_cube_triangulates_to_36_indices() {
        let mesh = import_obj(&mut Cursor::new(CUBE_OBJ), ImportPolicy::default()).unwrap();
        assert_eq!(mesh.name, "cube");
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.faces.len(), 12);
        let indices: Vec<u32> = mesh.faces.iter().flatten().copied().collect();
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|&i| i < 8));
        assert!(mesh.tex_coords.is_none());
    }

    #[test]
    fn obj_without_triangulation_keeps_quads() {
        let policy = ImportPolicy {
            triangulate: false,
            ..Default::default()
        };
        let mesh = import_obj(&mut Cursor::new(CUBE_OBJ), policy).unwrap();
        assert_eq!(mesh.faces.len(), 6);
        assert!(mesh.faces.iter().all(|f| f.len() == 4));
    }

    #[test]
    fn obj_uvs_are_flipped_to_top_left_origin() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 0.25\nf 1/1 2/2 3/3\n";
        let mesh = import_obj(&mut Cursor::new(src), ImportPolicy::default()).unwrap();
        let uvs = mesh.tex_coords.unwrap();
        assert_eq!(uvs[0], [0.0, 1.0]);
        assert_eq!(uvs[2], [0.0, 0.75]);
    }

    #[test]
    fn stl_cube_joins_identical_vertices() {
        let mut bytes = Cursor::new(Vec::new());
        stl_io::write_stl(&mut bytes, cube_triangles().iter()).unwrap();
        bytes.set_position(0);

        let mesh = import_stl(&mut bytes, ImportPolicy::default()).unwrap();
        assert_eq!(mesh.vertex_count(), 8);
        let indices: Vec<u32> = mesh.faces.iter().flatten().copied().collect();
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
    }

    #[test]
    fn unwelded_stl_has_a_vertex_per_corner() {
        let mut bytes = Cursor::new(Vec::new());
        stl_io::write_stl(&mut bytes, cube_triangles().iter()).unwrap();
        bytes.set_position(0);

        let policy = ImportPolicy {
            join_identical_vertices: false,
            ..Default::default()
        };
        let mesh = import_stl(&mut bytes, policy).unwrap();
        assert_eq!(mesh.vertex_count(), 36);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = import_file("model.fbx", ImportPolicy::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownFormat(ext) if ext == "fbx"));
    }

    #[test]
    fn bounds_cover_all_positions() {
        let mesh = import_obj(&mut Cursor::new(CUBE_OBJ), ImportPolicy::default()).unwrap();
        let (min, max) = mesh.bounds();
        assert_eq!(min, Vec3::splat(-1.0));
        assert_eq!(max, Vec3::splat(1.0));
    }
}
