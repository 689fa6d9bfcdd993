use std::path::Path;

use anyhow::{Context, bail};
use cgmath::{InnerSpace, Vector3};

use crate::{
    config::ImportOptions,
    data_structures::{
        scene::{Scene, SourceMesh},
        scene_graph::validate_indices,
    },
};

/**
 * This module contains all logic for turning external files into engine data:
 * scene importers, texture storage and resolution, and mesh building.
 */
pub mod gltf;
pub mod mesh;
pub mod obj;
pub mod resolver;
pub mod texture;

/// Parses a scene file into a [`Scene`].
///
/// Hosts with their own parser implement this and hand it to the model cache.
pub trait SceneImporter: Send + Sync {
    fn import(&self, path: &Path, options: &ImportOptions) -> anyhow::Result<Scene>;
}

/// Default importer: glTF 2.0 (`.gltf`, `.glb`) and Wavefront OBJ (`.obj`), picked by extension.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileImporter;

impl SceneImporter for FileImporter {
    fn import(&self, path: &Path, options: &ImportOptions) -> anyhow::Result<Scene> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let mut scene = match ext.as_str() {
            "gltf" | "glb" => gltf::import_gltf(path, options.triangulate)?,
            "obj" => obj::import_obj(path, options.triangulate)?,
            _ => bail!("unsupported scene format '{ext}'"),
        };
        post_process(&mut scene, options, options.flip_uvs_for(path))
            .with_context(|| format!("post-process {}", path.display()))?;
        Ok(scene)
    }
}

/// Applies the requested post-process steps. Indices are checked first since normal
/// generation reads positions through them.
pub fn post_process(scene: &mut Scene, options: &ImportOptions, flip_uvs: bool) -> anyhow::Result<()> {
    for mesh in &mut scene.meshes {
        validate_indices(mesh)?;
        if options.triangulate {
            triangulate(mesh);
        }
        if options.generate_normals && mesh.normals.is_none() {
            generate_normals(mesh);
        }
        if flip_uvs {
            flip_v(mesh);
        }
    }
    Ok(())
}

/// Fans polygons into triangles and drops point and line faces.
pub fn triangulate(mesh: &mut SourceMesh) {
    let mut dropped = 0usize;
    let faces = std::mem::take(&mut mesh.faces);
    for face in faces {
        match face.len() {
            0..=2 => dropped += 1,
            3 => mesh.faces.push(face),
            _ => {
                for i in 1..face.len() - 1 {
                    mesh.faces.push(vec![face[0], face[i], face[i + 1]]);
                }
            }
        }
    }
    if dropped > 0 {
        log::warn!("Dropped {} point/line faces from mesh '{}'", dropped, mesh.name);
    }
}

/// Area-weighted smooth normals. Vertices that are not part of any triangle keep a zero normal.
pub fn generate_normals(mesh: &mut SourceMesh) {
    let mut normals = vec![Vector3::new(0.0f32, 0.0, 0.0); mesh.positions.len()];
    for face in mesh.faces.iter().filter(|f| f.len() == 3) {
        let [a, b, c] = [face[0], face[1], face[2]].map(|i| Vector3::from(mesh.positions[i as usize]));
        // cross product length is twice the triangle area
        let n = (b - a).cross(c - a);
        for &i in face {
            normals[i as usize] += n;
        }
    }
    mesh.normals = Some(
        normals
            .into_iter()
            .map(|n| if n.magnitude2() > 0.0 { n.normalize() } else { n })
            .map(Into::into)
            .collect(),
    );
}

fn flip_v(mesh: &mut SourceMesh) {
    for channel in mesh.tex_coords.iter_mut().flatten() {
        for uv in &mut channel.coords {
            uv[1] = 1.0 - uv[1];
        }
    }
}
