use std::path::Path;

use ::gltf::{image::Source, mesh::Mode};
use anyhow::{Context, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use cgmath::{Matrix4, SquareMatrix};

use crate::data_structures::scene::{
    EMBEDDED_MARKER, EmbeddedTexture, Material, Node, Scene, SourceMesh, TextureSlot, UvChannel,
};

/// Upper bound on TEXCOORD_n sets read per primitive.
const MAX_UV_CHANNELS: u32 = 8;

/**
 * Imports a `.gltf`/`.glb` file.
 *
 * Every primitive becomes its own source mesh. Images stored in buffer views or data URIs
 * go into the embedded texture table and are referenced as `*N`; images with a file URI
 * stay external references.
 */
pub fn import_gltf(path: &Path, triangulate: bool) -> anyhow::Result<Scene> {
    let ::gltf::Gltf { document, blob } =
        ::gltf::Gltf::open(path).with_context(|| format!("parse glTF {}", path.display()))?;
    let buffers = ::gltf::import_buffers(&document, path.parent(), blob)
        .with_context(|| format!("load glTF buffers for {}", path.display()))?;

    let mut scene = Scene::default();

    // Images
    let mut image_refs = Vec::new();
    for image in document.images() {
        let reference = match image.source() {
            Source::View { view, mime_type } => {
                let data = buffers
                    .get(view.buffer().index())
                    .and_then(|buf| buf.0.get(view.offset()..view.offset() + view.length()))
                    .ok_or_else(|| anyhow!("image {} points outside its buffer", image.index()))?;
                push_embedded(&mut scene, mime_to_hint(mime_type), data.to_vec())
            }
            Source::Uri { uri, mime_type } => match decode_data_uri(uri) {
                Some((uri_mime, data)) => {
                    let hint = mime_to_hint(mime_type.or(uri_mime.as_deref()).unwrap_or_default());
                    // an undecodable payload stays in the table and fails later as a texture
                    let data = data.unwrap_or_else(|e| {
                        log::warn!("Image {} has a broken data URI: {e:#}", image.index());
                        Vec::new()
                    });
                    push_embedded(&mut scene, hint, data)
                }
                None => uri.to_string(),
            },
        };
        image_refs.push(reference);
    }
    let texture_ref = |info: ::gltf::Texture<'_>| -> Option<String> {
        image_refs.get(info.source().index()).cloned()
    };

    // Materials
    for material in document.materials() {
        let pbr = material.pbr_metallic_roughness();
        let mut textures = std::collections::HashMap::new();
        let bindings = [
            (TextureSlot::BaseColor, pbr.base_color_texture().map(|t| t.texture())),
            (TextureSlot::Emissive, material.emissive_texture().map(|t| t.texture())),
            (TextureSlot::Normal, material.normal_texture().map(|t| t.texture())),
        ];
        for (slot, texture) in bindings {
            if let Some(reference) = texture.and_then(&texture_ref) {
                textures.insert(slot, reference);
            }
        }
        scene.materials.push(Material {
            name: material.name().unwrap_or_default().to_string(),
            textures,
            diffuse_color: Some(pbr.base_color_factor()),
        });
    }

    // Meshes, one source mesh per primitive
    let mut mesh_map: Vec<Vec<usize>> = Vec::new();
    for mesh in document.meshes() {
        let name = mesh.name().unwrap_or_default();
        let mut source_meshes = Vec::new();
        for primitive in mesh.primitives() {
            let reader = primitive.reader(|b| buffers.get(b.index()).map(|d| d.0.as_slice()));
            let Some(positions) = reader.read_positions() else {
                log::warn!("Primitive {} of mesh '{}' has no positions, skipping", primitive.index(), name);
                continue;
            };
            let positions: Vec<[f32; 3]> = positions.collect();
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            let faces = match faces_for_mode(primitive.mode(), &indices, triangulate) {
                Some(faces) => faces,
                None => {
                    log::warn!(
                        "Primitive {} of mesh '{}' uses {:?}, which has no triangles; skipping",
                        primitive.index(),
                        name,
                        primitive.mode()
                    );
                    continue;
                }
            };
            let mut tex_coords = Vec::new();
            for set in 0..MAX_UV_CHANNELS {
                let Some(coords) = reader.read_tex_coords(set) else {
                    break;
                };
                tex_coords.push(Some(UvChannel {
                    components: 2,
                    coords: coords.into_f32().collect(),
                }));
            }

            scene.meshes.push(SourceMesh {
                name: name.to_string(),
                positions,
                normals: reader.read_normals().map(Iterator::collect),
                tex_coords,
                faces,
                material: primitive.material().index(),
            });
            source_meshes.push(scene.meshes.len() - 1);
        }
        mesh_map.push(source_meshes);
    }

    // Nodes: a synthetic root at 0, glTF node i at i + 1
    let gltf_scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| anyhow!("glTF file contains no scene"))?;
    let mut root = Node::new(gltf_scene.name().unwrap_or("root"), Matrix4::identity());
    root.children = gltf_scene.nodes().map(|n| n.index() + 1).collect();
    scene.root = scene.add_node(root);
    for node in document.nodes() {
        let mut converted = Node::new(
            node.name().unwrap_or_default(),
            Matrix4::from(node.transform().matrix()),
        );
        if let Some(mesh) = node.mesh() {
            converted.meshes = mesh_map.get(mesh.index()).cloned().unwrap_or_default();
        }
        converted.children = node.children().map(|c| c.index() + 1).collect();
        scene.add_node(converted);
    }

    Ok(scene)
}

fn push_embedded(scene: &mut Scene, hint: String, data: Vec<u8>) -> String {
    scene.textures.push(EmbeddedTexture::compressed(hint, data));
    format!("{}{}", EMBEDDED_MARKER, scene.textures.len() - 1)
}

/// "image/png" -> "png", "image/jpeg" -> "jpg".
fn mime_to_hint(mime_type: &str) -> String {
    match mime_type {
        "image/jpeg" => "jpg".to_string(),
        other => other.rsplit('/').next().unwrap_or_default().to_string(),
    }
}

/// Splits a `data:` URI into its mime type and decoded payload. `None` for any other URI.
fn decode_data_uri(uri: &str) -> Option<(Option<String>, anyhow::Result<Vec<u8>>)> {
    let rest = uri.strip_prefix("data:")?;
    let Some((header, payload)) = rest.split_once(',') else {
        return Some((None, Err(anyhow!("malformed data URI"))));
    };
    let mime = header.split(';').next().filter(|m| !m.is_empty()).map(str::to_string);
    let data = if header.ends_with(";base64") {
        BASE64.decode(payload).context("decode base64 data URI")
    } else {
        Ok(payload.as_bytes().to_vec())
    };
    Some((mime, data))
}

/// Triangle faces of a primitive, or `None` for point and line primitives.
fn faces_for_mode(mode: Mode, indices: &[u32], triangulate: bool) -> Option<Vec<Vec<u32>>> {
    let faces = match mode {
        Mode::Triangles => indices.chunks_exact(3).map(<[u32]>::to_vec).collect(),
        Mode::TriangleStrip if triangulate => (0..indices.len().saturating_sub(2))
            .map(|i| {
                // every other triangle flips to keep the winding consistent
                if i % 2 == 0 {
                    vec![indices[i], indices[i + 1], indices[i + 2]]
                } else {
                    vec![indices[i + 1], indices[i], indices[i + 2]]
                }
            })
            .collect(),
        Mode::TriangleFan if triangulate => (1..indices.len().saturating_sub(1))
            .map(|i| vec![indices[0], indices[i], indices[i + 1]])
            .collect(),
        _ => return None,
    };
    Some(faces)
}
