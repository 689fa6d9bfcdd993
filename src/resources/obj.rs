use std::{collections::HashMap, path::Path};

use anyhow::Context;
use cgmath::{Matrix4, SquareMatrix};

use crate::data_structures::scene::{Material, Node, Scene, SourceMesh, TextureSlot, UvChannel};

/// `.mtl` keys tobj has no dedicated field for.
const EMISSIVE_MAP_KEY: &str = "map_Ke";

/**
 * Imports a Wavefront `.obj` file and the `.mtl` libraries it references.
 *
 * The root node gets one child per object, each holding that object's mesh. A material
 * library that fails to load is logged and the meshes come without materials.
 */
pub fn import_obj(path: &Path, triangulate: bool) -> anyhow::Result<Scene> {
    let (models, obj_materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate,
            single_index: true,
            ignore_points: true,
            ignore_lines: true,
            ..Default::default()
        },
    )
    .with_context(|| format!("parse OBJ {}", path.display()))?;

    let materials = match obj_materials {
        Ok(materials) => materials,
        Err(e) => {
            log::warn!("Materials for {} could not be loaded: {}", path.display(), e);
            Vec::new()
        }
    };

    let mut scene = Scene::default();
    scene.materials = materials.into_iter().map(convert_material).collect();
    scene.root = scene.add_node(Node::new("root", Matrix4::identity()));

    for model in models {
        let mesh = convert_mesh(&model);
        if mesh.material.is_some_and(|m| m >= scene.materials.len()) {
            log::warn!("Object '{}' references an unknown material", model.name);
        }
        scene.meshes.push(mesh);
        let mut node = Node::new(model.name, Matrix4::identity());
        node.meshes.push(scene.meshes.len() - 1);
        let node = scene.add_node(node);
        scene.nodes[scene.root].children.push(node);
    }
    Ok(scene)
}

fn convert_mesh(model: &tobj::Model) -> SourceMesh {
    let m = &model.mesh;
    let positions = m
        .positions
        .chunks_exact(3)
        .map(|p| [p[0], p[1], p[2]])
        .collect();
    let normals = (!m.normals.is_empty())
        .then(|| m.normals.chunks_exact(3).map(|n| [n[0], n[1], n[2]]).collect());
    let tex_coords = if m.texcoords.is_empty() {
        Vec::new()
    } else {
        vec![Some(UvChannel {
            components: 2,
            coords: m.texcoords.chunks_exact(2).map(|t| [t[0], t[1]]).collect(),
        })]
    };

    // Without triangulation tobj reports the size of every face
    let faces = if m.face_arities.is_empty() {
        m.indices.chunks(3).map(<[u32]>::to_vec).collect()
    } else {
        let mut offset = 0;
        m.face_arities
            .iter()
            .map(|&arity| {
                let end = (offset + arity as usize).min(m.indices.len());
                let face = m.indices[offset..end].to_vec();
                offset = end;
                face
            })
            .collect()
    };

    SourceMesh {
        name: model.name.clone(),
        positions,
        normals,
        tex_coords,
        faces,
        material: m.material_id,
    }
}

fn convert_material(m: tobj::Material) -> Material {
    let mut textures = HashMap::new();
    let bindings = [
        (TextureSlot::Diffuse, m.diffuse_texture),
        (TextureSlot::Specular, m.specular_texture),
        (TextureSlot::Ambient, m.ambient_texture),
        (TextureSlot::Normal, m.normal_texture),
        (TextureSlot::Emissive, m.unknown_param.get(EMISSIVE_MAP_KEY).cloned()),
    ];
    for (slot, texture) in bindings {
        if let Some(texture) = texture.filter(|t| !t.trim().is_empty()) {
            textures.insert(slot, texture.trim().to_string());
        }
    }
    let diffuse_color = m
        .diffuse
        .map(|[r, g, b]| [r, g, b, m.dissolve.unwrap_or(1.0)]);
    Material {
        name: m.name,
        textures,
        diffuse_color,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_slots_and_color() {
        let mut unknown_param = HashMap::new();
        unknown_param.insert(EMISSIVE_MAP_KEY.to_string(), "glow.png".to_string());
        let material = convert_material(tobj::Material {
            name: "painted".into(),
            diffuse: Some([0.5, 0.25, 1.0]),
            dissolve: Some(0.5),
            specular_texture: Some("spec.png".into()),
            unknown_param,
            ..Default::default()
        });
        assert_eq!(material.diffuse_color, Some([0.5, 0.25, 1.0, 0.5]));
        assert_eq!(material.texture(TextureSlot::Specular), Some("spec.png"));
        assert_eq!(material.texture(TextureSlot::Emissive), Some("glow.png"));
        assert_eq!(material.texture(TextureSlot::Diffuse), None);
    }
}
