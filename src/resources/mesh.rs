use cgmath::{InnerSpace, Matrix, Matrix3, Matrix4, SquareMatrix, Vector3};

use crate::{
    context::BufferAllocator,
    data_structures::{
        model::{Mesh, ModelVertex},
        scene::SourceMesh,
    },
    resources::resolver::TextureResolver,
};

/**
 * Turns source meshes into renderer-ready meshes.
 *
 * Geometry is baked into world space here: positions go through the accumulated node
 * transform and normals through its inverse-transpose, so the renderer only has to apply
 * the model transform on top.
 */
pub struct GeometryBuilder<'a, A: ?Sized> {
    allocator: &'a A,
    resolver: TextureResolver<'a>,
    label: &'a str,
}

impl<'a, A> GeometryBuilder<'a, A>
where
    A: BufferAllocator + ?Sized,
{
    pub fn new(allocator: &'a A, resolver: TextureResolver<'a>, label: &'a str) -> Self {
        Self {
            allocator,
            resolver,
            label,
        }
    }

    pub fn build(&mut self, source: &SourceMesh, world: &Matrix4<f32>) -> Mesh<A::Buffer> {
        let vertices = bake_vertices(source, world);
        let indices = flatten_faces(source);

        let scene = self.resolver.scene();
        let material = source.material.and_then(|idx| {
            let material = scene.materials.get(idx);
            if material.is_none() {
                log::warn!("Mesh '{}' references missing material {}", source.name, idx);
            }
            material
        });
        let texture_id = self.resolver.resolve_material(material);

        let vertex_buffer = self.allocator.create_buffer(
            &format!("{:?} {:?} Vertex Buffer", self.label, source.name),
            wgpu::BufferUsages::VERTEX,
            bytemuck::cast_slice(&vertices),
        );
        let index_buffer = self.allocator.create_buffer(
            &format!("{:?} {:?} Index Buffer", self.label, source.name),
            wgpu::BufferUsages::INDEX,
            bytemuck::cast_slice(&indices),
        );

        Mesh {
            name: source.name.clone(),
            vertices,
            indices,
            texture_id,
            vertex_buffer,
            index_buffer,
        }
    }
}

/// Positions and normals in world space, UVs from the first usable channel.
pub fn bake_vertices(source: &SourceMesh, world: &Matrix4<f32>) -> Vec<ModelVertex> {
    let normal_matrix = normal_matrix(world);
    let uv_channel = select_uv_channel(source);
    log::debug!("Mesh '{}' using UV channel {:?}", source.name, uv_channel);
    let uvs = uv_channel.and_then(|ch| source.tex_coords[ch].as_ref());

    source
        .positions
        .iter()
        .enumerate()
        .map(|(i, &position)| {
            let p = world * Vector3::from(position).extend(1.0);
            let normal = source
                .normals
                .as_ref()
                .and_then(|normals| normals.get(i))
                .map(|&n| {
                    let n = normal_matrix * Vector3::from(n);
                    if n.magnitude2() > 0.0 {
                        n.normalize()
                    } else {
                        n
                    }
                })
                .unwrap_or(Vector3::new(0.0, 0.0, 0.0));
            let tex_coords = uvs
                .and_then(|channel| channel.coords.get(i))
                .copied()
                .unwrap_or([0.0, 0.0]);
            ModelVertex {
                position: p.truncate().into(),
                normal: normal.into(),
                tex_coords,
            }
        })
        .collect()
}

/// Inverse-transpose of the linear part. Singular transforms fall back to the linear part itself.
pub fn normal_matrix(world: &Matrix4<f32>) -> Matrix3<f32> {
    let linear = Matrix3::from_cols(world.x.truncate(), world.y.truncate(), world.z.truncate());
    linear
        .invert()
        .map(|inverse| inverse.transpose())
        .unwrap_or(linear)
}

/// Index of the first texture-coordinate channel with at least two components.
pub fn select_uv_channel(source: &SourceMesh) -> Option<usize> {
    source
        .tex_coords
        .iter()
        .position(|channel| channel.as_ref().is_some_and(|c| c.components >= 2))
}

/// Triangle-list indices in face order. Polygons are fanned around their first corner;
/// points and lines cannot be drawn as triangles and are skipped.
pub fn flatten_faces(source: &SourceMesh) -> Vec<u32> {
    let mut indices = Vec::with_capacity(source.faces.len() * 3);
    let mut skipped = 0usize;
    for face in &source.faces {
        match face.as_slice() {
            [first, rest @ ..] if rest.len() >= 2 => {
                for pair in rest.windows(2) {
                    indices.extend_from_slice(&[*first, pair[0], pair[1]]);
                }
            }
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        log::warn!(
            "Mesh '{}' has {} faces with fewer than 3 corners, skipping them",
            source.name,
            skipped
        );
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::scene::UvChannel;

    fn channel(components: u32, uv: [f32; 2]) -> Option<UvChannel> {
        Some(UvChannel {
            components,
            coords: vec![uv],
        })
    }

    #[test]
    fn picks_first_channel_with_two_components() {
        let source = SourceMesh {
            positions: vec![[0.0; 3]],
            tex_coords: vec![None, channel(1, [0.9, 0.9]), channel(2, [0.25, 0.75])],
            ..Default::default()
        };
        assert_eq!(select_uv_channel(&source), Some(2));
        let vertices = bake_vertices(&source, &Matrix4::identity());
        assert_eq!(vertices[0].tex_coords, [0.25, 0.75]);
    }

    #[test]
    fn missing_uvs_and_normals_are_zero() {
        let source = SourceMesh {
            positions: vec![[1.0, 2.0, 3.0]],
            ..Default::default()
        };
        let vertices = bake_vertices(&source, &Matrix4::from_translation(Vector3::new(1.0, 0.0, 0.0)));
        assert_eq!(vertices[0].position, [2.0, 2.0, 3.0]);
        assert_eq!(vertices[0].normal, [0.0; 3]);
        assert_eq!(vertices[0].tex_coords, [0.0; 2]);
    }

    #[test]
    fn normals_stay_perpendicular_under_non_uniform_scale() {
        // a 45 degree slope in the xy plane, stretched along x
        let source = SourceMesh {
            positions: vec![[0.0; 3]],
            normals: Some(vec![[-1.0, 1.0, 0.0]]),
            ..Default::default()
        };
        let world = Matrix4::from_nonuniform_scale(2.0, 1.0, 1.0);
        let n = Vector3::from(bake_vertices(&source, &world)[0].normal);
        let surface_dir = (world * Vector3::new(1.0, 1.0, 0.0).extend(0.0)).truncate();
        assert!(n.dot(surface_dir).abs() < 1e-6);
        assert!((n.magnitude() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn faces_flatten_in_order() {
        let source = SourceMesh {
            faces: vec![vec![0, 1, 2], vec![2, 1, 3]],
            ..Default::default()
        };
        assert_eq!(flatten_faces(&source), vec![0, 1, 2, 2, 1, 3]);
    }

    #[test]
    fn polygons_are_fanned_and_degenerate_faces_dropped() {
        let source = SourceMesh {
            faces: vec![vec![0, 1, 2, 3, 4], vec![5, 6], vec![7], vec![]],
            ..Default::default()
        };
        assert_eq!(flatten_faces(&source), vec![0, 1, 2, 0, 2, 3, 0, 3, 4]);
    }
}
