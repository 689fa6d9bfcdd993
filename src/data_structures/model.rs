//! Renderer-ready models: meshes with baked world-space geometry and their GPU buffers.

use std::path::{Path, PathBuf};

use cgmath::{InnerSpace, Matrix4, SquareMatrix, Vector3, Vector4};

use crate::context::BufferAllocator;

/// Extent below which a model counts as degenerate for [`Model::set_size_meters`].
const MIN_EXTENT: f32 = 1e-6;

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

/// Vertex as uploaded to the GPU. Position and normal are in world space.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// A mesh and the GPU buffers it exclusively owns.
///
/// The CPU copy of the vertices is kept around for bounds queries.
#[derive(Debug)]
pub struct Mesh<B> {
    pub name: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub texture_id: u32,
    pub vertex_buffer: B,
    pub index_buffer: B,
}

impl<B> Mesh<B> {
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// Union bounding box of a set of points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Bounds {
    pub fn from_points(points: impl IntoIterator<Item = Vector3<f32>>) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => Bounds { min: p, max: p },
                Some(b) => Bounds {
                    min: Vector3::new(b.min.x.min(p.x), b.min.y.min(p.y), b.min.z.min(p.z)),
                    max: Vector3::new(b.max.x.max(p.x), b.max.y.max(p.y), b.max.z.max(p.z)),
                },
            })
        })
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn max_extent(&self) -> f32 {
        let size = self.size();
        size.x.max(size.y).max(size.z)
    }
}

/// A loaded scene file: ordered meshes plus one model transform applied at draw time
/// on top of the baked geometry.
#[derive(Debug)]
pub struct Model<B> {
    meshes: Vec<Mesh<B>>,
    transform: Matrix4<f32>,
    tag: u32,
    key: PathBuf,
}

impl<B> Model<B> {
    pub fn new(key: impl Into<PathBuf>, tag: u32, meshes: Vec<Mesh<B>>) -> Self {
        Self {
            meshes,
            transform: Matrix4::identity(),
            tag,
            key: key.into(),
        }
    }

    pub fn meshes(&self) -> &[Mesh<B>] {
        &self.meshes
    }

    /// The canonical path this model was loaded from.
    pub fn key(&self) -> &Path {
        &self.key
    }

    pub fn tag(&self) -> u32 {
        self.tag
    }

    pub fn transform(&self) -> Matrix4<f32> {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Matrix4<f32>) {
        self.transform = transform;
    }

    /// Replaces the translation column, keeping rotation and scale.
    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.transform.w = Vector4::new(position.x, position.y, position.z, 1.0);
    }

    /// Prepends a rotation of `degrees` around `axis`.
    pub fn set_rotation(&mut self, degrees: f32, axis: Vector3<f32>) {
        if axis.magnitude2() <= f32::EPSILON {
            log::warn!("Ignoring rotation around a zero axis for {}", self.key.display());
            return;
        }
        self.transform =
            Matrix4::from_axis_angle(axis.normalize(), cgmath::Deg(degrees)) * self.transform;
    }

    /// Prepends a uniform scale so that the largest dimension of the baked geometry
    /// becomes `meters`. Degenerate or empty geometry leaves the transform untouched.
    pub fn set_size_meters(&mut self, meters: f32) {
        let Some(bounds) = self.bounds() else {
            return;
        };
        let max_dim = bounds.max_extent();
        if max_dim <= MIN_EXTENT {
            return;
        }
        self.transform = Matrix4::from_scale(meters / max_dim) * self.transform;
    }

    /// Bounds of the baked vertex positions across all meshes.
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(
            self.meshes
                .iter()
                .flat_map(|m| m.vertices.iter())
                .map(|v| Vector3::from(v.position)),
        )
    }

    /// Bounds of the geometry after applying the model transform.
    pub fn world_bounds(&self) -> Option<Bounds> {
        let transform = self.transform;
        Bounds::from_points(
            self.meshes
                .iter()
                .flat_map(|m| m.vertices.iter())
                .map(|v| (transform * Vector3::from(v.position).extend(1.0)).truncate()),
        )
    }

    /// Releases every mesh's GPU buffers. The model has no meshes afterwards.
    pub fn destroy<A>(&mut self, allocator: &A)
    where
        A: BufferAllocator<Buffer = B> + ?Sized,
    {
        for mesh in self.meshes.drain(..) {
            allocator.destroy_buffer(&mesh.vertex_buffer);
            allocator.destroy_buffer(&mesh.index_buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_model(min: [f32; 3], max: [f32; 3]) -> Model<()> {
        let vertices = vec![
            ModelVertex {
                position: min,
                ..Default::default()
            },
            ModelVertex {
                position: max,
                ..Default::default()
            },
        ];
        let mesh = Mesh {
            name: "box".into(),
            vertices,
            indices: vec![],
            texture_id: 0,
            vertex_buffer: (),
            index_buffer: (),
        };
        Model::new("box.obj", 0, vec![mesh])
    }

    #[test]
    fn set_position_keeps_rotation() {
        let mut model = cube_model([0.0; 3], [1.0; 3]);
        model.set_rotation(90.0, Vector3::unit_y());
        let rotation = model.transform();
        model.set_position(Vector3::new(1.0, 2.0, 3.0));
        let t = model.transform();
        assert_eq!(t.x, rotation.x);
        assert_eq!(t.y, rotation.y);
        assert_eq!(t.z, rotation.z);
        assert_eq!(t.w, Vector4::new(1.0, 2.0, 3.0, 1.0));
    }

    #[test]
    fn zero_axis_rotation_is_ignored() {
        let mut model = cube_model([0.0; 3], [1.0; 3]);
        model.set_rotation(45.0, Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(model.transform(), Matrix4::identity());
    }

    #[test]
    fn vertex_layout_matches_struct() {
        let desc = ModelVertex::desc();
        assert_eq!(desc.array_stride, 32);
        assert_eq!(desc.attributes.len(), 3);
    }
}
