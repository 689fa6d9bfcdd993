//! Format-independent scene as produced by an importer.
//!
//! This is the typed scene graph the loader consumes: a node hierarchy with local
//! transforms, source meshes, materials with texture slot bindings, and the table of
//! textures packed into the scene file itself.

use std::collections::HashMap;

use cgmath::{Matrix4, SquareMatrix};

/// Marker that prefixes references into [`Scene::textures`], e.g. `*0`.
pub const EMBEDDED_MARKER: char = '*';

#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub root: usize,
    pub nodes: Vec<Node>,
    pub meshes: Vec<SourceMesh>,
    pub materials: Vec<Material>,
    pub textures: Vec<EmbeddedTexture>,
}

impl Scene {
    pub fn root_node(&self) -> Option<&Node> {
        self.nodes.get(self.root)
    }

    /// Appends a node and returns its index.
    pub fn add_node(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub transform: Matrix4<f32>,
    pub meshes: Vec<usize>,
    pub children: Vec<usize>,
}

impl Node {
    pub fn new(name: impl Into<String>, transform: Matrix4<f32>) -> Self {
        Self {
            name: name.into(),
            transform,
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new("", Matrix4::identity())
    }
}

/// One set of texture coordinates. `components` is how many of u/v/w the source declared.
#[derive(Debug, Clone, PartialEq)]
pub struct UvChannel {
    pub components: u32,
    pub coords: Vec<[f32; 2]>,
}

#[derive(Debug, Clone, Default)]
pub struct SourceMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    /// Indexed by channel; `None` marks an unused channel.
    pub tex_coords: Vec<Option<UvChannel>>,
    pub faces: Vec<Vec<u32>>,
    pub material: Option<usize>,
}

/// Material texture slots, named after the usual importer texture types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    BaseColor,
    Diffuse,
    Unknown,
    Specular,
    Emissive,
    Ambient,
    Normal,
}

impl TextureSlot {
    /// Slots consulted, in order, when picking the one texture a mesh is drawn with.
    pub const PROBE_ORDER: [TextureSlot; 6] = [
        TextureSlot::BaseColor,
        TextureSlot::Diffuse,
        TextureSlot::Unknown,
        TextureSlot::Specular,
        TextureSlot::Emissive,
        TextureSlot::Ambient,
    ];
}

#[derive(Debug, Clone, Default)]
pub struct Material {
    pub name: String,
    /// Texture path per slot. Embedded textures use the `*N` form.
    pub textures: HashMap<TextureSlot, String>,
    pub diffuse_color: Option<[f32; 4]>,
}

impl Material {
    pub fn texture(&self, slot: TextureSlot) -> Option<&str> {
        self.textures.get(&slot).map(String::as_str)
    }
}

/// A texture stored inside the scene file.
///
/// With `height == 0` the data is a compressed image (PNG, JPEG, ...) of `width` bytes and
/// `format_hint` names its format. Otherwise it is `width * height` BGRA8888 texels.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedTexture {
    pub width: u32,
    pub height: u32,
    pub format_hint: String,
    pub data: Vec<u8>,
}

impl EmbeddedTexture {
    pub fn compressed(format_hint: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            width: data.len() as u32,
            height: 0,
            format_hint: format_hint.into(),
            data,
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.height == 0
    }
}
