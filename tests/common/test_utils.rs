#![allow(dead_code)]

use std::{
    io::Cursor,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use anyhow::anyhow;
use cgmath::{Matrix4, SquareMatrix};
use flow_assets::{
    AssetConfig, HostAllocator, ImportOptions, ModelCache,
    data_structures::scene::{Material, Node, Scene, SourceMesh},
    resources::SceneImporter,
};

pub type HostCache = ModelCache<Arc<HostAllocator>>;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Hands out a fixed scene for every path and counts how often it was asked to.
pub struct StaticImporter {
    scene: Scene,
    imports: Arc<AtomicUsize>,
}

impl StaticImporter {
    pub fn new(scene: Scene) -> Self {
        Self {
            scene,
            imports: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.imports)
    }
}

impl SceneImporter for StaticImporter {
    fn import(&self, _: &Path, _: &ImportOptions) -> anyhow::Result<Scene> {
        self.imports.fetch_add(1, Ordering::SeqCst);
        Ok(self.scene.clone())
    }
}

pub struct FailingImporter;

impl SceneImporter for FailingImporter {
    fn import(&self, path: &Path, _: &ImportOptions) -> anyhow::Result<Scene> {
        Err(anyhow!("{} is not a scene file", path.display()))
    }
}

pub fn host_cache(config: AssetConfig, importer: impl SceneImporter + 'static) -> (HostCache, Arc<HostAllocator>) {
    init_logger();
    let allocator = Arc::new(HostAllocator::new());
    let cache = ModelCache::with_importer(config, Arc::clone(&allocator), importer);
    (cache, allocator)
}

/// Creates an (empty) file so the cache's existence check passes.
pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"").unwrap();
    path
}

pub fn triangle(material: Option<usize>) -> SourceMesh {
    SourceMesh {
        name: "triangle".into(),
        positions: vec![[1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        normals: Some(vec![[0.0, 0.0, 1.0]; 3]),
        tex_coords: Vec::new(),
        faces: vec![vec![0, 1, 2]],
        material,
    }
}

/// A root node holding every mesh of `meshes`, each with `material` as its material.
pub fn flat_scene(meshes: Vec<SourceMesh>, materials: Vec<Material>) -> Scene {
    let mut scene = Scene {
        meshes,
        materials,
        ..Default::default()
    };
    let mut root = Node::new("root", Matrix4::identity());
    root.meshes = (0..scene.meshes.len()).collect();
    scene.root = scene.add_node(root);
    scene
}

/// One triangle drawn with `material`.
pub fn material_scene(material: Material) -> Scene {
    flat_scene(vec![triangle(Some(0))], vec![material])
}

pub fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

pub fn write_png(dir: &Path, name: &str, width: u32, height: u32, rgba: [u8; 4]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, png_bytes(width, height, rgba)).unwrap();
    path
}

pub fn write_text(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

pub fn assert_near(actual: [f32; 3], expected: [f32; 3]) {
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-5, "{actual:?} != {expected:?}");
    }
}
