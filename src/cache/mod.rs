//! Deduplicating model cache.
//!
//! Models are keyed by canonical path. The cache never owns a model: it only keeps the
//! [`SlotKey`] of the handle it gave out, so a model lives exactly as long as some
//! [`ModelHandle`] does. Entries whose model is gone stay in the map until
//! [`ModelCache::garbage_collect`] or one of the explicit removals prunes them.

mod handle;

use std::{
    collections::HashMap,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use cgmath::Matrix4;
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

pub use handle::{ModelHandle, SharedModel, SlotKey};
use handle::Shared;

use crate::{
    config::AssetConfig,
    context::BufferAllocator,
    data_structures::{model::Model, scene_graph},
    error::LoadError,
    resources::{
        FileImporter, SceneImporter, mesh::GeometryBuilder, resolver::TextureResolver,
        texture::TextureStore,
    },
};

struct CacheState {
    entries: HashMap<PathBuf, SlotKey>,
    textures: TextureStore,
}

pub struct ModelCache<A: BufferAllocator> {
    config: AssetConfig,
    importer: Box<dyn SceneImporter>,
    state: Mutex<CacheState>,
    shared: Arc<Shared<A>>,
}

impl<A: BufferAllocator> ModelCache<A> {
    /// A cache that parses scene files with the built-in [`FileImporter`].
    pub fn new(config: AssetConfig, allocator: A) -> Self {
        Self::with_importer(config, allocator, FileImporter)
    }

    pub fn with_importer(config: AssetConfig, allocator: A, importer: impl SceneImporter + 'static) -> Self {
        Self {
            config,
            importer: Box::new(importer),
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                textures: TextureStore::new(),
            }),
            shared: Arc::new(Shared::new(allocator)),
        }
    }

    pub fn config(&self) -> &AssetConfig {
        &self.config
    }

    pub fn allocator(&self) -> &A {
        &self.shared.allocator
    }

    /**
     * Returns the model for `path`, loading it if no live instance exists.
     *
     * The cache lock is held for the whole call, so concurrent loads of the same file
     * build it once and every caller gets the same model. A cache hit keeps the tag the
     * model was first loaded with.
     */
    pub fn load(&self, path: impl AsRef<Path>, tag: u32) -> Result<ModelHandle<A>, LoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoadError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let key = canonical_key(path);

        let mut state = self.state.lock();
        if let Some(&slot) = state.entries.get(&key) {
            if let Some(handle) = handle::acquire(&self.shared, slot) {
                log::debug!("Cache hit for {}", key.display());
                return Ok(handle);
            }
            log::debug!("Cache entry for {} expired, reloading", key.display());
        }

        let start = instant::Instant::now();
        let scene = self
            .importer
            .import(&key, &self.config.import)
            .map_err(|e| LoadError::parse(&key, e))?;

        let CacheState { entries, textures } = &mut *state;
        let resolver = TextureResolver::new(textures, &scene, &self.config.texture_root)
            .dump_embedded_to(self.config.dump_embedded_dir.as_deref());
        let label = key.display().to_string();
        let mut builder = GeometryBuilder::new(&self.shared.allocator, resolver, &label);
        let mut meshes = Vec::new();
        scene_graph::traverse(&scene, &mut builder, &mut meshes)
            .map_err(|e| LoadError::parse(&key, e))?;

        log::info!(
            "Loaded {} with {} meshes in {:?}",
            key.display(),
            meshes.len(),
            start.elapsed()
        );
        for (i, mesh) in meshes.iter().enumerate() {
            log::info!(
                "  mesh {} '{}': {} vertices, {} indices, texture {}",
                i,
                mesh.name,
                mesh.vertices.len(),
                mesh.indices.len(),
                mesh.texture_id
            );
        }

        let handle = handle::insert(&self.shared, Model::new(key.clone(), tag, meshes));
        entries.insert(key, handle.slot_key());
        Ok(handle)
    }

    /// [`load`](Self::load), then replaces the model's transform.
    pub fn load_instance(
        &self,
        path: impl AsRef<Path>,
        tag: u32,
        transform: Matrix4<f32>,
    ) -> Result<ModelHandle<A>, LoadError> {
        let handle = self.load(path, tag)?;
        handle.set_transform(transform);
        Ok(handle)
    }

    /// True if `path` has an entry whose model is still alive.
    pub fn has(&self, path: impl AsRef<Path>) -> bool {
        let key = canonical_key(path.as_ref());
        let state = self.state.lock();
        state
            .entries
            .get(&key)
            .is_some_and(|&slot| self.shared.is_live(slot))
    }

    /// Drops the entry for `path`. Handles already given out stay valid.
    pub fn remove(&self, path: impl AsRef<Path>) -> bool {
        let key = canonical_key(path.as_ref());
        self.state.lock().entries.remove(&key).is_some()
    }

    /// Drops every entry whose live model carries `tag`. Returns how many were dropped.
    pub fn remove_model(&self, tag: u32) -> usize {
        let mut state = self.state.lock();
        let table = self.shared.table.lock();
        let before = state.entries.len();
        state
            .entries
            .retain(|_, &mut slot| table.tag(slot) != Some(tag));
        let removed = before - state.entries.len();
        log::info!("Removed {} cache entries tagged {}", removed, tag);
        removed
    }

    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    /// Prunes expired entries and returns how many there were.
    pub fn garbage_collect(&self) -> usize {
        let mut state = self.state.lock();
        let table = self.shared.table.lock();
        let before = state.entries.len();
        state.entries.retain(|_, slot| table.is_live(*slot));
        let pruned = before - state.entries.len();
        if pruned > 0 {
            log::info!("Pruned {} expired cache entries", pruned);
        }
        pruned
    }

    /// Calls `f` with every live model. `f` runs after the cache is unlocked.
    pub fn for_each_loaded(&self, mut f: impl FnMut(&ModelHandle<A>)) {
        let handles: Vec<ModelHandle<A>> = {
            let state = self.state.lock();
            state
                .entries
                .values()
                .filter_map(|&slot| handle::acquire(&self.shared, slot))
                .collect()
        };
        for handle in &handles {
            f(handle);
        }
    }

    /// Number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Locked access to the texture store. Do not call [`load`](Self::load) while holding it.
    pub fn textures(&self) -> MappedMutexGuard<'_, TextureStore> {
        MutexGuard::map(self.state.lock(), |state| &mut state.textures)
    }
}

/// Absolute, lexically normalized form of `path`. Symlinks are not resolved.
pub fn canonical_key(path: &Path) -> PathBuf {
    match std::path::absolute(path) {
        Ok(absolute) => lexically_normal(&absolute),
        Err(e) => {
            log::warn!("Could not make {} absolute: {}", path.display(), e);
            lexically_normal(path)
        }
    }
}

fn lexically_normal(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}
