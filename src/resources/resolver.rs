//! Material texture resolution with fallbacks.
//!
//! A material's texture reference is either embedded (`*N`, an index into the scene's
//! texture table) or external (a path, of which only the file name is used and looked up
//! in the configured texture root). Whatever goes wrong ends up as the checker placeholder
//! plus a warning; a texture can never fail a model load.

use std::path::{Path, PathBuf};

use crate::{
    data_structures::scene::{EMBEDDED_MARKER, EmbeddedTexture, Material, Scene, TextureSlot},
    error::TextureError,
    resources::texture::TextureStore,
};

/// Compressed embedded formats the image decoder is trusted with.
const DECODABLE_HINTS: [&str; 3] = ["png", "jpg", "jpeg"];

pub struct TextureResolver<'a> {
    store: &'a mut TextureStore,
    scene: &'a Scene,
    texture_root: &'a Path,
    dump_dir: Option<&'a Path>,
}

impl<'a> TextureResolver<'a> {
    pub fn new(store: &'a mut TextureStore, scene: &'a Scene, texture_root: &'a Path) -> Self {
        Self {
            store,
            scene,
            texture_root,
            dump_dir: None,
        }
    }

    /// Also write every embedded texture that gets resolved into `dir`.
    pub fn dump_embedded_to(mut self, dir: Option<&'a Path>) -> Self {
        self.dump_dir = dir;
        self
    }

    pub fn scene(&self) -> &'a Scene {
        self.scene
    }

    /// Picks the texture a mesh with `material` is drawn with.
    ///
    /// The first probed slot with a bound texture wins, even when resolving it falls back
    /// to the checker. Without any bound texture the diffuse color becomes a 1x1 texture.
    pub fn resolve_material(&mut self, material: Option<&Material>) -> u32 {
        let Some(material) = material else {
            log::info!("Mesh has no material; using checker");
            return self.store.default_checker();
        };

        for slot in TextureSlot::PROBE_ORDER {
            if let Some(reference) = material.texture(slot) {
                log::debug!(
                    "Material '{}' slot {:?} -> '{}'",
                    material.name,
                    slot,
                    reference
                );
                return self.resolve_reference(reference);
            }
        }

        match material.diffuse_color {
            Some(color) => {
                let rgba = color_to_rgba8(color);
                log::info!(
                    "Material '{}' has no texture; using solid color {:?}",
                    material.name,
                    rgba
                );
                self.store.create_solid(rgba)
            }
            None => {
                log::info!(
                    "Material '{}' has no texture and no diffuse color; using checker",
                    material.name
                );
                self.store.default_checker()
            }
        }
    }

    /// Resolves one texture reference, falling back to the checker on any failure.
    pub fn resolve_reference(&mut self, reference: &str) -> u32 {
        let resolved = match reference.strip_prefix(EMBEDDED_MARKER) {
            Some(index) => self.resolve_embedded(reference, index),
            None => self.resolve_external(reference),
        };
        match resolved {
            Ok(id) => id,
            Err(e) => {
                log::warn!("{e}; using checker");
                self.store.default_checker()
            }
        }
    }

    fn resolve_embedded(&mut self, reference: &str, index: &str) -> Result<u32, TextureError> {
        let scene = self.scene;
        let (index, texture) = index
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| scene.textures.get(i).map(|t| (i, t)))
            .ok_or_else(|| TextureError::EmbeddedIndexOutOfRange {
                reference: reference.to_string(),
                available: scene.textures.len(),
            })?;
        log::info!(
            "Embedded texture *{} hint='{}' size={} height={}",
            index,
            texture.format_hint,
            texture.width,
            texture.height
        );
        self.dump_embedded(index, texture);

        if texture.is_compressed() {
            let hint = texture.format_hint.to_ascii_lowercase();
            if !DECODABLE_HINTS.contains(&hint.as_str()) {
                return Err(TextureError::UnsupportedEmbeddedFormat {
                    index,
                    hint: texture.format_hint.clone(),
                });
            }
            return self
                .store
                .load_texture_from_memory(&texture.data, Some(hint.as_str()));
        }

        let expected = texture.width as usize * texture.height as usize * 4;
        if texture.data.len() < expected {
            return Err(TextureError::InvalidPixelData {
                expected,
                actual: texture.data.len(),
            });
        }
        let rgba = bgra_to_rgba(&texture.data[..expected]);
        self.store
            .create_from_raw_rgba(texture.width, texture.height, &rgba)
    }

    fn resolve_external(&mut self, reference: &str) -> Result<u32, TextureError> {
        let file_name = file_name(reference);
        log::info!(
            "External texture request '{}', trying '{}'",
            reference,
            self.texture_root.join(file_name).display()
        );
        let path = find_texture_file(self.texture_root, file_name).ok_or_else(|| {
            TextureError::ExternalTextureNotFound {
                requested: reference.to_string(),
                root: self.texture_root.to_path_buf(),
            }
        })?;
        self.store.load_texture(path)
    }

    fn dump_embedded(&self, index: usize, texture: &EmbeddedTexture) {
        let Some(dir) = self.dump_dir else {
            return;
        };
        if let Err(e) = dump_embedded_texture(dir, index, texture) {
            log::warn!("Failed to dump embedded texture *{index}: {e:#}");
        }
    }
}

/// Looks `file_name` up in `root`: exact match first, then a case-insensitive scan
/// of the regular files in `root`.
pub fn find_texture_file(root: &Path, file_name: &str) -> Option<PathBuf> {
    if file_name.is_empty() {
        return None;
    }
    let exact = root.join(file_name);
    if exact.is_file() {
        return Some(exact);
    }

    let wanted = file_name.to_lowercase();
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(root)
        .ok()?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect();
    candidates.sort();
    let found = candidates.into_iter().find(|candidate| {
        candidate
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.to_lowercase() == wanted)
    })?;
    log::info!("Case-insensitive texture match: {}", found.display());
    Some(found)
}

/// The last component of a texture path, accepting both separator styles.
fn file_name(reference: &str) -> &str {
    reference
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(reference)
}

/// Swaps the blue and red channel of every texel.
pub fn bgra_to_rgba(bgra: &[u8]) -> Vec<u8> {
    bgra.chunks_exact(4)
        .flat_map(|px| [px[2], px[1], px[0], px[3]])
        .collect()
}

/// Clamps a linear color to 8 bit channels. A zero alpha counts as unset and becomes opaque.
pub fn color_to_rgba8(color: [f32; 4]) -> [u8; 4] {
    let to8 = |f: f32| (f.clamp(0.0, 1.0) * 255.0).round() as u8;
    let alpha = if color[3] == 0.0 { 1.0 } else { color[3] };
    [to8(color[0]), to8(color[1]), to8(color[2]), to8(alpha)]
}

fn dump_embedded_texture(dir: &Path, index: usize, texture: &EmbeddedTexture) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = if texture.is_compressed() {
        let ext = if texture.format_hint.is_empty() {
            "bin".to_string()
        } else {
            texture.format_hint.to_ascii_lowercase()
        };
        let path = dir.join(format!("embedded_{index}.{ext}"));
        std::fs::write(&path, &texture.data)?;
        path
    } else {
        let expected = texture.width as usize * texture.height as usize * 4;
        let rgba = bgra_to_rgba(texture.data.get(..expected).unwrap_or_default());
        let img = image::RgbaImage::from_raw(texture.width, texture.height, rgba)
            .ok_or_else(|| anyhow::anyhow!("pixel data does not match {}x{}", texture.width, texture.height))?;
        let path = dir.join(format!("embedded_{index}.png"));
        img.save(&path)?;
        path
    };
    log::info!("Dumped embedded texture *{} to {}", index, path.display());
    Ok(())
}
