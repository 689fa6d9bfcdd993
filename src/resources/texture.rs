use std::path::Path;

use image::{ImageFormat, load_from_memory_with_format};

use crate::{data_structures::texture::TextureRecord, error::TextureError};

const WHITE: [u8; 4] = [255, 255, 255, 255];
const CHECKER_DARK: [u8; 4] = [30, 30, 30, 255];
const CHECKER_LIGHT: [u8; 4] = [180, 180, 180, 255];

/**
 * Owns every decoded texture and hands out dense ids starting at 0.
 *
 * Records are never removed individually, so ids stay valid (and `0..count()` stays gap free)
 * until `clear_cache`. The store has no lock of its own; the model cache keeps it behind its mutex.
 */
#[derive(Debug, Default)]
pub struct TextureStore {
    textures: Vec<TextureRecord>,
    defaults: Option<Defaults>,
}

#[derive(Debug, Clone, Copy)]
struct Defaults {
    white: u32,
    checker: u32,
}

impl TextureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the white and checker placeholders the first time it is called.
    pub fn ensure_defaults(&mut self) {
        self.defaults();
    }

    fn defaults(&mut self) -> Defaults {
        if let Some(defaults) = self.defaults {
            return defaults;
        }
        let white = self.insert(TextureRecord::new(1, 1, WHITE.to_vec()));
        let checker = self.insert(TextureRecord::new(
            2,
            2,
            [CHECKER_DARK, CHECKER_LIGHT, CHECKER_LIGHT, CHECKER_DARK].concat(),
        ));
        let defaults = Defaults { white, checker };
        self.defaults = Some(defaults);
        defaults
    }

    pub fn default_white(&mut self) -> u32 {
        self.defaults().white
    }

    pub fn default_checker(&mut self) -> u32 {
        self.defaults().checker
    }

    pub fn create_solid(&mut self, rgba: [u8; 4]) -> u32 {
        self.ensure_defaults();
        self.insert(TextureRecord::new(1, 1, rgba.to_vec()))
    }

    pub fn create_from_raw_rgba(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<u32, TextureError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() < expected {
            return Err(TextureError::InvalidPixelData {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(self.insert(TextureRecord::new(
            width,
            height,
            pixels[..expected].to_vec(),
        )))
    }

    /// Decodes a compressed image. `format` is an extension-like hint ("png", "jpg");
    /// unknown hints fall back to guessing from the data.
    pub fn load_texture_from_memory(
        &mut self,
        bytes: &[u8],
        format: Option<&str>,
    ) -> Result<u32, TextureError> {
        let img = match format.and_then(ImageFormat::from_extension) {
            Some(fmt) => load_from_memory_with_format(bytes, fmt)?,
            None => image::load_from_memory(bytes)?,
        };
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(self.insert(TextureRecord::new(width, height, rgba.into_raw())))
    }

    pub fn load_texture(&mut self, path: impl AsRef<Path>) -> Result<u32, TextureError> {
        let rgba = image::open(path.as_ref())?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(self.insert(TextureRecord::new(width, height, rgba.into_raw())))
    }

    pub fn get_texture(&self, id: u32) -> Option<&TextureRecord> {
        self.textures.get(id as usize)
    }

    pub fn count(&self) -> usize {
        self.textures.len()
    }

    /// Records in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &TextureRecord)> {
        self.textures
            .iter()
            .enumerate()
            .map(|(id, record)| (id as u32, record))
    }

    /// Drops every record and restarts ids at 0. Placeholders are recreated on demand.
    pub fn clear_cache(&mut self) {
        self.textures.clear();
        self.defaults = None;
    }

    fn insert(&mut self, record: TextureRecord) -> u32 {
        let id = self.textures.len() as u32;
        self.textures.push(record);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_created_once() {
        let mut store = TextureStore::new();
        let white = store.default_white();
        let checker = store.default_checker();
        store.ensure_defaults();
        assert_eq!((white, checker), (0, 1));
        assert_eq!(store.count(), 2);
        assert_eq!(store.get_texture(checker).unwrap().pixel(1, 0), Some(CHECKER_LIGHT));
        assert_eq!(store.get_texture(checker).unwrap().pixel(1, 1), Some(CHECKER_DARK));
    }

    #[test]
    fn ids_are_dense_and_restart_after_clear() {
        let mut store = TextureStore::new();
        let solid = store.create_solid([1, 2, 3, 4]);
        assert_eq!(solid, 2);
        let raw = store.create_from_raw_rgba(1, 2, &[0; 8]).unwrap();
        assert_eq!(raw, 3);
        assert_eq!(store.iter().map(|(id, _)| id).collect::<Vec<_>>(), vec![0, 1, 2, 3]);

        store.clear_cache();
        assert_eq!(store.count(), 0);
        assert!(store.get_texture(0).is_none());
        assert_eq!(store.default_checker(), 1);
    }

    #[test]
    fn short_raw_buffer_allocates_nothing() {
        let mut store = TextureStore::new();
        let err = store.create_from_raw_rgba(2, 2, &[0; 15]).unwrap_err();
        assert!(matches!(
            err,
            TextureError::InvalidPixelData {
                expected: 16,
                actual: 15
            }
        ));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn zero_sized_raw_texture_is_rejected() {
        let mut store = TextureStore::new();
        assert!(matches!(
            store.create_from_raw_rgba(0, 2, &[]),
            Err(TextureError::InvalidPixelData { expected: 0, actual: 0 })
        ));
        assert!(store.create_from_raw_rgba(3, 0, &[7; 12]).is_err());
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let mut store = TextureStore::new();
        let err = store
            .load_texture_from_memory(b"not an image", Some("png"))
            .unwrap_err();
        assert!(matches!(err, TextureError::ImageDecodeFailure { .. }));
        assert_eq!(store.count(), 0);
    }
}
