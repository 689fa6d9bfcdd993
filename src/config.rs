//! Asset configuration injected into the [`ModelCache`](crate::cache::ModelCache).
//!
//! Usually loaded once at startup from a TOML file:
//!
//! ```toml
//! texture_root = "assets/textures"
//! dump_embedded_dir = "/tmp/glb_textures"
//!
//! [import]
//! triangulate = true
//! generate_normals = true
//! flip_uvs = false
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;

/// Post-process steps requested from the scene importer.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    pub triangulate: bool,
    pub generate_normals: bool,
    /// `None` flips V for every format except glTF, which already uses a top-left UV origin.
    pub flip_uvs: Option<bool>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            triangulate: true,
            generate_normals: true,
            flip_uvs: None,
        }
    }
}

impl ImportOptions {
    pub fn flip_uvs_for(&self, path: &Path) -> bool {
        self.flip_uvs.unwrap_or_else(|| {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase);
            !matches!(ext.as_deref(), Some("gltf") | Some("glb"))
        })
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory external texture references are remapped into (by file name only).
    pub texture_root: PathBuf,
    /// When set, embedded textures are additionally written here for inspection.
    pub dump_embedded_dir: Option<PathBuf>,
    pub import: ImportOptions,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            texture_root: PathBuf::from("assets").join("textures"),
            dump_embedded_dir: None,
            import: ImportOptions::default(),
        }
    }
}

impl AssetConfig {
    pub fn with_texture_root(texture_root: impl Into<PathBuf>) -> Self {
        Self {
            texture_root: texture_root.into(),
            ..Default::default()
        }
    }

    pub fn from_toml_str(txt: &str) -> anyhow::Result<Self> {
        toml::from_str(txt).context("parse asset config TOML")
    }

    /// Loads the config at `path`, falling back to defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            log::info!("No asset config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let txt = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        Self::from_toml_str(&txt)
    }
}
