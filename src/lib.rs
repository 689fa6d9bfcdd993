//! flow-assets
//!
//! Turns 3D asset files into GPU-resident models. Repeated loads of the same file are
//! deduplicated by a cache that never keeps models alive on its own, and every texture a
//! material references is resolved with a fallback chain that ends in a checker
//! placeholder instead of an error.
//!
//! High-level modules
//! - `cache`: the model cache and the handles it gives out
//! - `config`: injected asset configuration, loadable from TOML
//! - `context`: GPU buffer allocation (wgpu and host-memory allocators)
//! - `data_structures`: scenes, models, texture records
//! - `error`: load and texture errors
//! - `resources`: scene importers, texture store and resolver, mesh building
//! - `render`: draw helpers for render passes
//!

pub mod cache;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod resources;
pub mod render;

// Re-exports commonly used types for convenience in downstream code.
pub use cache::{ModelCache, ModelHandle};
pub use config::{AssetConfig, ImportOptions};
pub use context::{BufferAllocator, HostAllocator, WgpuAllocator};
pub use error::{LoadError, TextureError};
pub use render::DrawMesh;
pub use cgmath;
