//! Asset data structures.
//!
//! - `scene` is the importer's output: nodes, source meshes, materials, embedded textures
//! - `scene_graph` walks a scene's node hierarchy and composes world transforms
//! - `model` contains the renderer-ready meshes and the model transform
//! - `texture` contains decoded texture records and their GPU upload

pub mod model;
pub mod scene;
pub mod scene_graph;
pub mod texture;
