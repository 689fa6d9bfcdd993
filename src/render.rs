//! Draw helpers for loaded models.
//!
//! Pipeline and bind-group setup belong to the renderer. These helpers only bind a mesh's
//! vertex and index buffers and issue the indexed draw, so a draw loop reads as:
//!
//! ```ignore
//! let model = handle.read();
//! for mesh in model.meshes() {
//!     render_pass.set_bind_group(1, &texture_groups[mesh.texture_id as usize], &[]);
//!     render_pass.draw_mesh(mesh);
//! }
//! ```

use std::ops::Range;

use crate::data_structures::model::{Mesh, Model};

pub trait DrawMesh {
    fn draw_mesh(&mut self, mesh: &Mesh<wgpu::Buffer>) {
        self.draw_mesh_instanced(mesh, 0..1);
    }

    fn draw_mesh_instanced(&mut self, mesh: &Mesh<wgpu::Buffer>, instances: Range<u32>);

    /// Draws every mesh of `model`. Texture binding is up to the caller.
    fn draw_model(&mut self, model: &Model<wgpu::Buffer>) {
        for mesh in model.meshes() {
            self.draw_mesh(mesh);
        }
    }
}

impl DrawMesh for wgpu::RenderPass<'_> {
    fn draw_mesh_instanced(&mut self, mesh: &Mesh<wgpu::Buffer>, instances: Range<u32>) {
        if mesh.index_count() == 0 {
            return;
        }
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.draw_indexed(0..mesh.index_count(), 0, instances);
    }
}
