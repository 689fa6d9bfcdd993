#[cfg(feature = "integration-tests")]
use crate::common::test_utils::*;

#[cfg(feature = "integration-tests")]
mod common;

#[cfg(feature = "integration-tests")]
fn device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });
    futures::executor::block_on(async {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok()?;
        adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("flow-assets smoke test"),
                ..Default::default()
            })
            .await
            .ok()
    })
}

#[test]
#[cfg(feature = "integration-tests")]
fn models_and_textures_upload_to_the_gpu() {
    use flow_assets::{AssetConfig, ModelCache, WgpuAllocator, data_structures::model::ModelVertex};
    use tempfile::TempDir;

    init_logger();
    let Some((device, queue)) = device() else {
        log::warn!("No GPU adapter available, skipping");
        return;
    };
    let dir = TempDir::new().unwrap();
    let cache = ModelCache::with_importer(
        AssetConfig::with_texture_root(dir.path()),
        WgpuAllocator::new(device.clone(), queue.clone()),
        StaticImporter::new(flat_scene(vec![triangle(None)], vec![])),
    );

    let handle = cache.load(touch(dir.path(), "gpu.glb"), 0).unwrap();
    {
        let model = handle.read();
        let mesh = &model.meshes()[0];
        assert_eq!(
            mesh.vertex_buffer.size(),
            (3 * std::mem::size_of::<ModelVertex>()) as u64
        );
        assert_eq!(mesh.index_buffer.size(), 12);
        assert!(mesh.vertex_buffer.usage().contains(wgpu::BufferUsages::VERTEX));
        assert!(mesh.index_buffer.usage().contains(wgpu::BufferUsages::INDEX));

        let textures = cache.textures();
        let record = textures.get_texture(mesh.texture_id).unwrap();
        let gpu = cache.allocator().upload_texture(record, Some("checker"));
        assert_eq!(gpu.texture.width(), record.width);
        assert_eq!(gpu.texture.height(), record.height);
    }
    queue.submit([]);
    drop(handle);
}
