//! GPU buffer allocation used by the mesh builder.
//!
//! The asset code never talks to a device directly. It asks a [`BufferAllocator`]
//! for a buffer of a given usage, filled with the given bytes, and hands the
//! buffer back through [`BufferAllocator::destroy_buffer`] when the owning model dies.
//!
//! - [`WgpuAllocator`] is what the renderer uses.
//! - [`HostAllocator`] keeps buffers in host memory. Useful for headless tools and tests.

use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use wgpu::util::DeviceExt;

use crate::data_structures::texture::{GpuTexture, TextureRecord};

pub trait BufferAllocator: Send + Sync {
    type Buffer: Send + Sync;

    /// Allocates a buffer that fits `contents` exactly and populates it.
    fn create_buffer(&self, label: &str, usage: wgpu::BufferUsages, contents: &[u8]) -> Self::Buffer;

    fn destroy_buffer(&self, buffer: &Self::Buffer);
}

impl<A: BufferAllocator + ?Sized> BufferAllocator for Arc<A> {
    type Buffer = A::Buffer;

    fn create_buffer(&self, label: &str, usage: wgpu::BufferUsages, contents: &[u8]) -> Self::Buffer {
        (**self).create_buffer(label, usage, contents)
    }

    fn destroy_buffer(&self, buffer: &Self::Buffer) {
        (**self).destroy_buffer(buffer)
    }
}

/// Device + queue of the rendering layer.
#[derive(Debug, Clone)]
pub struct WgpuAllocator {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl WgpuAllocator {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self { device, queue }
    }

    /// Uploads a texture the cache resolved, writing its pixels through the queue.
    pub fn upload_texture(&self, record: &TextureRecord, label: Option<&str>) -> GpuTexture {
        GpuTexture::from_record(&self.device, &self.queue, record, label)
    }
}

impl BufferAllocator for WgpuAllocator {
    type Buffer = wgpu::Buffer;

    fn create_buffer(&self, label: &str, usage: wgpu::BufferUsages, contents: &[u8]) -> wgpu::Buffer {
        // mapped at creation, copied and unmapped before anyone can read it
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            })
    }

    fn destroy_buffer(&self, buffer: &wgpu::Buffer) {
        buffer.destroy();
    }
}

/// A buffer living in host memory.
#[derive(Debug, Clone)]
pub struct HostBuffer {
    pub id: u64,
    pub label: String,
    pub usage: wgpu::BufferUsages,
    pub data: Vec<u8>,
}

impl HostBuffer {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Host-memory allocator that keeps track of how many buffers are alive.
#[derive(Debug, Default)]
pub struct HostAllocator {
    next_id: AtomicU64,
    live: AtomicUsize,
    destroyed: AtomicUsize,
}

impl HostAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_buffers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn destroyed_buffers(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl BufferAllocator for HostAllocator {
    type Buffer = HostBuffer;

    fn create_buffer(&self, label: &str, usage: wgpu::BufferUsages, contents: &[u8]) -> HostBuffer {
        self.live.fetch_add(1, Ordering::SeqCst);
        HostBuffer {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            label: label.to_string(),
            usage,
            data: contents.to_vec(),
        }
    }

    fn destroy_buffer(&self, _: &HostBuffer) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}
