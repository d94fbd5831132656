// src/wgpu_utils/uniform_buffer.rs
use std::marker::PhantomData;

fn short_type_name<Content>() -> &'static str {
    let type_name = std::any::type_name::<Content>();
    let pos = type_name.rfind(':').unwrap_or(0);
    if pos > 0 {
        &type_name[(pos + 1)..]
    } else {
        type_name
    }
}

/// Typed uniform buffer holding one `Content`
pub struct UniformBuffer<Content> {
    buffer: wgpu::Buffer,
    content_type: PhantomData<Content>,
    previous_content: Vec<u8>,
}

impl<Content: bytemuck::Pod> UniformBuffer<Content> {
    /// Create a new uniform buffer
    pub fn new(device: &wgpu::Device) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("UniformBuffer: {}", short_type_name::<Content>())),
            size: std::mem::size_of::<Content>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        UniformBuffer {
            buffer,
            content_type: PhantomData,
            previous_content: Vec::new(),
        }
    }

    /// Update buffer content (skips the write when nothing changed)
    pub fn update_content(&mut self, queue: &wgpu::Queue, content: Content) {
        let new_content = bytemuck::bytes_of(&content);
        if self.previous_content == new_content {
            return;
        }
        queue.write_buffer(&self.buffer, 0, new_content);
        self.previous_content = new_content.to_vec();
    }

    /// Get binding resource
    pub fn binding_resource(&self) -> wgpu::BindingResource {
        self.buffer.as_entire_binding()
    }
}

/// Fixed capacity vertex buffer that is overwritten from the start
pub struct ArrayBuffer<Content> {
    buffer: wgpu::Buffer,
    content_type: PhantomData<Content>,
    capacity: usize,
    current_size: usize,
}

impl<Content: bytemuck::Pod> ArrayBuffer<Content> {
    /// Create new vertex buffer able to hold `capacity` elements
    pub fn new_vertex(device: &wgpu::Device, capacity: usize) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("VertexBuffer<{}>", short_type_name::<Content>())),
            size: (capacity.max(1) * std::mem::size_of::<Content>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        ArrayBuffer {
            buffer,
            content_type: PhantomData,
            capacity,
            current_size: 0,
        }
    }

    /// Overwrite the start of the buffer
    pub fn update_data(&mut self, queue: &wgpu::Queue, data: &[Content]) {
        if data.len() > self.capacity {
            log::error!(
                "{} elements exceed buffer capacity {}, skipping upload",
                data.len(),
                self.capacity
            );
            return;
        }
        if data.is_empty() {
            self.current_size = 0;
            return;
        }
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(data));
        self.current_size = data.len();
    }

    /// Slice covering the first `count` elements
    pub fn slice(&self, count: usize) -> wgpu::BufferSlice<'_> {
        let end = (count.min(self.capacity) * std::mem::size_of::<Content>()) as u64;
        self.buffer.slice(..end)
    }

    /// Get the underlying buffer
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Get current number of elements
    pub fn len(&self) -> usize {
        self.current_size
    }

    pub fn is_empty(&self) -> bool {
        self.current_size == 0
    }

    /// Get capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
