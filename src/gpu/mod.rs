//! Optional compute backend running the same transition and meshing passes on the GPU.

mod automata;
pub mod shaders;

pub use automata::*;

use bytemuck::Pod;
use log::info;
use wgpu::{Buffer, BufferAddress, Device, Queue};

use crate::error::Error;

/// A headless device and queue shared by every pipeline.
pub struct GpuContext {
    pub device: Device,
    pub queue: Queue,
}

impl GpuContext {
    pub async fn new() -> Result<Self, Error> {
        let instance = wgpu::Instance::new(wgpu::Backends::all());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or(Error::NoAdapter)?;
        info!("using adapter {:?}", adapter.get_info());

        // Large grids need whatever buffer sizes the adapter offers.
        let supported = adapter.limits();
        let limits = wgpu::Limits {
            max_storage_buffer_binding_size: supported.max_storage_buffer_binding_size,
            max_buffer_size: supported.max_buffer_size,
            ..wgpu::Limits::downlevel_defaults().using_resolution(supported.clone())
        };

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    features: wgpu::Features::empty(),
                    limits,
                },
                None,
            )
            .await?;

        Ok(Self { device, queue })
    }
}

/// Copies `size` bytes of `source` through `staging` and reads them back as `T`s.
pub(crate) async fn read_buffer<T: Pod>(
    device: &Device,
    queue: &Queue,
    source: &Buffer,
    staging: &Buffer,
    size: BufferAddress,
) -> Result<Vec<T>, Error> {
    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    encoder.copy_buffer_to_buffer(source, 0, staging, 0, size);
    queue.submit(Some(encoder.finish()));

    let buffer_slice = staging.slice(..size);
    let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |v| {
        let _ = sender.send(v);
    });

    device.poll(wgpu::Maintain::Wait);
    match receiver.receive().await {
        Some(Ok(())) => {}
        Some(Err(err)) => return Err(err.into()),
        None => return Err(Error::MapAbandoned),
    }

    let data = buffer_slice.get_mapped_range();
    let result = bytemuck::cast_slice(&data).to_vec();
    drop(data);
    staging.unmap();
    Ok(result)
}
