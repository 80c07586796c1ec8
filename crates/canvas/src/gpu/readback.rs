//! Synchronous render-target readback, used by the GPU test suite to verify
//! field contents. Copies the texture into a row-aligned staging buffer,
//! maps it, and decodes the half-float texels.

use std::sync::mpsc;

use super::target::RenderTarget;
use super::{await_buffer_map, GpuError};

const BYTES_PER_F16: u32 = 2;

fn padded_bytes_per_row(unpadded: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Read a target back as f32s, channel-interleaved row by row.
pub fn read_target(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    target: &RenderTarget,
) -> Result<Vec<f32>, GpuError> {
    let channels = target.format().channels();
    let unpadded = target.width() * channels * BYTES_PER_F16;
    let padded = padded_bytes_per_row(unpadded);

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback staging"),
        size: (padded * target.height()) as u64,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: target.texture(),
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: None,
            },
        },
        wgpu::Extent3d {
            width: target.width(),
            height: target.height(),
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    await_buffer_map(rx)?;

    let mut out = Vec::with_capacity((target.width() * target.height() * channels) as usize);
    {
        let data = slice.get_mapped_range();
        for row in 0..target.height() {
            let start = (row * padded) as usize;
            let bytes = &data[start..start + unpadded as usize];
            for pair in bytes.chunks_exact(2) {
                let bits = u16::from_le_bytes([pair[0], pair[1]]);
                out.push(half::f16::from_bits(bits).to_f32());
            }
        }
    }
    staging.unmap();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_padding_aligns_to_256() {
        assert_eq!(padded_bytes_per_row(256), 256);
        assert_eq!(padded_bytes_per_row(257), 512);
        assert_eq!(padded_bytes_per_row(2), 256);
        // 128-wide Rg16Float rows are already aligned.
        assert_eq!(padded_bytes_per_row(128 * 2 * 2), 512);
    }
}
