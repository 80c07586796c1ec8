pub mod bloom;
pub mod display;
pub mod pass;
pub mod readback;
pub mod shader;
pub mod solver;
pub mod splat;
pub mod sunrays;
pub mod target;

use std::sync::atomic::{AtomicBool, Ordering};

/// Global flag indicating the GPU device was lost.
static GPU_DEVICE_LOST: AtomicBool = AtomicBool::new(false);

pub fn is_device_lost() -> bool {
    GPU_DEVICE_LOST.load(Ordering::SeqCst)
}

pub fn mark_device_lost() {
    GPU_DEVICE_LOST.store(true, Ordering::SeqCst);
}

pub fn reset_device_lost() {
    GPU_DEVICE_LOST.store(false, Ordering::SeqCst);
}

/// GPU error type for buffer operations.
#[derive(Debug)]
pub enum GpuError {
    DeviceLost,
    BufferMapFailed(wgpu::BufferAsyncError),
    ChannelDisconnected,
}

impl std::fmt::Display for GpuError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuError::DeviceLost => write!(f, "GPU device lost"),
            GpuError::BufferMapFailed(e) => write!(f, "Buffer map failed: {:?}", e),
            GpuError::ChannelDisconnected => write!(f, "Channel disconnected"),
        }
    }
}

impl std::error::Error for GpuError {}

/// Wait for a buffer map operation to complete, returning Result instead of
/// panicking on a lost device.
pub fn await_buffer_map(
    rx: std::sync::mpsc::Receiver<Result<(), wgpu::BufferAsyncError>>,
) -> Result<(), GpuError> {
    if is_device_lost() {
        return Err(GpuError::DeviceLost);
    }
    match rx.recv() {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            log::error!("Buffer map failed: {:?}", e);
            Err(GpuError::BufferMapFailed(e))
        }
        Err(_) => {
            log::error!("Buffer map channel disconnected - possible device lost");
            mark_device_lost();
            Err(GpuError::ChannelDisconnected)
        }
    }
}
