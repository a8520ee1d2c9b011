//! Device-context switching via the CUDA driver API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cudarc::driver::sys;
use cudarc::driver::CudaDevice;
use tracing::debug;

use quorum::{DeviceContext, Error, Result};

/// Binds GPU primary contexts to the calling thread.
///
/// `CudaDevice` handles are created lazily per ordinal and retained for
/// the process lifetime, so repeated switches reuse the same primary
/// context instead of re-retaining it.
#[derive(Default)]
pub struct CudaDeviceContext {
    devices: Mutex<HashMap<i32, Arc<CudaDevice>>>,
}

impl CudaDeviceContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn device(&self, ordinal: i32) -> Result<Arc<CudaDevice>> {
        let mut devices = self.devices.lock().expect("device map poisoned");
        if let Some(device) = devices.get(&ordinal) {
            return Ok(Arc::clone(device));
        }
        debug!(ordinal, "retaining primary context");
        let device = CudaDevice::new(ordinal as usize).map_err(driver_err)?;
        devices.insert(ordinal, Arc::clone(&device));
        Ok(device)
    }
}

impl DeviceContext for CudaDeviceContext {
    fn current(&self) -> Result<i32> {
        let mut device: sys::CUdevice = 0;
        let status = unsafe { sys::cuCtxGetDevice(&mut device) };
        match status {
            sys::CUresult::CUDA_SUCCESS => Ok(device),
            // No context bound yet on this thread; the runtime-API
            // convention is device 0.
            sys::CUresult::CUDA_ERROR_INVALID_CONTEXT => Ok(0),
            err => Err(Error::Transport {
                code: err as i32,
                message: format!("cuCtxGetDevice failed: {err:?}"),
            }),
        }
    }

    fn set_current(&self, device: i32) -> Result<()> {
        self.device(device)?.bind_to_thread().map_err(driver_err)
    }
}

fn driver_err(e: cudarc::driver::DriverError) -> Error {
    Error::Transport {
        code: e.0 as i32,
        message: e.to_string(),
    }
}
