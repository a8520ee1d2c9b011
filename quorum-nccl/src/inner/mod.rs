mod device;
mod transport;

pub use device::CudaDeviceContext;
pub use transport::NcclTransport;
