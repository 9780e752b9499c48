// Host-facing entry points over `adapter::compute_orders`
pub mod ffi;      // C ABI
#[cfg(feature = "python")]
pub mod python;   // pyo3 extension module
