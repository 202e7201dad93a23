pub mod kernel;
pub mod registry;

pub use kernel::{Kernel, KernelBuilder};
pub use registry::ServiceRegistry;
