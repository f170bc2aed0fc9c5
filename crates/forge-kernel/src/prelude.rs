//! Convenience re-exports for dependent crates.

pub use crate::{Container, Kernel, KernelError, KernelResult};
