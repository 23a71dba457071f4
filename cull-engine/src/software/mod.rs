//! A device executing recorded frames on the CPU, running the kernels of `cull-engine-shader` directly.

pub mod descriptors;
pub mod device;
pub mod pipelines;
pub mod raster;

#[cfg(test)]
mod tests;
