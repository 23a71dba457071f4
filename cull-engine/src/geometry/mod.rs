//! Splitting meshes into meshlets on the CPU and uploading them.

pub mod builder;
pub mod shapes;
