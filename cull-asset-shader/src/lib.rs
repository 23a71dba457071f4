#![cfg_attr(target_arch = "spirv", no_std)]

pub mod affine_transform;
pub mod descriptor;
pub mod meshlet;
pub mod shape;
pub mod span;
