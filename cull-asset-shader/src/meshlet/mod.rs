pub mod indices;
pub mod instance;
pub mod mesh;
pub mod model;
pub mod vertex;

pub const MESHLET_MAX_VERTICES: u32 = 64;
pub const MESHLET_MAX_TRIANGLES: u32 = 64;

/// bits required to address every vertex of a meshlet
pub const MESHLET_INDICES_BITS: u32 = 6;
static_assertions::const_assert!(MESHLET_MAX_VERTICES <= 1 << MESHLET_INDICES_BITS);
